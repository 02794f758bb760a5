//! The multi-way, block-synchronous deep comparator.
//!
//! Given a candidate set (files sharing an exact size), reads every file in
//! lockstep, one 64KB block at a time, and uses a compact pair-flag
//! triangle plus transitive match/mismatch inference to retire as many
//! pairwise comparisons as possible without ever hashing a byte.

use crate::fileref::FileRef;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, Read};

pub const BLOCK_SIZE: usize = 65536;

/// Headroom kept below the process's open-file soft limit so a candidate
/// set's descriptors don't starve whatever else the process needs.
const FD_HEADROOM: u64 = 16;

/// `(n-1)*i - i*(i-1)/2 + (j-i) - 1`: position of the flag for unordered
/// pair `(i,j)`, `i<j`, in a packed triangular array of `n(n-1)/2` cells.
fn pair_index(n: usize, i: usize, j: usize) -> usize {
    debug_assert!(i < j && j < n);
    let triangle = if i == 0 { 0 } else { i * (i - 1) / 2 };
    (n - 1) * i - triangle + (j - i) - 1
}

/// Consults the process's `RLIMIT_NOFILE` soft limit and returns an error
/// if opening `n` descriptors (plus headroom) would exceed it. If the
/// limit can't be determined, proceeds optimistically.
fn check_fd_budget(n: usize) -> io::Result<()> {
    let mut rl: libc::rlimit = unsafe { std::mem::zeroed() };
    let got = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rl) };
    if got != 0 {
        return Ok(());
    }
    if rl.rlim_cur != libc::RLIM_INFINITY && (n as u64) + FD_HEADROOM > rl.rlim_cur {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!(
                "candidate set of {n} files would exceed the open-file-descriptor limit ({})",
                rl.rlim_cur
            ),
        ));
    }
    Ok(())
}

/// Compares one candidate set (all members of identical `size`) and
/// invokes `sink` once per duplicate group of two or more files found.
///
/// On any I/O error, all open descriptors are closed (via `Drop`) before
/// the error is propagated; groups already delivered to `sink` remain
/// valid observations.
pub fn compare_candidate_set<'a>(
    files: &[&'a FileRef],
    size: u64,
    mut sink: impl FnMut(&[&'a FileRef], u64),
) -> io::Result<()> {
    let n = files.len();
    if n < 2 {
        return Ok(());
    }
    check_fd_budget(n)?;

    let mut fds: Vec<Option<File>> = Vec::with_capacity(n);
    for f in files {
        fds.push(Some(File::open(f.full_path())?));
    }
    let mut bufs: Vec<Vec<u8>> = (0..n).map(|_| vec![0u8; BLOCK_SIZE]).collect();

    // 1 = live candidate match, 0 = proven non-matching (sticky), 2 = known
    // equal for the current block only (reset to 1 on its next visit).
    let mut flag: Vec<u8> = vec![1u8; n * (n - 1) / 2];
    let mut mresult: Vec<i8> = vec![0i8; n];
    // Reused as both "will never match anything else" and, after the main
    // loop, "already absorbed into a reported group" — mirrors the
    // original algorithm's dual use of this flag.
    let mut omit: Vec<bool> = vec![false; n];
    let mut skipcount: Vec<usize> = vec![0; n];
    let mut omitted = 0usize;

    'blocks: loop {
        let mut r = 0usize;
        for i in 0..n {
            if omit[i] {
                continue;
            }
            r = fds[i].as_mut().expect("live file has an open fd").read(&mut bufs[i])?;
            if r == 0 {
                break;
            }
        }
        if r == 0 {
            break;
        }

        for i in 0..n {
            if omit[i] {
                continue;
            }
            for j in (i + 1)..n {
                if omit[j] {
                    continue;
                }
                let p_ij = pair_index(n, i, j);
                if flag[p_ij] == 0 {
                    continue;
                }
                if flag[p_ij] == 2 {
                    flag[p_ij] = 1;
                    mresult[j] = 0;
                } else {
                    mresult[j] = match bufs[i][..r].cmp(&bufs[j][..r]) {
                        Ordering::Less => -1,
                        Ordering::Equal => 0,
                        Ordering::Greater => 1,
                    };
                }

                for k in (i + 1..j).rev() {
                    if omit[k] {
                        continue;
                    }
                    let p_kj = pair_index(n, k, j);
                    if flag[p_kj] == 0 {
                        continue;
                    }
                    if mresult[k] != mresult[j] {
                        flag[p_kj] = 0;
                        skipcount[j] += 1;
                        skipcount[k] += 1;
                        if skipcount[k] == n - 1 && !omit[k] {
                            omit[k] = true;
                            fds[k] = None;
                            omitted += 1;
                        }
                    } else if mresult[k] == 0 && mresult[j] == 0 {
                        flag[p_kj] = 2;
                    }
                }

                if mresult[j] != 0 {
                    flag[p_ij] = 0;
                    skipcount[i] += 1;
                    skipcount[j] += 1;
                    if skipcount[j] == n - 1 && !omit[j] {
                        omit[j] = true;
                        fds[j] = None;
                        omitted += 1;
                    }
                }
            }

            if skipcount[i] == n - 1 && !omit[i] {
                omit[i] = true;
                fds[i] = None;
                omitted += 1;
            }
            if omitted == n {
                break 'blocks;
            }
        }
    }
    drop(fds);

    for i in 0..n {
        if omit[i] {
            continue;
        }
        let mut group = vec![files[i]];
        for j in (i + 1)..n {
            if omit[j] {
                continue;
            }
            if flag[pair_index(n, i, j)] == 1 {
                group.push(files[j]);
                omit[j] = true;
            }
        }
        if group.len() >= 2 {
            sink(&group, size);
        }
    }

    Ok(())
}
