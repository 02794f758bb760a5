//! Recursive directory walker with symlink-loop prevention.

use crate::fileref::{dir_ref, DirRef};
use crate::orchestrator::Counters;
use crate::path_resolve;
use crate::size_index::{DupOptions, SizeIndex};
use std::fs;
use std::sync::atomic::{AtomicU32, Ordering};

/// Bundles everything a walk needs so `scan_dir`/`classify` don't have to
/// thread half a dozen parameters through every recursive call.
pub struct WalkCtx<'a> {
    pub index: &'a mut SizeIndex,
    pub options: &'a DupOptions,
    pub scan_roots: &'a [String],
    pub counters: &'a mut Counters,
    pub error_sink: &'a mut dyn FnMut(&str, &str) -> bool,
    pub break_flag: Option<&'a AtomicU32>,
}

impl WalkCtx<'_> {
    fn report_error(&mut self, path: &str, reason: &str) {
        self.counters.scan_errors += 1;
        (self.error_sink)(path, reason);
    }

    fn should_break(&self) -> bool {
        self.break_flag.map_or(false, |f| f.load(Ordering::SeqCst) > 0)
    }
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_owned()
    } else {
        format!("{path}/")
    }
}

/// Whether `target` lies at or under `root`, tolerating one trailing `/`
/// on `root`. A plain prefix test, not component-boundary aware — matches
/// the historical scan-root check this is grounded on.
fn is_under_root(root: &str, target: &str) -> bool {
    let root_norm = root.strip_suffix('/').unwrap_or(root);
    target == root_norm || target.starts_with(root_norm)
}

/// Walks one already-registered, canonicalized scan root.
pub fn walk_root(ctx: &mut WalkCtx<'_>, root: &str) {
    scan_dir(ctx, &with_trailing_slash(root));
}

fn scan_dir(ctx: &mut WalkCtx<'_>, dir_path: &str) {
    if ctx.should_break() {
        return;
    }

    let entries = match fs::read_dir(dir_path) {
        Ok(e) => e,
        Err(e) => {
            ctx.report_error(dir_path, &e.to_string());
            return;
        }
    };

    let dir: DirRef = dir_ref(dir_path);
    for entry in entries {
        if ctx.should_break() {
            break;
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                ctx.report_error(dir_path, &e.to_string());
                continue;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            ctx.report_error(dir_path, "entry name is not valid UTF-8");
            continue;
        };
        // `.`/`..` never show up in `read_dir`'s iteration, but a defensive
        // skip costs nothing and keeps this aligned with the walker this
        // is grounded on, which filters them explicitly.
        if name == "." || name == ".." {
            continue;
        }

        let full = format!("{dir_path}{name}");
        let meta = match fs::symlink_metadata(&full) {
            Ok(m) => m,
            Err(e) => {
                ctx.report_error(&full, &e.to_string());
                continue;
            }
        };
        classify(ctx, dir_path, &full, name, meta, &dir, 0);
    }
}

/// Classifies one directory entry, following at most one level of symlink
/// indirection. `depth` tracks how many times this entry has been
/// re-dispatched after resolving a symlink.
fn classify(
    ctx: &mut WalkCtx<'_>,
    dir_path: &str,
    full: &str,
    name: &str,
    meta: fs::Metadata,
    dir: &DirRef,
    depth: u8,
) {
    let ty = meta.file_type();

    if ty.is_symlink() {
        if depth >= 1 {
            // A symlink pointing at another symlink: inconclusive type,
            // skip rather than chase it further.
            return;
        }

        let target = match fs::read_link(full) {
            Ok(t) => t,
            Err(e) => {
                ctx.report_error(full, &e.to_string());
                return;
            }
        };
        let Some(target) = target.to_str() else {
            ctx.report_error(full, "symlink target is not valid UTF-8");
            return;
        };

        let joined = path_resolve::join(dir_path, target);
        let resolved = path_resolve::resolve(&joined);

        if ctx.scan_roots.iter().any(|root| is_under_root(root, &resolved)) {
            // Would double-count files already reachable via a scan root,
            // or loop back into this very tree. Drop the link.
            return;
        }

        let target_meta = match fs::symlink_metadata(&resolved) {
            Ok(m) => m,
            Err(e) => {
                ctx.report_error(&resolved, &e.to_string());
                return;
            }
        };
        classify(ctx, dir_path, full, name, target_meta, dir, depth + 1);
        return;
    }

    if ty.is_dir() {
        scan_dir(ctx, &with_trailing_slash(full));
        return;
    }

    if ty.is_file() {
        let size = meta.len();
        if !ctx.options.accepts(size) {
            return;
        }
        ctx.counters.file_count += 1;
        ctx.counters.file_size_total += size;
        if ctx.index.insert(dir.clone(), name.into(), size) {
            ctx.counters.candidate_set_count += 1;
        }
    }
    // Anything else (device, fifo, socket...) is silently ignored, same as
    // the walker this is grounded on.
}
