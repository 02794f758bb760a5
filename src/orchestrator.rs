//! Drives scanning then comparison, aggregates counters, and talks to the
//! configured [`ReportSink`].

use crate::comparator::compare_candidate_set;
use crate::fileref::FileRef;
use crate::path_resolve;
use crate::sink::{ReportSink, SilentSink};
use crate::size_index::{DupOptions, SizeIndex};
use crate::walker::{walk_root, WalkCtx};
use std::fmt::Debug;
use std::io;
use std::sync::atomic::AtomicU32;
use std::time::{Duration, Instant};

/// Running totals the orchestrator maintains across a scan and compare
/// pass.
#[derive(Debug, Default, Clone, Copy)]
#[cfg_attr(feature = "json", derive(serde_derive::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
pub struct Counters {
    pub file_count: u64,
    pub file_size_total: u64,
    pub candidate_set_count: u64,
    pub dupe_file_count: u64,
    pub dupe_set_count: u64,
    pub scan_errors: u64,
}

/// Resolves a root directory argument (absolute or relative to the
/// process's current directory) into an absolute, `.`/`..`-free path, the
/// way this is grounded on `AddDirectoryTree` in the original program:
/// no symlink dereferencing here, purely string resolution, followed by a
/// directory-existence check.
fn register_root(raw: &str) -> io::Result<String> {
    let absolute = if raw.starts_with('/') {
        raw.to_owned()
    } else {
        let cwd = std::env::current_dir()?;
        let cwd = cwd.to_str().ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "current directory is not valid UTF-8"))?;
        path_resolve::join(cwd, raw)
    };
    let resolved = path_resolve::resolve(&absolute);

    let meta = std::fs::metadata(&resolved)?;
    if !meta.is_dir() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("{resolved} is not a directory")));
    }
    Ok(resolved)
}

/// Owns the scan-root registry, the size index, the run's counters, and
/// the sink that duplicate groups and errors are reported through.
pub struct Orchestrator {
    index: SizeIndex,
    scan_roots: Vec<String>,
    counters: Counters,
    pub options: DupOptions,
    sink: Box<dyn ReportSink>,
    /// Cooperative break flag, set from outside (typically a `ctrlc`
    /// handler). `0` = keep going, `1` = stop after the current candidate
    /// set, `>=2` = stop immediately.
    pub break_flag: Option<&'static AtomicU32>,
}

impl Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("scan_roots", &self.scan_roots)
            .field("counters", &self.counters)
            .field("options", &self.options)
            .finish()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Orchestrator {
            index: SizeIndex::new(),
            scan_roots: Vec::new(),
            counters: Counters::default(),
            options: DupOptions::default(),
            sink: Box::new(SilentSink),
            break_flag: None,
        }
    }

    /// Overrides the previously set listener. Caution: only one sink is
    /// active at a time; compose a multiplexing sink if more than one
    /// destination is needed.
    pub fn set_sink(&mut self, sink: Box<dyn ReportSink>) {
        self.sink = sink;
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn scan_roots(&self) -> &[String] {
        &self.scan_roots
    }

    /// Registers and canonicalizes a scan root. A root that doesn't exist
    /// or isn't a directory is reported to the error sink and otherwise
    /// ignored — the spec treats this as a per-root fatal, not a process
    /// abort.
    pub fn add_root(&mut self, path: &str) {
        match register_root(path) {
            Ok(resolved) => self.scan_roots.push(resolved),
            Err(e) => {
                self.counters.scan_errors += 1;
                self.sink.scan_error(path, &e.to_string());
            }
        }
    }

    /// Walks every registered root, culls singleton size classes, then
    /// runs the deep comparator over each remaining candidate set.
    /// Returns a fatal error only if the comparator hits one — an
    /// unreadable directory or file along the way is reported to the
    /// error sink and does not stop the run.
    pub fn run(&mut self) -> io::Result<()> {
        let start = Instant::now();
        self.sink.scan_started();

        let roots = self.scan_roots.clone();
        for root in &roots {
            let sink = &mut self.sink;
            let counters = &mut self.counters;
            let mut error_adapter = |path: &str, reason: &str| sink.scan_error(path, reason);
            let mut ctx = WalkCtx {
                index: &mut self.index,
                options: &self.options,
                scan_roots: &roots,
                counters,
                error_sink: &mut error_adapter,
                break_flag: self.break_flag,
            };
            walk_root(&mut ctx, root);
        }
        self.index.cull_singletons();
        self.counters.candidate_set_count = self.index.candidate_set_count();

        let result = self.compare_all();
        let duration = Instant::now().duration_since(start);
        self.sink.scan_finished(&self.counters, duration);
        result
    }

    fn compare_all(&mut self) -> io::Result<()> {
        let sets: Vec<(u64, Vec<&FileRef>)> = self.index.candidate_sets().collect();
        for (size, files) in sets {
            let sink = &mut self.sink;
            let counters = &mut self.counters;
            compare_candidate_set(&files, size, |group, group_size| {
                counters.dupe_set_count += 1;
                counters.dupe_file_count += group.len() as u64;
                sink.duplicate_group(group, group_size);
            })?;
            if self.break_flag.map_or(false, |f| f.load(std::sync::atomic::Ordering::SeqCst) > 1) {
                break;
            }
        }
        Ok(())
    }

    /// Total elapsed wall time since the last [`run`](Self::run) call
    /// would be tracked by the caller via `scan_finished`; this accessor
    /// is provided for callers that only need the latest counters without
    /// re-deriving duration. Not used by the default sinks.
    pub fn elapsed_since(&self, start: Instant) -> Duration {
        Instant::now().duration_since(start)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
