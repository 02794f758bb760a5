//! Where results go: the [`ReportSink`] trait and its stock implementations.

use crate::fileref::FileRef;
use crate::orchestrator::Counters;
use std::time::Duration;

/// Receives duplicate groups and scan errors as the orchestrator finds
/// them, plus lifecycle hooks bracketing the run. All methods have no-op
/// default bodies so a sink only needs to implement what it cares about.
pub trait ReportSink {
    fn scan_started(&mut self) {}

    /// One group of two or more byte-identical files, all of `size` bytes.
    fn duplicate_group(&mut self, files: &[&FileRef], size: u64) {
        let _ = (files, size);
    }

    /// A non-fatal problem (unreadable entry, bad symlink, ...). Returning
    /// `false` has no effect on the current orchestrator, which always
    /// continues past per-entry errors; the return value exists so a sink
    /// embedded in an interactive front end can signal "stop asking me".
    fn scan_error(&mut self, path: &str, reason: &str) -> bool {
        let _ = (path, reason);
        true
    }

    fn scan_finished(&mut self, counters: &Counters, duration: Duration) {
        let _ = (counters, duration);
    }
}

/// Discards everything. Used as the orchestrator's default sink so library
/// callers that only want the return-value-free counters aren't forced to
/// wire one up.
pub struct SilentSink;

impl ReportSink for SilentSink {}

/// Human-readable console output: a throttled one-line-per-directory
/// progress indicator while scanning, duplicate groups printed as they're
/// found, and a summary line at the end.
pub struct TextReportSink {
    interactive: bool,
    groups_found: u64,
}

impl TextReportSink {
    /// `interactive` controls whether a "scanning..." line is printed up
    /// front; batch mode (`-b`) stays silent until there's something to
    /// report.
    pub fn new(interactive: bool) -> Self {
        TextReportSink { interactive, groups_found: 0 }
    }
}

impl Default for TextReportSink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ReportSink for TextReportSink {
    fn scan_started(&mut self) {
        if self.interactive {
            println!("scanning...");
        }
    }

    fn duplicate_group(&mut self, files: &[&FileRef], size: u64) {
        self.groups_found += 1;
        let mut paths: Vec<String> = files.iter().map(|f| f.full_path()).collect();
        paths.sort();
        if let Some((first, rest)) = paths.split_first() {
            println!("{size} bytes, {} copies:", paths.len());
            println!("  {first}");
            for p in rest {
                println!("  {}", combined_paths(first, p));
            }
        }
    }

    fn scan_error(&mut self, path: &str, reason: &str) -> bool {
        eprintln!("error: {path}: {reason}");
        true
    }

    fn scan_finished(&mut self, counters: &Counters, duration: Duration) {
        let nice_duration = nice_duration(duration);
        println!(
            "{} duplicate sets ({} files) found among {} files ({} bytes) scanned in {nice_duration}. {} errors.",
            self.groups_found, counters.dupe_file_count, counters.file_count, counters.file_size_total, counters.scan_errors
        );
    }
}

fn nice_duration(d: Duration) -> String {
    match d.as_secs() {
        0..=5 => format!("{:.1}s", d.as_secs_f64()),
        6..=59 => format!("{}s", d.as_secs()),
        s => format!("{}m{}s", s / 60, s % 60),
    }
}

/// Renders `b` relative to `a` by collapsing the path segments the two
/// share into a `{from => to}` marker, the way differing members of the
/// same duplicate group usually share a long common prefix and/or suffix.
fn combined_paths(a: &str, b: &str) -> String {
    let a_parts: Vec<&str> = a.split('/').collect();
    let b_parts: Vec<&str> = b.split('/').collect();

    let prefix_len = a_parts.iter().zip(b_parts.iter()).take_while(|(x, y)| x == y).count();

    let a_rest = &a_parts[prefix_len..];
    let b_rest = &b_parts[prefix_len..];

    let suffix_len = a_rest
        .iter()
        .rev()
        .zip(b_rest.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
        .min(a_rest.len().saturating_sub(1))
        .min(b_rest.len().saturating_sub(1));

    let a_unique = &a_rest[..a_rest.len() - suffix_len];
    let b_unique = &b_rest[..b_rest.len() - suffix_len];

    let mut out = String::new();
    if prefix_len > 0 {
        out.push_str(&a_parts[..prefix_len].join("/"));
        out.push('/');
    }
    out.push('{');
    out.push_str(&a_unique.join("/"));
    out.push_str(" => ");
    out.push_str(&b_unique.join("/"));
    out.push('}');
    if suffix_len > 0 {
        out.push('/');
        out.push_str(&a_rest[a_rest.len() - suffix_len..].join("/"));
    }
    out
}

#[cfg(feature = "json")]
pub use json_sink::JsonReportSink;

#[cfg(feature = "json")]
mod json_sink {
    use super::*;
    use serde_derive::Serialize;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct JsonReport {
        creator: String,
        duplicate_groups: Vec<JsonGroup>,
        errors: Vec<JsonError>,
        counters: Counters,
        scan_duration: Duration,
    }

    #[derive(Serialize)]
    struct JsonGroup {
        size: u64,
        paths: Vec<String>,
    }

    #[derive(Serialize)]
    struct JsonError {
        path: String,
        reason: String,
    }

    /// Buffers every duplicate group and error in memory and emits a
    /// single pretty-printed JSON document at `scan_finished`, the way a
    /// structured-output sink has to: a partial document on stdout isn't
    /// valid JSON.
    #[derive(Default)]
    pub struct JsonReportSink {
        groups: Vec<JsonGroup>,
        errors: Vec<JsonError>,
    }

    impl JsonReportSink {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl ReportSink for JsonReportSink {
        fn duplicate_group(&mut self, files: &[&FileRef], size: u64) {
            let mut paths: Vec<String> = files.iter().map(|f| f.full_path()).collect();
            paths.sort();
            self.groups.push(JsonGroup { size, paths });
        }

        fn scan_error(&mut self, path: &str, reason: &str) -> bool {
            self.errors.push(JsonError { path: path.to_owned(), reason: reason.to_owned() });
            true
        }

        fn scan_finished(&mut self, counters: &Counters, duration: Duration) {
            let report = JsonReport {
                creator: format!("blocksync-dupe {}", env!("CARGO_PKG_VERSION")),
                duplicate_groups: std::mem::take(&mut self.groups),
                errors: std::mem::take(&mut self.errors),
                counters: *counters,
                scan_duration: duration,
            };
            match serde_json::to_string_pretty(&report) {
                Ok(s) => println!("{s}"),
                Err(e) => eprintln!("error: failed to serialize report: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_paths_collapses_shared_prefix() {
        assert_eq!(combined_paths("foo/bar/baz/a.txt", "foo/baz/quz/zzz/a.txt"), "foo/{bar/baz => baz/quz/zzz}/a.txt");
    }

    #[test]
    fn combined_paths_collapses_shared_suffix_only() {
        assert_eq!(combined_paths("foo/baz/quz/zzz/b.txt", "foo/baz/quz/zzz/a.txt"), "foo/baz/quz/zzz/{b.txt => a.txt}");
    }

    #[test]
    fn combined_paths_no_shared_components() {
        assert_eq!(combined_paths("b.txt", "e.txt"), "{b.txt => e.txt}");
    }
}
