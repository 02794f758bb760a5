use blocksync_dupe::{DupOptions, FileRef, Orchestrator, ReportSink};
use std::fs;
use std::sync::{Arc, Mutex};
use tempdir::TempDir;

#[derive(Default)]
struct CapturingSink {
    groups: Arc<Mutex<Vec<(u64, Vec<String>)>>>,
}

impl CapturingSink {
    fn new() -> (Self, Arc<Mutex<Vec<(u64, Vec<String>)>>>) {
        let groups = Arc::new(Mutex::new(Vec::new()));
        (CapturingSink { groups: groups.clone() }, groups)
    }
}

impl ReportSink for CapturingSink {
    fn duplicate_group(&mut self, files: &[&FileRef], size: u64) {
        let mut names: Vec<String> = files.iter().map(|f| f.name.to_string()).collect();
        names.sort();
        self.groups.lock().unwrap().push((size, names));
    }
}

fn run(roots: &[String], options: DupOptions) -> Vec<(u64, Vec<String>)> {
    let (sink, groups) = CapturingSink::new();
    let mut orch = Orchestrator::new();
    orch.options = options;
    orch.set_sink(Box::new(sink));
    for r in roots {
        orch.add_root(r);
    }
    orch.run().unwrap();
    let out = groups.lock().unwrap().clone();
    out
}

#[test]
fn scenario_one_odd_size_excluded() {
    let tmp = TempDir::new("e2e1").unwrap();
    fs::write(tmp.path().join("a"), b"xyz").unwrap();
    fs::write(tmp.path().join("b"), b"xyz").unwrap();
    fs::write(tmp.path().join("c"), b"xyzq").unwrap();
    let root = tmp.path().to_str().unwrap().to_owned();

    let groups = run(&[root], DupOptions::default());
    assert_eq!(groups, vec![(3, vec!["a".to_string(), "b".to_string()])]);
}

#[test]
fn scenario_one_odd_file_retired_on_first_block() {
    let tmp = TempDir::new("e2e2").unwrap();
    fs::write(tmp.path().join("a"), b"AAAA").unwrap();
    fs::write(tmp.path().join("b"), b"AAAB").unwrap();
    fs::write(tmp.path().join("c"), b"AAAA").unwrap();
    let root = tmp.path().to_str().unwrap().to_owned();

    let groups = run(&[root], DupOptions::default());
    assert_eq!(groups, vec![(4, vec!["a".to_string(), "c".to_string()])]);
}

#[test]
fn scenario_four_identical_large_files() {
    let tmp = TempDir::new("e2e3").unwrap();
    let content = vec![0x5au8; 200_000];
    for n in ["a", "b", "c", "d"] {
        fs::write(tmp.path().join(n), &content).unwrap();
    }
    let root = tmp.path().to_str().unwrap().to_owned();

    let groups = run(&[root], DupOptions::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].0, 200_000);
    assert_eq!(groups[0].1, vec!["a", "b", "c", "d"]);
}

#[test]
fn scenario_self_symlink_does_not_duplicate_count() {
    let tmp = TempDir::new("e2e4").unwrap();
    fs::write(tmp.path().join("f"), b"hi").unwrap();
    std::os::unix::fs::symlink(tmp.path(), tmp.path().join("link")).unwrap();
    let root = tmp.path().to_str().unwrap().to_owned();

    let (sink, _) = CapturingSink::new();
    let mut orch = Orchestrator::new();
    orch.set_sink(Box::new(sink));
    orch.add_root(&root);
    orch.run().unwrap();
    assert_eq!(orch.counters().file_count, 1);
}

#[test]
fn scenario_cross_root_duplicate() {
    let r1 = TempDir::new("e2e5a").unwrap();
    let r2 = TempDir::new("e2e5b").unwrap();
    fs::write(r1.path().join("x"), b"data").unwrap();
    fs::write(r2.path().join("x"), b"data").unwrap();

    let groups = run(
        &[r1.path().to_str().unwrap().to_owned(), r2.path().to_str().unwrap().to_owned()],
        DupOptions::default(),
    );
    assert_eq!(groups, vec![(4, vec!["x".to_string(), "x".to_string()])]);
}

#[test]
fn scenario_size_eq_filter() {
    let tmp = TempDir::new("e2e6").unwrap();
    fs::write(tmp.path().join("four"), b"abcd").unwrap();
    fs::write(tmp.path().join("five_a"), b"abcde").unwrap();
    fs::write(tmp.path().join("five_b"), b"abcde").unwrap();
    fs::write(tmp.path().join("six"), b"abcdef").unwrap();
    let root = tmp.path().to_str().unwrap().to_owned();

    let groups = run(&[root], DupOptions { size_eq: 5, ..Default::default() });
    assert_eq!(groups, vec![(5, vec!["five_a".to_string(), "five_b".to_string()])]);
}

#[test]
fn running_twice_over_unchanged_tree_yields_identical_groups() {
    let tmp = TempDir::new("e2e7").unwrap();
    fs::write(tmp.path().join("a"), b"same").unwrap();
    fs::write(tmp.path().join("b"), b"same").unwrap();
    let root = tmp.path().to_str().unwrap().to_owned();

    let first = run(&[root.clone()], DupOptions::default());
    let second = run(&[root], DupOptions::default());
    assert_eq!(first, second);
}

#[test]
fn empty_files_never_appear_in_a_group() {
    let tmp = TempDir::new("e2e8").unwrap();
    fs::write(tmp.path().join("a"), b"").unwrap();
    fs::write(tmp.path().join("b"), b"").unwrap();
    let root = tmp.path().to_str().unwrap().to_owned();

    let groups = run(&[root], DupOptions::default());
    assert!(groups.is_empty());
}

#[test]
fn unreadable_root_is_reported_and_skipped_not_fatal() {
    let mut orch = Orchestrator::new();
    orch.add_root("/this/path/does/not/exist/hopefully");
    assert!(orch.scan_roots().is_empty());
    assert_eq!(orch.counters().scan_errors, 1);
    assert!(orch.run().is_ok());
}
