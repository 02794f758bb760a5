//! Size-keyed candidate-set builder.
//!
//! Groups scanned files by exact byte size. A size class with at least
//! two members is a *candidate set*: a set of files the deep comparator
//! must actually look at.

use crate::fileref::{DirRef, FileRef};
use std::collections::BTreeMap;

/// Size-based filters recognized by the walker. `0` disables a filter.
#[derive(Debug, Default, Clone, Copy)]
pub struct DupOptions {
    /// Only files of exactly this size.
    pub size_eq: u64,
    /// Strictly greater than this size.
    pub size_min: u64,
    /// Strictly less than this size.
    pub size_max: u64,
}

impl DupOptions {
    /// Whether a file of the given size passes these filters. Empty files
    /// are never passed; callers should reject size `0` before consulting
    /// this (size is unconditional, independent of any configured filter).
    pub fn accepts(&self, size: u64) -> bool {
        if size == 0 {
            return false;
        }
        if self.size_eq != 0 && size != self.size_eq {
            return false;
        }
        if self.size_min != 0 && size <= self.size_min {
            return false;
        }
        if self.size_max != 0 && size >= self.size_max {
            return false;
        }
        true
    }
}

/// Owns the arena of scanned [`FileRef`]s and the `size -> head` map.
///
/// The classic implementation of this structure is an intrusive linked
/// list threaded directly through file records with raw pointers; this
/// version gets the same cheap-insert-at-head, cheap-iterate shape from a
/// flat `Vec` arena addressed by `u32` index, with no `unsafe` code.
#[derive(Debug, Default)]
pub struct SizeIndex {
    arena: Vec<FileRef>,
    classes: BTreeMap<u64, u32>,
}

impl SizeIndex {
    pub fn new() -> Self {
        SizeIndex { arena: Vec::new(), classes: BTreeMap::new() }
    }

    /// Inserts a new file into its size class, splicing it at the head of
    /// that class's list. Returns `true` if this insertion turned a
    /// previously-singleton class into a candidate set (i.e. the caller
    /// should bump `candidate_set_count`).
    pub fn insert(&mut self, dir: DirRef, name: Box<str>, size: u64) -> bool {
        let idx = self.arena.len() as u32;
        let mut file = FileRef::new(dir, name, size);

        match self.classes.get(&size).copied() {
            None => {
                self.arena.push(file);
                self.classes.insert(size, idx);
                false
            }
            Some(head) => {
                let became_candidate = self.arena[head as usize].next.is_none();
                file.next = Some(head);
                self.arena.push(file);
                self.classes.insert(size, idx);
                became_candidate
            }
        }
    }

    /// Drops every size class with only one member, leaving exactly the
    /// candidate sets behind. The culled `FileRef`s themselves stay in the
    /// arena (reclaimed together when the index itself is dropped) rather
    /// than being individually removed, since the arena's indices must
    /// stay valid for the classes that remain.
    pub fn cull_singletons(&mut self) {
        self.classes.retain(|_, &mut head| self.arena[head as usize].next.is_some());
    }

    /// Number of remaining size classes; valid after [`cull_singletons`](Self::cull_singletons).
    pub fn candidate_set_count(&self) -> u64 {
        self.classes.len() as u64
    }

    /// Iterates candidate sets in ascending size order, each as
    /// `(size, files)` with files in most-recently-scanned-first order
    /// (the order the intrusive list naturally yields).
    pub fn candidate_sets(&self) -> impl Iterator<Item = (u64, Vec<&FileRef>)> {
        self.classes.iter().map(move |(&size, &head)| {
            let mut files = Vec::new();
            let mut cur = Some(head);
            while let Some(i) = cur {
                let f = &self.arena[i as usize];
                files.push(f);
                cur = f.next;
            }
            (size, files)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileref::dir_ref;

    #[test]
    fn accepts_respects_all_filters() {
        let opt = DupOptions { size_eq: 0, size_min: 0, size_max: 0 };
        assert!(!opt.accepts(0));
        assert!(opt.accepts(5));

        let eq = DupOptions { size_eq: 5, size_min: 0, size_max: 0 };
        assert!(eq.accepts(5));
        assert!(!eq.accepts(4));

        let min = DupOptions { size_eq: 0, size_min: 5, size_max: 0 };
        assert!(!min.accepts(5));
        assert!(min.accepts(6));

        let max = DupOptions { size_eq: 0, size_min: 0, size_max: 5 };
        assert!(!max.accepts(5));
        assert!(max.accepts(4));
    }

    #[test]
    fn singleton_classes_are_culled() {
        let mut idx = SizeIndex::new();
        let d = dir_ref("/r");
        idx.insert(d.clone(), "a".into(), 3);
        idx.insert(d.clone(), "b".into(), 4);
        idx.cull_singletons();
        assert_eq!(idx.candidate_set_count(), 0);
    }

    #[test]
    fn pairs_survive_culling() {
        let mut idx = SizeIndex::new();
        let d = dir_ref("/r");
        let became_candidate_1 = idx.insert(d.clone(), "a".into(), 3);
        let became_candidate_2 = idx.insert(d.clone(), "b".into(), 3);
        assert!(!became_candidate_1);
        assert!(became_candidate_2);
        idx.insert(d.clone(), "c".into(), 9);
        idx.cull_singletons();
        assert_eq!(idx.candidate_set_count(), 1);
        let sets: Vec<_> = idx.candidate_sets().collect();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].0, 3);
        assert_eq!(sets[0].1.len(), 2);
    }
}
