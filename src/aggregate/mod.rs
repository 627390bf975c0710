//! The grouped result set and the edits allowed on it
//!
//! - [`group`] - flat batch → key → file → records
//! - [`merge`] - fold grouped batches into the aggregate
//!
//! Every mutation restores the invariant that no key group and no file group
//! is empty.

pub mod group;
pub mod merge;

pub use group::group_by;
pub use merge::{merge, merge_with, sort_by_display_len, DuplicatePolicy};

use crate::engine::types::{Diff, FileChange, KeyGroup, MatchRecord};
use rustc_hash::FxHashMap;

/// Outcome of dismissing one record
#[derive(Debug, Clone, PartialEq)]
pub struct DismissedMatch {
    /// Diffs still pending in the file the record belonged to
    pub remaining_diffs: Vec<Diff>,
}

/// Ordered key groups for the active generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    groups: Vec<KeyGroup>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[KeyGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Total records across all groups
    pub fn match_count(&self) -> usize {
        self.groups.iter().map(KeyGroup::match_count).sum()
    }

    pub fn key_group(&self, key: &str) -> Option<&KeyGroup> {
        self.groups.iter().find(|g| g.key() == key)
    }

    /// Group a streamed batch and fold it in
    pub fn absorb(&mut self, batch: Vec<MatchRecord>, policy: DuplicatePolicy) {
        if batch.is_empty() {
            return;
        }
        let existing = std::mem::take(&mut self.groups);
        self.groups = merge_with(existing, group_by(batch), policy);
    }

    /// Remove the first record of `key` at the same location as `record`.
    ///
    /// Returns `None` when the key, file or record is no longer present.
    pub fn dismiss_match(&mut self, key: &str, record: &MatchRecord) -> Option<DismissedMatch> {
        let group = self.groups.iter_mut().find(|g| g.key() == key)?;
        let fi = group.files.iter().position(|f| f.file == record.file)?;
        let file = &mut group.files[fi];
        let ri = file.matches.iter().position(|m| m.same_location(record))?;

        file.matches.remove(ri);
        let remaining_diffs = file.diffs();
        if file.matches.is_empty() {
            group.files.remove(fi);
        }

        self.prune();
        Some(DismissedMatch { remaining_diffs })
    }

    /// Remove the file group for `file_path` under `key`. Returns whether anything changed.
    pub fn dismiss_file(&mut self, key: &str, file_path: &str) -> bool {
        let Some(group) = self.groups.iter_mut().find(|g| g.key() == key) else {
            return false;
        };
        let Some(fi) = group.files.iter().position(|f| f.file == file_path) else {
            return false;
        };

        group.files.remove(fi);
        self.prune();
        true
    }

    /// Replace the records of the first key group that lists `file_path`.
    ///
    /// An empty `records` list removes the file group. Returns whether the file
    /// was found.
    pub fn replace_file(&mut self, file_path: &str, records: Vec<MatchRecord>) -> bool {
        let found = self.groups.iter_mut().find_map(|g| {
            let fi = g.files.iter().position(|f| f.file == file_path)?;
            Some((g, fi))
        });
        let Some((group, fi)) = found else {
            return false;
        };

        if records.is_empty() {
            group.files.remove(fi);
        } else {
            group.files[fi].matches = records;
        }
        self.prune();
        true
    }

    /// Position of the first key group / file group listing `file_path`
    pub fn find_index(&self, file_path: &str) -> Option<(usize, usize)> {
        self.groups.iter().enumerate().find_map(|(gi, g)| {
            g.files
                .iter()
                .position(|f| f.file == file_path)
                .map(|fi| (gi, fi))
        })
    }

    /// Pending diffs of the first key group listing `file_path`
    pub fn file_diffs(&self, file_path: &str) -> Vec<Diff> {
        self.groups
            .iter()
            .find_map(|g| g.file(file_path))
            .map(|f| f.diffs())
            .unwrap_or_default()
    }

    /// Every pending replacement, one entry per file in first-seen order.
    ///
    /// A file listed under several keys yields a single entry carrying all of
    /// its diffs.
    pub fn collect_changes(&self) -> Vec<FileChange> {
        let mut changes: Vec<FileChange> = Vec::new();
        let mut by_file: FxHashMap<&str, usize> = FxHashMap::default();

        for group in &self.groups {
            for file in &group.files {
                let diffs = file.diffs();
                match by_file.get(file.file.as_str()) {
                    Some(&ci) => changes[ci].diffs.extend(diffs),
                    None => {
                        by_file.insert(file.file.as_str(), changes.len());
                        changes.push(FileChange {
                            file_path: file.file.clone(),
                            diffs,
                        });
                    }
                }
            }
        }

        changes.retain(|c| !c.diffs.is_empty());
        changes
    }

    /// Drop empty file groups, then empty key groups
    fn prune(&mut self) {
        for group in &mut self.groups {
            group.files.retain(|f| !f.matches.is_empty());
        }
        self.groups.retain(|g| !g.files.is_empty());
    }
}
