//! Folding grouped batches into the running aggregate

use crate::engine::types::{FileGroup, KeyGroup, MatchRecord, Range};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// What to do with a record whose key, file and range are already present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Concatenate as-is; the same location may appear more than once
    #[default]
    Keep,
    /// Drop records whose location is already in the file group
    Suppress,
}

/// Merge `incoming` into `existing` keeping duplicates.
pub fn merge(existing: Vec<KeyGroup>, incoming: Vec<KeyGroup>) -> Vec<KeyGroup> {
    merge_with(existing, incoming, DuplicatePolicy::Keep)
}

/// Merge `incoming` into `existing`.
///
/// Shared keys union their files; shared files concatenate records with the
/// incoming ones after the existing ones. Unknown keys are appended. The
/// result is stable-sorted by display value length, shortest first.
pub fn merge_with(
    mut existing: Vec<KeyGroup>,
    incoming: Vec<KeyGroup>,
    policy: DuplicatePolicy,
) -> Vec<KeyGroup> {
    if incoming.is_empty() {
        return existing;
    }

    let mut key_index: FxHashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, g)| (g.lang.key.clone(), i))
        .collect();

    for mut group in incoming {
        match key_index.get(group.lang.key.as_str()) {
            Some(&gi) => union_files(&mut existing[gi], group.files, policy),
            None => {
                if policy == DuplicatePolicy::Suppress {
                    for file in &mut group.files {
                        dedup_records(&mut file.matches);
                    }
                }
                key_index.insert(group.lang.key.clone(), existing.len());
                existing.push(group);
            }
        }
    }

    sort_by_display_len(&mut existing);
    existing
}

/// Stable sort, shortest translation first
pub fn sort_by_display_len(groups: &mut [KeyGroup]) {
    groups.sort_by_key(KeyGroup::display_len);
}

fn union_files(target: &mut KeyGroup, files: Vec<FileGroup>, policy: DuplicatePolicy) {
    let mut file_index: FxHashMap<String, usize> = target
        .files
        .iter()
        .enumerate()
        .map(|(i, f)| (f.file.clone(), i))
        .collect();

    for file in files {
        match file_index.get(file.file.as_str()) {
            Some(&fi) => {
                let records = &mut target.files[fi].matches;
                match policy {
                    DuplicatePolicy::Keep => records.extend(file.matches),
                    DuplicatePolicy::Suppress => {
                        let mut seen: FxHashSet<Range> = records.iter().map(|m| m.range).collect();
                        records.extend(
                            file.matches
                                .into_iter()
                                .filter(|m| seen.insert(m.range)),
                        );
                    }
                }
            }
            None => {
                let mut file = file;
                if policy == DuplicatePolicy::Suppress {
                    dedup_records(&mut file.matches);
                }
                file_index.insert(file.file.clone(), target.files.len());
                target.files.push(file);
            }
        }
    }
}

/// Keep the first record of each range. Records of one file group share key and file.
fn dedup_records(records: &mut Vec<MatchRecord>) {
    let mut seen: FxHashSet<Range> = FxHashSet::default();
    records.retain(|m| seen.insert(m.range));
}
