//! Batch grouping: flat match records to key → file → records

use crate::engine::types::{FileGroup, KeyGroup, MatchRecord};
use rustc_hash::FxHashMap;

/// Group a batch by owning key, then by file.
///
/// Keys, files and records keep their first-seen order. Runs in one pass over
/// the input; each key group carries the lang entry of its first record.
pub fn group_by(matches: Vec<MatchRecord>) -> Vec<KeyGroup> {
    let mut groups: Vec<KeyGroup> = Vec::new();
    let mut key_index: FxHashMap<String, usize> = FxHashMap::default();
    // (key group index, file path) -> file group index within that key group
    let mut file_index: FxHashMap<(usize, String), usize> = FxHashMap::default();

    for record in matches {
        let gi = match key_index.get(record.lang.key.as_str()) {
            Some(&gi) => gi,
            None => {
                let gi = groups.len();
                key_index.insert(record.lang.key.clone(), gi);
                groups.push(KeyGroup::new(record.lang.clone()));
                gi
            }
        };

        let group = &mut groups[gi];
        let fi = match file_index.get(&(gi, record.file.clone())) {
            Some(&fi) => fi,
            None => {
                let fi = group.files.len();
                file_index.insert((gi, record.file.clone()), fi);
                group.files.push(FileGroup::new(record.file.clone()));
                fi
            }
        };

        group.files[fi].matches.push(record);
    }

    groups
}
