//! Applies replace-all changes to files on disk

use crate::engine::types::{Diff, FileChange};
use crate::error::RewriteError;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What happened to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileOutcome {
    pub applied: usize,
    pub skipped: usize,
}

/// Result for one changed file, keyed by its path as given in the change
pub type FileResult = (String, Result<FileOutcome, RewriteError>);

/// Apply every change, one file per task.
///
/// `threads` of 0 uses rayon's global pool.
pub fn apply_changes(root: &Path, changes: &[FileChange], threads: usize) -> Vec<FileResult> {
    let run = || {
        changes
            .par_iter()
            .map(|change| {
                let outcome = apply_file(&resolve(root, &change.file_path), &change.diffs);
                (change.file_path.clone(), outcome)
            })
            .collect::<Vec<_>>()
    };

    if threads == 0 {
        return run();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(run),
        Err(e) => {
            warn!("failed to build rewrite pool, using the global one: {}", e);
            run()
        }
    }
}

/// Rewrite one file in place
pub fn apply_file(path: &Path, diffs: &[Diff]) -> Result<FileOutcome, RewriteError> {
    let content = fs::read_to_string(path).map_err(|source| RewriteError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let (updated, outcome) = apply_diffs(&content, diffs);
    if outcome.applied > 0 {
        fs::write(path, updated).map_err(|source| RewriteError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    debug!(path = %path.display(), applied = outcome.applied, skipped = outcome.skipped, "rewrote file");
    Ok(outcome)
}

/// Apply diffs to `content` from the end backwards.
///
/// A diff is skipped when it falls outside the text, splits a character, or
/// overlaps a diff that was already applied.
pub fn apply_diffs(content: &str, diffs: &[Diff]) -> (String, FileOutcome) {
    let mut ordered: Vec<&Diff> = diffs.iter().collect();
    ordered.sort_by(|a, b| {
        b.range
            .byte_offset
            .start
            .cmp(&a.range.byte_offset.start)
            .then(b.range.byte_offset.end.cmp(&a.range.byte_offset.end))
    });

    let mut text = content.to_string();
    let mut outcome = FileOutcome::default();
    // Start of the lowest span written so far
    let mut floor = content.len();

    for diff in ordered {
        let span = diff.range.byte_offset;
        let valid = span.start <= span.end
            && span.end <= floor
            && text.is_char_boundary(span.start)
            && text.is_char_boundary(span.end);

        if !valid {
            warn!(
                start = span.start,
                end = span.end,
                "skipping replacement that overlaps another or falls outside the file"
            );
            outcome.skipped += 1;
            continue;
        }

        text.replace_range(span.start..span.end, &diff.replacement);
        floor = span.start;
        outcome.applied += 1;
    }

    (text, outcome)
}

fn resolve(root: &Path, file_path: &str) -> PathBuf {
    let path = Path::new(file_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Range;

    fn diff(start: usize, end: usize, replacement: &str) -> Diff {
        Diff {
            replacement: replacement.to_string(),
            range: Range::single_line(0, start as u32, end as u32, 0),
        }
    }

    #[test]
    fn test_apply_diffs_back_to_front() {
        let content = "t(I18N.a); t(I18N.b);";
        let (out, outcome) = apply_diffs(content, &[diff(2, 8, "'A'"), diff(13, 19, "'B'")]);
        assert_eq!(out, "t('A'); t('B');");
        assert_eq!(outcome, FileOutcome { applied: 2, skipped: 0 });
    }

    #[test]
    fn test_apply_diffs_skips_overlap() {
        let content = "abcdefgh";
        let (out, outcome) = apply_diffs(content, &[diff(2, 6, "X"), diff(4, 8, "Y")]);
        assert_eq!(out, "abcdY");
        assert_eq!(outcome, FileOutcome { applied: 1, skipped: 1 });
    }

    #[test]
    fn test_apply_diffs_skips_out_of_bounds() {
        let (out, outcome) = apply_diffs("short", &[diff(3, 40, "x")]);
        assert_eq!(out, "short");
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_apply_diffs_respects_char_boundaries() {
        // "确" is three bytes
        let (out, outcome) = apply_diffs("确定", &[diff(1, 3, "x")]);
        assert_eq!(out, "确定");
        assert_eq!(outcome.skipped, 1);

        let (out, _) = apply_diffs("确定", &[diff(3, 6, "认")]);
        assert_eq!(out, "确认");
    }

    #[test]
    fn test_apply_changes_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "x(I18N.ok)").unwrap();
        fs::write(dir.path().join("b.ts"), "y(I18N.ok)").unwrap();

        let changes = vec![
            FileChange {
                file_path: "a.ts".to_string(),
                diffs: vec![diff(2, 9, "'ok'")],
            },
            FileChange {
                file_path: "b.ts".to_string(),
                diffs: vec![diff(2, 9, "'fine'")],
            },
            FileChange {
                file_path: "missing.ts".to_string(),
                diffs: vec![diff(0, 1, "z")],
            },
        ];

        let results = apply_changes(dir.path(), &changes, 2);
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[2].1, Err(RewriteError::Read { .. })));

        assert_eq!(fs::read_to_string(dir.path().join("a.ts")).unwrap(), "x('ok')");
        assert_eq!(fs::read_to_string(dir.path().join("b.ts")).unwrap(), "y('fine')");
    }
}
