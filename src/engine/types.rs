//! Core data types shared by the grouping, merge and mutation layers

use serde::{Deserialize, Serialize};

/// A 0-based line/column position inside a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Absolute byte offsets of a span, counted from the start of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteSpan {
    pub start: usize,
    pub end: usize,
}

/// Located span of a match.
///
/// Line/column positions and byte offsets describe the same span; consumers
/// pick whichever is convenient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub start: Position,
    pub end: Position,
    pub byte_offset: ByteSpan,
}

impl Range {
    /// Build a range that starts and ends on the same line.
    ///
    /// `line_offset` is the absolute byte offset of the first byte of the line,
    /// so both representations stay in sync.
    pub fn single_line(line: u32, start_column: u32, end_column: u32, line_offset: usize) -> Self {
        Self {
            start: Position { line, column: start_column },
            end: Position { line, column: end_column },
            byte_offset: ByteSpan {
                start: line_offset + start_column as usize,
                end: line_offset + end_column as usize,
            },
        }
    }

    /// End is not before start in either representation
    pub fn is_well_formed(&self) -> bool {
        self.end >= self.start && self.byte_offset.end >= self.byte_offset.start
    }

    /// Number of lines the span covers beyond the first; 0 when end precedes start
    pub fn line_span(&self) -> u32 {
        self.end.line.saturating_sub(self.start.line)
    }
}

/// Identity of an i18n entry: the lookup key and its translation text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LangEntry {
    pub key: String,
    pub value: String,
}

impl LangEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Length used to order key groups (shorter translations first)
    pub fn display_len(&self) -> usize {
        self.value.chars().count()
    }
}

/// One located occurrence of a key in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub lang: LangEntry,
    pub file: String,
    pub range: Range,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Full text of the matched line(s), for rendering
    #[serde(default)]
    pub lines: String,
    /// Language tag derived from the file extension
    #[serde(default)]
    pub language: String,
}

impl MatchRecord {
    pub fn new(lang: LangEntry, file: impl Into<String>, range: Range) -> Self {
        Self {
            lang,
            file: file.into(),
            range,
            replacement: None,
            lines: String::new(),
            language: String::new(),
        }
    }

    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    pub fn with_lines(mut self, lines: impl Into<String>) -> Self {
        self.lines = lines.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Identity used by dismissal: owning key, file and range
    pub fn same_location(&self, other: &MatchRecord) -> bool {
        self.lang.key == other.lang.key && self.file == other.file && self.range == other.range
    }

    /// The edit this record proposes, if the query carried a rewrite
    pub fn diff(&self) -> Option<Diff> {
        self.replacement.as_ref().map(|replacement| Diff {
            replacement: replacement.clone(),
            range: self.range,
        })
    }
}

/// Records of one key inside one file, in discovery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGroup {
    pub file: String,
    pub matches: Vec<MatchRecord>,
}

impl FileGroup {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            matches: Vec::new(),
        }
    }

    /// Replacement edits proposed for this file
    pub fn diffs(&self) -> Vec<Diff> {
        self.matches.iter().filter_map(MatchRecord::diff).collect()
    }
}

/// All file groups found for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGroup {
    pub lang: LangEntry,
    pub files: Vec<FileGroup>,
}

impl KeyGroup {
    pub fn new(lang: LangEntry) -> Self {
        Self {
            lang,
            files: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.lang.key
    }

    pub fn display_len(&self) -> usize {
        self.lang.display_len()
    }

    pub fn file(&self, path: &str) -> Option<&FileGroup> {
        self.files.iter().find(|f| f.file == path)
    }

    /// Total records across all files
    pub fn match_count(&self) -> usize {
        self.files.iter().map(|f| f.matches.len()).sum()
    }
}

/// A single replacement edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub replacement: String,
    pub range: Range,
}

/// Edits destined for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub file_path: String,
    pub diffs: Vec<Diff>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_range_keeps_offsets_in_sync() {
        let range = Range::single_line(4, 10, 25, 300);
        assert_eq!(range.start, Position { line: 4, column: 10 });
        assert_eq!(range.end, Position { line: 4, column: 25 });
        assert_eq!(range.byte_offset.start, 310);
        assert_eq!(range.byte_offset.end, 325);
        assert!(range.is_well_formed());
        assert_eq!(range.line_span(), 0);
    }

    #[test]
    fn test_backwards_range_is_not_well_formed() {
        let mut range = Range::single_line(1, 5, 9, 0);
        range.end = Position { line: 0, column: 2 };
        assert!(!range.is_well_formed());
        assert_eq!(range.line_span(), 0);
    }

    #[test]
    fn test_display_len_counts_chars() {
        assert_eq!(LangEntry::new("k", "你好").display_len(), 2);
        assert_eq!(LangEntry::new("k", "hello").display_len(), 5);
    }

    #[test]
    fn test_same_location_ignores_replacement() {
        let lang = LangEntry::new("I18N.a", "A");
        let range = Range::single_line(0, 0, 6, 0);
        let a = MatchRecord::new(lang.clone(), "a.ts", range);
        let b = MatchRecord::new(lang, "a.ts", range).with_replacement("x");
        assert!(a.same_location(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_file_group_diffs_skip_records_without_replacement() {
        let lang = LangEntry::new("I18N.a", "A");
        let mut group = FileGroup::new("a.ts");
        group
            .matches
            .push(MatchRecord::new(lang.clone(), "a.ts", Range::single_line(0, 0, 6, 0)));
        group.matches.push(
            MatchRecord::new(lang, "a.ts", Range::single_line(1, 0, 6, 7)).with_replacement("B"),
        );

        let diffs = group.diffs();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].replacement, "B");
        assert_eq!(diffs[0].range.start.line, 1);
    }

    #[test]
    fn test_record_json_shape() {
        let record = MatchRecord::new(
            LangEntry::new("I18N.common.ok", "确定"),
            "src/a.ts",
            Range::single_line(2, 4, 18, 40),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["lang"]["key"], "I18N.common.ok");
        assert_eq!(json["range"]["byteOffset"]["start"], 44);
        assert!(json.get("replacement").is_none());
    }
}
