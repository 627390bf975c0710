//! Parsing of `rg --json` output into match records
//!
//! Only `match` messages carry results; `begin`, `end`, `context` and
//! `summary` messages are recognised and ignored. Lines that fail to parse are
//! reported to the caller, which logs and skips them.

use crate::engine::types::{LangEntry, MatchRecord, Range};
use crate::matcher::locale::LocaleDictionary;
use memchr::memchr;
use serde::Deserialize;
use std::path::Path;

/// Text field of a ripgrep message. Non UTF-8 data arrives as `bytes` and is skipped.
#[derive(Debug, Deserialize)]
pub struct RgText {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RgSubmatch {
    #[serde(rename = "match")]
    pub matched: RgText,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Deserialize)]
pub struct RgMatch {
    pub path: RgText,
    pub lines: RgText,
    pub line_number: Option<u32>,
    pub absolute_offset: usize,
    pub submatches: Vec<RgSubmatch>,
}

/// One line of `rg --json` output
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RgMessage {
    Match(RgMatch),
    Begin(serde_json::Value),
    End(serde_json::Value),
    Context(serde_json::Value),
    Summary(serde_json::Value),
}

/// Everything needed to turn a ripgrep match into records
pub struct RecordContext<'a> {
    pub dictionary: &'a LocaleDictionary,
    /// Prefix in front of dictionary keys in source code, e.g. `I18N.`
    pub key_prefix: &'a str,
    /// Replacement for every record when the query carries a rewrite
    pub replacement: Option<&'a str>,
}

impl RecordContext<'_> {
    /// Parse one output line. `Ok(vec![])` for non-match messages.
    pub fn parse_line(&self, line: &[u8]) -> Result<Vec<MatchRecord>, serde_json::Error> {
        match serde_json::from_slice::<RgMessage>(line)? {
            RgMessage::Match(m) => Ok(self.records_for(m)),
            _ => Ok(Vec::new()),
        }
    }

    /// One record per submatch on the line
    pub fn records_for(&self, m: RgMatch) -> Vec<MatchRecord> {
        let (Some(file), Some(line_text)) = (m.path.text, m.lines.text) else {
            return Vec::new();
        };
        // rg counts lines from 1
        let line = m.line_number.unwrap_or(1).saturating_sub(1);
        let language = file_language(&file);

        m.submatches
            .into_iter()
            .filter_map(|sub| {
                let text = sub.matched.text?;
                if sub.end < sub.start {
                    return None;
                }
                let lookup = text.strip_prefix(self.key_prefix).unwrap_or(&text);
                let value = self.dictionary.get(lookup).unwrap_or_default().to_string();
                let range = Range::single_line(line, sub.start, sub.end, m.absolute_offset);

                let mut record = MatchRecord::new(LangEntry::new(text, value), file.clone(), range)
                    .with_lines(line_text.clone())
                    .with_language(language);
                if let Some(replacement) = self.replacement {
                    record = record.with_replacement(replacement);
                }
                Some(record)
            })
            .collect()
    }
}

/// Splits a byte stream into complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed (without the newline)
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = memchr(b'\n', &self.buf[start..]) {
            let end = start + pos;
            let line = &self.buf[start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if !line.iter().all(u8::is_ascii_whitespace) {
                lines.push(line.to_vec());
            }
            start = end + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Whatever is left once the stream ends
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let rest = std::mem::take(&mut self.buf);
        if rest.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(rest)
        }
    }
}

/// Language tag from the file extension
pub fn file_language(file: &str) -> &'static str {
    let ext = Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "ts" => "typescript",
        "tsx" => "tsx",
        "js" | "jsx" => "javascript",
        "vue" => "vue",
        "html" => "html",
        "css" | "scss" | "sass" | "less" => "css",
        "json" => "json",
        "md" => "markdown",
        "py" => "python",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "cs" => "csharp",
        "go" => "go",
        "rs" => "rust",
        "php" => "php",
        "rb" => "ruby",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "lua" => "lua",
        "yaml" | "yml" => "yaml",
        "xml" => "xml",
        "sh" | "bash" => "bash",
        _ => "plaintext",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATCH_LINE: &str = r#"{"type":"match","data":{"path":{"text":"src/a.ts"},"lines":{"text":"  t(I18N.common.ok); t(I18N.hello)\n"},"line_number":3,"absolute_offset":120,"submatches":[{"match":{"text":"I18N.common.ok"},"start":4,"end":18},{"match":{"text":"I18N.hello"},"start":23,"end":33}]}}"#;

    fn dictionary() -> LocaleDictionary {
        LocaleDictionary::from_entries([("common.ok", "确定"), ("hello", "你好")])
    }

    #[test]
    fn test_parse_match_line() {
        let dict = dictionary();
        let ctx = RecordContext {
            dictionary: &dict,
            key_prefix: "I18N.",
            replacement: None,
        };
        let records = ctx.parse_line(MATCH_LINE.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.lang.key, "I18N.common.ok");
        assert_eq!(first.lang.value, "确定");
        assert_eq!(first.file, "src/a.ts");
        assert_eq!(first.language, "typescript");
        assert_eq!(first.range.start.line, 2);
        assert_eq!(first.range.start.column, 4);
        assert_eq!(first.range.end.column, 18);
        assert_eq!(first.range.byte_offset.start, 124);
        assert_eq!(first.range.byte_offset.end, 138);
        assert!(first.replacement.is_none());

        assert_eq!(records[1].lang.value, "你好");
        assert_eq!(records[1].range.byte_offset.start, 143);
    }

    #[test]
    fn test_rewrite_sets_replacement() {
        let dict = dictionary();
        let ctx = RecordContext {
            dictionary: &dict,
            key_prefix: "I18N.",
            replacement: Some("t('ok')"),
        };
        let records = ctx.parse_line(MATCH_LINE.as_bytes()).unwrap();
        assert!(records.iter().all(|r| r.replacement.as_deref() == Some("t('ok')")));
    }

    #[test]
    fn test_unknown_key_has_empty_value() {
        let dict = LocaleDictionary::default();
        let ctx = RecordContext {
            dictionary: &dict,
            key_prefix: "I18N.",
            replacement: None,
        };
        let records = ctx.parse_line(MATCH_LINE.as_bytes()).unwrap();
        assert_eq!(records[0].lang.value, "");
    }

    #[test]
    fn test_non_match_messages_are_ignored() {
        let dict = dictionary();
        let ctx = RecordContext {
            dictionary: &dict,
            key_prefix: "I18N.",
            replacement: None,
        };
        let begin = r#"{"type":"begin","data":{"path":{"text":"src/a.ts"}}}"#;
        let summary = r#"{"type":"summary","data":{"elapsed_total":{"secs":0,"nanos":1}}}"#;
        assert!(ctx.parse_line(begin.as_bytes()).unwrap().is_empty());
        assert!(ctx.parse_line(summary.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let dict = dictionary();
        let ctx = RecordContext {
            dictionary: &dict,
            key_prefix: "I18N.",
            replacement: None,
        };
        assert!(ctx.parse_line(b"{\"type\":\"match\",\"data\":").is_err());
        assert!(ctx.parse_line(b"not json").is_err());
    }

    #[test]
    fn test_non_utf8_path_is_skipped() {
        let dict = dictionary();
        let ctx = RecordContext {
            dictionary: &dict,
            key_prefix: "I18N.",
            replacement: None,
        };
        let line = r#"{"type":"match","data":{"path":{"bytes":"/w=="},"lines":{"text":"I18N.hello"},"line_number":1,"absolute_offset":0,"submatches":[{"match":{"text":"I18N.hello"},"start":0,"end":10}]}}"#;
        assert!(ctx.parse_line(line.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_line_buffer_splits_across_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"{\"a\":").is_empty());
        let lines = buffer.push(b"1}\n\n{\"b\":2}\r\n{\"c\"");
        assert_eq!(lines, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
        assert_eq!(buffer.finish(), Some(b"{\"c\"".to_vec()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_file_language() {
        assert_eq!(file_language("a/b.TSX"), "tsx");
        assert_eq!(file_language("x.scss"), "css");
        assert_eq!(file_language("Makefile"), "plaintext");
    }
}
