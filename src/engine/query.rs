//! Query shapes submitted to the engine

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// A rule document carries a rewrite when any line starts with `fix:`
static RULE_FIX_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^fix:").unwrap());

/// Pattern matching strictness forwarded to the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Cst,
    #[default]
    Smart,
    Ast,
    Relaxed,
    Signature,
}

/// Free-form search query built from the search panel fields
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternQuery {
    pub pattern: String,
    pub include_file: String,
    pub exclude_file: String,
    pub rewrite: String,
    pub strictness: Strictness,
    pub selector: String,
    pub lang: String,
}

impl PatternQuery {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    pub fn with_include(mut self, include_file: impl Into<String>) -> Self {
        self.include_file = include_file.into();
        self
    }

    pub fn with_exclude(mut self, exclude_file: impl Into<String>) -> Self {
        self.exclude_file = exclude_file.into();
        self
    }

    pub fn with_rewrite(mut self, rewrite: impl Into<String>) -> Self {
        self.rewrite = rewrite.into();
        self
    }

    /// Apply a single field edit
    pub fn set(&mut self, field: QueryField, value: String) {
        match field {
            QueryField::Pattern => self.pattern = value,
            QueryField::IncludeFile => self.include_file = value,
            QueryField::ExcludeFile => self.exclude_file = value,
            QueryField::Rewrite => self.rewrite = value,
            QueryField::Selector => self.selector = value,
            QueryField::Lang => self.lang = value,
            QueryField::Strictness => {
                match serde_json::from_value(serde_json::Value::String(value)) {
                    Ok(strictness) => self.strictness = strictness,
                    Err(e) => tracing::warn!("ignoring unknown strictness: {}", e),
                }
            }
        }
    }
}

/// Raw rule document (YAML text), forwarded to the matcher untouched
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleDocument {
    pub yaml: String,
}

/// The two query shapes, discriminated by an explicit tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Query {
    Pattern(PatternQuery),
    Rule(RuleDocument),
}

impl Default for Query {
    fn default() -> Self {
        Query::Pattern(PatternQuery::default())
    }
}

impl Query {
    /// Whether the query asks for replacements (enables replace-all and diff preview)
    pub fn has_rewrite(&self) -> bool {
        match self {
            Query::Pattern(q) => !q.rewrite.is_empty(),
            Query::Rule(rule) => RULE_FIX_LINE.is_match(&rule.yaml),
        }
    }

    /// Blank queries short-circuit to an empty result
    pub fn is_blank(&self) -> bool {
        match self {
            Query::Pattern(q) => q.pattern.trim().is_empty(),
            Query::Rule(rule) => rule.yaml.trim().is_empty(),
        }
    }

    pub fn as_pattern(&self) -> Option<&PatternQuery> {
        match self {
            Query::Pattern(q) => Some(q),
            Query::Rule(_) => None,
        }
    }
}

impl From<PatternQuery> for Query {
    fn from(query: PatternQuery) -> Self {
        Query::Pattern(query)
    }
}

impl From<RuleDocument> for Query {
    fn from(rule: RuleDocument) -> Self {
        Query::Rule(rule)
    }
}

/// Editable fields of the search panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryField {
    Pattern,
    IncludeFile,
    ExcludeFile,
    Rewrite,
    Strictness,
    Selector,
    Lang,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_rewrite_detection() {
        assert!(!Query::from(PatternQuery::new("hello")).has_rewrite());
        assert!(Query::from(PatternQuery::new("hello").with_rewrite("bye")).has_rewrite());
    }

    #[test]
    fn test_rule_rewrite_detection() {
        let with_fix = RuleDocument {
            yaml: "id: swap\nrule:\n  pattern: a\nfix: b\n".to_string(),
        };
        let without_fix = RuleDocument {
            yaml: "id: find\nrule:\n  pattern: a\n  # fix: later\n".to_string(),
        };
        assert!(Query::from(with_fix).has_rewrite());
        assert!(!Query::from(without_fix).has_rewrite());
    }

    #[test]
    fn test_blank_queries() {
        assert!(Query::from(PatternQuery::new("   ")).is_blank());
        assert!(Query::from(RuleDocument::default()).is_blank());
        assert!(!Query::from(PatternQuery::new("x")).is_blank());
    }

    #[test]
    fn test_query_is_tagged() {
        let json = serde_json::to_value(Query::from(RuleDocument {
            yaml: "id: a".to_string(),
        }))
        .unwrap();
        assert_eq!(json["kind"], "rule");

        let parsed: Query =
            serde_json::from_str(r#"{"kind":"pattern","pattern":"hi","includeFile":"src"}"#)
                .unwrap();
        let q = parsed.as_pattern().unwrap();
        assert_eq!(q.pattern, "hi");
        assert_eq!(q.include_file, "src");
        assert_eq!(q.strictness, Strictness::Smart);
    }

    #[test]
    fn test_field_edits() {
        let mut q = PatternQuery::default();
        q.set(QueryField::Pattern, "hello".to_string());
        q.set(QueryField::IncludeFile, "src/**".to_string());
        q.set(QueryField::Strictness, "relaxed".to_string());
        q.set(QueryField::Strictness, "bogus".to_string());

        assert_eq!(q.pattern, "hello");
        assert_eq!(q.include_file, "src/**");
        assert_eq!(q.strictness, Strictness::Relaxed);
    }
}
