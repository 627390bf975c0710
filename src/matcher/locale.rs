//! Locale dictionary: flattened `dotted.key → translation` map

use crate::error::LocaleError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Translations of one locale, keyed by their dotted path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleDictionary {
    entries: BTreeMap<String, String>,
}

impl LocaleDictionary {
    /// Load a (possibly nested) JSON locale file
    pub fn load(path: &Path) -> Result<Self, LocaleError> {
        let content = fs::read_to_string(path).map_err(|source| LocaleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|source| LocaleError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        match value {
            Value::Object(map) => Ok(Self::from_object(&map)),
            _ => Err(LocaleError::NotAnObject(path.to_path_buf())),
        }
    }

    pub fn from_object(map: &Map<String, Value>) -> Self {
        let mut entries = BTreeMap::new();
        flatten_into(map, "", &mut entries);
        Self { entries }
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys whose translation contains `pattern`, in key order
    pub fn keys_containing<'a>(&'a self, pattern: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(_, value)| value.contains(pattern))
            .map(|(key, _)| key.as_str())
    }
}

/// Nested objects become dotted keys; arrays are joined with `,`
fn flatten_into(map: &Map<String, Value>, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (name, value) in map {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        match value {
            Value::Object(inner) => flatten_into(inner, &key, out),
            Value::Array(items) => {
                let joined = items.iter().map(scalar_text).collect::<Vec<_>>().join(",");
                out.insert(key, joined);
            }
            other => {
                out.insert(key, scalar_text(other));
            }
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> LocaleDictionary {
        let value = json!({
            "common": {
                "ok": "确定",
                "cancel": "取消",
                "nested": { "deep": "你好世界" }
            },
            "hello": "你好",
            "tags": ["a", "b"],
            "count": 3
        });
        LocaleDictionary::from_object(value.as_object().unwrap())
    }

    #[test]
    fn test_flatten_nested_keys() {
        let dict = sample();
        assert_eq!(dict.get("common.ok"), Some("确定"));
        assert_eq!(dict.get("common.nested.deep"), Some("你好世界"));
        assert_eq!(dict.get("hello"), Some("你好"));
        assert_eq!(dict.get("tags"), Some("a,b"));
        assert_eq!(dict.get("count"), Some("3"));
        assert_eq!(dict.get("common"), None);
    }

    #[test]
    fn test_keys_containing() {
        let dict = sample();
        let keys: Vec<&str> = dict.keys_containing("你好").collect();
        assert_eq!(keys, vec!["common.nested.deep", "hello"]);
        assert_eq!(dict.keys_containing("不存在").count(), 0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zh-CN.json");
        fs::write(&path, r#"{"page":{"title":"标题"}}"#).unwrap();

        let dict = LocaleDictionary::load(&path).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get("page.title"), Some("标题"));
    }

    #[test]
    fn test_load_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            LocaleDictionary::load(&path),
            Err(LocaleError::NotAnObject(_))
        ));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            LocaleDictionary::load(&path),
            Err(LocaleError::Parse { .. })
        ));
    }
}
