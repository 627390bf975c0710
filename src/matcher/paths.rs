//! Include/exclude filter handling for the matcher

use globset::Glob;
use std::path::{Path, PathBuf};

/// A comma-separated filter split into on-disk paths and glob patterns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter {
    /// Entries that exist under the workspace root, kept as written
    pub paths: Vec<String>,
    /// Glob patterns, including plain names turned into `<name>/**`
    pub globs: Vec<String>,
}

impl PathFilter {
    /// Parse a filter field relative to `root`.
    ///
    /// Entries that exist on disk are paths; entries with `*` or `?` are globs;
    /// anything else is treated as a directory prefix glob. Invalid globs are
    /// dropped with a warning.
    pub fn parse(field: &str, root: &Path) -> Self {
        let mut filter = Self::default();

        for entry in split_field(field) {
            let normalized = normalize(&entry);
            let absolute = if Path::new(&normalized).is_absolute() {
                PathBuf::from(&normalized)
            } else {
                root.join(&normalized)
            };

            if absolute.exists() {
                filter.paths.push(normalized);
                continue;
            }

            let glob = if normalized.contains('*') || normalized.contains('?') {
                normalized
            } else {
                format!("{}/**", normalized.trim_end_matches('/'))
            };

            match Glob::new(&glob) {
                Ok(_) => filter.globs.push(glob),
                Err(e) => tracing::warn!("skipping invalid glob {:?}: {}", glob, e),
            }
        }

        filter
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.globs.is_empty()
    }
}

/// Split on commas, trim, drop empty entries
pub fn split_field(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Collapse `./` segments and repeated or backslash separators
fn normalize(entry: &str) -> String {
    let unified = entry.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let parts: Vec<&str> = unified
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_split_field() {
        assert_eq!(split_field(" src , ,lib/**,"), vec!["src", "lib/**"]);
        assert!(split_field("").is_empty());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("./src//pages/"), "src/pages");
        assert_eq!(normalize("src\\pages"), "src/pages");
        assert_eq!(normalize("/abs/./x"), "/abs/x");
        assert_eq!(normalize("./"), ".");
    }

    #[test]
    fn test_parse_classifies_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/pages")).unwrap();

        let filter = PathFilter::parse("src/pages, **/*.tsx, missing", dir.path());
        assert_eq!(filter.paths, vec!["src/pages"]);
        assert_eq!(filter.globs, vec!["**/*.tsx", "missing/**"]);
    }

    #[test]
    fn test_parse_drops_invalid_glob() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::parse("src/[a*", dir.path());
        assert!(filter.is_empty());
    }
}
