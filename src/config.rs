use crate::aggregate::DuplicatePolicy;
use crate::matcher::MatcherConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "keyfind";
const CONFIG_FILE: &str = "config.json";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Locale file (nested JSON) providing key translations.
    /// Relative paths resolve against the workspace root.
    #[serde(default)]
    pub locale_file: Option<PathBuf>,

    /// Prefix in front of dictionary keys in source code
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Globs excluded from every search
    #[serde(default = "default_excludes")]
    pub default_excludes: Vec<String>,

    /// Quiet period before field edits trigger a search
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// ripgrep executable
    #[serde(default = "default_ripgrep_path")]
    pub ripgrep_path: PathBuf,

    /// What to do with repeated records for the same location
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Worker threads for applying replacements.
    /// If 0, uses the number of CPU cores
    #[serde(default)]
    pub rewrite_threads: usize,
}

fn default_key_prefix() -> String {
    "I18N.".to_string()
}

fn default_excludes() -> Vec<String> {
    vec!["node_modules/**".to_string(), ".git/**".to_string()]
}

fn default_debounce_ms() -> u64 {
    crate::engine::debouncer::DEFAULT_DEBOUNCE_MS
}

fn default_ripgrep_path() -> PathBuf {
    PathBuf::from("rg")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            locale_file: None,
            key_prefix: default_key_prefix(),
            default_excludes: default_excludes(),
            debounce_ms: default_debounce_ms(),
            ripgrep_path: default_ripgrep_path(),
            duplicate_policy: DuplicatePolicy::default(),
            rewrite_threads: 0,
        }
    }
}

impl AppConfig {
    /// Load config from the app data directory, or return default if not found
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load config from an explicit file, or return default if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            let config: AppConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the effective rewrite thread count (resolves 0 to CPU count)
    pub fn effective_rewrite_threads(&self) -> usize {
        if self.rewrite_threads == 0 {
            num_cpus()
        } else {
            self.rewrite_threads
        }
    }

    /// Locale file resolved against `root`
    pub fn locale_path(&self, root: &Path) -> Option<PathBuf> {
        self.locale_file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                root.join(file)
            }
        })
    }

    /// Matcher settings for a workspace
    pub fn matcher_config(&self, root: &Path) -> MatcherConfig {
        MatcherConfig {
            root: root.to_path_buf(),
            ripgrep_path: self.ripgrep_path.clone(),
            key_prefix: self.key_prefix.clone(),
            default_excludes: self.default_excludes.clone(),
        }
    }
}

/// Get the number of CPUs available
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir()
            .map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Find the root of a workspace starting from a given path.
/// Walks up the directory tree looking for a `.git` directory; falls back to
/// the start path itself.
pub fn find_workspace_root(start_path: &Path) -> Result<PathBuf> {
    let start = start_path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", start_path.display()))?;
    let mut current = start.as_path();

    loop {
        if current.join(".git").exists() {
            return Ok(current.to_path_buf());
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    Ok(start)
}
