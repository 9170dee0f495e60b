//! Run configuration, loaded from `depmap.toml`.
//!
//! A missing file yields the defaults. List options accept either a TOML
//! array or a single `;`-separated string.

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::ast::{AstKind, NodeKindSet};
use crate::error::{DepmapError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "depmap.toml";
pub const DEFAULT_ROOT_URL: &str = "http://localhost:7474/db/data";
pub const DEFAULT_STORE_DIR: &str = ".depmap/graph.db";
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepmapConfig {
    pub use_embedded_backend: bool,
    pub embedded_store_path: PathBuf,
    pub networked_root_url: String,
    pub prefer_allow_over_block: bool,
    /// Defaults to "enabled when `allow_rules` is non-empty".
    pub use_allow_rules: Option<bool>,
    #[serde(deserialize_with = "string_or_list")]
    pub allow_rules: Vec<String>,
    /// Defaults to "enabled when `block_rules` is non-empty".
    pub use_block_rules: Option<bool>,
    #[serde(deserialize_with = "string_or_list")]
    pub block_rules: Vec<String>,
    pub enable_pre_execution: bool,
    #[serde(deserialize_with = "string_or_list")]
    pub pre_execution_statements: Vec<String>,
    /// Statements per backend transaction; 0 means one transaction per run.
    pub batch_size: usize,
    pub request_timeout_secs: Option<u64>,
    #[serde(deserialize_with = "string_or_list")]
    pub stop_kinds: Vec<String>,
}

impl Default for DepmapConfig {
    fn default() -> Self {
        Self {
            use_embedded_backend: false,
            embedded_store_path: PathBuf::from(DEFAULT_STORE_DIR),
            networked_root_url: DEFAULT_ROOT_URL.to_string(),
            prefer_allow_over_block: false,
            use_allow_rules: None,
            allow_rules: Vec::new(),
            use_block_rules: None,
            block_rules: Vec::new(),
            enable_pre_execution: false,
            pre_execution_statements: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_secs: None,
            stop_kinds: Vec::new(),
        }
    }
}

impl DepmapConfig {
    /// Load from `path`, falling back to defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: DepmapConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.use_embedded_backend && self.networked_root_url.trim().is_empty() {
            return Err(DepmapError::Config(
                "networked_root_url must be set when the embedded backend is off".to_string(),
            ));
        }
        if self.use_embedded_backend && self.embedded_store_path.as_os_str().is_empty() {
            return Err(DepmapError::Config(
                "embedded_store_path must be set when the embedded backend is on".to_string(),
            ));
        }
        self.stop_set()?;
        Ok(())
    }

    pub fn allow_rules_enabled(&self) -> bool {
        self.use_allow_rules.unwrap_or(!self.allow_rules.is_empty())
    }

    pub fn block_rules_enabled(&self) -> bool {
        self.use_block_rules.unwrap_or(!self.block_rules.is_empty())
    }

    /// Pre-execution statements to run, empty when the feature is off.
    pub fn pre_execution(&self) -> &[String] {
        if self.enable_pre_execution {
            &self.pre_execution_statements
        } else {
            &[]
        }
    }

    pub fn stop_set(&self) -> Result<NodeKindSet> {
        self.stop_kinds
            .iter()
            .map(|name| name.parse::<AstKind>().map_err(DepmapError::Config))
            .collect()
    }

    /// Resolve a relative store path against `base`.
    pub fn resolve_store_path(&self, base: &Path) -> PathBuf {
        if self.embedded_store_path.is_absolute() {
            self.embedded_store_path.clone()
        } else {
            base.join(&self.embedded_store_path)
        }
    }
}

/// Directory that relative store paths resolve against: the one holding
/// the config file, or `.` for a bare file name.
pub fn config_dir(config_file: &Path) -> PathBuf {
    match config_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Split a `;`-separated option value, trimming whitespace and dropping
/// empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => split_list(&s),
        StringOrList::Many(items) => items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DepmapConfig::default();
        assert!(!config.use_embedded_backend);
        assert_eq!(config.networked_root_url, DEFAULT_ROOT_URL);
        assert!(!config.allow_rules_enabled());
        assert!(!config.block_rules_enabled());
        assert!(config.pre_execution().is_empty());
        assert!(config.stop_set().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DepmapConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, DepmapConfig::default());
    }

    #[test]
    fn test_parse_lists_both_forms() {
        let config = DepmapConfig::from_toml(
            r#"
use_embedded_backend = true
embedded_store_path = "/var/depmap/graph.db"
prefer_allow_over_block = true
allow_rules = "@com.acme. ; com\\.dnw\\..* ;"
block_rules = ["@java.", "  "]
enable_pre_execution = true
pre_execution_statements = "MATCH (n) DETACH DELETE n"
stop_kinds = ["javadoc"]
"#,
        )
        .unwrap();

        assert!(config.use_embedded_backend);
        assert_eq!(config.allow_rules, vec!["@com.acme.", r"com\.dnw\..*"]);
        assert_eq!(config.block_rules, vec!["@java."]);
        assert!(config.allow_rules_enabled());
        assert_eq!(config.pre_execution(), ["MATCH (n) DETACH DELETE n"]);
        assert!(config.stop_set().unwrap().contains(AstKind::Javadoc));
    }

    #[test]
    fn test_explicit_enable_with_empty_list() {
        let config = DepmapConfig::from_toml("use_allow_rules = true\n").unwrap();
        assert!(config.allow_rules_enabled());
        assert!(config.allow_rules.is_empty());
    }

    #[test]
    fn test_unknown_stop_kind_is_config_error() {
        let err = DepmapConfig::from_toml("stop_kinds = [\"nonsense\"]\n").unwrap_err();
        assert!(matches!(err, DepmapError::Config(_)));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a ;b;; c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_resolve_store_path() {
        let config = DepmapConfig::default();
        assert_eq!(
            config.resolve_store_path(Path::new("/proj")),
            PathBuf::from("/proj/.depmap/graph.db")
        );
    }

    #[test]
    fn test_config_dir() {
        assert_eq!(config_dir(Path::new("depmap.toml")), PathBuf::from("."));
        assert_eq!(config_dir(Path::new("/proj/depmap.toml")), PathBuf::from("/proj"));
        assert_eq!(config_dir(Path::new("conf/depmap.toml")), PathBuf::from("conf"));
    }
}
