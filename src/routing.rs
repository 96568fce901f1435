//! Routing table loaded once at startup.
//!
//! The rules file is a JSON array:
//!
//! ```json
//! [
//!   {"watch_dir": "/data/incoming", "study_description": "Chest X-Ray",
//!    "api_endpoint": "http://ai-host:8000/chest"}
//! ]
//! ```
//!
//! Matching is global: a file is compared against every rule, whatever
//! directory it arrived in. `watch_dir` only decides what gets watched.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::normalize::normalize;

/// One entry of the rules file, as written.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRule {
    pub watch_dir: String,
    pub study_description: String,
    pub api_endpoint: String,
}

/// A validated routing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    pub watch_dir: PathBuf,
    /// Description as configured, kept for log output.
    pub description: String,
    /// Normalized comparison key.
    pub pattern: String,
    pub endpoint: Url,
}

impl RoutingRule {
    /// Validate a raw entry.
    pub fn from_raw(raw: RawRule) -> Result<Self, String> {
        let watch_dir = raw.watch_dir.trim();
        if watch_dir.is_empty() {
            return Err("watch_dir is empty".to_string());
        }

        let endpoint = Url::parse(raw.api_endpoint.trim())
            .map_err(|e| format!("api_endpoint '{}' is not a URL: {e}", raw.api_endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(format!(
                "api_endpoint '{}' must use http or https",
                raw.api_endpoint
            ));
        }

        Ok(Self {
            watch_dir: PathBuf::from(watch_dir),
            pattern: normalize(&raw.study_description),
            description: raw.study_description,
            endpoint,
        })
    }
}

/// Immutable, ordered set of routing rules.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    rules: Vec<RoutingRule>,
}

impl RoutingTable {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self { rules }
    }

    /// Load and validate the rules file.
    ///
    /// Invalid entries are logged and skipped. Fails if the file cannot be
    /// read or parsed, or if nothing valid is left.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::RulesNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::RulesUnreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let table = Self::from_json(&content).map_err(|source| ConfigError::RulesMalformed {
            path: path.to_path_buf(),
            source,
        })?;

        if table.is_empty() {
            return Err(ConfigError::NoRules {
                path: path.to_path_buf(),
            });
        }

        Ok(table)
    }

    /// Parse rules from JSON text, skipping entries that fail validation.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let raw: Vec<RawRule> = serde_json::from_str(content)?;

        let mut rules = Vec::with_capacity(raw.len());
        for (index, entry) in raw.into_iter().enumerate() {
            match RoutingRule::from_raw(entry) {
                Ok(rule) => rules.push(rule),
                Err(reason) => {
                    tracing::error!("[routing] skipping rule #{index}: {reason}");
                }
            }
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose pattern equals `key`, in declaration order.
    ///
    /// `key` must already be normalized.
    pub fn matching<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a RoutingRule> + 'a {
        self.rules.iter().filter(move |rule| rule.pattern == key)
    }

    /// Deduplicated set of directories named by the rules.
    pub fn watch_dirs(&self) -> BTreeSet<PathBuf> {
        self.rules.iter().map(|r| r.watch_dir.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RULES: &str = r#"[
        {"watch_dir": "/d", "study_description": "Chest X-Ray", "api_endpoint": "http://h/a"},
        {"watch_dir": "/e", "study_description": "CHEST xray", "api_endpoint": "http://h/b"},
        {"watch_dir": "/d", "study_description": "MR Brain", "api_endpoint": "https://h/c"}
    ]"#;

    #[test]
    fn test_parse_and_normalize() {
        let table = RoutingTable::from_json(RULES).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rules()[0].pattern, "chestxray");
        assert_eq!(table.rules()[0].description, "Chest X-Ray");
        assert_eq!(table.rules()[2].endpoint.as_str(), "https://h/c");
    }

    #[test]
    fn test_matching_is_global_and_ordered() {
        let table = RoutingTable::from_json(RULES).unwrap();
        let endpoints: Vec<&str> = table
            .matching("chestxray")
            .map(|r| r.endpoint.as_str())
            .collect();
        assert_eq!(endpoints, vec!["http://h/a", "http://h/b"]);
        assert_eq!(table.matching("").count(), 0);
        assert_eq!(table.matching("ctabdomen").count(), 0);
    }

    #[test]
    fn test_watch_dirs_deduplicated() {
        let table = RoutingTable::from_json(RULES).unwrap();
        let dirs: Vec<PathBuf> = table.watch_dirs().into_iter().collect();
        assert_eq!(dirs, vec![PathBuf::from("/d"), PathBuf::from("/e")]);
    }

    #[test]
    fn test_invalid_entries_skipped() {
        let json = r#"[
            {"watch_dir": "", "study_description": "x", "api_endpoint": "http://h/a"},
            {"watch_dir": "/d", "study_description": "x", "api_endpoint": "not a url"},
            {"watch_dir": "/d", "study_description": "x", "api_endpoint": "ftp://h/a"},
            {"watch_dir": "/d", "study_description": "x", "api_endpoint": "http://h/ok"}
        ]"#;
        let table = RoutingTable::from_json(json).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rules()[0].endpoint.as_str(), "http://h/ok");
    }

    #[test]
    fn test_missing_key_is_malformed() {
        let json = r#"[{"watch_dir": "/d", "api_endpoint": "http://h/a"}]"#;
        assert!(RoutingTable::from_json(json).is_err());
    }

    #[test]
    fn test_load_errors() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            RoutingTable::load(&missing),
            Err(ConfigError::RulesNotFound { .. })
        ));

        let broken = temp_dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            RoutingTable::load(&broken),
            Err(ConfigError::RulesMalformed { .. })
        ));

        let empty = temp_dir.path().join("empty.json");
        std::fs::write(&empty, "[]").unwrap();
        assert!(matches!(
            RoutingTable::load(&empty),
            Err(ConfigError::NoRules { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, RULES).unwrap();

        let table = RoutingTable::load(&path).unwrap();
        assert_eq!(table.len(), 3);
    }
}
