//! CourierConfig - 設定の読み込みと検証
//!
//! 優先順位（後勝ち）: デフォルト値 < JSON ファイル < 環境変数 < CLI フラグ
//! CLI フラグの適用は courier-cli 側で行う。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::session::SessionOptions;
use crate::ports::ExtensionAllowlist;

pub const ENV_CONCURRENCY: &str = "COURIER_CONCURRENCY";
pub const ENV_STORAGE_DIR: &str = "COURIER_STORAGE_DIR";
pub const ENV_NOTIFICATION_TTL_MS: &str = "COURIER_NOTIFICATION_TTL_MS";

/// Upper bound for `notification_ttl_ms` (one day).
pub const MAX_NOTIFICATION_TTL_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CourierConfig {
    /// Max uploads in flight per batch.
    pub concurrency_limit: usize,
    pub notification_ttl_ms: u64,
    /// Extensions accepted at the storage boundary; empty accepts everything.
    pub accepted_extensions: Vec<String>,
    pub allow_close_while_uploading: bool,
    pub storage_dir: PathBuf,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
            notification_ttl_ms: 3000,
            accepted_extensions: vec![".csv".to_string()],
            allow_close_while_uploading: false,
            storage_dir: PathBuf::from("./uploads"),
        }
    }
}

impl CourierConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `COURIER_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as `with_env_overrides`, with an explicit lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(ENV_CONCURRENCY) {
            self.concurrency_limit = parse_number(ENV_CONCURRENCY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_NOTIFICATION_TTL_MS) {
            self.notification_ttl_ms = parse_number(ENV_NOTIFICATION_TTL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STORAGE_DIR) {
            self.storage_dir = PathBuf::from(raw);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::Invalid(
                "concurrency_limit must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_NOTIFICATION_TTL_MS).contains(&self.notification_ttl_ms) {
            return Err(ConfigError::Invalid(format!(
                "notification_ttl_ms must be between 1 and {MAX_NOTIFICATION_TTL_MS} (got {})",
                self.notification_ttl_ms
            )));
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage_dir is empty".to_string()));
        }
        Ok(())
    }

    pub fn accept_policy(&self) -> ExtensionAllowlist {
        ExtensionAllowlist::new(&self.accepted_extensions)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            notification_ttl: Duration::from_millis(self.notification_ttl_ms),
            allow_close_while_uploading: self.allow_close_while_uploading,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} is not a number: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = CourierConfig::default();
        assert_eq!(config.concurrency_limit, 3);
        assert_eq!(config.notification_ttl_ms, 3000);
        assert_eq!(config.accepted_extensions, vec![".csv"]);
        assert!(!config.allow_close_while_uploading);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "concurrency_limit": 5, "accepted_extensions": [] }}"#).unwrap();

        let config = CourierConfig::from_json_file(file.path()).unwrap();

        assert_eq!(config.concurrency_limit, 5);
        assert!(config.accepted_extensions.is_empty());
        assert_eq!(config.notification_ttl_ms, 3000);
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "concurency_limit": 5 }}"#).unwrap();

        let err = CourierConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CourierConfig::from_json_file(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let config = CourierConfig::default()
            .with_overrides(lookup(&[
                (ENV_CONCURRENCY, "8"),
                (ENV_STORAGE_DIR, "/tmp/out"),
                (ENV_NOTIFICATION_TTL_MS, " 500 "),
            ]))
            .unwrap();

        assert_eq!(config.concurrency_limit, 8);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.notification_ttl_ms, 500);
    }

    #[test]
    fn non_numeric_override_is_rejected() {
        let err = CourierConfig::default()
            .with_overrides(lookup(&[(ENV_CONCURRENCY, "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains(ENV_CONCURRENCY)));
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let config = CourierConfig {
            concurrency_limit: 0,
            ..CourierConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn oversized_notification_ttl_is_invalid() {
        let config = CourierConfig::default()
            .with_overrides(lookup(&[(ENV_NOTIFICATION_TTL_MS, "10000000000000000")]))
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("notification_ttl_ms")
        ));

        let one_day = CourierConfig {
            notification_ttl_ms: MAX_NOTIFICATION_TTL_MS,
            ..CourierConfig::default()
        };
        assert!(one_day.validate().is_ok());
    }

    #[test]
    fn session_options_follow_config() {
        let config = CourierConfig {
            notification_ttl_ms: 1200,
            allow_close_while_uploading: true,
            ..CourierConfig::default()
        };
        let options = config.session_options();
        assert_eq!(options.notification_ttl, Duration::from_millis(1200));
        assert!(options.allow_close_while_uploading);
    }
}
