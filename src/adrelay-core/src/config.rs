use crate::paths::AppDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    /// Provider attached when none is given on the command line.
    #[serde(default)]
    pub default_provider: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Per-provider settings keyed by provider id.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            default_provider: None,
            logging: LoggingConfig::default(),
            providers: BTreeMap::new(),
        }
    }
}

/// Settings for one provider entry. `settings` is handed to the provider
/// as-is; its shape is defined by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider implementation; defaults to the entry's id.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

/// A provider chosen for this session.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSelection {
    pub provider_id: String,
    pub kind: String,
    pub settings: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "default_true")]
    pub stdout: bool,
    #[serde(default = "default_true")]
    pub file: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            stdout: true,
            file: true,
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("provider id must not be empty")]
    EmptyProviderId,
    #[error("provider '{provider_id}' has an empty kind")]
    EmptyProviderKind { provider_id: String },
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_config_dir()?;
        let path = Self::config_path(dirs);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        if matches!(self.default_provider.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(ValidationError::EmptyProviderId);
        }
        for (id, provider) in &self.providers {
            if id.trim().is_empty() {
                return Err(ValidationError::EmptyProviderId);
            }
            if matches!(provider.kind.as_deref(), Some(kind) if kind.trim().is_empty()) {
                return Err(ValidationError::EmptyProviderKind {
                    provider_id: id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Picks the provider for this session: the CLI override, then
    /// `default_provider`, then `fallback`. Ids without a `[providers.<id>]`
    /// entry resolve to the implementation of the same name with no settings.
    pub fn resolve_provider(
        &self,
        cli_provider: Option<&str>,
        fallback: &str,
    ) -> Result<ProviderSelection, ValidationError> {
        let provider_id = cli_provider
            .or(self.default_provider.as_deref())
            .unwrap_or(fallback)
            .trim();
        if provider_id.is_empty() {
            return Err(ValidationError::EmptyProviderId);
        }

        let entry = self.providers.get(provider_id);
        let kind = entry
            .and_then(|p| p.kind.clone())
            .unwrap_or_else(|| provider_id.to_string());
        Ok(ProviderSelection {
            provider_id: provider_id.to_string(),
            kind,
            settings: entry.map(|p| p.settings.clone()).unwrap_or_default(),
        })
    }
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.max_log_files, 7);
        assert!(config.logging.stdout);
        assert!(config.logging.file);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn invalid_version_rejected() {
        let mut config = Config::default();
        config.config_version = CURRENT_CONFIG_VERSION + 1;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn empty_provider_kind_rejected() {
        let mut config = Config::default();
        config.providers.insert(
            "house".into(),
            ProviderConfig {
                kind: Some(" ".into()),
                settings: BTreeMap::new(),
            },
        );
        assert_eq!(
            config.validate(),
            Err(ValidationError::EmptyProviderKind {
                provider_id: "house".into()
            })
        );
    }

    #[test]
    fn loads_provider_settings_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
config_version = 1
default_provider = "house"

[logging]
level = "debug"
file = false

[providers.house]
kind = "scripted"

[providers.house.settings]
ads_enabled = false
ad_unit = "menu-interstitial"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).expect("config should load");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(!config.logging.file);

        let selection = config.resolve_provider(None, "scripted").unwrap();
        assert_eq!(selection.provider_id, "house");
        assert_eq!(selection.kind, "scripted");
        assert_eq!(selection.settings.get("ads_enabled"), Some(&json!(false)));
        assert_eq!(
            selection.settings.get("ad_unit"),
            Some(&json!("menu-interstitial"))
        );
    }

    #[test]
    fn unparsable_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "config_version = \"one\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: p, .. } if p == path));
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let root = tempfile::tempdir().unwrap();
        let dirs = AppDirs::from_roots(root.path().join("config"), root.path().join("data"));
        let config = Config::load_or_default(&dirs).expect("defaults");
        assert!(config.providers.is_empty());
        assert!(dirs.config_dir().is_dir());
        assert!(!dirs.log_dir().exists());
    }

    #[test]
    fn cli_override_beats_config_default() {
        let mut config = Config::default();
        config.default_provider = Some("house".into());

        let selection = config.resolve_provider(Some("scripted"), "fallback").unwrap();
        assert_eq!(selection.provider_id, "scripted");
        assert_eq!(selection.kind, "scripted");
        assert!(selection.settings.is_empty());

        let selection = Config::default().resolve_provider(None, "fallback").unwrap();
        assert_eq!(selection.provider_id, "fallback");
    }

    #[test]
    fn blank_cli_provider_rejected() {
        let result = Config::default().resolve_provider(Some("  "), "scripted");
        assert_eq!(result, Err(ValidationError::EmptyProviderId));
    }
}
