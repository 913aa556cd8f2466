use crate::{APP_AUTHOR, APP_NAME, APP_QUALIFIER};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Per-user directories for config and logs. Nothing else is persisted.
#[derive(Debug, Clone)]
pub struct AppDirs {
    config_dir: PathBuf,
    log_dir: PathBuf,
}

impl AppDirs {
    pub fn discover() -> Result<Self, DirsError> {
        let dirs = ProjectDirs::from(APP_QUALIFIER, APP_AUTHOR, APP_NAME)
            .ok_or(DirsError::MissingProjectDirs)?;
        Ok(Self::from_roots(dirs.config_dir(), dirs.data_local_dir()))
    }

    /// Builds the layout under explicit roots (tests, portable installs).
    pub fn from_roots(config_dir: impl Into<PathBuf>, data_dir: impl AsRef<Path>) -> Self {
        Self {
            config_dir: config_dir.into(),
            log_dir: data_dir.as_ref().join("logs"),
        }
    }

    /// Creates the config directory. The log directory is left to file
    /// logging, so stdout-only sessions write nothing under the data root.
    pub fn ensure_config_dir(&self) -> Result<(), DirsError> {
        std::fs::create_dir_all(&self.config_dir).map_err(|source| DirsError::CreateDirectory {
            path: self.config_dir.clone(),
            source,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

#[derive(Debug, Error)]
pub enum DirsError {
    #[error("unable to determine project directories for adrelay")]
    MissingProjectDirs,
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_roots_places_logs_under_data() {
        let dirs = AppDirs::from_roots("/tmp/cfg", "/tmp/data");
        assert_eq!(dirs.config_dir(), Path::new("/tmp/cfg"));
        assert_eq!(dirs.log_dir(), Path::new("/tmp/data/logs"));
    }

    #[test]
    fn ensure_config_dir_leaves_log_dir_alone() {
        let root = tempfile::tempdir().unwrap();
        let dirs = AppDirs::from_roots(root.path().join("config"), root.path().join("data"));
        dirs.ensure_config_dir().expect("config dir should be created");
        assert!(dirs.config_dir().is_dir());
        assert!(!dirs.log_dir().exists());
        assert!(!root.path().join("data").exists());
    }
}
