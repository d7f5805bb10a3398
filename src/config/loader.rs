//! Locating and reading the runner configuration file.

use std::path::{Path, PathBuf};

use super::FfConfig;

/// Config file name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".ff-supervisor.toml";

/// Environment variable naming a config file that takes precedence over
/// the standard locations.
pub const CONFIG_ENV: &str = "FF_SUPERVISOR_CONFIG";

/// Finds the first existing config file among a list of candidates.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    candidates: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Candidates: `$FF_SUPERVISOR_CONFIG`, `./.ff-supervisor.toml`, then
    /// `<config_dir>/ff-supervisor/config.toml`.
    #[must_use]
    pub fn new() -> Self {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let user = dirs::config_dir().map(|dir| dir.join("ff-supervisor").join("config.toml"));

        Self {
            candidates: from_env
                .into_iter()
                .chain(std::iter::once(PathBuf::from(LOCAL_CONFIG_FILE)))
                .chain(user)
                .collect(),
        }
    }

    /// Only consider `path`.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            candidates: vec![path],
        }
    }

    /// Read the first existing candidate. Missing files yield defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<FfConfig, ConfigError> {
        let Some(path) = self.find_config_file() else {
            tracing::debug!(candidates = ?self.candidates, "No config file, using defaults");
            return Ok(FfConfig::default());
        };

        tracing::debug!(path = %path.display(), "Reading config");
        read_config(&path)
    }

    /// Candidate paths, highest priority first.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.candidates
    }

    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.candidates.iter().find(|path| path.is_file()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_config(path: &Path) -> Result<FfConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

/// Config file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}
