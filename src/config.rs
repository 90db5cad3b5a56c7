//! Configuration for termcore.
//!
//! Loaded from `~/.termcore/config.toml`; every field is optional:
//!
//! ```toml
//! # Program to run (defaults to $SHELL, or %COMSPEC% on Windows)
//! shell = "/bin/bash"
//! args = ["--login"]
//!
//! # Size used until the host terminal reports its own
//! cols = 80
//! rows = 25
//!
//! # Rows kept after they scroll off the top (0 keeps none)
//! scrollback_lines = 1000
//!
//! # Bytes read from the PTY per cycle
//! read_chunk_size = 1024
//!
//! # tracing filter for ~/.termcore/termcore.log
//! log_level = "info"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::core::session::DEFAULT_READ_CHUNK_SIZE;

/// Directory under the home directory holding config and log
pub const CONFIG_DIR: &str = ".termcore";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Program to start, `None` picks the platform shell
    pub shell: Option<String>,
    pub args: Vec<String>,
    pub cols: u16,
    pub rows: u16,
    pub scrollback_lines: usize,
    pub read_chunk_size: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            args: Vec::new(),
            cols: 80,
            rows: 25,
            scrollback_lines: 1000,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file gives the defaults; an unreadable or invalid one is
    /// logged and also gives the defaults.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_or_default(&path),
            None => Self::default(),
        }
    }

    /// Like [`Config::load`] for an explicit path
    pub fn load_or_default(path: &Path) -> Self {
        let (config, error) = Self::load_lenient(path);
        if let Some(e) = error {
            warn!("{}; using defaults", e);
        }
        config
    }

    /// Load `path`, falling back to the defaults.
    ///
    /// The error is handed back instead of logged, for callers that read the
    /// config before logging is set up. A missing file is not an error.
    pub fn load_lenient(path: &Path) -> (Self, Option<ConfigError>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The program to run, falling back to the platform shell
    pub fn shell_program(&self) -> String {
        self.shell.clone().unwrap_or_else(default_shell)
    }

    /// Config file path
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }
}

/// `~/.termcore`
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(CONFIG_DIR))
}

#[cfg(windows)]
pub fn default_shell() -> String {
    std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
}

#[cfg(not(windows))]
pub fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file() {
        let config = Config::parse(
            r#"
            shell = "/bin/zsh"
            args = ["-l"]
            scrollback_lines = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.shell_program(), "/bin/zsh");
        assert_eq!(config.args, vec!["-l".to_string()]);
        assert_eq!(config.scrollback_lines, 0);
        assert_eq!(config.cols, 80);
        assert_eq!(config.read_chunk_size, 1024);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = std::env::temp_dir().join(format!("termcore-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "cols = \"wide\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
        assert_eq!(Config::load_or_default(&path), Config::default());

        let (config, error) = Config::load_lenient(&path);
        assert_eq!(config, Config::default());
        assert!(matches!(error, Some(ConfigError::Parse { .. })));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("termcore-does-not-exist.toml");
        assert_eq!(Config::load_or_default(&path), Config::default());
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Read { .. })));
        assert!(Config::load_lenient(&path).1.is_none());
    }

    #[test]
    fn test_default_shell_is_set() {
        assert!(!default_shell().is_empty());
    }
}
