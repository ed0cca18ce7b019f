use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::remote::DirectoryBackend;
use crate::retention::DEFAULT_HORIZON_DAYS;
use crate::storage::FileStore;

pub const DATA_DIR_ENV: &str = "TIMELINER_DATA_DIR";
pub const REMOTE_DIR_ENV: &str = "TIMELINER_REMOTE_DIR";
pub const DEFAULT_LOG_FILTER: &str = "timeliner=warn";
/// Upper bound for `retention_days`, roughly a thousand years.
pub const MAX_RETENTION_DAYS: i64 = 365_000;

/// Optional `config.toml` inside the data directory.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    remote_dir: Option<String>,
    retention_days: Option<i64>,
    log_filter: Option<String>,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local store directory.
    pub data_dir: PathBuf,
    /// Root of the remote document store.
    pub remote_dir: PathBuf,
    pub retention_days: i64,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Config {
    /// Resolves settings from the environment, the config file and defaults.
    ///
    /// The data directory is determined in the following order:
    /// 1. `TIMELINER_DATA_DIR` environment variable.
    /// 2. `~/.local/share/timeliner` (on Linux).
    /// 3. `./timeliner` (fallback).
    pub fn load() -> Result<Self> {
        let data_dir = std::env::var(DATA_DIR_ENV).map(PathBuf::from).unwrap_or_else(|_| {
            let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
            p.push("timeliner");
            p
        });
        let mut config = Self::from_data_dir(data_dir)?;
        if let Ok(remote) = std::env::var(REMOTE_DIR_ENV) {
            config.remote_dir = PathBuf::from(remote);
        }
        Ok(config)
    }

    /// Settings for a specific data directory, ignoring the environment.
    pub fn from_data_dir(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let file = read_file_config(&data_dir.join("config.toml"))?;
        let retention_days = file.retention_days.unwrap_or(DEFAULT_HORIZON_DAYS);
        if !(0..=MAX_RETENTION_DAYS).contains(&retention_days) {
            return Err(Error::Config(format!(
                "retention_days must be between 0 and {MAX_RETENTION_DAYS}, got {retention_days}"
            )));
        }
        Ok(Config {
            remote_dir: file
                .remote_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("cloud")),
            retention_days,
            log_filter: file.log_filter.unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            data_dir,
        })
    }

    pub fn store(&self) -> FileStore {
        FileStore::new(&self.data_dir)
    }

    pub fn remote(&self) -> DirectoryBackend {
        DirectoryBackend::new(&self.remote_dir)
    }

    /// Log destination while the TUI owns the terminal.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("timeliner.log")
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::from_data_dir(tmp.path()).unwrap();
        assert_eq!(config.remote_dir, tmp.path().join("cloud"));
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "remote_dir = \"/srv/timeliner\"\nretention_days = 30\nlog_filter = \"timeliner=debug\"\n",
        )
        .unwrap();
        let config = Config::from_data_dir(tmp.path()).unwrap();
        assert_eq!(config.remote_dir, PathBuf::from("/srv/timeliner"));
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.log_filter, "timeliner=debug");
    }

    #[test]
    fn broken_config_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("config.toml"), "retention_days = \"soon\"").unwrap();
        assert!(matches!(Config::from_data_dir(tmp.path()), Err(crate::Error::Toml(_))));
    }

    #[test]
    fn retention_days_out_of_range_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("config.toml"), "retention_days = 1000000000").unwrap();
        assert!(matches!(Config::from_data_dir(tmp.path()), Err(Error::Config(_))));

        fs::write(tmp.path().join("config.toml"), "retention_days = -1").unwrap();
        assert!(matches!(Config::from_data_dir(tmp.path()), Err(Error::Config(_))));

        fs::write(tmp.path().join("config.toml"), format!("retention_days = {MAX_RETENTION_DAYS}")).unwrap();
        assert_eq!(Config::from_data_dir(tmp.path()).unwrap().retention_days, MAX_RETENTION_DAYS);
    }
}
