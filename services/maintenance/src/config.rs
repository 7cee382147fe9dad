use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::backup::RestoreIdPolicy;

/// Retention count for backup files.
pub const DEFAULT_MAX_BACKUPS: usize = 10;

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub server_host: String,
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub max_backups: usize,
    pub restore_id_policy: RestoreIdPolicy,
    pub enable_renewal_schedule: bool,
    pub renewal_poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8190,
            data_dir: PathBuf::from("data"),
            backup_dir: PathBuf::from("backups"),
            max_backups: DEFAULT_MAX_BACKUPS,
            restore_id_policy: RestoreIdPolicy::Preserve,
            enable_renewal_schedule: true,
            renewal_poll_interval_secs: 60,
            request_timeout_secs: 120,
            log_level: "info".to_string(),
        }
    }
}

impl MaintenanceConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(host) = env::var("LEARNHUB_HOST") {
            cfg.server_host = host;
        }
        if let Ok(port) = env::var("LEARNHUB_PORT") {
            cfg.server_port = port.parse().context("LEARNHUB_PORT must be a valid u16")?;
        }
        if let Ok(dir) = env::var("LEARNHUB_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("BACKUP_DIR") {
            cfg.backup_dir = PathBuf::from(dir);
        }
        if let Ok(max) = env::var("MAX_BACKUPS") {
            cfg.max_backups = max
                .parse()
                .context("MAX_BACKUPS must be a positive integer")?;
        }
        if let Ok(policy) = env::var("RESTORE_ID_POLICY") {
            cfg.restore_id_policy = policy
                .parse()
                .map_err(|err: String| anyhow::anyhow!("RESTORE_ID_POLICY is invalid: {err}"))?;
        }
        if let Ok(flag) = env::var("ENABLE_RENEWAL_SCHEDULE") {
            cfg.enable_renewal_schedule = parse_bool(&flag)
                .with_context(|| format!("ENABLE_RENEWAL_SCHEDULE is invalid: {flag}"))?;
        }
        if let Ok(interval) = env::var("RENEWAL_POLL_INTERVAL_SECS") {
            cfg.renewal_poll_interval_secs = interval
                .parse()
                .context("RENEWAL_POLL_INTERVAL_SECS must be a positive integer")?;
        }
        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECS") {
            cfg.request_timeout_secs = timeout
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a positive integer")?;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            cfg.log_level = level;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the values and creates the data and backup directories.
    pub fn validate(&self) -> Result<()> {
        if self.max_backups == 0 {
            anyhow::bail!("MAX_BACKUPS must be greater than zero");
        }
        if self.renewal_poll_interval_secs == 0 {
            anyhow::bail!("RENEWAL_POLL_INTERVAL_SECS must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        ensure_directory(&self.data_dir)?;
        ensure_directory(&self.backup_dir)?;
        Ok(())
    }

    pub fn renewal_poll_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("{} exists but is not a directory", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("unable to create directory {}", path.display()))?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => anyhow::bail!("invalid boolean value {value}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("YES").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_config_validation() {
        let temp = tempdir().unwrap();
        let mut config = MaintenanceConfig {
            data_dir: temp.path().join("data"),
            backup_dir: temp.path().join("backups"),
            ..Default::default()
        };

        // Valid configuration creates both directories
        assert!(config.validate().is_ok());
        assert!(config.data_dir.is_dir());
        assert!(config.backup_dir.is_dir());

        // Invalid: zero retention
        config.max_backups = 0;
        assert!(config.validate().is_err());
        config.max_backups = DEFAULT_MAX_BACKUPS;

        // Invalid: zero poll interval
        config.renewal_poll_interval_secs = 0;
        assert!(config.validate().is_err());
        config.renewal_poll_interval_secs = 60;

        // Invalid: backup dir is a file
        let file = temp.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();
        config.backup_dir = file;
        assert!(config.validate().is_err());
    }
}
