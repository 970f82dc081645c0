// src/config.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LoadError, Result};
use crate::loader::DEFAULT_BATCH_SIZE;

pub const DEFAULT_BASE_URL: &str = "https://api.data.gov.my/gtfs-static/prasarana";
pub const DEFAULT_CATEGORY: &str = "rapid-bus-penang";
pub const DEFAULT_DB_PATH: &str = "./gtfs.db";
pub const DEFAULT_SCHEMA_PATH: &str = "./db/tables.sql";

/// Process settings. Environment first, then command-line overrides.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub db_path: PathBuf,
    pub category: String,
    pub schema_path: PathBuf,
    pub batch_size: usize,
    pub timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            category: DEFAULT_CATEGORY.to_string(),
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: crate::fetch::DEFAULT_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// Read `GTFS_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let batch_size = match get("GTFS_BATCH_SIZE") {
            Some(v) => parse_positive("GTFS_BATCH_SIZE", &v)?,
            None => defaults.batch_size,
        };
        let timeout = match get("GTFS_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_positive("GTFS_TIMEOUT_SECS", &v)? as u64),
            None => defaults.timeout,
        };

        Ok(Self {
            base_url: get("GTFS_BASE_URL").unwrap_or(defaults.base_url),
            db_path: get("GTFS_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            category: get("GTFS_CATEGORY").unwrap_or(defaults.category),
            schema_path: get("GTFS_SCHEMA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.schema_path),
            batch_size,
            timeout,
        })
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(LoadError::Config(format!(
            "{key} must be a positive integer, got {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() -> anyhow::Result<()> {
        let cfg = AppConfig::from_lookup(lookup(&[]))?;
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.category, DEFAULT_CATEGORY);
        assert_eq!(cfg.batch_size, 3000);
        assert_eq!(cfg.timeout, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn environment_overrides() -> anyhow::Result<()> {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("GTFS_CATEGORY", "rapid-rail-kl"),
            ("GTFS_DB_PATH", "/tmp/x.db"),
            ("GTFS_BATCH_SIZE", "500"),
            ("GTFS_TIMEOUT_SECS", "5"),
        ]))?;
        assert_eq!(cfg.category, "rapid-rail-kl");
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.batch_size, 500);
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = AppConfig::from_lookup(lookup(&[("GTFS_BATCH_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, LoadError::Config(_)));
    }
}
