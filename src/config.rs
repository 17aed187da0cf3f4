use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::parse_date;
use crate::error::VisionError;
use crate::executor::DEFAULT_MAX_WORKERS;
use crate::vision::{DEFAULT_DOWNLOAD_BASE_URL, DEFAULT_LISTING_BASE_URL};

pub const DEFAULT_CONFIG_FILE: &str = "vision-trades.json";
pub const STORE_DIRECTORY_ENV: &str = "STORE_DIRECTORY";

const SUPPORTED_SCHEMA_VERSION: u32 = 1;
const DEFAULT_START_DATE: &str = "2017-01-01";
const DEFAULT_PERIOD_START_DATE: &str = "2020-01-01";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub download_base_url: Option<String>,
    #[serde(default)]
    pub listing_base_url: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub period_start_date: Option<String>,
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub download_base_url: String,
    pub listing_base_url: String,
    pub start_date: NaiveDate,
    pub period_start_date: NaiveDate,
    pub max_workers: usize,
    pub folder: Option<Utf8PathBuf>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, VisionError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| VisionError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| VisionError::ConfigParse(err.to_string()))?
        } else if path.is_some() {
            return Err(VisionError::MissingConfig(config_path));
        } else {
            Config::default()
        };

        let mut resolved = Self::resolve_config(config)?;
        if let Ok(folder) = std::env::var(STORE_DIRECTORY_ENV) {
            if !folder.trim().is_empty() {
                resolved.folder = Some(Utf8PathBuf::from(folder.trim()));
            }
        }
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, VisionError> {
        if let Some(version) = config.schema_version {
            if version != SUPPORTED_SCHEMA_VERSION {
                return Err(VisionError::ConfigParse(format!(
                    "unsupported schema_version {version} (expected {SUPPORTED_SCHEMA_VERSION})"
                )));
            }
        }
        let start_date = parse_date(config.start_date.as_deref().unwrap_or(DEFAULT_START_DATE))?;
        let period_start_date = parse_date(
            config
                .period_start_date
                .as_deref()
                .unwrap_or(DEFAULT_PERIOD_START_DATE),
        )?;
        let max_workers = match config.max_workers {
            Some(0) => {
                return Err(VisionError::ConfigParse(
                    "max_workers must be at least 1".to_string(),
                ));
            }
            Some(value) => value,
            None => DEFAULT_MAX_WORKERS,
        };

        Ok(ResolvedConfig {
            download_base_url: config
                .download_base_url
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_BASE_URL.to_string()),
            listing_base_url: config
                .listing_base_url
                .unwrap_or_else(|| DEFAULT_LISTING_BASE_URL.to_string()),
            start_date,
            period_start_date,
            max_workers,
            folder: config.folder.map(Utf8PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_apply_to_empty_config() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.max_workers, 100);
        assert_eq!(resolved.download_base_url, DEFAULT_DOWNLOAD_BASE_URL);
        assert_eq!(resolved.period_start_date, parse_date("2020-01-01").unwrap());
        assert!(resolved.folder.is_none());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = Config {
            max_workers: Some(0),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, VisionError::ConfigParse(_));
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let config = Config {
            schema_version: Some(2),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, VisionError::ConfigParse(message) if message.contains("schema_version"));
    }
}
