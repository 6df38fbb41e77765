//! Source registry: feed URLs, filter keywords, output locations, schedule.
//!
//! The configuration lives in the store as one JSON row and is snapshotted
//! at the start of every run; edits made while a run is in flight take
//! effect on the next run.

use chrono::{DateTime, Duration, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{ConfigStore, StoreError};

pub const CONFIG_KEY: &str = "update_config";
pub const LAST_UPDATE_KEY: &str = "update_last_time";
pub const JSON_KIND: &str = "json";
pub const STRING_KIND: &str = "string";

/// Interval floor, matching the validation applied on config writes.
pub const MIN_UPDATE_INTERVAL: u64 = 300;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub feed_urls: Vec<String>,
    pub output_dir: String,
    pub raw_link_filename: String,
    pub clash_filename: String,
    pub filter_keywords: Vec<String>,
    pub update_interval_secs: u64,
    pub schedule_enabled: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            feed_urls: Vec::new(),
            output_dir: "output".to_string(),
            raw_link_filename: "raw".to_string(),
            clash_filename: "clash.yaml".to_string(),
            filter_keywords: Vec::new(),
            update_interval_secs: 3600,
            schedule_enabled: false,
        }
    }
}

impl SourceConfig {
    /// Feed URLs that are non-empty and use an http/https scheme, trimmed,
    /// in configured order.
    pub fn sanitized_feed_urls(&self) -> Vec<String> {
        self.feed_urls
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .collect()
    }

    /// Validation applied on every write: at least one feed URL, every URL
    /// http/https, interval clamped to the floor.
    pub fn validate(mut self) -> Result<SourceConfig, SettingsError> {
        for url in &self.feed_urls {
            let url = url.trim();
            if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(SettingsError::Invalid(format!("invalid feed url: {}", url)));
            }
        }
        self.feed_urls = self.sanitized_feed_urls();
        if self.feed_urls.is_empty() {
            return Err(SettingsError::Invalid(
                "at least one feed url is required".to_string(),
            ));
        }
        self.update_interval_secs = self.update_interval_secs.max(MIN_UPDATE_INTERVAL);
        Ok(self)
    }
}

/// Loads the configuration row, falling back to defaults when it is missing
/// or unreadable.
pub fn load_config(store: &dyn ConfigStore) -> SourceConfig {
    match store.get(CONFIG_KEY, JSON_KIND) {
        Some(row) => match serde_json::from_str(&row.value) {
            Ok(config) => config,
            Err(e) => {
                error!("stored configuration is unreadable, using defaults: {}", e);
                SourceConfig::default()
            }
        },
        None => SourceConfig::default(),
    }
}

/// Validates and persists the configuration.
pub fn save_config(store: &dyn ConfigStore, config: SourceConfig) -> Result<SourceConfig, SettingsError> {
    let validated = config.validate()?;
    let body = serde_json::to_string(&validated)
        .map_err(|e| SettingsError::Invalid(e.to_string()))?;
    store.upsert(CONFIG_KEY, JSON_KIND, &body)?;
    Ok(validated)
}

pub fn last_update_time(store: &dyn ConfigStore) -> Option<DateTime<Utc>> {
    let row = store.get(LAST_UPDATE_KEY, STRING_KIND)?;
    DateTime::parse_from_rfc3339(&row.value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub fn record_last_update(store: &dyn ConfigStore) -> Result<(), StoreError> {
    store.upsert(LAST_UPDATE_KEY, STRING_KIND, &Utc::now().to_rfc3339())
}

/// Next scheduled run, derived from the last completion and the interval.
/// `None` when the schedule is disabled or nothing has run yet.
pub fn next_update_time(store: &dyn ConfigStore, config: &SourceConfig) -> Option<DateTime<Utc>> {
    if !config.schedule_enabled {
        return None;
    }
    let last = last_update_time(store)?;
    Some(last + Duration::seconds(config.update_interval_secs as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = SourceConfig {
            feed_urls: vec!["ftp://feed.example.com".to_string()],
            ..SourceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_feed() {
        assert!(SourceConfig::default().validate().is_err());
    }

    #[test]
    fn test_validate_clamps_interval() {
        let config = SourceConfig {
            feed_urls: vec!["https://feed.example.com/sub".to_string()],
            update_interval_secs: 10,
            ..SourceConfig::default()
        };
        assert_eq!(config.validate().unwrap().update_interval_secs, 300);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let store = MemoryStore::new();
        let config = SourceConfig {
            feed_urls: vec!["https://feed.example.com/sub".to_string()],
            filter_keywords: vec!["expired".to_string()],
            ..SourceConfig::default()
        };
        let saved = save_config(&store, config).unwrap();
        assert_eq!(load_config(&store), saved);
    }

    #[test]
    fn test_missing_config_yields_defaults() {
        let store = MemoryStore::new();
        assert_eq!(load_config(&store), SourceConfig::default());
    }

    #[test]
    fn test_next_update_requires_schedule_and_history() {
        let store = MemoryStore::new();
        let mut config = SourceConfig::default();
        assert!(next_update_time(&store, &config).is_none());
        config.schedule_enabled = true;
        assert!(next_update_time(&store, &config).is_none());
        record_last_update(&store).unwrap();
        assert!(next_update_time(&store, &config).is_some());
    }
}
