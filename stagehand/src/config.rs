//! Process configuration.
//!
//! Read from environment variables after `.env` has been loaded. Unparseable
//! values fall back to the default with a warning; [`AppConfig::validate`]
//! catches values that parse but cannot work.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

use crate::{Error, Result};

/// Shortest accepted segment length in seconds.
pub const MIN_SEGMENT_SECS: f64 = 1.0;

/// Which object store backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Memory,
    Local,
}

/// Which media engine performs the codec work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Passthrough,
    Ffmpeg,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Request body size limit in bytes
    pub body_limit: usize,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
    pub store: StoreKind,
    /// Root directory of the local store
    pub store_root: PathBuf,
    pub media_engine: EngineKind,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Target segment length in seconds
    pub segment_secs: f64,
    /// Emit a notification for every store write and dispatch it in-process
    pub local_notifications: bool,
    /// Upper bound on concurrently relayed dispatches
    pub max_concurrent_dispatches: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            body_limit: 1024 * 1024, // 1MB
            log_dir: PathBuf::from("logs"),
            store: StoreKind::Memory,
            store_root: PathBuf::from("data"),
            media_engine: EngineKind::Passthrough,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            segment_secs: 10.0,
            local_notifications: true,
            max_concurrent_dispatches: 8,
        }
    }
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key = %key, value = %raw, "Ignoring invalid configuration value");
            default
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `STAGEHAND_BIND_ADDRESS` (e.g. "0.0.0.0")
    /// - `STAGEHAND_PORT` (e.g. "8080")
    /// - `STAGEHAND_BODY_LIMIT` (bytes)
    /// - `STAGEHAND_LOG_DIR`
    /// - `STAGEHAND_STORE` (`memory` or `local`)
    /// - `STAGEHAND_STORE_ROOT`
    /// - `STAGEHAND_MEDIA_ENGINE` (`passthrough` or `ffmpeg`)
    /// - `FFMPEG_PATH`, `FFPROBE_PATH`
    /// - `STAGEHAND_SEGMENT_SECS`
    /// - `STAGEHAND_LOCAL_NOTIFICATIONS` (bool)
    /// - `STAGEHAND_MAX_CONCURRENT_DISPATCHES`
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bind_address) = var("STAGEHAND_BIND_ADDRESS") {
            config.bind_address = bind_address.trim().to_string();
        }

        if let Some(port) = var("STAGEHAND_PORT") {
            config.port = parse_or_warn("STAGEHAND_PORT", &port, config.port);
        }

        if let Some(limit) = var("STAGEHAND_BODY_LIMIT") {
            config.body_limit = parse_or_warn("STAGEHAND_BODY_LIMIT", &limit, config.body_limit);
        }

        if let Some(dir) = var("STAGEHAND_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if let Some(store) = var("STAGEHAND_STORE") {
            config.store = parse_or_warn("STAGEHAND_STORE", &store, config.store);
        }

        if let Some(root) = var("STAGEHAND_STORE_ROOT") {
            config.store_root = PathBuf::from(root);
        }

        if let Some(engine) = var("STAGEHAND_MEDIA_ENGINE") {
            config.media_engine = parse_or_warn("STAGEHAND_MEDIA_ENGINE", &engine, config.media_engine);
        }

        if let Some(path) = var("FFMPEG_PATH") {
            config.ffmpeg_path = path;
        }

        if let Some(path) = var("FFPROBE_PATH") {
            config.ffprobe_path = path;
        }

        if let Some(secs) = var("STAGEHAND_SEGMENT_SECS") {
            config.segment_secs = parse_or_warn("STAGEHAND_SEGMENT_SECS", &secs, config.segment_secs);
        }

        if let Some(raw) = var("STAGEHAND_LOCAL_NOTIFICATIONS") {
            match parse_bool(&raw) {
                Some(enabled) => config.local_notifications = enabled,
                None => warn!(
                    key = "STAGEHAND_LOCAL_NOTIFICATIONS",
                    value = %raw,
                    "Ignoring invalid configuration value"
                ),
            }
        }

        if let Some(max) = var("STAGEHAND_MAX_CONCURRENT_DISPATCHES") {
            config.max_concurrent_dispatches = parse_or_warn(
                "STAGEHAND_MAX_CONCURRENT_DISPATCHES",
                &max,
                config.max_concurrent_dispatches,
            );
        }

        config
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.segment_secs.is_finite() && self.segment_secs >= MIN_SEGMENT_SECS) {
            return Err(Error::config(format!(
                "segment length must be at least {MIN_SEGMENT_SECS} seconds, got {}",
                self.segment_secs
            )));
        }
        if self.max_concurrent_dispatches == 0 {
            return Err(Error::config("max concurrent dispatches must be at least 1"));
        }
        if self.body_limit == 0 {
            return Err(Error::config("body limit must be at least 1 byte"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.media_engine, EngineKind::Passthrough);
        assert!(config.local_notifications);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("STAGEHAND_PORT", "9000"),
            ("STAGEHAND_STORE", "Local"),
            ("STAGEHAND_STORE_ROOT", "/srv/objects"),
            ("STAGEHAND_MEDIA_ENGINE", "ffmpeg"),
            ("FFMPEG_PATH", "/opt/ffmpeg"),
            ("STAGEHAND_SEGMENT_SECS", "2.5"),
            ("STAGEHAND_LOCAL_NOTIFICATIONS", "off"),
            ("STAGEHAND_MAX_CONCURRENT_DISPATCHES", "3"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.store, StoreKind::Local);
        assert_eq!(config.store_root, PathBuf::from("/srv/objects"));
        assert_eq!(config.media_engine, EngineKind::Ffmpeg);
        assert_eq!(config.ffmpeg_path, "/opt/ffmpeg");
        assert_eq!(config.segment_secs, 2.5);
        assert!(!config.local_notifications);
        assert_eq!(config.max_concurrent_dispatches, 3);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[
            ("STAGEHAND_PORT", "not-a-port"),
            ("STAGEHAND_STORE", "s3"),
            ("STAGEHAND_LOCAL_NOTIFICATIONS", "maybe"),
            ("STAGEHAND_BIND_ADDRESS", "   "),
        ]);
        let defaults = AppConfig::default();
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.store, defaults.store);
        assert_eq!(config.local_notifications, defaults.local_notifications);
        assert_eq!(config.bind_address, defaults.bind_address);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = load(&[("STAGEHAND_SEGMENT_SECS", "0")]);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = load(&[("STAGEHAND_MAX_CONCURRENT_DISPATCHES", "0")]);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_tiny_segments() {
        let config = load(&[("STAGEHAND_SEGMENT_SECS", "0.001")]);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = load(&[("STAGEHAND_SEGMENT_SECS", "1")]);
        assert!(config.validate().is_ok());
    }
}
