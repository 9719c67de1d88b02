use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, de};
use tracing::level_filters::LevelFilter;

/// Controls the log format
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other)
    Auto,
    /// With colors
    Pretty,
    /// Simplified log output
    Simplified,
    /// Dump out JSON lines
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level.
    #[serde(deserialize_with = "deserialize_level_filter")]
    pub level: LevelFilter,
    /// Controls the log format.
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Configuration of a memo cache.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MemoConfig {
    /// The name of the cache, attached to all of its log records.
    pub name: String,

    /// Capacity of the request queue of a [`CoordinatorCache`](crate::CoordinatorCache).
    ///
    /// Defaults to `None`, which means the queue is unbounded. With a bounded queue, callers wait
    /// for free capacity instead of being rejected. A capacity of `0` is treated as `1`.
    pub request_queue_size: Option<usize>,

    /// Internal logger settings.
    pub logging: Logging,
}

impl Default for MemoConfig {
    fn default() -> Self {
        MemoConfig {
            name: "memo".into(),
            request_queue_size: None,
            logging: Logging::default(),
        }
    }
}

impl MemoConfig {
    /// Return configuration, reading from file location `path`, or the default if `None`.
    pub fn get(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_reader(
                fs::File::open(path).context("failed to open configuration file")?,
            ),
            None => Ok(MemoConfig::default()),
        }
    }

    /// Parses the configuration from YAML.
    ///
    /// A document without any content is rejected rather than treated as all defaults.
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self> {
        let config = std::io::read_to_string(reader).context("failed reading config file")?;
        if config.trim().is_empty() {
            anyhow::bail!("config file empty");
        }
        serde_yaml::from_str(&config).context("failed to parse config YAML")
    }
}

const LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Parses a level name case-insensitively, listing the valid names on failure.
fn deserialize_level_filter<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<LevelFilter, D::Error> {
    let level = String::deserialize(deserializer)?;
    match level.to_ascii_lowercase().as_str() {
        "off" => Ok(LevelFilter::OFF),
        "error" => Ok(LevelFilter::ERROR),
        "warn" => Ok(LevelFilter::WARN),
        "info" => Ok(LevelFilter::INFO),
        "debug" => Ok(LevelFilter::DEBUG),
        "trace" => Ok(LevelFilter::TRACE),
        _ => Err(de::Error::unknown_variant(&level, LEVELS)),
    }
}
