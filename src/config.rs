//! Configuration file parser for `feedcrawl.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which has no feeds. Unknown top-level keys are ignored with a warning.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::crawl::{FilterPatterns, Subscription, SubscriptionError};

/// Default config file name, looked up by [`Config::find`].
pub const CONFIG_FILE_NAME: &str = "feedcrawl.toml";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("feeds[{index}]: missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("feed.{0}: id is used by more than one feed")]
    DuplicateFeedId(String),

    #[error("Failed to load feeds file '{}': {source}", path.display())]
    FeedsFile {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub feeds: Vec<FeedConfig>,
}

/// The `[crawler]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Where crawl state is persisted. No state is kept when unset.
    pub state_file: Option<PathBuf>,

    /// Extra TOML file holding `[[feeds]]` records, appended after the inline
    /// ones. Relative paths resolve against the config file's directory.
    pub feeds_file: Option<PathBuf>,

    /// Worker pool size. 0 = default.
    pub workers: usize,

    /// Per-fetch timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            state_file: None,
            feeds_file: None,
            workers: 0,
            timeout_secs: 30,
        }
    }
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One `[[feeds]]` record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uri: String,
    #[serde(flatten)]
    pub filters: FilterPatterns,
}

/// Layout of a standalone feeds file: only `[[feeds]]` records.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedsDocument {
    feeds: Vec<FeedConfig>,
}

impl FeedConfig {
    /// Compiles this record into a [`Subscription`].
    pub fn subscription(&self) -> Result<Subscription, SubscriptionError> {
        Subscription::with_filters(self.id.as_str(), self.uri.as_str(), &self.filters)
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = Self::read_capped(path)? else {
            tracing::debug!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["crawler", "feeds"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(&content)?;

        if let Some(feeds_file) = &config.crawler.feeds_file {
            let feeds_path = match path.parent() {
                Some(dir) if feeds_file.is_relative() => dir.join(feeds_file),
                _ => feeds_file.clone(),
            };
            let feeds = Self::load_feeds(&feeds_path).map_err(|e| ConfigError::FeedsFile {
                path: feeds_path.clone(),
                source: Box::new(e),
            })?;
            config.feeds.extend(feeds);
        }

        tracing::info!(path = %path.display(), feeds = config.feeds.len(), "Loaded configuration");
        Ok(config)
    }

    /// Loads the `[[feeds]]` records of a standalone feeds file.
    ///
    /// Unlike [`Config::load`], a missing feeds file is an error; an empty one
    /// holds no feeds.
    pub fn load_feeds(path: &Path) -> Result<Vec<FeedConfig>, ConfigError> {
        let content = Self::read_capped(path)?.ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document: FeedsDocument = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), feeds = document.feeds.len(), "Loaded feeds file");
        Ok(document.feeds)
    }

    /// Reads a file no larger than [`Self::MAX_FILE_SIZE`]; `None` when it
    /// does not exist.
    fn read_capped(path: &Path) -> Result<Option<String>, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "{} is {} bytes (max {} bytes)",
                    path.display(),
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        match std::fs::read_to_string(path) {
            Ok(c) => Ok(Some(c)),
            // Race condition: file deleted between metadata and read
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Looks for `name` in the current directory, then next to the executable.
    pub fn find(name: &str) -> Option<PathBuf> {
        let candidates = [
            std::env::current_dir().ok(),
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
        ];

        candidates
            .into_iter()
            .flatten()
            .map(|dir| dir.join(name))
            .find(|file| file.is_file())
    }

    /// Compiles every `[[feeds]]` record, in file order.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingField`] - a record has an empty `id` or `uri`
    /// - [`ConfigError::DuplicateFeedId`] - two records share an `id`
    /// - [`ConfigError::Subscription`] - a filter pattern does not compile
    pub fn subscriptions(&self) -> Result<Vec<Subscription>, ConfigError> {
        let mut seen = HashSet::new();
        let mut subscriptions = Vec::with_capacity(self.feeds.len());

        for (index, feed) in self.feeds.iter().enumerate() {
            if feed.id.is_empty() {
                return Err(ConfigError::MissingField { index, field: "id" });
            }
            if feed.uri.is_empty() {
                return Err(ConfigError::MissingField { index, field: "uri" });
            }
            if !seen.insert(feed.id.as_str()) {
                return Err(ConfigError::DuplicateFeedId(feed.id.clone()));
            }
            subscriptions.push(feed.subscription()?);
        }

        Ok(subscriptions)
    }
}

// ============================================================================
// Tests
// ============================================================================
