use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::crawl::novelty::latest_feed_time;
use crate::crawl::FeedId;
use crate::feed::Feed;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read state file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed state file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Per-feed crawl bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    /// Last fetch attempt, successful or not.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "zero_time_as_none"
    )]
    pub crawled_at: Option<DateTime<Utc>>,

    /// Latest content timestamp seen on the last successful fetch; the
    /// novelty cutoff for the next crawl.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "zero_time_as_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Unix timestamp of 0001-01-01T00:00:00Z, which older state files use for "never".
const ZERO_TIME: i64 = -62_135_596_800;

fn zero_time_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let time = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(time.filter(|t| t.timestamp() != ZERO_TIME))
}

/// Mapping from feed identifier to its [`CrawlState`].
///
/// Loaded once before a crawl, mutated only by the crawl's control task and
/// written back in full afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateStore {
    entries: BTreeMap<FeedId, CrawlState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from a JSON file.
    ///
    /// - Missing file → empty store
    /// - Whitespace-only file → empty store
    /// - Unparseable content → `Err(StateError::Parse)`
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No state file found, starting fresh");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "State file is empty, starting fresh");
            return Ok(Self::default());
        }

        let store: Self = serde_json::from_str(&content).map_err(|source| StateError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), feeds = store.len(), "Loaded crawl state");
        Ok(store)
    }

    /// Writes the whole store to `path`, replacing any previous content.
    ///
    /// The JSON is written to a sibling temp file and renamed over the
    /// target, so readers never observe a partial file.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let json = serde_json::to_vec_pretty(self)?;
        let temp_path = temp_path_for(path);
        let result = (|| -> std::io::Result<()> {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
            drop(file);

            // On Windows, rename fails if destination exists
            #[cfg(windows)]
            if path.exists() {
                std::fs::remove_file(path)?;
            }

            std::fs::rename(&temp_path, path)
        })();

        if let Err(source) = result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StateError::Write {
                path: path.to_path_buf(),
                source,
            });
        }

        tracing::debug!(path = %path.display(), feeds = self.len(), "Saved crawl state");
        Ok(())
    }

    pub fn get(&self, id: &FeedId) -> Option<&CrawlState> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, id: FeedId, state: CrawlState) {
        self.entries.insert(id, state);
    }

    /// Novelty cutoff for a feed; `None` when nothing has been seen yet.
    pub fn cutoff(&self, id: &FeedId) -> Option<DateTime<Utc>> {
        self.entries.get(id).and_then(|s| s.updated_at)
    }

    /// Records the outcome of one fetch.
    ///
    /// `crawled_at` always moves to `now`. On success (`feed` is `Some`),
    /// `updated_at` is overwritten with the latest timestamp across the feed
    /// and all of its items, whether or not they passed the subscription's
    /// filters. It is left alone on failure and when the feed carries no
    /// timestamps at all.
    pub fn record(&mut self, id: &FeedId, now: DateTime<Utc>, feed: Option<&Feed>) {
        let state = self.entries.entry(id.clone()).or_default();
        state.crawled_at = Some(now);
        if let Some(latest) = feed.and_then(latest_feed_time) {
            state.updated_at = Some(latest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeedId, &CrawlState)> {
        self.entries.iter()
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Item;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn feed(times: &[i64]) -> Feed {
        Feed {
            items: times
                .iter()
                .map(|&t| Item {
                    published: Some(at(t)),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(&dir.path().join("missing.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "  \n").unwrap();
        assert!(StateStore::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = StateStore::load(&path).unwrap_err();
        assert!(matches!(err, StateError::Parse { .. }));
        assert!(err.to_string().contains("state.json"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = StateStore::new();
        store.record(&FeedId::from("foo"), at(100), Some(&feed(&[10, 30, 20])));
        store.record(&FeedId::from("bar"), at(100), None);
        store.save(&path).unwrap();

        let loaded = StateStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.cutoff(&FeedId::from("foo")), Some(at(30)));
        assert_eq!(loaded.cutoff(&FeedId::from("bar")), None);
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{\"stale\": {}}").unwrap();

        StateStore::new().save(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "{}");
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let mut store = StateStore::new();
        store.record(&FeedId::from("foo"), at(0), None);
        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "foo": { "crawled_at": "2023-11-14T22:13:20Z" } })
        );
    }

    #[test]
    fn test_zero_time_loads_as_absent() {
        let store: StateStore = serde_json::from_str(
            r#"{"foo": {"crawled_at": "2016-04-12T09:00:00+09:00", "updated_at": "0001-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        let state = store.get(&FeedId::from("foo")).unwrap();
        assert_eq!(
            state.crawled_at,
            Some(Utc.with_ymd_and_hms(2016, 4, 12, 0, 0, 0).unwrap())
        );
        assert_eq!(state.updated_at, None);
    }

    #[test]
    fn test_record_failure_keeps_cutoff() {
        let id = FeedId::from("foo");
        let mut store = StateStore::new();
        store.record(&id, at(100), Some(&feed(&[10, 20])));
        store.record(&id, at(200), None);

        let state = store.get(&id).unwrap();
        assert_eq!(state.crawled_at, Some(at(200)));
        assert_eq!(state.updated_at, Some(at(20)));
    }

    #[test]
    fn test_record_overwrites_without_clamping() {
        let id = FeedId::from("foo");
        let mut store = StateStore::new();
        store.record(&id, at(100), Some(&feed(&[50])));
        store.record(&id, at(200), Some(&feed(&[40])));
        assert_eq!(store.cutoff(&id), Some(at(40)));
    }

    #[test]
    fn test_record_undated_feed_keeps_cutoff() {
        let id = FeedId::from("foo");
        let mut store = StateStore::new();
        store.record(&id, at(100), Some(&feed(&[50])));
        store.record(&id, at(200), Some(&Feed::default()));
        assert_eq!(store.cutoff(&id), Some(at(50)));
        assert_eq!(store.get(&id).unwrap().crawled_at, Some(at(200)));
    }
}
