//! Persisted per-feed crawl state.

mod store;

pub use store::{CrawlState, StateError, StateStore};
