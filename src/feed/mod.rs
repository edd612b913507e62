//! Feed retrieval for the crawler.
//!
//! - [`types`] - the normalized [`Feed`]/[`Item`] model the crawler works on
//! - [`parser`] - RSS/Atom/JSON parsing with the `feed-rs` crate
//! - [`atom`] - link repair for Atom sources
//! - [`fetcher`] - the [`FeedFetcher`] seam and its HTTP implementation
//!
//! # Example
//!
//! ```ignore
//! use feedcrawl::feed::{FeedFetcher, HttpFetcher};
//!
//! let fetcher = HttpFetcher::new(reqwest::Client::new());
//! let feed = fetcher.fetch("https://example.com/feed.xml").await?;
//! ```

mod atom;
mod fetcher;
mod parser;
mod types;

pub use atom::repair_links;
pub use fetcher::{FeedFetcher, FetchError, HttpFetcher};
pub use parser::parse_feed;
pub use types::{Feed, Item, Person};
