//! Concurrent crawling and incremental novelty detection.
//!
//! - [`subscription`] - what to poll and which items to accept
//! - [`novelty`] - deciding which items are new relative to a cutoff
//! - [`dispatcher`] - the worker pool that drives a crawl and owns state updates
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use feedcrawl::crawl::{Crawler, Subscription};
//! use feedcrawl::feed::HttpFetcher;
//!
//! let crawler = Crawler::new(Arc::new(HttpFetcher::new(reqwest::Client::new())))
//!     .with_workers(4)
//!     .with_state_file("feedcrawl-state.json");
//! let subscriptions = vec![Subscription::new("rust", "https://blog.rust-lang.org/feed.xml")];
//! crawler
//!     .crawl_with(&subscriptions, None, |result| {
//!         for item in result.new_items() {
//!             println!("{}", item.title);
//!         }
//!     })
//!     .await?;
//! ```

mod dispatcher;
pub mod novelty;
mod subscription;

pub use dispatcher::{CrawlError, CrawlResult, Crawler, FeedUpdate, DEFAULT_WORKERS};
pub use subscription::{
    FeedId, FilterField, FilterPatterns, FilterSet, ItemPredicate, Subscription, SubscriptionError,
};
