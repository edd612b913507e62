//! Timestamp-based novelty detection.
//!
//! An item is new when its content time (the later of its published and
//! updated timestamps) is strictly after the feed's cutoff and the
//! subscription accepts it. A missing cutoff means "never crawled"; an item
//! with no timestamps at all is never new.

use chrono::{DateTime, Utc};

use super::subscription::Subscription;
use crate::feed::{Feed, Item};

/// The later of two optional timestamps.
pub fn latest_time(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

pub fn item_time(item: &Item) -> Option<DateTime<Utc>> {
    latest_time(item.published, item.updated)
}

/// Latest timestamp across the feed itself and every item in it.
pub fn latest_feed_time(feed: &Feed) -> Option<DateTime<Utc>> {
    feed.items
        .iter()
        .map(item_time)
        .fold(latest_time(feed.published, feed.updated), latest_time)
}

/// True when the item's content time is strictly after `cutoff`.
pub fn is_newer(item: &Item, cutoff: Option<DateTime<Utc>>) -> bool {
    match (item_time(item), cutoff) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(t), Some(cutoff)) => t > cutoff,
    }
}

/// Items of `feed` that are new for `subscription`, in feed order.
pub fn select_new_items(
    subscription: &Subscription,
    cutoff: Option<DateTime<Utc>>,
    feed: &Feed,
) -> Vec<Item> {
    feed.items
        .iter()
        .filter(|item| is_newer(item, cutoff) && subscription.accepts(item))
        .cloned()
        .collect()
}
