//! Polls RSS/Atom feeds concurrently and reports only the items that are new
//! since the previous run.
//!
//! Per-feed progress lives in a [`state::StateStore`] that is diffed against
//! on every crawl and persisted afterwards.

pub mod config;
pub mod crawl;
pub mod feed;
pub mod state;
