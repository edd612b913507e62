use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::feed::{Item, Person};

/// Caller-assigned identifier of a feed, stable across crawls.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(String);

impl FeedId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeedId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FeedId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for FeedId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The item field a filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Title,
    Description,
    Content,
    Author,
    Category,
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Content => "content",
            Self::Author => "author",
            Self::Category => "category",
        })
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("feed.{id}: invalid {field}_filter: {source}")]
    InvalidFilter {
        id: FeedId,
        field: FilterField,
        #[source]
        source: regex::Error,
    },
}

/// Uncompiled filter patterns, as they appear in configuration.
///
/// An absent or empty pattern leaves that field unfiltered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterPatterns {
    #[serde(rename = "title_filter")]
    pub title: Option<String>,
    #[serde(rename = "description_filter")]
    pub description: Option<String>,
    #[serde(rename = "content_filter")]
    pub content: Option<String>,
    #[serde(rename = "author_filter")]
    pub author: Option<String>,
    #[serde(rename = "category_filter")]
    pub category: Option<String>,
}

/// Compiled per-field matchers. Every configured matcher must accept an item.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    title: Option<Regex>,
    description: Option<Regex>,
    content: Option<Regex>,
    author: Option<Regex>,
    category: Option<Regex>,
}

impl FilterSet {
    /// Compiles `patterns`, naming the subscription and field on failure.
    pub fn compile(id: &FeedId, patterns: &FilterPatterns) -> Result<Self, SubscriptionError> {
        let compile = |field: FilterField, pattern: &Option<String>| -> Result<_, SubscriptionError> {
            match pattern.as_deref() {
                None | Some("") => Ok(None),
                Some(p) => Regex::new(p)
                    .map(Some)
                    .map_err(|source| SubscriptionError::InvalidFilter {
                        id: id.clone(),
                        field,
                        source,
                    }),
            }
        };

        Ok(Self {
            title: compile(FilterField::Title, &patterns.title)?,
            description: compile(FilterField::Description, &patterns.description)?,
            content: compile(FilterField::Content, &patterns.content)?,
            author: compile(FilterField::Author, &patterns.author)?,
            category: compile(FilterField::Category, &patterns.category)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.content.is_none()
            && self.author.is_none()
            && self.category.is_none()
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(re) = &self.author {
            if !match_author(re, item.author.as_ref()) {
                return false;
            }
        }
        if let Some(re) = &self.category {
            if !item.categories.iter().any(|c| match_str(re, c)) {
                return false;
            }
        }
        if let Some(re) = &self.title {
            if !match_str(re, &item.title) {
                return false;
            }
        }
        if let Some(re) = &self.description {
            if !match_str(re, item.description.as_deref().unwrap_or_default()) {
                return false;
            }
        }
        if let Some(re) = &self.content {
            if !match_str(re, item.content.as_deref().unwrap_or_default()) {
                return false;
            }
        }
        true
    }
}

fn match_author(re: &Regex, author: Option<&Person>) -> bool {
    let Some(author) = author else {
        return false;
    };
    match_str(re, &author.name) || match_str(re, author.email.as_deref().unwrap_or_default())
}

// Empty fields never match, even for patterns like `.*`.
fn match_str(re: &Regex, value: &str) -> bool {
    !value.is_empty() && re.is_match(value)
}

/// Caller-supplied acceptance test, evaluated after the field filters.
pub type ItemPredicate = Arc<dyn Fn(&Item) -> bool + Send + Sync>;

/// One feed to poll: its identifier, source URI and acceptance rules.
///
/// Cloning is cheap; workers each receive their own copy.
#[derive(Clone)]
pub struct Subscription {
    id: FeedId,
    uri: String,
    filters: FilterSet,
    predicate: Option<ItemPredicate>,
}

impl Subscription {
    /// A subscription that accepts every item.
    pub fn new(id: impl Into<FeedId>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            filters: FilterSet::default(),
            predicate: None,
        }
    }

    /// A subscription with compiled field filters.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::InvalidFilter`] for the first pattern that
    /// fails to compile.
    pub fn with_filters(
        id: impl Into<FeedId>,
        uri: impl Into<String>,
        patterns: &FilterPatterns,
    ) -> Result<Self, SubscriptionError> {
        let mut subscription = Self::new(id, uri);
        subscription.filters = FilterSet::compile(&subscription.id, patterns)?;
        Ok(subscription)
    }

    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn id(&self) -> &FeedId {
        &self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// True when the item passes every configured filter and the predicate.
    pub fn accepts(&self, item: &Item) -> bool {
        if !self.filters.matches(item) {
            return false;
        }
        self.predicate.as_ref().is_none_or(|p| p(item))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("filters", &self.filters)
            .field("predicate", &self.predicate.as_ref().map(|_| "Fn(&Item) -> bool"))
            .finish()
    }
}
