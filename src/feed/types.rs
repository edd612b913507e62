use chrono::{DateTime, Utc};

/// A fetched feed, normalized from RSS, Atom or JSON Feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    pub title: String,
    /// Website link. Empty when the source carried none.
    pub link: String,
    pub description: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Items in document order.
    pub items: Vec<Item>,
}

/// A single entry of a [`Feed`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub title: String,
    /// Article link. Empty when the source carried none.
    pub link: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<Person>,
    pub categories: Vec<String>,
    /// Stable identifier; synthesized when the source has none.
    pub guid: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub name: String,
    pub email: Option<String>,
}
