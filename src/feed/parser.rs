use anyhow::Result;
use feed_rs::model::{self, FeedType};
use feed_rs::parser;

use super::atom::repair_links;
use super::types::{Feed, Item, Person};

/// Parses an RSS/Atom/JSON feed document into a [`Feed`].
///
/// Item GUIDs are the entry identifiers feed-rs reports; it derives one from
/// the entry content when the document has none.
///
/// For RSS and JSON sources the link is the first link without a `rel`, else
/// the first link of any kind. feed-rs tags every Atom link with a `rel`
/// (`alternate` when the document omits it), so Atom links are left empty
/// here and filled in by [`repair_links`].
pub fn parse_feed(bytes: &[u8]) -> Result<Feed> {
    let raw = parser::parse(bytes)?;
    let is_atom = matches!(raw.feed_type, FeedType::Atom);
    let lenient = !is_atom;

    let items = raw
        .entries
        .iter()
        .map(|entry| translate_entry(entry, lenient))
        .collect();

    let mut feed = Feed {
        title: raw.title.as_ref().map(|t| t.content.clone()).unwrap_or_default(),
        link: default_link(&raw.links, lenient),
        description: raw.description.as_ref().map(|d| d.content.clone()),
        published: raw.published,
        updated: raw.updated,
        items,
    };

    if is_atom {
        repair_links(&raw, &mut feed);
    }

    Ok(feed)
}

fn translate_entry(entry: &model::Entry, lenient: bool) -> Item {
    let link = default_link(&entry.links, lenient);
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.clone())
        .unwrap_or_default();
    Item {
        title,
        link,
        description: entry.summary.as_ref().map(|s| s.content.clone()),
        content: entry.content.as_ref().and_then(|c| c.body.clone()),
        author: entry.authors.first().map(|p| Person {
            name: p.name.clone(),
            email: p.email.clone(),
        }),
        categories: entry.categories.iter().map(|c| c.term.clone()).collect(),
        guid: entry.id.trim().to_string(),
        published: entry.published,
        updated: entry.updated,
    }
}

fn default_link(links: &[model::Link], lenient: bool) -> String {
    links
        .iter()
        .find(|l| l.rel.is_none())
        .or_else(|| if lenient { links.first() } else { None })
        .map(|l| l.href.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Foo feed</title>
    <link>http://localhost/foo</link>
    <description>Fake feed</description>
    <item>
        <guid>v1.3.0</guid>
        <title>Version 1.3.0 released!</title>
        <link>http://localhost/foo/v1.3.0</link>
        <description>Version 1.3.0 released!</description>
        <category>release</category>
        <category>news</category>
        <pubDate>Tue, 12 Apr 2016 00:00:00 GMT</pubDate>
    </item>
    <item>
        <title>No guid here</title>
        <link>http://localhost/foo/v1.2.6</link>
    </item>
</channel></rss>"#;

    #[test]
    fn test_parse_rss_fields() {
        let feed = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(feed.title, "Foo feed");
        assert_eq!(feed.link, "http://localhost/foo");
        assert_eq!(feed.description.as_deref(), Some("Fake feed"));
        assert_eq!(feed.items.len(), 2);

        let item = &feed.items[0];
        assert_eq!(item.guid, "v1.3.0");
        assert_eq!(item.title, "Version 1.3.0 released!");
        assert_eq!(item.link, "http://localhost/foo/v1.3.0");
        assert_eq!(item.categories, vec!["release".to_string(), "news".to_string()]);
        assert_eq!(
            item.published,
            Some(Utc.with_ymd_and_hms(2016, 4, 12, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_invalid_document() {
        assert!(parse_feed(b"<not valid xml").is_err());
    }

    #[test]
    fn test_item_without_guid_gets_stable_identifier() {
        let first = parse_feed(RSS.as_bytes()).unwrap();
        let second = parse_feed(RSS.as_bytes()).unwrap();
        let guid = &first.items[1].guid;
        assert!(!guid.is_empty());
        assert_ne!(guid, &first.items[0].guid);
        assert_eq!(guid, &second.items[1].guid);
    }

    #[test]
    fn test_rss_link_without_rel_is_default() {
        let feed = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(feed.items[1].link, "http://localhost/foo/v1.2.6");
    }
}
