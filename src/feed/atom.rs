//! Link repair for Atom sources.
//!
//! feed-rs reports every Atom link with a `rel` (`alternate` when the
//! document omits one), and some documents leave links out entirely and rely
//! on a URL-shaped `<id>`. The default translation only picks up links
//! without a `rel`, so Atom feeds and items arrive here with an empty link.
//! [`repair_links`] fills those gaps and leaves populated links untouched.

use feed_rs::model;
use url::Url;

use super::types::Feed;

/// Fills empty feed and item links from the raw Atom document.
///
/// For each empty link: prefer the first `rel="alternate"` link, else use the
/// identifier when it is an absolute URI or starts with `//`. Items are
/// matched to their entries by GUID.
pub fn repair_links(raw: &model::Feed, feed: &mut Feed) {
    if feed.link.is_empty() {
        feed.link = extract_link(&raw.links, &raw.id);
    }

    for item in feed.items.iter_mut().filter(|item| item.link.is_empty()) {
        if let Some(entry) = raw.entries.iter().find(|e| e.id.trim() == item.guid) {
            item.link = extract_link(&entry.links, &entry.id);
        }
    }
}

fn extract_link(links: &[model::Link], id: &str) -> String {
    if let Some(link) = links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
    {
        return link.href.clone();
    }

    if is_url(id) {
        return id.to_string();
    }

    String::new()
}

fn is_url(value: &str) -> bool {
    value.starts_with("//") || Url::parse(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::parse_feed;

    fn atom(entries: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Example</title>
    <id>https://example.com/</id>
    <updated>2024-01-01T00:00:00Z</updated>
    {entries}
</feed>"#
        )
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/posts/1"));
        assert!(is_url("//example.com/posts/1"));
        assert!(is_url("urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6"));
        assert!(!is_url("entry-1"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_feed_link_falls_back_to_id() {
        let feed = parse_feed(atom("").as_bytes()).unwrap();
        assert_eq!(feed.link, "https://example.com/");
    }

    #[test]
    fn test_feed_alternate_link_wins_over_id() {
        let doc = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Example</title>
    <id>https://example.com/</id>
    <link rel="self" href="https://example.com/feed.atom"/>
    <link rel="alternate" href="https://example.com/blog/"/>
    <updated>2024-01-01T00:00:00Z</updated>
</feed>"#;
        let feed = parse_feed(doc.as_bytes()).unwrap();
        assert_eq!(feed.link, "https://example.com/blog/");
    }

    #[test]
    fn test_alternate_link_used_for_entry() {
        let doc = atom(
            r#"<entry>
                <id>entry-1</id>
                <title>First</title>
                <updated>2024-01-01T00:00:00Z</updated>
                <link rel="self" href="https://example.com/api/1"/>
                <link rel="alternate" href="https://example.com/posts/1"/>
            </entry>"#,
        );
        let feed = parse_feed(doc.as_bytes()).unwrap();
        assert_eq!(feed.items[0].link, "https://example.com/posts/1");
    }

    #[test]
    fn test_entry_id_used_when_url() {
        let doc = atom(
            r#"<entry>
                <id>https://example.com/posts/2</id>
                <title>Second</title>
                <updated>2024-01-01T00:00:00Z</updated>
                <link rel="self" href="https://example.com/api/2"/>
            </entry>"#,
        );
        let feed = parse_feed(doc.as_bytes()).unwrap();
        assert_eq!(feed.items[0].link, "https://example.com/posts/2");
    }

    #[test]
    fn test_entry_without_usable_link_stays_empty() {
        let doc = atom(
            r#"<entry>
                <id>entry-3</id>
                <title>Third</title>
                <updated>2024-01-01T00:00:00Z</updated>
                <link rel="related" href="https://elsewhere.example.com/"/>
            </entry>"#,
        );
        let feed = parse_feed(doc.as_bytes()).unwrap();
        assert_eq!(feed.items[0].link, "");
    }

    #[test]
    fn test_existing_link_is_kept() {
        let doc = atom(
            r#"<entry>
                <id>https://example.com/posts/4</id>
                <title>Fourth</title>
                <updated>2024-01-01T00:00:00Z</updated>
                <link href="https://example.com/plain/4"/>
            </entry>"#,
        );
        let feed = parse_feed(doc.as_bytes()).unwrap();
        assert_eq!(feed.items[0].link, "https://example.com/plain/4");
    }
}
