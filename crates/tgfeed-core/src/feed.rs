//! Feed rendering (RSS 2.0, Atom 1.0, JSON Feed 1).
//!
//! The XML is written by hand; every text node and attribute goes through
//! `escape_xml`.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::{
    domain::Message,
    formatting::{escape_xml, generate_title},
    Result,
};

const GENERATOR: &str = "Telegram RSS Feed Generator";
const LANGUAGE: &str = "en";
const COPYRIGHT: &str = "All rights reserved";

/// Output format selected by the `format` query parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FeedFormat {
    #[default]
    Rss,
    Atom,
    Json,
}

impl FeedFormat {
    /// Unknown values fall back to RSS.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("atom") => FeedFormat::Atom,
            Some("json") => FeedFormat::Json,
            _ => FeedFormat::Rss,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            FeedFormat::Rss => "application/rss+xml",
            FeedFormat::Atom => "application/atom+xml",
            FeedFormat::Json => "application/json",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub id: String,
    pub link: String,
    pub description: String,
    pub date: DateTime<Utc>,
}

/// One channel rendered as a feed.
#[derive(Clone, Debug)]
pub struct ChannelFeed {
    channel: String,
    updated: DateTime<Utc>,
    items: Vec<FeedItem>,
}

pub fn channel_url(channel: &str) -> String {
    format!("https://t.me/{channel}")
}

impl ChannelFeed {
    pub fn new(channel: &str, updated: DateTime<Utc>) -> Self {
        Self {
            channel: channel.to_string(),
            updated,
            items: Vec::new(),
        }
    }

    pub fn title(&self) -> String {
        format!("Telegram Channel: {}", self.channel)
    }

    pub fn description(&self) -> String {
        format!("RSS Feed for Telegram channel {}", self.channel)
    }

    pub fn id(&self) -> String {
        format!("telegram-{}", self.channel)
    }

    pub fn link(&self) -> String {
        channel_url(&self.channel)
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    /// Add messages as items (blank bodies are skipped), newest first.
    pub fn add_messages(&mut self, messages: &[Message]) {
        for m in messages.iter().filter(|m| m.has_body()) {
            let link = m
                .link
                .clone()
                .unwrap_or_else(|| format!("{}/{}", self.link(), m.id));
            self.items.push(FeedItem {
                title: generate_title(&m.text),
                id: m.id.to_string(),
                link,
                description: m.text.clone(),
                date: DateTime::from_timestamp(m.date, 0).unwrap_or_default(),
            });
        }
        // Stable sort keeps discovery order for equal dates.
        self.items.sort_by(|a, b| b.date.cmp(&a.date));
    }

    pub fn render(&self, format: FeedFormat) -> Result<String> {
        Ok(match format {
            FeedFormat::Rss => self.rss2(),
            FeedFormat::Atom => self.atom1(),
            FeedFormat::Json => self.json1()?,
        })
    }

    pub fn rss2(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str("<rss version=\"2.0\">\n    <channel>\n");
        let _ = write!(
            out,
            "        <title>{}</title>\n\
             \x20       <link>{}</link>\n\
             \x20       <description>{}</description>\n\
             \x20       <lastBuildDate>{}</lastBuildDate>\n\
             \x20       <docs>https://validator.w3.org/feed/docs/rss2.html</docs>\n\
             \x20       <generator>{}</generator>\n\
             \x20       <language>{}</language>\n\
             \x20       <copyright>{}</copyright>\n",
            escape_xml(&self.title()),
            escape_xml(&self.link()),
            escape_xml(&self.description()),
            self.updated.to_rfc2822(),
            GENERATOR,
            LANGUAGE,
            COPYRIGHT,
        );
        for item in &self.items {
            let _ = write!(
                out,
                "        <item>\n\
                 \x20           <title>{}</title>\n\
                 \x20           <link>{}</link>\n\
                 \x20           <guid isPermaLink=\"false\">{}</guid>\n\
                 \x20           <pubDate>{}</pubDate>\n\
                 \x20           <description>{}</description>\n\
                 \x20       </item>\n",
                escape_xml(&item.title),
                escape_xml(&item.link),
                escape_xml(&item.id),
                item.date.to_rfc2822(),
                escape_xml(&item.description),
            );
        }
        out.push_str("    </channel>\n</rss>");
        out
    }

    pub fn atom1(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
        let _ = write!(
            out,
            "    <id>{}</id>\n\
             \x20   <title>{}</title>\n\
             \x20   <updated>{}</updated>\n\
             \x20   <generator>{}</generator>\n\
             \x20   <link rel=\"alternate\" href=\"{}\"/>\n\
             \x20   <subtitle>{}</subtitle>\n\
             \x20   <rights>{}</rights>\n",
            escape_xml(&self.id()),
            escape_xml(&self.title()),
            rfc3339(self.updated),
            GENERATOR,
            escape_xml(&self.link()),
            escape_xml(&self.description()),
            COPYRIGHT,
        );
        for item in &self.items {
            let _ = write!(
                out,
                "    <entry>\n\
                 \x20       <title type=\"html\">{}</title>\n\
                 \x20       <id>{}</id>\n\
                 \x20       <link href=\"{}\"/>\n\
                 \x20       <updated>{}</updated>\n\
                 \x20       <summary type=\"html\">{}</summary>\n\
                 \x20   </entry>\n",
                escape_xml(&item.title),
                escape_xml(&item.id),
                escape_xml(&item.link),
                rfc3339(item.date),
                escape_xml(&item.description),
            );
        }
        out.push_str("</feed>");
        out
    }

    pub fn json1(&self) -> Result<String> {
        let doc = JsonFeed {
            version: "https://jsonfeed.org/version/1",
            title: self.title(),
            home_page_url: self.link(),
            description: self.description(),
            items: self
                .items
                .iter()
                .map(|item| JsonFeedItem {
                    id: &item.id,
                    content_html: &item.description,
                    url: &item.link,
                    title: &item.title,
                    summary: &item.description,
                    date_modified: rfc3339(item.date),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

fn rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize)]
struct JsonFeed<'a> {
    version: &'static str,
    title: String,
    home_page_url: String,
    description: String,
    items: Vec<JsonFeedItem<'a>>,
}

#[derive(Serialize)]
struct JsonFeedItem<'a> {
    id: &'a str,
    content_html: &'a str,
    url: &'a str,
    title: &'a str,
    summary: &'a str,
    date_modified: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;

    fn msg(id: u64, text: &str, date: i64) -> Message {
        Message {
            id: MessageId(id),
            text: text.to_string(),
            date,
            link: None,
        }
    }

    fn feed(messages: &[Message]) -> ChannelFeed {
        let updated = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut f = ChannelFeed::new("durov", updated);
        f.add_messages(messages);
        f
    }

    #[test]
    fn format_parsing_defaults_to_rss() {
        assert_eq!(FeedFormat::parse(None), FeedFormat::Rss);
        assert_eq!(FeedFormat::parse(Some("ATOM")), FeedFormat::Atom);
        assert_eq!(FeedFormat::parse(Some("json")), FeedFormat::Json);
        assert_eq!(FeedFormat::parse(Some("yaml")), FeedFormat::Rss);
        assert_eq!(FeedFormat::Atom.content_type(), "application/atom+xml");
    }

    #[test]
    fn items_are_sorted_newest_first_and_blank_bodies_skipped() {
        let f = feed(&[msg(1, "old", 100), msg(2, " ", 150), msg(3, "new", 200)]);
        let ids: Vec<&str> = f.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn item_fields_follow_the_message() {
        let long = "z".repeat(150);
        let mut linked = msg(8, "Hello\nworld", 100);
        linked.link = Some("https://example.com/post".to_string());
        let f = feed(&[linked, msg(9, &long, 50)]);

        let first = &f.items()[0];
        assert_eq!(first.title, "Hello");
        assert_eq!(first.description, "Hello\nworld");
        assert_eq!(first.link, "https://example.com/post");

        let second = &f.items()[1];
        assert_eq!(second.title, format!("{}...", "z".repeat(97)));
        assert_eq!(second.link, "https://t.me/durov/9");
        assert_eq!(second.date.timestamp(), 50);
    }

    #[test]
    fn rss_contains_channel_metadata_and_escaped_items() {
        let f = feed(&[msg(5, "Tom & Jerry <3", 1_700_000_000)]);
        let xml = f.rss2();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<title>Telegram Channel: durov</title>"));
        assert!(xml.contains("<link>https://t.me/durov</link>"));
        assert!(xml.contains("<generator>Telegram RSS Feed Generator</generator>"));
        assert!(xml.contains("<guid isPermaLink=\"false\">5</guid>"));
        assert!(xml.contains("<description>Tom &amp; Jerry &lt;3</description>"));
        assert!(xml.contains("<pubDate>Tue, 14 Nov 2023 22:13:20 +0000</pubDate>"));
        assert!(xml.ends_with("</rss>"));
    }

    #[test]
    fn atom_uses_rfc3339_dates() {
        let f = feed(&[msg(5, "hi", 1_700_000_000)]);
        let xml = f.atom1();

        assert!(xml.contains("<feed xmlns=\"http://www.w3.org/2005/Atom\">"));
        assert!(xml.contains("<id>telegram-durov</id>"));
        assert!(xml.contains("<updated>2023-11-14T22:13:20.000Z</updated>"));
        assert!(xml.contains("<link href=\"https://t.me/durov/5\"/>"));
        assert!(xml.ends_with("</feed>"));
    }

    #[test]
    fn json_feed_lists_items_in_order() {
        let f = feed(&[msg(1, "a", 10), msg(2, "b", 20)]);
        let v: serde_json::Value = serde_json::from_str(&f.json1().unwrap()).unwrap();

        assert_eq!(v["version"], "https://jsonfeed.org/version/1");
        assert_eq!(v["title"], "Telegram Channel: durov");
        assert_eq!(v["items"][0]["id"], "2");
        assert_eq!(v["items"][1]["url"], "https://t.me/durov/1");
        assert_eq!(v["items"][1]["summary"], "a");
    }

    #[test]
    fn empty_feed_still_renders() {
        let f = feed(&[]);
        assert!(f.render(FeedFormat::Rss).unwrap().contains("<channel>"));
        assert!(f.render(FeedFormat::Atom).unwrap().contains("<feed"));
        let v: serde_json::Value =
            serde_json::from_str(&f.render(FeedFormat::Json).unwrap()).unwrap();
        assert!(v["items"].as_array().unwrap().is_empty());
    }
}
