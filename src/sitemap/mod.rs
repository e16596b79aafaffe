//! Sitemap expansion
//!
//! Flattens a sitemap or sitemap index document into its `<loc>` entries.
//! Nested sitemaps are returned, not fetched; re-feeding them is up to the
//! caller (see `Harvester::discover_from_sitemap`).

use quick_xml::events::Event;
use quick_xml::Reader;

/// What a `<loc>` entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A `<url>` entry: a page to crawl
    Page,
    /// A `<sitemap>` entry of a sitemap index
    Sitemap,
}

/// One `<loc>` entry of a sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub kind: EntryKind,
}

/// Parses a sitemap document into its entries, in document order
///
/// Only `<loc>` elements directly inside `<url>` or `<sitemap>` count, so
/// extension elements such as `image:loc` are skipped. Malformed markup
/// yields an empty list.
pub fn expand_entries(markup: &str) -> Vec<SitemapEntry> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut loc_text: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if name == "loc" && entry_kind(stack.last()).is_some() {
                    loc_text = Some(String::new());
                }
                stack.push(name);
            }
            Ok(Event::Text(e)) => {
                if let Some(text) = loc_text.as_mut() {
                    match e.unescape() {
                        Ok(t) => text.push_str(&t),
                        Err(_) => return Vec::new(),
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(text) = loc_text.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let name = stack.pop();
                if name.as_deref() == Some("loc") {
                    if let (Some(text), Some(kind)) = (loc_text.take(), entry_kind(stack.last())) {
                        let loc = text.trim();
                        if !loc.is_empty() {
                            entries.push(SitemapEntry {
                                loc: loc.to_string(),
                                kind,
                            });
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("Malformed sitemap at byte {}: {}", reader.buffer_position(), e);
                return Vec::new();
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        tracing::debug!("Sitemap ended with unclosed <{}>", stack.join("><"));
        return Vec::new();
    }

    entries
}

/// Parses a sitemap document into a flat list of URLs
///
/// Page entries and nested sitemap pointers are returned together in
/// document order.
///
/// # Examples
///
/// ```
/// use sumi_sift::sitemap::expand;
///
/// let xml = r#"<urlset><url><loc>https://example.com/a</loc></url></urlset>"#;
/// assert_eq!(expand(xml), vec!["https://example.com/a".to_string()]);
/// assert!(expand("<urlset><url><loc>").is_empty());
/// ```
pub fn expand(markup: &str) -> Vec<String> {
    expand_entries(markup).into_iter().map(|e| e.loc).collect()
}

fn entry_kind(parent: Option<&String>) -> Option<EntryKind> {
    match parent.map(String::as_str) {
        Some("url") => Some(EntryKind::Page),
        Some("sitemap") => Some(EntryKind::Sitemap),
        _ => None,
    }
}
