//! Next-page signal detection
//!
//! Detection goes through the [`Query`] capability only, so any markup the
//! query implementation understands can be paginated.

use crate::extract::{FieldSpec, Query};
use crate::url::resolve_link;
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Links explicitly marked as the next page
const REL_NEXT_SELECTORS: [&str; 2] = [r#"a[rel~="next"]"#, r#"link[rel~="next"]"#];

/// Conventional next-link classes
const NEXT_CLASS_SELECTORS: [&str; 4] = [
    "a.next",
    "a.pagination-next",
    "a.next-page",
    "li.next a",
];

/// Numbered page lists: (page links, current-page marker)
const PAGE_LIST_SELECTORS: [(&str, &str); 3] = [
    (
        ".pagination a[href]",
        r#".pagination [aria-current="page"], .pagination .current, .pagination .active"#,
    ),
    (
        ".pager a[href]",
        r#".pager [aria-current="page"], .pager .current, .pager .active"#,
    ),
    (
        "a.page-numbers[href]",
        r#".page-numbers.current, .page-numbers[aria-current="page"]"#,
    ),
];

const LOAD_MORE_SELECTORS: [&str; 4] = [
    "button.load-more",
    "a.load-more",
    ".load-more-button",
    "[data-load-more]",
];

const INFINITE_SCROLL_SELECTORS: [&str; 2] = ["[data-infinite-scroll]", ".infinite-scroll"];

/// How a listing page exposes further pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationKind {
    NextLink,
    PageNumbers,
    LoadMore,
    InfiniteScroll,
    None,
}

fn first_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Array(items) => items.into_iter().find_map(first_string),
        _ => None,
    }
}

fn strings(value: Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s],
        Value::Array(items) => items.into_iter().filter_map(first_string).collect(),
        _ => Vec::new(),
    }
}

fn present(query: &dyn Query, markup: &str, selector: &str) -> bool {
    query
        .query(markup, None, &FieldSpec::html(selector))
        .map(|v| !v.is_null())
        .unwrap_or(false)
}

fn link_target(query: &dyn Query, markup: &str, base: &Url, selector: &str) -> Option<Url> {
    let href = query
        .query(markup, Some(base), &FieldSpec::attr(selector, "href"))
        .ok()
        .and_then(first_string)?;
    resolve_link(&href, base)
}

/// Classifies the pagination style of a page
pub fn detect_pagination_kind(markup: &str, query: &dyn Query) -> PaginationKind {
    let has_any = |selectors: &[&str]| selectors.iter().any(|s| present(query, markup, s));

    if has_any(&REL_NEXT_SELECTORS) || has_any(&NEXT_CLASS_SELECTORS) {
        PaginationKind::NextLink
    } else if PAGE_LIST_SELECTORS
        .iter()
        .any(|(links, _)| present(query, markup, links))
    {
        PaginationKind::PageNumbers
    } else if has_any(&LOAD_MORE_SELECTORS) {
        PaginationKind::LoadMore
    } else if has_any(&INFINITE_SCROLL_SELECTORS) {
        PaginationKind::InfiniteScroll
    } else {
        PaginationKind::None
    }
}

/// Locates the next page of `markup`
///
/// Signals are tried in order: relation-marked next links, conventional
/// next-link classes, then the entry numbered one past the current page in
/// a numbered list. The current page number comes from the list's marker
/// when present, else from `page_index + 1`.
pub fn find_next_page(markup: &str, base: &Url, page_index: usize, query: &dyn Query) -> Option<Url> {
    for selector in REL_NEXT_SELECTORS.iter().chain(NEXT_CLASS_SELECTORS.iter()) {
        if let Some(url) = link_target(query, markup, base, selector) {
            return Some(url);
        }
    }

    for (links, current) in PAGE_LIST_SELECTORS {
        if let Some(url) = numbered_next(markup, base, page_index, query, links, current) {
            return Some(url);
        }
    }

    None
}

fn numbered_next(
    markup: &str,
    base: &Url,
    page_index: usize,
    query: &dyn Query,
    links: &str,
    current: &str,
) -> Option<Url> {
    let labels = query
        .query(markup, None, &FieldSpec::text(links).all())
        .map(strings)
        .ok()?;
    if labels.is_empty() {
        return None;
    }
    let hrefs = query
        .query(markup, Some(base), &FieldSpec::attr(links, "href").all())
        .map(strings)
        .ok()?;

    let current_page = query
        .query(markup, None, &FieldSpec::text(current))
        .ok()
        .and_then(first_string)
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(page_index + 1);
    let target = current_page + 1;

    labels
        .iter()
        .zip(hrefs.iter())
        .find(|(label, _)| label.trim().parse::<usize>().ok() == Some(target))
        .and_then(|(_, href)| resolve_link(href, base))
}

/// Builds query-parameter page URLs: `param=start`, `param=start+1`, ...
///
/// An existing `param` in `base` is replaced; other parameters are kept.
pub fn generate_page_urls(base: &Url, param: &str, start: u32, count: u32) -> Vec<Url> {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    (start..start.saturating_add(count))
        .map(|page| {
            let mut url = base.clone();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept.iter())
                .append_pair(param, &page.to_string());
            url
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::HtmlQuery;

    fn base() -> Url {
        Url::parse("https://example.com/list?page=2").unwrap()
    }

    #[test]
    fn test_rel_next_link() {
        let html = r#"<a href="/list?page=9">9</a><a rel="next" href="/list?page=3">Next</a>"#;
        let next = find_next_page(html, &base(), 1, &HtmlQuery);
        assert_eq!(next.unwrap().as_str(), "https://example.com/list?page=3");
    }

    #[test]
    fn test_rel_next_among_other_rels() {
        let html = r#"<a rel="nofollow next" href="p3">Next</a>"#;
        let next = find_next_page(html, &base(), 1, &HtmlQuery);
        assert_eq!(next.unwrap().as_str(), "https://example.com/p3");
    }

    #[test]
    fn test_link_rel_next_in_head() {
        let html = r#"<html><head><link rel="next" href="https://example.com/list?page=3"></head><body></body></html>"#;
        let next = find_next_page(html, &base(), 1, &HtmlQuery);
        assert_eq!(next.unwrap().as_str(), "https://example.com/list?page=3");
    }

    #[test]
    fn test_next_class_link() {
        let html = r#"<a class="pagination-next" href="/list?page=3">&raquo;</a>"#;
        let next = find_next_page(html, &base(), 1, &HtmlQuery);
        assert_eq!(next.unwrap().as_str(), "https://example.com/list?page=3");
    }

    #[test]
    fn test_numbered_list_with_current_marker() {
        let html = r#"
<ul class="pagination">
  <li><a href="/list?page=1">1</a></li>
  <li class="active"><a href="/list?page=2">2</a></li>
  <li><a href="/list?page=3">3</a></li>
</ul>"#;
        let next = find_next_page(html, &base(), 0, &HtmlQuery);
        assert_eq!(next.unwrap().as_str(), "https://example.com/list?page=3");
    }

    #[test]
    fn test_numbered_list_falls_back_to_page_index() {
        let html = r#"
<div class="pager">
  <a href="/list?page=1">1</a>
  <a href="/list?page=2">2</a>
  <a href="/list?page=3">3</a>
</div>"#;
        let next = find_next_page(html, &base(), 0, &HtmlQuery);
        assert_eq!(next.unwrap().as_str(), "https://example.com/list?page=2");
    }

    #[test]
    fn test_numbered_list_last_page() {
        let html = r#"
<div class="pagination">
  <a href="/list?page=1">1</a>
  <span aria-current="page">2</span>
</div>"#;
        assert!(find_next_page(html, &base(), 1, &HtmlQuery).is_none());
    }

    #[test]
    fn test_no_next_signal() {
        assert!(find_next_page("<p>end</p>", &base(), 0, &HtmlQuery).is_none());
    }

    #[test]
    fn test_javascript_next_ignored() {
        let html = r#"<a rel="next" href="javascript:void(0)">Next</a>"#;
        assert!(find_next_page(html, &base(), 0, &HtmlQuery).is_none());
    }

    #[test]
    fn test_detect_kinds() {
        let q = HtmlQuery;
        assert_eq!(
            detect_pagination_kind(r#"<a rel="next" href="/2">n</a>"#, &q),
            PaginationKind::NextLink
        );
        assert_eq!(
            detect_pagination_kind(r#"<div class="pagination"><a href="/2">2</a></div>"#, &q),
            PaginationKind::PageNumbers
        );
        assert_eq!(
            detect_pagination_kind(r#"<button class="load-more">More</button>"#, &q),
            PaginationKind::LoadMore
        );
        assert_eq!(
            detect_pagination_kind(r#"<div data-infinite-scroll="true"></div>"#, &q),
            PaginationKind::InfiniteScroll
        );
        assert_eq!(detect_pagination_kind("<p>x</p>", &q), PaginationKind::None);
    }

    #[test]
    fn test_generate_page_urls() {
        let base = Url::parse("https://example.com/list?sort=new&page=9").unwrap();
        let urls: Vec<String> = generate_page_urls(&base, "page", 1, 3)
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/list?sort=new&page=1",
                "https://example.com/list?sort=new&page=2",
                "https://example.com/list?sort=new&page=3",
            ]
        );
    }

    #[test]
    fn test_generate_zero_pages() {
        assert!(generate_page_urls(&base(), "page", 1, 0).is_empty());
    }
}
