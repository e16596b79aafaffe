use url::Url;

/// Tracking query parameters dropped during normalization
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Normalizes a URL into the form used for visited-set comparisons
///
/// # Normalization Steps
///
/// 1. Remove the fragment
/// 2. Remove tracking query parameters (`utm_*`, `fbclid`, `gclid`, `mc_eid`)
/// 3. Sort the remaining query parameters by key
/// 4. Drop an empty query string
/// 5. Remove a trailing slash from non-root paths
///
/// Scheme and host are left alone: they select a different resource.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_sift::url::normalize_url;
///
/// let url = Url::parse("https://example.com/list/?page=2&utm_source=x#top").unwrap();
/// assert_eq!(normalize_url(&url).as_str(), "https://example.com/list?page=2");
/// ```
pub fn normalize_url(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
    }

    url
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
