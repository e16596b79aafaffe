//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and drive the full
//! fetch, extract and deduplicate cycle end-to-end over real HTTP.

use serde_json::json;
use std::time::{Duration, Instant};
use sumi_sift::config::{Config, OutputFormat};
use sumi_sift::crawler::harvest;
use sumi_sift::extract::FieldSpec;
use sumi_sift::output::{write_outputs, JSON_FILE_NAME, SQLITE_FILE_NAME};
use sumi_sift::{FetchStatus, Harvester};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with no request spacing and a title field
fn create_test_config(seeds: Vec<String>) -> Config {
    let mut config = Config::default();
    config.crawler.base_delay = 0.0;
    config.crawler.max_retries = 1;
    config.crawler.timeout = 5.0;
    config.crawler.robots_timeout = 1.0;
    config.crawler.concurrency_limit = 4;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.seeds.urls = seeds;
    config
        .fields
        .insert("title".to_string(), FieldSpec::text("h1"));
    config
        .fields
        .insert("price".to_string(), FieldSpec::text(".price").with_default(json!("n/a")));
    config
}

fn page(title: &str, price: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!(
            r#"<html><body><h1>{}</h1><span class="price">{}</span></body></html>"#,
            title, price
        ))
        .insert_header("content-type", "text/html")
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_duplicate_pages_are_kept_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(page("Widget", "$5"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(page("Gadget", "$7"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(vec![
        format!("{}/a", base),
        format!("{}/a", base),
        format!("{}/b", base),
    ]);

    let report = harvest(&config, CancellationToken::new())
        .await
        .expect("harvest failed");

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.duplicates, 1);
    assert!(report.errors.is_empty());
    assert_eq!(report.records[0].fields["title"], json!("Widget"));
    assert_eq!(report.records[0].fields["price"], json!("$5"));
    assert_eq!(report.records[1].fields["title"], json!("Gadget"));
    assert_eq!(report.statistics.count(FetchStatus::Success), 3);
}

#[tokio::test]
async fn test_robots_disallow_prevents_fetch() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nDisallow: /private").await;

    Mock::given(method("GET"))
        .and(path("/private/data"))
        .respond_with(page("Secret", "$0"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(page("Open", "$1"))
        .mount(&server)
        .await;

    let config = create_test_config(vec![
        format!("{}/private/data", base),
        format!("{}/public", base),
    ]);

    let report = harvest(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].status, FetchStatus::RobotsDenied);
    assert_eq!(report.errors[0].attempts, 0);
}

#[tokio::test]
async fn test_robots_can_be_ignored() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nDisallow: /").await;

    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(page("Item", "$2"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(vec![format!("{}/item", base)]);
    config.crawler.respect_robots = false;

    let report = harvest(&config, CancellationToken::new()).await.unwrap();
    assert_eq!(report.records.len(), 1);
}

#[tokio::test]
async fn test_slow_robots_fails_open() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(page("Reachable", "$3"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(vec![format!("{}/page", base)]);
    config.crawler.robots_timeout = 0.2;

    let report = harvest(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].fields["title"], json!("Reachable"));
}

#[tokio::test]
async fn test_http_errors_are_not_retried() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(vec![format!("{}/broken", base)]);
    config.crawler.max_retries = 3;

    let report = harvest(&config, CancellationToken::new()).await.unwrap();

    assert!(report.records.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].status, FetchStatus::HttpError);
    assert_eq!(report.errors[0].status_code, Some(503));
    assert_eq!(report.errors[0].attempts, 1);
}

#[tokio::test]
async fn test_redirect_records_final_url() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(page("Moved", "$4"))
        .mount(&server)
        .await;

    let config = create_test_config(vec![format!("{}/old", base)]);
    let report = harvest(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].url, format!("{}/new", base));
}

#[tokio::test]
async fn test_crawl_delay_spaces_requests() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nCrawl-delay: 0.3").await;

    for (p, title) in [("/one", "One"), ("/two", "Two"), ("/three", "Three")] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(page(title, "$1"))
            .mount(&server)
            .await;
    }

    let config = create_test_config(vec![
        format!("{}/one", base),
        format!("{}/two", base),
        format!("{}/three", base),
    ]);

    let started = Instant::now();
    let report = harvest(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.records.len(), 3);
    assert!(started.elapsed() >= Duration::from_millis(550));
}

#[tokio::test]
async fn test_paginated_walk_stops_on_cycle() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<h1>Page one</h1><a rel="next" href="/list?page=2">Next</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<h1>Page two</h1><a rel="next" href="/list?page=1">Next</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(vec![format!("{}/list?page=1", base)]);
    config.seeds.paginate = true;

    let report = harvest(&config, CancellationToken::new()).await.unwrap();

    let titles: Vec<_> = report
        .records
        .iter()
        .map(|r| r.fields["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("Page one"), json!("Page two")]);
}

#[tokio::test]
async fn test_sitemap_discovery_feeds_harvest() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(
        &server,
        &format!("User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml", base),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <sitemap><loc>{}/products.xml</loc></sitemap>
            </sitemapindex>"#,
            base
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
                    xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
                <url>
                    <loc>{base}/p/1</loc>
                    <image:image><image:loc>{base}/img/1.png</image:loc></image:image>
                </url>
                <url><loc>{base}/p/2</loc></url>
            </urlset>"#,
            base = base
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(page("First", "$1"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/2"))
        .respond_with(page("Second", "$2"))
        .mount(&server)
        .await;

    let config = create_test_config(vec![]);
    let harvester = Harvester::from_config(&config).unwrap();
    let cancel = CancellationToken::new();

    let home = url::Url::parse(&format!("{}/", base)).unwrap();
    let sitemaps = harvester.robots_sitemaps(&home).await;
    assert_eq!(sitemaps, vec![format!("{}/sitemap.xml", base)]);

    let pages = harvester
        .discover_from_sitemap(&sitemaps[0], &cancel)
        .await
        .unwrap();
    assert_eq!(pages, vec![format!("{}/p/1", base), format!("{}/p/2", base)]);

    let report = harvester.run(&pages, cancel).await.unwrap();
    assert_eq!(report.records.len(), 2);
}

#[tokio::test]
async fn test_cancelled_harvest_fetches_nothing() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .respond_with(page("Never", "$0"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(vec![format!("{}/a", base), format!("{}/b", base)]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = harvest(&config, cancel).await.unwrap();

    assert!(report.records.is_empty());
    assert_eq!(report.errors.len(), 2);
    assert!(report
        .errors
        .iter()
        .all(|e| e.status == FetchStatus::Cancelled));
}

#[tokio::test]
async fn test_invalid_seed_rejected_before_fetching() {
    let mut config = create_test_config(vec![]);
    config.seeds.urls = vec!["ftp://example.com/file".to_string()];

    assert!(harvest(&config, CancellationToken::new()).await.is_err());
}

#[tokio::test]
async fn test_outputs_written() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(page("Stored", "$9"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(vec![format!("{}/item", base), format!("{}/gone", base)]);
    config.output.directory = dir.path().to_string_lossy().into_owned();
    config.output.formats = vec![OutputFormat::Json, OutputFormat::Sqlite];

    let report = harvest(&config, CancellationToken::new()).await.unwrap();
    write_outputs(&report, &config.output).unwrap();

    let document: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(JSON_FILE_NAME)).unwrap(),
    )
    .unwrap();
    assert_eq!(document["records"][0]["fields"]["title"], "Stored");
    assert_eq!(document["errors"][0]["status"], "http_error");
    assert_eq!(document["duplicates"], 0);

    let conn = rusqlite::Connection::open(dir.path().join(SQLITE_FILE_NAME)).unwrap();
    let records: i64 = conn
        .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
        .unwrap();
    assert_eq!(records, 1);
}
