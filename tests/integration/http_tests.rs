//! End-to-end crawls over real HTTP against wiremock servers

use ripple_crawl::output::{JsonSink, SqliteSink};
use ripple_crawl::{CrawlConfig, Crawler, FetchError, FetchStatus, ReportStatus};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn fast_config() -> CrawlConfig {
    CrawlConfig {
        per_host_delay_ms: 10,
        request_timeout_secs: 5,
        connect_timeout_secs: 2,
        ..CrawlConfig::default()
    }
}

#[tokio::test]
async fn test_full_crawl_writes_sinks() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /secret\n"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><title>Home</title></head><body>
                <a href="/about">About</a>
                <a href="/secret/plans">Secret</a>
                <a href="https://elsewhere.example.org/">Elsewhere</a>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html(
            r#"<html><head><title>About us</title>
                <meta name="description" content="Who we are"></head>
                <body><p>We crawl politely.</p></body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/secret/plans"))
        .respond_with(html("<p>hidden</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("report.json");
    let db_path = dir.path().join("crawl.db");

    let report = Crawler::new(fast_config())
        .with_sink(Arc::new(JsonSink::new(&json_path)))
        .with_sink(Arc::new(SqliteSink::new(&db_path)))
        .crawl(&format!("{}/", base_url), CancellationToken::new())
        .await
        .expect("crawl should run");

    assert_eq!(report.status, ReportStatus::Completed);
    assert_eq!(report.stats.pages_fetched, 2);
    assert_eq!(report.stats.pages_skipped, 1);
    assert_eq!(report.stats.external_links, 1);

    let about = report
        .pages
        .iter()
        .find(|p| p.url.path() == "/about")
        .and_then(|p| p.record.as_ref())
        .expect("about page processed");
    assert_eq!(about.title.as_deref(), Some("About us"));
    assert_eq!(about.data["description"], "Who we are");

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["stats"]["pages_skipped"], 1);

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let pages: i64 = conn
        .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
        .unwrap();
    assert_eq!(pages, 3);
}

#[tokio::test]
async fn test_redirect_target_not_refetched() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/old">old</a> <a href="/new">new</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html("<p>moved here</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = CrawlConfig {
        max_concurrency: 1,
        respect_robots: false,
        use_sitemap: false,
        ..fast_config()
    };
    let report = Crawler::new(config)
        .crawl(&format!("{}/", base_url), CancellationToken::new())
        .await
        .unwrap();

    let old = report
        .pages
        .iter()
        .find(|p| p.url.path() == "/old")
        .expect("redirected page recorded");
    assert_eq!(old.final_url.path(), "/new");
    assert_eq!(old.status, FetchStatus::Success);
    assert_eq!(report.stats.pages_fetched, 2);
}

#[tokio::test]
async fn test_redirect_into_disallowed_path_is_skipped() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/public">public</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/private/x"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/private/x"))
        .respond_with(html(r#"<a href="/private/y">more</a>"#))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = CrawlConfig {
        use_sitemap: false,
        ..fast_config()
    };
    let report = Crawler::new(config)
        .crawl(&format!("{}/", base_url), CancellationToken::new())
        .await
        .unwrap();

    let public = report
        .pages
        .iter()
        .find(|p| p.url.path() == "/public")
        .expect("redirecting page recorded");
    assert_eq!(public.status, FetchStatus::SkippedByPolicy);
    assert_eq!(public.error, Some(FetchError::PolicyBlocked));
    assert_eq!(public.final_url.path(), "/private/x");
    assert!(public.record.is_none());
    assert_eq!(report.stats.pages_fetched, 1);
    assert_eq!(report.stats.pages_skipped, 1);
}

#[tokio::test]
async fn test_sends_configured_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "TestBot/1.0"))
        .respond_with(html("<p>hello</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = CrawlConfig {
        user_agent: "TestBot/1.0".to_string(),
        respect_robots: false,
        use_sitemap: false,
        ..fast_config()
    };
    let report = Crawler::new(config)
        .crawl(&format!("{}/", mock_server.uri()), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.stats.pages_fetched, 1);
}

#[tokio::test]
async fn test_oversized_body_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&"x".repeat(4096)))
        .mount(&mock_server)
        .await;

    let config = CrawlConfig {
        max_body_bytes: 1024,
        respect_robots: false,
        use_sitemap: false,
        ..fast_config()
    };
    let report = Crawler::new(config)
        .crawl(&format!("{}/", mock_server.uri()), CancellationToken::new())
        .await
        .unwrap();

    let seed = &report.pages[0];
    assert_eq!(seed.status, FetchStatus::HttpError);
    assert_eq!(seed.error, Some(FetchError::SizeLimitExceeded { limit: 1024 }));
    assert_eq!(seed.bytes, 1024);
    assert_eq!(report.error_summary().get("size_limit"), Some(&1));
}

#[tokio::test]
async fn test_unreachable_seed_fails() {
    // Bind and drop a listener so its port refuses connections
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let uri = format!("http://127.0.0.1:{}", port);

    let config = CrawlConfig {
        respect_robots: false,
        use_sitemap: false,
        ..fast_config()
    };
    let report = Crawler::new(config)
        .crawl(&format!("{}/", uri), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, ReportStatus::Failed);
    assert_eq!(report.stats.pages_fetched, 0);
    assert!(matches!(report.pages[0].error, Some(FetchError::Network(_))));
}
