//! Crawl behaviour against the in-process mock transport

use crate::support::{links, MockTransport, Reply};
use ripple_crawl::output::MemorySink;
use ripple_crawl::{CrawlConfig, Crawler, FetchStatus, ReportStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SEED: &str = "https://example.com/";

fn test_config() -> CrawlConfig {
    CrawlConfig {
        per_host_delay_ms: 0,
        ..CrawlConfig::default()
    }
}

async fn crawl(config: CrawlConfig, transport: Arc<MockTransport>) -> ripple_crawl::CrawlReport {
    Crawler::new(config)
        .with_transport(transport)
        .crawl(SEED, CancellationToken::new())
        .await
        .expect("crawl should run")
}

#[tokio::test]
async fn test_depth_zero_fetches_only_seed() {
    let transport = Arc::new(MockTransport::new().html(SEED, &links(&["/a", "/b"])));
    let config = CrawlConfig {
        max_depth: 0,
        ..test_config()
    };

    let report = crawl(config, transport.clone()).await;

    assert_eq!(transport.page_paths(), vec!["/"]);
    assert_eq!(report.stats.pages_fetched, 1);
    assert_eq!(report.status, ReportStatus::Completed);
    // Links are still recorded even though none are followed
    assert_eq!(report.stats.links_discovered, 2);
    let flags: Vec<(&str, bool)> = report.pages[0]
        .links
        .iter()
        .map(|l| (l.url.path(), l.followed))
        .collect();
    assert_eq!(flags, vec![("/a", false), ("/b", false)]);
    assert_eq!(report.frontier_remaining, 0);
}

#[tokio::test]
async fn test_no_url_fetched_twice() {
    let transport = Arc::new(
        MockTransport::new()
            .html(SEED, &links(&["/a", "/b", "/a#top", "/?"]))
            .html("https://example.com/a", &links(&["/b", "/", "/a"]))
            .html("https://example.com/b", &links(&["/a", "/", "/b/../a"])),
    );

    let report = crawl(test_config(), transport.clone()).await;

    let requested: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| r.url.to_string())
        .collect();
    let unique: HashSet<&String> = requested.iter().collect();
    assert_eq!(unique.len(), requested.len(), "duplicate fetch in {:?}", requested);
    assert_eq!(report.stats.pages_fetched, 3);
}

#[tokio::test]
async fn test_robots_disallow_is_honoured() {
    let transport = Arc::new(
        MockTransport::new()
            .text(
                "https://example.com/robots.txt",
                "text/plain",
                "User-agent: *\nDisallow: /private\n",
            )
            .html(SEED, &links(&["/private/a", "/private-b", "/public"]))
            .html("https://example.com/public", "<p>public</p>"),
    );

    let report = crawl(test_config(), transport.clone()).await;

    assert!(transport
        .page_paths()
        .iter()
        .all(|p| !p.starts_with("/private")));
    assert_eq!(report.stats.pages_skipped, 2);
    assert_eq!(report.stats.pages_fetched, 2);

    let skipped: Vec<_> = report
        .pages
        .iter()
        .filter(|p| p.status == FetchStatus::SkippedByPolicy)
        .map(|p| p.attempts)
        .collect();
    assert_eq!(skipped, vec![0, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_bounded() {
    let children: Vec<String> = (0..10).map(|i| format!("/page{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();

    let mut transport = MockTransport::new()
        .with_latency(Duration::from_millis(50))
        .html(SEED, &links(&child_refs));
    for child in &children {
        transport = transport.html(&format!("https://example.com{}", child), "<p>child</p>");
    }
    let transport = Arc::new(transport);

    let config = CrawlConfig {
        max_concurrency: 3,
        max_links_per_page: 20,
        respect_robots: false,
        use_sitemap: false,
        ..test_config()
    };
    let report = crawl(config, transport.clone()).await;

    assert_eq!(report.stats.pages_fetched, 11);
    assert_eq!(transport.max_in_flight(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_per_host_delay_spacing() {
    let transport = Arc::new(
        MockTransport::new()
            .html(SEED, &links(&["/a", "/b", "/c"]))
            .html("https://example.com/a", "<p>a</p>")
            .html("https://example.com/b", "<p>b</p>")
            .html("https://example.com/c", "<p>c</p>"),
    );
    let config = CrawlConfig {
        per_host_delay_ms: 200,
        max_concurrency: 3,
        ..CrawlConfig::default()
    };

    crawl(config, transport.clone()).await;

    let mut starts: Vec<_> = transport.requests().iter().map(|r| r.started).collect();
    starts.sort();
    assert!(starts.len() >= 5);
    for pair in starts.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(200),
            "requests only {:?} apart",
            pair[1] - pair[0]
        );
    }
}

#[tokio::test]
async fn test_max_pages_budget() {
    let children: Vec<String> = (0..10).map(|i| format!("/page{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
    let transport = Arc::new(MockTransport::new().html(SEED, &links(&child_refs)));

    let config = CrawlConfig {
        max_pages: 3,
        ..test_config()
    };
    let report = crawl(config, transport.clone()).await;

    assert_eq!(transport.page_paths().len(), 3);
    assert_eq!(report.stats.pages_attempted(), 3);
    assert_eq!(report.status, ReportStatus::CompletedPartial);
    assert!(report.frontier_remaining > 0);
}

#[tokio::test]
async fn test_external_links_recorded_not_fetched() {
    let transport = Arc::new(
        MockTransport::new()
            .html(
                SEED,
                &links(&[
                    "/a",
                    "/b",
                    "/c",
                    "https://other.org/page",
                    "https://another.net/",
                ]),
            )
            .html("https://example.com/a", "<p>a</p>")
            .html("https://example.com/b", "<p>b</p>")
            .html("https://example.com/c", "<p>c</p>"),
    );
    let config = CrawlConfig {
        max_depth: 1,
        ..test_config()
    };

    let report = crawl(config, transport.clone()).await;

    assert_eq!(report.stats.pages_attempted(), 4);
    assert_eq!(report.stats.external_links, 2);
    assert!(transport
        .requests()
        .iter()
        .all(|r| r.url.host_str() == Some("example.com")));

    let seed_page = report.pages.iter().find(|p| p.url.as_str() == SEED).unwrap();
    let followed = seed_page.links.iter().filter(|l| l.followed).count();
    assert_eq!(followed, 3);
}

#[tokio::test]
async fn test_sitemap_urls_are_crawled() {
    let entries: String = (1..=5)
        .map(|i| format!("<url><loc>https://example.com/p{}</loc></url>", i))
        .collect();
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        entries
    );

    let mut transport = MockTransport::new()
        .html(SEED, "<p>no links here</p>")
        .text("https://example.com/sitemap.xml", "application/xml", &sitemap);
    for i in 1..=5 {
        transport = transport.html(&format!("https://example.com/p{}", i), "<p>entry</p>");
    }
    let transport = Arc::new(transport);

    let config = CrawlConfig {
        max_pages: 50,
        ..test_config()
    };
    let report = crawl(config, transport.clone()).await;

    for i in 1..=5 {
        assert_eq!(transport.count(&format!("https://example.com/p{}", i)), 1);
    }
    assert_eq!(report.stats.pages_fetched, 6);

    let from_sitemap = report
        .pages
        .iter()
        .filter(|p| p.source == ripple_crawl::TaskSource::Sitemap)
        .count();
    assert_eq!(from_sitemap, 5);
}

#[tokio::test]
async fn test_seed_timeout_fails_crawl() {
    let transport = Arc::new(MockTransport::new().reply(SEED, Reply::Timeout));
    let sink = Arc::new(MemorySink::new());

    let report = Crawler::new(test_config())
        .with_transport(transport.clone())
        .with_sink(sink.clone())
        .crawl(SEED, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, ReportStatus::Failed);
    assert_eq!(report.stats.pages_fetched, 0);
    assert_eq!(transport.count(SEED), 2);
    assert_eq!(report.pages[0].attempts, 2);
    assert_eq!(sink.reports().len(), 1);
}

#[tokio::test]
async fn test_seed_http_error_still_completes() {
    let transport = Arc::new(MockTransport::new());

    let report = crawl(test_config(), transport.clone()).await;

    assert_eq!(report.status, ReportStatus::Completed);
    assert_eq!(report.stats.pages_failed, 1);
    assert_eq!(report.error_summary().get("http_404"), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn test_crawl_deadline_stops_dispatch() {
    let children: Vec<String> = (0..10).map(|i| format!("/page{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
    let transport = Arc::new(
        MockTransport::new()
            .with_latency(Duration::from_millis(400))
            .html(SEED, &links(&child_refs)),
    );

    let config = CrawlConfig {
        max_concurrency: 1,
        max_links_per_page: 20,
        respect_robots: false,
        use_sitemap: false,
        crawl_timeout_secs: Some(1),
        ..test_config()
    };
    let report = crawl(config, transport.clone()).await;

    assert_eq!(report.status, ReportStatus::CompletedPartial);
    assert!(!report.cancelled);
    assert!(transport.page_paths().len() < 11);
    assert!(report.frontier_remaining > 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_yields_partial_report() {
    let children: Vec<String> = (0..10).map(|i| format!("/page{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
    let transport = Arc::new(
        MockTransport::new()
            .with_latency(Duration::from_millis(100))
            .html(SEED, &links(&child_refs)),
    );
    let config = CrawlConfig {
        max_concurrency: 1,
        max_links_per_page: 20,
        respect_robots: false,
        use_sitemap: false,
        ..test_config()
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        trigger.cancel();
    });

    let report = Crawler::new(config)
        .with_transport(transport.clone())
        .crawl(SEED, cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.status, ReportStatus::CompletedPartial);
    assert!(report.stats.pages_fetched >= 1);
    assert!(report.frontier_remaining > 0);
    // The in-flight request at cancellation time is allowed to finish
    assert_eq!(report.pages.len(), transport.page_paths().len());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_tasks_waiting_for_host_slot() {
    let transport = Arc::new(
        MockTransport::new()
            .html(SEED, &links(&["/p1", "/p2", "/p3", "/p4", "/p5"]))
            .html("https://example.com/p1", "<p>1</p>")
            .html("https://example.com/p2", "<p>2</p>"),
    );
    let config = CrawlConfig {
        per_host_delay_ms: 10_000,
        max_concurrency: 5,
        respect_robots: false,
        use_sitemap: false,
        ..CrawlConfig::default()
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let report = Crawler::new(config)
        .with_transport(transport.clone())
        .crawl(SEED, cancel)
        .await
        .unwrap();

    assert!(
        started.elapsed() < Duration::from_secs(2),
        "drain took {:?}",
        started.elapsed()
    );
    let late: Vec<_> = transport
        .requests()
        .into_iter()
        .filter(|r| r.started - started >= Duration::from_secs(1))
        .map(|r| r.url.path().to_string())
        .collect();
    assert!(late.is_empty(), "requests after cancel: {:?}", late);
    assert_eq!(transport.page_paths(), vec!["/"]);

    assert!(report.cancelled);
    assert_eq!(report.status, ReportStatus::CompletedPartial);
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.stats.pages_failed, 0);
    assert_eq!(report.frontier_remaining, 5);
}

#[tokio::test]
async fn test_link_cap_counts_only_newly_queued_links() {
    let transport = Arc::new(
        MockTransport::new()
            .html(SEED, &links(&["/a", "/b"]))
            .html("https://example.com/a", &links(&["/", "/b", "/c", "/d"]))
            .html("https://example.com/b", "<p>b</p>")
            .html("https://example.com/c", "<p>c</p>")
            .html("https://example.com/d", "<p>d</p>"),
    );
    let config = CrawlConfig {
        max_concurrency: 1,
        max_links_per_page: 2,
        respect_robots: false,
        use_sitemap: false,
        ..test_config()
    };

    let report = crawl(config, transport.clone()).await;

    assert_eq!(transport.count("https://example.com/c"), 1);
    assert_eq!(transport.count("https://example.com/d"), 1);
    assert_eq!(report.stats.pages_fetched, 5);

    let page_a = report
        .pages
        .iter()
        .find(|p| p.url.path() == "/a")
        .expect("page /a recorded");
    let flags: Vec<(&str, bool)> = page_a
        .links
        .iter()
        .map(|l| (l.url.path(), l.followed))
        .collect();
    assert_eq!(flags, vec![("/", false), ("/b", false), ("/c", true), ("/d", true)]);
}

#[tokio::test]
async fn test_redirect_into_disallowed_path_is_not_fetched() {
    let transport = Arc::new(
        MockTransport::new()
            .text(
                "https://example.com/robots.txt",
                "text/plain",
                "User-agent: *\nDisallow: /private\n",
            )
            .html(SEED, &links(&["/public"]))
            .reply("https://example.com/public", Reply::Redirect("/private/x"))
            .html("https://example.com/private/x", &links(&["/private/y"])),
    );
    let config = CrawlConfig {
        use_sitemap: false,
        ..test_config()
    };

    let report = crawl(config, transport.clone()).await;

    assert_eq!(transport.page_paths(), vec!["/", "/public"]);
    let public = report
        .pages
        .iter()
        .find(|p| p.url.path() == "/public")
        .expect("redirecting page recorded");
    assert_eq!(public.status, FetchStatus::SkippedByPolicy);
    assert_eq!(public.final_url.path(), "/private/x");
    assert!(public.links.is_empty());
    assert_eq!(report.stats.pages_skipped, 1);
}
