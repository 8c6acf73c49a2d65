//! In-process transport for deterministic crawl tests

use async_trait::async_trait;
use ripple_crawl::crawler::{FetchTransport, TransportError, TransportResponse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Canned answer for one URL
#[derive(Debug, Clone)]
pub enum Reply {
    Page {
        status: u16,
        content_type: &'static str,
        body: String,
    },
    /// 301 to the given URL
    Redirect(&'static str),
    Timeout,
}

/// A request seen by the mock
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub started: Instant,
}

/// Serves canned replies keyed by full URL; anything else is a 404
#[derive(Default)]
pub struct MockTransport {
    routes: HashMap<String, Reply>,
    latency: Duration,
    log: Mutex<Vec<Request>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn html(self, url: &str, body: &str) -> Self {
        self.reply(
            url,
            Reply::Page {
                status: 200,
                content_type: "text/html; charset=utf-8",
                body: body.to_string(),
            },
        )
    }

    pub fn text(self, url: &str, content_type: &'static str, body: &str) -> Self {
        self.reply(
            url,
            Reply::Page {
                status: 200,
                content_type,
                body: body.to_string(),
            },
        )
    }

    pub fn reply(mut self, url: &str, reply: Reply) -> Self {
        self.routes.insert(url.to_string(), reply);
        self
    }

    /// Every response takes this long
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }

    /// Requested paths, excluding robots.txt and sitemap requests
    pub fn page_paths(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.url.path().to_string())
            .filter(|p| p != "/robots.txt" && !p.starts_with("/sitemap"))
            .collect()
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.as_str() == url)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchTransport for MockTransport {
    async fn get(
        &self,
        url: &Url,
        _timeout: Duration,
        _max_body_bytes: usize,
    ) -> Result<TransportResponse, TransportError> {
        self.log.lock().unwrap().push(Request {
            url: url.clone(),
            started: Instant::now(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.routes.get(url.as_str()) {
            Some(Reply::Timeout) => Err(TransportError::Timeout),
            Some(Reply::Redirect(to)) => Ok(TransportResponse {
                status: 301,
                location: Some(to.to_string()),
                content_type: None,
                body: Vec::new(),
                truncated: false,
            }),
            Some(Reply::Page {
                status,
                content_type,
                body,
            }) => Ok(TransportResponse {
                status: *status,
                location: None,
                content_type: Some(content_type.to_string()),
                body: body.clone().into_bytes(),
                truncated: false,
            }),
            None => Ok(TransportResponse {
                status: 404,
                location: None,
                content_type: Some("text/html".to_string()),
                body: Vec::new(),
                truncated: false,
            }),
        }
    }
}

/// Anchor list for `paths`, e.g. `links(&["/a", "/b"])`
pub fn links(paths: &[&str]) -> String {
    let anchors: Vec<String> = paths
        .iter()
        .map(|p| format!(r#"<a href="{}">{}</a>"#, p, p))
        .collect();
    format!("<html><body>{}</body></html>", anchors.join("\n"))
}
