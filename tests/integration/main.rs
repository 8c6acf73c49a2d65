//! Integration tests for Ripple-Crawl
//!
//! `crawl_tests` drives whole crawls through an in-process mock transport;
//! `http_tests` runs them against wiremock servers over real HTTP.

mod crawl_tests;
mod http_tests;
mod support;
