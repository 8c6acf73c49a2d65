//! Configuration module for Ripple-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use ripple_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlConfig, OutputConfig, DEFAULT_USER_AGENT};

pub use parser::{hash_config_content, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_crawl_config};
