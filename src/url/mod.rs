//! URL handling module for Ripple-Crawl
//!
//! This module provides URL normalization, host extraction, wildcard host
//! matching and internal/external link classification.

mod domain;
mod matcher;
mod normalize;

pub use domain::{extract_host, is_internal, origin_key, site_host};
pub use matcher::matches_wildcard;
pub use normalize::normalize;
