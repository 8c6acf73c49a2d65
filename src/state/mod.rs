//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `HostState`: Per-origin pacing state (reserved request slots, crawl delay)
//! - `CrawlPhase`: The coordinator's phase state machine

mod crawl_phase;
mod host_state;

pub use crawl_phase::CrawlPhase;
pub use host_state::{HostState, MAX_CRAWL_DELAY};
