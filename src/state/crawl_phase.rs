/// Crawl phase definitions for the coordinator state machine
///
/// A crawl moves strictly forward through these phases.
use std::fmt;

/// Represents the current phase of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Session created, nothing fetched yet
    Idle,

    /// Seed and sitemap URLs are being loaded into the frontier
    Seeding,

    /// Tasks are being dispatched and completions merged
    Running,

    /// No new dispatches; waiting for in-flight tasks to finish
    Draining,

    /// All work finished, report built
    Done,
}

impl CrawlPhase {
    /// Returns true if a transition from `self` to `next` is legal
    ///
    /// Legal moves are `Idle -> Seeding -> Running`, `Running -> Draining`,
    /// `Running -> Done` (frontier exhausted with nothing in flight), and
    /// `Draining -> Done`. Seeding may also go straight to `Draining` when the
    /// crawl is cancelled before the first dispatch.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Seeding)
                | (Self::Seeding, Self::Running)
                | (Self::Seeding, Self::Draining)
                | (Self::Running, Self::Draining)
                | (Self::Running, Self::Done)
                | (Self::Draining, Self::Done)
        )
    }

    /// Returns true while new tasks may still be dispatched
    pub fn accepts_dispatch(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true once the crawl has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Seeding => "seeding",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
