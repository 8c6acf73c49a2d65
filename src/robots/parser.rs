//! Robots.txt parser implementation
//!
//! Rules are matched as literal path prefixes. A trailing `*` is redundant
//! under prefix matching and is dropped; any other rule using `*` or `$` is
//! skipped.

use std::time::Duration;

/// A single Allow or Disallow line
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathRule {
    prefix: String,
    allow: bool,
}

/// Rules that apply to one set of `User-agent` lines
#[derive(Debug, Clone, Default, PartialEq)]
struct AgentGroup {
    /// Lowercased agent tokens, `*` for the wildcard group
    agents: Vec<String>,
    rules: Vec<PathRule>,
    crawl_delay: Option<Duration>,
}

/// Parsed robots.txt data for one host
///
/// An empty ruleset allows everything; it is also what a failed fetch
/// produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    groups: Vec<AgentGroup>,
    sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Creates a permissive ruleset that allows everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parses raw robots.txt content
    ///
    /// Consecutive `User-agent` lines share one group; the first rule line
    /// after them closes the agent list. Unknown directives and lines without
    /// a colon are ignored. `Sitemap:` lines are collected regardless of
    /// where they appear.
    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<AgentGroup> = Vec::new();
        let mut sitemaps = Vec::new();
        let mut current: Option<AgentGroup> = None;
        let mut collecting_agents = false;

        for line in content.lines() {
            // Strip trailing comments
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !collecting_agents {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                        current = Some(AgentGroup::default());
                        collecting_agents = true;
                    }
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    collecting_agents = false;
                    let Some(group) = current.as_mut() else {
                        continue;
                    };
                    if let Some(prefix) = literal_prefix(value) {
                        group.rules.push(PathRule {
                            prefix,
                            allow: key == "allow",
                        });
                    }
                }
                "crawl-delay" => {
                    collecting_agents = false;
                    if let Some(group) = current.as_mut() {
                        group.crawl_delay = parse_crawl_delay(value);
                    }
                }
                "sitemap" => {
                    if !value.is_empty() {
                        sitemaps.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        if let Some(group) = current {
            groups.push(group);
        }

        Self { groups, sitemaps }
    }

    /// Returns the `Sitemap:` URLs declared in the file, in order
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Checks if a path is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `path` - The URL path, including the query string if any
    /// * `user_agent` - The user agent string
    ///
    /// # Returns
    ///
    /// * `true` - If no group applies, no rule matches, or the longest
    ///   matching rule is an Allow (ties favour Allow)
    /// * `false` - If the longest matching rule is a Disallow
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        let groups = self.groups_for(user_agent);

        let mut best_allow: Option<usize> = None;
        let mut best_disallow: Option<usize> = None;

        for rule in groups.iter().flat_map(|g| g.rules.iter()) {
            if !path.starts_with(&rule.prefix) {
                continue;
            }
            let slot = if rule.allow {
                &mut best_allow
            } else {
                &mut best_disallow
            };
            *slot = Some(slot.map_or(rule.prefix.len(), |len| len.max(rule.prefix.len())));
        }

        match (best_allow, best_disallow) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(allow), Some(disallow)) => allow >= disallow,
        }
    }

    /// Gets the crawl delay for a specific user agent
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.groups_for(user_agent)
            .iter()
            .find_map(|g| g.crawl_delay)
    }

    /// Selects the groups that govern `user_agent`
    ///
    /// The agent token that is the longest case-insensitive substring of the
    /// user agent wins; every group listing that token applies. Without a
    /// specific match the `*` groups apply.
    fn groups_for(&self, user_agent: &str) -> Vec<&AgentGroup> {
        let ua = user_agent.to_ascii_lowercase();

        let best_token = self
            .groups
            .iter()
            .flat_map(|g| g.agents.iter())
            .filter(|agent| agent.as_str() != "*" && !agent.is_empty() && ua.contains(agent.as_str()))
            .max_by_key(|agent| agent.len());

        let token = best_token.map(String::as_str).unwrap_or("*");
        self.groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a == token))
            .collect()
    }
}

/// Reduces a rule value to a literal prefix
///
/// Returns `None` for empty values (an empty Disallow means "allow all") and
/// for patterns that need wildcard matching.
fn literal_prefix(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }

    let trimmed = value.trim_end_matches('*');
    if trimmed.contains('*') || trimmed.contains('$') {
        tracing::debug!("Ignoring wildcard robots rule: {}", value);
        return None;
    }

    // "Disallow: *" reduces to the empty prefix, which matches every path
    if trimmed.is_empty() {
        return Some("/".to_string());
    }

    Some(trimmed.to_string())
}

/// Parses a Crawl-delay value in (possibly fractional) seconds
fn parse_crawl_delay(value: &str) -> Option<Duration> {
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs_f64(secs.min(crate::state::MAX_CRAWL_DELAY.as_secs_f64())))
}
