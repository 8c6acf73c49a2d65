use crate::config::types::{Config, CrawlConfig, OutputConfig};
use crate::ConfigError;

/// Upper bound on simultaneous fetches
const MAX_CONCURRENCY: usize = 100;

/// Upper bound on the per-host delay (milliseconds)
const MAX_PER_HOST_DELAY_MS: u64 = 60_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
pub fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.max_concurrency
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1".to_string(),
        ));
    }

    if config.per_host_delay_ms > MAX_PER_HOST_DELAY_MS {
        return Err(ConfigError::Validation(format!(
            "per-host-delay-ms must be <= {}, got {}",
            MAX_PER_HOST_DELAY_MS, config.per_host_delay_ms
        )));
    }

    if config.max_links_per_page < 1 {
        return Err(ConfigError::Validation(
            "max-links-per-page must be >= 1".to_string(),
        ));
    }

    if config.max_body_bytes < 1 {
        return Err(ConfigError::Validation(
            "max-body-bytes must be >= 1".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 30 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be between 1 and 30, got {}",
            config.request_timeout_secs
        )));
    }

    if config.connect_timeout_secs < 1 || config.connect_timeout_secs > 10 {
        return Err(ConfigError::Validation(format!(
            "connect-timeout-secs must be between 1 and 10, got {}",
            config.connect_timeout_secs
        )));
    }

    if config.crawl_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "crawl-timeout-secs must be >= 1 when set".to_string(),
        ));
    }

    validate_user_agent(&config.user_agent)?;

    for pattern in &config.internal_hosts {
        validate_host_pattern(pattern)?;
    }

    if config.priority_keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "priority-keywords cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// User agents travel in an HTTP header, so they must be printable ASCII
fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if !user_agent.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err(ConfigError::Validation(format!(
            "user-agent must be printable ASCII, got '{}'",
            user_agent
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, path) in [
        ("json-path", &config.json_path),
        ("summary-path", &config.summary_path),
        ("database-path", &config.database_path),
    ] {
        if matches!(path, Some(p) if p.trim().is_empty()) {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates a host pattern (supports a leading `*.` wildcard)
fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);

    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(format!(
            "'{}' has an empty host",
            pattern
        )));
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "'{}' contains invalid characters",
            pattern
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "'{}' has misplaced dots",
            pattern
        )));
    }

    Ok(())
}
