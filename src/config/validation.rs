use crate::config::types::{Config, CrawlerConfig, FilterConfig, ThrottleConfig, ThrottleKind};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_throttle_config(&config.throttle)?;
    validate_filter_config(&config.filter)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_threads < 1 || config.max_threads > 256 {
        return Err(ConfigError::Validation(format!(
            "max_threads must be between 1 and 256, got {}",
            config.max_threads
        )));
    }

    if config.stop_count < -1 {
        return Err(ConfigError::Validation(format!(
            "stop_count must be -1 (unlimited) or >= 0, got {}",
            config.stop_count
        )));
    }

    if config.silent_stop_minutes < 1 {
        return Err(ConfigError::Validation(
            "silent_stop_minutes must be >= 1".to_string(),
        ));
    }

    if config.poll_interval_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "poll_interval_ms must be >= 10ms, got {}ms",
            config.poll_interval_ms
        )));
    }

    if config.retry_failed && config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "max_retries must be >= 1 when retry_failed is enabled".to_string(),
        ));
    }

    if config.max_url_length < 1 {
        return Err(ConfigError::Validation(
            "max_url_length must be >= 1".to_string(),
        ));
    }

    if !config.in_domain && !config.out_domain && !config.sub_domain {
        tracing::warn!("All link scopes are disabled, only seed URLs will be visited");
    }

    Ok(())
}

/// Validates throttle parameters for the selected kind
fn validate_throttle_config(config: &ThrottleConfig) -> Result<(), ConfigError> {
    match config.kind {
        ThrottleKind::None => Ok(()),
        ThrottleKind::Fixed => {
            if config.interval_ms == 0 {
                return Err(ConfigError::Throttle(
                    "fixed throttle needs interval_ms >= 1".to_string(),
                ));
            }
            Ok(())
        }
        ThrottleKind::Window => {
            if config.max_requests == 0 || config.window_ms == 0 {
                return Err(ConfigError::Throttle(format!(
                    "window throttle needs max_requests >= 1 and window_ms >= 1, got {} per {}ms",
                    config.max_requests, config.window_ms
                )));
            }
            Ok(())
        }
    }
}

/// Validates URL patterns and domain lists
///
/// Rewrite rules are deliberately left alone: a broken rule is skipped when it
/// is applied instead of failing the whole crawl.
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    for pattern in config.url_whitelist.iter().chain(&config.url_blacklist) {
        regex::Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid URL pattern '{}': {}", pattern, e))
        })?;
    }

    for domain in &config.allowed_domains {
        validate_domain_pattern(domain)?;
    }

    for file_type in config
        .file_type_whitelist
        .iter()
        .chain(&config.file_type_blacklist)
    {
        if file_type.is_empty() || file_type.contains('.') || file_type.contains('/') {
            return Err(ConfigError::Validation(format!(
                "File type '{}' must be a bare extension such as 'pdf'",
                file_type
            )));
        }
    }

    Ok(())
}

/// Validates seed URLs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);

    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' is malformed",
            domain
        )));
    }

    Ok(())
}
