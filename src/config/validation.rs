use crate::config::types::{
    BudgetConfig, Config, CrawlerConfig, LevelConfig, OutputConfig, UserAgentConfig,
};
use crate::crawler::SelectorExpr;
use crate::state::CrawlLevel;
use crate::url::normalize_url;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_budget_config(&config.budget)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    for level in CrawlLevel::all() {
        validate_level_config(level, config.level(level))?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    normalize_url(&config.start_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start-url '{}': {}", config.start_url, e))
    })?;

    if config.max_page_listing < 1 {
        return Err(ConfigError::Validation(format!(
            "max-page-listing must be >= 1, got {}",
            config.max_page_listing
        )));
    }

    if config.max_page_entity < 1 {
        return Err(ConfigError::Validation(format!(
            "max-page-entity must be >= 1, got {}",
            config.max_page_entity
        )));
    }

    if config.max_detail_per_entity == Some(0) {
        return Err(ConfigError::Validation(
            "max-detail-per-entity must be >= 1 when set".to_string(),
        ));
    }

    if config.worker_count < 1 || config.worker_count > 100 {
        return Err(ConfigError::Validation(format!(
            "worker-count must be between 1 and 100, got {}",
            config.worker_count
        )));
    }

    if config.deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "deadline-secs must be >= 1 when set".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.retries > 10 {
        return Err(ConfigError::Validation(format!(
            "retries must be at most 10, got {}",
            config.retries
        )));
    }

    Ok(())
}

fn validate_budget_config(config: &BudgetConfig) -> Result<(), ConfigError> {
    for (level, limit) in config.limits() {
        if limit < 1 {
            return Err(ConfigError::Validation(format!(
                "budget for {} pages must be >= 1, got {}",
                level, limit
            )));
        }
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    if config.channel_capacity < 1 {
        return Err(ConfigError::Validation(
            "channel-capacity must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates one level's rules, link field and pagination selectors
fn validate_level_config(level: CrawlLevel, config: &LevelConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for rule in &config.rules {
        if !names.insert(rule.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate {} rule name '{}'",
                level, rule.name
            )));
        }
        for selector in rule.mode.selectors() {
            validate_selector(level, &rule.name, selector)?;
        }
    }

    match (level.child(), &config.links) {
        (Some(_), None) => {
            return Err(ConfigError::Validation(format!(
                "[{}] must name its link rule with `links`",
                level
            )));
        }
        (None, Some(_)) => {
            return Err(ConfigError::Validation(format!(
                "[{}] pages do not link further; remove `links`",
                level
            )));
        }
        (Some(_), Some(links)) if !names.contains(links.as_str()) => {
            return Err(ConfigError::Validation(format!(
                "[{}] links names unknown rule '{}'",
                level, links
            )));
        }
        _ => {}
    }

    if let Some(pagination) = &config.pagination {
        if level == CrawlLevel::Detail {
            return Err(ConfigError::Validation(
                "[detail] pages are paginated by their entity; remove `pagination`".to_string(),
            ));
        }
        validate_selector(level, "pagination.next-url", &pagination.next_url)?;
        if let Some(number) = &pagination.next_number {
            validate_selector(level, "pagination.next-number", number)?;
        }
    }

    if level == CrawlLevel::Detail && config.rules.is_empty() {
        return Err(ConfigError::Validation(
            "[detail] needs at least one rule".to_string(),
        ));
    }

    Ok(())
}

fn validate_selector(level: CrawlLevel, field: &str, selector: &str) -> Result<(), ConfigError> {
    SelectorExpr::parse(selector).map(|_| ()).map_err(|e| {
        ConfigError::InvalidSelector(format!("{} field '{}': {}", level, field, e))
    })
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    // Must contain a single @ with text on both sides
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
