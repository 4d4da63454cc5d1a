use anyhow::Result;
use colored::Colorize;
use pricing_service::config::{self, Config};
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the current configuration with secrets masked
pub fn show(config_path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let cfg = config::load_config(config_path)?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    info!("Configuration displayed successfully");
    Ok(())
}

/// Execute the config validate command
pub fn validate(config_path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!("Validating configuration file");

    let cfg = config::load_config(config_path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Enabled Collectors: {}", count_enabled_collectors(&cfg));
    println!(
        "  Refresh Interval: {}s",
        cfg.cache.refresh_interval_seconds
    );

    info!("Configuration validation successful");
    Ok(())
}

/// Sanitize secrets in configuration for safe display
fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();
    sanitized.collectors.runway.api_key = sanitized
        .collectors
        .runway
        .api_key
        .as_deref()
        .map(mask_api_key);
    sanitized
}

/// Mask an API key for safe display
///
/// Shows first 7 and last 4 characters with an ellipsis in between
/// Example: "key_1234567890abcdef" -> "key_123...cdef"
fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 11 {
        return "***".to_string();
    }

    let prefix: String = chars[..7].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();

    format!("{}...{}", prefix, suffix)
}

fn count_enabled_collectors(cfg: &Config) -> usize {
    let c = &cfg.collectors;
    [
        c.openai.enabled,
        c.fal.enabled,
        c.runway.enabled,
        c.hedra.enabled,
        c.elevenlabs.enabled,
        c.gemini.enabled,
    ]
    .iter()
    .filter(|enabled| **enabled)
    .count()
}
