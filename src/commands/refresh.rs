use anyhow::{Context, Result};
use colored::Colorize;
use pricing_service::config::{self, Config};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Execute the refresh command
///
/// Sends `POST /api/refresh` to a running instance and prints its answer.
pub async fn execute(config_path: &Path, url: Option<String>) -> Result<()> {
    let base = match url {
        Some(url) => url,
        None => service_url(&config::load_config(config_path)?),
    };
    let endpoint = format!("{}/api/refresh", base.trim_end_matches('/'));

    println!("{} {}", "Requesting refresh from".yellow(), endpoint);

    let response = reqwest::Client::new()
        .post(&endpoint)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", endpoint))?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let reported = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    match status.as_u16() {
        202 => println!("{}", format!("✓ Refresh {}", reported).green()),
        409 => println!("{}", "Refresh already in progress".yellow()),
        _ => anyhow::bail!("Unexpected response {}: {}", status, body),
    }

    Ok(())
}

/// Local URL of the configured server; a wildcard bind address maps to loopback
fn service_url(cfg: &Config) -> String {
    let host = match cfg.server.host.as_str() {
        "0.0.0.0" | "::" | "" => "127.0.0.1",
        host => host,
    };
    format!("http://{}:{}", host, cfg.server.port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_url_maps_wildcard_to_loopback() {
        let mut cfg = Config::default();
        assert_eq!(service_url(&cfg), "http://127.0.0.1:8000");

        cfg.server.host = "pricing.internal".to_string();
        cfg.server.port = 9000;
        assert_eq!(service_url(&cfg), "http://pricing.internal:9000");
    }
}
