//! Provider collectors
//!
//! One [`PriceCollector`] per provider, registered in a fixed order that
//! doubles as the merge tie-break order (later wins).

pub mod elevenlabs;
pub mod fal;
pub mod gemini;
pub mod hedra;
pub mod html;
pub mod openai;
pub mod runway;

pub use elevenlabs::ElevenLabsCollector;
pub use fal::FalCollector;
pub use gemini::GeminiCollector;
pub use hedra::HedraCollector;
pub use openai::OpenAiCollector;
pub use runway::RunwayCollector;

use crate::config::{CollectorsConfig, SourceConfig};
use crate::pricing::{CollectorError, PriceCollector};
use reqwest::{header::HeaderMap, Client};
use std::sync::Arc;
use std::time::Duration;

/// Registration order of the built-in collectors
pub const COLLECTOR_ORDER: [&str; 6] = ["openai", "fal", "runway", "hedra", "elevenlabs", "gemini"];

/// Shared HTTP client for every collector
///
/// The client-level timeout bounds each single request attempt.
pub fn build_http_client(cfg: &CollectorsConfig) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_seconds))
        .user_agent(cfg.user_agent.clone())
        .build()
}

/// Instantiate the enabled collectors in registration order
pub fn build_collectors(cfg: &CollectorsConfig, client: &Client) -> Vec<Arc<dyn PriceCollector>> {
    let mut collectors: Vec<Arc<dyn PriceCollector>> = Vec::new();

    if cfg.openai.enabled {
        collectors.push(Arc::new(OpenAiCollector::new(
            client.clone(),
            source_url(&cfg.openai, openai::DEFAULT_URL),
            cfg.user_agent.clone(),
        )));
    }
    if cfg.fal.enabled {
        collectors.push(Arc::new(FalCollector::new(
            client.clone(),
            source_url(&cfg.fal, fal::DEFAULT_URL),
        )));
    }
    if cfg.runway.enabled {
        let url = cfg
            .runway
            .url
            .clone()
            .unwrap_or_else(|| runway::DEFAULT_URL.to_string());
        collectors.push(Arc::new(RunwayCollector::new(
            client.clone(),
            url,
            cfg.runway.resolved_api_key(),
            cfg.runway.api_version.clone(),
        )));
    }
    if cfg.hedra.enabled {
        collectors.push(Arc::new(HedraCollector::new(
            client.clone(),
            source_url(&cfg.hedra, hedra::DEFAULT_URL),
        )));
    }
    if cfg.elevenlabs.enabled {
        collectors.push(Arc::new(ElevenLabsCollector::new(
            client.clone(),
            source_url(&cfg.elevenlabs, elevenlabs::DEFAULT_URL),
        )));
    }
    if cfg.gemini.enabled {
        collectors.push(Arc::new(GeminiCollector::new(
            client.clone(),
            source_url(&cfg.gemini, gemini::DEFAULT_URL),
        )));
    }

    collectors
}

fn source_url(source: &SourceConfig, default: &str) -> String {
    source.url.clone().unwrap_or_else(|| default.to_string())
}

/// GET a page and return its body, treating any non-2xx status as an error
pub(crate) async fn fetch_page(
    client: &Client,
    url: &str,
    headers: HeaderMap,
) -> Result<String, CollectorError> {
    let response = client.get(url).headers(headers).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(CollectorError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    Ok(response.text().await?)
}
