use crate::collectors::fetch_page;
use crate::pricing::{CollectorError, PriceCollector, PricingMap};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use tracing::debug;

pub const DEFAULT_URL: &str = "https://fal.ai/pricing";

/// fal.ai renders its pricing client-side; the page is only fetched to check it is up
///
/// Always yields an empty mapping. An unreachable page is not treated as
/// a collector failure.
pub struct FalCollector {
    client: Client,
    url: String,
}

impl FalCollector {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PriceCollector for FalCollector {
    fn name(&self) -> &str {
        "fal"
    }

    async fn fetch(&self) -> Result<PricingMap, CollectorError> {
        match fetch_page(&self.client, &self.url, HeaderMap::new()).await {
            Ok(_) => debug!(url = %self.url, "fal pricing page reachable, no static data"),
            Err(e) => debug!(url = %self.url, error = %e, "fal pricing page unreachable"),
        }
        Ok(PricingMap::new())
    }
}
