use crate::collectors::fetch_page;
use crate::pricing::{CollectorError, PriceCollector, PricingMap, PricingRecord, ServiceType};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::json;

pub const DEFAULT_URL: &str = "https://hedra.com/pricing";

const NAME: &str = "hedra";
const MODEL_ID: &str = "hedra/pricing";

/// Confirms the Hedra pricing page is up and records a placeholder for it
///
/// The page carries no server-rendered prices.
pub struct HedraCollector {
    client: Client,
    url: String,
}

impl HedraCollector {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PriceCollector for HedraCollector {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self) -> Result<PricingMap, CollectorError> {
        fetch_page(&self.client, &self.url, HeaderMap::new()).await?;

        let record = PricingRecord::new(
            MODEL_ID,
            NAME,
            &self.url,
            ServiceType::Subscription,
            json!({ "message": "Pricing page accessible but data not parsed" }),
        )
        .with_display("Hedra")
        .with_modalities(&["speech-to-video", "text-to-video"]);

        let mut records = PricingMap::new();
        records.insert(MODEL_ID.to_string(), record);
        Ok(records)
    }
}
