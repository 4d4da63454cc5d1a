use crate::pricing::{CollectorError, PriceCollector, PricingMap, PricingRecord, ServiceType};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_URL: &str = "https://api.dev.runwayml.com/v1/organization";

const NAME: &str = "runway";
const MODEL_ID: &str = "runway/organization";

/// Reads the Runway organization and usage documents through the authenticated API
///
/// Without an API key nothing is requested and the result is empty.
pub struct RunwayCollector {
    client: Client,
    url: String,
    api_key: Option<String>,
    api_version: String,
}

impl RunwayCollector {
    pub fn new(
        client: Client,
        url: impl Into<String>,
        api_key: Option<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
            api_version: api_version.into(),
        }
    }
}

#[async_trait]
impl PriceCollector for RunwayCollector {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self) -> Result<PricingMap, CollectorError> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("No Runway API key configured, skipping");
            return Ok(PricingMap::new());
        };

        let organization = self
            .read_document(self.client.get(&self.url), &self.url, api_key)
            .await?;

        let usage_url = format!("{}/usage", self.url.trim_end_matches('/'));
        let usage = self
            .read_document(
                self.client.post(&usage_url).json(&json!({})),
                &usage_url,
                api_key,
            )
            .await?;

        let record = PricingRecord::new(
            MODEL_ID,
            NAME,
            &self.url,
            ServiceType::Subscription,
            json!({ "organization": organization, "usage": usage }),
        )
        .with_display("Runway organization");

        let mut records = PricingMap::new();
        records.insert(MODEL_ID.to_string(), record);
        Ok(records)
    }
}

impl RunwayCollector {
    async fn read_document(
        &self,
        request: RequestBuilder,
        url: &str,
        api_key: &str,
    ) -> Result<Value, CollectorError> {
        let response = request
            .bearer_auth(api_key)
            .header("X-Runway-Version", &self.api_version)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| CollectorError::Parse(format!("{}: {}", url, e)))
    }
}
