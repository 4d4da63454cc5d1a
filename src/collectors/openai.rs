use crate::collectors::{fetch_page, html};
use crate::pricing::{
    qualified_id, CollectorError, PriceCollector, PricingMap, PricingRecord, ServiceType,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

pub const DEFAULT_URL: &str = "https://openai.com/pricing";

const NAME: &str = "openai";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Scrapes the pricing tables on OpenAI's public pricing page
pub struct OpenAiCollector {
    client: Client,
    url: String,
    user_agent: String,
}

impl OpenAiCollector {
    pub fn new(client: Client, url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            user_agent: user_agent.into(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers
    }
}

#[async_trait]
impl PriceCollector for OpenAiCollector {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self) -> Result<PricingMap, CollectorError> {
        let body = fetch_page(&self.client, &self.url, self.headers()).await?;
        let records = parse_pricing_page(&body, &self.url);
        debug!(records = records.len(), "Parsed OpenAI pricing tables");
        Ok(records)
    }
}

/// Turn every headed table on the page into records, one per complete row
pub fn parse_pricing_page(page: &str, source: &str) -> PricingMap {
    let mut records = PricingMap::new();

    for table in html::tables(page) {
        if table.headers.is_empty() {
            continue;
        }

        let model_column = table.headers.iter().position(|h| h == "Model");
        let service_type = if model_column.is_some() {
            ServiceType::ApiEndpoint
        } else {
            ServiceType::Unknown
        };

        for row in table.complete_rows() {
            let name = &row[model_column.unwrap_or(0)];
            let Some(model_id) = qualified_id(NAME, name) else {
                continue;
            };

            let raw: Map<String, Value> = table
                .headers
                .iter()
                .zip(row)
                .map(|(header, cell)| (header.clone(), Value::String(cell.clone())))
                .collect();

            let record =
                PricingRecord::new(&model_id, NAME, source, service_type, Value::Object(raw))
                    .with_display(name.clone());
            records.insert(model_id, record);
        }
    }

    records
}
