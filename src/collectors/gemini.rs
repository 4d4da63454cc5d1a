use crate::collectors::{fetch_page, html};
use crate::pricing::{
    qualified_id, CollectorError, PriceCollector, PricingMap, PricingRecord, ServiceType,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::{Map, Value};

pub const DEFAULT_URL: &str = "https://ai.google.dev/pricing";

const NAME: &str = "gemini";

/// Gemini models take text, image, audio and video input and produce text
const MODALITIES: &[&str] = &["text-to-text", "image-to-text", "audio-to-text", "video-to-text"];

/// Scrapes per-model price tables from the Gemini API pricing page
pub struct GeminiCollector {
    client: Client,
    url: String,
}

impl GeminiCollector {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PriceCollector for GeminiCollector {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self) -> Result<PricingMap, CollectorError> {
        let body = fetch_page(&self.client, &self.url, HeaderMap::new()).await?;
        Ok(parse_pricing_page(&body, &self.url))
    }
}

/// One record per model heading whose following table has usable rows
///
/// `raw` maps each row's label (first cell) to `{header: cell}` for the
/// remaining columns.
pub fn parse_pricing_page(page: &str, source: &str) -> PricingMap {
    let mut records = PricingMap::new();

    for (model, table) in html::headed_tables(page) {
        let rows: Map<String, Value> = table
            .complete_rows()
            .filter_map(|row| {
                let (label, cells) = row.split_first()?;
                let columns: Map<String, Value> = table
                    .headers
                    .iter()
                    .skip(1)
                    .zip(cells)
                    .map(|(header, cell)| (header.clone(), Value::String(cell.clone())))
                    .collect();
                Some((label.clone(), Value::Object(columns)))
            })
            .collect();

        if rows.is_empty() {
            continue;
        }
        let Some(model_id) = qualified_id(NAME, &model) else {
            continue;
        };

        let record = PricingRecord::new(
            &model_id,
            NAME,
            source,
            ServiceType::ApiEndpoint,
            Value::Object(rows),
        )
        .with_display(model)
        .with_modalities(MODALITIES);
        records.insert(model_id, record);
    }

    records
}
