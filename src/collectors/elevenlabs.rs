use crate::collectors::{fetch_page, html};
use crate::pricing::{CollectorError, PriceCollector, PricingMap, PricingRecord, ServiceType};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::LazyLock;

pub const DEFAULT_URL: &str = "https://elevenlabs.io/pricing";

const NAME: &str = "elevenlabs";

/// Plans in the order the page lists them; usage rates follow the same order
pub const PLAN_ORDER: [&str; 6] = ["Free", "Starter", "Creator", "Pro", "Scale", "Business"];

const MODALITIES: &[&str] = &["text-to-speech", "speech-to-speech"];

static H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h2\b[^>]*>(.*?)</h2>").unwrap());
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<span\b[^>]*class="[^"]*\bf-heading-03\b[^"]*"[^>]*>(.*?)</span>"#).unwrap()
});
static USAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~\$(\d+\.\d+)/minute").unwrap());

/// Scrapes subscription plan cards from the ElevenLabs pricing page
pub struct ElevenLabsCollector {
    client: Client,
    url: String,
}

impl ElevenLabsCollector {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PriceCollector for ElevenLabsCollector {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self) -> Result<PricingMap, CollectorError> {
        let body = fetch_page(&self.client, &self.url, HeaderMap::new()).await?;
        Ok(parse_pricing_page(&body, &self.url))
    }
}

/// Extract plan prices and per-minute usage rates
///
/// A plan's price is the first `f-heading-03` span between its `<h2>`
/// and the next `<h2>`. The n-th usage rate on the page belongs to the
/// n-th plan of [`PLAN_ORDER`].
pub fn parse_pricing_page(page: &str, source: &str) -> PricingMap {
    let mut plans: Vec<(&str, Map<String, Value>)> = Vec::new();

    let headings: Vec<_> = H2_RE.captures_iter(page).collect();
    for (i, caps) in headings.iter().enumerate() {
        let heading = html::text(&caps[1]);
        let Some(&plan) = PLAN_ORDER.iter().find(|p| **p == heading) else {
            continue;
        };
        if plans.iter().any(|(name, _)| *name == plan) {
            continue;
        }

        let start = caps.get(0).map_or(0, |m| m.end());
        let end = headings
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(page.len(), |m| m.start());

        if let Some(price) = PRICE_RE.captures(&page[start..end]) {
            let mut info = Map::new();
            info.insert("Plan".to_string(), Value::String(plan.to_string()));
            info.insert("Price".to_string(), Value::String(html::text(&price[1])));
            plans.push((plan, info));
        }
    }

    for (&plan, rate) in PLAN_ORDER.iter().zip(USAGE_RE.captures_iter(page)) {
        let usage = Value::String(format!("${}/minute", &rate[1]));
        match plans.iter_mut().find(|(name, _)| *name == plan) {
            Some((_, info)) => {
                info.insert("Usage".to_string(), usage);
            }
            None => {
                let mut info = Map::new();
                info.insert("Plan".to_string(), Value::String(plan.to_string()));
                info.insert("Usage".to_string(), usage);
                plans.push((plan, info));
            }
        }
    }

    plans
        .into_iter()
        .map(|(plan, info)| {
            let model_id = format!("{}/{}", NAME, plan.to_lowercase());
            let mut record = PricingRecord::new(
                &model_id,
                NAME,
                source,
                ServiceType::Subscription,
                Value::Object(info.clone()),
            )
            .with_display(plan)
            .with_modalities(MODALITIES);
            record.price = info.get("Price").and_then(Value::as_str).map(str::to_string);
            (model_id, record)
        })
        .collect()
}
