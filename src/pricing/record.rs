use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Merged or partial pricing data keyed by `model_id`
pub type PricingMap = BTreeMap<String, PricingRecord>;

/// Kind of offering a record describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    ApiEndpoint,
    ServerRental,
    Subscription,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ApiEndpoint => "api_endpoint",
            ServiceType::ServerRental => "server_rental",
            ServiceType::Subscription => "subscription",
            ServiceType::Unknown => "unknown",
        }
    }

    /// Parse a filter value; anything unrecognised is `None` so it matches nothing
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "api_endpoint" => Some(ServiceType::ApiEndpoint),
            "server_rental" => Some(ServiceType::ServerRental),
            "subscription" => Some(ServiceType::Subscription),
            "unknown" => Some(ServiceType::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One model (or plan) entry as scraped from a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRecord {
    /// Provider-qualified identifier, e.g. `openai/gpt-4o`
    #[serde(default)]
    pub model_id: String,

    /// Provider-specific fields, passed through untouched
    #[serde(default)]
    pub raw: Value,

    /// URL the data was fetched from
    #[serde(default)]
    pub source: String,

    /// Short provider code, shared by every record of a provider
    #[serde(default)]
    pub api_identifier: String,

    #[serde(default)]
    pub service_type: ServiceType,

    /// Time of the scrape that produced this record
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modalities: Vec<String>,

    /// Any other descriptive field a collector or an older file carries
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PricingRecord {
    pub fn new(
        model_id: impl Into<String>,
        api_identifier: impl Into<String>,
        source: impl Into<String>,
        service_type: ServiceType,
        raw: Value,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            raw,
            source: source.into(),
            api_identifier: api_identifier.into(),
            service_type,
            last_updated: None,
            display: None,
            description: None,
            price: None,
            unit: None,
            currency: None,
            modalities: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn with_modalities(mut self, modalities: &[&str]) -> Self {
        self.modalities = modalities.iter().map(|m| m.to_string()).collect();
        self
    }
}

/// Build a provider-qualified model id: `<provider>/<slug>`
///
/// The slug is lower-cased with every run of characters other than
/// alphanumerics and `.` collapsed to a single `-`. Returns `None` when
/// nothing usable is left.
pub fn qualified_id(provider: &str, name: &str) -> Option<String> {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() || c == '.' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        None
    } else {
        Some(format!("{}/{}", provider, slug))
    }
}

/// Accept RFC 3339 as well as the naive ISO timestamps older files were written with
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    let Some(value) = value else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(&value) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }

    chrono::NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

/// One complete, immutable merged view of all providers' records
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    records: PricingMap,
    generated_at: DateTime<Utc>,
}

impl CacheSnapshot {
    pub fn new(records: PricingMap, generated_at: DateTime<Utc>) -> Self {
        Self {
            records,
            generated_at,
        }
    }

    pub fn records(&self) -> &PricingMap {
        &self.records
    }

    pub fn get(&self, model_id: &str) -> Option<&PricingRecord> {
        self.records.get(model_id)
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
