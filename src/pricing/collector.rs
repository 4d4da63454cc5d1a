use crate::pricing::record::PricingMap;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a collector produced no data
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("collector panicked: {0}")]
    Panicked(String),
}

/// A source of pricing records for one provider
///
/// Implementations perform their own network I/O and return a partial
/// mapping keyed by provider-qualified `model_id`. They must not touch
/// shared state; errors are returned, never retried.
#[async_trait]
pub trait PriceCollector: Send + Sync + 'static {
    /// Provider code, also used as the `api_identifier` of emitted records
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<PricingMap, CollectorError>;
}

/// Outcome of one collector run: always a mapping, possibly with the reason it is empty
#[derive(Debug)]
pub struct Collection {
    pub collector: String,
    pub records: PricingMap,
    pub error: Option<CollectorError>,
}

impl Collection {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Run one collector with a hard timeout
///
/// The fetch runs on its own task so a panic inside provider code is
/// contained the same way as a network error. Nothing escapes this
/// boundary: any failure becomes an empty mapping plus a logged reason.
pub async fn collect(collector: Arc<dyn PriceCollector>, timeout: Duration) -> Collection {
    let name = collector.name().to_string();
    let mut task = tokio::spawn(async move { collector.fetch().await });

    let result = match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(CollectorError::Panicked(join_err.to_string())),
        Err(_) => {
            task.abort();
            Err(CollectorError::Timeout(timeout))
        }
    };

    match result {
        Ok(records) => {
            debug!(collector = %name, records = records.len(), "Collector finished");
            Collection {
                collector: name,
                records,
                error: None,
            }
        }
        Err(e) => {
            warn!(collector = %name, "Collector failed: {}", e);
            Collection {
                collector: name,
                records: PricingMap::new(),
                error: Some(e),
            }
        }
    }
}
