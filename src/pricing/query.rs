use crate::pricing::record::{CacheSnapshot, PricingMap, PricingRecord, ServiceType};
use crate::pricing::store::CacheStore;
use std::sync::Arc;
use thiserror::Error;

/// Typed outcomes of a read that found nothing to return
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("pricing cache not ready")]
    Unavailable,
}

/// Field filters for listing records; both given means both must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PricingFilter {
    pub service_type: Option<String>,
    pub provider: Option<String>,
}

impl PricingFilter {
    pub fn is_empty(&self) -> bool {
        self.service_type.is_none() && self.provider.is_none()
    }

    pub fn matches(&self, record: &PricingRecord) -> bool {
        let service_ok = match self.service_type.as_deref() {
            None => true,
            Some(value) => ServiceType::parse(value) == Some(record.service_type),
        };
        let provider_ok = match self.provider.as_deref() {
            None => true,
            Some(value) => record.api_identifier == value,
        };
        service_ok && provider_ok
    }
}

/// Read-only view over the cache store
///
/// Never triggers a refresh; every answer comes from whichever snapshot
/// is current at the time of the call.
#[derive(Clone)]
pub struct PricingQuery {
    store: Arc<CacheStore>,
}

impl PricingQuery {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    fn snapshot(&self) -> Result<Arc<CacheSnapshot>, QueryError> {
        self.store.get_snapshot().ok_or(QueryError::Unavailable)
    }

    pub fn lookup(&self, model_id: &str) -> Result<PricingRecord, QueryError> {
        self.snapshot()?
            .get(model_id)
            .cloned()
            .ok_or_else(|| QueryError::NotFound(model_id.to_string()))
    }

    pub fn filter(&self, filter: &PricingFilter) -> Result<PricingMap, QueryError> {
        let snapshot = self.snapshot()?;
        if filter.is_empty() {
            return Ok(snapshot.records().clone());
        }

        Ok(snapshot
            .records()
            .iter()
            .filter(|(_, record)| filter.matches(record))
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }
}
