use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::handlers::AppState;
use crate::pricing::{PricingFilter, PricingMap, PricingRecord, QueryError};

/// Query string of GET /api/pricing
///
/// `api_identifier` is another name for `provider`; only one may be given.
#[derive(Debug, Default, Deserialize)]
pub struct PricingParams {
    pub service_type: Option<String>,
    pub provider: Option<String>,
    pub api_identifier: Option<String>,
}

impl PricingParams {
    fn into_filter(self) -> Result<PricingFilter, AppError> {
        let provider = match (self.provider, self.api_identifier) {
            (Some(_), Some(_)) => {
                return Err(AppError::InvalidRequest(
                    "'provider' and 'api_identifier' name the same filter; pass only one"
                        .to_string(),
                ))
            }
            (provider, api_identifier) => provider.or(api_identifier),
        };

        Ok(PricingFilter {
            service_type: self.service_type,
            provider,
        })
    }
}

/// Handle GET /api/pricing
///
/// Returns every record of the current snapshot, optionally narrowed by
/// `service_type` and `provider`. A cache that is not ready yet answers `{}`.
pub async fn list_pricing(
    State(state): State<AppState>,
    Query(params): Query<PricingParams>,
) -> Result<Json<PricingMap>, AppError> {
    let filter = params.into_filter()?;
    match state.query.filter(&filter) {
        Ok(records) => Ok(Json(records)),
        Err(QueryError::Unavailable) | Err(QueryError::NotFound(_)) => Ok(Json(PricingMap::new())),
    }
}

/// Handle GET /api/pricing/{model_id}
///
/// Model ids are provider-qualified and contain `/`, so the route captures
/// the rest of the path.
pub async fn get_pricing(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> Result<Json<PricingRecord>, AppError> {
    let model_id = model_id.trim_start_matches('/');
    Ok(Json(state.query.lookup(model_id)?))
}
