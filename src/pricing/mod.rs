pub mod aggregator;
pub mod collector;
pub mod query;
pub mod record;
pub mod scheduler;
pub mod store;

pub use aggregator::{merge, Aggregation, Aggregator, CollectorSummary};
pub use collector::{collect, Collection, CollectorError, PriceCollector};
pub use query::{PricingFilter, PricingQuery, QueryError};
pub use record::{qualified_id, CacheSnapshot, PricingMap, PricingRecord, ServiceType};
pub use scheduler::{
    RefreshInProgress, RefreshOutcome, RefreshReport, RefreshScheduler, SchedulerState,
    TriggerOutcome,
};
pub use store::{read_snapshot, write_snapshot, CacheStore, StoreError};
