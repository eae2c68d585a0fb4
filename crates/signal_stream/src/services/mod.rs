pub mod backfill_service;
pub mod ingest_service;

pub use backfill_service::BackfillOneShotActor;
pub use ingest_service::{IngestCounts, IngestService, IngestStats};
