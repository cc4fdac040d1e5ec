//! Cache store repositories
//!
//! Encapsulate SeaORM operations over the cache schema. Reconciliation is
//! transactional per provider batch with individually guarded record saves.

pub mod pipeline;
pub mod pipeline_run;

pub use pipeline::{PipelineCache, ReconcileStats};
pub use pipeline_run::PipelineRunCache;

use chrono::{DateTime, FixedOffset, Utc};

/// Convert a UTC timestamp into the timezone-carrying type SeaORM stores.
pub fn to_db_time(dt: DateTime<Utc>) -> DateTime<FixedOffset> {
    DateTime::from_naive_utc_and_offset(
        dt.naive_utc(),
        FixedOffset::east_opt(0).expect("UTC offset"),
    )
}
