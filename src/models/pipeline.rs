//! Pipeline entity model
//!
//! SeaORM entity for the pipelines table: the durable cache of last-known
//! pipeline state, keyed by the provider-scoped pipeline id and mutated in
//! place by reconciliation.

use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "pipelines")]
pub struct Model {
    /// Provider-scoped pipeline identifier (stable across fetches)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Pipeline/workflow name
    pub name: String,

    /// Last observed status
    pub status: String,

    /// Repository coordinates (owner/repo)
    pub repository: String,

    /// Branch of the latest observed run
    pub branch: String,

    /// Commit SHA of the latest observed run
    pub commit: String,

    /// Commit message (optional)
    #[sea_orm(column_type = "Text", nullable)]
    pub commit_message: Option<String>,

    /// Commit author (optional)
    pub author: Option<String>,

    /// Name of the owning provider instance
    pub provider: String,

    /// Link to the pipeline in the provider's UI
    pub url: Option<String>,

    /// Start timestamp of the latest observed run
    pub started_at: Option<DateTimeWithTimeZone>,

    /// Finish timestamp, present only once the run completed
    pub finished_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the record was first cached
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp of the last reconciliation touching this record
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
