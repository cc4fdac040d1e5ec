//! Pipeline run entity model
//!
//! SeaORM entity for the pipeline_runs table, storing run history and the
//! dispatch parameters used for triggered executions.

use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "pipeline_runs")]
pub struct Model {
    /// Provider-scoped run identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning pipeline id
    pub pipeline_id: String,

    /// Run status
    pub status: String,

    /// Start timestamp
    pub started_at: Option<DateTimeWithTimeZone>,

    /// Finish timestamp
    pub finished_at: Option<DateTimeWithTimeZone>,

    /// Duration in seconds; null unless the run reached a terminal state
    pub duration: Option<f64>,

    /// Dispatch inputs used for this run
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub parameters: Option<JsonValue>,

    /// Timestamp when the record was first cached
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp of the last update to this record
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
