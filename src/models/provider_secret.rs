//! Provider secret entity model
//!
//! SeaORM entity for the provider_secrets table. Ciphertexts are AES-256-GCM
//! payloads keyed by provider type.

use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_secrets")]
pub struct Model {
    /// Provider type this secret belongs to (not the instance name)
    #[sea_orm(primary_key, auto_increment = false)]
    pub provider_type: String,

    /// Encrypted secret payload
    pub ciphertext: Vec<u8>,

    /// Timestamp when the secret was first stored
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp of the last rotation
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
