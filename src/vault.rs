//! Secret vault for provider credentials
//!
//! Stores AES-256-GCM-encrypted secrets in the provider_secrets table, keyed
//! by provider type (not instance name) so several instances of one provider
//! type share a credential. The provider type doubles as the AAD, binding
//! each ciphertext to its row.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tracing::info;

use crate::crypto::{CryptoKey, decrypt_bytes, encrypt_bytes};
use crate::models::provider_secret::{self, Entity as ProviderSecret};
use crate::repositories::to_db_time;

/// Vault over the provider_secrets table.
#[derive(Clone)]
pub struct SecretVault {
    db: Arc<DatabaseConnection>,
    key: CryptoKey,
}

impl SecretVault {
    /// Creates a new vault backed by the given pool and key.
    pub fn new(db: Arc<DatabaseConnection>, key: CryptoKey) -> Self {
        Self { db, key }
    }

    /// Store a secret for a provider type, replacing any previous value.
    pub async fn set_secret(&self, provider_type: &str, value: &str) -> Result<()> {
        let ciphertext = encrypt_bytes(&self.key, provider_type.as_bytes(), value.as_bytes())
            .map_err(|e| anyhow!("secret encryption failed: {}", e))?;

        let now = to_db_time(Utc::now());
        let existing = ProviderSecret::find_by_id(provider_type)
            .one(self.db.as_ref())
            .await?;

        match existing {
            Some(_) => {
                let active = provider_secret::ActiveModel {
                    provider_type: Set(provider_type.to_string()),
                    ciphertext: Set(ciphertext),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active.update(self.db.as_ref()).await?;
            }
            None => {
                let active = provider_secret::ActiveModel {
                    provider_type: Set(provider_type.to_string()),
                    ciphertext: Set(ciphertext),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                active.insert(self.db.as_ref()).await?;
            }
        }

        info!(provider_type, "secret stored");
        Ok(())
    }

    /// Retrieve and decrypt a secret. `None` when no secret is stored for
    /// the provider type.
    pub async fn get_secret(&self, provider_type: &str) -> Result<Option<String>> {
        let Some(record) = ProviderSecret::find_by_id(provider_type)
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(None);
        };

        let plaintext = decrypt_bytes(&self.key, provider_type.as_bytes(), &record.ciphertext)
            .map_err(|e| anyhow!("secret decryption failed for '{}': {}", provider_type, e))?;

        Ok(Some(String::from_utf8(plaintext)?))
    }

    /// Whether a secret exists for the provider type.
    pub async fn has_secret(&self, provider_type: &str) -> Result<bool> {
        Ok(ProviderSecret::find_by_id(provider_type)
            .one(self.db.as_ref())
            .await?
            .is_some())
    }

    /// Remove a secret. Returns whether a record was deleted.
    pub async fn delete_secret(&self, provider_type: &str) -> Result<bool> {
        let result = ProviderSecret::delete_by_id(provider_type)
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected > 0 {
            info!(provider_type, "secret deleted");
        }
        Ok(result.rows_affected > 0)
    }
}
