//! SQLite implementation for access grant storage

use super::applications::SqliteApplicationStore;
use crate::errors::StorageError;
use crate::registry::types::AccessGrant;
use crate::storage::map_write_error;
use crate::storage::traits::{AccessGrantStore, Result};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of access grant storage
pub struct SqliteAccessGrantStore {
    pool: SqlitePool,
}

impl SqliteAccessGrantStore {
    /// Create a new SQLite access grant store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Convert SQLite row to AccessGrant
    fn row_to_access_grant(row: &SqliteRow) -> Result<AccessGrant> {
        let revoked_at: Option<String> = row
            .try_get("revoked_at")
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get revoked_at: {}", e)))?;
        let revoked_at = revoked_at
            .map(|value| {
                chrono::DateTime::parse_from_rfc3339(&value)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .map_err(|e| {
                        StorageError::InvalidData(format!("Invalid revoked_at timestamp: {}", e))
                    })
            })
            .transpose()?;

        Ok(AccessGrant {
            id: row
                .try_get("id")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get id: {}", e)))?,
            application_id: row.try_get("application_id").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get application_id: {}", e))
            })?,
            resource_owner_id: row.try_get("resource_owner_id").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get resource_owner_id: {}", e))
            })?,
            token: row
                .try_get("token")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get token: {}", e)))?,
            redirect_uri: row.try_get("redirect_uri").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get redirect_uri: {}", e))
            })?,
            scopes: SqliteApplicationStore::parse_scopes(row, "scopes")?,
            expires_in: row.try_get("expires_in").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get expires_in: {}", e))
            })?,
            created_at: SqliteApplicationStore::parse_timestamp(row, "created_at")?,
            revoked_at,
        })
    }
}

#[async_trait]
impl AccessGrantStore for SqliteAccessGrantStore {
    async fn store_grant(&self, grant: &AccessGrant) -> Result<()> {
        let scopes_json = SqliteApplicationStore::serialize_scopes(&grant.scopes)?;

        sqlx::query(
            r#"
            INSERT INTO oauth_access_grants (
                id, application_id, resource_owner_id, token, redirect_uri,
                scopes, expires_in, created_at, revoked_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&grant.id)
        .bind(&grant.application_id)
        .bind(&grant.resource_owner_id)
        .bind(&grant.token)
        .bind(&grant.redirect_uri)
        .bind(&scopes_json)
        .bind(grant.expires_in)
        .bind(grant.created_at.to_rfc3339())
        .bind(grant.revoked_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_grant(&self, token: &str) -> Result<Option<AccessGrant>> {
        let row = sqlx::query("SELECT * FROM oauth_access_grants WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_access_grant).transpose()
    }

    async fn get_application_grants(&self, application_id: &str) -> Result<Vec<AccessGrant>> {
        let rows = sqlx::query(
            "SELECT * FROM oauth_access_grants WHERE application_id = ? ORDER BY created_at",
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::row_to_access_grant).collect()
    }
}
