//! SQLite implementation for access token storage

use super::applications::SqliteApplicationStore;
use crate::errors::StorageError;
use crate::registry::types::AccessToken;
use crate::storage::map_write_error;
use crate::storage::traits::{AccessTokenStore, Result};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of access token storage
pub struct SqliteAccessTokenStore {
    pool: SqlitePool,
}

impl SqliteAccessTokenStore {
    /// Create a new SQLite access token store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Convert SQLite row to AccessToken
    fn row_to_access_token(row: &SqliteRow) -> Result<AccessToken> {
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

        Ok(AccessToken {
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
            refresh_token: row.try_get("refresh_token").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get refresh_token: {}", e))
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
impl AccessTokenStore for SqliteAccessTokenStore {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        let scopes_json = SqliteApplicationStore::serialize_scopes(&token.scopes)?;

        sqlx::query(
            r#"
            INSERT INTO oauth_access_tokens (
                id, application_id, resource_owner_id, token, refresh_token,
                scopes, expires_in, created_at, revoked_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&token.id)
        .bind(&token.application_id)
        .bind(&token.resource_owner_id)
        .bind(&token.token)
        .bind(&token.refresh_token)
        .bind(&scopes_json)
        .bind(token.expires_in)
        .bind(token.created_at.to_rfc3339())
        .bind(token.revoked_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query("SELECT * FROM oauth_access_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_access_token).transpose()
    }

    async fn get_application_tokens(&self, application_id: &str) -> Result<Vec<AccessToken>> {
        let rows = sqlx::query(
            "SELECT * FROM oauth_access_tokens WHERE application_id = ? ORDER BY created_at",
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::row_to_access_token).collect()
    }
}
