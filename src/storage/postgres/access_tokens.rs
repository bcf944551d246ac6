//! PostgreSQL implementation for access token storage

use super::applications::PostgresApplicationStore;
use crate::errors::StorageError;
use crate::registry::types::AccessToken;
use crate::storage::map_write_error;
use crate::storage::traits::{AccessTokenStore, Result};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;

/// PostgreSQL implementation of access token storage
pub struct PostgresAccessTokenStore {
    pool: PgPool,
}

impl PostgresAccessTokenStore {
    /// Create a new PostgreSQL access token store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to AccessToken
    fn row_to_access_token(row: &PgRow) -> Result<AccessToken> {
        let column_error = |column: &str, e: sqlx::Error| {
            StorageError::DatabaseError(format!("Failed to get {}: {}", column, e))
        };

        Ok(AccessToken {
            id: row.try_get("id").map_err(|e| column_error("id", e))?,
            application_id: row
                .try_get("application_id")
                .map_err(|e| column_error("application_id", e))?,
            resource_owner_id: row
                .try_get("resource_owner_id")
                .map_err(|e| column_error("resource_owner_id", e))?,
            token: row.try_get("token").map_err(|e| column_error("token", e))?,
            refresh_token: row
                .try_get("refresh_token")
                .map_err(|e| column_error("refresh_token", e))?,
            scopes: PostgresApplicationStore::parse_scopes(row, "scopes")?,
            expires_in: row
                .try_get("expires_in")
                .map_err(|e| column_error("expires_in", e))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| column_error("created_at", e))?,
            revoked_at: row
                .try_get("revoked_at")
                .map_err(|e| column_error("revoked_at", e))?,
        })
    }
}

#[async_trait]
impl AccessTokenStore for PostgresAccessTokenStore {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_access_tokens (
                id, application_id, resource_owner_id, token, refresh_token,
                scopes, expires_in, created_at, revoked_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&token.id)
        .bind(&token.application_id)
        .bind(&token.resource_owner_id)
        .bind(&token.token)
        .bind(&token.refresh_token)
        .bind(Json(token.scopes.clone()))
        .bind(token.expires_in)
        .bind(token.created_at)
        .bind(token.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query("SELECT * FROM oauth_access_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_access_token).transpose()
    }

    async fn get_application_tokens(&self, application_id: &str) -> Result<Vec<AccessToken>> {
        let rows = sqlx::query(
            "SELECT * FROM oauth_access_tokens WHERE application_id = $1 ORDER BY created_at",
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::row_to_access_token).collect()
    }
}
