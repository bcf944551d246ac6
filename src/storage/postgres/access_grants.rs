//! PostgreSQL implementation for access grant storage

use super::applications::PostgresApplicationStore;
use crate::errors::StorageError;
use crate::registry::types::AccessGrant;
use crate::storage::map_write_error;
use crate::storage::traits::{AccessGrantStore, Result};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;

/// PostgreSQL implementation of access grant storage
pub struct PostgresAccessGrantStore {
    pool: PgPool,
}

impl PostgresAccessGrantStore {
    /// Create a new PostgreSQL access grant store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to AccessGrant
    fn row_to_access_grant(row: &PgRow) -> Result<AccessGrant> {
        let column_error = |column: &str, e: sqlx::Error| {
            StorageError::DatabaseError(format!("Failed to get {}: {}", column, e))
        };

        Ok(AccessGrant {
            id: row.try_get("id").map_err(|e| column_error("id", e))?,
            application_id: row
                .try_get("application_id")
                .map_err(|e| column_error("application_id", e))?,
            resource_owner_id: row
                .try_get("resource_owner_id")
                .map_err(|e| column_error("resource_owner_id", e))?,
            token: row.try_get("token").map_err(|e| column_error("token", e))?,
            redirect_uri: row
                .try_get("redirect_uri")
                .map_err(|e| column_error("redirect_uri", e))?,
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
impl AccessGrantStore for PostgresAccessGrantStore {
    async fn store_grant(&self, grant: &AccessGrant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_access_grants (
                id, application_id, resource_owner_id, token, redirect_uri,
                scopes, expires_in, created_at, revoked_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&grant.id)
        .bind(&grant.application_id)
        .bind(&grant.resource_owner_id)
        .bind(&grant.token)
        .bind(&grant.redirect_uri)
        .bind(Json(grant.scopes.clone()))
        .bind(grant.expires_in)
        .bind(grant.created_at)
        .bind(grant.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_grant(&self, token: &str) -> Result<Option<AccessGrant>> {
        let row = sqlx::query("SELECT * FROM oauth_access_grants WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_access_grant).transpose()
    }

    async fn get_application_grants(&self, application_id: &str) -> Result<Vec<AccessGrant>> {
        let rows = sqlx::query(
            "SELECT * FROM oauth_access_grants WHERE application_id = $1 ORDER BY created_at",
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::row_to_access_grant).collect()
    }
}
