//! SQLite storage implementations
//!
//! This module provides SQLite-based implementations of all storage traits.
//! SQLite is suitable for single-instance deployments and development.

mod access_grants;
mod access_tokens;
mod applications;

use crate::errors::StorageError;
use crate::registry::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

pub use access_grants::SqliteAccessGrantStore;
pub use access_tokens::SqliteAccessTokenStore;
pub use applications::SqliteApplicationStore;

/// Run database migrations
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
    Ok(())
}

/// Whether `oauth_applications` has a `scopes` column
pub async fn has_scopes_column(pool: &SqlitePool) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM pragma_table_info('oauth_applications') WHERE name = 'scopes'",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

    let count: i64 = row
        .try_get("count")
        .map_err(|e| StorageError::DatabaseError(format!("Failed to get count: {}", e)))?;
    Ok(count > 0)
}

/// Comprehensive SQLite registry storage implementation
pub struct SqliteRegistryStorage {
    application_store: Arc<SqliteApplicationStore>,
    access_grant_store: Arc<SqliteAccessGrantStore>,
    access_token_store: Arc<SqliteAccessTokenStore>,
}

impl SqliteRegistryStorage {
    /// Open storage over an already migrated pool, probing the schema once
    pub async fn open(pool: SqlitePool) -> Result<Self> {
        let supports_scopes = has_scopes_column(&pool).await?;
        if !supports_scopes {
            tracing::warn!("oauth_applications has no scopes column; scope reads will fail");
        }
        Ok(Self::new(pool, supports_scopes))
    }

    /// Create a new SQLite registry storage instance
    pub fn new(pool: SqlitePool, supports_scopes: bool) -> Self {
        Self {
            application_store: Arc::new(SqliteApplicationStore::new(pool.clone(), supports_scopes)),
            access_grant_store: Arc::new(SqliteAccessGrantStore::new(pool.clone())),
            access_token_store: Arc::new(SqliteAccessTokenStore::new(pool)),
        }
    }
}

#[async_trait]
impl ApplicationStore for SqliteRegistryStorage {
    fn supports_scopes(&self) -> bool {
        self.application_store.supports_scopes()
    }

    async fn insert_application(
        &self,
        attributes: &ApplicationAttributes,
        created_at: DateTime<Utc>,
    ) -> Result<Application> {
        self.application_store
            .insert_application(attributes, created_at)
            .await
    }

    async fn get_application(&self, id: &str) -> Result<Option<Application>> {
        self.application_store.get_application(id).await
    }

    async fn find_application_by_uid(&self, uid: &str) -> Result<Option<Application>> {
        self.application_store.find_application_by_uid(uid).await
    }

    async fn find_application_by_uid_and_secret(
        &self,
        uid: &str,
        secret: &str,
    ) -> Result<Option<Application>> {
        self.application_store
            .find_application_by_uid_and_secret(uid, secret)
            .await
    }

    async fn update_application(
        &self,
        id: &str,
        attributes: &ApplicationAttributes,
        updated_at: DateTime<Utc>,
    ) -> Result<Application> {
        self.application_store
            .update_application(id, attributes, updated_at)
            .await
    }

    async fn delete_application(&self, id: &str) -> Result<()> {
        self.application_store.delete_application(id).await
    }

    async fn list_applications(&self, limit: Option<usize>) -> Result<Vec<Application>> {
        self.application_store.list_applications(limit).await
    }
}

#[async_trait]
impl AccessGrantStore for SqliteRegistryStorage {
    async fn store_grant(&self, grant: &AccessGrant) -> Result<()> {
        self.access_grant_store.store_grant(grant).await
    }

    async fn get_grant(&self, token: &str) -> Result<Option<AccessGrant>> {
        self.access_grant_store.get_grant(token).await
    }

    async fn get_application_grants(&self, application_id: &str) -> Result<Vec<AccessGrant>> {
        self.access_grant_store
            .get_application_grants(application_id)
            .await
    }
}

#[async_trait]
impl AccessTokenStore for SqliteRegistryStorage {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        self.access_token_store.store_token(token).await
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        self.access_token_store.get_token(token).await
    }

    async fn get_application_tokens(&self, application_id: &str) -> Result<Vec<AccessToken>> {
        self.access_token_store
            .get_application_tokens(application_id)
            .await
    }
}
