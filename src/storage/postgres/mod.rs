//! PostgreSQL storage implementations
//!
//! This module provides PostgreSQL-based implementations of all storage traits.
//! PostgreSQL is suitable for production deployments with high availability requirements.

mod access_grants;
mod access_tokens;
mod applications;

use crate::errors::StorageError;
use crate::registry::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use std::sync::Arc;

pub use access_grants::PostgresAccessGrantStore;
pub use access_tokens::PostgresAccessTokenStore;
pub use applications::PostgresApplicationStore;

/// Run database migrations
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
    Ok(())
}

/// Whether `oauth_applications` has a `scopes` column
pub async fn has_scopes_column(pool: &PgPool) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = 'oauth_applications'
              AND column_name = 'scopes'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| StorageError::DatabaseError(e.to_string()))
}

/// Comprehensive PostgreSQL registry storage implementation
pub struct PostgresRegistryStorage {
    application_store: Arc<PostgresApplicationStore>,
    access_grant_store: Arc<PostgresAccessGrantStore>,
    access_token_store: Arc<PostgresAccessTokenStore>,
}

impl PostgresRegistryStorage {
    /// Open storage over an already migrated pool, probing the schema once
    pub async fn open(pool: PgPool) -> Result<Self> {
        let supports_scopes = has_scopes_column(&pool).await?;
        if !supports_scopes {
            tracing::warn!("oauth_applications has no scopes column; scope reads will fail");
        }
        Ok(Self::new(pool, supports_scopes))
    }

    /// Create a new PostgreSQL registry storage instance
    pub fn new(pool: PgPool, supports_scopes: bool) -> Self {
        Self {
            application_store: Arc::new(PostgresApplicationStore::new(
                pool.clone(),
                supports_scopes,
            )),
            access_grant_store: Arc::new(PostgresAccessGrantStore::new(pool.clone())),
            access_token_store: Arc::new(PostgresAccessTokenStore::new(pool)),
        }
    }
}

#[async_trait]
impl ApplicationStore for PostgresRegistryStorage {
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
impl AccessGrantStore for PostgresRegistryStorage {
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
impl AccessTokenStore for PostgresRegistryStorage {
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
