//! Storage trait definitions for applications and the grants/tokens they own.
//!
//! Defines async storage interfaces that can be implemented by various backend
//! providers. Backends enforce uid uniqueness themselves and cascade application
//! deletes to dependent grants and tokens.

use crate::errors::StorageError;
use crate::registry::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for storing and retrieving client applications
#[async_trait]
pub trait ApplicationStore {
    /// Whether the application schema has a scopes column.
    ///
    /// Resolved once when the backend is opened.
    fn supports_scopes(&self) -> bool;

    /// Insert a new application and assign its id.
    ///
    /// Must fail with [`StorageError::UniqueViolation`] when the uid is taken,
    /// atomically with the insert.
    async fn insert_application(
        &self,
        attributes: &ApplicationAttributes,
        created_at: DateTime<Utc>,
    ) -> Result<Application>;

    /// Retrieve an application by id
    async fn get_application(&self, id: &str) -> Result<Option<Application>>;

    /// Retrieve an application by exact uid
    async fn find_application_by_uid(&self, uid: &str) -> Result<Option<Application>>;

    /// Retrieve an application by exact uid and secret
    async fn find_application_by_uid_and_secret(
        &self,
        uid: &str,
        secret: &str,
    ) -> Result<Option<Application>>;

    /// Replace the attributes of an existing application
    async fn update_application(
        &self,
        id: &str,
        attributes: &ApplicationAttributes,
        updated_at: DateTime<Utc>,
    ) -> Result<Application>;

    /// Delete an application together with its grants and tokens
    async fn delete_application(&self, id: &str) -> Result<()>;

    /// List applications, newest first
    async fn list_applications(&self, limit: Option<usize>) -> Result<Vec<Application>>;
}

/// Trait for storing and retrieving access grants
#[async_trait]
pub trait AccessGrantStore {
    /// Store a new access grant
    async fn store_grant(&self, grant: &AccessGrant) -> Result<()>;

    /// Retrieve a grant by its code
    async fn get_grant(&self, token: &str) -> Result<Option<AccessGrant>>;

    /// All grants owned by an application
    async fn get_application_grants(&self, application_id: &str) -> Result<Vec<AccessGrant>>;
}

/// Trait for storing and retrieving access tokens
#[async_trait]
pub trait AccessTokenStore {
    /// Store a new access token
    async fn store_token(&self, token: &AccessToken) -> Result<()>;

    /// Retrieve an access token
    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>>;

    /// All tokens owned by an application
    async fn get_application_tokens(&self, application_id: &str) -> Result<Vec<AccessToken>>;
}

/// Combined registry storage trait
pub trait RegistryStorage: ApplicationStore + AccessGrantStore + AccessTokenStore + Send + Sync {}

impl<T> RegistryStorage for T where T: ApplicationStore + AccessGrantStore + AccessTokenStore + Send + Sync
{}
