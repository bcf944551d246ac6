//! In-memory registry storage implementation

use crate::errors::StorageError;
use crate::registry::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Applications keyed by id, with a uid index kept in step under the same lock
#[derive(Default)]
struct ApplicationTable {
    rows: HashMap<String, Application>,
    uid_index: HashMap<String, String>,
}

/// In-memory implementation for registry storage
pub struct MemoryRegistryStorage {
    supports_scopes: bool,
    applications: Mutex<ApplicationTable>,
    access_grants: Mutex<HashMap<String, AccessGrant>>,
    access_tokens: Mutex<HashMap<String, AccessToken>>,
}

impl Default for MemoryRegistryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistryStorage {
    pub fn new() -> Self {
        Self::with_scopes_support(true)
    }

    /// Storage that behaves like a schema without a scopes column
    pub fn without_scopes() -> Self {
        Self::with_scopes_support(false)
    }

    fn with_scopes_support(supports_scopes: bool) -> Self {
        Self {
            supports_scopes,
            applications: Mutex::new(ApplicationTable::default()),
            access_grants: Mutex::new(HashMap::new()),
            access_tokens: Mutex::new(HashMap::new()),
        }
    }

    fn applications(&self) -> Result<MutexGuard<'_, ApplicationTable>> {
        self.applications
            .lock()
            .map_err(|e| StorageError::SerializationFailed(format!("Lock error: {}", e)))
    }

    fn grants(&self) -> Result<MutexGuard<'_, HashMap<String, AccessGrant>>> {
        self.access_grants
            .lock()
            .map_err(|e| StorageError::SerializationFailed(format!("Lock error: {}", e)))
    }

    fn tokens(&self) -> Result<MutexGuard<'_, HashMap<String, AccessToken>>> {
        self.access_tokens
            .lock()
            .map_err(|e| StorageError::SerializationFailed(format!("Lock error: {}", e)))
    }

    fn check_scopes_writable(&self, attributes: &ApplicationAttributes) -> Result<()> {
        if !self.supports_scopes && !attributes.scopes.is_empty() {
            return Err(StorageError::MissingColumn("applications.scopes".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ApplicationStore for MemoryRegistryStorage {
    fn supports_scopes(&self) -> bool {
        self.supports_scopes
    }

    async fn insert_application(
        &self,
        attributes: &ApplicationAttributes,
        created_at: DateTime<Utc>,
    ) -> Result<Application> {
        self.check_scopes_writable(attributes)?;

        let mut table = self.applications()?;
        if table.uid_index.contains_key(&attributes.uid) {
            return Err(StorageError::UniqueViolation(format!(
                "applications.uid: {}",
                attributes.uid
            )));
        }

        let id = Uuid::new_v4().to_string();
        let application = Application::from_attributes(
            id.clone(),
            attributes.clone(),
            self.supports_scopes,
            created_at,
            created_at,
        );
        table.uid_index.insert(application.uid.clone(), id.clone());
        table.rows.insert(id, application.clone());
        Ok(application)
    }

    async fn get_application(&self, id: &str) -> Result<Option<Application>> {
        let table = self.applications()?;
        Ok(table.rows.get(id).cloned())
    }

    async fn find_application_by_uid(&self, uid: &str) -> Result<Option<Application>> {
        let table = self.applications()?;
        Ok(table
            .uid_index
            .get(uid)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn find_application_by_uid_and_secret(
        &self,
        uid: &str,
        secret: &str,
    ) -> Result<Option<Application>> {
        Ok(self
            .find_application_by_uid(uid)
            .await?
            .filter(|application| {
                bool::from(application.secret.as_bytes().ct_eq(secret.as_bytes()))
            }))
    }

    async fn update_application(
        &self,
        id: &str,
        attributes: &ApplicationAttributes,
        updated_at: DateTime<Utc>,
    ) -> Result<Application> {
        self.check_scopes_writable(attributes)?;

        let mut table = self.applications()?;
        let existing = table
            .rows
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("Application not found: {}", id)))?;

        if existing.uid != attributes.uid {
            if table.uid_index.contains_key(&attributes.uid) {
                return Err(StorageError::UniqueViolation(format!(
                    "applications.uid: {}",
                    attributes.uid
                )));
            }
            table.uid_index.remove(&existing.uid);
            table.uid_index.insert(attributes.uid.clone(), id.to_string());
        }

        let application = Application::from_attributes(
            id.to_string(),
            attributes.clone(),
            self.supports_scopes,
            existing.created_at,
            updated_at,
        );
        table.rows.insert(id.to_string(), application.clone());
        Ok(application)
    }

    async fn delete_application(&self, id: &str) -> Result<()> {
        let mut table = self.applications()?;
        let application = table
            .rows
            .remove(id)
            .ok_or_else(|| StorageError::NotFound(format!("Application not found: {}", id)))?;
        table.uid_index.remove(&application.uid);

        // Cascade while the application lock is held so no new dependents slip in
        self.grants()?.retain(|_, grant| grant.application_id != id);
        self.tokens()?.retain(|_, token| token.application_id != id);
        Ok(())
    }

    async fn list_applications(&self, limit: Option<usize>) -> Result<Vec<Application>> {
        let table = self.applications()?;
        let mut result: Vec<_> = table.rows.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }
}

#[async_trait]
impl AccessGrantStore for MemoryRegistryStorage {
    async fn store_grant(&self, grant: &AccessGrant) -> Result<()> {
        let table = self.applications()?;
        if !table.rows.contains_key(&grant.application_id) {
            return Err(StorageError::InvalidData(format!(
                "Unknown application: {}",
                grant.application_id
            )));
        }
        self.grants()?.insert(grant.token.clone(), grant.clone());
        Ok(())
    }

    async fn get_grant(&self, token: &str) -> Result<Option<AccessGrant>> {
        Ok(self.grants()?.get(token).cloned())
    }

    async fn get_application_grants(&self, application_id: &str) -> Result<Vec<AccessGrant>> {
        let grants = self.grants()?;
        Ok(grants
            .values()
            .filter(|grant| grant.application_id == application_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccessTokenStore for MemoryRegistryStorage {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        let table = self.applications()?;
        if !table.rows.contains_key(&token.application_id) {
            return Err(StorageError::InvalidData(format!(
                "Unknown application: {}",
                token.application_id
            )));
        }
        self.tokens()?.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        Ok(self.tokens()?.get(token).cloned())
    }

    async fn get_application_tokens(&self, application_id: &str) -> Result<Vec<AccessToken>> {
        let tokens = self.tokens()?;
        Ok(tokens
            .values()
            .filter(|token| token.application_id == application_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::scopes::Scopes;
    use chrono::Duration;

    fn attributes(uid: &str) -> ApplicationAttributes {
        ApplicationAttributes {
            name: "Test".to_string(),
            uid: uid.to_string(),
            secret: "secret".to_string(),
            redirect_uri: "https://example.com/cb".to_string(),
            scopes: Scopes::from_string("read"),
        }
    }

    #[tokio::test]
    async fn test_insert_enforces_unique_uid() {
        let storage = MemoryRegistryStorage::new();

        let first = storage
            .insert_application(&attributes("uid-1"), Utc::now())
            .await
            .unwrap();
        assert!(!first.id.is_empty());

        let duplicate = storage
            .insert_application(&attributes("uid-1"), Utc::now())
            .await;
        assert!(matches!(duplicate, Err(StorageError::UniqueViolation(_))));
        assert_eq!(storage.list_applications(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_by_uid_and_secret() {
        let storage = MemoryRegistryStorage::new();
        let app = storage
            .insert_application(&attributes("uid-1"), Utc::now())
            .await
            .unwrap();

        let found = storage.find_application_by_uid("uid-1").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(app.id.clone()));

        let authed = storage
            .find_application_by_uid_and_secret("uid-1", "secret")
            .await
            .unwrap();
        assert_eq!(authed.map(|a| a.id), Some(app.id));

        assert!(
            storage
                .find_application_by_uid_and_secret("uid-1", "wrong")
                .await
                .unwrap()
                .is_none()
        );
        // Prefixes and extensions of the secret differ in length
        for candidate in ["", "secre", "secret2"] {
            assert!(
                storage
                    .find_application_by_uid_and_secret("uid-1", candidate)
                    .await
                    .unwrap()
                    .is_none()
            );
        }
        assert!(storage.find_application_by_uid("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_moves_uid_index() {
        let storage = MemoryRegistryStorage::new();
        let app = storage
            .insert_application(&attributes("uid-1"), Utc::now())
            .await
            .unwrap();
        storage
            .insert_application(&attributes("uid-2"), Utc::now())
            .await
            .unwrap();

        let taken = storage
            .update_application(&app.id, &attributes("uid-2"), Utc::now())
            .await;
        assert!(matches!(taken, Err(StorageError::UniqueViolation(_))));

        let updated = storage
            .update_application(&app.id, &attributes("uid-3"), Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.uid, "uid-3");
        assert_eq!(updated.created_at, app.created_at);
        assert!(storage.find_application_by_uid("uid-1").await.unwrap().is_none());
        assert!(storage.find_application_by_uid("uid-3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let storage = MemoryRegistryStorage::new();
        let app = storage
            .insert_application(&attributes("uid-1"), Utc::now())
            .await
            .unwrap();
        let other = storage
            .insert_application(&attributes("uid-2"), Utc::now())
            .await
            .unwrap();

        let grant = AccessGrant::new(&app, "user", "https://example.com/cb", Scopes::new(), Duration::minutes(10));
        let token = AccessToken::new(&app, Some("user".into()), Scopes::new(), None, false);
        let other_token = AccessToken::new(&other, None, Scopes::new(), None, false);
        storage.store_grant(&grant).await.unwrap();
        storage.store_token(&token).await.unwrap();
        storage.store_token(&other_token).await.unwrap();

        storage.delete_application(&app.id).await.unwrap();

        assert!(storage.get_grant(&grant.token).await.unwrap().is_none());
        assert!(storage.get_token(&token.token).await.unwrap().is_none());
        assert!(storage.get_token(&other_token.token).await.unwrap().is_some());
        assert!(matches!(
            storage.delete_application(&app.id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_without_scopes_column() {
        let storage = MemoryRegistryStorage::without_scopes();
        assert!(!storage.supports_scopes());

        let rejected = storage
            .insert_application(&attributes("uid-1"), Utc::now())
            .await;
        assert!(matches!(rejected, Err(StorageError::MissingColumn(_))));

        let mut unscoped = attributes("uid-1");
        unscoped.scopes = Scopes::new();
        let app = storage.insert_application(&unscoped, Utc::now()).await.unwrap();
        assert!(!app.supports_scopes());
    }
}
