//! The application registry service: creation, validation, lookup, update and destroy.

use crate::config::Config;
use crate::errors::{RegistryError, StorageError};
use crate::registry::redirect_uri::RedirectUriValidator;
use crate::registry::types::*;
use crate::registry::validation::{
    Field, Reason, ScopePolicy, ValidationErrors, validate_attributes,
};
use crate::storage::traits::{
    AccessGrantStore, AccessTokenStore, ApplicationStore, RegistryStorage,
};
use chrono::Utc;
use std::fmt::Display;
use std::sync::Arc;

/// Registry of OAuth client applications over a storage backend
#[derive(Clone)]
pub struct ApplicationRegistry {
    storage: Arc<dyn RegistryStorage>,
    redirect_uri_validator: Arc<dyn RedirectUriValidator>,
    scope_policy: Arc<dyn ScopePolicy>,
}

impl ApplicationRegistry {
    /// Create a registry using the validator and scope policy described by `config`
    pub fn new(storage: Arc<dyn RegistryStorage>, config: &Config) -> Self {
        Self {
            storage,
            redirect_uri_validator: Arc::new(config.redirect_uri_validator()),
            scope_policy: Arc::new(config.scope_policy()),
        }
    }

    /// Replace the redirect URI validator
    pub fn with_redirect_uri_validator(
        mut self,
        validator: impl RedirectUriValidator + 'static,
    ) -> Self {
        self.redirect_uri_validator = Arc::new(validator);
        self
    }

    /// Replace the scope-required policy
    pub fn with_scope_policy(mut self, policy: impl ScopePolicy + 'static) -> Self {
        self.scope_policy = Arc::new(policy);
        self
    }

    /// The storage backend this registry writes to
    pub fn storage(&self) -> &Arc<dyn RegistryStorage> {
        &self.storage
    }

    /// Register a new application.
    ///
    /// Absent credentials are generated first, then every rule is checked.
    /// Nothing is written unless all of them pass.
    pub async fn create(
        &self,
        mut new_application: NewApplication,
    ) -> Result<Application, RegistryError> {
        new_application.generate_credentials();
        let attributes = new_application.into_attributes();

        self.validate(&attributes, None).await?;

        let application = self
            .storage
            .insert_application(&attributes, Utc::now())
            .await
            .map_err(map_write_error)?;

        tracing::info!(id = %application.id, uid = %application.uid, "application created");
        Ok(application)
    }

    /// Apply changed fields to an existing application and revalidate it.
    ///
    /// Credentials are never regenerated here.
    pub async fn update(
        &self,
        id: &str,
        changes: ApplicationUpdate,
    ) -> Result<Application, RegistryError> {
        let current = self
            .find(id)
            .await?
            .ok_or_else(|| RegistryError::ApplicationNotFound(id.to_string()))?;

        if changes.scopes.as_ref().is_some_and(|scopes| !scopes.is_empty())
            && !current.supports_scopes()
        {
            tracing::error!(id = %id, "cannot write scopes without a scopes column");
            return Err(RegistryError::MissingScopesColumn);
        }

        let mut attributes = current.attributes();
        changes.apply(&mut attributes);

        self.validate(&attributes, Some(id)).await?;

        let application = self
            .storage
            .update_application(id, &attributes, Utc::now())
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => RegistryError::ApplicationNotFound(id.to_string()),
                e => map_write_error(e),
            })?;

        tracing::info!(id = %application.id, uid = %application.uid, "application updated");
        Ok(application)
    }

    /// Delete an application together with its grants and tokens
    pub async fn destroy(&self, id: &str) -> Result<(), RegistryError> {
        self.storage.delete_application(id).await.map_err(|e| match e {
            StorageError::NotFound(_) => RegistryError::ApplicationNotFound(id.to_string()),
            e => RegistryError::Storage(e),
        })?;

        tracing::info!(id = %id, "application destroyed");
        Ok(())
    }

    /// Look up an application by its storage id
    pub async fn find(&self, id: &str) -> Result<Option<Application>, RegistryError> {
        Ok(self.storage.get_application(id).await?)
    }

    /// List applications, newest first
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<Application>, RegistryError> {
        Ok(self.storage.list_applications(limit).await?)
    }

    /// Look up an application by exact client identifier.
    ///
    /// The identifier is compared in its string form, so `by_uid(123)` matches
    /// the uid `"123"`.
    pub async fn by_uid(&self, uid: impl Display) -> Result<Option<Application>, RegistryError> {
        let uid = uid.to_string();
        Ok(self.storage.find_application_by_uid(&uid).await?)
    }

    /// Look up an application by exact client identifier and secret
    pub async fn by_uid_and_secret(
        &self,
        uid: impl Display,
        secret: impl Display,
    ) -> Result<Option<Application>, RegistryError> {
        let uid = uid.to_string();
        let secret = secret.to_string();
        Ok(self
            .storage
            .find_application_by_uid_and_secret(&uid, &secret)
            .await?)
    }

    /// Grants owned by the application
    pub async fn access_grants(
        &self,
        application: &Application,
    ) -> Result<Vec<AccessGrant>, RegistryError> {
        Ok(self.storage.get_application_grants(&application.id).await?)
    }

    /// Tokens owned by the application
    pub async fn access_tokens(
        &self,
        application: &Application,
    ) -> Result<Vec<AccessToken>, RegistryError> {
        Ok(self.storage.get_application_tokens(&application.id).await?)
    }

    /// Record a grant, refusing scopes its owning application does not allow.
    ///
    /// The bound comes from the stored owner named by `grant.application_id`.
    pub async fn store_access_grant(&self, grant: &AccessGrant) -> Result<(), RegistryError> {
        let owner = self.owning_application(&grant.application_id).await?;
        if !owner.permits(&grant.scopes)? {
            return Err(RegistryError::ScopeNotPermitted(grant.scopes.to_string()));
        }
        self.storage.store_grant(grant).await?;

        tracing::debug!(application_id = %owner.id, "access grant stored");
        Ok(())
    }

    /// Record a token, refusing scopes its owning application does not allow.
    ///
    /// The bound comes from the stored owner named by `token.application_id`.
    pub async fn store_access_token(&self, token: &AccessToken) -> Result<(), RegistryError> {
        let owner = self.owning_application(&token.application_id).await?;
        if !owner.permits(&token.scopes)? {
            return Err(RegistryError::ScopeNotPermitted(token.scopes.to_string()));
        }
        self.storage.store_token(token).await?;

        tracing::debug!(application_id = %owner.id, "access token stored");
        Ok(())
    }

    async fn owning_application(
        &self,
        application_id: &str,
    ) -> Result<Application, RegistryError> {
        self.find(application_id)
            .await?
            .ok_or_else(|| RegistryError::ApplicationNotFound(application_id.to_string()))
    }

    async fn validate(
        &self,
        attributes: &ApplicationAttributes,
        existing_id: Option<&str>,
    ) -> Result<(), RegistryError> {
        let mut errors = validate_attributes(
            attributes,
            self.storage.supports_scopes(),
            self.redirect_uri_validator.as_ref(),
            self.scope_policy.as_ref(),
        );

        if !attributes.uid.trim().is_empty() {
            let holder = self.storage.find_application_by_uid(&attributes.uid).await?;
            if holder.is_some_and(|holder| Some(holder.id.as_str()) != existing_id) {
                errors.add(Field::Uid, Reason::Taken);
            }
        }

        if !errors.is_empty() {
            tracing::debug!(uid = %attributes.uid, errors = %errors, "application rejected");
        }
        errors.into_result().map_err(RegistryError::from)
    }
}

fn map_write_error(error: StorageError) -> RegistryError {
    match error {
        // Lost a race for the uid between the uniqueness check and the write
        StorageError::UniqueViolation(_) => {
            let mut errors = ValidationErrors::new();
            errors.add(Field::Uid, Reason::Taken);
            RegistryError::Validation(errors)
        }
        StorageError::MissingColumn(column) => {
            tracing::error!(column = %column, "cannot write scopes without a scopes column");
            RegistryError::MissingScopesColumn
        }
        e => RegistryError::Storage(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::scopes::Scopes;
    use crate::registry::validation::ConfiguredScopePolicy;
    use crate::storage::MemoryRegistryStorage;
    use chrono::Duration;

    fn registry() -> ApplicationRegistry {
        ApplicationRegistry::new(Arc::new(MemoryRegistryStorage::new()), &Config::default())
    }

    fn new_application() -> NewApplication {
        NewApplication::new("My App", "https://example.com/callback").with_scopes("read")
    }

    #[tokio::test]
    async fn test_create_generates_credentials() {
        let registry = registry();
        let app = registry.create(new_application()).await.unwrap();

        assert_eq!(app.uid.len(), 43);
        assert_eq!(app.secret.len(), 43);
        assert_ne!(app.uid, app.secret);
        assert_eq!(app.scopes().unwrap().to_string(), "read");
        assert_eq!(registry.find(&app.id).await.unwrap(), Some(app));
    }

    #[tokio::test]
    async fn test_supplied_credentials_are_kept() {
        let registry = registry();
        let app = registry
            .create(new_application().with_uid("fixed-uid").with_secret("s3cret"))
            .await
            .unwrap();
        assert_eq!(app.uid, "fixed-uid");
        assert_eq!(app.secret, "s3cret");

        let rejected = registry
            .create(new_application().with_uid("").with_secret(""))
            .await
            .unwrap_err();
        let errors = rejected.validation_errors().unwrap();
        assert_eq!(errors.on(Field::Uid), vec![&Reason::Blank]);
        assert_eq!(errors.on(Field::Secret), vec![&Reason::Blank]);
    }

    #[tokio::test]
    async fn test_create_reports_every_failure_and_persists_nothing() {
        let registry = registry();
        registry
            .create(new_application().with_uid("taken"))
            .await
            .unwrap();

        let result = registry
            .create(NewApplication::new("", "http://example.com/cb").with_uid("taken"))
            .await;
        let errors = result.unwrap_err();
        let errors = errors.validation_errors().unwrap();
        assert!(errors.contains(Field::Name));
        assert_eq!(errors.on(Field::Uid), vec![&Reason::Taken]);
        assert!(errors.contains(Field::RedirectUri));
        assert_eq!(registry.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scope_policy_is_injected() {
        let required = registry().with_scope_policy(ConfiguredScopePolicy::new(true));
        let errors = required
            .create(NewApplication::new("App", "https://example.com/cb"))
            .await
            .unwrap_err();
        assert_eq!(
            errors.validation_errors().unwrap().on(Field::Scopes),
            vec![&Reason::Blank]
        );

        let by_name = registry()
            .with_scope_policy(|attributes: &ApplicationAttributes| attributes.name == "Strict");
        assert!(
            by_name
                .create(NewApplication::new("Lenient", "https://example.com/cb"))
                .await
                .is_ok()
        );
        assert!(
            by_name
                .create(NewApplication::new("Strict", "https://example.com/cb"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_by_uid_coerces_to_string() {
        let registry = registry();
        let app = registry
            .create(new_application().with_uid("123").with_secret("abc"))
            .await
            .unwrap();

        let found = registry.by_uid(123).await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(app.id.clone()));
        let found = registry.by_uid("123").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(app.id.clone()));
        assert!(registry.by_uid("12").await.unwrap().is_none());

        assert!(registry.by_uid_and_secret(123, "abc").await.unwrap().is_some());
        assert!(registry.by_uid_and_secret("123", "abd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_revalidates() {
        let registry = registry();
        let first = registry.create(new_application().with_uid("first")).await.unwrap();
        let second = registry.create(new_application().with_uid("second")).await.unwrap();

        // Keeping its own uid is not a collision
        let renamed = registry
            .update(
                &first.id,
                ApplicationUpdate {
                    name: Some("Renamed".to_string()),
                    uid: Some("first".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Renamed");
        assert_eq!(renamed.secret, first.secret);

        let taken = registry
            .update(
                &second.id,
                ApplicationUpdate {
                    uid: Some("first".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            taken.validation_errors().unwrap().on(Field::Uid),
            vec![&Reason::Taken]
        );

        assert!(matches!(
            registry.update("missing", ApplicationUpdate::default()).await,
            Err(RegistryError::ApplicationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_destroy_cascades() {
        let registry = registry();
        let app = registry.create(new_application()).await.unwrap();

        let grant = AccessGrant::new(
            &app,
            "owner",
            "https://example.com/callback",
            Scopes::from_string("read"),
            Duration::minutes(10),
        );
        let token = AccessToken::new(&app, None, Scopes::from_string("read"), None, false);
        registry.store_access_grant(&grant).await.unwrap();
        registry.store_access_token(&token).await.unwrap();
        assert_eq!(registry.access_grants(&app).await.unwrap().len(), 1);
        assert_eq!(registry.access_tokens(&app).await.unwrap().len(), 1);

        registry.destroy(&app.id).await.unwrap();

        assert!(registry.find(&app.id).await.unwrap().is_none());
        assert!(registry.access_grants(&app).await.unwrap().is_empty());
        assert!(registry.access_tokens(&app).await.unwrap().is_empty());
        assert!(matches!(
            registry.destroy(&app.id).await,
            Err(RegistryError::ApplicationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_scope_not_permitted() {
        let registry = registry();
        let app = registry.create(new_application()).await.unwrap();

        let token = AccessToken::new(&app, None, Scopes::from_string("admin"), None, false);
        assert!(matches!(
            registry.store_access_token(&token).await,
            Err(RegistryError::ScopeNotPermitted(_))
        ));
    }

    #[tokio::test]
    async fn test_scope_bound_comes_from_owning_application() {
        let registry = registry();
        let broad = registry
            .create(new_application().with_scopes("read admin"))
            .await
            .unwrap();
        let narrow = registry.create(new_application()).await.unwrap();

        let token = AccessToken::new(&narrow, None, Scopes::from_string("admin"), None, false);
        assert!(broad.permits(&token.scopes).unwrap());
        assert!(matches!(
            registry.store_access_token(&token).await,
            Err(RegistryError::ScopeNotPermitted(_))
        ));
        let grant = AccessGrant::new(
            &narrow,
            "owner",
            "https://example.com/callback",
            Scopes::from_string("admin"),
            Duration::minutes(10),
        );
        assert!(matches!(
            registry.store_access_grant(&grant).await,
            Err(RegistryError::ScopeNotPermitted(_))
        ));
        assert!(registry.access_tokens(&narrow).await.unwrap().is_empty());
        assert!(registry.access_grants(&narrow).await.unwrap().is_empty());

        // A copy taken before the scopes were narrowed grants nothing extra
        let stale = broad.clone();
        registry
            .update(
                &broad.id,
                ApplicationUpdate {
                    scopes: Some(Scopes::from_string("read")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let token = AccessToken::new(&stale, None, Scopes::from_string("admin"), None, false);
        assert!(matches!(
            registry.store_access_token(&token).await,
            Err(RegistryError::ScopeNotPermitted(_))
        ));
        assert!(registry.access_tokens(&broad).await.unwrap().is_empty());

        let mut orphan = AccessToken::new(&narrow, None, Scopes::from_string("read"), None, false);
        orphan.application_id = "missing".to_string();
        assert!(matches!(
            registry.store_access_token(&orphan).await,
            Err(RegistryError::ApplicationNotFound(_))
        ));
    }

    /// Storage that lets every uid through the pre-check and then rejects the write,
    /// as when another writer takes the uid in between
    struct RacedUidStorage(MemoryRegistryStorage);

    #[async_trait::async_trait]
    impl ApplicationStore for RacedUidStorage {
        fn supports_scopes(&self) -> bool {
            self.0.supports_scopes()
        }

        async fn insert_application(
            &self,
            attributes: &ApplicationAttributes,
            _created_at: chrono::DateTime<Utc>,
        ) -> Result<Application, StorageError> {
            Err(StorageError::UniqueViolation(format!(
                "applications.uid: {}",
                attributes.uid
            )))
        }

        async fn get_application(&self, id: &str) -> Result<Option<Application>, StorageError> {
            self.0.get_application(id).await
        }

        async fn find_application_by_uid(
            &self,
            _uid: &str,
        ) -> Result<Option<Application>, StorageError> {
            Ok(None)
        }

        async fn find_application_by_uid_and_secret(
            &self,
            uid: &str,
            secret: &str,
        ) -> Result<Option<Application>, StorageError> {
            self.0.find_application_by_uid_and_secret(uid, secret).await
        }

        async fn update_application(
            &self,
            id: &str,
            attributes: &ApplicationAttributes,
            updated_at: chrono::DateTime<Utc>,
        ) -> Result<Application, StorageError> {
            self.0.update_application(id, attributes, updated_at).await
        }

        async fn delete_application(&self, id: &str) -> Result<(), StorageError> {
            self.0.delete_application(id).await
        }

        async fn list_applications(
            &self,
            limit: Option<usize>,
        ) -> Result<Vec<Application>, StorageError> {
            self.0.list_applications(limit).await
        }
    }

    #[async_trait::async_trait]
    impl AccessGrantStore for RacedUidStorage {
        async fn store_grant(&self, grant: &AccessGrant) -> Result<(), StorageError> {
            self.0.store_grant(grant).await
        }

        async fn get_grant(&self, token: &str) -> Result<Option<AccessGrant>, StorageError> {
            self.0.get_grant(token).await
        }

        async fn get_application_grants(
            &self,
            application_id: &str,
        ) -> Result<Vec<AccessGrant>, StorageError> {
            self.0.get_application_grants(application_id).await
        }
    }

    #[async_trait::async_trait]
    impl AccessTokenStore for RacedUidStorage {
        async fn store_token(&self, token: &AccessToken) -> Result<(), StorageError> {
            self.0.store_token(token).await
        }

        async fn get_token(&self, token: &str) -> Result<Option<AccessToken>, StorageError> {
            self.0.get_token(token).await
        }

        async fn get_application_tokens(
            &self,
            application_id: &str,
        ) -> Result<Vec<AccessToken>, StorageError> {
            self.0.get_application_tokens(application_id).await
        }
    }

    #[tokio::test]
    async fn test_unique_violation_on_write_reports_uid_taken() {
        let storage = Arc::new(RacedUidStorage(MemoryRegistryStorage::new()));
        let registry = ApplicationRegistry::new(storage, &Config::default());

        let error = registry
            .create(new_application().with_uid("contested"))
            .await
            .unwrap_err();
        let errors = error.validation_errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.on(Field::Uid), vec![&Reason::Taken]);
        assert!(registry.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schema_without_scopes() {
        let storage = Arc::new(MemoryRegistryStorage::without_scopes());
        let registry = ApplicationRegistry::new(storage, &Config::default())
            .with_scope_policy(ConfiguredScopePolicy::new(true));

        // The scope rule cannot apply to a schema without the column
        let app = registry
            .create(NewApplication::new("App", "https://example.com/cb"))
            .await
            .unwrap();
        assert!(matches!(app.scopes(), Err(RegistryError::MissingScopesColumn)));

        assert!(matches!(
            registry.create(new_application()).await,
            Err(RegistryError::MissingScopesColumn)
        ));
        assert!(matches!(
            registry
                .update(
                    &app.id,
                    ApplicationUpdate {
                        scopes: Some(Scopes::from_string("read")),
                        ..Default::default()
                    }
                )
                .await,
            Err(RegistryError::MissingScopesColumn)
        ));
    }
}
