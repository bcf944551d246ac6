//! Client application records and the grant/token records they own.

use crate::errors::RegistryError;
use crate::registry::scopes::Scopes;
use crate::registry::token::generate_token;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered OAuth client application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Storage-assigned identifier
    pub id: String,
    /// Human readable application name
    pub name: String,
    /// Public client identifier, unique across all applications
    pub uid: String,
    /// Client credential
    pub secret: String,
    /// One or more whitespace-separated callback URIs
    pub redirect_uri: String,
    /// `None` when the storage schema has no scopes column
    #[serde(rename = "scopes")]
    valid_scopes: Option<Scopes>,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Build a persisted record from validated attributes.
    ///
    /// Storage backends pass `supports_scopes = false` when their schema has no
    /// scopes column; the attribute scopes are then dropped and every scope read
    /// on the record reports [`RegistryError::MissingScopesColumn`].
    pub fn from_attributes(
        id: String,
        attributes: ApplicationAttributes,
        supports_scopes: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: attributes.name,
            uid: attributes.uid,
            secret: attributes.secret,
            redirect_uri: attributes.redirect_uri,
            valid_scopes: supports_scopes.then_some(attributes.scopes),
            created_at,
            updated_at,
        }
    }

    /// Whether the backing schema stores scopes for this record
    pub fn supports_scopes(&self) -> bool {
        self.valid_scopes.is_some()
    }

    /// The scopes this application may request.
    ///
    /// Fails with [`RegistryError::MissingScopesColumn`] instead of returning an
    /// empty set when the schema cannot hold scopes.
    pub fn scopes(&self) -> Result<&Scopes, RegistryError> {
        match &self.valid_scopes {
            Some(scopes) => Ok(scopes),
            None => {
                tracing::warn!(uid = %self.uid, "scopes read on a schema without a scopes column");
                Err(RegistryError::MissingScopesColumn)
            }
        }
    }

    /// Alias of [`Application::scopes`]
    pub fn valid_scopes(&self) -> Result<&Scopes, RegistryError> {
        self.scopes()
    }

    /// Scopes in their space-delimited wire form
    pub fn scopes_string(&self) -> Result<String, RegistryError> {
        Ok(self.scopes()?.to_string())
    }

    /// Whether any of the given scopes is configured on the application
    pub fn includes_scope(&self, required: &[&str]) -> Result<bool, RegistryError> {
        let scopes = self.scopes()?;
        Ok(required.iter().any(|scope| scopes.exists(scope)))
    }

    /// Whether a grant or token carrying `requested` may be issued for this application.
    ///
    /// An application without configured scopes places no application-level bound.
    pub fn permits(&self, requested: &Scopes) -> Result<bool, RegistryError> {
        let scopes = self.scopes()?;
        Ok(scopes.is_empty() || scopes.has_scopes(requested))
    }

    /// The mutable attributes of this record
    pub(crate) fn attributes(&self) -> ApplicationAttributes {
        ApplicationAttributes {
            name: self.name.clone(),
            uid: self.uid.clone(),
            secret: self.secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scopes: self.valid_scopes.clone().unwrap_or_default(),
        }
    }
}

/// Fully populated attributes of an application, validated before any write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationAttributes {
    pub name: String,
    pub uid: String,
    pub secret: String,
    pub redirect_uri: String,
    pub scopes: Scopes,
}

/// Insertion request for a new application
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewApplication {
    /// Application name
    pub name: String,
    /// Redirect URIs, whitespace separated
    pub redirect_uri: String,
    /// Scopes the application may request
    pub scopes: Option<Scopes>,
    /// Client secret, generated when absent
    pub secret: Option<String>,
    /// Client identifier, generated when absent
    pub uid: Option<String>,
}

impl NewApplication {
    pub fn new(name: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            redirect_uri: redirect_uri.into(),
            ..Default::default()
        }
    }

    pub fn with_scopes(mut self, scopes: impl Into<Scopes>) -> Self {
        self.scopes = Some(scopes.into());
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Fill in any credential the caller left out.
    ///
    /// Only absent values are generated; a supplied value, even an empty one,
    /// is kept as is and left for validation to judge.
    pub fn generate_credentials(&mut self) {
        self.uid.get_or_insert_with(generate_token);
        self.secret.get_or_insert_with(generate_token);
    }

    pub(crate) fn into_attributes(self) -> ApplicationAttributes {
        ApplicationAttributes {
            name: self.name,
            uid: self.uid.unwrap_or_default(),
            secret: self.secret.unwrap_or_default(),
            redirect_uri: self.redirect_uri,
            scopes: self.scopes.unwrap_or_default(),
        }
    }
}

/// Partial update of an existing application
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationUpdate {
    pub name: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<Scopes>,
    pub uid: Option<String>,
    pub secret: Option<String>,
}

impl ApplicationUpdate {
    pub(crate) fn apply(self, attributes: &mut ApplicationAttributes) {
        if let Some(name) = self.name {
            attributes.name = name;
        }
        if let Some(redirect_uri) = self.redirect_uri {
            attributes.redirect_uri = redirect_uri;
        }
        if let Some(scopes) = self.scopes {
            attributes.scopes = scopes;
        }
        if let Some(uid) = self.uid {
            attributes.uid = uid;
        }
        if let Some(secret) = self.secret {
            attributes.secret = secret;
        }
    }
}

/// Authorization code issued on behalf of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub id: String,
    /// Owning application
    pub application_id: String,
    /// User that authorized the grant
    pub resource_owner_id: String,
    /// The authorization code
    pub token: String,
    /// Redirect URI used in the authorization request
    pub redirect_uri: String,
    /// Granted scopes
    pub scopes: Scopes,
    /// Lifetime in seconds
    pub expires_in: i64,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessGrant {
    pub fn new(
        application: &Application,
        resource_owner_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Scopes,
        expires_in: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            application_id: application.id.clone(),
            resource_owner_id: resource_owner_id.into(),
            token: generate_token(),
            redirect_uri: redirect_uri.into(),
            scopes,
            expires_in: expires_in.num_seconds(),
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at + Duration::seconds(self.expires_in) < Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Bearer token issued on behalf of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: String,
    /// Owning application
    pub application_id: String,
    /// User the token acts for (absent for client credentials)
    pub resource_owner_id: Option<String>,
    /// The access token
    pub token: String,
    pub refresh_token: Option<String>,
    /// Granted scopes
    pub scopes: Scopes,
    /// Lifetime in seconds, `None` for non-expiring tokens
    pub expires_in: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(
        application: &Application,
        resource_owner_id: Option<String>,
        scopes: Scopes,
        expires_in: Option<Duration>,
        use_refresh_token: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            application_id: application.id.clone(),
            resource_owner_id,
            token: generate_token(),
            refresh_token: use_refresh_token.then(generate_token),
            scopes,
            expires_in: expires_in.map(|d| d.num_seconds()),
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_in
            .is_some_and(|seconds| self.created_at + Duration::seconds(seconds) < Utc::now())
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}
