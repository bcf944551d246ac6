//! Environment-based configuration types for the application registry.

use anyhow::Result;

use crate::errors::ConfigError;
use crate::registry::redirect_uri::{DEFAULT_NATIVE_REDIRECT_URI, UriRedirectValidator};
use crate::registry::validation::ConfiguredScopePolicy;
use crate::storage::{StorageBackend, parse_storage_backend};

/// Whether every application must carry at least one scope
#[derive(Clone, Debug)]
pub struct ScopeRequired(bool);

/// Whether redirect URIs must use a secure scheme
#[derive(Clone, Debug)]
pub struct ForceSslInRedirectUri(bool);

/// Out-of-band redirect URI accepted for native clients, `None` when disabled
#[derive(Clone, Debug)]
pub struct NativeRedirectUri(Option<String>);

/// Main registry configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub storage_backend: String,
    pub database_url: Option<String>,
    pub scope_required: ScopeRequired,
    pub force_ssl_in_redirect_uri: ForceSslInRedirectUri,
    pub native_redirect_uri: NativeRedirectUri,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let storage_backend = default_env("STORAGE_BACKEND", "memory");
        let database_url = if storage_backend == "postgres" {
            Some(require_env("DATABASE_URL")?)
        } else {
            optional_env("DATABASE_URL").filter(|value| !value.is_empty())
        };
        let scope_required: ScopeRequired = default_env("SCOPE_REQUIRED", "false").try_into()?;
        let force_ssl_in_redirect_uri: ForceSslInRedirectUri =
            default_env("FORCE_SSL_IN_REDIRECT_URI", "true").try_into()?;
        let native_redirect_uri: NativeRedirectUri =
            default_env("NATIVE_REDIRECT_URI", DEFAULT_NATIVE_REDIRECT_URI).try_into()?;

        Ok(Self {
            storage_backend,
            database_url,
            scope_required,
            force_ssl_in_redirect_uri,
            native_redirect_uri,
        })
    }

    /// Resolve the configured storage backend
    pub fn backend(&self) -> Result<StorageBackend> {
        Ok(parse_storage_backend(
            &self.storage_backend,
            self.database_url.as_deref(),
        )?)
    }

    /// The redirect URI validator these settings describe
    pub fn redirect_uri_validator(&self) -> UriRedirectValidator {
        UriRedirectValidator::new(
            *self.force_ssl_in_redirect_uri.as_ref(),
            self.native_redirect_uri.as_ref().clone(),
        )
    }

    /// The scope-required policy these settings describe
    pub fn scope_policy(&self) -> ConfiguredScopePolicy {
        ConfiguredScopePolicy::new(*self.scope_required.as_ref())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: "memory".to_string(),
            database_url: None,
            scope_required: ScopeRequired(false),
            force_ssl_in_redirect_uri: ForceSslInRedirectUri(true),
            native_redirect_uri: NativeRedirectUri(Some(DEFAULT_NATIVE_REDIRECT_URI.to_string())),
        }
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

fn parse_bool(value: String) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::BoolParsingFailed(value)),
    }
}

impl TryFrom<String> for ScopeRequired {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(parse_bool(value)?))
    }
}

impl AsRef<bool> for ScopeRequired {
    fn as_ref(&self) -> &bool {
        &self.0
    }
}

impl TryFrom<String> for ForceSslInRedirectUri {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(parse_bool(value)?))
    }
}

impl AsRef<bool> for ForceSslInRedirectUri {
    fn as_ref(&self) -> &bool {
        &self.0
    }
}

impl TryFrom<String> for NativeRedirectUri {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Self(None));
        }

        url::Url::parse(value).map_err(|e| {
            ConfigError::NativeRedirectUriInvalid(value.to_string(), e.to_string())
        })?;
        Ok(Self(Some(value.to_string())))
    }
}

impl AsRef<Option<String>> for NativeRedirectUri {
    fn as_ref(&self) -> &Option<String> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_settings() {
        for value in ["true", "1", "YES", "on"] {
            let parsed: ScopeRequired = value.to_string().try_into().unwrap();
            assert!(*parsed.as_ref());
        }
        for value in ["false", "0", "no", "Off"] {
            let parsed: ForceSslInRedirectUri = value.to_string().try_into().unwrap();
            assert!(!*parsed.as_ref());
        }

        let error = ScopeRequired::try_from("maybe".to_string()).unwrap_err();
        assert!(error.to_string().starts_with("error-registry-config-2"));
    }

    #[test]
    fn test_native_redirect_uri() {
        let default: NativeRedirectUri =
            DEFAULT_NATIVE_REDIRECT_URI.to_string().try_into().unwrap();
        assert_eq!(default.as_ref().as_deref(), Some(DEFAULT_NATIVE_REDIRECT_URI));

        let disabled: NativeRedirectUri = String::new().try_into().unwrap();
        assert!(disabled.as_ref().is_none());

        assert!(NativeRedirectUri::try_from("not a uri".to_string()).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend().unwrap(), StorageBackend::Memory);
        assert!(!*config.scope_required.as_ref());
        assert!(*config.force_ssl_in_redirect_uri.as_ref());
    }
}
