//! Standardized error types following the `error-registry-<domain>-<number>` format.

use crate::registry::validation::ValidationErrors;
use thiserror::Error;

/// Configuration errors that occur during startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-registry-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when boolean string cannot be parsed
    #[error(
        "error-registry-config-2 Failed to parse boolean '{0}': expected true/false/1/0/yes/no/on/off"
    )]
    BoolParsingFailed(String),

    /// Error when the configured native redirect URI is itself malformed
    #[error("error-registry-config-3 Invalid native redirect URI '{0}': {1}")]
    NativeRedirectUriInvalid(String, String),
}

/// Errors surfaced by the application registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// One or more validation rules failed; nothing was persisted
    #[error("error-registry-application-1 Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The storage schema has no scopes field, so scopes cannot be honored
    #[error(
        "error-registry-application-2 Storage schema is missing required field `scopes` on applications"
    )]
    MissingScopesColumn,

    /// No application exists with the given id
    #[error("error-registry-application-3 Application not found: {0}")]
    ApplicationNotFound(String),

    /// A grant or token asked for scopes the application does not allow
    #[error("error-registry-application-4 Scopes not permitted for application: {0}")]
    ScopeNotPermitted(String),

    /// The storage backend failed
    #[error("error-registry-application-5 Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl RegistryError {
    /// Returns the validation failures when this is a validation error
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            RegistryError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for RegistryError {
    fn from(errors: ValidationErrors) -> Self {
        RegistryError::Validation(errors)
    }
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when database connection fails
    #[error("error-registry-storage-1 Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when data serialization fails
    #[error("error-registry-storage-2 Data serialization failed: {0}")]
    SerializationFailed(String),

    /// Error when database operation fails
    #[error("error-registry-storage-3 Database error: {0}")]
    DatabaseError(String),

    /// Error when data validation fails
    #[error("error-registry-storage-4 Invalid data: {0}")]
    InvalidData(String),

    /// Error when requested resource is not found
    #[error("error-registry-storage-5 Not found: {0}")]
    NotFound(String),

    /// Error when a unique constraint rejects a write
    #[error("error-registry-storage-6 Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Error when a write references a column the schema does not have
    #[error("error-registry-storage-7 Missing column: {0}")]
    MissingColumn(String),
}
