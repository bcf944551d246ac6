//! Trait-based storage abstractions with in-memory, SQLite, and PostgreSQL backends.

pub mod inmemory;
pub mod traits;

// Feature-gated storage implementations
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export commonly used types and traits
pub use inmemory::MemoryRegistryStorage;
pub use traits::*;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRegistryStorage;

#[cfg(feature = "postgres")]
pub use postgres::PostgresRegistryStorage;

use crate::errors::StorageError;
use std::sync::Arc;

/// Storage backend configuration and factory
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite(String), // Connection string/path
    #[cfg(feature = "postgres")]
    Postgres(String), // Connection string
}

/// Create a storage backend based on configuration.
///
/// SQL backends are migrated before the schema is probed for optional columns.
pub async fn create_storage_backend(
    backend: StorageBackend,
) -> std::result::Result<Arc<dyn RegistryStorage>, StorageError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryRegistryStorage::new())),
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite(database_url) => {
            let options = database_url
                .parse::<sqlx::sqlite::SqliteConnectOptions>()
                .map_err(|e| StorageError::ConnectionFailed(format!("Invalid SQLite URL: {}", e)))?
                .create_if_missing(true)
                .foreign_keys(true);
            let pool = sqlx::SqlitePool::connect_with(options)
                .await
                .map_err(|e| {
                    StorageError::ConnectionFailed(format!("SQLite connection failed: {}", e))
                })?;

            // Run migrations
            sqlite::migrate(&pool).await?;

            Ok(Arc::new(sqlite::SqliteRegistryStorage::open(pool).await?))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres(database_url) => {
            let pool = sqlx::postgres::PgPool::connect(&database_url)
                .await
                .map_err(|e| {
                    StorageError::ConnectionFailed(format!("PostgreSQL connection failed: {}", e))
                })?;

            // Run migrations
            postgres::migrate(&pool).await?;

            Ok(Arc::new(postgres::PostgresRegistryStorage::open(pool).await?))
        }
    }
}

/// Parse storage backend from configuration string
pub fn parse_storage_backend(
    backend_name: &str,
    database_url: Option<&str>,
) -> std::result::Result<StorageBackend, StorageError> {
    match backend_name {
        "memory" => Ok(StorageBackend::Memory),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let url = database_url.unwrap_or("sqlite:registry.db");
            Ok(StorageBackend::Sqlite(url.to_string()))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = database_url.ok_or_else(|| {
                StorageError::InvalidData("DATABASE_URL required for postgres backend".to_string())
            })?;
            Ok(StorageBackend::Postgres(url.to_string()))
        }
        _ => Err(StorageError::InvalidData(format!(
            "Unknown storage backend: {}",
            backend_name
        ))),
    }
}

/// Map a failed SQL write, surfacing unique constraint hits distinctly
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn map_write_error(e: sqlx::Error) -> StorageError {
    match e.as_database_error() {
        Some(db_error) if db_error.is_unique_violation() => {
            StorageError::UniqueViolation(db_error.message().to_string())
        }
        _ => StorageError::DatabaseError(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage_backend() {
        assert_eq!(
            parse_storage_backend("memory", None).unwrap(),
            StorageBackend::Memory
        );
        assert!(matches!(
            parse_storage_backend("redis", None),
            Err(StorageError::InvalidData(_))
        ));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_parse_sqlite_backend_defaults_url() {
        assert_eq!(
            parse_storage_backend("sqlite", None).unwrap(),
            StorageBackend::Sqlite("sqlite:registry.db".to_string())
        );
        assert_eq!(
            parse_storage_backend("sqlite", Some("sqlite::memory:")).unwrap(),
            StorageBackend::Sqlite("sqlite::memory:".to_string())
        );
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_parse_postgres_backend_requires_url() {
        assert!(parse_storage_backend("postgres", None).is_err());
    }

    #[tokio::test]
    async fn test_create_memory_backend() {
        let storage = create_storage_backend(StorageBackend::Memory).await.unwrap();
        assert!(storage.supports_scopes());
        assert!(storage.list_applications(None).await.unwrap().is_empty());
    }
}
