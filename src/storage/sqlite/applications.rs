//! SQLite implementation for application storage

use crate::errors::StorageError;
use crate::registry::scopes::Scopes;
use crate::registry::types::*;
use crate::storage::map_write_error;
use crate::storage::traits::{ApplicationStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use uuid::Uuid;

/// SQLite implementation of application storage
pub struct SqliteApplicationStore {
    pool: SqlitePool,
    supports_scopes: bool,
}

impl SqliteApplicationStore {
    /// Create a new SQLite application store
    pub fn new(pool: SqlitePool, supports_scopes: bool) -> Self {
        Self {
            pool,
            supports_scopes,
        }
    }

    /// Parse an RFC 3339 timestamp column
    pub(crate) fn parse_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
        let value: String = row.try_get(column).map_err(|e| {
            StorageError::DatabaseError(format!("Failed to get {}: {}", column, e))
        })?;
        Ok(DateTime::parse_from_rfc3339(&value)
            .map_err(|e| StorageError::InvalidData(format!("Invalid {} timestamp: {}", column, e)))?
            .with_timezone(&Utc))
    }

    /// Read a JSON encoded scope list column
    pub(crate) fn parse_scopes(row: &SqliteRow, column: &str) -> Result<Scopes> {
        let value: String = row.try_get(column).map_err(|e| {
            StorageError::DatabaseError(format!("Failed to get {}: {}", column, e))
        })?;
        serde_json::from_str(&value).map_err(|e| StorageError::SerializationFailed(e.to_string()))
    }

    pub(crate) fn serialize_scopes(scopes: &Scopes) -> Result<String> {
        serde_json::to_string(scopes).map_err(|e| StorageError::SerializationFailed(e.to_string()))
    }

    /// Convert SQLite row to Application
    fn row_to_application(&self, row: &SqliteRow) -> Result<Application> {
        let get = |column: &str| -> Result<String> {
            row.try_get(column).map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get {}: {}", column, e))
            })
        };

        let scopes = if self.supports_scopes {
            Self::parse_scopes(row, "scopes")?
        } else {
            Scopes::new()
        };

        let attributes = ApplicationAttributes {
            name: get("name")?,
            uid: get("uid")?,
            secret: get("secret")?,
            redirect_uri: get("redirect_uri")?,
            scopes,
        };

        Ok(Application::from_attributes(
            get("id")?,
            attributes,
            self.supports_scopes,
            Self::parse_timestamp(row, "created_at")?,
            Self::parse_timestamp(row, "updated_at")?,
        ))
    }

    fn check_scopes_writable(&self, attributes: &ApplicationAttributes) -> Result<()> {
        if !self.supports_scopes && !attributes.scopes.is_empty() {
            return Err(StorageError::MissingColumn(
                "oauth_applications.scopes".to_string(),
            ));
        }
        Ok(())
    }

    async fn fetch_one(&self, sql: &str, binds: &[&str]) -> Result<Option<Application>> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(*value);
        }

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.map(|row| self.row_to_application(&row)).transpose()
    }
}

#[async_trait]
impl ApplicationStore for SqliteApplicationStore {
    fn supports_scopes(&self) -> bool {
        self.supports_scopes
    }

    async fn insert_application(
        &self,
        attributes: &ApplicationAttributes,
        created_at: DateTime<Utc>,
    ) -> Result<Application> {
        self.check_scopes_writable(attributes)?;

        let id = Uuid::new_v4().to_string();
        let created_at_str = created_at.to_rfc3339();

        let query = if self.supports_scopes {
            sqlx::query(
                r#"
                INSERT INTO oauth_applications (
                    id, name, uid, secret, redirect_uri, created_at, updated_at, scopes
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
        } else {
            sqlx::query(
                r#"
                INSERT INTO oauth_applications (
                    id, name, uid, secret, redirect_uri, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
        };

        let mut query = query
            .bind(&id)
            .bind(&attributes.name)
            .bind(&attributes.uid)
            .bind(&attributes.secret)
            .bind(&attributes.redirect_uri)
            .bind(&created_at_str)
            .bind(&created_at_str);
        if self.supports_scopes {
            query = query.bind(Self::serialize_scopes(&attributes.scopes)?);
        }

        query.execute(&self.pool).await.map_err(map_write_error)?;

        Ok(Application::from_attributes(
            id,
            attributes.clone(),
            self.supports_scopes,
            created_at,
            created_at,
        ))
    }

    async fn get_application(&self, id: &str) -> Result<Option<Application>> {
        self.fetch_one("SELECT * FROM oauth_applications WHERE id = ?", &[id])
            .await
    }

    async fn find_application_by_uid(&self, uid: &str) -> Result<Option<Application>> {
        self.fetch_one(
            "SELECT * FROM oauth_applications WHERE uid = ? LIMIT 1",
            &[uid],
        )
        .await
    }

    async fn find_application_by_uid_and_secret(
        &self,
        uid: &str,
        secret: &str,
    ) -> Result<Option<Application>> {
        self.fetch_one(
            "SELECT * FROM oauth_applications WHERE uid = ? AND secret = ? LIMIT 1",
            &[uid, secret],
        )
        .await
    }

    async fn update_application(
        &self,
        id: &str,
        attributes: &ApplicationAttributes,
        updated_at: DateTime<Utc>,
    ) -> Result<Application> {
        self.check_scopes_writable(attributes)?;

        let query = if self.supports_scopes {
            sqlx::query(
                r#"
                UPDATE oauth_applications SET
                    name = ?, uid = ?, secret = ?, redirect_uri = ?, updated_at = ?, scopes = ?
                WHERE id = ?
                "#,
            )
        } else {
            sqlx::query(
                r#"
                UPDATE oauth_applications SET
                    name = ?, uid = ?, secret = ?, redirect_uri = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
        };

        let mut query = query
            .bind(&attributes.name)
            .bind(&attributes.uid)
            .bind(&attributes.secret)
            .bind(&attributes.redirect_uri)
            .bind(updated_at.to_rfc3339());
        if self.supports_scopes {
            query = query.bind(Self::serialize_scopes(&attributes.scopes)?);
        }

        let result = query
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "Application not found: {}",
                id
            )));
        }

        self.get_application(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("Application not found: {}", id)))
    }

    async fn delete_application(&self, id: &str) -> Result<()> {
        // Grants and tokens go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM oauth_applications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "Application not found: {}",
                id
            )));
        }

        Ok(())
    }

    async fn list_applications(&self, limit: Option<usize>) -> Result<Vec<Application>> {
        let rows = sqlx::query("SELECT * FROM oauth_applications ORDER BY created_at DESC LIMIT ?")
            .bind(limit.map(|l| l as i64).unwrap_or(-1))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        rows.iter().map(|row| self.row_to_application(row)).collect()
    }
}
