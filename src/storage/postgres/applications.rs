//! PostgreSQL implementation for application storage

use crate::errors::StorageError;
use crate::registry::scopes::Scopes;
use crate::registry::types::*;
use crate::storage::map_write_error;
use crate::storage::traits::{ApplicationStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use uuid::Uuid;

/// PostgreSQL implementation of application storage
pub struct PostgresApplicationStore {
    pool: PgPool,
    supports_scopes: bool,
}

impl PostgresApplicationStore {
    /// Create a new PostgreSQL application store
    pub fn new(pool: PgPool, supports_scopes: bool) -> Self {
        Self {
            pool,
            supports_scopes,
        }
    }

    /// Read a JSONB scope list column
    pub(crate) fn parse_scopes(row: &PgRow, column: &str) -> Result<Scopes> {
        let scopes: Json<Scopes> = row.try_get(column).map_err(|e| {
            StorageError::DatabaseError(format!("Failed to get {}: {}", column, e))
        })?;
        Ok(scopes.0)
    }

    /// Convert PostgreSQL row to Application
    fn row_to_application(&self, row: &PgRow) -> Result<Application> {
        let get = |column: &str| -> Result<String> {
            row.try_get(column).map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get {}: {}", column, e))
            })
        };
        let get_timestamp = |column: &str| -> Result<DateTime<Utc>> {
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
            get_timestamp("created_at")?,
            get_timestamp("updated_at")?,
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
impl ApplicationStore for PostgresApplicationStore {
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

        let query = if self.supports_scopes {
            sqlx::query(
                r#"
                INSERT INTO oauth_applications (
                    id, name, uid, secret, redirect_uri, created_at, updated_at, scopes
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
        } else {
            sqlx::query(
                r#"
                INSERT INTO oauth_applications (
                    id, name, uid, secret, redirect_uri, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
        };

        let mut query = query
            .bind(&id)
            .bind(&attributes.name)
            .bind(&attributes.uid)
            .bind(&attributes.secret)
            .bind(&attributes.redirect_uri)
            .bind(created_at)
            .bind(created_at);
        if self.supports_scopes {
            query = query.bind(Json(attributes.scopes.clone()));
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
        self.fetch_one("SELECT * FROM oauth_applications WHERE id = $1", &[id])
            .await
    }

    async fn find_application_by_uid(&self, uid: &str) -> Result<Option<Application>> {
        self.fetch_one(
            "SELECT * FROM oauth_applications WHERE uid = $1 LIMIT 1",
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
            "SELECT * FROM oauth_applications WHERE uid = $1 AND secret = $2 LIMIT 1",
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
                    name = $1, uid = $2, secret = $3, redirect_uri = $4, updated_at = $5, scopes = $7
                WHERE id = $6
                "#,
            )
        } else {
            sqlx::query(
                r#"
                UPDATE oauth_applications SET
                    name = $1, uid = $2, secret = $3, redirect_uri = $4, updated_at = $5
                WHERE id = $6
                "#,
            )
        };

        let mut query = query
            .bind(&attributes.name)
            .bind(&attributes.uid)
            .bind(&attributes.secret)
            .bind(&attributes.redirect_uri)
            .bind(updated_at)
            .bind(id);
        if self.supports_scopes {
            query = query.bind(Json(attributes.scopes.clone()));
        }

        let result = query.execute(&self.pool).await.map_err(map_write_error)?;

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
        let result = sqlx::query("DELETE FROM oauth_applications WHERE id = $1")
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
        let rows = sqlx::query(
            "SELECT * FROM oauth_applications ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        rows.iter().map(|row| self.row_to_application(row)).collect()
    }
}
