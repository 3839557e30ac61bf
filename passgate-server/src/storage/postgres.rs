//! PostgreSQL storage for WebAuthn credentials

use async_trait::async_trait;
use passgate_core::{CredentialRecord, CredentialStore, StoreError};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// PostgreSQL-backed credential storage
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    /// Connect with a bounded pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(format!("migration failed: {e}")))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn save(&self, record: CredentialRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO passgate_credentials
                (user_id, name, display_name, credential_id, public_key, counter)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                name = EXCLUDED.name,
                display_name = EXCLUDED.display_name,
                credential_id = EXCLUDED.credential_id,
                public_key = EXCLUDED.public_key,
                counter = EXCLUDED.counter,
                last_used_at = NULL
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.display_name)
        .bind(&record.credential_id)
        .bind(&record.public_key)
        .bind(i64::from(record.counter))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        tracing::info!(credential_id = %record.credential_id, "Credential stored in database");
        Ok(())
    }

    async fn load(&self, id: &[u8]) -> Result<CredentialRecord, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT user_id, name, display_name, credential_id, public_key, counter
            FROM passgate_credentials
            WHERE user_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        row.ok_or(StoreError::NotFound)?.into_record()
    }

    async fn update_counter(
        &self,
        id: &[u8],
        expected: u32,
        counter: u32,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE passgate_credentials
            SET counter = $2, last_used_at = NOW()
            WHERE user_id = $1 AND counter = $3
            "#,
        )
        .bind(id)
        .bind(i64::from(counter))
        .bind(i64::from(expected))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        // No row matched: either the counter moved or the record is gone
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM passgate_credentials WHERE user_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        if exists {
            Ok(false)
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn health(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

/// Database row for credentials
#[derive(sqlx::FromRow)]
struct CredentialRow {
    user_id: Vec<u8>,
    name: String,
    display_name: String,
    credential_id: String,
    public_key: Vec<u8>,
    counter: i64,
}

impl CredentialRow {
    fn into_record(self) -> Result<CredentialRecord, StoreError> {
        let counter = u32::try_from(self.counter).map_err(|_| {
            StoreError::Serialization(format!("counter {} out of range", self.counter))
        })?;

        Ok(CredentialRecord {
            id: self.user_id,
            name: self.name,
            display_name: self.display_name,
            credential_id: self.credential_id,
            public_key: self.public_key,
            counter,
        })
    }
}

impl std::fmt::Debug for PostgresCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresCredentialStore")
            .field("pool", &"<PgPool>")
            .finish()
    }
}
