use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, FromRow)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// Durable string-keyed store for session and preference state.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        // A single connection keeps `sqlite::memory:` databases coherent.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entry = sqlx::query_as::<_, Entry>("SELECT * FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry.map(|e| e.value))
    }

    pub async fn get_entry(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        let entry = sqlx::query_as::<_, Entry>("SELECT * FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_string_list(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(values)?;
        self.set(key, &encoded).await
    }

    /// Read a JSON string array. Missing, unreadable or malformed values all
    /// come back as an empty list.
    pub async fn get_string_list(&self, key: &str) -> Vec<String> {
        let raw = match self.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read '{}' from storage: {}", key, e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| match v {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            Err(e) => {
                warn!("Ignoring malformed value for '{}': {}", key, e);
                Vec::new()
            }
        }
    }
}
