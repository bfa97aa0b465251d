use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::warn;

use crate::session::{SessionRecord, UserIdentity};

/// Fixed storage key for the session token record.
pub const SESSION_KEY: &str = "session";
/// Fixed storage key for the denormalized identity cache.
pub const IDENTITY_KEY: &str = "identity";
/// Fixed storage key for the list of previously generated token values.
pub const KNOWN_TOKENS_KEY: &str = "known_tokens";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Versioned envelope for the persisted session record. Version 1 is the
/// legacy shape that still carried a gender field; loading it migrates to
/// the current shape and drops the field.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "version")]
enum StoredSession {
    #[serde(rename = "1", rename_all = "camelCase")]
    V1 {
        value: String,
        expires_at: chrono::DateTime<chrono::Utc>,
        user_id: String,
        #[serde(default)]
        gender: Option<String>,
        #[serde(default)]
        avatar: Option<String>,
    },
    #[serde(rename = "2")]
    V2(SessionRecord),
}

impl StoredSession {
    fn into_current(self) -> SessionRecord {
        match self {
            StoredSession::V1 {
                value,
                expires_at,
                user_id,
                gender: _,
                avatar,
            } => SessionRecord {
                value,
                expires_at,
                user_id,
                character_id: None,
                avatar_ref: avatar,
                character_name: None,
                room_id: None,
            },
            StoredSession::V2(record) => record,
        }
    }
}

/// The single owner of all durable client-side state. Everything else reads
/// and writes through this store; the session manager is its only writer.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now')) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_raw(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Load the persisted session record, migrating legacy shapes. A corrupt
    /// row is logged, removed, and reported as absent.
    pub async fn load_session(&self) -> Result<Option<SessionRecord>, StoreError> {
        let Some(text) = self.get_raw(SESSION_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<StoredSession>(&text) {
            Ok(stored @ StoredSession::V1 { .. }) => {
                let record = stored.into_current();
                // Re-persist in the current shape so the migration runs once.
                self.save_session(&record).await?;
                Ok(Some(record))
            }
            Ok(stored) => Ok(Some(stored.into_current())),
            Err(error) => {
                warn!(%error, "stored session record is unreadable, discarding");
                self.delete_raw(SESSION_KEY).await?;
                Ok(None)
            }
        }
    }

    pub async fn save_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let text = serde_json::to_string(&StoredSession::V2(record.clone()))?;
        self.put_raw(SESSION_KEY, &text).await
    }

    /// Remove the session record and the cached identity.
    pub async fn clear_session(&self) -> Result<(), StoreError> {
        self.delete_raw(SESSION_KEY).await?;
        self.delete_raw(IDENTITY_KEY).await
    }

    pub async fn save_identity(&self, identity: &UserIdentity) -> Result<(), StoreError> {
        let text = serde_json::to_string(identity)?;
        self.put_raw(IDENTITY_KEY, &text).await
    }

    /// The locally remembered token values. Not an authentication boundary:
    /// this only lets a token minted on this device log back in.
    pub async fn known_tokens(&self) -> Result<Vec<String>, StoreError> {
        let Some(text) = self.get_raw(KNOWN_TOKENS_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&text) {
            Ok(tokens) => Ok(tokens),
            Err(error) => {
                warn!(%error, "known-token list is unreadable, resetting");
                self.delete_raw(KNOWN_TOKENS_KEY).await?;
                Ok(Vec::new())
            }
        }
    }

    pub async fn remember_token(&self, value: &str) -> Result<(), StoreError> {
        let mut tokens = self.known_tokens().await?;
        if !tokens.iter().any(|t| t == value) {
            tokens.push(value.to_string());
        }
        let text = serde_json::to_string(&tokens)?;
        self.put_raw(KNOWN_TOKENS_KEY, &text).await
    }
}
