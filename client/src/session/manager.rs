use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::characters::find_character;
use super::token::{TOKEN_EXPIRY_DAYS, generate_token_value, is_valid_token_format};
use super::{SessionRecord, UserIdentity};
use crate::store::{SessionStore, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token cannot be empty")]
    EmptyToken,
    #[error("token must be 32 lowercase hex characters")]
    MalformedToken,
    #[error("token not recognized on this device")]
    UnknownToken,
    #[error("session token has expired")]
    Expired,
    #[error("randomness source unavailable: {0}")]
    RandomnessUnavailable(rand::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the current user identity and the persisted session record. This is
/// the only component that writes the session store.
///
/// Lifecycle: `Anonymous -> (generate_token + login_with_token) ->
/// Authenticated/NoCharacter -> (set_user_character) -> Authenticated/Ready
/// -> (logout | expired on load) -> Anonymous`.
pub struct SessionManager {
    store: SessionStore,
    record: Option<SessionRecord>,
    identity: Option<UserIdentity>,
}

impl SessionManager {
    /// Hydrate from the store. An expired record is deleted and the manager
    /// starts anonymous; an unreadable one was already discarded by the
    /// store layer.
    pub async fn load(store: SessionStore) -> Result<Self, SessionError> {
        let mut manager = Self {
            store,
            record: None,
            identity: None,
        };

        let Some(record) = manager.store.load_session().await? else {
            return Ok(manager);
        };

        if record.is_expired(Utc::now()) {
            info!(user_id = %record.user_id, "stored session expired, clearing");
            manager.store.clear_session().await?;
            return Ok(manager);
        }

        let identity = UserIdentity::from_record(&record);
        info!(
            user_id = %identity.id,
            needs_character = identity.needs_character_selection,
            "session restored"
        );
        manager.identity = Some(identity);
        manager.record = Some(record);
        Ok(manager)
    }

    /// Mint a fresh bearer token: 128 random bits, 7-day expiry, new user
    /// id. The record is persisted and the plaintext returned for
    /// display/copy, but no identity is established until the token is used
    /// to log in.
    pub async fn generate_token(&mut self) -> Result<String, SessionError> {
        let value = generate_token_value().map_err(SessionError::RandomnessUnavailable)?;

        let record = SessionRecord {
            value: value.clone(),
            expires_at: Utc::now() + Duration::days(TOKEN_EXPIRY_DAYS),
            user_id: Uuid::new_v4().to_string(),
            character_id: None,
            avatar_ref: None,
            character_name: None,
            room_id: None,
        };

        self.store.save_session(&record).await?;
        self.store.remember_token(&value).await?;
        info!(user_id = %record.user_id, "token generated");

        self.record = Some(record);
        self.identity = None;
        Ok(value)
    }

    /// Log in with a candidate token. The candidate must match the persisted
    /// record or the locally remembered token list; real verification
    /// belongs to the server side of the realtime service.
    pub async fn login_with_token(&mut self, candidate: &str) -> Result<(), SessionError> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(SessionError::EmptyToken);
        }
        if !is_valid_token_format(candidate) {
            return Err(SessionError::MalformedToken);
        }

        let record = match self.record.take() {
            Some(record) if record.value == candidate => {
                if record.is_expired(Utc::now()) {
                    self.store.clear_session().await?;
                    self.identity = None;
                    return Err(SessionError::Expired);
                }
                SessionRecord {
                    expires_at: Utc::now() + Duration::days(TOKEN_EXPIRY_DAYS),
                    ..record
                }
            }
            other => {
                // The record on disk is for a different token (or absent).
                // Fall back to the locally remembered list.
                self.record = other;
                let known = self.store.known_tokens().await?;
                if !known.iter().any(|t| t == candidate) {
                    return Err(SessionError::UnknownToken);
                }
                SessionRecord {
                    value: candidate.to_string(),
                    expires_at: Utc::now() + Duration::days(TOKEN_EXPIRY_DAYS),
                    user_id: Uuid::new_v4().to_string(),
                    character_id: None,
                    avatar_ref: None,
                    character_name: None,
                    room_id: None,
                }
            }
        };

        let identity = UserIdentity::from_record(&record);
        self.store.save_session(&record).await?;
        self.store.save_identity(&identity).await?;
        info!(
            user_id = %identity.id,
            needs_character = identity.needs_character_selection,
            "logged in"
        );

        self.record = Some(record);
        self.identity = Some(identity);
        Ok(())
    }

    /// Apply a character from the catalog to the current identity. An
    /// unknown id leaves everything untouched.
    pub async fn set_user_character(&mut self, character_id: u32) -> Result<(), SessionError> {
        let (Some(record), Some(identity)) = (self.record.as_mut(), self.identity.as_mut()) else {
            warn!(character_id, "character selected without an active session");
            return Ok(());
        };

        let Some(character) = find_character(character_id) else {
            warn!(character_id, "unknown character id, ignoring");
            return Ok(());
        };

        record.character_id = Some(character.id);
        record.avatar_ref = Some(character.avatar.to_string());
        record.character_name = Some(character.name.to_string());

        identity.avatar_ref = record.avatar_ref.clone();
        identity.character_name = record.character_name.clone();
        identity.needs_character_selection = false;

        self.store.save_session(record).await?;
        self.store.save_identity(identity).await?;
        info!(character = character.name, "character selected");
        Ok(())
    }

    /// Record or strip the active room reference on the persisted record.
    /// Called from the application loop so the store keeps a single writer.
    pub async fn set_room(&mut self, room_id: Option<String>) -> Result<(), SessionError> {
        let Some(record) = self.record.as_mut() else {
            return Ok(());
        };
        if record.room_id == room_id {
            return Ok(());
        }
        record.room_id = room_id;
        self.store.save_session(record).await?;
        Ok(())
    }

    /// Drop the session unconditionally. Storage failures are logged, never
    /// surfaced; the in-memory state is cleared regardless.
    pub async fn logout(&mut self) {
        if let Err(error) = self.store.clear_session().await {
            warn!(%error, "failed to clear persisted session");
        }
        self.record = None;
        self.identity = None;
        info!("logged out");
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        self.record.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}
