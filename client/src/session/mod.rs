pub mod characters;
pub mod manager;
pub mod token;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use characters::{CHARACTERS, Character, find_character};
pub use manager::{SessionError, SessionManager};

/// The persisted session token record. Exactly one exists per client at a
/// time; it is created on token generation, mutated when a character is
/// chosen or a room is joined, and deleted on logout or expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// The opaque bearer credential (32 lowercase hex characters).
    pub value: String,
    pub expires_at: DateTime<Utc>,
    /// Stable user id derived at token generation time.
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// The in-memory identity of the current user, reconstructed from the
/// session record on load. Persisted only as a denormalized cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    pub online: bool,
    pub needs_character_selection: bool,
}

impl UserIdentity {
    /// Derive an identity from a session record. The identity still needs a
    /// character when the record carries none.
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            id: record.user_id.clone(),
            avatar_ref: record.avatar_ref.clone(),
            character_name: record.character_name.clone(),
            online: true,
            needs_character_selection: record.character_id.is_none(),
        }
    }
}
