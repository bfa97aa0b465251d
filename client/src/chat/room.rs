use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

/// The single well-known room every client joins. Earlier revisions minted
/// a fresh room id per session; the deployed service keeps one global room.
pub const GLOBAL_ROOM_ID: &str = "global";

/// Rooms live for three hours after joining.
pub const ROOM_TTL_HOURS: i64 = 3;

/// Messages older than this window are dropped at receive/history time.
pub const MESSAGE_RETENTION_HOURS: i64 = 3;

/// Client-side view of the joined room. Materialized on join, discarded when
/// the channel reports expiry or the user leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRoom {
    pub id: String,
    pub participant_ids: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ChatRoom {
    /// The global room, freshly joined by `user_id`.
    pub fn global(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: GLOBAL_ROOM_ID.to_string(),
            participant_ids: HashSet::from([user_id.to_string()]),
            created_at: now,
            expires_at: now + Duration::hours(ROOM_TTL_HOURS),
        }
    }

    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// Whether a message timestamp falls inside the retention window.
pub fn within_retention(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    timestamp > now - Duration::hours(MESSAGE_RETENTION_HOURS)
}
