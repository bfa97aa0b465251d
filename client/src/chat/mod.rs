pub mod events;
pub mod manager;
pub mod room;

pub use events::{ChatMessage, ClientEvent, SYSTEM_SENDER, ServerEvent};
pub use manager::ChatManager;
pub use room::{ChatRoom, GLOBAL_ROOM_ID, MESSAGE_RETENTION_HOURS, ROOM_TTL_HOURS};
