use chrono::Utc;
use tracing::{debug, info, warn};

use super::events::{ChatMessage, ServerEvent};
use super::room::{ChatRoom, within_retention};
use crate::realtime::ChannelSender;
use crate::session::UserIdentity;

/// Owns the active room and its message list. All inbound channel events
/// flow through [`ChatManager::apply`], which is the only place room/message
/// state transitions happen; outbound intents go through the channel sender.
///
/// Lifecycle: `NoRoom -> (join_room, requires connected identity) ->
/// RoomActive -> (leave_room | room_expired) -> NoRoom`.
pub struct ChatManager {
    channel: ChannelSender,
    current_room: Option<ChatRoom>,
    messages: Vec<ChatMessage>,
    online_count: usize,
}

impl ChatManager {
    pub fn new(channel: ChannelSender) -> Self {
        Self {
            channel,
            current_room: None,
            messages: Vec::new(),
            online_count: 0,
        }
    }

    /// Join the global room: set it current, reset the message list, and ask
    /// the service for the room plus its recent history.
    pub fn join_room(&mut self, identity: &UserIdentity) {
        let room = ChatRoom::global(&identity.id);
        info!(room_id = %room.id, user_id = %identity.id, "joining room");

        self.messages.clear();
        self.channel.emit_join(&room.id, &identity.id);
        self.channel.emit_history_request(&room.id);
        self.current_room = Some(room);
    }

    /// Emit a message to the active room. Empty input, a missing identity,
    /// or no active room make this a logged no-op. The message is not
    /// appended locally; the channel echoes it back.
    pub fn send_message(&self, text: &str, sender: Option<&UserIdentity>) {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring empty message");
            return;
        }
        let Some(sender) = sender else {
            warn!("cannot send message without an identity");
            return;
        };
        let Some(room) = &self.current_room else {
            warn!("cannot send message without an active room");
            return;
        };

        let message = ChatMessage::outgoing(text, &room.id, sender);
        self.channel.emit_send(message);
    }

    /// Leave the active room and reset local state. Returns true when a room
    /// was actually left; repeated calls are no-ops.
    pub fn leave_room(&mut self, identity: Option<&UserIdentity>) -> bool {
        let Some(room) = self.current_room.take() else {
            return false;
        };
        if let Some(identity) = identity {
            self.channel.emit_leave(&room.id, &identity.id);
        }
        self.messages.clear();
        info!(room_id = %room.id, "left room");
        true
    }

    /// The single reducer for inbound channel events. Returns true when the
    /// event closed the active room, so the caller can strip the room
    /// reference from the persisted session.
    pub fn apply(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::ReceiveMessage { message } => {
                let Some(room) = &self.current_room else {
                    debug!(message_id = %message.id, "dropping message with no active room");
                    return false;
                };
                if message.room_id != room.id {
                    debug!(
                        message_room = %message.room_id,
                        active_room = %room.id,
                        "dropping message for another room"
                    );
                    return false;
                }
                if !within_retention(message.timestamp, Utc::now()) {
                    debug!(message_id = %message.id, "dropping message outside retention window");
                    return false;
                }
                self.messages.push(message);
                false
            }
            ServerEvent::ChatHistory { messages } => {
                let Some(room) = &self.current_room else {
                    debug!("dropping history with no active room");
                    return false;
                };
                let now = Utc::now();
                self.messages = messages
                    .into_iter()
                    .filter(|m| m.room_id == room.id && within_retention(m.timestamp, now))
                    .collect();
                debug!(count = self.messages.len(), "history applied");
                false
            }
            ServerEvent::RoomExpired { room_id } => {
                let matches = self
                    .current_room
                    .as_ref()
                    .is_some_and(|room| room.id == room_id);
                if !matches {
                    return false;
                }
                info!(%room_id, "room expired");
                self.current_room = None;
                self.messages.clear();
                true
            }
            ServerEvent::OnlineUsers { count } => {
                self.online_count = count;
                false
            }
        }
    }

    pub fn current_room(&self) -> Option<&ChatRoom> {
        self.current_room.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn online_count(&self) -> usize {
        self.online_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::events::ClientEvent;
    use crate::chat::room::GLOBAL_ROOM_ID;
    use chrono::Duration;
    use tokio::sync::mpsc;

    fn identity() -> UserIdentity {
        UserIdentity {
            id: "u1".into(),
            avatar_ref: Some("/avatars/brr-brr-patapim.png".into()),
            character_name: Some("Brr Brr Patapim".into()),
            online: true,
            needs_character_selection: false,
        }
    }

    fn setup() -> (ChatManager, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChatManager::new(ChannelSender::new(tx)), rx)
    }

    fn incoming(text: &str, age: Duration) -> ChatMessage {
        ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            user_id: "u2".into(),
            timestamp: Utc::now() - age,
            room_id: GLOBAL_ROOM_ID.into(),
            sender_avatar: None,
            sender_name: None,
        }
    }

    #[test]
    fn test_join_emits_join_then_history_request() {
        let (mut chat, mut rx) = setup();
        chat.join_room(&identity());

        assert!(chat.current_room().is_some());
        assert!(matches!(
            rx.try_recv().unwrap(),
            ClientEvent::JoinRoom { room_id, user_id }
                if room_id == GLOBAL_ROOM_ID && user_id == "u1"
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ClientEvent::GetChatHistory { room_id } if room_id == GLOBAL_ROOM_ID
        ));
    }

    #[test]
    fn test_send_message_emits_without_local_echo() {
        let (mut chat, mut rx) = setup();
        chat.join_room(&identity());
        while rx.try_recv().is_ok() {}

        chat.send_message("hello", Some(&identity()));

        assert!(chat.messages().is_empty(), "sender waits for the echo");
        match rx.try_recv().unwrap() {
            ClientEvent::SendMessage { message } => {
                assert_eq!(message.text, "hello");
                assert_eq!(message.user_id, "u1");
                assert_eq!(message.room_id, GLOBAL_ROOM_ID);
                assert_eq!(message.sender_name.as_deref(), Some("Brr Brr Patapim"));
            }
            other => panic!("expected send_message, got {other:?}"),
        }
    }

    #[test]
    fn test_send_message_no_ops() {
        let (mut chat, mut rx) = setup();

        // No room yet.
        chat.send_message("hello", Some(&identity()));
        assert!(rx.try_recv().is_err());

        chat.join_room(&identity());
        while rx.try_recv().is_ok() {}

        // Empty text and missing identity.
        chat.send_message("   ", Some(&identity()));
        chat.send_message("hello", None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_receive_appends_in_arrival_order() {
        let (mut chat, _rx) = setup();
        chat.join_room(&identity());

        chat.apply(ServerEvent::ReceiveMessage {
            message: incoming("first", Duration::minutes(2)),
        });
        chat.apply(ServerEvent::ReceiveMessage {
            message: incoming("second", Duration::minutes(1)),
        });

        let texts: Vec<&str> = chat.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_receive_drops_stale_and_foreign_messages() {
        let (mut chat, _rx) = setup();
        chat.join_room(&identity());

        chat.apply(ServerEvent::ReceiveMessage {
            message: incoming("too old", Duration::hours(4)),
        });

        let mut foreign = incoming("wrong room", Duration::minutes(1));
        foreign.room_id = "other".into();
        chat.apply(ServerEvent::ReceiveMessage { message: foreign });

        assert!(chat.messages().is_empty());
    }

    #[test]
    fn test_receive_without_room_is_dropped() {
        let (mut chat, _rx) = setup();
        chat.apply(ServerEvent::ReceiveMessage {
            message: incoming("floating", Duration::minutes(1)),
        });
        assert!(chat.messages().is_empty());
    }

    #[test]
    fn test_history_replaces_list_with_retention_filter() {
        let (mut chat, _rx) = setup();
        chat.join_room(&identity());
        chat.apply(ServerEvent::ReceiveMessage {
            message: incoming("pre-history", Duration::minutes(5)),
        });

        chat.apply(ServerEvent::ChatHistory {
            messages: vec![
                incoming("recent", Duration::hours(1)),
                incoming("ancient", Duration::hours(4)),
            ],
        });

        let texts: Vec<&str> = chat.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["recent"], "history replaces, filtered");
    }

    #[test]
    fn test_room_expired_clears_state() {
        let (mut chat, _rx) = setup();
        chat.join_room(&identity());
        chat.apply(ServerEvent::ReceiveMessage {
            message: incoming("doomed", Duration::minutes(1)),
        });

        let closed = chat.apply(ServerEvent::RoomExpired {
            room_id: GLOBAL_ROOM_ID.into(),
        });

        assert!(closed);
        assert!(chat.current_room().is_none());
        assert!(chat.messages().is_empty());
    }

    #[test]
    fn test_room_expired_for_other_room_is_ignored() {
        let (mut chat, _rx) = setup();
        chat.join_room(&identity());

        let closed = chat.apply(ServerEvent::RoomExpired {
            room_id: "other".into(),
        });

        assert!(!closed);
        assert!(chat.current_room().is_some());
    }

    #[test]
    fn test_leave_is_idempotent() {
        let (mut chat, mut rx) = setup();
        chat.join_room(&identity());
        while rx.try_recv().is_ok() {}

        assert!(chat.leave_room(Some(&identity())));
        assert!(chat.current_room().is_none());
        assert!(chat.messages().is_empty());
        assert!(matches!(
            rx.try_recv().unwrap(),
            ClientEvent::LeaveRoom { user_id, .. } if user_id == "u1"
        ));

        assert!(!chat.leave_room(Some(&identity())));
        assert!(rx.try_recv().is_err(), "second leave emits nothing");
    }

    #[test]
    fn test_rejoin_resets_messages() {
        let (mut chat, _rx) = setup();
        chat.join_room(&identity());
        chat.apply(ServerEvent::ReceiveMessage {
            message: incoming("old room talk", Duration::minutes(1)),
        });

        chat.join_room(&identity());
        assert!(chat.messages().is_empty());
    }

    #[test]
    fn test_online_users_updates_count() {
        let (mut chat, _rx) = setup();
        assert_eq!(chat.online_count(), 0);
        chat.apply(ServerEvent::OnlineUsers { count: 12 });
        assert_eq!(chat.online_count(), 12);
    }
}
