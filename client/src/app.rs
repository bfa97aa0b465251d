use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use crate::chat::events::{ChatMessage, ServerEvent};
use crate::chat::manager::ChatManager;
use crate::realtime::{ChannelEvent, RealtimeChannel};
use crate::session::characters::CHARACTERS;
use crate::session::manager::SessionManager;

enum Flow {
    Continue,
    Quit,
}

/// The terminal frontend: an auth prompt (the landing surface) and a chat
/// view, fed by stdin lines and the realtime event stream. Logout or an
/// expired session drops back to the auth prompt.
pub struct App {
    session: SessionManager,
    chat: ChatManager,
    channel: RealtimeChannel,
    connected: bool,
    offline_reported: bool,
}

impl App {
    pub fn new(session: SessionManager, chat: ChatManager, channel: RealtimeChannel) -> Self {
        Self {
            session,
            chat,
            channel,
            connected: false,
            offline_reported: false,
        }
    }

    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> anyhow::Result<()> {
        self.channel.connect();

        println!("fana — disposable anonymous chat");
        self.print_prompt();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                maybe = events.recv() => {
                    let Some(event) = maybe else { break };
                    self.handle_channel_event(event).await;
                }
                maybe = lines.next_line() => {
                    let Some(line) = maybe? else { break };
                    if let Flow::Quit = self.handle_line(line.trim()).await {
                        break;
                    }
                }
            }
        }

        self.channel.disconnect();
        Ok(())
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Up => {
                self.connected = true;
                self.offline_reported = false;
                println!("·· connected");
                self.maybe_auto_join().await;
            }
            ChannelEvent::Down { reason } => {
                self.connected = false;
                match reason {
                    Some(reason) => println!("·· connection lost ({reason}), reconnecting..."),
                    None => println!("·· connection lost, reconnecting..."),
                }
            }
            ChannelEvent::ConnectFailed { error } => {
                self.connected = false;
                // The supervisor retries on its own; report the banner once
                // per outage instead of once per attempt.
                if !self.offline_reported {
                    self.offline_reported = true;
                    println!("!! cannot reach the chat service: {error} (retrying)");
                }
            }
            ChannelEvent::Event(event) => {
                let before = self.chat.messages().len();
                let was_history = matches!(event, ServerEvent::ChatHistory { .. });
                let room_closed = self.chat.apply(event);

                if room_closed {
                    if let Err(error) = self.session.set_room(None).await {
                        warn!(%error, "failed to strip room from session record");
                    }
                    println!("·· this room has expired");
                    self.maybe_auto_join().await;
                } else if was_history {
                    self.render_history();
                } else {
                    for message in &self.chat.messages()[before.min(self.chat.messages().len())..] {
                        render_message(message);
                    }
                }
            }
        }
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }
        if matches!(line, "/quit" | "quit" | "exit") {
            return Flow::Quit;
        }

        if !self.session.is_authenticated() {
            self.handle_auth_line(line).await
        } else if self
            .session
            .identity()
            .is_some_and(|i| i.needs_character_selection)
        {
            self.handle_character_line(line).await
        } else {
            self.handle_chat_line(line).await
        }
    }

    async fn handle_auth_line(&mut self, line: &str) -> Flow {
        match line.split_once(' ') {
            None if line == "generate" => match self.session.generate_token().await {
                Ok(token) => {
                    println!("token created — keep it to log back in later:");
                    println!("    {token}");
                    println!("log in with: login {token}");
                }
                Err(error) => println!("error: {error}"),
            },
            Some(("login", candidate)) => match self.session.login_with_token(candidate).await {
                Ok(()) => {
                    println!("logged in");
                    self.print_prompt();
                    self.maybe_auto_join().await;
                }
                Err(error) => println!("error: {error}"),
            },
            _ => self.print_prompt(),
        }
        Flow::Continue
    }

    async fn handle_character_line(&mut self, line: &str) -> Flow {
        let Ok(id) = line.parse::<u32>() else {
            self.print_prompt();
            return Flow::Continue;
        };

        if let Err(error) = self.session.set_user_character(id).await {
            println!("error: {error}");
            return Flow::Continue;
        }

        match self.session.identity() {
            Some(identity) if !identity.needs_character_selection => {
                println!(
                    "you are {}",
                    identity.character_name.as_deref().unwrap_or("ready")
                );
                self.maybe_auto_join().await;
            }
            _ => println!("no such character, pick a number from the list"),
        }
        Flow::Continue
    }

    async fn handle_chat_line(&mut self, line: &str) -> Flow {
        match line {
            "/leave" => {
                if self.chat.leave_room(self.session.identity()) {
                    if let Err(error) = self.session.set_room(None).await {
                        warn!(%error, "failed to strip room from session record");
                    }
                    println!("·· left the room");
                }
            }
            "/logout" => {
                self.chat.leave_room(self.session.identity());
                self.session.logout().await;
                println!("·· logged out");
                self.print_prompt();
            }
            "/who" => println!("·· {} online", self.chat.online_count()),
            "/help" => self.print_prompt(),
            _ if line.starts_with('/') => println!("unknown command, try /help"),
            text => self.chat.send_message(text, self.session.identity()),
        }
        Flow::Continue
    }

    /// Reactive transition: an authenticated user with no active room joins
    /// the global room as soon as the channel is up.
    async fn maybe_auto_join(&mut self) {
        if !self.connected || self.chat.current_room().is_some() {
            return;
        }
        let Some(identity) = self.session.identity().cloned() else {
            return;
        };
        if identity.needs_character_selection {
            return;
        }

        self.chat.join_room(&identity);
        let room_id = self.chat.current_room().map(|r| r.id.clone());
        if let Err(error) = self.session.set_room(room_id).await {
            warn!(%error, "failed to record room on session");
        }
        if let Some(room) = self.chat.current_room() {
            let minutes = room.time_remaining(Utc::now()).num_minutes();
            println!("·· joined the room (expires in about {minutes} minutes)");
        }
    }

    fn render_history(&self) {
        println!("·· recent messages:");
        for message in self.chat.messages() {
            render_message(message);
        }
    }

    fn print_prompt(&self) {
        if !self.session.is_authenticated() {
            println!("commands: generate | login <token> | quit");
        } else if self
            .session
            .identity()
            .is_some_and(|i| i.needs_character_selection)
        {
            println!("pick your character:");
            for character in CHARACTERS {
                println!("  {}. {}", character.id, character.name);
            }
        } else {
            println!("type to chat — /leave /logout /who /help /quit");
        }
    }
}

fn render_message(message: &ChatMessage) {
    let time = message.timestamp.format("%H:%M");
    if message.is_system() {
        println!("[{time}] ·· {}", message.text);
    } else {
        let name = message
            .sender_name
            .as_deref()
            .unwrap_or(&message.user_id);
        println!("[{time}] {name}: {}", message.text);
    }
}
