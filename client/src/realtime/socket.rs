use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::channel::{ChannelEvent, ChannelSender};
use crate::chat::events::{ClientEvent, ServerEvent};

/// First retry delay after a failed connection attempt.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Retry delays double up to this cap.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// A reconnect attempt is forced at least this often while not connected.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// Owns the one long-lived WebSocket connection to the realtime service.
///
/// `connect` starts a supervisor task that retries forever with capped
/// backoff; `disconnect` tears the channel down for good — a new channel is
/// built to connect again. Outbound events are fire-and-forget and are
/// dropped while no connection is up.
pub struct RealtimeChannel {
    url: String,
    sender: ChannelSender,
    outbound_rx: Option<mpsc::UnboundedReceiver<ClientEvent>>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    cancel: CancellationToken,
}

impl RealtimeChannel {
    /// Build a channel for `url`, returning the handle and the stream of
    /// [`ChannelEvent`]s the application consumes.
    pub fn new(url: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let channel = Self {
            url: url.into(),
            sender: ChannelSender::new(outbound_tx),
            outbound_rx: Some(outbound_rx),
            events_tx,
            cancel: CancellationToken::new(),
        };
        (channel, events_rx)
    }

    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    /// Start the supervisor. Calling it again is a no-op.
    pub fn connect(&mut self) {
        let Some(outbound_rx) = self.outbound_rx.take() else {
            return;
        };
        let url = self.url.clone();
        let events = self.events_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(supervise(url, outbound_rx, events, cancel));
    }

    /// Stop the supervisor and close any open connection.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

/// Double the retry delay, capped.
fn next_backoff(delay: Duration) -> Duration {
    (delay * 2).min(MAX_BACKOFF)
}

/// Why an established connection stopped pumping.
enum ConnectionEnd {
    /// The application shut the channel down (or dropped every sender).
    Shutdown,
    /// The connection itself dropped; the supervisor reconnects.
    Dropped(Option<String>),
}

async fn supervise(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                backoff = INITIAL_BACKOFF;
                info!(%url, "realtime channel up");
                let _ = events.send(ChannelEvent::Up);

                match run_connected(socket, &mut outbound, &events, &cancel).await {
                    ConnectionEnd::Shutdown => return,
                    ConnectionEnd::Dropped(reason) => {
                        warn!(?reason, "realtime channel down");
                        let _ = events.send(ChannelEvent::Down { reason });
                        if !wait_before_retry(&mut outbound, backoff, &cancel).await {
                            return;
                        }
                    }
                }
            }
            Err(error) => {
                debug!(%error, "connection attempt failed");
                let _ = events.send(ChannelEvent::ConnectFailed {
                    error: error.to_string(),
                });
                if !wait_before_retry(&mut outbound, backoff, &cancel).await {
                    return;
                }
                backoff = next_backoff(backoff);
            }
        }
    }
}

/// Sleep out the retry delay (the watchdog caps it at five seconds), while
/// draining and dropping anything emitted in the meantime — no queuing or
/// replay is promised while disconnected. Returns false on shutdown.
async fn wait_before_retry(
    outbound: &mut mpsc::UnboundedReceiver<ClientEvent>,
    delay: Duration,
    cancel: &CancellationToken,
) -> bool {
    let deadline = tokio::time::sleep(delay.min(WATCHDOG_INTERVAL));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return true,
            _ = cancel.cancelled() => return false,
            maybe = outbound.recv() => match maybe {
                Some(_) => warn!("channel disconnected, dropping outbound event"),
                None => return false,
            },
        }
    }
}

/// Pump the established connection until it drops, the application shuts
/// down, or the service closes.
async fn run_connected(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound: &mut mpsc::UnboundedReceiver<ClientEvent>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    cancel: &CancellationToken,
) -> ConnectionEnd {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                return ConnectionEnd::Shutdown;
            }
            maybe = outbound.recv() => {
                let Some(event) = maybe else {
                    let _ = sink.close().await;
                    return ConnectionEnd::Shutdown;
                };
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(error) = sink.send(Message::text(text)).await {
                            return ConnectionEnd::Dropped(Some(error.to_string()));
                        }
                    }
                    Err(error) => warn!(%error, "unencodable outbound event, dropping"),
                }
            }
            frame = stream.next() => match frame {
                None => return ConnectionEnd::Dropped(Some("connection closed".into())),
                Some(Err(error)) => return ConnectionEnd::Dropped(Some(error.to_string())),
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(event) => {
                            let _ = events.send(ChannelEvent::Event(event));
                        }
                        Err(error) => warn!(%error, "unreadable frame from service, skipping"),
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    return ConnectionEnd::Dropped(Some(
                        frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "closed by service".into()),
                    ));
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
