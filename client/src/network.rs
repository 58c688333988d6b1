//! WebSocket transport running on its own thread.
//!
//! macroquad owns the main thread, so the socket lives on a background
//! thread with a single-threaded tokio runtime. The frame loop talks to it
//! only through two channels: outgoing [`ClientMessage`]s and incoming
//! [`NetworkEvent`]s, drained once per frame with [`NetworkClient::poll`].

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Connected,
    Message(ServerMessage),
    Disconnected(String),
}

pub struct NetworkClient {
    outgoing: UnboundedSender<ClientMessage>,
    incoming: UnboundedReceiver<NetworkEvent>,
}

/// Accepts `host:port` or a full `ws://` / `wss://` URL.
pub fn server_url(server: &str) -> String {
    if server.starts_with("ws://") || server.starts_with("wss://") {
        server.to_string()
    } else {
        format!("ws://{}", server)
    }
}

impl NetworkClient {
    /// Starts connecting in the background. Progress arrives as events.
    pub fn connect(server: &str, fake_ping_ms: u64) -> Self {
        let url = server_url(server);
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, incoming) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = events_tx.send(NetworkEvent::Disconnected(e.to_string()));
                    return;
                }
            };
            runtime.block_on(run_connection(url, fake_ping_ms, outgoing_rx, events_tx));
        });

        Self { outgoing, incoming }
    }

    /// Queues a message; returns false once the connection is gone.
    pub fn send(&self, message: ClientMessage) -> bool {
        self.outgoing.send(message).is_ok()
    }

    /// Everything that arrived since the last call.
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.incoming.try_recv() {
            events.push(event);
        }
        events
    }
}

async fn run_connection(
    url: String,
    fake_ping_ms: u64,
    mut outgoing: UnboundedReceiver<ClientMessage>,
    events: UnboundedSender<NetworkEvent>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!("Failed to connect to {}: {}", url, e);
            let _ = events.send(NetworkEvent::Disconnected(e.to_string()));
            return;
        }
    };
    info!("Connected to {}", url);
    let _ = events.send(NetworkEvent::Connected);

    let (mut write, mut read) = ws_stream.split();
    // Half the artificial latency on each leg
    let delay = Duration::from_millis(fake_ping_ms / 2);

    let reason = 'conn: loop {
        tokio::select! {
            message = outgoing.recv() => {
                let Some(message) = message else {
                    let _ = write.close().await;
                    break 'conn "client closed".to_string();
                };
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode message: {}", e);
                        continue 'conn;
                    }
                };
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                if let Err(e) = write.send(Message::text(text)).await {
                    break 'conn e.to_string();
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    match ServerMessage::from_json(text.as_str()) {
                        Ok(message) => {
                            if events.send(NetworkEvent::Message(message)).is_err() {
                                break 'conn "client closed".to_string();
                            }
                        }
                        Err(e) => debug!("Dropping server message: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break 'conn "connection closed".to_string(),
                Some(Ok(_)) => {}
                Some(Err(e)) => break 'conn e.to_string(),
            }
        }
    };

    info!("Disconnected: {}", reason);
    let _ = events.send(NetworkEvent::Disconnected(reason));
}
