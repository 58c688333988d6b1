//! WebSocket front end: accepts connections and turns client messages into
//! lobby and room operations.
//!
//! Every connection gets two halves:
//! - a reader loop that decodes JSON text frames and drives a [`Session`]
//! - a writer task fed by an unbounded outbox, so room code never waits on
//!   a slow socket
//!
//! Malformed frames are logged at debug level and dropped; the connection
//! stays open.

use crate::config::ServerConfig;
use crate::registry::{generate_token, LobbyError, RoomRegistry};
use crate::room::{start_countdown, ConnectionId, RematchVote, RoomHandle, RoomPhase, Slot};
use crate::scheduler::ScheduledTask;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{serialize, ClientMessage, InputFrame, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::sleep;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const MAX_NICKNAME_LEN: usize = 12;
const DEFAULT_NICKNAME: &str = "Player";

/// Accepts WebSocket clients and hands each one a [`Session`].
pub struct Server {
    listener: TcpListener,
    registry: Arc<RoomRegistry>,
}

impl Server {
    pub async fn bind(
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            registry: Arc::new(RoomRegistry::new(Arc::new(config))),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.registry)
    }

    /// Runs the accept loop until the listener fails.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut next_conn: ConnectionId = 1;

        loop {
            let (stream, addr) = self.listener.accept().await?;
            let conn = next_conn;
            next_conn += 1;

            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, conn, registry).await {
                    warn!("Connection {} ({}) ended with error: {}", conn, addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    conn: ConnectionId,
    registry: Arc<RoomRegistry>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    info!("Client {} connected from {}", conn, addr);

    let (mut write, mut read) = ws_stream.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox_rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode message for client {}: {}", conn, e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::text(text)).await {
                debug!("Send to client {} failed: {}", conn, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    let mut session = Session::new(conn, outbox, registry);

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientMessage::from_json(text.as_str()) {
                Ok(message) => session.handle(message).await,
                Err(e) => debug!("Dropping message from client {}: {}", conn, e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Read error from client {}: {}", conn, e);
                break;
            }
        }
    }

    session.on_close().await;
    writer.abort();
    info!("Client {} disconnected", conn);
    Ok(())
}

/// Trims a requested nickname to the allowed length, falling back to the
/// default when it is missing or blank.
pub fn clean_nickname(requested: Option<String>) -> String {
    let trimmed = requested.as_deref().map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return DEFAULT_NICKNAME.to_string();
    }
    trimmed.chars().take(MAX_NICKNAME_LEN).collect()
}

/// Room codes are matched case-insensitively and without surrounding space.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_uppercase()
}

struct Seat {
    room_id: String,
    handle: RoomHandle,
}

/// Per-connection lobby state.
pub struct Session {
    conn: ConnectionId,
    outbox: UnboundedSender<ServerMessage>,
    registry: Arc<RoomRegistry>,
    seat: Option<Seat>,
}

impl Session {
    pub fn new(
        conn: ConnectionId,
        outbox: UnboundedSender<ServerMessage>,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            conn,
            outbox,
            registry,
            seat: None,
        }
    }

    fn reply(&self, message: ServerMessage) {
        let _ = self.outbox.send(message);
    }

    fn reply_error(&self, error: LobbyError) {
        debug!("Lobby error for client {}: {}", self.conn, error);
        self.reply(ServerMessage::Error {
            message: error.to_string(),
        });
    }

    pub async fn handle(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::CreateRoom { nickname } => self.create_room(nickname).await,
            ClientMessage::JoinRoom { room_id, nickname } => {
                self.join_room(&room_id, nickname).await
            }
            ClientMessage::Input { seq, keys } => {
                if let Some(seat) = &self.seat {
                    let mut room = seat.handle.lock().await;
                    room.queue_input(self.conn, InputFrame { seq, keys });
                }
            }
            ClientMessage::Rematch => self.rematch().await,
            ClientMessage::Leave => self.leave().await,
            ClientMessage::Reconnect { token } => self.reconnect(&token).await,
        }
    }

    async fn create_room(&mut self, nickname: Option<String>) {
        self.leave().await;

        let nickname = clean_nickname(nickname);
        let token = generate_token();
        let slot = Slot::new(self.conn, nickname.clone(), token.clone(), self.outbox.clone());

        match self.registry.create_room(slot).await {
            Ok((room_id, handle)) => {
                self.reply(ServerMessage::RoomCreated {
                    room_id: room_id.clone(),
                    nickname,
                    token,
                });
                self.seat = Some(Seat { room_id, handle });
            }
            Err(e) => self.reply_error(e),
        }
    }

    async fn join_room(&mut self, requested: &str, nickname: Option<String>) {
        self.leave().await;

        let room_id = normalize_room_code(requested);
        let nickname = clean_nickname(nickname);
        let token = generate_token();
        let slot = Slot::new(self.conn, nickname.clone(), token.clone(), self.outbox.clone());

        let (handle, index) = match self.registry.join_room(&room_id, slot).await {
            Ok(joined) => joined,
            Err(e) => {
                self.reply_error(e);
                return;
            }
        };

        {
            let mut room = handle.lock().await;
            let players = room.nicknames();
            room.send_to(
                index,
                ServerMessage::RoomJoined {
                    room_id: room_id.clone(),
                    player_index: index,
                    players: players.clone(),
                    token,
                },
            );
            room.send_to_other(index, ServerMessage::OpponentJoined { nickname, players });
            if room.is_full() {
                start_countdown(&handle, &mut room, self.registry.config());
            }
        }

        self.seat = Some(Seat { room_id, handle });
    }

    async fn rematch(&mut self) {
        let Some(seat) = &self.seat else {
            return;
        };
        let mut room = seat.handle.lock().await;
        let Some(index) = room.slot_of(self.conn) else {
            return;
        };
        if room.request_rematch(index) == RematchVote::Ready {
            start_countdown(&seat.handle, &mut room, self.registry.config());
        }
    }

    async fn leave(&mut self) {
        if let Some(seat) = self.seat.take() {
            self.registry.leave(&seat.room_id, self.conn).await;
        }
    }

    async fn reconnect(&mut self, token: &str) {
        let (room_id, handle) = match self.registry.find_by_token(token).await {
            Ok(found) => found,
            Err(e) => {
                self.reply_error(e);
                return;
            }
        };

        if self.seat.as_ref().is_some_and(|s| s.room_id != room_id) {
            self.leave().await;
        }

        {
            let mut room = handle.lock().await;
            let Some(index) = room.slot_by_token(token) else {
                drop(room);
                self.reply_error(LobbyError::UnknownToken);
                return;
            };
            room.reattach(index, self.conn, self.outbox.clone());
            room.send_to(
                index,
                ServerMessage::Reconnected {
                    room_id: room_id.clone(),
                    player_index: index,
                    players: room.nicknames(),
                    state: room.state().map(serialize),
                },
            );
            // Anyone who missed the final whistle still needs the result.
            if let Some(result) = room.result() {
                room.send_to(index, result);
            }
            info!("Client {} reclaimed slot {} in room {}", self.conn, index, room_id);
        }

        self.seat = Some(Seat { room_id, handle });
    }

    /// Socket closed. A seat in a live match is held for a reconnect;
    /// anywhere else the player simply leaves.
    pub async fn on_close(&mut self) {
        let Some(seat) = self.seat.take() else {
            return;
        };

        {
            let mut room = seat.handle.lock().await;
            let Some(index) = room.slot_of(self.conn) else {
                return;
            };
            if matches!(room.phase(), RoomPhase::Countdown | RoomPhase::Running) {
                room.disconnect(index);
                let timeout = self.registry.config().reconnect_timeout;
                let registry = Arc::clone(&self.registry);
                let room_id = seat.room_id.clone();
                if let Some(slot) = room.slot_mut(index) {
                    let token = slot.token.clone();
                    slot.reclaim.cancel();
                    slot.reclaim = ScheduledTask::spawn(async move {
                        sleep(timeout).await;
                        if registry.expire(&room_id, &token).await {
                            info!("Reconnect window for room {} expired", room_id);
                        }
                    });
                }
                return;
            }
        }

        self.registry.leave(&seat.room_id, self.conn).await;
    }
}
