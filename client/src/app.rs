//! Top-level client: lobby flow, reconnects and the per-frame loop.

use crate::game::{ClientGame, MatchPhase};
use crate::input::InputManager;
use crate::network::{NetworkClient, NetworkEvent};
use crate::rendering::{Hud, Renderer};
use log::{info, warn};
use macroquad::prelude::next_frame;
use shared::{ClientMessage, ServerMessage};
use std::time::Instant;

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const GOAL_BANNER_MS: f64 = 1500.0;

/// Settings from the command line.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub nickname: Option<String>,
    /// Room code to join instead of creating a room.
    pub join: Option<String>,
    pub fake_ping_ms: u64,
}

/// Back-off before reconnect attempt `attempt` (1-based), in milliseconds.
pub fn reconnect_delay_ms(attempt: u32) -> f64 {
    f64::from((1000 * attempt).min(5000))
}

/// Lobby-level state driven by server events, kept apart from the window
/// and socket so it can be exercised directly.
#[derive(Debug)]
pub struct Lobby {
    config: ClientConfig,
    pub room_id: Option<String>,
    pub my_index: usize,
    pub players: Vec<String>,
    token: Option<String>,
    pub status: String,
    pub countdown: Option<u32>,
    pub banner: Option<(String, f64)>,
    pub result: Option<i8>,
    reconnect_attempts: u32,
    reconnect_at: Option<f64>,
    connected: bool,
    /// A `reconnect` is in flight and its answer not yet seen.
    reclaiming: bool,
}

impl Lobby {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            room_id: None,
            my_index: 0,
            players: Vec::new(),
            token: None,
            status: "Connecting...".to_string(),
            countdown: None,
            banner: None,
            result: None,
            reconnect_attempts: 0,
            reconnect_at: None,
            connected: false,
            reclaiming: false,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Applies one network event; returns messages to send back.
    pub fn handle(
        &mut self,
        event: NetworkEvent,
        game: &mut ClientGame,
        now_ms: f64,
    ) -> Vec<ClientMessage> {
        match event {
            NetworkEvent::Connected => {
                self.connected = true;
                self.reconnect_attempts = 0;
                self.reconnect_at = None;
                let opening = self.opening_message();
                self.reclaiming = matches!(opening, ClientMessage::Reconnect { .. });
                vec![opening]
            }
            NetworkEvent::Disconnected(reason) => {
                self.connected = false;
                self.schedule_reconnect(&reason, now_ms);
                Vec::new()
            }
            NetworkEvent::Message(message) => self.on_message(message, game, now_ms),
        }
    }

    fn opening_message(&self) -> ClientMessage {
        if let Some(token) = &self.token {
            return ClientMessage::Reconnect {
                token: token.clone(),
            };
        }
        match &self.config.join {
            Some(room_id) => ClientMessage::JoinRoom {
                room_id: room_id.clone(),
                nickname: self.config.nickname.clone(),
            },
            None => ClientMessage::CreateRoom {
                nickname: self.config.nickname.clone(),
            },
        }
    }

    fn schedule_reconnect(&mut self, reason: &str, now_ms: f64) {
        if self.token.is_none() || self.reconnect_attempts >= MAX_RECONNECT_ATTEMPTS {
            self.reconnect_at = None;
            self.status = format!("Disconnected: {}", reason);
            return;
        }
        self.reconnect_attempts += 1;
        self.reconnect_at = Some(now_ms + reconnect_delay_ms(self.reconnect_attempts));
        self.status = format!(
            "Connection lost, reconnecting ({}/{})...",
            self.reconnect_attempts, MAX_RECONNECT_ATTEMPTS
        );
        warn!("Connection lost ({}), retry {}", reason, self.reconnect_attempts);
    }

    /// True once when a scheduled reconnect is due.
    pub fn reconnect_due(&mut self, now_ms: f64) -> bool {
        match self.reconnect_at {
            Some(at) if now_ms >= at => {
                self.reconnect_at = None;
                true
            }
            _ => false,
        }
    }

    fn on_message(
        &mut self,
        message: ServerMessage,
        game: &mut ClientGame,
        now_ms: f64,
    ) -> Vec<ClientMessage> {
        match message {
            ServerMessage::RoomCreated {
                room_id,
                nickname,
                token,
            } => {
                info!("Created room {} as {}", room_id, nickname);
                self.status = format!("Room {}: waiting for an opponent", room_id);
                self.room_id = Some(room_id);
                self.my_index = 0;
                self.players = vec![nickname];
                self.token = Some(token);
            }
            ServerMessage::RoomJoined {
                room_id,
                player_index,
                players,
                token,
            } => {
                info!("Joined room {} as player {}", room_id, player_index + 1);
                self.status = format!("Joined room {}", room_id);
                self.room_id = Some(room_id);
                self.my_index = player_index;
                self.players = players;
                self.token = Some(token);
            }
            ServerMessage::OpponentJoined { nickname, players } => {
                self.status = format!("{} joined", nickname);
                self.players = players;
            }
            ServerMessage::Countdown { count } => {
                self.countdown = Some(count);
                self.result = None;
                game.stop();
            }
            ServerMessage::GameStart { state, players } => {
                self.countdown = None;
                self.result = None;
                self.players = players;
                self.status.clear();
                game.start(&state, self.my_index, now_ms);
            }
            ServerMessage::Snapshot {
                last_seq,
                state,
                you,
                ..
            } => {
                self.my_index = you;
                game.on_snapshot(last_seq, &state, now_ms);
            }
            ServerMessage::Goal { scorer, score } => {
                let who = self
                    .players
                    .get(scorer)
                    .cloned()
                    .unwrap_or_else(|| format!("Player {}", scorer + 1));
                self.banner = Some((format!("GOAL! {}", who), now_ms + GOAL_BANNER_MS));
                game.on_goal(score);
            }
            ServerMessage::GameOver { score, winner } => {
                self.result = Some(winner);
                self.status = "Press R for a rematch, Esc to leave".to_string();
                game.on_game_over(score);
            }
            ServerMessage::RematchRequest { from } => {
                if from != self.my_index {
                    self.status = "Opponent wants a rematch, press R".to_string();
                }
            }
            ServerMessage::OpponentLeft => {
                game.stop();
                self.countdown = None;
                self.result = None;
                self.players.truncate(1);
                self.status = "Opponent left, waiting for a new one".to_string();
            }
            ServerMessage::OpponentDisconnected => {
                self.status = "Opponent disconnected, waiting...".to_string();
            }
            ServerMessage::OpponentReconnected => {
                self.status.clear();
            }
            ServerMessage::Reconnected {
                room_id,
                player_index,
                players,
                state,
            } => {
                info!("Reconnected to room {}", room_id);
                self.reclaiming = false;
                self.room_id = Some(room_id);
                self.my_index = player_index;
                self.players = players;
                self.status.clear();
                if let Some(state) = state {
                    game.resume(&state, player_index, now_ms);
                }
            }
            ServerMessage::Error { message } => {
                warn!("Server error: {}", message);
                self.status = message;
                if self.reclaiming {
                    // The seat is gone; start over as a fresh player.
                    self.reclaiming = false;
                    self.token = None;
                    self.room_id = None;
                    game.stop();
                    return vec![self.opening_message()];
                }
            }
        }
        Vec::new()
    }

    /// Heads-up display for the current frame.
    pub fn hud(&self, game: &ClientGame, now_ms: f64) -> Hud {
        let banner = match &self.banner {
            Some((text, until)) if now_ms < *until => Some(text.clone()),
            _ => None,
        };
        let result = self.result.map(|winner| {
            if winner < 0 {
                "Draw!".to_string()
            } else if winner as usize == self.my_index {
                "You win!".to_string()
            } else {
                "You lose!".to_string()
            }
        });
        Hud {
            room_code: self.room_id.clone(),
            players: self.players.clone(),
            my_index: self.my_index,
            status: self.status.clone(),
            countdown: self.countdown,
            banner,
            result,
            playing: game.phase() != MatchPhase::Idle,
            fake_ping_ms: self.config.fake_ping_ms,
        }
    }
}

/// Owns the window loop and everything it drives.
pub struct Client {
    config: ClientConfig,
    network: NetworkClient,
    lobby: Lobby,
    game: ClientGame,
    input: InputManager,
    renderer: Renderer,
    clock: Instant,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        info!("Connecting to {}", config.server);
        let network = NetworkClient::connect(&config.server, config.fake_ping_ms);
        Self {
            lobby: Lobby::new(config.clone()),
            config,
            network,
            game: ClientGame::new(),
            input: InputManager::new(),
            renderer: Renderer::new(),
            clock: Instant::now(),
        }
    }

    fn now_ms(&self) -> f64 {
        self.clock.elapsed().as_secs_f64() * 1000.0
    }

    /// Runs until the player leaves with Esc.
    pub async fn run(&mut self) {
        loop {
            let now = self.now_ms();

            for event in self.network.poll() {
                for reply in self.lobby.handle(event, &mut self.game, now) {
                    self.network.send(reply);
                }
            }

            if self.lobby.reconnect_due(now) {
                self.network =
                    NetworkClient::connect(&self.config.server, self.config.fake_ping_ms);
            }

            let (keys, actions) = self.input.update();
            if actions.leave {
                self.network.send(ClientMessage::Leave);
                self.game.stop();
                break;
            }
            if actions.rematch && self.game.phase() == MatchPhase::Ended {
                self.network.send(ClientMessage::Rematch);
                self.lobby.status = "Waiting for opponent...".to_string();
            }

            for input in self.game.frame(now, keys) {
                self.network.send(ClientMessage::Input {
                    seq: input.seq,
                    keys: input.keys,
                });
            }

            let hud = self.lobby.hud(&self.game, now);
            self.renderer.render(self.game.state(), &hud);

            next_frame().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{serialize, GameState, Keys};

    fn config(join: Option<&str>) -> ClientConfig {
        ClientConfig {
            server: "127.0.0.1:8080".to_string(),
            nickname: Some("Ann".to_string()),
            join: join.map(str::to_string),
            fake_ping_ms: 0,
        }
    }

    fn created(lobby: &mut Lobby, game: &mut ClientGame) {
        lobby.handle(
            NetworkEvent::Message(ServerMessage::RoomCreated {
                room_id: "4821".to_string(),
                nickname: "Ann".to_string(),
                token: "tok".to_string(),
            }),
            game,
            0.0,
        );
    }

    #[test]
    fn test_backoff() {
        assert_eq!(reconnect_delay_ms(1), 1000.0);
        assert_eq!(reconnect_delay_ms(3), 3000.0);
        assert_eq!(reconnect_delay_ms(9), 5000.0);
    }

    #[test]
    fn test_opening_message() {
        let mut game = ClientGame::new();
        let mut host = Lobby::new(config(None));
        assert_eq!(
            host.handle(NetworkEvent::Connected, &mut game, 0.0),
            vec![ClientMessage::CreateRoom {
                nickname: Some("Ann".to_string())
            }]
        );

        let mut guest = Lobby::new(config(Some("4821")));
        assert!(matches!(
            guest.handle(NetworkEvent::Connected, &mut game, 0.0).as_slice(),
            [ClientMessage::JoinRoom { room_id, .. }] if room_id == "4821"
        ));
    }

    #[test]
    fn test_reconnect_cycle() {
        let mut game = ClientGame::new();
        let mut lobby = Lobby::new(config(None));
        lobby.handle(NetworkEvent::Connected, &mut game, 0.0);
        created(&mut lobby, &mut game);

        lobby.handle(NetworkEvent::Disconnected("reset".into()), &mut game, 100.0);
        assert!(!lobby.reconnect_due(1000.0));
        assert!(lobby.reconnect_due(1100.0));
        assert!(!lobby.reconnect_due(1200.0));

        assert_eq!(
            lobby.handle(NetworkEvent::Connected, &mut game, 1300.0),
            vec![ClientMessage::Reconnect {
                token: "tok".to_string()
            }]
        );
    }

    #[test]
    fn test_reconnect_gives_up() {
        let mut game = ClientGame::new();
        let mut lobby = Lobby::new(config(None));
        created(&mut lobby, &mut game);

        let mut now = 0.0;
        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            lobby.handle(NetworkEvent::Disconnected("down".into()), &mut game, now);
            now += reconnect_delay_ms(attempt);
            assert!(lobby.reconnect_due(now));
        }
        lobby.handle(NetworkEvent::Disconnected("down".into()), &mut game, now);
        assert!(!lobby.reconnect_due(now + 60_000.0));
        assert!(lobby.status.starts_with("Disconnected"));
    }

    #[test]
    fn test_no_reconnect_without_token() {
        let mut game = ClientGame::new();
        let mut lobby = Lobby::new(config(None));
        lobby.handle(NetworkEvent::Disconnected("refused".into()), &mut game, 0.0);
        assert!(!lobby.reconnect_due(10_000.0));
    }

    #[test]
    fn test_match_flow_drives_game() {
        let mut game = ClientGame::new();
        let mut lobby = Lobby::new(config(Some("4821")));
        lobby.handle(
            NetworkEvent::Message(ServerMessage::RoomJoined {
                room_id: "4821".into(),
                player_index: 1,
                players: vec!["Bob".into(), "Ann".into()],
                token: "tok".into(),
            }),
            &mut game,
            0.0,
        );
        lobby.handle(
            NetworkEvent::Message(ServerMessage::GameStart {
                state: serialize(&GameState::new()),
                players: vec!["Bob".into(), "Ann".into()],
            }),
            &mut game,
            0.0,
        );
        assert_eq!(game.phase(), MatchPhase::Running);
        assert_eq!(game.my_index(), 1);

        lobby.handle(
            NetworkEvent::Message(ServerMessage::Goal {
                scorer: 0,
                score: [1, 0],
            }),
            &mut game,
            10.0,
        );
        assert_eq!(lobby.hud(&game, 20.0).banner.as_deref(), Some("GOAL! Bob"));
        assert!(lobby.hud(&game, 5000.0).banner.is_none());

        lobby.handle(
            NetworkEvent::Message(ServerMessage::GameOver {
                score: [1, 0],
                winner: 0,
            }),
            &mut game,
            30.0,
        );
        assert_eq!(game.phase(), MatchPhase::Ended);
        assert_eq!(lobby.hud(&game, 40.0).result.as_deref(), Some("You lose!"));
    }

    #[test]
    fn test_rejected_token_starts_over() {
        let mut game = ClientGame::new();
        let mut lobby = Lobby::new(config(None));
        created(&mut lobby, &mut game);
        lobby.handle(NetworkEvent::Disconnected("x".into()), &mut game, 0.0);
        assert!(matches!(
            lobby.handle(NetworkEvent::Connected, &mut game, 1000.0).as_slice(),
            [ClientMessage::Reconnect { .. }]
        ));

        let replies = lobby.handle(
            NetworkEvent::Message(ServerMessage::Error {
                message: "Session expired".into(),
            }),
            &mut game,
            1010.0,
        );
        assert_eq!(
            replies,
            vec![ClientMessage::CreateRoom {
                nickname: Some("Ann".to_string())
            }]
        );
        assert!(lobby.token().is_none());
        assert!(lobby.room_id.is_none());
        assert_eq!(lobby.status, "Session expired");
    }

    #[test]
    fn test_other_errors_keep_session() {
        let mut game = ClientGame::new();
        let mut lobby = Lobby::new(config(None));
        created(&mut lobby, &mut game);

        let replies = lobby.handle(
            NetworkEvent::Message(ServerMessage::Error {
                message: "Room is full".into(),
            }),
            &mut game,
            10.0,
        );
        assert!(replies.is_empty());
        assert_eq!(lobby.token(), Some("tok"));
    }

    #[test]
    fn test_reconnect_into_finished_match() {
        let mut game = ClientGame::new();
        let mut lobby = Lobby::new(config(Some("4821")));
        let mut last = GameState::new();
        last.time_left = 0.0;
        last.score = [0, 2];

        for message in [
            ServerMessage::Reconnected {
                room_id: "4821".into(),
                player_index: 1,
                players: vec!["Ann".into(), "Bob".into()],
                state: Some(serialize(&last)),
            },
            ServerMessage::GameOver {
                score: [0, 2],
                winner: 1,
            },
        ] {
            lobby.handle(NetworkEvent::Message(message), &mut game, 0.0);
        }

        assert_eq!(game.phase(), MatchPhase::Ended);
        assert!(game.frame(100.0, Keys::NONE).is_empty());
        assert_eq!(game.state().score, [0, 2]);
        assert_eq!(lobby.hud(&game, 100.0).result.as_deref(), Some("You win!"));
    }
}
