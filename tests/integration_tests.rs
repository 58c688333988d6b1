//! Integration tests for networked multiplayer components
//!
//! These tests run a real server on a loopback port and drive it with
//! WebSocket clients, then check that prediction on the client agrees with
//! the authoritative simulation.

use futures_util::{SinkExt, StreamExt};
use server::config::ServerConfig;
use server::network::Server;
use shared::constants::{FIXED_DT, P1_SPAWN_X, TICKS_PER_SNAPSHOT};
use shared::{ClientMessage, Keys, ServerMessage};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

/// Loopback server with a one-step countdown.
fn test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        countdown: 1,
        countdown_interval: Duration::from_millis(50),
        reconnect_timeout: Duration::from_secs(5),
        ..ServerConfig::default()
    }
}

async fn start_server() -> SocketAddr {
    start_server_with(test_config()).await
}

async fn start_server_with(config: ServerConfig) -> SocketAddr {
    let server = Server::bind(config).await.expect("Failed to bind server");
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{}", addr))
            .await
            .expect("Failed to connect");
        Self { ws }
    }

    async fn send(&mut self, message: ClientMessage) {
        let text = message.to_json().unwrap();
        self.ws.send(Message::text(text)).await.unwrap();
    }

    async fn send_raw(&mut self, text: &str) {
        self.ws.send(Message::text(text.to_string())).await.unwrap();
    }

    async fn recv(&mut self) -> ServerMessage {
        loop {
            let frame = timeout(WAIT, self.ws.next())
                .await
                .expect("Timed out waiting for server message")
                .expect("Connection closed")
                .expect("Read error");
            if let Message::Text(text) = frame {
                return ServerMessage::from_json(text.as_str()).unwrap();
            }
        }
    }

    /// Skips messages until one matches.
    async fn recv_until<F>(&mut self, mut matches: F) -> ServerMessage
    where
        F: FnMut(&ServerMessage) -> bool,
    {
        loop {
            let message = self.recv().await;
            if matches(&message) {
                return message;
            }
        }
    }

    async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Two clients seated in the same room.
struct Pair {
    host: TestClient,
    guest: TestClient,
    room_id: String,
    host_token: String,
    guest_token: String,
}

async fn seat_pair(addr: SocketAddr) -> Pair {
    let mut host = TestClient::connect(addr).await;
    host.send(ClientMessage::CreateRoom {
        nickname: Some("Ann".to_string()),
    })
    .await;
    let (room_id, host_token) = match host.recv().await {
        ServerMessage::RoomCreated {
            room_id,
            nickname,
            token,
        } => {
            assert_eq!(nickname, "Ann");
            (room_id, token)
        }
        other => panic!("Expected room_created, got {:?}", other),
    };

    let mut guest = TestClient::connect(addr).await;
    guest
        .send(ClientMessage::JoinRoom {
            room_id: room_id.clone(),
            nickname: Some("Bob".to_string()),
        })
        .await;
    let guest_token = match guest.recv().await {
        ServerMessage::RoomJoined {
            room_id: joined,
            player_index,
            players,
            token,
        } => {
            assert_eq!(joined, room_id);
            assert_eq!(player_index, 1);
            assert_eq!(players, vec!["Ann".to_string(), "Bob".to_string()]);
            token
        }
        other => panic!("Expected room_joined, got {:?}", other),
    };

    Pair {
        host,
        guest,
        room_id,
        host_token,
        guest_token,
    }
}

async fn wait_for_kickoff(client: &mut TestClient) {
    client
        .recv_until(|m| matches!(m, ServerMessage::GameStart { .. }))
        .await;
}

/// LOBBY TESTS
mod lobby_tests {
    use super::*;

    /// Tests the full create, join, countdown and kick-off sequence
    #[tokio::test]
    async fn create_join_and_kick_off() {
        let addr = start_server().await;
        let mut pair = seat_pair(addr).await;

        match pair.host.recv().await {
            ServerMessage::OpponentJoined { nickname, players } => {
                assert_eq!(nickname, "Bob");
                assert_eq!(players.len(), 2);
            }
            other => panic!("Expected opponent_joined, got {:?}", other),
        }

        for client in [&mut pair.host, &mut pair.guest] {
            assert_eq!(client.recv().await, ServerMessage::Countdown { count: 1 });
            match client.recv().await {
                ServerMessage::GameStart { state, players } => {
                    assert_eq!(players, vec!["Ann".to_string(), "Bob".to_string()]);
                    assert_eq!(state.s, [0, 0]);
                    assert_eq!(state.p[0].x, P1_SPAWN_X);
                }
                other => panic!("Expected game_start, got {:?}", other),
            }
        }

        match pair.guest.recv().await {
            ServerMessage::Snapshot { you, last_seq, .. } => {
                assert_eq!(you, 1);
                assert_eq!(last_seq, 0);
            }
            other => panic!("Expected snapshot, got {:?}", other),
        }
        assert_ne!(pair.host_token, pair.guest_token);
    }

    /// Tests that unknown room codes are rejected with a readable error
    #[tokio::test]
    async fn join_unknown_room() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;
        client
            .send(ClientMessage::JoinRoom {
                room_id: "0000".to_string(),
                nickname: None,
            })
            .await;
        assert_eq!(
            client.recv().await,
            ServerMessage::Error {
                message: "Room not found".to_string()
            }
        );
    }

    /// Tests that a third player cannot take a seat
    #[tokio::test]
    async fn third_player_is_refused() {
        let addr = start_server().await;
        let pair = seat_pair(addr).await;

        let mut late = TestClient::connect(addr).await;
        late.send(ClientMessage::JoinRoom {
            room_id: pair.room_id.clone(),
            nickname: Some("Cat".to_string()),
        })
        .await;
        assert!(matches!(late.recv().await, ServerMessage::Error { .. }));
    }

    /// Tests that garbage frames are dropped without closing the connection
    #[tokio::test]
    async fn malformed_messages_are_ignored() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;

        client.send_raw("not json").await;
        client.send_raw(r#"{"type":"teleport","x":5}"#).await;
        client.send_raw(r#"{"type":"input","seq":"one"}"#).await;

        client.send(ClientMessage::CreateRoom { nickname: None }).await;
        match client.recv().await {
            ServerMessage::RoomCreated { nickname, .. } => assert_eq!(nickname, "Player"),
            other => panic!("Expected room_created, got {:?}", other),
        }
    }
}

/// MATCH TESTS
mod match_tests {
    use super::*;

    /// Tests that inputs move the player and are acknowledged via lastSeq
    #[tokio::test]
    async fn inputs_are_applied_and_acknowledged() {
        let addr = start_server().await;
        let mut pair = seat_pair(addr).await;
        wait_for_kickoff(&mut pair.host).await;

        let right = Keys {
            right: true,
            ..Keys::NONE
        };
        let sends = 30;
        for seq in 1..=sends {
            pair.host.send(ClientMessage::Input { seq, keys: right }).await;
            sleep(Duration::from_secs_f32(FIXED_DT)).await;
        }

        let snapshot = pair
            .host
            .recv_until(|m| {
                matches!(m, ServerMessage::Snapshot { last_seq, .. } if *last_seq == sends)
            })
            .await;
        match snapshot {
            ServerMessage::Snapshot { state, you, .. } => {
                assert_eq!(you, 0);
                assert!(state.p[0].x > P1_SPAWN_X + 10.0, "x = {}", state.p[0].x);
                assert!(state.t < 60.0);
            }
            _ => unreachable!(),
        }
    }

    /// Tests that snapshots arrive at roughly the configured rate
    #[tokio::test]
    async fn snapshots_advance_the_tick() {
        let addr = start_server().await;
        let mut pair = seat_pair(addr).await;
        wait_for_kickoff(&mut pair.guest).await;

        let mut ticks = Vec::new();
        while ticks.len() < 5 {
            if let ServerMessage::Snapshot { tick, .. } = pair.guest.recv().await {
                ticks.push(tick);
            }
        }
        for pair in ticks.windows(2) {
            assert_eq!(pair[1] - pair[0], u64::from(TICKS_PER_SNAPSHOT));
        }
    }

    /// Tests that a rematch request mid-match is ignored
    #[tokio::test]
    async fn rematch_before_game_over_is_ignored() {
        let addr = start_server().await;
        let mut pair = seat_pair(addr).await;
        wait_for_kickoff(&mut pair.host).await;

        pair.guest.send(ClientMessage::Rematch).await;
        for _ in 0..10 {
            let message = pair.host.recv().await;
            assert!(
                !matches!(message, ServerMessage::RematchRequest { .. }),
                "Unexpected {:?}",
                message
            );
        }
    }

    /// Tests that an explicit leave notifies the opponent
    #[tokio::test]
    async fn leave_notifies_opponent() {
        let addr = start_server().await;
        let mut pair = seat_pair(addr).await;
        wait_for_kickoff(&mut pair.host).await;

        pair.guest.send(ClientMessage::Leave).await;
        pair.host
            .recv_until(|m| *m == ServerMessage::OpponentLeft)
            .await;

        // The room is open again for a new guest
        let mut next = TestClient::connect(addr).await;
        next.send(ClientMessage::JoinRoom {
            room_id: pair.room_id.clone(),
            nickname: Some("Cat".to_string()),
        })
        .await;
        match next.recv().await {
            ServerMessage::RoomJoined { player_index, .. } => assert_eq!(player_index, 1),
            other => panic!("Expected room_joined, got {:?}", other),
        }
    }
}

/// RECONNECT TESTS
mod reconnect_tests {
    use super::*;
    use client::app::{ClientConfig, Lobby};
    use client::game::{ClientGame, MatchPhase};
    use client::network::NetworkEvent;

    /// Tests reclaiming a seat with the session token after a drop
    #[tokio::test]
    async fn reconnect_with_token() {
        let addr = start_server().await;
        let Pair {
            mut host,
            mut guest,
            room_id,
            guest_token,
            ..
        } = seat_pair(addr).await;
        wait_for_kickoff(&mut guest).await;

        guest.close().await;
        host.recv_until(|m| *m == ServerMessage::OpponentDisconnected)
            .await;

        let mut back = TestClient::connect(addr).await;
        back.send(ClientMessage::Reconnect { token: guest_token })
            .await;
        match back.recv().await {
            ServerMessage::Reconnected {
                room_id: rejoined,
                player_index,
                players,
                state,
            } => {
                assert_eq!(rejoined, room_id);
                assert_eq!(player_index, 1);
                assert_eq!(players.len(), 2);
                assert!(state.is_some());
            }
            other => panic!("Expected reconnected, got {:?}", other),
        }
        host.recv_until(|m| *m == ServerMessage::OpponentReconnected)
            .await;

        match back
            .recv_until(|m| matches!(m, ServerMessage::Snapshot { .. }))
            .await
        {
            ServerMessage::Snapshot { you, .. } => assert_eq!(you, 1),
            _ => unreachable!(),
        }
    }

    /// Tests that the seat is released once the reconnect window passes
    #[tokio::test]
    async fn reconnect_window_expires() {
        let addr = start_server_with(ServerConfig {
            reconnect_timeout: Duration::from_millis(200),
            ..test_config()
        })
        .await;
        let Pair {
            mut host,
            mut guest,
            guest_token,
            ..
        } = seat_pair(addr).await;
        wait_for_kickoff(&mut guest).await;

        guest.close().await;
        host.recv_until(|m| *m == ServerMessage::OpponentLeft).await;

        let mut late = TestClient::connect(addr).await;
        late.send(ClientMessage::Reconnect { token: guest_token })
            .await;
        assert_eq!(
            late.recv().await,
            ServerMessage::Error {
                message: "Session expired".to_string()
            }
        );
    }

    /// Tests that a player who missed the final whistle gets the result
    /// on return and can vote for a rematch
    #[tokio::test]
    async fn reconnect_after_game_over() {
        let addr = start_server_with(ServerConfig {
            match_duration: 0.5,
            ..test_config()
        })
        .await;
        let Pair {
            mut host,
            mut guest,
            guest_token,
            ..
        } = seat_pair(addr).await;
        wait_for_kickoff(&mut guest).await;

        guest.close().await;
        host.recv_until(|m| *m == ServerMessage::OpponentDisconnected)
            .await;
        host.recv_until(|m| matches!(m, ServerMessage::GameOver { .. }))
            .await;

        let mut back = TestClient::connect(addr).await;
        back.send(ClientMessage::Reconnect { token: guest_token })
            .await;
        let reconnected = back.recv().await;
        assert!(matches!(
            &reconnected,
            ServerMessage::Reconnected { player_index: 1, .. }
        ));
        let result = back.recv().await;
        assert_eq!(
            result,
            ServerMessage::GameOver {
                score: [0, 0],
                winner: -1
            }
        );

        let mut game = ClientGame::new();
        let mut lobby = Lobby::new(ClientConfig {
            server: addr.to_string(),
            nickname: Some("Bob".to_string()),
            join: None,
            fake_ping_ms: 0,
        });
        for message in [reconnected, result] {
            lobby.handle(NetworkEvent::Message(message), &mut game, 0.0);
        }
        assert_eq!(game.phase(), MatchPhase::Ended);
        assert_eq!(lobby.result, Some(-1));

        back.send(ClientMessage::Rematch).await;
        host.recv_until(|m| *m == ServerMessage::RematchRequest { from: 1 })
            .await;
    }

    /// Tests that an unknown token is refused
    #[tokio::test]
    async fn unknown_token_is_refused() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;
        client
            .send(ClientMessage::Reconnect {
                token: "nope".to_string(),
            })
            .await;
        assert!(matches!(client.recv().await, ServerMessage::Error { .. }));
    }
}

/// PREDICTION TESTS
mod prediction_tests {
    use assert_approx_eq::assert_approx_eq;
    use client::game::{ClientGame, MatchPhase};
    use shared::physics::{apply_input, step};
    use shared::{serialize, GameState, Keys};

    const FRAME_MS: f64 = 1000.0 / 60.0;

    /// Runs the client for `frames` frames and replays its inputs on an
    /// authoritative state, the way the server would.
    fn run_both(frames: usize, keys: Keys) -> (ClientGame, GameState, u32) {
        let mut server = GameState::new();
        let mut game = ClientGame::new();
        game.start(&serialize(&server), 0, 0.0);

        let mut last_seq = 0;
        for frame in 1..=frames {
            for input in game.frame(frame as f64 * FRAME_MS, keys) {
                apply_input(&mut server.players[0], &input.keys, shared::constants::FIXED_DT);
                step(&mut server, shared::constants::FIXED_DT);
                last_seq = input.seq;
            }
        }
        (game, server, last_seq)
    }

    /// Tests that a fully acknowledged prediction agrees with the server
    #[test]
    fn prediction_matches_authority() {
        let keys = Keys {
            right: true,
            ..Keys::NONE
        };
        let (mut game, server, last_seq) = run_both(30, keys);
        assert!(last_seq > 20);

        let predicted_x = game.state().players[0].x;
        assert_approx_eq!(predicted_x, server.players[0].x, 0.5);

        game.on_snapshot(last_seq, &serialize(&server), 30.0 * FRAME_MS);
        assert_eq!(game.pending_len(), 0);
        // Within the dead zone, so nothing is corrected
        assert_eq!(game.state().players[0].x, predicted_x);
    }

    /// Tests that unacknowledged inputs survive a stale snapshot
    #[test]
    fn stale_snapshot_keeps_pending_inputs() {
        let keys = Keys {
            left: true,
            ..Keys::NONE
        };
        let (mut game, _, last_seq) = run_both(20, keys);
        let before = game.pending_len();
        assert_eq!(before as u32, last_seq);

        game.on_snapshot(5, &serialize(&GameState::new()), 20.0 * FRAME_MS);
        assert_eq!(game.pending_len(), before - 5);
        assert_eq!(game.phase(), MatchPhase::Running);
    }
}
