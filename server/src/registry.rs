//! Lobby bookkeeping: which rooms exist and who sits where.
//!
//! Lock order is always registry first, then room. Code holding a room lock
//! must never wait on the registry.

use crate::config::ServerConfig;
use crate::room::{ConnectionId, Room, RoomHandle, RoomPhase, Slot};
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

const TOKEN_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LobbyError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Game already in progress")]
    MatchInProgress,
    #[error("Server is full, try again later")]
    AtCapacity,
    #[error("Session expired")]
    UnknownToken,
}

/// Random reconnect token handed to each seated player.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn generate_room_code() -> String {
    rand::thread_rng().gen_range(1000..10000).to_string()
}

pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, RoomHandle>>,
    config: Arc<ServerConfig>,
}

impl RoomRegistry {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Opens a room with a fresh code and seats `host` in slot 0.
    pub async fn create_room(&self, host: Slot) -> Result<(String, RoomHandle), LobbyError> {
        let mut rooms = self.rooms.write().await;
        if rooms.len() >= self.config.max_rooms {
            return Err(LobbyError::AtCapacity);
        }

        let mut code = generate_room_code();
        while rooms.contains_key(&code) {
            code = generate_room_code();
        }

        let mut room = Room::new(code.clone());
        room.seat(host);
        let handle = Arc::new(Mutex::new(room));
        rooms.insert(code.clone(), Arc::clone(&handle));
        info!("Room {} created ({} open)", code, rooms.len());

        Ok((code, handle))
    }

    /// Seats `guest` in an existing room.
    pub async fn join_room(
        &self,
        room_id: &str,
        guest: Slot,
    ) -> Result<(RoomHandle, usize), LobbyError> {
        // Held until seated so the room cannot be closed in between.
        let rooms = self.rooms.read().await;
        let handle = rooms.get(room_id).cloned().ok_or(LobbyError::RoomNotFound)?;
        let mut room = handle.lock().await;
        if room.is_full() {
            return Err(LobbyError::RoomFull);
        }
        if room.phase() != RoomPhase::Waiting {
            return Err(LobbyError::MatchInProgress);
        }
        let index = room.seat(guest).ok_or(LobbyError::RoomFull)?;
        drop(room);
        drop(rooms);
        Ok((handle, index))
    }

    /// Finds the room holding a seat for `token`.
    pub async fn find_by_token(&self, token: &str) -> Result<(String, RoomHandle), LobbyError> {
        let rooms = self.rooms.read().await;
        for (id, handle) in rooms.iter() {
            if handle.lock().await.slot_by_token(token).is_some() {
                return Ok((id.clone(), Arc::clone(handle)));
            }
        }
        Err(LobbyError::UnknownToken)
    }

    /// Removes the seat held by `conn`, as on an explicit leave.
    pub async fn leave(&self, room_id: &str, conn: ConnectionId) -> bool {
        self.vacate_where(room_id, |room| room.slot_of(conn)).await
    }

    /// Removes a seat whose reconnect window ran out. Seats that were
    /// reclaimed in the meantime are left alone.
    pub async fn expire(&self, room_id: &str, token: &str) -> bool {
        self.vacate_where(room_id, |room| {
            room.slot_by_token(token)
                .filter(|&i| room.slot(i).is_some_and(|s| !s.connected))
        })
        .await
    }

    async fn vacate_where<F>(&self, room_id: &str, find: F) -> bool
    where
        F: FnOnce(&Room) -> Option<usize>,
    {
        let mut rooms = self.rooms.write().await;
        let Some(handle) = rooms.get(room_id).cloned() else {
            return false;
        };
        let mut room = handle.lock().await;
        let Some(index) = find(&room) else {
            return false;
        };

        if let Some(mut slot) = room.vacate(index) {
            // Expiry runs inside the reclaim task itself.
            slot.reclaim.release();
        }

        if room.connected_count() == 0 {
            room.stop_timers();
            room.clear_slots();
            drop(room);
            rooms.remove(room_id);
            info!("Room {} closed ({} open)", room_id, rooms.len());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ServerMessage;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn registry(max_rooms: usize) -> RoomRegistry {
        RoomRegistry::new(Arc::new(ServerConfig {
            max_rooms,
            ..ServerConfig::default()
        }))
    }

    fn slot(conn: ConnectionId, name: &str) -> (Slot, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Slot::new(conn, name.to_string(), generate_token(), tx), rx)
    }

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token());
    }

    #[tokio::test]
    async fn test_create_and_join() {
        let registry = registry(4);
        let (host, _rx1) = slot(1, "Ann");
        let (code, _) = registry.create_room(host).await.unwrap();
        assert_eq!(code.len(), 4);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let (guest, _rx2) = slot(2, "Bob");
        let (handle, index) = registry.join_room(&code, guest).await.unwrap();
        assert_eq!(index, 1);
        assert!(handle.lock().await.is_full());

        let (third, _rx3) = slot(3, "Cid");
        assert_eq!(
            registry.join_room(&code, third).await.unwrap_err(),
            LobbyError::RoomFull
        );
        let (fourth, _rx4) = slot(4, "Dee");
        assert_eq!(
            registry.join_room("0000", fourth).await.unwrap_err(),
            LobbyError::RoomNotFound
        );
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let registry = registry(1);
        let (a, _rx1) = slot(1, "Ann");
        registry.create_room(a).await.unwrap();
        let (b, _rx2) = slot(2, "Bob");
        assert_eq!(
            registry.create_room(b).await.unwrap_err(),
            LobbyError::AtCapacity
        );
    }

    #[tokio::test]
    async fn test_join_running_room_refused() {
        let registry = registry(4);
        let (host, _rx1) = slot(1, "Ann");
        let (code, handle) = registry.create_room(host).await.unwrap();
        handle.lock().await.begin_match();

        let (guest, _rx2) = slot(2, "Bob");
        assert_eq!(
            registry.join_room(&code, guest).await.unwrap_err(),
            LobbyError::MatchInProgress
        );
    }

    #[tokio::test]
    async fn test_last_leave_closes_room() {
        let registry = registry(4);
        let (host, _rx1) = slot(1, "Ann");
        let (code, _) = registry.create_room(host).await.unwrap();
        let (guest, mut rx2) = slot(2, "Bob");
        registry.join_room(&code, guest).await.unwrap();

        assert!(registry.leave(&code, 1).await);
        assert_eq!(rx2.try_recv().unwrap(), ServerMessage::OpponentLeft);
        assert_eq!(registry.room_count().await, 1);

        assert!(registry.leave(&code, 2).await);
        assert_eq!(registry.room_count().await, 0);
        assert!(!registry.leave(&code, 2).await);
    }

    #[tokio::test]
    async fn test_expire_skips_reconnected_seat() {
        let registry = registry(4);
        let (host, _rx1) = slot(1, "Ann");
        let token = host.token.clone();
        let (code, handle) = registry.create_room(host).await.unwrap();
        let (guest, _rx2) = slot(2, "Bob");
        registry.join_room(&code, guest).await.unwrap();

        assert!(!registry.expire(&code, &token).await);

        handle.lock().await.disconnect(0);
        let (found, _) = registry.find_by_token(&token).await.unwrap();
        assert_eq!(found, code);

        assert!(registry.expire(&code, &token).await);
        assert_eq!(
            registry.find_by_token(&token).await.unwrap_err(),
            LobbyError::UnknownToken
        );
    }

    #[test]
    fn test_lookup_failures() {
        let registry = registry(1);
        tokio_test::block_on(async {
            let (guest, _rx) = slot(1, "Ann");
            assert_eq!(
                registry.join_room("1234", guest).await.unwrap_err(),
                LobbyError::RoomNotFound
            );
            assert_eq!(
                registry.find_by_token("nope").await.unwrap_err(),
                LobbyError::UnknownToken
            );
            assert!(!registry.expire("1234", "nope").await);
        });
    }

    #[tokio::test]
    async fn test_room_cannot_close_while_join_waits() {
        let registry = Arc::new(registry(4));
        let (host, _rx1) = slot(1, "Ann");
        let (code, handle) = registry.create_room(host).await.unwrap();

        let room = handle.lock().await;
        let joining = {
            let registry = Arc::clone(&registry);
            let code = code.clone();
            tokio::spawn(async move {
                let (guest, _rx2) = slot(2, "Bob");
                registry.join_room(&code, guest).await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // A leave needs the write lock, which the waiting join still blocks.
        let write = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            registry.rooms.write(),
        )
        .await;
        assert!(write.is_err());

        drop(room);
        let (joined, index) = joining.await.unwrap().unwrap();
        assert_eq!(index, 1);

        assert!(registry.leave(&code, 1).await);
        let open = registry.get(&code).await.unwrap();
        assert!(Arc::ptr_eq(&open, &joined));
    }
}
