use crate::physics::Keys;
use crate::snapshot::WireState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
    },
    JoinRoom {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
    },
    Input {
        seq: u32,
        #[serde(default)]
        keys: Keys,
    },
    Rematch,
    Leave,
    Reconnect {
        token: String,
    },
}

// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated {
        #[serde(rename = "roomId")]
        room_id: String,
        nickname: String,
        token: String,
    },
    RoomJoined {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "playerIndex")]
        player_index: usize,
        players: Vec<String>,
        token: String,
    },
    OpponentJoined {
        nickname: String,
        players: Vec<String>,
    },
    Countdown {
        count: u32,
    },
    GameStart {
        state: WireState,
        players: Vec<String>,
    },
    Snapshot {
        tick: u64,
        #[serde(rename = "lastSeq")]
        last_seq: u32,
        state: WireState,
        you: usize,
    },
    Goal {
        scorer: usize,
        score: [u32; 2],
    },
    GameOver {
        score: [u32; 2],
        /// Winning slot, or -1 for a draw.
        winner: i8,
    },
    RematchRequest {
        from: usize,
    },
    OpponentLeft,
    OpponentDisconnected,
    OpponentReconnected,
    Reconnected {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "playerIndex")]
        player_index: usize,
        players: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<WireState>,
    },
    Error {
        message: String,
    },
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerMessage {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
