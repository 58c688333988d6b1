//! Compact wire form of [`GameState`].
//!
//! Field names are single letters to keep snapshots small on the wire.
//! Timers are not transmitted; they are rebuilt from the flags on receipt.

use crate::constants::{GOAL_PAUSE_DURATION, KICK_DURATION};
use crate::physics::{Ball, GameState, Player};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePlayer {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub f: i8,
    pub k: u8,
    pub g: u8,
    pub kb: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireBall {
    pub x: f32,
    pub y: f32,
    pub vx: i32,
    pub vy: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireState {
    pub p: [WirePlayer; 2],
    pub b: WireBall,
    pub s: [u32; 2],
    pub t: f32,
    pub pa: u8,
}

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

fn flag(b: bool) -> u8 {
    u8::from(b)
}

fn wire_player(p: &Player) -> WirePlayer {
    WirePlayer {
        x: round1(p.x),
        y: round1(p.y),
        vx: round1(p.vx),
        vy: round1(p.vy),
        f: p.facing,
        k: flag(p.is_kicking),
        g: flag(p.on_ground),
        kb: flag(p.knockback),
    }
}

fn player_from_wire(w: &WirePlayer, player_num: u8) -> Player {
    let is_kicking = w.k != 0;
    Player {
        x: w.x,
        y: w.y,
        vx: w.vx,
        vy: w.vy,
        facing: if w.f < 0 { -1 } else { 1 },
        is_kicking,
        kick_timer: if is_kicking { KICK_DURATION } else { 0.0 },
        on_ground: w.g != 0,
        knockback: w.kb != 0,
        player_num,
    }
}

/// Encodes the state for a snapshot or `game_start` message.
pub fn serialize(state: &GameState) -> WireState {
    let ball = &state.ball;
    WireState {
        p: [wire_player(&state.players[0]), wire_player(&state.players[1])],
        b: WireBall {
            x: round1(ball.x),
            y: round1(ball.y),
            vx: ball.vx.round() as i32,
            vy: ball.vy.round() as i32,
        },
        s: state.score,
        t: round1(state.time_left),
        pa: flag(state.paused),
    }
}

/// Rebuilds a full state. Kick and pause timers come back at their full
/// length whenever the matching flag is set.
pub fn deserialize(wire: &WireState) -> GameState {
    let paused = wire.pa != 0;
    GameState {
        players: [
            player_from_wire(&wire.p[0], 1),
            player_from_wire(&wire.p[1], 2),
        ],
        ball: Ball {
            x: wire.b.x,
            y: wire.b.y,
            vx: wire.b.vx as f32,
            vy: wire.b.vy as f32,
        },
        score: wire.s,
        time_left: wire.t,
        paused,
        pause_timer: if paused { GOAL_PAUSE_DURATION } else { 0.0 },
    }
}
