//! Client-side match engine: prediction for the local player, server
//! reconciliation, and interpolation of everything else.
//!
//! The local player is simulated ahead of the server with the reduced step
//! ([`apply_input`] followed by [`integrate_player`]). Every input is kept
//! until the server acknowledges it through `lastSeq`; on each snapshot the
//! unacknowledged tail is replayed on top of the authoritative player and the
//! displayed position is blended toward the result.
//!
//! The opponent and the ball are drawn slightly in the past, interpolated
//! between the two buffered snapshots that bracket `now - INTERP_DELAY_MS`.

use log::debug;
use shared::constants::{
    CORRECTION_DEADZONE, CORRECTION_RATE, FIXED_DT, GOAL_PAUSE_DURATION, INPUT_BUFFER_LEN,
    INTERP_DELAY_MS, MAX_EXTRAPOLATION, MAX_FRAME_DT, REMOTE_EASE, SNAPSHOT_BUFFER_LEN,
    SNAP_DISTANCE,
};
use shared::physics::{apply_input, integrate_player, Ball, Player};
use shared::{deserialize, GameState, InputFrame, Keys, WireState};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Idle,
    Running,
    /// Running, but frozen after a goal.
    Paused,
    Ended,
}

#[derive(Debug, Clone)]
struct TimedSnapshot {
    received_ms: f64,
    state: GameState,
}

pub struct ClientGame {
    phase: MatchPhase,
    my_index: usize,
    state: GameState,
    accumulator: f32,
    last_frame_ms: f64,
    next_seq: u32,
    pending: VecDeque<InputFrame>,
    snapshots: VecDeque<TimedSnapshot>,
}

impl ClientGame {
    pub fn new() -> Self {
        Self {
            phase: MatchPhase::Idle,
            my_index: 0,
            state: GameState::new(),
            accumulator: 0.0,
            last_frame_ms: 0.0,
            next_seq: 1,
            pending: VecDeque::new(),
            snapshots: VecDeque::new(),
        }
    }

    /// Begins a new match from the server's initial state.
    pub fn start(&mut self, initial: &WireState, my_index: usize, now_ms: f64) {
        self.next_seq = 1;
        self.resume(initial, my_index, now_ms);
    }

    /// Picks a match back up after a reconnect, keeping the sequence counter.
    pub fn resume(&mut self, current: &WireState, my_index: usize, now_ms: f64) {
        self.phase = MatchPhase::Running;
        self.my_index = my_index.min(1);
        self.state = deserialize(current);
        self.accumulator = 0.0;
        self.last_frame_ms = now_ms;
        self.pending.clear();
        self.snapshots.clear();
    }

    /// Halts the engine. Later frames and server notifications are ignored
    /// until the next [`ClientGame::start`].
    pub fn stop(&mut self) {
        self.phase = MatchPhase::Idle;
        self.accumulator = 0.0;
        self.pending.clear();
        self.snapshots.clear();
    }

    pub fn phase(&self) -> MatchPhase {
        match self.phase {
            MatchPhase::Running if self.state.paused => MatchPhase::Paused,
            phase => phase,
        }
    }

    fn is_live(&self) -> bool {
        self.phase == MatchPhase::Running
    }

    /// Display state: predicted local player, interpolated opponent and ball.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn my_index(&self) -> usize {
        self.my_index
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Runs one rendered frame: catch-up fixed steps for the local player,
    /// then remote interpolation. Returns the inputs to send to the server.
    pub fn frame(&mut self, now_ms: f64, keys: Keys) -> Vec<InputFrame> {
        let mut sent = Vec::new();
        if !self.is_live() {
            return sent;
        }

        let elapsed = ((now_ms - self.last_frame_ms) / 1000.0).max(0.0) as f32;
        self.last_frame_ms = now_ms;
        self.accumulator += elapsed.min(MAX_FRAME_DT);

        while self.accumulator >= FIXED_DT {
            self.accumulator -= FIXED_DT;
            if let Some(input) = self.tick(keys) {
                sent.push(input);
            }
        }

        self.update_remote(now_ms);
        sent
    }

    fn tick(&mut self, keys: Keys) -> Option<InputFrame> {
        if self.state.paused {
            return None;
        }

        let input = InputFrame {
            seq: self.next_seq,
            keys,
        };
        self.next_seq += 1;

        self.pending.push_back(input);
        while self.pending.len() > INPUT_BUFFER_LEN {
            self.pending.pop_front();
        }

        let me = &mut self.state.players[self.my_index];
        apply_input(me, &keys, FIXED_DT);
        integrate_player(me, FIXED_DT);

        Some(input)
    }

    /// Applies an authoritative snapshot: match clock and score are taken as
    /// is, the local player is reconciled, and the state is buffered for
    /// interpolation.
    pub fn on_snapshot(&mut self, last_seq: u32, wire: &WireState, now_ms: f64) {
        if !self.is_live() {
            return;
        }

        let server = deserialize(wire);
        self.state.score = server.score;
        self.state.time_left = server.time_left;
        self.state.paused = server.paused;
        self.state.pause_timer = server.pause_timer;

        while self.pending.front().is_some_and(|f| f.seq <= last_seq) {
            self.pending.pop_front();
        }

        let authoritative = &server.players[self.my_index];
        let replayed = reconcile_target(authoritative, self.pending.iter());
        blend_local(&mut self.state.players[self.my_index], &replayed, authoritative);

        self.snapshots.push_back(TimedSnapshot {
            received_ms: now_ms,
            state: server,
        });
        while self.snapshots.len() > SNAPSHOT_BUFFER_LEN {
            self.snapshots.pop_front();
        }
    }

    /// Freezes prediction until a snapshot says play has resumed.
    pub fn on_goal(&mut self, score: [u32; 2]) {
        if !self.is_live() {
            return;
        }
        self.state.score = score;
        self.state.paused = true;
        self.state.pause_timer = GOAL_PAUSE_DURATION;
    }

    pub fn on_game_over(&mut self, score: [u32; 2]) {
        if !self.is_live() {
            return;
        }
        self.state.score = score;
        self.phase = MatchPhase::Ended;
    }

    fn update_remote(&mut self, now_ms: f64) {
        let other = 1 - self.my_index;
        let render_ms = now_ms - INTERP_DELAY_MS;

        match self.snapshots.len() {
            0 => {}
            1 => {
                let target = &self.snapshots[0].state;
                ease_player(&mut self.state.players[other], &target.players[other]);
                ease_ball(&mut self.state.ball, &target.ball);
            }
            len => {
                let first = self.snapshots[0].received_ms;
                let mut older = if render_ms < first { 0 } else { len - 2 };
                for i in 0..len - 1 {
                    if self.snapshots[i].received_ms <= render_ms
                        && render_ms <= self.snapshots[i + 1].received_ms
                    {
                        older = i;
                        break;
                    }
                }
                let a = &self.snapshots[older];
                let b = &self.snapshots[older + 1];
                let span = b.received_ms - a.received_ms;
                let t = if span > 0.0 {
                    ((render_ms - a.received_ms) / span) as f32
                } else {
                    1.0
                };
                let t = t.clamp(0.0, MAX_EXTRAPOLATION);

                lerp_player(
                    &mut self.state.players[other],
                    &a.state.players[other],
                    &b.state.players[other],
                    t,
                );
                lerp_ball(&mut self.state.ball, &a.state.ball, &b.state.ball, t);
            }
        }
    }
}

impl Default for ClientGame {
    fn default() -> Self {
        Self::new()
    }
}

/// Replays unacknowledged inputs on top of the server's view of the player.
pub fn reconcile_target<'a>(
    authoritative: &Player,
    pending: impl Iterator<Item = &'a InputFrame>,
) -> Player {
    let mut player = authoritative.clone();
    for input in pending {
        apply_input(&mut player, &input.keys, FIXED_DT);
        integrate_player(&mut player, FIXED_DT);
    }
    player
}

/// Moves the displayed local player toward the reconciled one.
///
/// Large errors snap, medium ones ease, small ones are ignored so the
/// player does not jitter. Motion comes from the replay; facing, kick and
/// knockback come from the server.
pub fn blend_local(displayed: &mut Player, replayed: &Player, authoritative: &Player) {
    let dx = replayed.x - displayed.x;
    let dy = replayed.y - displayed.y;
    let error = (dx * dx + dy * dy).sqrt();

    if error > SNAP_DISTANCE {
        debug!("Prediction off by {:.1}px, snapping", error);
        displayed.x = replayed.x;
        displayed.y = replayed.y;
    } else if error > CORRECTION_DEADZONE {
        displayed.x += dx * CORRECTION_RATE;
        displayed.y += dy * CORRECTION_RATE;
    }

    displayed.vx = replayed.vx;
    displayed.vy = replayed.vy;
    displayed.on_ground = replayed.on_ground;

    displayed.facing = authoritative.facing;
    displayed.is_kicking = authoritative.is_kicking;
    displayed.kick_timer = authoritative.kick_timer;
    displayed.knockback = authoritative.knockback;
}

fn copy_traits(target: &mut Player, from: &Player) {
    target.vx = from.vx;
    target.vy = from.vy;
    target.facing = from.facing;
    target.is_kicking = from.is_kicking;
    target.kick_timer = from.kick_timer;
    target.on_ground = from.on_ground;
    target.knockback = from.knockback;
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp_player(target: &mut Player, a: &Player, b: &Player, t: f32) {
    target.x = lerp(a.x, b.x, t);
    target.y = lerp(a.y, b.y, t);
    copy_traits(target, b);
}

fn lerp_ball(target: &mut Ball, a: &Ball, b: &Ball, t: f32) {
    target.x = lerp(a.x, b.x, t);
    target.y = lerp(a.y, b.y, t);
    target.vx = b.vx;
    target.vy = b.vy;
}

fn ease_player(target: &mut Player, toward: &Player) {
    target.x = lerp(target.x, toward.x, REMOTE_EASE);
    target.y = lerp(target.y, toward.y, REMOTE_EASE);
    copy_traits(target, toward);
}

fn ease_ball(target: &mut Ball, toward: &Ball) {
    target.x = lerp(target.x, toward.x, REMOTE_EASE);
    target.y = lerp(target.y, toward.y, REMOTE_EASE);
    target.vx = toward.vx;
    target.vy = toward.vy;
}
