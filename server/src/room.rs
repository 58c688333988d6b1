//! A two-seat match room and the authoritative tick loop that runs inside it.
//!
//! Each room lives behind an `Arc<tokio::sync::Mutex<Room>>`. Connection
//! tasks only queue inputs and lobby changes under the lock; the tick task is
//! the only code that advances the [`GameState`].
//!
//! Timer tasks capture the room's `epoch` when they are spawned and give up
//! as soon as they see a different one, so [`Room::stop_timers`] is final
//! even for a task that was already waiting on the lock.

use crate::config::ServerConfig;
use crate::scheduler::ScheduledTask;
use log::{debug, info};
use shared::constants::{FIXED_DT, GAME_DURATION, TICKS_PER_SNAPSHOT};
use shared::physics::{apply_input, step};
use shared::{serialize, GameState, InputFrame, Keys, ServerMessage, StepOutcome};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::time::{interval, sleep, MissedTickBehavior};

pub type ConnectionId = u64;
pub type RoomHandle = Arc<Mutex<Room>>;

/// One seat in a room and everything the server tracks for its occupant.
#[derive(Debug)]
pub struct Slot {
    pub conn: ConnectionId,
    pub nickname: String,
    pub token: String,
    outbox: UnboundedSender<ServerMessage>,
    pub connected: bool,
    inputs: VecDeque<InputFrame>,
    /// Sequence of the newest input applied to the simulation.
    pub last_applied_seq: u32,
    pub wants_rematch: bool,
    pub(crate) reclaim: ScheduledTask,
}

impl Slot {
    pub fn new(
        conn: ConnectionId,
        nickname: String,
        token: String,
        outbox: UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            conn,
            nickname,
            token,
            outbox,
            connected: true,
            inputs: VecDeque::new(),
            last_applied_seq: 0,
            wants_rematch: false,
            reclaim: ScheduledTask::idle(),
        }
    }

    pub fn send(&self, message: ServerMessage) {
        if !self.connected {
            return;
        }
        // The receiver is gone once the socket writer exits; the close is
        // handled by the session, so a failed send is not an error here.
        let _ = self.outbox.send(message);
    }

    /// Drains the queue, keeping only the newest input.
    fn take_latest_input(&mut self) -> Option<Keys> {
        let latest = self.inputs.drain(..).last()?;
        self.last_applied_seq = latest.seq;
        Some(latest.keys)
    }

    fn reset_for_match(&mut self) {
        self.inputs.clear();
        self.last_applied_seq = 0;
        self.wants_rematch = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Waiting,
    Countdown,
    Running,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RematchVote {
    /// No finished match to replay.
    Ignored,
    Waiting,
    Ready,
}

#[derive(Debug)]
pub struct Room {
    pub id: String,
    slots: [Option<Slot>; 2],
    state: Option<GameState>,
    tick: u64,
    phase: RoomPhase,
    ticks_since_snapshot: u32,
    epoch: u64,
    /// Seconds on the clock at kick-off.
    pub match_duration: f32,
    countdown_task: ScheduledTask,
    tick_task: ScheduledTask,
}

impl Room {
    pub fn new(id: String) -> Self {
        Self {
            id,
            slots: [None, None],
            state: None,
            tick: 0,
            phase: RoomPhase::Waiting,
            ticks_since_snapshot: 0,
            epoch: 0,
            match_duration: GAME_DURATION,
            countdown_task: ScheduledTask::idle(),
            tick_task: ScheduledTask::idle(),
        }
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    pub fn slot_of(&self, conn: ConnectionId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.conn == conn))
    }

    pub fn slot_by_token(&self, token: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.token == token))
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn connected_count(&self) -> usize {
        self.slots.iter().flatten().filter(|s| s.connected).count()
    }

    pub fn nicknames(&self) -> Vec<String> {
        self.slots
            .iter()
            .flatten()
            .map(|s| s.nickname.clone())
            .collect()
    }

    pub fn timers_scheduled(&self) -> bool {
        self.countdown_task.is_scheduled() || self.tick_task.is_scheduled()
    }

    /// Puts `slot` in the first free seat and returns its index.
    pub fn seat(&mut self, slot: Slot) -> Option<usize> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(slot);
        Some(index)
    }

    /// Removes a seat and returns the room to waiting. The remaining player,
    /// if any, is told the opponent left.
    pub fn vacate(&mut self, index: usize) -> Option<Slot> {
        let slot = self.slots.get_mut(index)?.take()?;
        self.stop_timers();
        self.state = None;
        self.tick = 0;
        self.phase = RoomPhase::Waiting;
        for other in self.slots.iter_mut().flatten() {
            other.reset_for_match();
        }
        self.send_to_other(index, ServerMessage::OpponentLeft);
        info!("Player {} left room {}", slot.nickname, self.id);
        Some(slot)
    }

    /// Drops every seat. Pending reclaim timers are cancelled with them.
    pub fn clear_slots(&mut self) {
        self.slots = [None, None];
    }

    /// Marks a seat as dropped; its player keeps coasting under friction.
    pub fn disconnect(&mut self, index: usize) {
        if let Some(slot) = self.slot_mut(index) {
            slot.connected = false;
            slot.inputs.clear();
        }
        self.send_to_other(index, ServerMessage::OpponentDisconnected);
    }

    /// Binds a seat to a new connection after a reconnect.
    pub fn reattach(
        &mut self,
        index: usize,
        conn: ConnectionId,
        outbox: UnboundedSender<ServerMessage>,
    ) {
        if let Some(slot) = self.slot_mut(index) {
            slot.conn = conn;
            slot.outbox = outbox;
            slot.connected = true;
            slot.inputs.clear();
            slot.reclaim.cancel();
        }
        self.send_to_other(index, ServerMessage::OpponentReconnected);
    }

    /// Queues an input for the next tick. Dropped unless a match is running.
    pub fn queue_input(&mut self, conn: ConnectionId, frame: InputFrame) -> bool {
        if self.phase != RoomPhase::Running {
            return false;
        }
        let Some(index) = self.slot_of(conn) else {
            return false;
        };
        match self.slot_mut(index) {
            Some(slot) if slot.connected => {
                slot.inputs.push_back(frame);
                true
            }
            _ => false,
        }
    }

    pub fn send_to(&self, index: usize, message: ServerMessage) {
        if let Some(slot) = self.slot(index) {
            slot.send(message);
        }
    }

    pub fn send_to_other(&self, index: usize, message: ServerMessage) {
        self.send_to(1 - index.min(1), message);
    }

    pub fn broadcast(&self, message: ServerMessage) {
        for slot in self.slots.iter().flatten() {
            slot.send(message.clone());
        }
    }

    /// Cancels the countdown and tick timers and invalidates any task that
    /// already woke up.
    pub fn stop_timers(&mut self) {
        self.epoch += 1;
        self.countdown_task.cancel();
        self.tick_task.cancel();
    }

    /// Fresh match state, cleared input queues and a `game_start` broadcast.
    pub fn begin_match(&mut self) {
        let mut state = GameState::new();
        state.time_left = self.match_duration;
        let wire = serialize(&state);
        self.state = Some(state);
        self.tick = 0;
        self.ticks_since_snapshot = 0;
        self.phase = RoomPhase::Running;
        for slot in self.slots.iter_mut().flatten() {
            slot.reset_for_match();
        }
        self.broadcast(ServerMessage::GameStart {
            state: wire,
            players: self.nicknames(),
        });
        info!("Match started in room {}", self.id);
    }

    /// Ends the match and announces the result. The winner is -1 on a draw.
    pub fn finish_match(&mut self) {
        self.stop_timers();
        self.phase = RoomPhase::Over;
        let (score, winner) = self.final_score();
        self.broadcast(ServerMessage::GameOver { score, winner });
        info!(
            "Match over in room {}: {}-{} (winner {})",
            self.id, score[0], score[1], winner
        );
    }

    fn final_score(&self) -> ([u32; 2], i8) {
        let score = self.state.as_ref().map_or([0, 0], |s| s.score);
        let winner = match score[0].cmp(&score[1]) {
            std::cmp::Ordering::Greater => 0,
            std::cmp::Ordering::Less => 1,
            std::cmp::Ordering::Equal => -1,
        };
        (score, winner)
    }

    /// The `game_over` message of a finished match, for a player who
    /// missed the broadcast.
    pub fn result(&self) -> Option<ServerMessage> {
        if self.phase != RoomPhase::Over {
            return None;
        }
        let (score, winner) = self.final_score();
        Some(ServerMessage::GameOver { score, winner })
    }

    /// Records a rematch vote from `index` and tells the opponent about it.
    pub fn request_rematch(&mut self, index: usize) -> RematchVote {
        if self.phase != RoomPhase::Over {
            return RematchVote::Ignored;
        }
        match self.slot_mut(index) {
            Some(slot) => slot.wants_rematch = true,
            None => return RematchVote::Ignored,
        }
        self.send_to_other(index, ServerMessage::RematchRequest { from: index });

        let both = self.is_full() && self.slots.iter().flatten().all(|s| s.wants_rematch);
        if both {
            RematchVote::Ready
        } else {
            RematchVote::Waiting
        }
    }

    /// Advances the running match by one fixed tick.
    ///
    /// Each seat contributes only its newest queued input; a seat with
    /// nothing queued gets the empty intent so its player slows down.
    pub fn game_tick(&mut self) -> Option<StepOutcome> {
        if self.phase != RoomPhase::Running {
            return None;
        }
        let state = self.state.as_mut()?;

        for (slot, player) in self.slots.iter_mut().zip(state.players.iter_mut()) {
            let keys = slot
                .as_mut()
                .and_then(Slot::take_latest_input)
                .unwrap_or(Keys::NONE);
            apply_input(player, &keys, FIXED_DT);
        }

        let outcome = step(state, FIXED_DT);
        let score = state.score;
        self.tick += 1;

        match outcome {
            StepOutcome::TimeUp => {
                self.finish_match();
                return Some(outcome);
            }
            StepOutcome::Goal1 | StepOutcome::Goal2 => {
                if let Some(scorer) = outcome.scorer() {
                    debug!("Goal in room {} by slot {}", self.id, scorer);
                    self.broadcast(ServerMessage::Goal { scorer, score });
                }
            }
            StepOutcome::Continue => {}
        }

        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= TICKS_PER_SNAPSHOT {
            self.ticks_since_snapshot = 0;
            self.send_snapshots();
        }

        Some(outcome)
    }

    fn send_snapshots(&self) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let wire = serialize(state);
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(slot) = slot {
                slot.send(ServerMessage::Snapshot {
                    tick: self.tick,
                    last_seq: slot.last_applied_seq,
                    state: wire.clone(),
                    you: index,
                });
            }
        }
    }
}

/// Cancels whatever is running in the room and starts a fresh countdown.
pub fn start_countdown(handle: &RoomHandle, room: &mut Room, config: &Arc<ServerConfig>) {
    room.stop_timers();
    room.phase = RoomPhase::Countdown;
    room.state = None;
    for slot in room.slots.iter_mut().flatten() {
        slot.wants_rematch = false;
    }
    let task = run_countdown(Arc::clone(handle), room.epoch, Arc::clone(config));
    room.countdown_task = ScheduledTask::spawn(task);
    info!("Countdown started in room {}", room.id);
}

/// Kicks off a match and its tick timer.
pub fn start_match(handle: &RoomHandle, room: &mut Room, config: &ServerConfig) {
    room.stop_timers();
    room.match_duration = config.match_duration;
    room.begin_match();
    let task = run_ticks(Arc::clone(handle), room.epoch, config);
    room.tick_task = ScheduledTask::spawn(task);
}

async fn run_countdown(handle: RoomHandle, epoch: u64, config: Arc<ServerConfig>) {
    for count in (1..=config.countdown).rev() {
        {
            let room = handle.lock().await;
            if room.epoch != epoch {
                return;
            }
            room.broadcast(ServerMessage::Countdown { count });
        }
        sleep(config.countdown_interval).await;
    }

    let mut room = handle.lock().await;
    if room.epoch != epoch {
        return;
    }
    room.countdown_task.release();
    start_match(&handle, &mut room, &config);
}

fn run_ticks(
    handle: RoomHandle,
    epoch: u64,
    config: &ServerConfig,
) -> impl std::future::Future<Output = ()> + Send + 'static {
    let tick_duration = config.tick_duration;
    async move {
        let mut timer = interval(tick_duration);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        timer.tick().await;

        loop {
            timer.tick().await;
            let mut room = handle.lock().await;
            if room.epoch != epoch {
                return;
            }
            if room.game_tick() == Some(StepOutcome::TimeUp) {
                return;
            }
        }
    }
}
