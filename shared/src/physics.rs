//! Deterministic fixed-step physics shared by the authoritative server and
//! the predicting client.
//!
//! Positions are in field pixels with y pointing down. A player's `x` is the
//! horizontal centre of the body and `y` the feet; the head circle sits on top
//! of the body box.

use crate::constants::*;
use serde::{Deserialize, Serialize};

/// Per-tick movement intent captured from a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keys {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub kick: bool,
}

impl Keys {
    /// Intent with every key released.
    pub const NONE: Keys = Keys {
        left: false,
        right: false,
        up: false,
        kick: false,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// +1 faces right, -1 faces left.
    pub facing: i8,
    pub is_kicking: bool,
    /// Milliseconds left in the current kick window.
    pub kick_timer: f32,
    pub on_ground: bool,
    pub knockback: bool,
    pub player_num: u8,
}

impl Player {
    pub fn new(player_num: u8) -> Self {
        let mut player = Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            facing: 1,
            is_kicking: false,
            kick_timer: 0.0,
            on_ground: true,
            knockback: false,
            player_num,
        };
        player.respawn();
        player
    }

    /// Puts the player back on its kick-off spot with all motion cleared.
    pub fn respawn(&mut self) {
        let (x, facing) = if self.player_num == 1 {
            (P1_SPAWN_X, 1)
        } else {
            (P2_SPAWN_X, -1)
        };
        self.x = x;
        self.y = PLAYER_SPAWN_Y;
        self.vx = 0.0;
        self.vy = 0.0;
        self.facing = facing;
        self.is_kicking = false;
        self.kick_timer = 0.0;
        self.on_ground = true;
        self.knockback = false;
    }

    pub fn head_center(&self) -> (f32, f32) {
        (self.x, self.y - PLAYER_BODY_H - PLAYER_RADIUS)
    }

    /// Body box as (left, top, right, bottom).
    pub fn body_bounds(&self) -> (f32, f32, f32, f32) {
        (
            self.x - PLAYER_BODY_W / 2.0,
            self.y - PLAYER_BODY_H,
            self.x + PLAYER_BODY_W / 2.0,
            self.y,
        )
    }

    /// Centre of the kick hitbox, just in front of the feet.
    pub fn kick_center(&self) -> (f32, f32) {
        (
            self.x + self.facing_f32() * (PLAYER_BODY_W / 2.0 + PLAYER_KICK_RADIUS),
            self.y - PLAYER_BODY_H * 0.3,
        )
    }

    pub fn facing_f32(&self) -> f32 {
        f32::from(self.facing)
    }

    fn end_kick(&mut self) {
        self.is_kicking = false;
        self.kick_timer = 0.0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl Ball {
    pub fn new() -> Self {
        Self {
            x: BALL_SPAWN_X,
            y: BALL_SPAWN_Y,
            vx: 0.0,
            vy: 0.0,
        }
    }

    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    fn clamp_speed(&mut self) {
        let speed = self.speed();
        if speed > MAX_BALL_SPEED {
            let scale = MAX_BALL_SPEED / speed;
            self.vx *= scale;
            self.vy *= scale;
        }
    }
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub players: [Player; 2],
    pub ball: Ball,
    pub score: [u32; 2],
    /// Seconds left in the match.
    pub time_left: f32,
    pub paused: bool,
    /// Milliseconds left in the post-goal freeze.
    pub pause_timer: f32,
}

impl GameState {
    /// Fresh match: both players and the ball on their spawns, score 0-0.
    pub fn new() -> Self {
        Self {
            players: [Player::new(1), Player::new(2)],
            ball: Ball::new(),
            score: [0, 0],
            time_left: GAME_DURATION,
            paused: false,
            pause_timer: 0.0,
        }
    }

    pub fn reset_positions(&mut self) {
        for player in &mut self.players {
            player.respawn();
        }
        self.ball = Ball::new();
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single [`step`] produced, for the caller to broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// Player 1 (slot 0) scored in the right goal.
    Goal1,
    /// Player 2 (slot 1) scored in the left goal.
    Goal2,
    TimeUp,
}

impl StepOutcome {
    /// Slot index of the scorer, if this outcome is a goal.
    pub fn scorer(self) -> Option<usize> {
        match self {
            StepOutcome::Goal1 => Some(0),
            StepOutcome::Goal2 => Some(1),
            _ => None,
        }
    }
}

/// Applies one tick of intent to a player's velocity, facing and kick state.
///
/// Does not move the player; integration happens in [`integrate_player`].
/// Ignored entirely while the player is in knockback.
pub fn apply_input(player: &mut Player, keys: &Keys, dt: f32) {
    if player.knockback {
        return;
    }

    if keys.left {
        player.vx -= PLAYER_ACCEL * dt;
        player.facing = -1;
    } else if keys.right {
        player.vx += PLAYER_ACCEL * dt;
        player.facing = 1;
    } else {
        player.vx *= PLAYER_FRICTION;
        if player.vx.abs() < PLAYER_STOP_SPEED {
            player.vx = 0.0;
        }
    }

    player.vx = player.vx.clamp(-PLAYER_MAX_SPEED, PLAYER_MAX_SPEED);

    if keys.up && player.on_ground {
        player.vy = JUMP_FORCE;
        player.on_ground = false;
    }

    if keys.kick && !player.is_kicking {
        player.is_kicking = true;
        player.kick_timer = KICK_DURATION;
    }
}

/// Moves a single player through one tick without looking at anything else
/// on the field. The client predicts its own player with exactly this.
pub fn integrate_player(player: &mut Player, dt: f32) {
    player.vy += GRAVITY * dt;

    player.x += player.vx * dt;
    player.y += player.vy * dt;

    if player.y >= GROUND_Y {
        player.y = GROUND_Y;
        player.vy = 0.0;
        player.on_ground = true;
        if player.knockback {
            player.knockback = false;
            player.vx = 0.0;
        }
    }

    clamp_to_field(player);

    if player.is_kicking {
        player.kick_timer -= dt * 1000.0;
        if player.kick_timer <= 0.0 {
            player.end_kick();
        }
    }
}

fn clamp_to_field(player: &mut Player) {
    let min_x = PLAYER_BODY_W / 2.0;
    let max_x = FIELD_WIDTH - PLAYER_BODY_W / 2.0;
    player.x = player.x.clamp(min_x, max_x);
}

/// Advances the whole match by one fixed tick.
///
/// Inputs must already have been applied with [`apply_input`]. Collision
/// passes run in a fixed order (player-player, kick-player, then per player
/// body-ball and kick-ball) so kicks land before bare-body pushes.
pub fn step(state: &mut GameState, dt: f32) -> StepOutcome {
    if state.paused {
        state.pause_timer -= dt * 1000.0;
        if state.pause_timer <= 0.0 {
            state.paused = false;
            state.pause_timer = 0.0;
            state.reset_positions();
        }
        return StepOutcome::Continue;
    }

    state.time_left -= dt;
    if state.time_left <= 0.0 {
        state.time_left = 0.0;
        return StepOutcome::TimeUp;
    }

    for player in &mut state.players {
        integrate_player(player, dt);
    }
    integrate_ball(&mut state.ball, dt);

    let [p1, p2] = &mut state.players;
    resolve_player_collision(p1, p2);

    if p1.is_kicking {
        resolve_kick_player_collision(p1, p2);
    }
    if p2.is_kicking {
        resolve_kick_player_collision(p2, p1);
    }

    for player in &mut state.players {
        resolve_player_ball_collision(player, &mut state.ball);
        if player.is_kicking {
            resolve_kick_ball_collision(player, &mut state.ball);
        }
    }

    for player in &mut state.players {
        clamp_to_field(player);
    }
    state.ball.clamp_speed();

    let outcome = check_goal(&state.ball);
    if let Some(scorer) = outcome.scorer() {
        state.score[scorer] += 1;
        state.paused = true;
        state.pause_timer = GOAL_PAUSE_DURATION;
    }

    outcome
}

fn integrate_ball(ball: &mut Ball, dt: f32) {
    ball.vy += GRAVITY * dt;

    ball.x += ball.vx * dt;
    ball.y += ball.vy * dt;

    ball.vx *= BALL_FRICTION;

    if ball.y + BALL_RADIUS >= GROUND_Y {
        ball.y = GROUND_Y - BALL_RADIUS;
        ball.vy = -ball.vy * BALL_BOUNCE;
        ball.vx *= BALL_GROUND_FRICTION;
        if ball.vy.abs() < BALL_REST_SPEED {
            ball.vy = 0.0;
        }
    }

    if ball.y - BALL_RADIUS < 0.0 {
        ball.y = BALL_RADIUS;
        ball.vy = ball.vy.abs() * BALL_BOUNCE;
    }

    // Side walls are open below the crossbar so the ball can enter the goals.
    let in_goal_mouth = ball.y + BALL_RADIUS > GOAL_Y;

    if ball.x - BALL_RADIUS < 0.0 && (!in_goal_mouth || ball.x - BALL_RADIUS > GOAL_WIDTH) {
        ball.x = BALL_RADIUS;
        ball.vx = ball.vx.abs() * BALL_BOUNCE;
    }

    if ball.x + BALL_RADIUS > FIELD_WIDTH
        && (!in_goal_mouth || ball.x + BALL_RADIUS < FIELD_WIDTH - GOAL_WIDTH)
    {
        ball.x = FIELD_WIDTH - BALL_RADIUS;
        ball.vx = -ball.vx.abs() * BALL_BOUNCE;
    }

    let on_crossbar_height = (ball.y - GOAL_Y).abs() < BALL_RADIUS;
    let over_left_goal = ball.x - BALL_RADIUS < GOAL_WIDTH;
    let over_right_goal = ball.x + BALL_RADIUS > FIELD_WIDTH - GOAL_WIDTH;
    if on_crossbar_height && (over_left_goal || over_right_goal) {
        ball.vy = -ball.vy.abs() * BALL_BOUNCE;
        ball.y = GOAL_Y - BALL_RADIUS;
    }

    ball.clamp_speed();
}

/// Pushes two overlapping players apart: heads as circles, bodies along x.
pub fn resolve_player_collision(p1: &mut Player, p2: &mut Player) {
    let (hx1, hy1) = p1.head_center();
    let (hx2, hy2) = p2.head_center();
    let dx = hx2 - hx1;
    let dy = hy2 - hy1;
    let distance = (dx * dx + dy * dy).sqrt();
    let min_distance = PLAYER_RADIUS * 2.0;

    if distance < min_distance && distance > 0.0 {
        let nx = dx / distance;
        let overlap = min_distance - distance;

        p1.x -= nx * overlap * 0.5;
        p2.x += nx * overlap * 0.5;

        let approach = (p1.vx - p2.vx) * nx;
        if approach > 0.0 {
            p1.vx -= approach * nx * 0.5;
            p2.vx += approach * nx * 0.5;
        }
    }

    let body_dx = p2.x - p1.x;
    let body_distance = body_dx.abs();
    let (_, top1, _, bottom1) = p1.body_bounds();
    let (_, top2, _, bottom2) = p2.body_bounds();
    let vertical_overlap = bottom1.min(bottom2) - top1.max(top2);

    if body_distance < PLAYER_BODY_W && vertical_overlap > 0.0 {
        let push = if body_dx > 0.0 { 1.0 } else { -1.0 };
        let overlap = PLAYER_BODY_W - body_distance;
        p1.x -= push * overlap * 0.5;
        p2.x += push * overlap * 0.5;
    }
}

/// Nearest point of an axis-aligned box to `(px, py)`.
fn closest_point(bounds: (f32, f32, f32, f32), px: f32, py: f32) -> (f32, f32) {
    let (left, top, right, bottom) = bounds;
    (px.clamp(left, right), py.clamp(top, bottom))
}

/// Launches `target` if `attacker`'s kick hitbox touches its head or body.
pub fn resolve_kick_player_collision(attacker: &mut Player, target: &mut Player) {
    let (kx, ky) = attacker.kick_center();

    let (hx, hy) = target.head_center();
    let hdx = hx - kx;
    let hdy = hy - ky;
    let head_distance = (hdx * hdx + hdy * hdy).sqrt();
    let head_hit = head_distance < PLAYER_KICK_RADIUS + PLAYER_RADIUS && head_distance > 0.0;

    let (cx, cy) = closest_point(target.body_bounds(), kx, ky);
    let bdx = kx - cx;
    let bdy = ky - cy;
    let body_hit = (bdx * bdx + bdy * bdy).sqrt() < PLAYER_KICK_RADIUS;

    if head_hit || body_hit {
        target.vx = attacker.facing_f32() * KICK_KNOCKBACK_VX;
        target.vy = KICK_KNOCKBACK_VY;
        target.on_ground = false;
        target.knockback = true;

        attacker.end_kick();
    }
}

/// Bounces the ball off a player's head and body.
pub fn resolve_player_ball_collision(player: &Player, ball: &mut Ball) {
    let (hx, hy) = player.head_center();
    let dx = ball.x - hx;
    let dy = ball.y - hy;
    let distance = (dx * dx + dy * dy).sqrt();
    let min_distance = PLAYER_RADIUS + BALL_RADIUS;

    if distance < min_distance && distance > 0.0 {
        let nx = dx / distance;
        let ny = dy / distance;
        let overlap = min_distance - distance;
        ball.x += nx * overlap;
        ball.y += ny * overlap;

        let rel_vx = ball.vx - player.vx;
        let rel_vy = ball.vy - player.vy;
        let dot = rel_vx * nx + rel_vy * ny;

        if dot < 0.0 {
            ball.vx -= 2.0 * dot * nx;
            ball.vy -= 2.0 * dot * ny;

            ball.vx += player.vx * 0.5;
            ball.vy += player.vy * 0.3;

            // Headers always pop the ball up a little.
            if ny < -0.3 && ball.vy > HEADER_MIN_BOUNCE / 2.0 {
                ball.vy = HEADER_MIN_BOUNCE;
            }
        }
    }

    let (cx, cy) = closest_point(player.body_bounds(), ball.x, ball.y);
    let bdx = ball.x - cx;
    let bdy = ball.y - cy;
    let body_distance = (bdx * bdx + bdy * bdy).sqrt();

    if body_distance < BALL_RADIUS && body_distance > 0.0 {
        let nx = bdx / body_distance;
        let ny = bdy / body_distance;
        ball.x = cx + nx * BALL_RADIUS;
        ball.y = cy + ny * BALL_RADIUS;

        let dot = ball.vx * nx + ball.vy * ny;
        if dot < 0.0 {
            ball.vx -= 2.0 * dot * nx;
            ball.vy -= 2.0 * dot * ny;
            ball.vx += player.vx * 0.3;
        }
    }
}

/// Strikes the ball if it overlaps the player's active kick hitbox.
pub fn resolve_kick_ball_collision(player: &mut Player, ball: &mut Ball) {
    let (kx, ky) = player.kick_center();
    let dx = ball.x - kx;
    let dy = ball.y - ky;
    let distance = (dx * dx + dy * dy).sqrt();
    let min_distance = PLAYER_KICK_RADIUS + BALL_RADIUS;

    if distance < min_distance && distance > 0.0 {
        let angle = (-0.4f32).atan2(player.facing_f32());
        ball.vx = angle.cos() * KICK_FORCE;
        ball.vy = angle.sin() * KICK_FORCE;

        ball.x = kx + dx / distance * min_distance;
        ball.y = ky + dy / distance * min_distance;

        player.end_kick();
    }
}

/// Whether the ball sits fully past a goal line inside the goal mouth.
pub fn check_goal(ball: &Ball) -> StepOutcome {
    let in_mouth = ball.y > GOAL_Y && ball.y < GROUND_Y;
    if !in_mouth {
        return StepOutcome::Continue;
    }
    if ball.x - BALL_RADIUS <= 0.0 {
        StepOutcome::Goal2
    } else if ball.x + BALL_RADIUS >= FIELD_WIDTH {
        StepOutcome::Goal1
    } else {
        StepOutcome::Continue
    }
}
