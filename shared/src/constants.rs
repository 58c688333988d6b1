//! Gameplay constants shared by the server simulation and client prediction.
//!
//! Both sides must agree on every value here; changing one is a protocol change.

// Field
pub const FIELD_WIDTH: f32 = 800.0;
pub const FIELD_HEIGHT: f32 = 450.0;
pub const GROUND_Y: f32 = 400.0;

// Goals
pub const GOAL_WIDTH: f32 = 45.0;
pub const GOAL_HEIGHT: f32 = 160.0;
pub const GOAL_Y: f32 = GROUND_Y - GOAL_HEIGHT;

// Player
pub const PLAYER_RADIUS: f32 = 26.0;
pub const PLAYER_BODY_W: f32 = 13.0;
pub const PLAYER_BODY_H: f32 = 5.0;
pub const PLAYER_MAX_SPEED: f32 = 280.0;
/// Horizontal acceleration in px/s² while a direction is held.
pub const PLAYER_ACCEL: f32 = 1800.0;
/// Per-tick velocity multiplier when no direction is held.
pub const PLAYER_FRICTION: f32 = 0.82;
/// Below this horizontal speed friction snaps the player to rest.
pub const PLAYER_STOP_SPEED: f32 = 5.0;
pub const JUMP_FORCE: f32 = -416.0;
pub const GRAVITY: f32 = 900.0;
pub const PLAYER_KICK_RADIUS: f32 = 18.0;
pub const KICK_FORCE: f32 = 700.0;
/// Kick window length in milliseconds.
pub const KICK_DURATION: f32 = 150.0;
pub const KICK_KNOCKBACK_VX: f32 = 350.0;
pub const KICK_KNOCKBACK_VY: f32 = -250.0;

// Ball
pub const BALL_RADIUS: f32 = 18.0;
pub const BALL_BOUNCE: f32 = 0.65;
pub const BALL_FRICTION: f32 = 0.998;
pub const BALL_GROUND_FRICTION: f32 = 0.97;
/// Ground bounces slower than this are absorbed.
pub const BALL_REST_SPEED: f32 = 20.0;
pub const MAX_BALL_SPEED: f32 = 900.0;
/// Vertical velocity a header guarantees when the ball lands on top of a head.
pub const HEADER_MIN_BOUNCE: f32 = -200.0;

// Match rules
/// Match length in seconds.
pub const GAME_DURATION: f32 = 60.0;
/// Freeze after a goal, in milliseconds.
pub const GOAL_PAUSE_DURATION: f32 = 1500.0;
/// Countdown steps broadcast before kick-off.
pub const COUNTDOWN_DURATION: u32 = 3;

// Network cadence
pub const TICK_RATE: u32 = 60;
pub const SNAPSHOT_RATE: u32 = 30;
pub const TICKS_PER_SNAPSHOT: u32 = TICK_RATE / SNAPSHOT_RATE;
pub const FIXED_DT: f32 = 1.0 / TICK_RATE as f32;

const _: () = assert!(TICK_RATE % SNAPSHOT_RATE == 0);

// Spawn positions
pub const P1_SPAWN_X: f32 = 130.0;
pub const P2_SPAWN_X: f32 = FIELD_WIDTH - 130.0;
pub const PLAYER_SPAWN_Y: f32 = GROUND_Y;
pub const BALL_SPAWN_X: f32 = FIELD_WIDTH / 2.0;
pub const BALL_SPAWN_Y: f32 = 200.0;

// Client prediction and interpolation
/// Unacknowledged inputs kept for replay.
pub const INPUT_BUFFER_LEN: usize = 120;
/// Timestamped snapshots kept for remote interpolation.
pub const SNAPSHOT_BUFFER_LEN: usize = 5;
/// Backward time shift for remote entities, in milliseconds.
pub const INTERP_DELAY_MS: f64 = 80.0;
/// Largest interpolation factor allowed when render time runs past the newest snapshot.
pub const MAX_EXTRAPOLATION: f32 = 1.2;
/// Ease factor toward a lone snapshot before interpolation has two samples.
pub const REMOTE_EASE: f32 = 0.3;
/// Longest frame the client accumulator accepts, in seconds.
pub const MAX_FRAME_DT: f32 = 0.05;
/// Prediction error (px) above which the local player snaps to the server.
pub const SNAP_DISTANCE: f32 = 100.0;
/// Prediction error (px) below which no correction is applied.
pub const CORRECTION_DEADZONE: f32 = 8.0;
pub const CORRECTION_RATE: f32 = 0.1;
