use shared::constants::{COUNTDOWN_DURATION, GAME_DURATION, TICK_RATE};
use std::time::Duration;

/// Runtime settings for a server instance, built from command-line arguments.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Upper bound on concurrently open rooms.
    pub max_rooms: usize,
    /// Countdown steps before kick-off.
    pub countdown: u32,
    pub countdown_interval: Duration,
    /// Match length in seconds.
    pub match_duration: f32,
    /// How long a dropped player's slot is held for a reconnect.
    pub reconnect_timeout: Duration,
    pub tick_duration: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_rooms: 100,
            countdown: COUNTDOWN_DURATION,
            countdown_interval: Duration::from_secs(1),
            match_duration: GAME_DURATION,
            reconnect_timeout: Duration::from_secs(30),
            tick_duration: Duration::from_secs_f64(1.0 / f64::from(TICK_RATE)),
        }
    }
}
