//! # Head Soccer Server
//!
//! Authoritative server for two-player head-soccer matches played over
//! WebSockets. Players meet in rooms identified by a short numeric code; once
//! both seats are taken the room counts down and runs a fixed-rate match.
//!
//! ## Authoritative Simulation
//! Each running room owns one [`shared::GameState`] and advances it with
//! [`shared::physics::step`] on a wall-clock interval at
//! [`shared::constants::TICK_RATE`]. Before each tick the newest queued input
//! of every seat is applied; older queued inputs are discarded. Clients
//! predict their own player with the same physics code and reconcile against
//! the snapshots sent every [`shared::constants::TICKS_PER_SNAPSHOT`] ticks.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Accept loop, per-connection sessions and the JSON message dispatch:
//! - room creation, joining and leaving
//! - input forwarding into the room queues
//! - rematch votes and reconnect tokens
//!
//! ### Registry Module (`registry`)
//! The set of open rooms, with capacity limits and token lookup.
//!
//! ### Room Module (`room`)
//! Seats, match phases, the tick loop and the countdown.
//!
//! ### Scheduler Module (`scheduler`)
//! Cancellable task handles used for every room timer.
//!
//! ## Concurrency
//! Rooms share nothing with each other. A room is guarded by a
//! `tokio::sync::Mutex`; the registry by a `RwLock`. The registry lock is
//! always taken before a room lock, never the other way round. Outbound
//! messages go through unbounded per-connection channels so the tick loop
//! never waits on a socket.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod network;
pub mod registry;
pub mod room;
pub mod scheduler;
