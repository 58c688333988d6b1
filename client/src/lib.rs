//! # Head Soccer Client
//!
//! Windowed client for the head-soccer server. It predicts the local player,
//! reconciles against server snapshots and interpolates everything else, so
//! movement feels immediate even over a slow connection.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Inputs are applied to the local player the moment they are sampled, using
//! the same physics code the server runs. Each input carries a sequence
//! number and stays buffered until the server reports it applied.
//!
//! ### Server Reconciliation
//! Every snapshot reports the newest input sequence the server applied for
//! this client. Older inputs are dropped, the rest are replayed on top of the
//! authoritative player, and the on-screen position is blended toward the
//! result instead of jumping.
//!
//! ### Entity Interpolation
//! The opponent and the ball are rendered a fixed delay in the past, between
//! two buffered snapshots, which hides the gaps between updates.
//!
//! ## Module Organization
//!
//! - `game`: prediction, reconciliation and interpolation engine
//! - `input`: keyboard sampling
//! - `network`: WebSocket transport on a background thread
//! - `rendering`: macroquad drawing and the heads-up display
//! - `app`: lobby flow, reconnects and the frame loop tying it together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::app::{Client, ClientConfig};
//!
//! let config = ClientConfig {
//!     server: "127.0.0.1:8080".to_string(),
//!     nickname: Some("Ann".to_string()),
//!     join: None,
//!     fake_ping_ms: 0,
//! };
//!
//! macroquad::Window::new("Head Soccer", async move {
//!     Client::new(config).run().await;
//! });
//! ```
//!
//! ## Frame Loop
//! One pass of the loop drains all pending network events first, so a
//! snapshot is fully applied before any prediction step runs. It then runs
//! the fixed-step catch-up for the local player, sends the captured inputs
//! and draws the frame.

pub mod app;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
