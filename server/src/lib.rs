//! Duel server for the four-row LAN game: a listener, one read worker per
//! connection, and a single shared state aggregate that the dispatcher
//! mutates under one coarse lock.
//!
//! - `server`: registry, pairing, dispatch, messaging and the
//!   [`server::start`]/[`server::ServerHandle`] lifecycle API.
//! - `client`: the per-connection worker feeding the dispatcher.
//!
//! Runs standalone via the binary in `main.rs`, or embedded through
//! [`server::start`], which is how the integration tests drive a real
//! instance on an ephemeral port.

pub mod client;
pub mod server;

pub use server::{start, ServerHandle};
