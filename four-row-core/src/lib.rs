//! Shared pieces of the four-row LAN duel: the board engine, the game
//! state model, the line-delimited JSON wire protocol, and the logging
//! bootstrap. Everything here is synchronous and free of I/O so the
//! server crate can drive it under its own lock.

pub mod board;
pub mod game;
pub mod logger;
pub mod protocol;
