//! Wire protocol: newline-delimited JSON messages of the shape
//! `{"type": ..., "payload": {...}}`. The payload keys and the
//! human-readable strings are a contract with the existing graphical
//! client, so the serde shapes below must not drift.

use serde::{Deserialize, Serialize};

use crate::board::Piece;

/// Messages a client may send. `request_rematch` and `quit_session`
/// arrive without a payload member at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    MakeMove { column: i64 },
    RequestRematch,
    QuitSession,
}

/// Session score counters, keyed on the wire by piece symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(rename = "X")]
    pub x: u32,
    #[serde(rename = "O")]
    pub o: u32,
}

impl Scores {
    pub fn award(&mut self, winner: Piece) {
        match winner {
            Piece::X => self.x += 1,
            Piece::O => self.o += 1,
        }
    }
}

/// Messages the server sends. A `game_over` carries either `winner` or
/// `draw`; the absent member is omitted from the payload entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        symbol: Piece,
        message: String,
    },
    Info {
        message: String,
    },
    Error {
        error_code: String,
        message: String,
    },
    GameStart {
        board: String,
        turn: Piece,
        message: String,
        scores: Scores,
    },
    NewGame {
        board: String,
        turn: Piece,
        message: String,
        scores: Scores,
    },
    BoardUpdate {
        board: String,
        turn: Piece,
    },
    YourTurn {
        message: String,
    },
    GameOver {
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<Piece>,
        #[serde(skip_serializing_if = "Option::is_none")]
        draw: Option<bool>,
        message: String,
        board: String,
    },
    ScoreUpdate {
        scores: Scores,
    },
    RematchInfo {
        message: String,
    },
    OpponentDisconnected {
        message: String,
    },
    OpponentLeftSession {
        message: String,
    },
}

/// Encode one outbound message as a newline-terminated JSON frame.
pub fn encode_line(message: &ServerMessage) -> serde_json::Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(message)?;
    frame.push(b'\n');
    Ok(frame)
}

/// Decode one delimiter-stripped line into a client message.
pub fn decode_line(line: &[u8]) -> serde_json::Result<ClientMessage> {
    serde_json::from_slice(line)
}
