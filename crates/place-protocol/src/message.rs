//! Protocol message types for client/server communication.
//!
//! Every message is an adjacently tagged envelope:
//! `{"type": "CHANGE_TILE", "data": {...}}`. Payload-less messages omit `data`.

use place_core::{Board, PlaceColor, Tile};
use serde::{Deserialize, Serialize};

/// Messages sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Request to join with this username
    Login(String),

    /// Request to repaint one cell
    ChangeTile(Tile),
}

impl ClientMessage {
    /// Creates a login request.
    pub fn login(username: impl Into<String>) -> Self {
        Self::Login(username.into())
    }

    /// Creates a tile change request.
    pub fn change_tile(row: i32, col: i32, color: PlaceColor, username: &str) -> Self {
        Self::ChangeTile(Tile::new(row, col, color, username))
    }

    /// Returns the wire name of this message's type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Login(_) => "LOGIN",
            Self::ChangeTile(_) => "CHANGE_TILE",
        }
    }
}

/// Why the server refused a CHANGE_TILE request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The session's cooldown has not expired yet
    Cooldown,
    /// The coordinates lie outside the board
    OutOfBounds,
}

/// Payload of a TILE_REJECTED message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRejection {
    pub row: i32,
    pub col: i32,
    pub reason: RejectReason,
}

/// Messages sent from the server to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Login accepted; carries the assigned client id
    LoginSuccess(u64),

    /// Login rejected (payload is the username) or protocol violation
    Error(String),

    /// Full board snapshot, sent once right after LOGIN_SUCCESS
    Board(Board),

    /// Authoritative notification of a repaint
    TileChanged(Tile),

    /// Cooldown expired; the session may send CHANGE_TILE again
    Ready,

    /// A CHANGE_TILE from this session was refused
    TileRejected(TileRejection),
}

impl ServerMessage {
    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Creates a rejection for the given tile request.
    pub fn rejected(tile: &Tile, reason: RejectReason) -> Self {
        Self::TileRejected(TileRejection {
            row: tile.row(),
            col: tile.col(),
            reason,
        })
    }

    /// Returns the wire name of this message's type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LoginSuccess(_) => "LOGIN_SUCCESS",
            Self::Error(_) => "ERROR",
            Self::Board(_) => "BOARD",
            Self::TileChanged(_) => "TILE_CHANGED",
            Self::Ready => "READY",
            Self::TileRejected(_) => "TILE_REJECTED",
        }
    }
}
