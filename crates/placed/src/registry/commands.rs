//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RegistryEvent`: Events published by the registry for in-process observers
//!
//! All types are designed for async message passing and follow the panic-free policy.

use place_core::{Board, Tile};
use place_protocol::ServerMessage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking. The actor
/// handles one command at a time, which is what makes "apply a tile, then
/// broadcast it" and "add or remove a member" atomic with respect to each other.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Reserve a username and admit the connection as a member.
    ///
    /// On success the actor queues `LOGIN_SUCCESS` and the `BOARD` snapshot
    /// onto `outbound` before handling any other command, so the snapshot
    /// precedes every TILE_CHANGED the member will receive.
    ///
    /// # Errors
    /// - `RegistryError::UsernameTaken` if an active member holds the name
    /// - `RegistryError::InvalidUsername` if the name is not acceptable
    Reserve {
        /// Requested username
        username: String,
        /// Connection number assigned by the listener
        client_id: u64,
        /// The member's outbound message queue
        outbound: mpsc::Sender<ServerMessage>,
        /// Cancelled when the member is evicted
        closer: CancellationToken,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a member.
    ///
    /// Idempotent: responds `false` if `username` is not held by `client_id`.
    Remove {
        /// Username to release
        username: String,
        /// Connection that must currently hold the username
        client_id: u64,
        /// Channel to send whether a member was removed
        respond_to: oneshot::Sender<bool>,
    },

    /// Apply a tile change on behalf of a member and broadcast it.
    ///
    /// The tile's owner is overwritten with `username`.
    ///
    /// # Errors
    /// - `RegistryError::NotRegistered` if the connection holds no membership
    /// - `RegistryError::OutOfBounds` if the coordinates are off the board
    ChangeTile {
        /// Username of the requesting member
        username: String,
        /// Connection that must currently hold the username
        client_id: u64,
        /// The requested tile
        tile: Tile,
        /// Channel to send the applied tile
        respond_to: oneshot::Sender<Result<Tile, RegistryError>>,
    },

    /// Get a full copy of the board.
    GetBoard {
        /// Channel to send the snapshot
        respond_to: oneshot::Sender<Board>,
    },

    /// Get a single tile.
    ///
    /// Returns `None` for coordinates off the board.
    GetTile {
        row: i32,
        col: i32,
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<Tile>>,
    },

    /// Get the usernames of all members, sorted.
    Members {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<String>>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An active member already holds this username.
    #[error("username taken: {0}")]
    UsernameTaken(String),

    /// The username cannot be reserved at all.
    #[error("invalid username {username:?}: {reason}")]
    InvalidUsername {
        /// The rejected username
        username: String,
        /// Why it was rejected
        reason: String,
    },

    /// The requesting connection is not a member.
    #[error("not registered: {0}")]
    NotRegistered(String),

    /// The tile lies outside the board.
    #[error("tile ({row}, {col}) is out of bounds")]
    OutOfBounds {
        row: i32,
        col: i32,
    },

    /// The connection's outbound queue had no room for the login replies.
    #[error("outbound queue full")]
    QueueFull,

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Registry Events
// ============================================================================

/// Events published by the registry to in-process observers.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A username was reserved.
    Joined {
        username: String,
        client_id: u64,
    },

    /// A tile was applied to the board and broadcast to members.
    TileChanged {
        /// The stored tile, as broadcast
        tile: Tile,
    },

    /// A member left the registry.
    Left {
        username: String,
        client_id: u64,
        /// Why the member was removed
        reason: RemovalReason,
    },
}

/// Reason why a member was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The session ended and deregistered itself.
    Disconnected,

    /// The member's outbound queue was full during a broadcast.
    SlowConsumer,

    /// The member's outbound queue was already closed during a broadcast.
    ChannelClosed,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::SlowConsumer => write!(f, "outbound queue full"),
            Self::ChannelClosed => write!(f, "outbound queue closed"),
        }
    }
}
