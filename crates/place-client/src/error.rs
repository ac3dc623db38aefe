//! Error types for the Place client.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;

use place_protocol::CodecError;
use thiserror::Error;

// ============================================================================
// Client Error Type
// ============================================================================

/// Errors raised while connecting to a server and logging in.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to open the TCP connection.
    #[error("Failed to connect to server: {0}")]
    Connect(#[source] io::Error),

    /// The server refused the username (taken or not acceptable).
    ///
    /// The connection stays open and `login` may be retried with another name.
    #[error("Username rejected by server: {0}")]
    UsernameTaken(String),

    /// The server sent something other than the expected handshake reply.
    #[error("Unexpected {0} from server during login")]
    UnexpectedMessage(&'static str),

    /// The operation needs a completed login.
    #[error("Not logged in")]
    NotAuthenticated,

    /// `login` was called on a connection that already logged in.
    #[error("Already logged in")]
    AlreadyLoggedIn,

    /// The listener has already been started for this connection.
    #[error("Listener already started")]
    ListenerStarted,

    /// The server closed the connection.
    #[error("Server closed the connection")]
    Disconnected,

    /// Framing, encoding or decoding failure.
    #[error("Protocol error: {0}")]
    Codec(#[from] CodecError),
}

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ============================================================================
// Submit Error Type
// ============================================================================

/// Why a tile submission was refused before reaching the server.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Still cooling down")]
    Cooldown,

    #[error("Tile ({row}, {col}) is off the board")]
    OutOfBounds { row: i32, col: i32 },

    #[error("Disconnected from server")]
    Disconnected,
}
