//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Board side length outside the supported range
    #[error("Invalid board dimension: {dim} (expected 1..={max})")]
    InvalidDimension { dim: u32, max: u32 },

    /// Tile coordinates outside the board
    #[error("Tile ({row}, {col}) is outside a {dim}x{dim} board")]
    OutOfBounds { row: i32, col: i32, dim: u32 },

    /// Palette index with no matching color
    #[error("Invalid color index: {0}")]
    InvalidColor(u8),

    /// Text that names no palette color
    #[error("Unknown color: {0:?}")]
    UnknownColor(String),

    /// Username rejected before reservation
    #[error("Invalid username {username:?}: {reason}")]
    InvalidUsername { username: String, reason: String },

    /// Snapshot data that does not describe a well-formed board
    #[error("Malformed board: {0}")]
    MalformedBoard(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
