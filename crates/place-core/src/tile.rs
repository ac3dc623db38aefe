//! Tile value object.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::color::PlaceColor;
use crate::error::{DomainError, DomainResult};

/// Maximum username length in characters.
pub const MAX_USERNAME_LEN: usize = 32;

/// One addressable cell of the board.
///
/// Tiles are immutable values: repainting a cell produces a new `Tile`
/// (see [`Tile::with_owner`] and [`Tile::stamped`]) rather than mutating
/// the one stored on the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    row: i32,
    col: i32,
    color: PlaceColor,
    /// Username of the last painter; empty for untouched cells
    #[serde(default)]
    owner: String,
    /// Server time of the repaint in milliseconds since the Unix epoch; 0 for untouched cells
    #[serde(default)]
    timestamp: i64,
}

impl Tile {
    /// Creates an unstamped tile (timestamp 0).
    pub fn new(row: i32, col: i32, color: PlaceColor, owner: impl Into<String>) -> Self {
        Self {
            row,
            col,
            color,
            owner: owner.into(),
            timestamp: 0,
        }
    }

    /// Creates the default tile for a cell: index-0 color, no owner, timestamp 0.
    pub fn blank(row: i32, col: i32) -> Self {
        Self::new(row, col, PlaceColor::default(), "")
    }

    pub fn row(&self) -> i32 {
        self.row
    }

    pub fn col(&self) -> i32 {
        self.col
    }

    pub fn color(&self) -> PlaceColor {
        self.color
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns `true` if the cell has never been painted.
    pub fn is_original(&self) -> bool {
        self.timestamp == 0
    }

    /// Returns a copy of this tile attributed to `owner`.
    #[must_use]
    pub fn with_owner(&self, owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..self.clone()
        }
    }

    /// Returns a copy of this tile carrying the given timestamp.
    #[must_use]
    pub fn stamped(&self, timestamp: i64) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}", self.row, self.col, self.color)?;
        if !self.owner.is_empty() {
            write!(f, " by {}", self.owner)?;
        }
        Ok(())
    }
}

/// Checks that a username can be reserved.
///
/// Usernames must be 1..=32 characters with no control characters.
pub fn validate_username(username: &str) -> DomainResult<()> {
    let invalid = |reason: &str| DomainError::InvalidUsername {
        username: username.to_string(),
        reason: reason.to_string(),
    };

    if username.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(invalid("too long"));
    }
    if username.chars().any(char::is_control) {
        return Err(invalid("contains control characters"));
    }
    Ok(())
}
