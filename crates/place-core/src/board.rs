//! The authoritative grid of tiles.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::tile::Tile;

/// Largest supported board side.
pub const MAX_DIM: u32 = 256;

/// A square `dim x dim` grid of tiles, stored row-major.
///
/// Every cell always holds a tile: the board is fully populated at
/// construction and cells are only ever replaced, never removed.
/// The side length is fixed for the lifetime of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBoard")]
pub struct Board {
    dim: u32,
    tiles: Vec<Tile>,
}

/// Unchecked wire form of a board, validated into [`Board`].
#[derive(Deserialize)]
struct RawBoard {
    dim: u32,
    tiles: Vec<Tile>,
}

impl Board {
    /// Creates a board with every cell set to its blank tile.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidDimension` if `dim` is 0 or above [`MAX_DIM`].
    pub fn new(dim: u32) -> DomainResult<Self> {
        check_dim(dim)?;

        let side = dim as i32;
        let tiles = (0..side)
            .flat_map(|row| (0..side).map(move |col| Tile::blank(row, col)))
            .collect();

        Ok(Self { dim, tiles })
    }

    /// Returns the side length.
    pub fn dim(&self) -> u32 {
        self.dim
    }

    /// Returns `true` if `(row, col)` lies on the board.
    pub fn contains(&self, row: i32, col: i32) -> bool {
        self.index_of(row, col).is_some()
    }

    /// Returns `true` if the tile's coordinates lie on the board.
    ///
    /// Color validity is guaranteed by [`crate::PlaceColor`] itself.
    pub fn is_valid(&self, tile: &Tile) -> bool {
        self.contains(tile.row(), tile.col())
    }

    /// Returns the tile at `(row, col)`, or `None` off the board.
    pub fn get(&self, row: i32, col: i32) -> Option<&Tile> {
        self.index_of(row, col).and_then(|i| self.tiles.get(i))
    }

    /// Stores `tile` stamped with the current server time.
    ///
    /// Returns the stored tile, which is what observers should see.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfBounds` without touching the board if the
    /// coordinates are invalid.
    pub fn apply(&mut self, tile: &Tile) -> DomainResult<Tile> {
        self.apply_at(tile, Utc::now().timestamp_millis())
    }

    /// Stores `tile` stamped with `timestamp`, replacing the cell's tile.
    ///
    /// Any timestamp carried by `tile` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfBounds` without touching the board if the
    /// coordinates are invalid.
    pub fn apply_at(&mut self, tile: &Tile, timestamp: i64) -> DomainResult<Tile> {
        let slot = self
            .index_of(tile.row(), tile.col())
            .and_then(|i| self.tiles.get_mut(i))
            .ok_or(DomainError::OutOfBounds {
                row: tile.row(),
                col: tile.col(),
                dim: self.dim,
            })?;

        let stored = tile.stamped(timestamp);
        *slot = stored.clone();
        Ok(stored)
    }

    /// Returns all tiles in row-major order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Iterates over the rows of the board.
    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> {
        self.tiles.chunks(self.dim as usize)
    }

    fn index_of(&self, row: i32, col: i32) -> Option<usize> {
        let row = u32::try_from(row).ok().filter(|r| *r < self.dim)?;
        let col = u32::try_from(col).ok().filter(|c| *c < self.dim)?;
        usize::try_from(row * self.dim + col).ok()
    }
}

impl TryFrom<RawBoard> for Board {
    type Error = DomainError;

    fn try_from(raw: RawBoard) -> Result<Self, Self::Error> {
        check_dim(raw.dim)?;

        let expected = (raw.dim as usize) * (raw.dim as usize);
        if raw.tiles.len() != expected {
            return Err(DomainError::MalformedBoard(format!(
                "expected {expected} tiles, got {}",
                raw.tiles.len()
            )));
        }

        let side = raw.dim as usize;
        for (i, tile) in raw.tiles.iter().enumerate() {
            let row = usize::try_from(tile.row()).ok();
            let col = usize::try_from(tile.col()).ok();
            if row != Some(i / side) || col != Some(i % side) {
                return Err(DomainError::MalformedBoard(format!(
                    "tile {tile} stored at position {i}"
                )));
            }
        }

        Ok(Self {
            dim: raw.dim,
            tiles: raw.tiles,
        })
    }
}

fn check_dim(dim: u32) -> DomainResult<()> {
    if dim == 0 || dim > MAX_DIM {
        return Err(DomainError::InvalidDimension { dim, max: MAX_DIM });
    }
    Ok(())
}
