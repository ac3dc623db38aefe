//! Client-side board model.
//!
//! The model is the local replica of the server's board. It starts from
//! the BOARD snapshot received at login and is advanced by every
//! TILE_CHANGED the listener receives. Views (console, bots) either read
//! it directly or register observers that fire for each applied tile.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::sync::atomic::{AtomicBool, Ordering};

use place_core::{Board, DomainResult, Tile};
use tokio::sync::RwLock;

/// Callback invoked with every tile applied to the model.
pub type Observer = Box<dyn Fn(&Tile) + Send + Sync>;

/// Local replica of the board plus the session flags the views need.
pub struct ClientModel {
    /// Side length, fixed for the lifetime of the connection
    dim: u32,

    board: RwLock<Board>,

    observers: RwLock<Vec<Observer>>,

    /// Whether the server currently accepts a CHANGE_TILE from us
    ready: AtomicBool,

    /// Cleared once the server connection is gone
    connected: AtomicBool,
}

impl ClientModel {
    /// Creates a model from the login snapshot.
    ///
    /// A fresh session is allowed to paint immediately.
    pub fn new(board: Board) -> Self {
        Self {
            dim: board.dim(),
            board: RwLock::new(board),
            observers: RwLock::new(Vec::new()),
            ready: AtomicBool::new(true),
            connected: AtomicBool::new(true),
        }
    }

    /// Returns the board side length.
    pub fn dim(&self) -> u32 {
        self.dim
    }

    /// Returns a copy of the current board.
    pub async fn snapshot(&self) -> Board {
        self.board.read().await.clone()
    }

    /// Returns a copy of one tile, or `None` off the board.
    pub async fn tile(&self, row: i32, col: i32) -> Option<Tile> {
        self.board.read().await.get(row, col).cloned()
    }

    /// Returns `true` if `(row, col)` is on the board.
    ///
    /// Any [`PlaceColor`](place_core::PlaceColor) may be painted, so only the
    /// coordinates need checking.
    pub fn is_valid_move(&self, row: i32, col: i32) -> bool {
        let on_board = |v: i32| u32::try_from(v).is_ok_and(|v| v < self.dim);
        on_board(row) && on_board(col)
    }

    /// Registers a callback fired after every applied tile.
    pub async fn add_observer<F>(&self, observer: F)
    where
        F: Fn(&Tile) + Send + Sync + 'static,
    {
        self.observers.write().await.push(Box::new(observer));
    }

    /// Applies an authoritative tile change and notifies observers.
    ///
    /// The server's timestamp is kept as-is.
    pub async fn apply(&self, tile: &Tile) -> DomainResult<Tile> {
        let applied = self.board.write().await.apply_at(tile, tile.timestamp())?;

        for observer in self.observers.read().await.iter() {
            observer(&applied);
        }
        Ok(applied)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Atomically takes the ready flag.
    ///
    /// Returns `false` (and leaves the flag alone) if the session is cooling down.
    pub(crate) fn take_ready(&self) -> bool {
        self.ready
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for ClientModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientModel")
            .field("dim", &self.dim)
            .field("ready", &self.is_ready())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
