//! Place Core - Shared types for the shared-canvas server
//!
//! This crate provides the domain types shared between
//! the server (placed) and the clients (place).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod board;
pub mod color;
pub mod error;
pub mod tile;

// Re-exports for convenience
pub use board::{Board, MAX_DIM};
pub use color::PlaceColor;
pub use error::{DomainError, DomainResult};
pub use tile::{validate_username, Tile, MAX_USERNAME_LEN};
