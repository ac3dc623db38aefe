//! Member registry using Actor pattern.
//!
//! The registry is the single exclusion domain of the server: it owns the
//! board and the set of active sessions. It receives commands via a tokio
//! mpsc channel and fans tile changes out to every member's outbound queue.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │     Session     │────▶│  RegistryActor  │────▶│ Member outbound  │
//! └─────────────────┘     └─────────────────┘     │  queues (mpsc)   │
//!         │                       │               └──────────────────┘
//!         │   RegistryCommand     │   RegistryEvent
//!         │   (mpsc channel)      │   (broadcast)
//!         ▼                       ▼
//!   Reserve/ChangeTile/     Board + HashMap<String,
//!   Remove                  Member>
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

use place_core::Board;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError, RegistryEvent, RemovalReason};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the RegistryActor, which takes ownership of `board`
/// 3. Returns a RegistryHandle for client use
///
/// The actor stops once every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use place_core::Board;
/// use placed::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let board = Board::new(100).unwrap();
///     let handle = spawn_registry(board);
///
///     let members = handle.members().await;
/// }
/// ```
pub fn spawn_registry(board: Board) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone(), board);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
