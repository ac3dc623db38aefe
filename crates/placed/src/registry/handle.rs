//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to registry events.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use place_core::{Board, Tile};
use place_protocol::ServerMessage;

use super::commands::{RegistryCommand, RegistryError, RegistryEvent};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let handle = registry_handle.clone();
///
/// // Join as "alice"; LOGIN_SUCCESS and BOARD land on `outbound_tx`
/// handle.reserve("alice", 1, outbound_tx, closer).await?;
///
/// // Paint a tile and broadcast it to every member
/// let applied = handle.change_tile("alice", 1, tile).await?;
///
/// // Observe registry activity
/// let mut rx = handle.subscribe();
/// while let Ok(event) = rx.recv().await {
///     // Handle event
/// }
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<RegistryEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `event_sender` - The broadcast sender for subscribing to events
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<RegistryEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Reserve `username` for the connection `client_id`.
    ///
    /// On success `LOGIN_SUCCESS` and the `BOARD` snapshot have already been
    /// queued on `outbound`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::UsernameTaken` if an active member holds the name
    /// - `RegistryError::InvalidUsername` if the name is not acceptable
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn reserve(
        &self,
        username: impl Into<String>,
        client_id: u64,
        outbound: mpsc::Sender<ServerMessage>,
        closer: CancellationToken,
    ) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Reserve {
                username: username.into(),
                client_id,
                outbound,
                closer,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Release `username` if `client_id` still holds it.
    ///
    /// Returns `false` if nothing was removed or the actor has shut down.
    pub async fn remove(&self, username: impl Into<String>, client_id: u64) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Remove {
                username: username.into(),
                client_id,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Apply a tile change for a member and broadcast it.
    ///
    /// Returns the tile as stored (owner and timestamp set by the server).
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotRegistered` if the connection holds no membership
    /// - `RegistryError::OutOfBounds` if the coordinates are off the board
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn change_tile(
        &self,
        username: impl Into<String>,
        client_id: u64,
        tile: Tile,
    ) -> Result<Tile, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::ChangeTile {
                username: username.into(),
                client_id,
                tile,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Get a full copy of the board.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn get_board(&self) -> Result<Board, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::GetBoard { respond_to: tx })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Get a single tile.
    ///
    /// Returns `None` if the coordinates are off the board or the actor has shut down.
    pub async fn get_tile(&self, row: i32, col: i32) -> Option<Tile> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::GetTile {
                row,
                col,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return None;
        }

        rx.await.ok().flatten()
    }

    /// Get the usernames of all members, sorted.
    ///
    /// Returns an empty vector if the actor has shut down.
    pub async fn members(&self) -> Vec<String> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Members { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Subscribe to registry events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_sender.subscribe()
    }

    /// Returns `true` while the actor is accepting commands.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
