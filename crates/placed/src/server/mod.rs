//! TCP server for Place.
//!
//! The server:
//! - Listens on a TCP port for client connections
//! - Assigns each connection a client id and spawns its session
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   PlaceServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │     Session     │────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └───────┬─────────┘     └────────┬────────┘
//!         │ outbound queue         │ fan-out
//!         ▼                        ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │  writer loop    │◀────│ member queues   │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Per-connection errors are logged and never stop the accept loop

mod session;

pub use session::{serve_connection, Session, SessionError, SessionSettings};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use place_core::{Board, DomainError};

use crate::config::ServerConfig;
use crate::registry::{spawn_registry, RegistryHandle};

/// TCP server accepting Place clients.
pub struct PlaceServer {
    /// Handle to the member registry
    registry: RegistryHandle,

    /// Timing and buffering applied to every session
    settings: SessionSettings,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating client IDs
    connection_counter: AtomicU64,
}

impl PlaceServer {
    /// Creates a new server.
    ///
    /// # Arguments
    ///
    /// * `registry` - Handle to the member registry
    /// * `settings` - Per-session settings
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        registry: RegistryHandle,
        settings: SessionSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            settings,
            cancel_token,
            connection_counter: AtomicU64::new(1),
        }
    }

    /// Creates a server with a fresh board and registry sized by `config`.
    ///
    /// Must be called inside a tokio runtime (the registry actor is spawned).
    pub fn from_config(
        config: &ServerConfig,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let board = Board::new(config.dim)?;
        let registry = spawn_registry(board);
        Ok(Self::new(
            registry,
            SessionSettings::from(config),
            cancel_token,
        ))
    }

    /// Returns a handle to the server's registry.
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Binds a TCP listener.
    ///
    /// This is the only fatal error the server produces.
    pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
        TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })
    }

    /// Binds `addr` and serves until cancelled.
    pub async fn run(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = Self::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serves an already-bound listener until the cancellation token is triggered.
    ///
    /// Cancelling the token also closes every open session.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        match listener.local_addr() {
            Ok(addr) => info!(addr = %addr, "Place server listening"),
            Err(e) => debug!(error = %e, "Listener has no local address"),
        }

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let client_id = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            debug!(client_id, peer = %peer, "Accepted connection");
                            self.handle_connection(stream, client_id);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!("Server stopped accepting connections");
        Ok(())
    }

    /// Spawns the session for a new connection.
    fn handle_connection(&self, stream: TcpStream, client_id: u64) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(client_id, error = %e, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let registry = self.registry.clone();
        let closer = self.cancel_token.child_token();
        let settings = self.settings;

        tokio::spawn(serve_connection(
            client_id,
            reader,
            writer,
            registry,
            closer,
            settings,
        ));
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Invalid board: {0}")]
    Board(#[from] DomainError),
}
