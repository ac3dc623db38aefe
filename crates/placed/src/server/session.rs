//! Per-connection protocol state machine.
//!
//! Each accepted connection runs one [`Session`] alongside a writer loop
//! that drains the session's outbound queue to the socket:
//! - `UNAUTHENTICATED`: only LOGIN is accepted
//! - `ACTIVE`: CHANGE_TILE is accepted, gated by the cooldown
//!
//! The session never sleeps to throttle. The cooldown is a timer raced
//! against the next inbound frame, so disconnects are noticed at any time.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{sleep, timeout, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use place_core::Tile;
use place_protocol::{
    write_frame, ClientMessage, CodecError, FrameReader, RejectReason, ServerMessage,
    MAX_CLIENT_FRAME,
};

use crate::config::ServerConfig;
use crate::registry::{RegistryError, RegistryHandle};

// ============================================================================
// Settings
// ============================================================================

/// Per-session timing and buffering, taken from [`ServerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Minimum interval between accepted tile changes
    pub cooldown: Duration,
    /// Time allowed to complete login
    pub login_timeout: Duration,
    /// Time a single socket write may take
    pub write_timeout: Duration,
    /// Outbound queue capacity
    pub outbound_buffer: usize,
}

impl From<&ServerConfig> for SessionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            login_timeout: config.login_timeout(),
            write_timeout: config.write_timeout(),
            outbound_buffer: config.outbound_buffer,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Unauthenticated,
    Active { username: String },
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Active { .. } => "ACTIVE",
        }
    }
}

/// What woke the session loop.
enum SessionInput {
    Frame(Result<Option<ClientMessage>, CodecError>),
    CooldownElapsed,
    LoginTimeout,
    Closed,
}

/// Server-side state machine for one connected client.
pub struct Session<R> {
    client_id: u64,
    frames: FrameReader<R>,
    outbound: mpsc::Sender<ServerMessage>,
    registry: RegistryHandle,
    closer: CancellationToken,
    settings: SessionSettings,
    state: SessionState,
    /// Cooldown gate; only meaningful while ACTIVE
    ready: bool,
    cooldown: Option<Pin<Box<Sleep>>>,
}

impl<R: AsyncRead + Unpin> Session<R> {
    /// Creates a session in the UNAUTHENTICATED state.
    pub fn new(
        client_id: u64,
        reader: R,
        outbound: mpsc::Sender<ServerMessage>,
        registry: RegistryHandle,
        closer: CancellationToken,
        settings: SessionSettings,
    ) -> Self {
        Self {
            client_id,
            frames: FrameReader::new(reader, MAX_CLIENT_FRAME),
            outbound,
            registry,
            closer,
            settings,
            state: SessionState::Unauthenticated,
            ready: false,
            cooldown: None,
        }
    }

    /// Runs the session until the client leaves, misbehaves, or is closed.
    ///
    /// An ACTIVE session always deregisters itself before returning.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let result = self.process().await;

        if let SessionState::Active { username } = &self.state {
            self.registry.remove(username.as_str(), self.client_id).await;
        }

        result
    }

    async fn process(&mut self) -> Result<(), SessionError> {
        let login_deadline = sleep(self.settings.login_timeout);
        tokio::pin!(login_deadline);

        loop {
            let awaiting_login = self.state == SessionState::Unauthenticated;

            let input = tokio::select! {
                frame = self.frames.next_frame::<ClientMessage>() => SessionInput::Frame(frame),
                () = cooldown_elapsed(&mut self.cooldown) => SessionInput::CooldownElapsed,
                () = &mut login_deadline, if awaiting_login => SessionInput::LoginTimeout,
                () = self.closer.cancelled() => SessionInput::Closed,
            };

            match input {
                SessionInput::Frame(Ok(Some(msg))) => self.handle_message(msg).await?,
                SessionInput::Frame(Ok(None)) => {
                    debug!(client_id = self.client_id, "Client sent EOF");
                    return Ok(());
                }
                SessionInput::Frame(Err(e)) if e.is_protocol_violation() => {
                    let _ = self.send(ServerMessage::error(e.to_string()));
                    return Err(SessionError::Malformed(e));
                }
                SessionInput::Frame(Err(e)) => return Err(SessionError::Transport(e)),
                SessionInput::CooldownElapsed => {
                    self.cooldown = None;
                    self.ready = true;
                    self.send(ServerMessage::Ready)?;
                }
                SessionInput::LoginTimeout => {
                    let _ = self.send(ServerMessage::error("login timed out"));
                    return Err(SessionError::LoginTimeout);
                }
                SessionInput::Closed => {
                    debug!(client_id = self.client_id, "Session closed by server");
                    return Ok(());
                }
            }
        }
    }

    /// Dispatches one inbound message according to the current state.
    async fn handle_message(&mut self, msg: ClientMessage) -> Result<(), SessionError> {
        let active = match &self.state {
            SessionState::Active { username } => Some(username.clone()),
            SessionState::Unauthenticated => None,
        };

        match (active, msg) {
            (None, ClientMessage::Login(username)) => self.handle_login(username).await,
            (Some(username), ClientMessage::ChangeTile(tile)) => {
                self.handle_change_tile(username, tile).await
            }
            (_, other) => {
                let err = SessionError::UnexpectedMessage {
                    kind: other.kind(),
                    state: self.state.name(),
                };
                let _ = self.send(ServerMessage::error(err.to_string()));
                Err(err)
            }
        }
    }

    async fn handle_login(&mut self, username: String) -> Result<(), SessionError> {
        let reserved = self
            .registry
            .reserve(
                username.as_str(),
                self.client_id,
                self.outbound.clone(),
                self.closer.clone(),
            )
            .await;

        match reserved {
            Ok(()) => {
                info!(client_id = self.client_id, username = %username, "Client logged in");
                self.state = SessionState::Active { username };
                self.ready = true;
                Ok(())
            }
            Err(RegistryError::UsernameTaken(name))
            | Err(RegistryError::InvalidUsername { username: name, .. }) => {
                info!(client_id = self.client_id, username = %name, "Login rejected");
                self.send(ServerMessage::Error(name))
            }
            Err(e) => Err(SessionError::Registry(e)),
        }
    }

    async fn handle_change_tile(&mut self, username: String, tile: Tile) -> Result<(), SessionError> {
        if !self.ready {
            debug!(
                client_id = self.client_id,
                row = tile.row(),
                col = tile.col(),
                "Tile change during cooldown rejected"
            );
            return self.send(ServerMessage::rejected(&tile, RejectReason::Cooldown));
        }

        match self
            .registry
            .change_tile(username.as_str(), self.client_id, tile.clone())
            .await
        {
            Ok(_) => {
                self.ready = false;
                self.cooldown = Some(Box::pin(sleep(self.settings.cooldown)));
                Ok(())
            }
            Err(RegistryError::OutOfBounds { row, col }) => {
                debug!(client_id = self.client_id, row, col, "Out-of-bounds tile rejected");
                self.send(ServerMessage::rejected(&tile, RejectReason::OutOfBounds))
            }
            Err(e) => Err(SessionError::Registry(e)),
        }
    }

    /// Queues a message for this client only.
    fn send(&self, msg: ServerMessage) -> Result<(), SessionError> {
        self.outbound.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SessionError::SlowConsumer,
            TrySendError::Closed(_) => SessionError::OutboundClosed,
        })
    }
}

/// Completes when the cooldown timer fires; never completes without one.
async fn cooldown_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Connection driver
// ============================================================================

/// Serves one connection: runs the session and its writer to completion.
///
/// Messages queued before the session ends (for example a final ERROR) are
/// written before the socket is shut down.
pub async fn serve_connection<R, W>(
    client_id: u64,
    reader: R,
    writer: W,
    registry: RegistryHandle,
    closer: CancellationToken,
    settings: SessionSettings,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (outbound_tx, outbound_rx) = mpsc::channel(settings.outbound_buffer);

    let session = Session::new(
        client_id,
        reader,
        outbound_tx,
        registry,
        closer.clone(),
        settings,
    );

    let (result, ()) = tokio::join!(
        session.run(),
        write_outbound(client_id, writer, outbound_rx, settings.write_timeout, closer),
    );

    match result {
        Ok(()) => info!(client_id, "Client disconnected"),
        Err(e) if e.is_protocol_violation() => {
            warn!(client_id, error = %e, "Protocol violation, disconnecting");
        }
        Err(e) => info!(client_id, error = %e, "Client disconnected"),
    }
}

/// Drains the outbound queue to the socket until every sender is gone.
///
/// A failed or timed-out write closes the session through `closer`.
async fn write_outbound<W: AsyncWrite + Unpin>(
    client_id: u64,
    mut writer: W,
    mut outbound: mpsc::Receiver<ServerMessage>,
    write_timeout: Duration,
    closer: CancellationToken,
) {
    while let Some(msg) = outbound.recv().await {
        match timeout(write_timeout, write_frame(&mut writer, &msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(client_id, error = %e, "Write failed");
                closer.cancel();
                return;
            }
            Err(_) => {
                warn!(client_id, "Write timed out");
                closer.cancel();
                return;
            }
        }
    }

    let _ = writer.shutdown().await;
}

// ============================================================================
// Errors
// ============================================================================

/// Reasons a session ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Malformed frame: {0}")]
    Malformed(CodecError),

    #[error("Unexpected {kind} message in state {state}")]
    UnexpectedMessage {
        kind: &'static str,
        state: &'static str,
    },

    #[error("Login timed out")]
    LoginTimeout,

    #[error("Transport error: {0}")]
    Transport(CodecError),

    #[error("Outbound queue full")]
    SlowConsumer,

    #[error("Outbound queue closed")]
    OutboundClosed,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl SessionError {
    /// Returns `true` if the client broke the protocol.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::UnexpectedMessage { .. })
    }
}
