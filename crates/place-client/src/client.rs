//! Server connection for Place clients.
//!
//! This module provides the `NetworkClient` which handles:
//! - The TCP connection to the server
//! - The login handshake (LOGIN → LOGIN_SUCCESS → BOARD)
//! - A listener task applying server updates to the shared `ClientModel`
//! - Local validation and sending of tile changes
//!
//! # Connection Lifecycle
//!
//! 1. `connect` opens the socket
//! 2. `login` exchanges the handshake and builds the model from the snapshot;
//!    a rejected name leaves the connection usable for another attempt
//! 3. `start_listener` hands the read half to a background task
//! 4. `submit` sends CHANGE_TILE requests while the model is ready
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use place_core::{PlaceColor, Tile};
use place_protocol::{
    write_frame, ClientMessage, FrameReader, RejectReason, ServerMessage, MAX_SERVER_FRAME,
};

use crate::error::{ClientError, Result, SubmitError};
use crate::model::ClientModel;

type ServerReader = FrameReader<OwnedReadHalf>;

/// Identity granted by a successful login.
#[derive(Debug, Clone)]
struct Login {
    client_id: u64,
    username: String,
    model: Arc<ClientModel>,
}

/// A client connection to a Place server.
pub struct NetworkClient {
    /// Read half; moved into the listener task once it starts
    reader: Option<ServerReader>,

    writer: Mutex<OwnedWriteHalf>,

    login: Option<Login>,
}

impl NetworkClient {
    /// Connects to a server.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Connect` if the TCP connection cannot be opened.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(ClientError::Connect)?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: Some(FrameReader::new(reader, MAX_SERVER_FRAME)),
            writer: Mutex::new(writer),
            login: None,
        })
    }

    /// Logs in and returns the model built from the server's snapshot.
    ///
    /// # Errors
    ///
    /// - `ClientError::UsernameTaken` if the server refused the name; the
    ///   connection stays usable and `login` may be called again
    /// - `ClientError::AlreadyLoggedIn` on a second successful call
    /// - `ClientError::Disconnected` if the server hung up mid-handshake
    pub async fn login(&mut self, username: &str) -> Result<Arc<ClientModel>> {
        if self.login.is_some() {
            return Err(ClientError::AlreadyLoggedIn);
        }
        let reader = self.reader.as_mut().ok_or(ClientError::ListenerStarted)?;

        {
            let mut writer = self.writer.lock().await;
            write_frame(&mut *writer, &ClientMessage::login(username)).await?;
        }

        let client_id = match reader.next_frame::<ServerMessage>().await? {
            Some(ServerMessage::LoginSuccess(id)) => id,
            Some(ServerMessage::Error(name)) => {
                info!(username, "Username rejected");
                return Err(ClientError::UsernameTaken(name));
            }
            Some(other) => return Err(ClientError::UnexpectedMessage(other.kind())),
            None => return Err(ClientError::Disconnected),
        };

        let board = match reader.next_frame::<ServerMessage>().await? {
            Some(ServerMessage::Board(board)) => board,
            Some(other) => return Err(ClientError::UnexpectedMessage(other.kind())),
            None => return Err(ClientError::Disconnected),
        };

        info!(client_id, username, dim = board.dim(), "Logged in");

        let model = Arc::new(ClientModel::new(board));
        self.login = Some(Login {
            client_id,
            username: username.to_string(),
            model: model.clone(),
        });
        Ok(model)
    }

    /// Returns the id assigned by the server, once logged in.
    pub fn client_id(&self) -> Option<u64> {
        self.login.as_ref().map(|l| l.client_id)
    }

    /// Returns the logged-in username.
    pub fn username(&self) -> Option<&str> {
        self.login.as_ref().map(|l| l.username.as_str())
    }

    /// Returns the shared model, once logged in.
    pub fn model(&self) -> Option<Arc<ClientModel>> {
        self.login.as_ref().map(|l| l.model.clone())
    }

    /// Spawns the task that applies server updates to the model.
    ///
    /// The task ends when the server closes the connection, after marking
    /// the model disconnected.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotAuthenticated` before a successful login
    /// - `ClientError::ListenerStarted` if called twice
    pub fn start_listener(&mut self) -> Result<JoinHandle<()>> {
        let model = self
            .login
            .as_ref()
            .map(|l| l.model.clone())
            .ok_or(ClientError::NotAuthenticated)?;
        let reader = self.reader.take().ok_or(ClientError::ListenerStarted)?;

        Ok(tokio::spawn(listen(reader, model)))
    }

    /// Requests a repaint of `(row, col)`.
    ///
    /// The request is checked against the local model first. Once sent,
    /// the model stays not-ready until the server announces READY.
    ///
    /// # Errors
    ///
    /// - `SubmitError::NotAuthenticated` before login
    /// - `SubmitError::Disconnected` once the connection is gone
    /// - `SubmitError::OutOfBounds` for coordinates off the board
    /// - `SubmitError::Cooldown` while the previous change is cooling down
    pub async fn submit(
        &self,
        row: i32,
        col: i32,
        color: PlaceColor,
    ) -> std::result::Result<(), SubmitError> {
        let login = self.login.as_ref().ok_or(SubmitError::NotAuthenticated)?;
        let model = &login.model;

        if !model.is_connected() {
            return Err(SubmitError::Disconnected);
        }
        if !model.is_valid_move(row, col) {
            return Err(SubmitError::OutOfBounds { row, col });
        }
        if !model.take_ready() {
            return Err(SubmitError::Cooldown);
        }

        let request = ClientMessage::ChangeTile(Tile::new(row, col, color, &login.username));
        let mut writer = self.writer.lock().await;
        if let Err(e) = write_frame(&mut *writer, &request).await {
            warn!(error = %e, "Failed to send tile change");
            model.mark_disconnected();
            return Err(SubmitError::Disconnected);
        }

        debug!(row, col, color = %color, "Submitted tile change");
        Ok(())
    }

    /// Closes the write half, signalling the server we are leaving.
    pub async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!(error = %e, "Error shutting down connection");
        }
    }
}

/// Applies server messages to the model until the connection ends.
async fn listen(mut reader: ServerReader, model: Arc<ClientModel>) {
    loop {
        let msg = match reader.next_frame::<ServerMessage>().await {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Lost connection to server");
                break;
            }
        };

        match msg {
            ServerMessage::TileChanged(tile) => {
                if let Err(e) = model.apply(&tile).await {
                    warn!(error = %e, "Server sent a tile off the board");
                }
            }
            ServerMessage::Ready => {
                debug!("Cooldown over");
                model.set_ready(true);
            }
            ServerMessage::TileRejected(rejection) => match rejection.reason {
                RejectReason::Cooldown => {
                    debug!(row = rejection.row, col = rejection.col, "Change rejected, cooling down");
                    model.set_ready(false);
                }
                RejectReason::OutOfBounds => {
                    warn!(row = rejection.row, col = rejection.col, "Change rejected, off the board");
                    model.set_ready(true);
                }
            },
            ServerMessage::Error(reason) => {
                warn!(reason = %reason, "Server reported an error");
            }
            other => {
                warn!(kind = other.kind(), "Unexpected message after login");
            }
        }
    }

    model.mark_disconnected();
}
