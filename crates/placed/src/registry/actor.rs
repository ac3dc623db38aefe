//! Registry actor - owns the board and the member set, processes commands.
//!
//! The RegistryActor is the single owner of shared state in the server.
//! It receives commands via an mpsc channel and publishes events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use place_core::{validate_username, Board, DomainError, Tile};
use place_protocol::ServerMessage;

use super::commands::{RegistryCommand, RegistryError, RegistryEvent, RemovalReason};

// ============================================================================
// Members
// ============================================================================

/// A connection that holds a username.
#[derive(Debug)]
struct Member {
    /// Connection number assigned by the listener
    client_id: u64,

    /// Bounded queue drained by the connection's writer task
    outbound: mpsc::Sender<ServerMessage>,

    /// Cancelled to close the connection when it is evicted
    closer: CancellationToken,
}

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns the board and all members.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and publishes events to observers.
///
/// # Ownership
///
/// The actor owns:
/// - `board`: the authoritative grid
/// - `members`: username → member, the set of ACTIVE sessions
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands sequentially.
/// A tile change is applied and fanned out to every member inside one
/// command, so no member can join between the two steps.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// The authoritative board
    board: Board,

    /// Active members keyed by username
    members: HashMap<String, Member>,

    /// Event publisher for in-process observers
    event_publisher: broadcast::Sender<RegistryEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    /// * `board` - The board the actor takes ownership of
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<RegistryEvent>,
        board: Board,
    ) -> Self {
        Self {
            receiver,
            board,
            members: HashMap::new(),
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!(dim = self.board.dim(), "Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(members = self.members.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Reserve {
                username,
                client_id,
                outbound,
                closer,
                respond_to,
            } => {
                let result = self.handle_reserve(username, client_id, outbound, closer);
                // Ignore send error - the session may have gone away
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove {
                username,
                client_id,
                respond_to,
            } => {
                let result = self.handle_remove(&username, client_id);
                let _ = respond_to.send(result);
            }
            RegistryCommand::ChangeTile {
                username,
                client_id,
                tile,
                respond_to,
            } => {
                let result = self.handle_change_tile(&username, client_id, &tile);
                let _ = respond_to.send(result);
            }
            RegistryCommand::GetBoard { respond_to } => {
                let _ = respond_to.send(self.board.clone());
            }
            RegistryCommand::GetTile {
                row,
                col,
                respond_to,
            } => {
                let _ = respond_to.send(self.board.get(row, col).cloned());
            }
            RegistryCommand::Members { respond_to } => {
                let mut names: Vec<String> = self.members.keys().cloned().collect();
                names.sort();
                let _ = respond_to.send(names);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Handles a username reservation.
    fn handle_reserve(
        &mut self,
        username: String,
        client_id: u64,
        outbound: mpsc::Sender<ServerMessage>,
        closer: CancellationToken,
    ) -> Result<(), RegistryError> {
        validate_username(&username).map_err(|e| match e {
            DomainError::InvalidUsername { username, reason } => {
                RegistryError::InvalidUsername { username, reason }
            }
            other => RegistryError::InvalidUsername {
                username: username.clone(),
                reason: other.to_string(),
            },
        })?;

        if let Some(holder) = self.members.get(&username) {
            debug!(
                username = %username,
                client_id,
                holder = holder.client_id,
                "Username already held"
            );
            return Err(RegistryError::UsernameTaken(username));
        }

        // Queue the handshake replies before admitting, so the snapshot is
        // ordered ahead of any broadcast this member can receive.
        let greeting = outbound
            .try_send(ServerMessage::LoginSuccess(client_id))
            .and_then(|()| outbound.try_send(ServerMessage::Board(self.board.clone())));
        if let Err(e) = greeting {
            debug!(client_id, error = %e, "Could not queue login replies");
            return Err(match e {
                TrySendError::Full(_) => RegistryError::QueueFull,
                TrySendError::Closed(_) => RegistryError::ChannelClosed,
            });
        }

        self.members.insert(
            username.clone(),
            Member {
                client_id,
                outbound,
                closer,
            },
        );

        info!(
            username = %username,
            client_id,
            members = self.members.len(),
            "Member joined"
        );

        let _ = self
            .event_publisher
            .send(RegistryEvent::Joined { username, client_id });

        Ok(())
    }

    /// Handles removing a member. Returns `true` if one was removed.
    fn handle_remove(&mut self, username: &str, client_id: u64) -> bool {
        let held = self
            .members
            .get(username)
            .is_some_and(|m| m.client_id == client_id);
        if !held {
            debug!(username = %username, client_id, "Remove of absent member ignored");
            return false;
        }

        self.evict(username, RemovalReason::Disconnected);
        true
    }

    /// Handles a tile change: apply, then fan out to every member.
    fn handle_change_tile(
        &mut self,
        username: &str,
        client_id: u64,
        tile: &Tile,
    ) -> Result<Tile, RegistryError> {
        let is_member = self
            .members
            .get(username)
            .is_some_and(|m| m.client_id == client_id);
        if !is_member {
            return Err(RegistryError::NotRegistered(username.to_string()));
        }

        let applied = self
            .board
            .apply(&tile.with_owner(username))
            .map_err(|_| RegistryError::OutOfBounds {
                row: tile.row(),
                col: tile.col(),
            })?;

        debug!(
            username = %username,
            row = applied.row(),
            col = applied.col(),
            color = %applied.color(),
            "Tile applied"
        );

        self.broadcast(ServerMessage::TileChanged(applied.clone()));

        let _ = self.event_publisher.send(RegistryEvent::TileChanged {
            tile: applied.clone(),
        });

        Ok(applied)
    }

    // ========================================================================
    // Fan-out
    // ========================================================================

    /// Queues `msg` for every member without waiting.
    ///
    /// Members whose queue is full or closed are evicted; the rest are
    /// unaffected.
    fn broadcast(&mut self, msg: ServerMessage) {
        let mut dropped = Vec::new();

        for (username, member) in &self.members {
            match member.outbound.try_send(msg.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped.push((username.clone(), RemovalReason::SlowConsumer));
                }
                Err(TrySendError::Closed(_)) => {
                    dropped.push((username.clone(), RemovalReason::ChannelClosed));
                }
            }
        }

        for (username, reason) in dropped {
            self.evict(&username, reason);
        }
    }

    /// Removes a member, closes its connection, and publishes `Left`.
    fn evict(&mut self, username: &str, reason: RemovalReason) {
        let Some(member) = self.members.remove(username) else {
            return;
        };

        member.closer.cancel();

        if reason == RemovalReason::Disconnected {
            info!(
                username = %username,
                client_id = member.client_id,
                remaining = self.members.len(),
                "Member left"
            );
        } else {
            warn!(
                username = %username,
                client_id = member.client_id,
                reason = %reason,
                remaining = self.members.len(),
                "Member evicted"
            );
        }

        let _ = self.event_publisher.send(RegistryEvent::Left {
            username: username.to_string(),
            client_id: member.client_id,
            reason,
        });
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of members currently registered.
    #[cfg(test)]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use place_core::PlaceColor;
    use tokio::sync::oneshot;

    fn create_actor(
        dim: u32,
    ) -> (
        mpsc::Sender<RegistryCommand>,
        RegistryActor,
        broadcast::Receiver<RegistryEvent>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = broadcast::channel(16);
        let board = Board::new(dim).unwrap();
        let actor = RegistryActor::new(cmd_rx, event_tx, board);
        (cmd_tx, actor, event_rx)
    }

    struct TestMember {
        rx: mpsc::Receiver<ServerMessage>,
        closer: CancellationToken,
    }

    fn reserve(
        actor: &mut RegistryActor,
        username: &str,
        client_id: u64,
        buffer: usize,
    ) -> (oneshot::Receiver<Result<(), RegistryError>>, TestMember) {
        let (out_tx, out_rx) = mpsc::channel(buffer);
        let closer = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Reserve {
            username: username.to_string(),
            client_id,
            outbound: out_tx,
            closer: closer.clone(),
            respond_to: tx,
        });
        (rx, TestMember { rx: out_rx, closer })
    }

    fn change(
        actor: &mut RegistryActor,
        username: &str,
        client_id: u64,
        tile: Tile,
    ) -> oneshot::Receiver<Result<Tile, RegistryError>> {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::ChangeTile {
            username: username.to_string(),
            client_id,
            tile,
            respond_to: tx,
        });
        rx
    }

    #[tokio::test]
    async fn test_reserve_queues_login_reply_and_snapshot() {
        let (cmd_tx, mut actor, mut event_rx) = create_actor(3);

        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (respond_tx, respond_rx) = oneshot::channel();
        cmd_tx
            .send(RegistryCommand::Reserve {
                username: "alice".to_string(),
                client_id: 1,
                outbound: out_tx,
                closer: CancellationToken::new(),
                respond_to: respond_tx,
            })
            .await
            .unwrap();

        // Process the command manually (actor not running in background)
        if let Some(cmd) = actor.receiver.recv().await {
            actor.handle_command(cmd);
        }

        assert!(respond_rx.await.unwrap().is_ok());
        assert_eq!(actor.member_count(), 1);

        assert_eq!(out_rx.try_recv().unwrap(), ServerMessage::LoginSuccess(1));
        match out_rx.try_recv().unwrap() {
            ServerMessage::Board(board) => assert_eq!(board, Board::new(3).unwrap()),
            other => panic!("Expected Board, got {other:?}"),
        }

        let event = event_rx.try_recv().unwrap();
        assert!(matches!(event, RegistryEvent::Joined { client_id: 1, .. }));
    }

    #[tokio::test]
    async fn test_reserve_without_room_for_snapshot_is_queue_full() {
        let (_, mut actor, _) = create_actor(3);

        let (result, mut member) = reserve(&mut actor, "alice", 1, 1);

        assert_eq!(result.await.unwrap(), Err(RegistryError::QueueFull));
        assert_eq!(actor.member_count(), 0);
        assert_eq!(member.rx.try_recv().unwrap(), ServerMessage::LoginSuccess(1));

        // The name stays free
        let (retry, _member) = reserve(&mut actor, "alice", 2, 8);
        assert!(retry.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_reserve_with_closed_queue_is_channel_closed() {
        let (_, mut actor, _) = create_actor(3);

        let (out_tx, out_rx) = mpsc::channel(8);
        drop(out_rx);
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Reserve {
            username: "bob".to_string(),
            client_id: 2,
            outbound: out_tx,
            closer: CancellationToken::new(),
            respond_to: tx,
        });

        assert_eq!(rx.await.unwrap(), Err(RegistryError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_reserve_duplicate_fails() {
        let (_, mut actor, _) = create_actor(3);

        let (first, _alice) = reserve(&mut actor, "alice", 1, 8);
        let (second, mut impostor) = reserve(&mut actor, "alice", 2, 8);

        assert!(first.await.unwrap().is_ok());
        assert_eq!(
            second.await.unwrap(),
            Err(RegistryError::UsernameTaken("alice".to_string()))
        );
        assert_eq!(actor.member_count(), 1);
        assert!(impostor.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reserve_invalid_username() {
        let (_, mut actor, _) = create_actor(3);

        let (rx, _member) = reserve(&mut actor, "", 1, 8);
        assert!(matches!(
            rx.await.unwrap(),
            Err(RegistryError::InvalidUsername { .. })
        ));
        assert_eq!(actor.member_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_, mut actor, mut event_rx) = create_actor(3);
        let (_, _alice) = reserve(&mut actor, "alice", 1, 8);
        let _ = event_rx.try_recv();

        for expected in [true, false] {
            let (tx, rx) = oneshot::channel();
            actor.handle_command(RegistryCommand::Remove {
                username: "alice".to_string(),
                client_id: 1,
                respond_to: tx,
            });
            assert_eq!(rx.await.unwrap(), expected);
        }

        assert_eq!(actor.member_count(), 0);
        let event = event_rx.try_recv().unwrap();
        assert!(matches!(
            event,
            RegistryEvent::Left {
                reason: RemovalReason::Disconnected,
                ..
            }
        ));
        assert!(event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_remove_does_not_evict_new_holder() {
        let (_, mut actor, _) = create_actor(3);
        let (_, _alice) = reserve(&mut actor, "alice", 7, 8);

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Remove {
            username: "alice".to_string(),
            client_id: 3,
            respond_to: tx,
        });

        assert!(!rx.await.unwrap());
        assert_eq!(actor.member_count(), 1);
    }

    #[tokio::test]
    async fn test_change_tile_broadcasts_to_all_members_including_sender() {
        let (_, mut actor, _) = create_actor(3);
        let (_, mut alice) = reserve(&mut actor, "alice", 1, 8);
        let (_, mut bob) = reserve(&mut actor, "bob", 2, 8);
        for m in [&mut alice, &mut bob] {
            let _ = m.rx.try_recv();
            let _ = m.rx.try_recv();
        }

        let rx = change(
            &mut actor,
            "alice",
            1,
            Tile::new(1, 1, PlaceColor::Gray, "mallory"),
        );
        let applied = rx.await.unwrap().unwrap();

        assert_eq!(applied.owner(), "alice");
        assert!(applied.timestamp() > 0);
        for m in [&mut alice, &mut bob] {
            assert_eq!(
                m.rx.try_recv().unwrap(),
                ServerMessage::TileChanged(applied.clone())
            );
        }
    }

    #[tokio::test]
    async fn test_change_tile_rejects_non_member() {
        let (_, mut actor, _) = create_actor(3);
        let rx = change(&mut actor, "ghost", 1, Tile::new(0, 0, PlaceColor::Red, ""));
        assert_eq!(
            rx.await.unwrap(),
            Err(RegistryError::NotRegistered("ghost".to_string()))
        );
    }

    #[tokio::test]
    async fn test_change_tile_out_of_bounds_leaves_board() {
        let (_, mut actor, _) = create_actor(3);
        let (_, mut alice) = reserve(&mut actor, "alice", 1, 8);
        let _ = alice.rx.try_recv();
        let _ = alice.rx.try_recv();

        let rx = change(&mut actor, "alice", 1, Tile::new(3, 0, PlaceColor::Red, ""));
        assert_eq!(
            rx.await.unwrap(),
            Err(RegistryError::OutOfBounds { row: 3, col: 0 })
        );
        assert_eq!(actor.board, Board::new(3).unwrap());
        assert!(alice.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_evicts_only_that_member() {
        let (_, mut actor, mut event_rx) = create_actor(3);
        // Buffer of two is filled by the login replies.
        let (_, stalled) = reserve(&mut actor, "stalled", 1, 2);
        let (_, mut healthy) = reserve(&mut actor, "healthy", 2, 8);
        let _ = healthy.rx.try_recv();
        let _ = healthy.rx.try_recv();
        while event_rx.try_recv().is_ok() {}

        let rx = change(
            &mut actor,
            "healthy",
            2,
            Tile::new(0, 0, PlaceColor::Red, ""),
        );
        assert!(rx.await.unwrap().is_ok());

        assert!(stalled.closer.is_cancelled());
        assert!(!healthy.closer.is_cancelled());
        assert!(matches!(
            healthy.rx.try_recv().unwrap(),
            ServerMessage::TileChanged(_)
        ));
        assert_eq!(actor.member_count(), 1);

        let event = event_rx.try_recv().unwrap();
        assert!(matches!(
            event,
            RegistryEvent::Left {
                reason: RemovalReason::SlowConsumer,
                client_id: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_closed_queue_evicted_on_broadcast() {
        let (_, mut actor, _) = create_actor(3);
        let (_, gone) = reserve(&mut actor, "gone", 1, 8);
        let (_, _stay) = reserve(&mut actor, "stay", 2, 8);
        drop(gone.rx);

        let rx = change(&mut actor, "stay", 2, Tile::new(2, 2, PlaceColor::Blue, ""));
        assert!(rx.await.unwrap().is_ok());

        assert!(gone.closer.is_cancelled());
        assert_eq!(actor.member_count(), 1);
    }

    #[tokio::test]
    async fn test_queries() {
        let (_, mut actor, _) = create_actor(2);
        let (_, _b) = reserve(&mut actor, "bob", 2, 8);
        let (_, _a) = reserve(&mut actor, "alice", 1, 8);
        let _ = change(&mut actor, "bob", 2, Tile::new(1, 0, PlaceColor::Lime, ""));

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Members { respond_to: tx });
        assert_eq!(rx.await.unwrap(), vec!["alice", "bob"]);

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::GetTile {
            row: 1,
            col: 0,
            respond_to: tx,
        });
        let tile = rx.await.unwrap().unwrap();
        assert_eq!(tile.color(), PlaceColor::Lime);
        assert_eq!(tile.owner(), "bob");

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::GetTile {
            row: 5,
            col: 0,
            respond_to: tx,
        });
        assert!(rx.await.unwrap().is_none());

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::GetBoard { respond_to: tx });
        assert_eq!(rx.await.unwrap().get(1, 0), Some(&tile));
    }
}
