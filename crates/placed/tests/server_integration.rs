//! Integration tests for the TCP server.
//!
//! These tests drive the PlaceServer over real TCP connections, covering the
//! login handshake, tile changes, cooldown, broadcast and disconnect handling.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

use std::net::SocketAddr;
use std::time::Duration;

use place_core::{Board, PlaceColor, Tile};
use place_protocol::{ClientMessage, RejectReason, ServerMessage};
use placed::config::ServerConfig;
use placed::registry::RegistryHandle;
use placed::server::PlaceServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for any single server message
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait when asserting that nothing arrives
const QUIET_PERIOD: Duration = Duration::from_millis(150);

/// Grace period for server shutdown
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

/// Test server context that manages server lifecycle.
struct TestServer {
    addr: SocketAddr,
    cancel_token: CancellationToken,
    registry: RegistryHandle,
}

impl TestServer {
    /// Spawns a server on an ephemeral port.
    async fn spawn(dim: u32, cooldown_ms: u64) -> Self {
        let config = ServerConfig {
            dim,
            cooldown_ms,
            ..ServerConfig::default()
        };
        let cancel_token = CancellationToken::new();
        let server = PlaceServer::from_config(&config, cancel_token.clone()).unwrap();
        let registry = server.registry().clone();

        let listener = PlaceServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        Self {
            addr,
            cancel_token,
            registry,
        }
    }

    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect to server");
        TestClient::new(stream)
    }

    /// Connects and logs in, returning the client and its id.
    async fn login(&self, username: &str) -> (TestClient, u64, Board) {
        let mut client = self.connect().await;
        let (id, board) = client.login(username).await;
        (client, id, board)
    }

    async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

/// Test client connection with protocol helpers.
struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, msg: ClientMessage) {
        let json = serde_json::to_string(&msg).unwrap();
        self.send_raw(&json).await;
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receives the next message, or `None` if the server closed the connection.
    async fn try_recv(&mut self) -> Option<ServerMessage> {
        let mut line = String::new();
        let n = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for server")
            .ok()?;
        if n == 0 {
            return None;
        }
        Some(serde_json::from_str(&line).unwrap())
    }

    async fn recv(&mut self) -> ServerMessage {
        self.try_recv().await.expect("connection closed")
    }

    /// Asserts that nothing arrives for a short while.
    async fn assert_quiet(&mut self) {
        let mut line = String::new();
        let result = timeout(QUIET_PERIOD, self.reader.read_line(&mut line)).await;
        assert!(result.is_err(), "unexpected message: {line}");
    }

    /// Asserts that the server closes the connection.
    async fn assert_closed(&mut self) {
        loop {
            if self.try_recv().await.is_none() {
                return;
            }
        }
    }

    async fn login(&mut self, username: &str) -> (u64, Board) {
        self.send(ClientMessage::login(username)).await;
        let id = match self.recv().await {
            ServerMessage::LoginSuccess(id) => id,
            other => panic!("Expected LoginSuccess, got {other:?}"),
        };
        match self.recv().await {
            ServerMessage::Board(board) => (id, board),
            other => panic!("Expected Board, got {other:?}"),
        }
    }

    async fn paint(&mut self, row: i32, col: i32, color: PlaceColor) {
        self.send(ClientMessage::change_tile(row, col, color, ""))
            .await;
    }

    async fn expect_tile_changed(&mut self) -> Tile {
        match self.recv().await {
            ServerMessage::TileChanged(tile) => tile,
            other => panic!("Expected TileChanged, got {other:?}"),
        }
    }
}

// ============================================================================
// Login Tests
// ============================================================================

#[tokio::test]
async fn test_login_receives_id_then_default_board() {
    let server = TestServer::spawn(3, 1000).await;
    let (_client, id, board) = server.login("alice").await;

    assert!(id >= 1);
    assert_eq!(board, Board::new(3).unwrap());
    assert_eq!(server.registry.members().await, vec!["alice"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_client_ids_are_distinct() {
    let server = TestServer::spawn(3, 1000).await;
    let (_a, id_a, _) = server.login("alice").await;
    let (_b, id_b, _) = server.login("bob").await;

    assert_ne!(id_a, id_b);

    server.shutdown().await;
}

#[tokio::test]
async fn test_taken_username_gets_error_and_may_retry() {
    let server = TestServer::spawn(3, 1000).await;
    let (_alice, _, _) = server.login("alice").await;

    let mut second = server.connect().await;
    second.send(ClientMessage::login("alice")).await;
    assert_eq!(second.recv().await, ServerMessage::Error("alice".to_string()));

    // Still UNAUTHENTICATED: a different name succeeds on the same connection
    let (_, board) = second.login("alicia").await;
    assert_eq!(board.dim(), 3);
    assert_eq!(server.registry.members().await, vec!["alice", "alicia"]);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_username_exactly_one_wins() {
    let server = TestServer::spawn(3, 1000).await;

    let mut a = server.connect().await;
    let mut b = server.connect().await;
    tokio::join!(
        a.send(ClientMessage::login("alice")),
        b.send(ClientMessage::login("alice"))
    );

    let (ra, rb) = tokio::join!(a.recv(), b.recv());
    let wins = [&ra, &rb]
        .iter()
        .filter(|m| matches!(m, ServerMessage::LoginSuccess(_)))
        .count();
    let errors = [&ra, &rb]
        .iter()
        .filter(|m| **m == &ServerMessage::Error("alice".to_string()))
        .count();

    assert_eq!(wins, 1, "got {ra:?} and {rb:?}");
    assert_eq!(errors, 1, "got {ra:?} and {rb:?}");
    assert_eq!(server.registry.members().await, vec!["alice"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_username_reusable_after_disconnect() {
    let server = TestServer::spawn(3, 1000).await;
    let (alice, _, _) = server.login("alice").await;
    drop(alice);

    // Deregistration is asynchronous; wait for it
    for _ in 0..50 {
        if server.registry.members().await.is_empty() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    let (_again, _, _) = server.login("alice").await;
    assert_eq!(server.registry.members().await, vec!["alice"]);

    server.shutdown().await;
}

// ============================================================================
// Tile Change Tests
// ============================================================================

#[tokio::test]
async fn test_change_is_broadcast_and_reflected_in_later_snapshot() {
    let server = TestServer::spawn(3, 1000).await;
    let (mut a, _, _) = server.login("A").await;

    a.paint(1, 1, PlaceColor::Gray).await;
    let applied = a.expect_tile_changed().await;

    assert_eq!((applied.row(), applied.col()), (1, 1));
    assert_eq!(applied.color().index(), 2);
    assert_eq!(applied.owner(), "A");
    assert!(applied.timestamp() > 0);

    let (_b, _, board) = server.login("B").await;
    assert_eq!(board.get(1, 1), Some(&applied));

    server.shutdown().await;
}

#[tokio::test]
async fn test_server_overwrites_owner_and_timestamp() {
    let server = TestServer::spawn(3, 1000).await;
    let (mut a, _, _) = server.login("alice").await;

    let forged = Tile::new(0, 0, PlaceColor::Red, "mallory").stamped(42);
    a.send(ClientMessage::ChangeTile(forged)).await;

    let applied = a.expect_tile_changed().await;
    assert_eq!(applied.owner(), "alice");
    assert_ne!(applied.timestamp(), 42);

    server.shutdown().await;
}

#[tokio::test]
async fn test_back_to_back_changes_second_rejected_for_cooldown() {
    let server = TestServer::spawn(3, 300).await;
    let (mut a, _, _) = server.login("A").await;

    a.paint(0, 0, PlaceColor::Red).await;
    a.paint(0, 1, PlaceColor::Blue).await;

    let applied = a.expect_tile_changed().await;
    assert_eq!((applied.row(), applied.col()), (0, 0));

    match a.recv().await {
        ServerMessage::TileRejected(r) => {
            assert_eq!(r.reason, RejectReason::Cooldown);
            assert_eq!((r.row, r.col), (0, 1));
        }
        other => panic!("Expected TileRejected, got {other:?}"),
    }

    let board = server.registry.get_board().await.unwrap();
    assert_eq!(board.get(0, 0).unwrap().color(), PlaceColor::Red);
    assert!(board.get(0, 1).unwrap().is_original());

    server.shutdown().await;
}

#[tokio::test]
async fn test_rejection_during_cooldown_is_idempotent() {
    let server = TestServer::spawn(3, 400).await;
    let (mut a, _, _) = server.login("A").await;
    let (mut watcher, _, _) = server.login("W").await;

    a.paint(2, 2, PlaceColor::Navy).await;
    a.expect_tile_changed().await;
    watcher.expect_tile_changed().await;
    let before = server.registry.get_board().await.unwrap();

    for _ in 0..2 {
        a.paint(2, 0, PlaceColor::Lime).await;
        assert!(matches!(a.recv().await, ServerMessage::TileRejected(_)));
    }

    assert_eq!(server.registry.get_board().await.unwrap(), before);
    watcher.assert_quiet().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_ready_after_cooldown_then_change_accepted() {
    let server = TestServer::spawn(3, 100).await;
    let (mut a, _, _) = server.login("A").await;

    a.paint(0, 0, PlaceColor::Red).await;
    a.expect_tile_changed().await;
    assert_eq!(a.recv().await, ServerMessage::Ready);

    a.paint(0, 0, PlaceColor::Blue).await;
    let second = a.expect_tile_changed().await;
    assert_eq!(second.color(), PlaceColor::Blue);

    server.shutdown().await;
}

#[tokio::test]
async fn test_ready_is_sent_only_to_painter() {
    let server = TestServer::spawn(3, 100).await;
    let (mut a, _, _) = server.login("A").await;
    let (mut b, _, _) = server.login("B").await;

    a.paint(1, 0, PlaceColor::Red).await;
    a.expect_tile_changed().await;
    b.expect_tile_changed().await;

    assert_eq!(a.recv().await, ServerMessage::Ready);
    b.assert_quiet().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_out_of_bounds_rejected_without_cooldown() {
    let server = TestServer::spawn(3, 10_000).await;
    let (mut a, _, _) = server.login("A").await;

    a.paint(3, 3, PlaceColor::Red).await;
    match a.recv().await {
        ServerMessage::TileRejected(r) => assert_eq!(r.reason, RejectReason::OutOfBounds),
        other => panic!("Expected TileRejected, got {other:?}"),
    }

    a.paint(-1, 0, PlaceColor::Red).await;
    assert!(matches!(a.recv().await, ServerMessage::TileRejected(_)));

    // Still ready: a valid change goes through
    a.paint(2, 2, PlaceColor::Red).await;
    a.expect_tile_changed().await;
    assert_eq!(server.registry.get_board().await.unwrap().get(2, 2).unwrap().owner(), "A");

    server.shutdown().await;
}

#[tokio::test]
async fn test_last_write_wins_across_clients() {
    let server = TestServer::spawn(3, 1000).await;
    let (mut a, _, _) = server.login("A").await;
    let (mut b, _, _) = server.login("B").await;

    a.paint(1, 2, PlaceColor::Red).await;
    let first = a.expect_tile_changed().await;
    assert_eq!(b.expect_tile_changed().await, first);

    b.paint(1, 2, PlaceColor::Green).await;
    let second = a.expect_tile_changed().await;
    assert_eq!(b.expect_tile_changed().await, second);

    let cell = server.registry.get_tile(1, 2).await.unwrap();
    assert_eq!(cell.color(), PlaceColor::Green);
    assert_eq!(cell.owner(), "B");

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_members_observe_same_order() {
    let server = TestServer::spawn(8, 1000).await;

    let mut painters = Vec::new();
    for i in 0..4 {
        let (c, _, _) = server.login(&format!("p{i}")).await;
        painters.push(c);
    }
    let (mut observer, _, _) = server.login("observer").await;

    for (i, painter) in painters.iter_mut().enumerate() {
        painter.paint(0, i as i32, PlaceColor::Red).await;
    }

    let mut seen_by_observer = Vec::new();
    for _ in 0..4 {
        seen_by_observer.push(observer.expect_tile_changed().await);
    }
    for painter in &mut painters {
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(painter.expect_tile_changed().await);
        }
        assert_eq!(seen, seen_by_observer);
    }

    server.shutdown().await;
}

// ============================================================================
// Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_disconnect_does_not_affect_others() {
    let server = TestServer::spawn(3, 1000).await;
    let (a, _, _) = server.login("A").await;
    let (mut b, _, _) = server.login("B").await;
    let (mut c, _, _) = server.login("C").await;

    drop(a);
    sleep(Duration::from_millis(50)).await;

    c.paint(0, 2, PlaceColor::Purple).await;
    let applied = c.expect_tile_changed().await;
    assert_eq!(b.expect_tile_changed().await, applied);
    assert_eq!(server.registry.members().await, vec!["B", "C"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_during_cooldown_deregisters() {
    let server = TestServer::spawn(3, 60_000).await;
    let (mut a, _, _) = server.login("A").await;

    a.paint(0, 0, PlaceColor::Red).await;
    a.expect_tile_changed().await;
    drop(a);

    for _ in 0..50 {
        if server.registry.members().await.is_empty() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(server.registry.members().await.is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_sessions() {
    let server = TestServer::spawn(3, 1000).await;
    let (mut a, _, _) = server.login("A").await;

    server.cancel_token.cancel();
    a.assert_closed().await;
}
