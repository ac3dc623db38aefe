//! Place Daemon - Authoritative board, session registry and broadcast server
//!
//! This crate provides the server side of Place:
//! - `config` - Server configuration (defaults, TOML file, overrides)
//! - `registry` - Registry actor owning the board and the active members
//! - `server` - TCP listener and the per-connection session state machine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        placed                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  PlaceServer    │────▶│     RegistryActor           │   │
//! │  │ (TcpListener)   │     │  (board + members owner)    │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ TILE_CHANGED      │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │    Session      │◀────│   member outbound queues    │   │
//! │  │  (per client)   │     │   (bounded mpsc)            │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod registry;
pub mod server;
