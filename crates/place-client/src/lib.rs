//! Place client library.
//!
//! # Architecture
//!
//! Every client front end shares the same pieces:
//!
//! 1. **NetworkClient**: owns the TCP connection, performs the login
//!    handshake and sends tile changes
//! 2. **Listener task**: applies server updates to the `ClientModel`
//! 3. **Views**: the console renderer and the bots read the model or
//!    observe its tile changes
//!
//! **Panic-Free Policy:** library code never panics; failures surface as
//! `ClientError` or `SubmitError`.

pub mod bot;
pub mod client;
pub mod console;
pub mod error;
pub mod model;

pub use bot::{Bot, BotKind, BotTiming, BOT_MAX_DELAY};
pub use client::NetworkClient;
pub use error::{ClientError, Result, SubmitError};
pub use model::ClientModel;
