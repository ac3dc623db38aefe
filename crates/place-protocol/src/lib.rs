//! Place Protocol - Wire protocol for client/server communication
//!
//! This crate provides the message envelope exchanged between the
//! server (placed) and its clients, and the newline-delimited JSON
//! codec that carries it over TCP.

pub mod codec;
pub mod message;

pub use codec::{
    decode, encode, write_frame, CodecError, FrameReader, MAX_CLIENT_FRAME, MAX_SERVER_FRAME,
};
pub use message::{ClientMessage, RejectReason, ServerMessage, TileRejection};
