//! Wire protocol for Pinpoint.
//!
//! This crate defines the messages that travel between the browser client
//! and the game server:
//!
//! - **Types** ([`Envelope`], [`Payload`], [`ClientRequest`],
//!   [`ServerEvent`], [`Ack`]): the message structures on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room service (game rules)
//! ```
//!
//! The protocol layer knows nothing about rooms or turns. It only fixes the
//! JSON shape the client expects: camelCase field names and a `type` tag on
//! every request and event.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Ack, ClientRequest, Coordinates, Envelope, ErrorCode, Names, Payload,
    PlayerId, Recipient, RoomCode, Scoreboard, ServerEvent,
};
