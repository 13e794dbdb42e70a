//! # Pinpoint
//!
//! Multiplayer geography-guessing game server.
//!
//! Players gather in a room by code and take turns: the picker chooses a
//! location, everyone else guesses it on a map, and points are awarded by
//! how close each guess lands. This crate wires the WebSocket transport,
//! the JSON wire protocol, and the game service into a runnable server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pinpoint::prelude::*;
//!
//! # async fn run() -> Result<(), PinpointError> {
//! let config = ServerConfig::load()?;
//! let server = PinpointServerBuilder::from_config(&config).build().await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod error;
mod handler;
mod server;

pub use error::{ConfigError, PinpointError};
pub use server::{PinpointServer, PinpointServerBuilder};

/// Re-exports for the common server setup.
pub mod prelude {
    pub use crate::config::ServerConfig;
    pub use crate::{ConfigError, PinpointError, PinpointServer, PinpointServerBuilder};
    pub use pinpoint_protocol::{
        Ack, ClientRequest, Coordinates, Envelope, ErrorCode, Payload,
        PlayerId, RoomCode, ServerEvent,
    };
    pub use pinpoint_room::{GameHandle, RoomConfig};
}
