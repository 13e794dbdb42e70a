//! Rooms, turns, and scoring for Pinpoint.
//!
//! A single game service task owns every room. Connections reach it
//! through a [`GameHandle`]; it serializes all mutations, so room state
//! is never touched from two places at once.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates/destroys rooms, routes players
//! - [`Room`]: one room's picker/guesser state machine
//! - [`GameHandle`]: send commands to the running service
//! - [`RoomConfig`]: capacity and round pacing

mod config;
mod error;
mod manager;
mod names;
mod room;
pub mod scoring;
mod service;

pub use config::{MIN_CAPACITY, RoomConfig};
pub use error::RoomError;
pub use manager::{ROOM_CODE_LEN, RoomManager, generate_room_code};
pub use room::{Events, GuessStatus, LeaveOutcome, Room, Round, RoundPhase};
pub use service::{GameHandle, Pick, PlayerSender, RoomInfo, spawn_service};
