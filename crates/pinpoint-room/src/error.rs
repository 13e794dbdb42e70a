//! Error types for the room layer.

use pinpoint_protocol::{Coordinates, ErrorCode, PlayerId, RoomCode};

/// Errors that can occur during room operations.
///
/// Every variant is recoverable: it is reported to the requesting client
/// and leaves the room untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    /// The room is at capacity.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// Only the current picker may choose a location.
    #[error("player {0} is not the picker in room {1}")]
    NotPicker(PlayerId, RoomCode),

    /// A location has already been picked and is being guessed.
    #[error("a round is already in progress in room {0}")]
    RoundInProgress(RoomCode),

    /// A guess arrived while nobody has picked a location.
    #[error("no round in progress in room {0}")]
    NoActiveRound(RoomCode),

    /// Latitude/longitude out of range or not finite.
    #[error("invalid coordinate (lat {}, lng {})", .0.lat, .0.lng)]
    InvalidCoordinate(Coordinates),

    /// The player already belongs to a room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    /// The player is not a member of the room they addressed.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomCode),

    /// The game service's command channel is closed.
    #[error("game service is unavailable")]
    Unavailable,
}

impl RoomError {
    /// The code reported to the client in a failed ack.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound(_) => ErrorCode::RoomNotFound,
            Self::RoomFull(_) => ErrorCode::RoomFull,
            Self::NotPicker(..) => ErrorCode::NotPicker,
            Self::RoundInProgress(_) => ErrorCode::RoundInProgress,
            Self::NoActiveRound(_) => ErrorCode::NoActiveRound,
            Self::InvalidCoordinate(_) => ErrorCode::InvalidCoordinate,
            Self::AlreadyInRoom(..) => ErrorCode::AlreadyInRoom,
            Self::NotInRoom(..) => ErrorCode::NotInRoom,
            Self::Unavailable => ErrorCode::Unavailable,
        }
    }
}
