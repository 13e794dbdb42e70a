//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Smallest capacity a room can be created with: one picker, one guesser.
pub const MIN_CAPACITY: usize = 2;

/// Settings shared by every room the service creates.
///
/// Deserializes from the `[rooms]` table of the server config file; any
/// missing key falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum players per room. A room may be created with a lower cap
    /// (two-player duels) but never a higher one.
    pub max_players: usize,

    /// Pause between the round results and the `newRound` announcement,
    /// in milliseconds. Zero announces immediately.
    pub new_round_delay_ms: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 6,
            new_round_delay_ms: 1_500,
        }
    }
}

impl RoomConfig {
    /// The presentation delay before a `newRound` broadcast.
    pub fn new_round_delay(&self) -> Duration {
        Duration::from_millis(self.new_round_delay_ms)
    }

    /// Capacity for a new room, honouring a requested cap when it is
    /// within `MIN_CAPACITY..=max_players`.
    pub fn capacity_for(&self, requested: Option<usize>) -> usize {
        let max = self.max_players.max(MIN_CAPACITY);
        requested.map_or(max, |cap| cap.clamp(MIN_CAPACITY, max))
    }
}
