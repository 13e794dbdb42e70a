//! Room manager: creates, tracks, and routes players to rooms.

use std::collections::HashMap;

use pinpoint_protocol::{Coordinates, PlayerId, Recipient, RoomCode};
use rand::Rng;

use crate::names::pick_name;
use crate::room::{Events, GuessStatus, LeaveOutcome, Room};
use crate::scoring::random_location;
use crate::{RoomConfig, RoomError};

/// Length of generated room codes.
pub const ROOM_CODE_LEN: usize = 6;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random room code. Uniqueness is the caller's concern.
pub fn generate_room_code(rng: &mut impl Rng) -> RoomCode {
    let code: String = (0..ROOM_CODE_LEN)
        .map(|_| {
            ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]
                as char
        })
        .collect();
    RoomCode::new(code)
}

/// Registry of every live room.
///
/// This is owned by the game service and only ever touched from its
/// event loop, so operations are plain synchronous calls. Each returns
/// the events to deliver; it never sends anything itself.
pub struct RoomManager {
    config: RoomConfig,

    /// Active rooms, keyed by code.
    rooms: HashMap<RoomCode, Room>,

    /// Maps each player to the room they're currently in.
    /// A player can be in at most ONE room at a time.
    player_rooms: HashMap<PlayerId, RoomCode>,
}

impl RoomManager {
    /// Creates a new, empty room manager.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a room with `player` as its only member and first picker.
    ///
    /// `max_players` optionally lowers the room's capacity. The creator
    /// receives a room snapshot in the returned events.
    pub fn create_room(
        &mut self,
        player: PlayerId,
        max_players: Option<usize>,
    ) -> Result<(RoomCode, Events), RoomError> {
        self.ensure_roomless(player)?;

        let mut rng = rand::rng();
        let code = loop {
            let candidate = generate_room_code(&mut rng);
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let capacity = self.config.capacity_for(max_players);
        let name = pick_name(std::iter::empty::<&str>(), &mut rng);

        let room = Room::new(code.clone(), player, name, capacity);
        let events = vec![(Recipient::Player(player), room.snapshot())];
        self.rooms.insert(code.clone(), room);
        self.player_rooms.insert(player, code.clone());

        tracing::info!(room_id = %code, %player, capacity, "room created");
        Ok((code, events))
    }

    /// Adds a player to a room and broadcasts the new snapshot.
    pub fn join_room(
        &mut self,
        room_id: &RoomCode,
        player: PlayerId,
    ) -> Result<Events, RoomError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
        if let Some(current) = self.player_rooms.get(&player) {
            return Err(RoomError::AlreadyInRoom(player, current.clone()));
        }

        let name = pick_name(
            room.players().iter().filter_map(|p| room.name(*p)),
            &mut rand::rng(),
        );
        let events = room.join(player, name)?;
        self.player_rooms.insert(player, room_id.clone());

        tracing::info!(
            room_id = %room_id,
            %player,
            players = room.players().len(),
            "player joined"
        );
        Ok(events)
    }

    /// The current picker chooses the location for a new round.
    pub fn pick_location(
        &mut self,
        room_id: &RoomCode,
        player: PlayerId,
        target: Coordinates,
        hint: Option<String>,
    ) -> Result<Events, RoomError> {
        self.room_mut(room_id)?.pick(player, target, hint)
    }

    /// Like [`pick_location`](Self::pick_location), with the server
    /// choosing a random target.
    pub fn pick_random_location(
        &mut self,
        room_id: &RoomCode,
        player: PlayerId,
        hint: Option<String>,
    ) -> Result<Events, RoomError> {
        let target = random_location(&mut rand::rng());
        self.pick_location(room_id, player, target, hint)
    }

    /// Records a guess; scores the round once every guesser has answered.
    pub fn submit_guess(
        &mut self,
        room_id: &RoomCode,
        player: PlayerId,
        guess: Coordinates,
    ) -> Result<(GuessStatus, Events), RoomError> {
        self.room_mut(room_id)?.guess(player, guess)
    }

    /// Removes a player from a room, destroying the room if it empties.
    pub fn leave_room(
        &mut self,
        room_id: &RoomCode,
        player: PlayerId,
    ) -> Result<(LeaveOutcome, Events), RoomError> {
        let room = self.room_mut(room_id)?;
        let (outcome, events) = room.leave(player)?;
        let remaining = room.players().len();
        self.player_rooms.remove(&player);

        tracing::info!(
            room_id = %room_id,
            %player,
            players = remaining,
            "player left"
        );

        if outcome.room_empty {
            self.rooms.remove(room_id);
            tracing::info!(room_id = %room_id, "room destroyed");
        }
        Ok((outcome, events))
    }

    /// Connection-loss cleanup. A player who is in no room is a no-op.
    pub fn disconnect(
        &mut self,
        player: PlayerId,
    ) -> Option<(RoomCode, LeaveOutcome, Events)> {
        let room_id = self.player_rooms.get(&player)?.clone();
        match self.leave_room(&room_id, player) {
            Ok((outcome, events)) => Some((room_id, outcome, events)),
            Err(e) => {
                // Index and room disagreed; drop the stale entry.
                tracing::warn!(%player, error = %e, "disconnect cleanup failed");
                self.player_rooms.remove(&player);
                None
            }
        }
    }

    pub fn room(&self, room_id: &RoomCode) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Returns the room a player is currently in, if any.
    pub fn player_room(&self, player: PlayerId) -> Option<&RoomCode> {
        self.player_rooms.get(&player)
    }

    /// Returns the number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Lists all active room codes.
    pub fn room_ids(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    fn room_mut(&mut self, room_id: &RoomCode) -> Result<&mut Room, RoomError> {
        self.rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
    }

    fn ensure_roomless(&self, player: PlayerId) -> Result<(), RoomError> {
        match self.player_rooms.get(&player) {
            Some(current) => {
                Err(RoomError::AlreadyInRoom(player, current.clone()))
            }
            None => Ok(()),
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
