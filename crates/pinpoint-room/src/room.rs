//! A single game room: its players, scores, and the picker/guesser turn
//! cycle.
//!
//! `Room` is a plain state machine with no I/O. Each operation validates
//! first and only then mutates, returning the events the caller must
//! deliver. Mutation goes through the [`RoomManager`](crate::RoomManager),
//! which keeps its player → room index in step with the room.

use std::collections::HashMap;
use std::fmt;

use pinpoint_protocol::{
    Coordinates, Names, PlayerId, Recipient, RoomCode, Scoreboard,
    ServerEvent,
};

use crate::RoomError;
use crate::scoring::{haversine_meters, score_from_distance};

/// Events produced by a room operation, paired with who receives them.
pub type Events = Vec<(Recipient, ServerEvent)>;

/// Where a room is in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Waiting for the picker to choose a location.
    Picking,
    /// A location is set; waiting for guesses.
    Guessing,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Picking => write!(f, "Picking"),
            Self::Guessing => write!(f, "Guessing"),
        }
    }
}

/// What happened to a submitted guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessStatus {
    /// The sender is the picker or already guessed; nothing changed.
    Ignored,
    /// Recorded; `remaining` guessers still have to answer.
    Waiting { remaining: usize },
    /// This guess completed the round and it has been scored.
    Scored,
}

/// Side effects of a player leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeaveOutcome {
    /// The room has no players left and must be destroyed.
    pub room_empty: bool,
    /// An in-flight round was dropped without scoring.
    pub round_cancelled: bool,
    /// The departure left every remaining guesser answered, so the round
    /// was scored.
    pub round_scored: bool,
}

/// The round currently being guessed.
#[derive(Debug, Clone)]
pub struct Round {
    target: Coordinates,
    /// Latched when the round starts.
    picker: PlayerId,
    hint: Option<String>,
    guesses: HashMap<PlayerId, Coordinates>,
}

impl Round {
    pub fn target(&self) -> Coordinates {
        self.target
    }

    pub fn picker(&self) -> PlayerId {
        self.picker
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn guess_of(&self, player: PlayerId) -> Option<Coordinates> {
        self.guesses.get(&player).copied()
    }

    pub fn guess_count(&self) -> usize {
        self.guesses.len()
    }

    fn start_event(&self) -> ServerEvent {
        ServerEvent::StartGuess {
            lat: self.target.lat,
            lng: self.target.lng,
            hint: self.hint.clone(),
            picker_socket_id: self.picker,
        }
    }
}

/// One game room.
///
/// Invariants:
/// - `scores` and `names` have an entry for exactly the ids in `players`.
/// - `picker_index < players.len()` whenever `players` is non-empty.
/// - `current_round`'s guesses only contain current players other than
///   the round's picker.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    capacity: usize,
    players: Vec<PlayerId>,
    scores: HashMap<PlayerId, u64>,
    names: HashMap<PlayerId, String>,
    picker_index: usize,
    current_round: Option<Round>,
    rounds_played: u64,
}

impl Room {
    pub(crate) fn new(
        code: RoomCode,
        creator: PlayerId,
        creator_name: String,
        capacity: usize,
    ) -> Self {
        Self {
            code,
            capacity,
            players: vec![creator],
            scores: HashMap::from([(creator, 0)]),
            names: HashMap::from([(creator, creator_name)]),
            picker_index: 0,
            current_round: None,
            rounds_played: 0,
        }
    }

    // -- Queries --

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Players in turn order.
    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn is_member(&self, player: PlayerId) -> bool {
        self.scores.contains_key(&player)
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn score(&self, player: PlayerId) -> Option<u64> {
        self.scores.get(&player).copied()
    }

    pub fn scoreboard(&self) -> Scoreboard {
        self.scores.iter().map(|(p, s)| (*p, *s)).collect()
    }

    pub fn name(&self, player: PlayerId) -> Option<&str> {
        self.names.get(&player).map(String::as_str)
    }

    pub fn names(&self) -> Names {
        self.names.iter().map(|(p, n)| (*p, n.clone())).collect()
    }

    /// The player whose turn it is to pick.
    pub fn picker(&self) -> Option<PlayerId> {
        self.players.get(self.picker_index).copied()
    }

    pub fn phase(&self) -> RoundPhase {
        if self.current_round.is_some() {
            RoundPhase::Guessing
        } else {
            RoundPhase::Picking
        }
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.current_round.as_ref()
    }

    /// Number of rounds scored so far.
    pub fn rounds_played(&self) -> u64 {
        self.rounds_played
    }

    /// Full room snapshot, as sent to members on join.
    pub fn snapshot(&self) -> ServerEvent {
        ServerEvent::RoomJoined {
            room_id: self.code.clone(),
            players: self.players.clone(),
            scores: self.scoreboard(),
            names: self.names(),
            picker_socket_id: self.current_picker(),
            round_active: self.current_round.is_some(),
        }
    }

    /// The `newRound` announcement for the current picker.
    pub fn new_round_event(&self) -> ServerEvent {
        ServerEvent::NewRound {
            picker_socket_id: self.current_picker(),
            scores: self.scoreboard(),
        }
    }

    // -- Transitions --

    pub(crate) fn join(
        &mut self,
        player: PlayerId,
        name: String,
    ) -> Result<Events, RoomError> {
        if self.is_member(player) {
            return Err(RoomError::AlreadyInRoom(player, self.code.clone()));
        }
        if self.players.len() >= self.capacity {
            return Err(RoomError::RoomFull(self.code.clone()));
        }

        self.players.push(player);
        self.scores.insert(player, 0);
        self.names.insert(player, name);

        let mut events = vec![(Recipient::All, self.snapshot())];
        // A late joiner is an eligible guesser for the running round.
        if let Some(round) = &self.current_round {
            events.push((Recipient::Player(player), round.start_event()));
        }
        Ok(events)
    }

    pub(crate) fn pick(
        &mut self,
        player: PlayerId,
        target: Coordinates,
        hint: Option<String>,
    ) -> Result<Events, RoomError> {
        if !target.is_valid() {
            return Err(RoomError::InvalidCoordinate(target));
        }
        self.ensure_member(player)?;
        if self.picker() != Some(player) {
            return Err(RoomError::NotPicker(player, self.code.clone()));
        }
        if self.current_round.is_some() {
            return Err(RoomError::RoundInProgress(self.code.clone()));
        }

        let hint = hint
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        let round = Round {
            target,
            picker: player,
            hint,
            guesses: HashMap::new(),
        };
        let event = round.start_event();
        self.current_round = Some(round);

        tracing::info!(
            room_id = %self.code,
            picker = %player,
            guessers = self.players.len() - 1,
            "round started"
        );
        Ok(vec![(Recipient::AllExcept(player), event)])
    }

    pub(crate) fn guess(
        &mut self,
        player: PlayerId,
        guess: Coordinates,
    ) -> Result<(GuessStatus, Events), RoomError> {
        if !guess.is_valid() {
            return Err(RoomError::InvalidCoordinate(guess));
        }
        self.ensure_member(player)?;
        let round = self
            .current_round
            .as_mut()
            .ok_or_else(|| RoomError::NoActiveRound(self.code.clone()))?;

        if player == round.picker || round.guesses.contains_key(&player) {
            tracing::debug!(
                room_id = %self.code,
                %player,
                "ignoring guess from picker or repeat guesser"
            );
            return Ok((GuessStatus::Ignored, Vec::new()));
        }
        round.guesses.insert(player, guess);

        let picker = round.picker;
        let eligible = self.players.iter().filter(|p| **p != picker).count();
        let remaining = eligible.saturating_sub(round.guesses.len());
        if remaining > 0 {
            return Ok((GuessStatus::Waiting { remaining }, Vec::new()));
        }

        Ok((GuessStatus::Scored, self.score_round()))
    }

    pub(crate) fn leave(
        &mut self,
        player: PlayerId,
    ) -> Result<(LeaveOutcome, Events), RoomError> {
        let index = self
            .players
            .iter()
            .position(|p| *p == player)
            .ok_or_else(|| RoomError::NotInRoom(player, self.code.clone()))?;

        self.players.remove(index);
        self.scores.remove(&player);
        self.names.remove(&player);

        let mut outcome = LeaveOutcome::default();
        if self.players.is_empty() {
            self.picker_index = 0;
            self.current_round = None;
            outcome.room_empty = true;
            return Ok((outcome, Vec::new()));
        }

        // Keep the same picker when someone ahead of them leaves; if the
        // picker leaves, the next player in order slides into their slot.
        if index < self.picker_index {
            self.picker_index -= 1;
        } else if self.picker_index >= self.players.len() {
            self.picker_index = 0;
        }

        let mut events = Vec::new();
        if let Some(round) = self.current_round.as_mut() {
            round.guesses.remove(&player);
            let picker = round.picker;
            let eligible =
                self.players.iter().filter(|p| **p != picker).count();

            if picker == player || eligible == 0 {
                self.current_round = None;
                outcome.round_cancelled = true;
                tracing::info!(
                    room_id = %self.code,
                    "round cancelled"
                );
            } else if round.guesses.len() >= eligible {
                events = self.score_round();
                outcome.round_scored = true;
            }
        }

        events.push((
            Recipient::All,
            ServerEvent::PlayerLeft {
                socket_id: player,
                players: self.players.clone(),
                scores: self.scoreboard(),
                names: self.names(),
                picker_socket_id: self.current_picker(),
                round_cancelled: outcome.round_cancelled,
            },
        ));
        Ok((outcome, events))
    }

    // -- Internals --

    fn ensure_member(&self, player: PlayerId) -> Result<(), RoomError> {
        if self.is_member(player) {
            Ok(())
        } else {
            Err(RoomError::NotInRoom(player, self.code.clone()))
        }
    }

    /// Only called while the room has players; empty rooms are destroyed
    /// before any event is built.
    fn current_picker(&self) -> PlayerId {
        self.players[self.picker_index]
    }

    /// Scores every recorded guess, clears the round and passes the turn
    /// to the next player.
    fn score_round(&mut self) -> Events {
        let Some(round) = self.current_round.take() else {
            return Vec::new();
        };

        let mut results = Vec::with_capacity(round.guesses.len());
        for guesser in &self.players {
            let Some(guess) = round.guesses.get(guesser).copied() else {
                continue;
            };
            let distance = haversine_meters(guess, round.target);
            let points = score_from_distance(distance);
            if let Some(total) = self.scores.get_mut(guesser) {
                *total += u64::from(points);
            }
            results.push((*guesser, guess, distance, points));
        }

        self.rounds_played += 1;
        self.picker_index = (self.picker_index + 1) % self.players.len();

        tracing::info!(
            room_id = %self.code,
            round = self.rounds_played,
            guesses = results.len(),
            next_picker = %self.current_picker(),
            "round scored"
        );

        let scores = self.scoreboard();
        results
            .into_iter()
            .map(|(guesser, guess, distance, points)| {
                (
                    Recipient::All,
                    ServerEvent::RoundResult {
                        guesser_socket_id: guesser,
                        correct: round.target,
                        guess,
                        distance_meters: distance,
                        points_awarded: points,
                        scores: scores.clone(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Coordinates = Coordinates {
        lat: 40.0,
        lng: -75.0,
    };

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    /// A room with players 1..=n, player 1 picking.
    fn room_with(n: u64) -> Room {
        let mut room =
            Room::new(RoomCode::new("TEST01"), pid(1), "p1".into(), 6);
        for id in 2..=n {
            room.join(pid(id), format!("p{id}")).unwrap();
        }
        room
    }

    fn assert_consistent(room: &Room) {
        assert_eq!(room.players().len(), room.scoreboard().len());
        assert_eq!(room.players().len(), room.names().len());
        if !room.is_empty() {
            assert!(room.picker().is_some());
        }
    }

    #[test]
    fn test_new_room_has_creator_as_picker() {
        let room = room_with(1);
        assert_eq!(room.players(), &[pid(1)]);
        assert_eq!(room.score(pid(1)), Some(0));
        assert_eq!(room.picker(), Some(pid(1)));
        assert_eq!(room.phase(), RoundPhase::Picking);
        assert_consistent(&room);
    }

    #[test]
    fn test_join_broadcasts_snapshot() {
        let mut room = room_with(1);
        let events = room.join(pid(2), "p2".into()).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            (
                Recipient::All,
                ServerEvent::RoomJoined {
                    players,
                    picker_socket_id,
                    ..
                },
            ) => {
                assert_eq!(players, &vec![pid(1), pid(2)]);
                assert_eq!(*picker_socket_id, pid(1));
            }
            other => panic!("expected RoomJoined, got {other:?}"),
        }
        assert_consistent(&room);
    }

    #[test]
    fn test_join_full_room_leaves_state_unchanged() {
        let mut room =
            Room::new(RoomCode::new("DUEL01"), pid(1), "p1".into(), 2);
        room.join(pid(2), "p2".into()).unwrap();
        let err = room.join(pid(3), "p3".into()).unwrap_err();
        assert!(matches!(err, RoomError::RoomFull(_)));
        assert_eq!(room.players(), &[pid(1), pid(2)]);
        assert_consistent(&room);
    }

    #[test]
    fn test_pick_requires_picker() {
        let mut room = room_with(2);
        let err = room.pick(pid(2), TARGET, None).unwrap_err();
        assert!(matches!(err, RoomError::NotPicker(..)));
        assert!(room.current_round().is_none());
    }

    #[test]
    fn test_pick_rejects_invalid_coordinate() {
        let mut room = room_with(2);
        let err = room
            .pick(pid(1), Coordinates::new(120.0, 0.0), None)
            .unwrap_err();
        assert!(matches!(err, RoomError::InvalidCoordinate(_)));
    }

    #[test]
    fn test_pick_sends_start_guess_to_everyone_but_picker() {
        let mut room = room_with(3);
        let events = room
            .pick(pid(1), TARGET, Some("  ocean view ".into()))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Recipient::AllExcept(pid(1)));
        match &events[0].1 {
            ServerEvent::StartGuess { lat, lng, hint, .. } => {
                assert_eq!((*lat, *lng), (40.0, -75.0));
                assert_eq!(hint.as_deref(), Some("ocean view"));
            }
            other => panic!("expected StartGuess, got {other:?}"),
        }
        assert_eq!(room.phase(), RoundPhase::Guessing);
    }

    #[test]
    fn test_blank_hint_is_dropped() {
        let mut room = room_with(2);
        room.pick(pid(1), TARGET, Some("   ".into())).unwrap();
        assert_eq!(room.current_round().unwrap().hint(), None);
    }

    #[test]
    fn test_second_pick_is_round_in_progress() {
        let mut room = room_with(2);
        room.pick(pid(1), TARGET, None).unwrap();
        let err = room.pick(pid(1), TARGET, None).unwrap_err();
        assert!(matches!(err, RoomError::RoundInProgress(_)));
        assert_eq!(room.current_round().unwrap().target(), TARGET);
    }

    #[test]
    fn test_guess_without_round_is_rejected() {
        let mut room = room_with(2);
        let err = room.guess(pid(2), TARGET).unwrap_err();
        assert!(matches!(err, RoomError::NoActiveRound(_)));
    }

    #[test]
    fn test_guess_from_non_member_is_rejected() {
        let mut room = room_with(2);
        room.pick(pid(1), TARGET, None).unwrap();
        let err = room.guess(pid(9), TARGET).unwrap_err();
        assert!(matches!(err, RoomError::NotInRoom(..)));
    }

    #[test]
    fn test_picker_guess_is_ignored() {
        let mut room = room_with(2);
        room.pick(pid(1), TARGET, None).unwrap();
        let (status, events) = room.guess(pid(1), TARGET).unwrap();
        assert_eq!(status, GuessStatus::Ignored);
        assert!(events.is_empty());
        assert_eq!(room.current_round().unwrap().guess_count(), 0);
    }

    #[test]
    fn test_duplicate_guess_is_ignored() {
        let mut room = room_with(3);
        room.pick(pid(1), TARGET, None).unwrap();
        let first = Coordinates::new(41.0, -75.0);
        let (status, _) = room.guess(pid(2), first).unwrap();
        assert_eq!(status, GuessStatus::Waiting { remaining: 1 });

        let (status, _) = room.guess(pid(2), TARGET).unwrap();
        assert_eq!(status, GuessStatus::Ignored);
        assert_eq!(room.current_round().unwrap().guess_of(pid(2)), Some(first));
    }

    #[test]
    fn test_last_guess_scores_and_advances_picker() {
        let mut room = room_with(3);
        room.pick(pid(1), TARGET, None).unwrap();
        room.guess(pid(2), TARGET).unwrap();
        let (status, events) = room.guess(pid(3), TARGET).unwrap();

        assert_eq!(status, GuessStatus::Scored);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|(r, _)| *r == Recipient::All));
        assert_eq!(room.score(pid(1)), Some(0));
        assert_eq!(room.score(pid(2)), Some(1000));
        assert_eq!(room.score(pid(3)), Some(1000));
        assert!(room.current_round().is_none());
        assert_eq!(room.picker(), Some(pid(2)));
        assert_eq!(room.rounds_played(), 1);
    }

    #[test]
    fn test_picker_rotation_wraps() {
        let mut room = room_with(2);
        for expected_next in [pid(2), pid(1), pid(2)] {
            let picker = room.picker().unwrap();
            let guesser = if picker == pid(1) { pid(2) } else { pid(1) };
            room.pick(picker, TARGET, None).unwrap();
            room.guess(guesser, TARGET).unwrap();
            assert_eq!(room.picker(), Some(expected_next));
        }
    }

    #[test]
    fn test_picker_leaving_cancels_round_without_points() {
        let mut room = room_with(3);
        room.pick(pid(1), TARGET, None).unwrap();
        room.guess(pid(2), TARGET).unwrap();

        let (outcome, events) = room.leave(pid(1)).unwrap();
        assert!(outcome.round_cancelled);
        assert!(!outcome.round_scored);
        assert!(room.current_round().is_none());
        assert_eq!(room.score(pid(2)), Some(0));
        // Player 2 slides into the picker slot.
        assert_eq!(room.picker(), Some(pid(2)));
        match &events[..] {
            [(Recipient::All, ServerEvent::PlayerLeft { socket_id, round_cancelled, .. })] => {
                assert_eq!(*socket_id, pid(1));
                assert!(*round_cancelled);
            }
            other => panic!("expected one PlayerLeft, got {other:?}"),
        }
        assert_consistent(&room);
    }

    #[test]
    fn test_guesser_leaving_completes_round_for_the_rest() {
        let mut room = room_with(3);
        room.pick(pid(1), TARGET, None).unwrap();
        room.guess(pid(2), TARGET).unwrap();

        let (outcome, events) = room.leave(pid(3)).unwrap();
        assert!(outcome.round_scored);
        assert_eq!(room.score(pid(2)), Some(1000));
        assert!(matches!(events[0].1, ServerEvent::RoundResult { .. }));
        assert!(matches!(
            events.last().unwrap().1,
            ServerEvent::PlayerLeft { .. }
        ));
        assert_consistent(&room);
    }

    #[test]
    fn test_last_guesser_leaving_cancels_round() {
        let mut room = room_with(2);
        room.pick(pid(1), TARGET, None).unwrap();
        let (outcome, _) = room.leave(pid(2)).unwrap();
        assert!(outcome.round_cancelled);
        assert!(room.current_round().is_none());
        assert_eq!(room.picker(), Some(pid(1)));
    }

    #[test]
    fn test_leave_before_picker_keeps_picker() {
        let mut room = room_with(3);
        room.pick(pid(1), TARGET, None).unwrap();
        room.guess(pid(2), TARGET).unwrap();
        room.guess(pid(3), TARGET).unwrap();
        assert_eq!(room.picker(), Some(pid(2)));

        room.leave(pid(1)).unwrap();
        assert_eq!(room.picker(), Some(pid(2)));
        assert_consistent(&room);
    }

    #[test]
    fn test_last_player_leaving_wraps_picker_index() {
        let mut room = room_with(3);
        // Rotate the turn to player 3, the last slot.
        for (picker, guessers) in [(1, [2, 3]), (2, [1, 3])] {
            room.pick(pid(picker), TARGET, None).unwrap();
            for g in guessers {
                room.guess(pid(g), TARGET).unwrap();
            }
        }
        assert_eq!(room.picker(), Some(pid(3)));

        room.leave(pid(3)).unwrap();
        assert_eq!(room.picker(), Some(pid(1)));
        assert_consistent(&room);
    }

    #[test]
    fn test_last_player_leaving_empties_room() {
        let mut room = room_with(1);
        let (outcome, events) = room.leave(pid(1)).unwrap();
        assert!(outcome.room_empty);
        assert!(events.is_empty());
        assert!(room.is_empty());
    }

    #[test]
    fn test_late_joiner_receives_running_round() {
        let mut room = room_with(2);
        room.pick(pid(1), TARGET, Some("bridge".into())).unwrap();
        let events = room.join(pid(3), "p3".into()).unwrap();
        assert!(events.iter().any(|(r, e)| *r == Recipient::Player(pid(3))
            && matches!(e, ServerEvent::StartGuess { .. })));

        // The round now waits for the newcomer too.
        let (status, _) = room.guess(pid(2), TARGET).unwrap();
        assert_eq!(status, GuessStatus::Waiting { remaining: 1 });
    }

    #[test]
    fn test_leave_non_member_is_not_in_room() {
        let mut room = room_with(2);
        let err = room.leave(pid(7)).unwrap_err();
        assert!(matches!(err, RoomError::NotInRoom(..)));
        assert_eq!(room.players().len(), 2);
    }
}
