//! Core protocol types for Pinpoint's wire format.
//!
//! Everything in this module is serialized to JSON and sent to (or read
//! from) the browser client. Field names are camelCase and every request
//! and event carries a `type` tag so the client can switch on it.

use std::collections::BTreeMap;
use std::fmt;

use pinpoint_transport::ConnectionId;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies a player. This is the transport's connection id, exposed to
/// clients as `socketId`.
///
/// Serializes as a plain number. Deserialization also accepts the number
/// as a string, which is how it appears when used as a JSON object key
/// (scoreboards and name maps are keyed by player).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

impl From<ConnectionId> for PlayerId {
    fn from(id: ConnectionId) -> Self {
        Self(id.into_inner())
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        struct PlayerIdVisitor;

        impl Visitor<'_> for PlayerIdVisitor {
            type Value = PlayerId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a socket id as a number or numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PlayerId, E> {
                Ok(PlayerId(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PlayerId, E> {
                u64::try_from(v)
                    .map(PlayerId)
                    .map_err(|_| E::custom("socket id must not be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PlayerId, E> {
                v.parse().map(PlayerId).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PlayerIdVisitor)
    }
}

/// A short, human-typeable room code such as `"K3X9QZ"`.
///
/// Codes are stored upper-case with surrounding whitespace removed, so
/// `" k3x9qz "` typed by a player finds the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Creates a room code, normalising case and whitespace.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `true` when both values are finite, latitude is within [-90, 90]
    /// and longitude within [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Accumulated points per player.
pub type Scoreboard = BTreeMap<PlayerId, u64>;

/// Display name per player.
pub type Names = BTreeMap<PlayerId, String>;

// ---------------------------------------------------------------------------
// Recipient: who should receive a message?
// ---------------------------------------------------------------------------

/// Specifies which members of a room receive a server event.
///
/// Room operations return `(Recipient, ServerEvent)` pairs; the service
/// resolves them against the room's current player list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every player in the room.
    All,

    /// One specific player.
    Player(PlayerId),

    /// Everyone in the room except the given player.
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Requests a client can make. Every request is answered with an [`Ack`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientRequest {
    /// Open a new room with the sender as its only player.
    /// `max_players` lowers the room's capacity (e.g. 2 for a duel).
    CreateRoom {
        #[serde(default)]
        max_players: Option<usize>,
    },

    /// Join an existing room by code.
    JoinRoom { room_id: RoomCode },

    /// The picker chooses the location everyone else must guess.
    PickLocation {
        room_id: RoomCode,
        lat: f64,
        lng: f64,
        #[serde(default)]
        hint: Option<String>,
    },

    /// The picker lets the server choose a random location.
    PickRandomLocation {
        room_id: RoomCode,
        #[serde(default)]
        hint: Option<String>,
    },

    /// A guesser submits their answer for the current round.
    MakeGuess { room_id: RoomCode, lat: f64, lng: f64 },

    /// Leave the room voluntarily.
    LeaveRoom { room_id: RoomCode },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Failure reasons reported back in an [`Ack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    RoomNotFound,
    RoomFull,
    NotPicker,
    RoundInProgress,
    NoActiveRound,
    InvalidCoordinate,
    AlreadyInRoom,
    NotInRoom,
    /// The game service is shutting down.
    Unavailable,
    /// The frame could not be decoded or was not a request.
    BadRequest,
}

/// Acknowledgement of a single client request.
///
/// `reply_to` echoes the request envelope's `seq`. Optional fields are
/// omitted from the JSON when unset, giving the `{ok, roomId}`,
/// `{ok, waiting}` and `{ok, err}` shapes the client expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub reply_to: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<ErrorCode>,
}

impl Ack {
    /// A successful acknowledgement with no extra fields.
    pub fn ok(reply_to: u64) -> Self {
        Self {
            reply_to,
            ok: true,
            room_id: None,
            waiting: None,
            err: None,
        }
    }

    /// A failed acknowledgement.
    pub fn err(reply_to: u64, code: ErrorCode) -> Self {
        Self {
            ok: false,
            err: Some(code),
            ..Self::ok(reply_to)
        }
    }

    pub fn with_room_id(mut self, room_id: RoomCode) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_waiting(mut self, waiting: bool) -> Self {
        self.waiting = Some(waiting);
        self
    }
}

/// Events pushed by the server to room members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Sent once when the connection is accepted.
    Connected { socket_id: PlayerId },

    /// Room snapshot, sent to every member when someone joins.
    RoomJoined {
        room_id: RoomCode,
        players: Vec<PlayerId>,
        scores: Scoreboard,
        names: Names,
        picker_socket_id: PlayerId,
        round_active: bool,
    },

    /// A round has started. Carries the true location; the picker does
    /// not receive this event.
    StartGuess {
        lat: f64,
        lng: f64,
        hint: Option<String>,
        picker_socket_id: PlayerId,
    },

    /// Outcome for one guesser, broadcast to the whole room.
    RoundResult {
        guesser_socket_id: PlayerId,
        correct: Coordinates,
        guess: Coordinates,
        distance_meters: f64,
        points_awarded: u32,
        scores: Scoreboard,
    },

    /// Announces the next picker once the results have been shown.
    NewRound {
        picker_socket_id: PlayerId,
        scores: Scoreboard,
    },

    /// A player left or disconnected.
    PlayerLeft {
        socket_id: PlayerId,
        players: Vec<PlayerId>,
        scores: Scoreboard,
        names: Names,
        picker_socket_id: PlayerId,
        round_cancelled: bool,
    },
}

// ---------------------------------------------------------------------------
// Payload & Envelope
// ---------------------------------------------------------------------------

/// The content of a frame.
///
/// Adjacently tagged: `{"type": "request", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Payload {
    /// Client → server.
    Request(ClientRequest),

    /// Server → client, answers one request.
    Ack(Ack),

    /// Server → client, pushed room event.
    Event(ServerEvent),

    /// Server → client, the last frame could not be understood.
    Error { code: ErrorCode, message: String },
}

/// Every frame on the wire is an `Envelope`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number. The server echoes a request's `seq` in
    /// [`Ack::reply_to`].
    pub seq: u64,

    /// Milliseconds since the sender started.
    pub timestamp: u64,

    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser client depends on these exact JSON shapes.

    use super::*;
    use serde_json::json;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_player_id_deserializes_from_number_or_string() {
        let a: PlayerId = serde_json::from_str("42").unwrap();
        let b: PlayerId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(a, PlayerId(42));
        assert_eq!(b, PlayerId(42));
        assert!(serde_json::from_str::<PlayerId>("-1").is_err());
        assert!(serde_json::from_str::<PlayerId>("\"abc\"").is_err());
    }

    #[test]
    fn test_player_id_from_connection_id() {
        let pid = PlayerId::from(ConnectionId::new(9));
        assert_eq!(pid, PlayerId(9));
        assert_eq!(pid.to_string(), "P-9");
    }

    #[test]
    fn test_room_code_is_normalised() {
        assert_eq!(RoomCode::new(" k3x9qz "), RoomCode::new("K3X9QZ"));
        let code: RoomCode = serde_json::from_str("\"ab12cd\"").unwrap();
        assert_eq!(code.as_str(), "AB12CD");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"AB12CD\"");
    }

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(40.0, -75.0).is_valid());
        assert!(Coordinates::new(-90.0, 180.0).is_valid());
        assert!(!Coordinates::new(90.5, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.1).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_client_request_json_format() {
        let req: ClientRequest = serde_json::from_value(json!({
            "type": "pickLocation",
            "roomId": "abc123",
            "lat": 40.0,
            "lng": -75.0,
            "hint": "near a river"
        }))
        .unwrap();
        assert_eq!(
            req,
            ClientRequest::PickLocation {
                room_id: RoomCode::new("ABC123"),
                lat: 40.0,
                lng: -75.0,
                hint: Some("near a river".into()),
            }
        );
    }

    #[test]
    fn test_create_room_without_fields() {
        let req: ClientRequest =
            serde_json::from_value(json!({ "type": "createRoom" })).unwrap();
        assert_eq!(req, ClientRequest::CreateRoom { max_players: None });
    }

    #[test]
    fn test_unknown_request_type_is_rejected() {
        let result: Result<ClientRequest, _> =
            serde_json::from_value(json!({ "type": "flyToMoon" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_ack_omits_unset_fields() {
        let ack = Ack::ok(4).with_room_id(RoomCode::new("QWERTY"));
        let value = serde_json::to_value(&ack).unwrap();
        assert_eq!(
            value,
            json!({ "replyTo": 4, "ok": true, "roomId": "QWERTY" })
        );

        let value =
            serde_json::to_value(Ack::err(5, ErrorCode::NotPicker)).unwrap();
        assert_eq!(
            value,
            json!({ "replyTo": 5, "ok": false, "err": "NotPicker" })
        );
    }

    #[test]
    fn test_round_result_json_format() {
        let mut scores = Scoreboard::new();
        scores.insert(PlayerId(1), 0);
        scores.insert(PlayerId(2), 950);
        let event = ServerEvent::RoundResult {
            guesser_socket_id: PlayerId(2),
            correct: Coordinates::new(40.0, -75.0),
            guess: Coordinates::new(40.5, -75.0),
            distance_meters: 80_467.0,
            points_awarded: 950,
            scores,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "roundResult");
        assert_eq!(value["guesserSocketId"], 2);
        assert_eq!(value["pointsAwarded"], 950);
        assert_eq!(value["correct"], json!({ "lat": 40.0, "lng": -75.0 }));
        assert_eq!(value["scores"], json!({ "1": 0, "2": 950 }));
    }

    #[test]
    fn test_player_keyed_maps_survive_tagged_decoding() {
        // Scoreboards are JSON objects keyed by socket id. Internally
        // tagged enums buffer their content, so this only works because
        // PlayerId also accepts string input.
        let envelope = Envelope {
            seq: 9,
            timestamp: 100,
            payload: Payload::Event(ServerEvent::NewRound {
                picker_socket_id: PlayerId(3),
                scores: Scoreboard::from([(PlayerId(3), 10), (PlayerId(4), 0)]),
            }),
        };
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_payload_is_adjacently_tagged() {
        let payload = Payload::Event(ServerEvent::Connected {
            socket_id: PlayerId(1),
        });
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({ "type": "event", "data": { "type": "connected", "socketId": 1 } })
        );
    }

    #[test]
    fn test_error_payload_json_format() {
        let payload = Payload::Error {
            code: ErrorCode::BadRequest,
            message: "expected a request".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["code"], "BadRequest");
    }

    #[test]
    fn test_envelope_missing_payload_is_rejected() {
        let result: Result<Envelope, _> =
            serde_json::from_value(json!({ "seq": 1, "timestamp": 0 }));
        assert!(result.is_err());
    }
}
