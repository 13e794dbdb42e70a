//! Per-connection handler: request routing and event fan-out.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register an outbound channel with the game service → `connected`
//!   2. Loop: receive request envelopes → call the service → send acks,
//!      while forwarding room events pushed onto the outbound channel
//!   3. On close, the guard tells the service the player is gone

use std::sync::Arc;
use std::time::Instant;

use pinpoint_protocol::{
    Ack, ClientRequest, Codec, Coordinates, Envelope, ErrorCode, Payload,
    PlayerId,
};
use pinpoint_room::{GameHandle, GuessStatus, Pick, RoomError};
use pinpoint_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::PinpointError;
use crate::server::ServerState;

/// Drop guard that removes the player from the game when the handler
/// exits, however it exits.
///
/// `Drop` is synchronous, so the disconnect is sent from a spawned task.
struct DisconnectGuard {
    player_id: PlayerId,
    game: GameHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let game = self.game.clone();
        tokio::spawn(async move {
            let _ = game.disconnect(player_id).await;
        });
    }
}

/// Stamps outgoing envelopes with a sequence number and timestamp.
struct Outbox {
    seq: u64,
    start: Instant,
}

impl Outbox {
    fn new() -> Self {
        Self {
            seq: 1,
            start: Instant::now(),
        }
    }

    async fn send<C: Codec>(
        &mut self,
        conn: &WebSocketConnection,
        codec: &C,
        payload: Payload,
    ) -> Result<(), PinpointError> {
        let envelope = Envelope {
            seq: next_seq(&mut self.seq),
            timestamp: self.start.elapsed().as_millis() as u64,
            payload,
        };
        let bytes = codec.encode(&envelope)?;
        conn.send(&bytes).await?;
        Ok(())
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), PinpointError> {
    let conn_id = conn.id();
    let player_id = PlayerId::from(conn_id);
    tracing::debug!(%conn_id, %player_id, "handling new connection");

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    state.game.connect(player_id, events_tx).await?;
    let _guard = DisconnectGuard {
        player_id,
        game: state.game.clone(),
    };

    let mut outbox = Outbox::new();

    loop {
        tokio::select! {
            incoming = conn.recv() => match incoming {
                Ok(Some(data)) => {
                    handle_frame(&conn, &state, player_id, &data, &mut outbox)
                        .await?;
                }
                Ok(None) => {
                    tracing::info!(%player_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%player_id, error = %e, "recv error");
                    break;
                }
            },
            event = events_rx.recv() => match event {
                Some(event) => {
                    outbox
                        .send(&conn, &state.codec, Payload::Event(event))
                        .await?;
                }
                None => {
                    tracing::warn!(%player_id, "game service went away");
                    break;
                }
            },
        }
    }

    // _guard drops here → disconnect fires.
    Ok(())
}

/// Decodes one frame and answers it: an ack for a request, an error
/// frame for anything else.
async fn handle_frame<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    player_id: PlayerId,
    data: &[u8],
    outbox: &mut Outbox,
) -> Result<(), PinpointError> {
    let envelope: Envelope = match state.codec.decode(data) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!(%player_id, error = %e, "failed to decode envelope");
            let payload = Payload::Error {
                code: ErrorCode::BadRequest,
                message: e.to_string(),
            };
            return outbox.send(conn, &state.codec, payload).await;
        }
    };

    let request = match envelope.payload {
        Payload::Request(request) => request,
        other => {
            tracing::debug!(%player_id, ?other, "ignoring non-request frame");
            let payload = Payload::Error {
                code: ErrorCode::BadRequest,
                message: "expected a request".into(),
            };
            return outbox.send(conn, &state.codec, payload).await;
        }
    };

    let ack = match dispatch(&state.game, player_id, envelope.seq, request).await
    {
        Ok(ack) => ack,
        Err(e) => {
            tracing::debug!(%player_id, error = %e, "request rejected");
            Ack::err(envelope.seq, e.code())
        }
    };
    outbox.send(conn, &state.codec, Payload::Ack(ack)).await
}

/// Forwards a request to the game service and builds its ack.
async fn dispatch(
    game: &GameHandle,
    player_id: PlayerId,
    seq: u64,
    request: ClientRequest,
) -> Result<Ack, RoomError> {
    match request {
        ClientRequest::CreateRoom { max_players } => {
            let room_id = game.create_room(player_id, max_players).await?;
            Ok(Ack::ok(seq).with_room_id(room_id))
        }
        ClientRequest::JoinRoom { room_id } => {
            game.join_room(player_id, room_id.clone()).await?;
            Ok(Ack::ok(seq).with_room_id(room_id))
        }
        ClientRequest::PickLocation {
            room_id,
            lat,
            lng,
            hint,
        } => {
            let pick = Pick::At {
                location: Coordinates::new(lat, lng),
                hint,
            };
            game.pick_location(player_id, room_id, pick).await?;
            Ok(Ack::ok(seq))
        }
        ClientRequest::PickRandomLocation { room_id, hint } => {
            game.pick_location(player_id, room_id, Pick::Random { hint })
                .await?;
            Ok(Ack::ok(seq))
        }
        ClientRequest::MakeGuess { room_id, lat, lng } => {
            let status = game
                .make_guess(player_id, room_id, Coordinates::new(lat, lng))
                .await?;
            Ok(match status {
                GuessStatus::Scored => Ack::ok(seq),
                GuessStatus::Waiting { .. } | GuessStatus::Ignored => {
                    Ack::ok(seq).with_waiting(true)
                }
            })
        }
        ClientRequest::LeaveRoom { room_id } => {
            game.leave_room(player_id, room_id).await?;
            Ok(Ack::ok(seq))
        }
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
