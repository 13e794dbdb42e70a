//! Game service: the single event loop that owns every room.
//!
//! One Tokio task holds the [`RoomManager`], the outbound channel of every
//! connected player, and the pending `newRound` timers. Connections talk
//! to it through a cloneable [`GameHandle`]; each request carries a
//! oneshot reply channel. Commands are processed strictly one at a time,
//! so a leave and a guess for the same room can never interleave.

use std::collections::HashMap;
use std::time::Duration;

use pinpoint_protocol::{
    Coordinates, PlayerId, Recipient, RoomCode, Scoreboard, ServerEvent,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::room::{Events, GuessStatus, LeaveOutcome, RoundPhase};
use crate::{RoomConfig, RoomError, RoomManager};

/// Channel sender for delivering events to one player's connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// How the picker chooses a location.
#[derive(Debug, Clone, PartialEq)]
pub enum Pick {
    /// An explicit point.
    At {
        location: Coordinates,
        hint: Option<String>,
    },
    /// Let the server choose.
    Random { hint: Option<String> },
}

/// A snapshot of room metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub room_id: RoomCode,
    /// Players in turn order.
    pub players: Vec<PlayerId>,
    pub scores: Scoreboard,
    pub picker: Option<PlayerId>,
    pub phase: RoundPhase,
    pub capacity: usize,
    pub rounds_played: u64,
}

/// Commands sent to the service through its channel.
pub(crate) enum Command {
    Connect {
        player_id: PlayerId,
        sender: PlayerSender,
    },
    Disconnect {
        player_id: PlayerId,
    },
    CreateRoom {
        player_id: PlayerId,
        max_players: Option<usize>,
        reply: oneshot::Sender<Result<RoomCode, RoomError>>,
    },
    JoinRoom {
        player_id: PlayerId,
        room_id: RoomCode,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    PickLocation {
        player_id: PlayerId,
        room_id: RoomCode,
        pick: Pick,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    MakeGuess {
        player_id: PlayerId,
        room_id: RoomCode,
        guess: Coordinates,
        reply: oneshot::Sender<Result<GuessStatus, RoomError>>,
    },
    LeaveRoom {
        player_id: PlayerId,
        room_id: RoomCode,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    GetRoom {
        room_id: RoomCode,
        reply: oneshot::Sender<Option<RoomInfo>>,
    },
    /// Fired by a room's timer once the presentation delay has passed.
    /// `round` is the room's `rounds_played` when the timer was set.
    NewRoundDue {
        room_id: RoomCode,
        round: u64,
    },
    Shutdown,
}

/// Handle to the running game service.
///
/// Cheap to clone; every connection task holds one.
#[derive(Clone)]
pub struct GameHandle {
    sender: mpsc::Sender<Command>,
}

impl GameHandle {
    /// Registers a connection's outbound channel.
    pub async fn connect(
        &self,
        player_id: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.send(Command::Connect { player_id, sender }).await
    }

    /// Drops a connection: removes it from its room (if any) and forgets
    /// its outbound channel.
    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.send(Command::Disconnect { player_id }).await
    }

    pub async fn create_room(
        &self,
        player_id: PlayerId,
        max_players: Option<usize>,
    ) -> Result<RoomCode, RoomError> {
        self.request(|reply| Command::CreateRoom {
            player_id,
            max_players,
            reply,
        })
        .await?
    }

    pub async fn join_room(
        &self,
        player_id: PlayerId,
        room_id: RoomCode,
    ) -> Result<(), RoomError> {
        self.request(|reply| Command::JoinRoom {
            player_id,
            room_id,
            reply,
        })
        .await?
    }

    pub async fn pick_location(
        &self,
        player_id: PlayerId,
        room_id: RoomCode,
        pick: Pick,
    ) -> Result<(), RoomError> {
        self.request(|reply| Command::PickLocation {
            player_id,
            room_id,
            pick,
            reply,
        })
        .await?
    }

    pub async fn make_guess(
        &self,
        player_id: PlayerId,
        room_id: RoomCode,
        guess: Coordinates,
    ) -> Result<GuessStatus, RoomError> {
        self.request(|reply| Command::MakeGuess {
            player_id,
            room_id,
            guess,
            reply,
        })
        .await?
    }

    pub async fn leave_room(
        &self,
        player_id: PlayerId,
        room_id: RoomCode,
    ) -> Result<(), RoomError> {
        self.request(|reply| Command::LeaveRoom {
            player_id,
            room_id,
            reply,
        })
        .await?
    }

    /// Returns room metadata, or `None` if the room doesn't exist.
    pub async fn room_info(
        &self,
        room_id: RoomCode,
    ) -> Result<Option<RoomInfo>, RoomError> {
        self.request(|reply| Command::GetRoom { room_id, reply }).await
    }

    /// Stops the service. Pending timers are aborted.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, cmd: Command) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx)).await?;
        reply_rx.await.map_err(|_| RoomError::Unavailable)
    }
}

/// The service state. Runs inside a Tokio task.
struct GameService {
    manager: RoomManager,
    /// Per-player outbound channels.
    senders: HashMap<PlayerId, PlayerSender>,
    /// Pending `newRound` announcements, one per room at most.
    timers: HashMap<RoomCode, JoinHandle<()>>,
    new_round_delay: Duration,
    receiver: mpsc::Receiver<Command>,
    /// Lets timers post back into the loop without keeping it alive.
    loopback: mpsc::WeakSender<Command>,
}

impl GameService {
    /// Runs the event loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!("game service started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                Command::Connect { player_id, sender } => {
                    self.senders.insert(player_id, sender);
                    self.send_to(
                        player_id,
                        ServerEvent::Connected {
                            socket_id: player_id,
                        },
                    );
                }
                Command::Disconnect { player_id } => {
                    self.senders.remove(&player_id);
                    if let Some((room_id, outcome, events)) =
                        self.manager.disconnect(player_id)
                    {
                        self.after_leave(&room_id, outcome, events);
                    }
                }
                Command::CreateRoom {
                    player_id,
                    max_players,
                    reply,
                } => {
                    let result = self
                        .manager
                        .create_room(player_id, max_players)
                        .map(|(room_id, events)| {
                            self.dispatch(&room_id, events);
                            room_id
                        });
                    let _ = reply.send(result);
                }
                Command::JoinRoom {
                    player_id,
                    room_id,
                    reply,
                } => {
                    let result = self
                        .manager
                        .join_room(&room_id, player_id)
                        .map(|events| self.dispatch(&room_id, events));
                    let _ = reply.send(result);
                }
                Command::PickLocation {
                    player_id,
                    room_id,
                    pick,
                    reply,
                } => {
                    let result = match pick {
                        Pick::At { location, hint } => self
                            .manager
                            .pick_location(&room_id, player_id, location, hint),
                        Pick::Random { hint } => self
                            .manager
                            .pick_random_location(&room_id, player_id, hint),
                    }
                    .map(|events| self.dispatch(&room_id, events));
                    let _ = reply.send(result);
                }
                Command::MakeGuess {
                    player_id,
                    room_id,
                    guess,
                    reply,
                } => {
                    let result = self
                        .manager
                        .submit_guess(&room_id, player_id, guess)
                        .map(|(status, events)| {
                            self.dispatch(&room_id, events);
                            if status == GuessStatus::Scored {
                                self.schedule_new_round(&room_id);
                            }
                            status
                        });
                    let _ = reply.send(result);
                }
                Command::LeaveRoom {
                    player_id,
                    room_id,
                    reply,
                } => {
                    let result = self
                        .manager
                        .leave_room(&room_id, player_id)
                        .map(|(outcome, events)| {
                            self.after_leave(&room_id, outcome, events);
                        });
                    let _ = reply.send(result);
                }
                Command::GetRoom { room_id, reply } => {
                    let _ = reply.send(self.info(&room_id));
                }
                Command::NewRoundDue { room_id, round } => {
                    self.announce_new_round(&room_id, round);
                }
                Command::Shutdown => {
                    tracing::info!("game service shutting down");
                    break;
                }
            }
        }

        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        tracing::info!("game service stopped");
    }

    fn after_leave(
        &mut self,
        room_id: &RoomCode,
        outcome: LeaveOutcome,
        events: Events,
    ) {
        if outcome.room_empty {
            self.cancel_timer(room_id);
            return;
        }
        self.dispatch(room_id, events);
        if outcome.round_scored {
            self.schedule_new_round(room_id);
        }
    }

    /// Arms (or re-arms) the room's `newRound` timer.
    fn schedule_new_round(&mut self, room_id: &RoomCode) {
        let Some(round) = self.manager.room(room_id).map(|r| r.rounds_played())
        else {
            return;
        };
        self.cancel_timer(room_id);

        if self.new_round_delay.is_zero() {
            self.announce_new_round(room_id, round);
            return;
        }

        let delay = self.new_round_delay;
        let loopback = self.loopback.clone();
        let timer_room = room_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = loopback.upgrade() {
                let _ = tx
                    .send(Command::NewRoundDue {
                        room_id: timer_room,
                        round,
                    })
                    .await;
            }
        });
        self.timers.insert(room_id.clone(), handle);
    }

    fn cancel_timer(&mut self, room_id: &RoomCode) {
        if let Some(timer) = self.timers.remove(room_id) {
            timer.abort();
            tracing::debug!(room_id = %room_id, "new round timer cancelled");
        }
    }

    /// Broadcasts `newRound` unless the room is gone, has scored another
    /// round since, or its picker already started the next one.
    fn announce_new_round(&mut self, room_id: &RoomCode, round: u64) {
        let Some(room) = self.manager.room(room_id) else {
            return;
        };
        if room.rounds_played() != round {
            return;
        }
        self.timers.remove(room_id);
        if room.phase() == RoundPhase::Guessing {
            return;
        }
        let event = room.new_round_event();
        self.dispatch(room_id, vec![(Recipient::All, event)]);
    }

    /// Delivers events to the room's current members.
    fn dispatch(&self, room_id: &RoomCode, events: Events) {
        let members = match self.manager.room(room_id) {
            Some(room) => room.players(),
            None => return,
        };
        for (recipient, event) in events {
            match recipient {
                Recipient::All => {
                    for pid in members {
                        self.send_to(*pid, event.clone());
                    }
                }
                Recipient::Player(pid) => {
                    self.send_to(pid, event);
                }
                Recipient::AllExcept(excluded) => {
                    for pid in members {
                        if *pid != excluded {
                            self.send_to(*pid, event.clone());
                        }
                    }
                }
            }
        }
    }

    /// Sends an event to a single player. Silently drops if the
    /// connection is gone.
    fn send_to(&self, player_id: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&player_id) {
            let _ = sender.send(event);
        }
    }

    fn info(&self, room_id: &RoomCode) -> Option<RoomInfo> {
        self.manager.room(room_id).map(|room| RoomInfo {
            room_id: room.code().clone(),
            players: room.players().to_vec(),
            scores: room.scoreboard(),
            picker: room.picker(),
            phase: room.phase(),
            capacity: room.capacity(),
            rounds_played: room.rounds_played(),
        })
    }
}

/// Spawns the game service task and returns a handle to it.
///
/// `channel_size` bounds the command queue; when it fills up, callers
/// wait (backpressure).
pub fn spawn_service(config: RoomConfig, channel_size: usize) -> GameHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));

    let service = GameService {
        new_round_delay: config.new_round_delay(),
        manager: RoomManager::new(config),
        senders: HashMap::new(),
        timers: HashMap::new(),
        receiver: rx,
        loopback: tx.downgrade(),
    };

    tokio::spawn(service.run());

    GameHandle { sender: tx }
}
