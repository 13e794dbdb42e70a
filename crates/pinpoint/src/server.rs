//! `PinpointServer` builder and server loop.
//!
//! This is the entry point for running a Pinpoint game server. It ties
//! together all the layers: transport → protocol → game service.

use std::sync::Arc;
use std::time::Duration;

use pinpoint_protocol::{Codec, JsonCodec};
use pinpoint_room::{GameHandle, RoomConfig, spawn_service};
use pinpoint_transport::{Incoming, Transport, WebSocketTransport};

use crate::PinpointError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;

/// How long a peer gets to finish the WebSocket upgrade after connecting.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. All room
/// state lives behind `game`, so no locking is needed here.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) game: GameHandle,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Pinpoint server.
///
/// # Example
///
/// ```rust,ignore
/// use pinpoint::prelude::*;
///
/// let server = PinpointServer::builder()
///     .bind("0.0.0.0:3001")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct PinpointServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    command_buffer: usize,
}

impl PinpointServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&ServerConfig::default())
    }

    /// Creates a builder from a loaded [`ServerConfig`].
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.listen_addr.clone(),
            room_config: config.rooms.clone(),
            command_buffer: config.command_buffer,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the settings applied to every room.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets the capacity of the game service's command queue.
    pub fn command_buffer(mut self, size: usize) -> Self {
        self.command_buffer = size;
        self
    }

    /// Binds the listener and starts the game service.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<PinpointServer<JsonCodec>, PinpointError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let game = spawn_service(self.room_config, self.command_buffer);

        let state = Arc::new(ServerState {
            game,
            codec: JsonCodec,
        });

        Ok(PinpointServer { transport, state })
    }
}

impl Default for PinpointServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Pinpoint game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PinpointServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl PinpointServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PinpointServerBuilder {
        PinpointServerBuilder::new()
    }
}

impl<C> PinpointServer<C>
where
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the game service, e.g. for shutting it down once
    /// [`run()`](Self::run) has been cancelled.
    pub fn game(&self) -> GameHandle {
        self.state.game.clone()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming sockets and spawns a task for each that completes
    /// the WebSocket upgrade and then runs the connection handler. A peer
    /// that stalls the upgrade only holds up its own task.
    ///
    /// Runs until the process is terminated or the future is dropped.
    pub async fn run(mut self) -> Result<(), PinpointError> {
        tracing::info!("pinpoint server running");

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let addr = incoming.peer_addr();
                        let conn = match tokio::time::timeout(
                            HANDSHAKE_TIMEOUT,
                            incoming.upgrade(),
                        )
                        .await
                        {
                            Ok(Ok(conn)) => conn,
                            Ok(Err(e)) => {
                                tracing::debug!(
                                    %addr,
                                    error = %e,
                                    "websocket handshake failed"
                                );
                                return;
                            }
                            Err(_) => {
                                tracing::debug!(
                                    %addr,
                                    "websocket handshake timed out"
                                );
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
