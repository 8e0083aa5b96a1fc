//! `PointforgeServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → session → room. Also
//! owns the background sweep that enforces grace periods and reaps rooms.

use std::sync::Arc;
use std::time::Duration;

use pointforge_protocol::JsonCodec;
use pointforge_room::{RoomConfig, RoomRegistry};
use pointforge_session::{DirectoryConfig, SessionDirectory};
use pointforge_transport::{Listener, WebSocketListener};
use tokio::sync::Mutex;

use crate::PointforgeError;
use crate::handler::handle_connection;
use crate::subscriptions::SubscriptionRegistry;

/// How often the sweep task runs by default.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc`; interior mutability via `Mutex` where needed. The
/// lock order is trivial: no code path holds two of these locks at once,
/// and nothing calls into a room coordinator while holding one.
pub(crate) struct ServerState {
    pub(crate) registry: Mutex<RoomRegistry>,
    pub(crate) directory: Mutex<SessionDirectory>,
    pub(crate) subscriptions: Mutex<SubscriptionRegistry>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Pointforge server.
///
/// # Example
///
/// ```rust,ignore
/// use pointforge::prelude::*;
///
/// let server = PointforgeServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct PointforgeServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    directory_config: DirectoryConfig,
    sweep_interval: Duration,
}

impl PointforgeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            directory_config: DirectoryConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the room grace periods.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets the identity retention configuration.
    pub fn directory_config(mut self, config: DirectoryConfig) -> Self {
        self.directory_config = config;
        self
    }

    /// Sets how often the expiry sweep runs.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<PointforgeServer, PointforgeError> {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(RoomRegistry::new(self.room_config)),
            directory: Mutex::new(SessionDirectory::new(
                self.directory_config,
            )),
            subscriptions: Mutex::new(SubscriptionRegistry::new()),
            codec: JsonCodec,
        });

        Ok(PointforgeServer {
            listener,
            state,
            sweep_interval: self.sweep_interval,
        })
    }
}

impl Default for PointforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Pointforge server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PointforgeServer {
    listener: WebSocketListener,
    state: Arc<ServerState>,
    sweep_interval: Duration,
}

impl PointforgeServer {
    /// Creates a new builder.
    pub fn builder() -> PointforgeServerBuilder {
        PointforgeServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the server: the sweep task plus the accept loop. Runs until
    /// the process is terminated.
    pub async fn run(mut self) -> Result<(), PointforgeError> {
        tracing::info!("Pointforge server running");

        tokio::spawn(run_sweeper(
            Arc::clone(&self.state),
            self.sweep_interval,
        ));

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(handle_connection(conn, state));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// The background sweep loop.
async fn run_sweeper(state: Arc<ServerState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(
        tokio::time::MissedTickBehavior::Delay,
    );
    loop {
        ticker.tick().await;
        sweep_once(&state).await;
    }
}

/// One sweep pass over every room.
///
/// Each room's sweep runs through that room's own serialized queue, so it
/// can never interleave with an operation in flight. A room is destroyed
/// only once it is both empty past its grace period and has no retained
/// identities left in the directory.
async fn sweep_once(state: &Arc<ServerState>) {
    let handles = state.registry.lock().await.handles();

    for handle in handles {
        let code = handle.code().clone();
        let report = match handle.sweep().await {
            Ok(report) => report,
            // Raced a concurrent destroy; nothing to do.
            Err(_) => continue,
        };

        if !report.outbound.is_empty() {
            state
                .subscriptions
                .lock()
                .await
                .fan_out(&code, &report.outbound);
        }

        let retained = {
            let mut directory = state.directory.lock().await;
            for member in &report.expired {
                directory.forget(&code, member.voter_key);
            }
            directory.has_retained(&code)
        };

        if report.expendable && !retained {
            let _ = state.registry.lock().await.destroy(&code).await;
            state.subscriptions.lock().await.drop_room(&code);
            state.directory.lock().await.purge_room(&code);
        }
    }

    let pruned = state.directory.lock().await.expire_stale();
    if pruned > 0 {
        tracing::debug!(pruned, "retained identities expired");
    }
}
