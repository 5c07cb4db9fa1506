//! WebSocket Fire Server
//!
//! Async WebSocket server hosting one `ControllerAuthority` per connection.
//! Each connection is ticked at the configured rate against a shared scene;
//! submitted hits are validated there and answered with a confirm/deny.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};
use uuid::Uuid;

use crate::network::protocol::{
    ClientMessage, ErrorCode, ServerError, ServerMessage, WelcomeInfo,
};
use crate::protocol::authority::{AuthorityConfig, ControllerAuthority};
use crate::protocol::client::FireRateGate;
use crate::protocol::ledger::LedgerConfig;
use crate::targeting::hit::ActorId;
use crate::targeting::scene::Scene;
use crate::weapon::config::WeaponConfig;
use crate::weapon::motion::MotionSnapshot;

/// First pawn id handed to connections.
const FIRST_PAWN_ID: u32 = 1000;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Idle time before a connection is dropped.
    pub connection_timeout: Duration,
    /// Authority tick rate (Hz).
    pub tick_rate: u32,
    /// Minimum seconds between accepted activations.
    pub refire_interval: f64,
    /// Hit validation tolerances.
    pub authority: AuthorityConfig,
    /// Confirmed-hit window.
    pub ledger: LedgerConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            connection_timeout: Duration::from_secs(30),
            tick_rate: crate::TICK_RATE,
            refire_interval: 0.05,
            authority: AuthorityConfig::default(),
            ledger: LedgerConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `RANGED_FIRE_BIND`, `RANGED_FIRE_TICK_RATE`
    /// and `RANGED_FIRE_MAX_CONNECTIONS`.
    pub fn from_env() -> Result<Self, GameServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GameServerError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("RANGED_FIRE_BIND") {
            config.bind_addr = bind
                .parse()
                .map_err(|e| GameServerError::Config(format!("RANGED_FIRE_BIND={}: {}", bind, e)))?;
        }
        if let Some(rate) = lookup("RANGED_FIRE_TICK_RATE") {
            config.tick_rate = rate
                .parse()
                .ok()
                .filter(|r| *r > 0)
                .ok_or_else(|| GameServerError::Config(format!("RANGED_FIRE_TICK_RATE={}", rate)))?;
        }
        if let Some(max) = lookup("RANGED_FIRE_MAX_CONNECTIONS") {
            config.max_connections = max
                .parse()
                .map_err(|e| GameServerError::Config(format!("RANGED_FIRE_MAX_CONNECTIONS={}: {}", max, e)))?;
        }

        Ok(config)
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached")]
    ConnectionLimitReached,

    /// Bad configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Connected client bookkeeping.
struct ConnectedClient {
    /// Controller id assigned on connect.
    controller_id: Uuid,
    /// Pawn driven by the connection.
    pawn: ActorId,
    /// Connection time.
    connected_at: Instant,
}

// =============================================================================
// PER-CONNECTION STATE
// =============================================================================

/// Authority state owned by one connection task.
pub struct ConnectionState {
    authority: ControllerAuthority,
    motion: MotionSnapshot,
    last_tick: Option<f64>,
}

impl ConnectionState {
    /// Fresh state for a connection driving `pawn`.
    pub fn new(controller_id: Uuid, pawn: ActorId, config: &ServerConfig) -> Self {
        let gate = Box::new(FireRateGate::new(config.refire_interval));
        Self {
            authority: ControllerAuthority::new(
                controller_id,
                pawn,
                gate,
                config.authority.clone(),
                &config.ledger,
            ),
            motion: MotionSnapshot::still(),
            last_tick: None,
        }
    }

    /// The hosted authority.
    pub fn authority(&self) -> &ControllerAuthority {
        &self.authority
    }

    /// Advance the authority to `now` (seconds since server start).
    pub fn tick(&mut self, now: f64) {
        let delta = self.last_tick.map(|last| (now - last).max(0.0) as f32).unwrap_or(0.0);
        self.last_tick = Some(now);
        self.authority.tick(delta, now, &self.motion);
    }

    /// Apply one client message, returning the replies to send.
    pub fn handle(&mut self, msg: ClientMessage, scene: &Scene, now: f64) -> Vec<ServerMessage> {
        match msg {
            ClientMessage::Equip { weapon_id, preset } => {
                let Some(config) = WeaponConfig::preset(&preset) else {
                    return vec![ServerMessage::Error(ServerError::new(
                        ErrorCode::UnknownWeapon,
                        format!("unknown weapon preset '{}'", preset),
                    ))];
                };
                match self.authority.equip(weapon_id, Arc::new(config)) {
                    Ok(()) => vec![ServerMessage::Equipped { weapon_id }],
                    Err(e) => vec![ServerMessage::Error(ServerError::new(
                        ErrorCode::UnknownWeapon,
                        e.to_string(),
                    ))],
                }
            }
            ClientMessage::Unequip => {
                self.authority.unequip();
                Vec::new()
            }
            ClientMessage::Motion(snapshot) => {
                if let Some(location) = snapshot.location.filter(|l| l.is_finite()) {
                    self.authority.set_pawn_location(location);
                }
                self.motion = snapshot;
                Vec::new()
            }
            ClientMessage::SubmitTargetData(submission) => {
                let result = self.authority.handle_submission(&submission, scene, now);
                for event in &result.damage {
                    info!(
                        controller = %self.authority.controller_id(),
                        cartridge = event.cartridge_id,
                        target = event.target.0,
                        amount = event.amount,
                        "damage applied"
                    );
                }
                vec![ServerMessage::ConfirmTargetData(result.reply)]
            }
            ClientMessage::Ping { timestamp } => {
                vec![ServerMessage::Pong { timestamp, server_time: unix_millis() }]
            }
        }
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// =============================================================================
// SERVER
// =============================================================================

/// The fire server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Collision data shared by every authority.
    scene: Arc<RwLock<Scene>>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Pawn id allocator.
    next_pawn: Arc<AtomicU32>,
    /// Server start, the zero of authority time.
    started: Instant,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new server over `scene`.
    pub fn new(config: ServerConfig, scene: Scene) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            scene: Arc::new(RwLock::new(scene)),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            next_pawn: Arc::new(AtomicU32::new(FIRST_PAWN_ID)),
            started: Instant::now(),
            shutdown_tx,
        }
    }

    /// Shared scene handle.
    pub fn scene(&self) -> Arc<RwLock<Scene>> {
        self.scene.clone()
    }

    /// Run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Fire server listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("{}, rejecting {}", GameServerError::ConnectionLimitReached, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let scene = self.scene.clone();
        let config = self.config.clone();
        let started = self.started;
        let pawn = ActorId(self.next_pawn.fetch_add(1, Ordering::Relaxed));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            let controller_id = Uuid::new_v4();
            let mut state = ConnectionState::new(controller_id, pawn, &config);

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    controller_id,
                    pawn,
                    connected_at: Instant::now(),
                });
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let _ = msg_tx.send(ServerMessage::Welcome(WelcomeInfo {
                controller_id: controller_id.to_string(),
                pawn: pawn.0,
                server_version: config.version.clone(),
                tick_rate: config.tick_rate,
            })).await;

            let mut tick_interval = interval(Duration::from_secs_f64(1.0 / f64::from(config.tick_rate.max(1))));
            tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last_activity = Instant::now();

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        ))).await;
                                        continue;
                                    }
                                };

                                last_activity = Instant::now();
                                let now = started.elapsed().as_secs_f64();
                                let replies = {
                                    let scene = scene.read().await;
                                    state.handle(client_msg, &scene, now)
                                };
                                for reply in replies {
                                    if msg_tx.send(reply).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(_))) => {
                                last_activity = Instant::now();
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = tick_interval.tick() => {
                        if last_activity.elapsed() > config.connection_timeout {
                            info!("Client {} idle, dropping", addr);
                            let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                ErrorCode::Timeout,
                                "Connection idle",
                            ))).await;
                            break;
                        }
                        state.tick(started.elapsed().as_secs_f64());
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Let queued replies flush before the writer goes away
            drop(msg_tx);
            let _ = tokio::time::timeout(Duration::from_millis(250), sender_task).await;

            if let Some(client) = clients.write().await.remove(&addr) {
                info!(
                    controller = %client.controller_id,
                    pawn = client.pawn.0,
                    connected_for = ?client.connected_at.elapsed(),
                    "Client {} cleaned up",
                    addr
                );
            }
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}
