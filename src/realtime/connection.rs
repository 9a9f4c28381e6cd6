//! The single realtime session for the signed-in user.
//!
//! [`ConnectionManager`] owns at most one live socket at a time and drives it
//! through `Disconnected → Connecting → Connected`, reconnecting with
//! exponential backoff after transport failures until the retry budget is
//! spent. It is a cheap cloneable handle; every clone observes the same
//! state machine.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::bus::{ClientEvent, EventBus};
use crate::config::ClientConfig;
use crate::notifications::RealtimePublisher;
use crate::session::AuthSession;

use super::envelope::{Envelope, MessageKind};
use super::stomp::{decode_frames, negotiate_heartbeat, StompCommand, StompFrame, HEARTBEAT};
use super::transport::{redact_token, SocketConnection, SocketTransport, TransportError};

const SUBSCRIPTION_ID: &str = "sub-0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Last attempt failed; a reconnect may be pending.
    Error(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    #[error("realtime session is not connected")]
    NotConnected,
    #[error("failed to serialize message: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub ws_base_url: String,
    pub heartbeat: Duration,
    pub handshake_timeout: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl From<&ClientConfig> for RealtimeConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            ws_base_url: config.ws_base_url.clone(),
            heartbeat: config.heartbeat(),
            handshake_timeout: config.request_timeout(),
            reconnect_base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            reconnect_max_delay: Duration::from_millis(config.reconnect_max_delay_ms),
            max_reconnect_attempts: config.max_reconnect_attempts,
        }
    }
}

impl RealtimeConfig {
    /// `{ws_base_url}/ws?token=…`, with http(s) schemes mapped to ws(s).
    pub fn broker_url(&self, token: &str) -> String {
        let base = self.ws_base_url.trim().trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https:") {
            format!("wss:{rest}")
        } else if let Some(rest) = base.strip_prefix("http:") {
            format!("ws:{rest}")
        } else {
            base.to_string()
        };
        format!("{base}/ws?token={}", urlencoding::encode(token))
    }

    /// Authority part of the broker URL, used as the STOMP `host` header.
    pub fn broker_host(&self) -> String {
        let without_scheme = self
            .ws_base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.ws_base_url);
        without_scheme
            .split('/')
            .next()
            .unwrap_or("localhost")
            .to_string()
    }

    /// Delay before reconnect attempt `attempt` (0-based), without jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.reconnect_base_delay.as_millis() as u64;
        let delay = base.saturating_mul(2_u64.saturating_pow(attempt.min(16)));
        Duration::from_millis(delay.min(self.reconnect_max_delay.as_millis() as u64))
    }
}

/// Up to 10% extra so many clients don't reconnect in lockstep.
fn with_jitter(delay: Duration) -> Duration {
    let max_extra = delay.as_millis() as u64 / 10;
    if max_extra == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_extra))
}

#[derive(Default)]
struct Control {
    /// Bumped on every connect/disconnect; stale supervisors compare against it.
    generation: u64,
    task: Option<JoinHandle<()>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    user_id: Option<String>,
}

struct Inner {
    config: RealtimeConfig,
    transport: Arc<dyn SocketTransport>,
    control: Mutex<Control>,
    state_tx: watch::Sender<ConnectionState>,
    inbound_tx: mpsc::UnboundedSender<String>,
    bus: Option<Arc<EventBus>>,
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, Control> {
        self.control.lock().expect("connection control mutex poisoned")
    }

    fn publish_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state.clone());
        if previous != state {
            debug!("realtime state {previous} -> {state}");
            if let Some(bus) = &self.bus {
                bus.emit(ClientEvent::ConnectionChanged {
                    state: state.to_string(),
                });
            }
        }
    }

    /// Apply a state change on behalf of supervisor `generation`. Returns
    /// false when that supervisor has been superseded.
    fn update_state(&self, generation: u64, state: ConnectionState) -> bool {
        let control = self.lock();
        if control.generation != generation {
            return false;
        }
        self.publish_state(state);
        true
    }

    fn mark_connected(&self, generation: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        let mut control = self.lock();
        if control.generation != generation {
            return false;
        }
        control.outbound = Some(outbound);
        self.publish_state(ConnectionState::Connected);
        true
    }

    fn clear_outbound(&self, generation: u64) {
        let mut control = self.lock();
        if control.generation == generation {
            control.outbound = None;
        }
    }
}

#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager plus the receiver of inbound message bodies. Bodies
    /// arrive in broker order; feed them to a single dispatcher.
    pub fn new(
        config: RealtimeConfig,
        transport: Arc<dyn SocketTransport>,
        bus: Option<Arc<EventBus>>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let manager = Self {
            inner: Arc::new(Inner {
                config,
                transport,
                control: Mutex::new(Control::default()),
                state_tx,
                inbound_tx,
                bus,
            }),
        };
        (manager, inbound_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.inner.state_tx.borrow(), ConnectionState::Connected)
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Start connecting. Returns false (and does nothing) when there is no
    /// usable session or a session is already connecting or connected.
    pub fn connect(&self, session: Option<&AuthSession>) -> bool {
        let Some(session) = session.filter(|s| s.is_valid()) else {
            warn!("realtime: user not authenticated, skipping connect");
            return false;
        };

        let mut control = self.inner.lock();
        match &*self.inner.state_tx.borrow() {
            ConnectionState::Connecting | ConnectionState::Connected => {
                debug!("realtime: already connecting or connected");
                return false;
            }
            ConnectionState::Disconnected | ConnectionState::Error(_) => {}
        }

        // A supervisor sleeping through backoff is replaced, not doubled.
        if let Some(task) = control.task.take() {
            task.abort();
        }
        control.generation += 1;
        control.outbound = None;
        control.user_id = Some(session.user_id.clone());
        let generation = control.generation;
        self.inner.publish_state(ConnectionState::Connecting);

        let inner = self.inner.clone();
        let session = session.clone();
        control.task = Some(tokio::spawn(async move {
            supervise(inner, generation, session).await;
        }));
        true
    }

    /// Tear down the session and any pending reconnect. Safe to call at any
    /// time, any number of times.
    pub fn disconnect(&self) {
        let mut control = self.inner.lock();
        control.generation += 1;
        if let Some(task) = control.task.take() {
            task.abort();
        }
        let had_socket = control.outbound.take().is_some();
        let had_user = control.user_id.take().is_some();
        self.inner.publish_state(ConnectionState::Disconnected);
        if had_socket || had_user {
            info!("realtime: disconnected");
        }
    }

    /// Queue `{type, data}` for the user's outbound destination.
    pub fn send_message(
        &self,
        kind: MessageKind,
        data: serde_json::Value,
    ) -> Result<(), RealtimeError> {
        let control = self.inner.lock();
        if !matches!(*self.inner.state_tx.borrow(), ConnectionState::Connected) {
            warn!("realtime: not connected, dropping {kind} message");
            return Err(RealtimeError::NotConnected);
        }
        let (Some(outbound), Some(user_id)) = (control.outbound.as_ref(), control.user_id.as_ref())
        else {
            return Err(RealtimeError::NotConnected);
        };

        let body = Envelope::new(kind, &data)
            .to_json()
            .map_err(|e| RealtimeError::Serialization(e.to_string()))?;
        let frame = StompFrame::send(&format!("/app/send/user.{user_id}"), body);
        outbound
            .send(frame.encode())
            .map_err(|_| RealtimeError::NotConnected)?;
        trace!("queued outbound {kind} message");
        Ok(())
    }
}

impl RealtimePublisher for ConnectionManager {
    fn is_connected(&self) -> bool {
        ConnectionManager::is_connected(self)
    }

    fn publish(&self, kind: MessageKind, data: serde_json::Value) -> Result<(), RealtimeError> {
        self.send_message(kind, data)
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

async fn supervise(inner: Arc<Inner>, generation: u64, session: AuthSession) {
    let url = inner.config.broker_url(&session.token);
    let max_attempts = inner.config.max_reconnect_attempts;
    let mut failures: u32 = 0;

    loop {
        let (was_connected, result) = run_session(&inner, generation, &session, &url).await;
        if was_connected {
            failures = 0;
        }

        let next_state = match &result {
            Ok(()) => ConnectionState::Disconnected,
            Err(e) => {
                warn!("realtime session to {} ended: {e}", redact_token(&url));
                ConnectionState::Error(e.to_string())
            }
        };
        if !inner.update_state(generation, next_state) {
            return;
        }

        if failures >= max_attempts {
            warn!("realtime: giving up after {max_attempts} reconnect attempts");
            inner.update_state(generation, ConnectionState::Disconnected);
            return;
        }

        let delay = with_jitter(inner.config.backoff_delay(failures));
        failures += 1;
        info!("realtime: reconnecting in {delay:?} (attempt {failures}/{max_attempts})");
        tokio::time::sleep(delay).await;

        if !inner.update_state(generation, ConnectionState::Connecting) {
            return;
        }
    }
}

/// One socket lifetime: open, handshake, subscribe, pump until it ends.
/// The flag reports whether the session reached `Connected`.
async fn run_session(
    inner: &Inner,
    generation: u64,
    session: &AuthSession,
    url: &str,
) -> (bool, Result<(), TransportError>) {
    let mut socket = match inner.transport.connect(url).await {
        Ok(socket) => socket,
        Err(e) => return (false, Err(e)),
    };

    let heartbeat = match handshake(socket.as_mut(), &inner.config, session).await {
        Ok(heartbeat) => heartbeat,
        Err(e) => {
            close_socket(socket.as_mut()).await;
            return (false, Err(e));
        }
    };

    let destination = format!("/queue/user.{}", session.user_id);
    let subscribe = StompFrame::subscribe(SUBSCRIPTION_ID, &destination).encode();
    if let Err(e) = socket.send_text(subscribe).await {
        close_socket(socket.as_mut()).await;
        return (false, Err(e));
    }

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    if !inner.mark_connected(generation, outbound_tx) {
        close_socket(socket.as_mut()).await;
        return (false, Ok(()));
    }
    info!("realtime: connected, subscribed to {destination}");

    let result = pump(inner, socket.as_mut(), &mut outbound_rx, heartbeat).await;
    inner.clear_outbound(generation);
    close_socket(socket.as_mut()).await;
    (true, result)
}

async fn close_socket(socket: &mut dyn SocketConnection) {
    if let Err(e) = socket.close().await {
        debug!("realtime: close failed: {e}");
    }
}

async fn handshake(
    socket: &mut dyn SocketConnection,
    config: &RealtimeConfig,
    session: &AuthSession,
) -> Result<(Option<Duration>, Option<Duration>), TransportError> {
    let connect = StompFrame::connect(&config.broker_host(), &session.token, config.heartbeat);
    socket.send_text(connect.encode()).await?;

    let wait_for_connected = async {
        loop {
            let text = match socket.recv_text().await {
                Some(Ok(text)) => text,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(TransportError::Closed(
                        "socket closed during STOMP handshake".to_string(),
                    ))
                }
            };
            let frames = match decode_frames(&text) {
                Ok(frames) => frames,
                Err(e) => return Err(TransportError::Protocol(e.to_string())),
            };
            for frame in frames {
                match frame.command {
                    StompCommand::Connected => return Ok(frame),
                    StompCommand::Error => return Err(TransportError::Protocol(error_reason(&frame))),
                    other => debug!("ignoring {other} frame before CONNECTED"),
                }
            }
        }
    };

    let connected = tokio::time::timeout(config.handshake_timeout, wait_for_connected)
        .await
        .map_err(|_| TransportError::Timeout(config.handshake_timeout))??;

    Ok(negotiate_heartbeat(config.heartbeat, connected.get("heart-beat")))
}

async fn pump(
    inner: &Inner,
    socket: &mut dyn SocketConnection,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    (outgoing, incoming): (Option<Duration>, Option<Duration>),
) -> Result<(), TransportError> {
    let mut beat = outgoing.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    let silence_limit = incoming.map(|period| period * 2);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            received = socket.recv_text() => {
                last_seen = Instant::now();
                match received {
                    Some(Ok(text)) => route_inbound(inner, &text)?,
                    Some(Err(e)) => return Err(e),
                    None => return Err(TransportError::Closed("broker closed the socket".to_string())),
                }
            }
            queued = outbound.recv() => {
                match queued {
                    Some(text) => socket.send_text(text).await?,
                    None => return Ok(()),
                }
            }
            _ = next_beat(&mut beat) => {
                socket.send_text(HEARTBEAT.to_string()).await?;
            }
            limit = silence(silence_limit, last_seen) => {
                return Err(TransportError::HeartbeatTimeout(limit));
            }
        }
    }
}

async fn next_beat(beat: &mut Option<Interval>) {
    match beat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn silence(limit: Option<Duration>, since: Instant) -> Duration {
    match limit {
        Some(limit) => {
            tokio::time::sleep_until(since + limit).await;
            limit
        }
        None => std::future::pending().await,
    }
}

/// Forward MESSAGE bodies to the dispatcher; an ERROR frame ends the session.
fn route_inbound(inner: &Inner, text: &str) -> Result<(), TransportError> {
    let frames = match decode_frames(text) {
        Ok(frames) => frames,
        Err(e) => {
            warn!("realtime: dropping malformed STOMP frame: {e}");
            return Ok(());
        }
    };

    for frame in frames {
        match frame.command {
            StompCommand::Message => {
                if inner.inbound_tx.send(frame.body).is_err() {
                    debug!("realtime: no dispatcher attached, message dropped");
                }
            }
            StompCommand::Error => return Err(TransportError::Protocol(error_reason(&frame))),
            StompCommand::Receipt => trace!("receipt {:?}", frame.get("receipt-id")),
            other => debug!("realtime: ignoring unexpected {other} frame"),
        }
    }
    Ok(())
}

fn error_reason(frame: &StompFrame) -> String {
    match (frame.get("message"), frame.body.trim()) {
        (Some(message), "") => message.to_string(),
        (Some(message), body) => format!("{message}: {body}"),
        (None, "") => "broker sent ERROR".to_string(),
        (None, body) => body.to_string(),
    }
}
