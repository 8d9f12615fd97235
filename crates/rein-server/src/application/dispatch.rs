//! Per-connection message dispatch and the shared server context.
//!
//! [`ServerContext`] holds everything connections share: the session
//! registry, the rate limiter, the live runtime configuration, the input
//! executor, the mirror pipeline and the directory of open connections.
//!
//! [`ConnectionHandler`] owns one connection's private state and runs every
//! inbound text frame through the same sequence:
//!
//! ```text
//!   size check ─► JSON parse ─► duplicate filter ─► token touch
//!        │
//!        ├─ admin kind ─► handled here (pairing, tokens, config, mirror)
//!        │
//!        └─ input kind ─► authorized? ─► rate limit ─► validate ─► sanitize ─► executor
//! ```
//!
//! Frames that fail any step are dropped without a reply.  Only admin
//! requests get error messages back.
//!
//! # Locks
//!
//! Shared state sits behind `std::sync` locks.  None of them is ever held
//! across an `.await`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use rein_core::protocol::limits::MAX_CLIPBOARD_CHARS;
use rein_core::protocol::sanitize::truncate_chars;
use rein_core::{
    sanitize, validate, AdminRequest, ClipboardTracker, ConnectionId, InputKind, InputMessage,
    PlatformProfile, RateLimiter, ServerMessage,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::cursor_fallback::{CursorController, FallbackPointer};
use crate::application::execute_input::{
    Automation, ClipboardAccess, InputExecutor, MoveCoalescer,
};
use crate::application::mirror::{CaptureSlot, MirrorPipeline, MirrorSettings, ScreenCapture};
use crate::application::update_config::{apply_config_update, ConfigStore};
use crate::application::{lock, read};
use crate::domain::{
    Admission, AdmissionState, DuplicateFilter, RuntimeConfig, ServerConfig,
    SessionError, SessionPolicy, SessionRegistry, TouchThrottle,
};

/// One item on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(ServerMessage),
    /// A JPEG mirror frame, sent as a binary WebSocket message.
    Frame(Vec<u8>),
}

/// What other connections may do to this one.
struct PeerHandle {
    outbound: mpsc::Sender<Outbound>,
    admission: Arc<Mutex<Admission>>,
}

/// OS-facing collaborators, built by `main` for the current platform.
pub struct Services {
    pub automation: Arc<dyn Automation>,
    pub clipboard: Arc<dyn ClipboardAccess>,
    pub capture: Arc<dyn ScreenCapture>,
    pub fallback: Option<Arc<dyn FallbackPointer>>,
    pub config_store: Arc<dyn ConfigStore>,
}

/// State shared by every connection.
pub struct ServerContext {
    pub config: ServerConfig,
    pub profile: PlatformProfile,
    server_ip: String,
    sessions: Mutex<SessionRegistry>,
    limiter: Mutex<RateLimiter>,
    runtime: Arc<RwLock<RuntimeConfig>>,
    config_store: Arc<dyn ConfigStore>,
    executor: Arc<InputExecutor>,
    mirror: Arc<MirrorPipeline>,
    clipboard: Arc<dyn ClipboardAccess>,
    clipboard_log: Arc<Mutex<ClipboardTracker>>,
    peers: Mutex<HashMap<ConnectionId, PeerHandle>>,
}

impl ServerContext {
    /// Wires the services together and loads the stored runtime configuration.
    ///
    /// A stored configuration that cannot be read is logged and replaced by
    /// the defaults; the file itself is left alone.
    pub fn new(
        config: ServerConfig,
        profile: PlatformProfile,
        server_ip: String,
        pin: String,
        services: Services,
    ) -> Arc<Self> {
        let stored = services.config_store.load().unwrap_or_else(|e| {
            warn!("stored runtime config unusable, starting with defaults: {e}");
            RuntimeConfig::default()
        });
        let runtime = Arc::new(RwLock::new(stored));
        let clipboard_log = Arc::new(Mutex::new(ClipboardTracker::default()));

        let cursor = Arc::new(CursorController::new(
            Arc::clone(&services.automation),
            services.fallback,
        ));
        let executor = Arc::new(InputExecutor::new(
            services.automation,
            Arc::clone(&services.clipboard),
            cursor,
            profile,
            Arc::clone(&clipboard_log),
            Arc::clone(&runtime),
        ));
        let mirror = Arc::new(MirrorPipeline::new(
            services.capture,
            profile,
            MirrorSettings {
                capture_timeout: config.capture_timeout,
                max_width: config.max_frame_width,
                jpeg_quality: config.jpeg_quality,
            },
        ));
        let policy = SessionPolicy {
            idle_ttl: config.token_idle_ttl,
            max_age: config.token_max_age,
            pairing_ttl: config.pairing_ttl,
            ..SessionPolicy::default()
        };

        Arc::new(Self {
            config,
            profile,
            server_ip,
            sessions: Mutex::new(SessionRegistry::new(policy, pin)),
            limiter: Mutex::new(RateLimiter::new()),
            runtime,
            config_store: services.config_store,
            executor,
            mirror,
            clipboard: services.clipboard,
            clipboard_log,
            peers: Mutex::new(HashMap::new()),
        })
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }

    /// Locks the session registry.
    pub fn sessions(&self) -> std::sync::MutexGuard<'_, SessionRegistry> {
        lock(&self.sessions)
    }

    pub fn runtime(&self) -> RuntimeConfig {
        read(&self.runtime).clone()
    }

    pub fn executor(&self) -> &Arc<InputExecutor> {
        &self.executor
    }

    pub fn clipboard(&self) -> &Arc<dyn ClipboardAccess> {
        &self.clipboard
    }

    pub fn clipboard_log(&self) -> &Arc<Mutex<ClipboardTracker>> {
        &self.clipboard_log
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        lock(&self.peers).len()
    }

    /// Connections with rate-limiter state; equals the open count unless
    /// something leaked.
    pub fn rate_limited_connections(&self) -> usize {
        lock(&self.limiter).active_connections()
    }

    /// Purges expired tokens, pairing requests and PIN failures.
    pub fn sweep(&self) {
        self.sessions().sweep(Instant::now());
    }

    /// Queues `msg` for every authorized connection.
    pub fn broadcast_authorized(&self, msg: ServerMessage) {
        self.broadcast(msg, |a| a.state.is_authorized());
    }

    /// Sends desktop clipboard text to every authorized connection, cut to
    /// the same length limit as a `clipboard-copy` reply.
    pub fn publish_clipboard(&self, text: String) {
        let text = truncate_chars(text, MAX_CLIPBOARD_CHARS);
        self.broadcast_authorized(ServerMessage::ClipboardText { text });
    }

    fn broadcast_local(&self, msg: ServerMessage) {
        self.broadcast(msg, Admission::is_local);
    }

    fn broadcast(&self, msg: ServerMessage, filter: impl Fn(&Admission) -> bool) {
        let peers = lock(&self.peers);
        for (id, peer) in peers.iter() {
            if filter(&lock(&peer.admission)) {
                offer(&peer.outbound, *id, Outbound::Text(msg.clone()));
            }
        }
    }

    /// Queues `msg` for one connection, updating its admission first.
    fn notify(
        &self,
        id: ConnectionId,
        msg: ServerMessage,
        update: impl FnOnce(&mut Admission),
    ) -> bool {
        let peers = lock(&self.peers);
        match peers.get(&id) {
            Some(peer) => {
                update(&mut lock(&peer.admission));
                offer(&peer.outbound, id, Outbound::Text(msg));
                true
            }
            None => false,
        }
    }
}

/// Non-blocking send to another connection; a full queue drops the message.
fn offer(outbound: &mpsc::Sender<Outbound>, id: ConnectionId, item: Outbound) {
    if let Err(e) = outbound.try_send(item) {
        debug!(conn = %id, "outbound message dropped: {e}");
    }
}

/// Kinds that never refresh the connection's token.
const UNTOUCHED_KINDS: [&str; 2] = ["get-ip", "generate-token"];

/// The one kind exempt from duplicate suppression.
const REQUEST_FRAME: &str = "request-frame";

/// State and behaviour of one open connection.
pub struct ConnectionHandler {
    ctx: Arc<ServerContext>,
    id: ConnectionId,
    peer: SocketAddr,
    admission: Arc<Mutex<Admission>>,
    outbound: mpsc::Sender<Outbound>,
    duplicates: DuplicateFilter,
    touch: TouchThrottle,
    coalescer: MoveCoalescer,
    capture_slot: CaptureSlot,
    capture_task: Option<JoinHandle<()>>,
    cursor_task: Option<JoinHandle<()>>,
    unauthorized_drops: u64,
    closed: bool,
}

impl ConnectionHandler {
    /// Registers a newly upgraded connection.
    pub fn open(
        ctx: Arc<ServerContext>,
        peer: SocketAddr,
        admission: Admission,
        outbound: mpsc::Sender<Outbound>,
    ) -> Self {
        let id = Uuid::new_v4();
        let admission = Arc::new(Mutex::new(admission));
        lock(&ctx.peers).insert(
            id,
            PeerHandle {
                outbound: outbound.clone(),
                admission: Arc::clone(&admission),
            },
        );
        info!(conn = %id, %peer, state = ?lock(&admission).state, "connection opened");

        Self {
            duplicates: DuplicateFilter::new(ctx.config.duplicate_window),
            touch: TouchThrottle::new(ctx.config.token_touch_interval),
            coalescer: MoveCoalescer::new(Arc::clone(&ctx.executor)),
            ctx,
            id,
            peer,
            admission,
            outbound,
            capture_slot: CaptureSlot::default(),
            capture_task: None,
            unauthorized_drops: 0,
            cursor_task: None,
            closed: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn admission_state(&self) -> AdmissionState {
        lock(&self.admission).state
    }

    /// Sends `connected`, then the PIN-issued token if there is one.
    pub async fn greet(&self, issued_token: Option<String>) {
        self.reply(ServerMessage::Connected {
            server_ip: self.ctx.server_ip.clone(),
        })
        .await;
        if let Some(token) = issued_token {
            self.reply(ServerMessage::TokenGenerated { token }).await;
        }
    }

    /// Handles one inbound text frame.
    pub async fn handle_text(&mut self, raw: &str) {
        if raw.len() > self.ctx.config.max_payload_bytes {
            warn!(conn = %self.id, bytes = raw.len(), "oversized payload dropped");
            return;
        }
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => {
                debug!(conn = %self.id, "unparseable frame dropped");
                return;
            }
        };
        let kind = match value.get("type").and_then(Value::as_str) {
            Some(kind) => kind.to_string(),
            None => {
                debug!(conn = %self.id, "frame without type dropped");
                return;
            }
        };

        let now = Instant::now();
        if kind != REQUEST_FRAME && self.duplicates.is_duplicate(raw, now) {
            debug!(conn = %self.id, kind = %kind, "duplicate frame dropped");
            return;
        }
        if !UNTOUCHED_KINDS.contains(&kind.as_str()) {
            self.touch_token(now).await;
        }

        if AdminRequest::is_admin_kind(&kind) {
            self.handle_admin(&kind, value).await;
        } else {
            self.handle_input(&kind, &value).await;
        }
    }

    /// Releases everything this connection holds.  Safe to call twice.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.coalescer.cancel();
        if let Some(task) = self.cursor_task.take() {
            task.abort();
        }
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        lock(&self.ctx.limiter).cleanup(self.id);
        self.ctx.sessions().drop_pairings_for(self.id);
        lock(&self.ctx.peers).remove(&self.id);
        info!(conn = %self.id, peer = %self.peer, "connection closed");
    }

    // ── Token upkeep ──────────────────────────────────────────────────────────

    async fn touch_token(&mut self, now: Instant) {
        let token = {
            let admission = lock(&self.admission);
            match (&admission.state, &admission.token) {
                (AdmissionState::TokenAuthenticated, Some(token)) => token.clone(),
                _ => return,
            }
        };
        if !self.touch.due(now) {
            return;
        }
        if !self.ctx.sessions().touch(&token, now) {
            lock(&self.admission).revoke();
            warn!(conn = %self.id, "session token expired; connection demoted");
            self.reply(ServerMessage::AuthError {
                error: "Session expired".into(),
            })
            .await;
        }
    }

    // ── Admin requests ────────────────────────────────────────────────────────

    async fn handle_admin(&mut self, kind: &str, value: Value) {
        let request: AdminRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                debug!(conn = %self.id, kind, "malformed admin request: {e}");
                match kind {
                    "approve-pairing" | "reject-pairing" => {
                        self.reply(ServerMessage::PairingError {
                            error: "Invalid requestId".into(),
                        })
                        .await
                    }
                    "update-config" => {
                        self.reply(ServerMessage::ConfigUpdated {
                            success: false,
                            error: Some("Invalid config payload".into()),
                        })
                        .await
                    }
                    _ => {}
                }
                return;
            }
        };
        debug!(conn = %self.id, kind = request.kind_name(), "admin request");

        let local = lock(&self.admission).is_local();
        match request {
            AdminRequest::GetIp => {
                self.reply(ServerMessage::ServerIp {
                    ip: self.ctx.server_ip.clone(),
                })
                .await;
            }
            AdminRequest::GenerateToken => {
                if !local {
                    return self.deny("generate tokens").await;
                }
                let token = self.ctx.sessions().current_or_issue(Instant::now());
                self.reply(ServerMessage::TokenGenerated { token }).await;
            }
            AdminRequest::RequestPairing {
                device_name,
                user_agent,
            } => self.request_pairing(local, device_name, user_agent).await,
            AdminRequest::ApprovePairing { request_id } => {
                if !local {
                    return self.deny("approve pairings").await;
                }
                self.approve_pairing(&request_id).await;
            }
            AdminRequest::RejectPairing { request_id } => {
                if !local {
                    return self.deny("reject pairings").await;
                }
                self.reject_pairing(&request_id).await;
            }
            AdminRequest::GetPendingPairings => {
                if !local {
                    return self.deny("list pairing requests").await;
                }
                let requests = self.ctx.sessions().pending_pairings(Instant::now());
                self.reply(ServerMessage::PendingPairings { requests }).await;
            }
            AdminRequest::UpdateConfig { config } => {
                if !local {
                    return self.deny("update config").await;
                }
                let reply = apply_config_update(
                    self.ctx.config_store.as_ref(),
                    &self.ctx.runtime,
                    &config,
                );
                self.reply(reply).await;
            }
            AdminRequest::RequestFrame => self.request_frame(),
            AdminRequest::StartMirror => self.start_mirror(),
            AdminRequest::StopMirror => self.stop_mirror(),
        }
    }

    async fn deny(&self, action: &'static str) {
        warn!(conn = %self.id, peer = %self.peer, action, "privileged request from remote peer");
        self.reply(ServerMessage::AuthError {
            error: SessionError::LocalOnly(action).to_string(),
        })
        .await;
    }

    async fn request_pairing(
        &self,
        local: bool,
        device_name: Option<String>,
        user_agent: Option<String>,
    ) {
        if local {
            self.reply(ServerMessage::PairingError {
                error: "Localhost cannot request pairing".into(),
            })
            .await;
            return;
        }

        let now = Instant::now();
        let (request, earlier_withdrawn) = {
            let mut sessions = self.ctx.sessions();
            let replacing = sessions.has_pending_pairing(self.id);
            let request = sessions.open_pairing(self.id, device_name, user_agent, now);
            // Consoles learn the new request from `pairing-pending` below.
            let others = replacing.then(|| {
                let new_id = request.id.to_string();
                let mut requests = sessions.pending_pairings(now);
                requests.retain(|r| r.request_id != new_id);
                requests
            });
            (request, others)
        };
        lock(&self.admission).begin_pairing();

        if let Some(requests) = earlier_withdrawn {
            self.ctx
                .broadcast_local(ServerMessage::PendingPairings { requests });
        }
        self.ctx.broadcast_local(ServerMessage::PairingPending {
            request_id: request.id.to_string(),
            device_name: request.device_name,
            user_agent: request.user_agent,
        });
        self.reply(ServerMessage::PairingRequested {
            request_id: request.id.to_string(),
        })
        .await;
    }

    async fn approve_pairing(&self, request_id: &str) {
        let outcome = self.ctx.sessions().approve_pairing(request_id, Instant::now());
        match outcome {
            Ok((requester, token)) => {
                let delivered = self.ctx.notify(
                    requester,
                    ServerMessage::PairingApproved {
                        request_id: request_id.to_string(),
                        token: token.clone(),
                    },
                    |admission| *admission = Admission::with_token(token.clone()),
                );
                info!(conn = %self.id, delivered, "pairing approved");
                let requests = self.ctx.sessions().pending_pairings(Instant::now());
                self.reply(ServerMessage::PendingPairings { requests }).await;
            }
            Err(e) => {
                self.reply(ServerMessage::PairingError {
                    error: e.to_string(),
                })
                .await
            }
        }
    }

    async fn reject_pairing(&self, request_id: &str) {
        let outcome = self.ctx.sessions().reject_pairing(request_id, Instant::now());
        match outcome {
            Ok(requester) => {
                let delivered = self.ctx.notify(
                    requester,
                    ServerMessage::PairingRejected {
                        request_id: request_id.to_string(),
                    },
                    |admission| {
                        if admission.state == AdmissionState::PairingPending {
                            admission.state = AdmissionState::Unauthenticated;
                        }
                    },
                );
                info!(conn = %self.id, delivered, "pairing rejected");
                let requests = self.ctx.sessions().pending_pairings(Instant::now());
                self.reply(ServerMessage::PendingPairings { requests }).await;
            }
            Err(e) => {
                self.reply(ServerMessage::PairingError {
                    error: e.to_string(),
                })
                .await
            }
        }
    }

    // ── Mirror ────────────────────────────────────────────────────────────────

    /// Checks the gate for a privileged message.  Only the first drop on a
    /// connection is a warning; an unpaired device streaming input would
    /// otherwise flood the log.
    fn authorized(&mut self, kind: &str) -> bool {
        let state = lock(&self.admission).state;
        if state.is_authorized() {
            return true;
        }
        self.unauthorized_drops += 1;
        if self.unauthorized_drops == 1 {
            warn!(conn = %self.id, kind, ?state, "message from unauthorized connection dropped");
        } else {
            debug!(conn = %self.id, kind, drops = self.unauthorized_drops, "unauthorized message dropped");
        }
        false
    }

    fn request_frame(&mut self) {
        if !self.authorized(REQUEST_FRAME) {
            return;
        }
        let Some(claim) = self.capture_slot.try_claim() else {
            debug!(conn = %self.id, "frame request ignored; capture in flight");
            return;
        };

        let mirror = Arc::clone(&self.ctx.mirror);
        let outbound = self.outbound.clone();
        let id = self.id;
        self.capture_task = Some(tokio::spawn(async move {
            let item = match mirror.capture_frame(claim).await {
                Ok(frame) => Outbound::Frame(frame.jpeg),
                Err(e) => {
                    warn!(conn = %id, "frame capture failed: {e}");
                    Outbound::Text(e.to_message())
                }
            };
            if outbound.send(item).await.is_err() {
                debug!(conn = %id, "connection gone before frame was sent");
            }
        }));
    }

    fn start_mirror(&mut self) {
        if !self.authorized("start-mirror") {
            return;
        }
        if self.cursor_task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let mirror = Arc::clone(&self.ctx.mirror);
        let executor = Arc::clone(&self.ctx.executor);
        let outbound = self.outbound.clone();
        let period = self.ctx.config.cursor_interval;
        let backlog_limit = self.ctx.config.cursor_backlog_limit;
        let id = self.id;

        self.cursor_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let queued = outbound.max_capacity() - outbound.capacity();
                if queued > backlog_limit {
                    continue;
                }
                let Some(pos) = executor.cursor().current_position() else {
                    continue;
                };
                let Some((fx, fy)) = mirror.cursor_fraction(pos) else {
                    continue;
                };
                match outbound.try_send(Outbound::Text(ServerMessage::CursorPos { fx, fy })) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
            debug!(conn = %id, "cursor stream ended");
        }));
        info!(conn = %self.id, "mirroring started");
    }

    fn stop_mirror(&mut self) {
        if let Some(task) = self.cursor_task.take() {
            task.abort();
            info!(conn = %self.id, "mirroring stopped");
        }
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    async fn handle_input(&mut self, kind: &str, value: &Value) {
        let Some(input_kind) = InputKind::from_wire(kind) else {
            debug!(conn = %self.id, kind, "unknown message kind dropped");
            return;
        };
        if !self.authorized(input_kind.as_str()) {
            return;
        }
        if !lock(&self.ctx.limiter).should_process(self.id, input_kind.as_str()) {
            return;
        }
        let msg = match validate(value) {
            Ok(msg) => sanitize(msg),
            Err(rejection) => {
                debug!(conn = %self.id, kind = input_kind.as_str(), %rejection, "invalid input dropped");
                return;
            }
        };

        match msg {
            InputMessage::Move { dx, dy } => self.coalescer.submit(dx, dy).await,
            other => {
                if let Some(text) = self.ctx.executor.execute(other).await {
                    let text = truncate_chars(text, MAX_CLIPBOARD_CHARS);
                    self.reply(ServerMessage::ClipboardText { text }).await;
                }
            }
        }
    }

    async fn reply(&self, msg: ServerMessage) {
        if self.outbound.send(Outbound::Text(msg)).await.is_err() {
            debug!(conn = %self.id, "reply dropped; writer closed");
        }
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        self.close();
    }
}
