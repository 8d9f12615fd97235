//! WebSocket server: accept loop and per-connection task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Running the admission check inside the WebSocket handshake, so a
//!    refused peer gets a plain HTTP 401/404/429 and never a socket.
//! 3. Running each admitted connection in its own task:
//!    - a **writer** task drains the connection's outbound queue into the
//!      socket (JSON text for messages, binary for mirror frames);
//!    - the **reader** loop feeds every text frame to the
//!      [`ConnectionHandler`].
//! 4. Running the server-wide background jobs: the periodic session sweep and
//!    the desktop clipboard monitor.
//! 5. Stopping when the `running` flag is cleared.
//!
//! # Backpressure
//!
//! The outbound queue is bounded.  Replies to the connection's own requests
//! wait for room; broadcasts and the cursor stream use `try_send` and are
//! dropped when the queue is full, so one slow device never stalls another.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::application::admission::{decide_upgrade, UpgradeDecision};
use crate::application::clipboard_sync::spawn_clipboard_monitor;
use crate::application::dispatch::{ConnectionHandler, Outbound, ServerContext};

/// How often expired tokens, pairing requests and PIN failures are purged.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long a closing connection may spend flushing queued messages.
const FLUSH_GRACE: Duration = Duration::from_secs(1);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `ctx.config.bind_addr` and serves until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(ctx: Arc<ServerContext>, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let addr = ctx.config.bind_addr;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {addr}"))?;

    info!(
        "listening on ws://{}:{}{}",
        ctx.server_ip(),
        addr.port(),
        ctx.config.ws_path
    );

    let background = spawn_background(&ctx, &running);
    let result = serve(listener, ctx, running).await;
    for task in background {
        task.abort();
    }
    result
}

/// Runs the accept loop on an already-bound listener.
///
/// Split from [`run_server`] so tests can bind port 0.
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout lets the loop notice the shutdown flag while idle.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new TCP connection from {peer_addr}");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, ctx).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

/// Starts the session sweeper and, if enabled, the clipboard monitor.
fn spawn_background(ctx: &Arc<ServerContext>, running: &Arc<AtomicBool>) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    let sweeper_ctx = Arc::clone(ctx);
    tasks.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweeper_ctx.sweep();
            debug!(
                connections = sweeper_ctx.connection_count(),
                rate_limited = sweeper_ctx.rate_limited_connections(),
                "session sweep"
            );
        }
    }));

    if ctx.config.clipboard_sync {
        let publish_ctx = Arc::clone(ctx);
        tasks.push(spawn_clipboard_monitor(
            Arc::clone(ctx.clipboard()),
            Arc::clone(ctx.clipboard_log()),
            ctx.config.clipboard_poll_interval,
            Arc::clone(running),
            move |text| publish_ctx.publish_clipboard(text),
        ));
    }

    tasks
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Wraps [`run_connection`] and logs the outcome.
async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<ServerContext>) {
    match run_connection(stream, peer_addr, ctx).await {
        Ok(()) => debug!("connection {peer_addr} finished"),
        Err(e) => debug!("connection {peer_addr} ended: {e:#}"),
    }
}

/// Builds the HTTP error response for a refused upgrade.
fn refusal(status: u16, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::FORBIDDEN);
    response
}

/// Runs the complete lifecycle of one connection.
///
/// # Errors
///
/// Returns an error if the handshake fails or is refused.
async fn run_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ServerContext>,
) -> anyhow::Result<()> {
    // ── Step 1: Handshake with admission ──────────────────────────────────────
    let mut accepted = None;
    let callback = |request: &Request, response: Response| {
        let uri = request.uri();
        let decision = decide_upgrade(
            &mut ctx.sessions(),
            &ctx.config.ws_path,
            uri.path(),
            uri.query(),
            peer_addr.ip(),
            Instant::now(),
        );
        match decision {
            UpgradeDecision::Accept {
                admission,
                issued_token,
            } => {
                accepted = Some((admission, issued_token));
                Ok(response)
            }
            UpgradeDecision::Reject { status, reason } => {
                warn!(peer = %peer_addr, status, "upgrade refused");
                Err(refusal(status, reason))
            }
        }
    };
    let ws_stream = accept_hdr_async(stream, callback)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;
    let (admission, issued_token) =
        accepted.context("handshake completed without an admission decision")?;

    // ── Step 2: Writer task ───────────────────────────────────────────────────
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(ctx.config.outbound_capacity);

    let mut writer = tokio::spawn(async move {
        while let Some(item) = out_rx.recv().await {
            let frame = match item {
                Outbound::Text(msg) => match serde_json::to_string(&msg) {
                    Ok(json) => WsMessage::Text(json),
                    Err(e) => {
                        error!("failed to serialize {}: {e}", msg.kind_name());
                        continue;
                    }
                },
                Outbound::Frame(jpeg) => WsMessage::Binary(jpeg),
            };
            if ws_tx.send(frame).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    // ── Step 3: Reader loop ───────────────────────────────────────────────────
    let mut handler = ConnectionHandler::open(Arc::clone(&ctx), peer_addr, admission, out_tx);
    handler.greet(issued_token).await;

    let mut writer_done = false;
    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => handler.handle_text(&text).await,
                    Some(Ok(WsMessage::Binary(data))) => {
                        debug!(conn = %handler.id(), bytes = data.len(), "binary frame ignored");
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => break,
                    Some(Err(e)) => {
                        debug!(conn = %handler.id(), "WebSocket error: {e}");
                        break;
                    }
                }
            }
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    // ── Step 4: Teardown ──────────────────────────────────────────────────────
    drop(handler);
    if !writer_done && timeout(FLUSH_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
