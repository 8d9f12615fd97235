//! Socket-level tests for the WebSocket server.
//!
//! Each test binds the accept loop to `127.0.0.1:0` and talks to it with a
//! real `tokio-tungstenite` client.  Because the client is on localhost it is
//! admitted without credentials, which is exactly the operator-console path.
//! Refusals that depend on a LAN peer (bad PIN, bad token) are covered by
//! the admission unit tests, since a test client cannot fake its address.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use rein_core::{HostOs, PlatformProfile};
use rein_server::application::{ServerContext, Services};
use rein_server::domain::ServerConfig;
use rein_server::infrastructure::automation::mock::RecordingAutomation;
use rein_server::infrastructure::capture::UnavailableCapture;
use rein_server::infrastructure::clipboard::MemoryClipboard;
use rein_server::infrastructure::storage::JsonConfigStore;
use rein_server::infrastructure::ws_server::serve;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

struct Running {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    server: JoinHandle<anyhow::Result<()>>,
    _dir: TempDir,
}

async fn start() -> Running {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        runtime_config_path: dir.path().join("server-config.json"),
        clipboard_sync: false,
        ..ServerConfig::default()
    };
    let services = Services {
        automation: Arc::new(RecordingAutomation::new()),
        clipboard: Arc::new(MemoryClipboard::default()),
        capture: Arc::new(UnavailableCapture::new("no display in tests")),
        fallback: None,
        config_store: Arc::new(JsonConfigStore::new(config.runtime_config_path.clone())),
    };
    let ctx = ServerContext::new(
        config,
        PlatformProfile::for_os(HostOs::Linux, false),
        "10.0.0.2".to_string(),
        "4321".to_string(),
        services,
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let server = tokio::spawn(serve(listener, ctx, Arc::clone(&running)));

    Running {
        addr,
        running,
        server,
        _dir: dir,
    }
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        match timeout(Duration::from_secs(2), ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return serde_json::from_str(&text).unwrap(),
            Ok(Some(Ok(_))) => continue,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_local_client_is_greeted_and_can_mint_token() {
    // Arrange
    let server = start().await;

    // Act
    let (mut ws, _) = connect_async(format!("ws://{}/ws", server.addr))
        .await
        .expect("handshake");
    let greeting = next_json(&mut ws).await;
    ws.send(Message::Text(r#"{"type":"generate-token"}"#.into()))
        .await
        .unwrap();
    let reply = next_json(&mut ws).await;

    // Assert
    assert_eq!(greeting["type"], "connected");
    assert_eq!(greeting["serverIp"], "10.0.0.2");
    assert_eq!(reply["type"], "token-generated");
    assert_eq!(reply["token"].as_str().map(str::len), Some(36));
}

#[tokio::test]
async fn test_unknown_path_is_refused_with_404() {
    let server = start().await;

    let err = connect_async(format!("ws://{}/elsewhere", server.addr))
        .await
        .expect_err("expected refusal");

    match err {
        WsError::Http(response) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_closing_socket_releases_connection() {
    let server = start().await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", server.addr))
        .await
        .expect("handshake");
    let _ = next_json(&mut ws).await;

    ws.close(None).await.unwrap();

    // The server answers the close; the stream then ends.
    let ended = timeout(Duration::from_secs(2), async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
    assert!(ended.is_ok());
}

#[tokio::test]
async fn test_clearing_running_flag_stops_accept_loop() {
    let server = start().await;

    server.running.store(false, Ordering::Relaxed);

    let result = timeout(Duration::from_secs(2), server.server).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
}
