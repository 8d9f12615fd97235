//! Rein server entry point.
//!
//! This binary listens for WebSocket connections from phones and tablets on
//! the LAN and replays their touch-pad, keyboard and clipboard input on this
//! machine.  Devices can also pull JPEG snapshots of the screen.
//!
//! # Usage
//!
//! ```text
//! rein-server [OPTIONS]
//!
//! Options:
//!   --port <PORT>              WebSocket listener port [default: 3000]
//!   --bind <ADDR>              Listener address [default: 0.0.0.0]
//!   --config <PATH>            Runtime config file [default: per-OS config dir]
//!   --token-ttl-hours <HOURS>  Lifetime of device tokens [default: 12]
//!   --no-clipboard-sync        Do not push desktop clipboard changes to devices
//!   --no-ydotool               Never use the ydotool pointer fallback
//!   --dry-run                  Record input instead of injecting it
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable           | Default     | Description                |
//! |--------------------|-------------|----------------------------|
//! | `REIN_PORT`        | `3000`      | WebSocket listener port    |
//! | `REIN_BIND`        | `0.0.0.0`   | Listener address           |
//! | `REIN_CONFIG`      | per-OS      | Runtime config file        |
//! | `REIN_TOKEN_TTL`   | `12`        | Token lifetime in hours    |
//! | `RUST_LOG`         | `info`      | Log filter                 |
//!
//! # First connection
//!
//! The startup log prints a PIN.  A device on the LAN connects with
//! `ws://<server-ip>:3000/ws?pin=<PIN>` and receives a token it uses from
//! then on.  Alternatively a device asks to pair and the operator approves it
//! from a browser on this machine (localhost connections need no PIN).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rein_core::PlatformProfile;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rein_server::application::{
    Automation, ClipboardAccess, FallbackPointer, ServerContext, Services,
};
use rein_server::domain::{generate_pin, ServerConfig};
use rein_server::infrastructure::automation::{mock::RecordingAutomation, platform_automation};
use rein_server::infrastructure::capture::{platform_capture, UnavailableCapture};
use rein_server::infrastructure::clipboard::{ArboardClipboard, MemoryClipboard};
use rein_server::infrastructure::net::server_ip;
use rein_server::infrastructure::storage::{default_config_path, JsonConfigStore};
use rein_server::infrastructure::ws_server::run_server;
use rein_server::infrastructure::ydotool::YdotoolPointer;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Rein remote input & mirroring server.
#[derive(Debug, Parser)]
#[command(
    name = "rein-server",
    about = "Remote pointer, keyboard and screen mirroring for LAN devices",
    version
)]
struct Cli {
    /// TCP port for the WebSocket listener.
    #[arg(long, default_value_t = 3000, env = "REIN_PORT")]
    port: u16,

    /// IP address to bind the listener to.
    ///
    /// `0.0.0.0` accepts LAN devices; `127.0.0.1` restricts the server to
    /// this machine.
    #[arg(long, default_value = "0.0.0.0", env = "REIN_BIND")]
    bind: String,

    /// Path of the JSON runtime configuration file.
    #[arg(long, env = "REIN_CONFIG")]
    config: Option<PathBuf>,

    /// How long an issued device token stays valid, in hours.
    #[arg(long, default_value_t = 12, env = "REIN_TOKEN_TTL")]
    token_ttl_hours: u64,

    /// Do not push desktop clipboard changes to connected devices.
    #[arg(long)]
    no_clipboard_sync: bool,

    /// Never fall back to `ydotool` when the pointer cannot be warped.
    #[arg(long)]
    no_ydotool: bool,

    /// Record input in memory instead of injecting it, and serve no frames.
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not a valid IP address or
    /// `--token-ttl-hours` is zero.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address: '{}:{}'", self.bind, self.port))?;
        if self.token_ttl_hours == 0 {
            anyhow::bail!("--token-ttl-hours must be at least 1");
        }
        let ttl = Duration::from_secs(self.token_ttl_hours * 60 * 60);

        Ok(ServerConfig {
            bind_addr,
            token_idle_ttl: ttl,
            token_max_age: ttl,
            clipboard_sync: !self.no_clipboard_sync,
            runtime_config_path: self.config.unwrap_or_else(default_config_path),
            ..ServerConfig::default()
        })
    }
}

// ── Service wiring ────────────────────────────────────────────────────────────

/// Builds the OS-facing services for this host.
async fn build_services(
    profile: &PlatformProfile,
    config: &ServerConfig,
    dry_run: bool,
    use_ydotool: bool,
) -> anyhow::Result<Services> {
    let config_store = Arc::new(JsonConfigStore::new(config.runtime_config_path.clone()));

    if dry_run {
        warn!("dry run: input is recorded, not injected");
        return Ok(Services {
            automation: Arc::new(RecordingAutomation::new()),
            clipboard: Arc::new(MemoryClipboard::default()),
            capture: Arc::new(UnavailableCapture::new("dry run")),
            fallback: None,
            config_store,
        });
    }

    let automation: Arc<dyn Automation> =
        platform_automation().context("failed to initialise input injection")?;

    let clipboard: Arc<dyn ClipboardAccess> = match ArboardClipboard::new() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            warn!("desktop clipboard unavailable, using an in-memory one: {e}");
            Arc::new(MemoryClipboard::default())
        }
    };

    let fallback: Option<Arc<dyn FallbackPointer>> = if use_ydotool && profile.supports_ydotool()
    {
        let pointer = YdotoolPointer::detect().await;
        Some(Arc::new(pointer))
    } else {
        None
    };

    Ok(Services {
        automation,
        clipboard,
        capture: platform_capture(),
        fallback,
        config_store,
    })
}

// ── Fatal errors ──────────────────────────────────────────────────────────────

/// Makes any panic fatal: it is logged, handed to the previous hook (which
/// prints the message and backtrace), and then `exit(1)` runs.
fn install_fatal_panic_hook(exit: impl Fn(i32) + Send + Sync + 'static) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!("fatal: {info}");
        previous(info);
        exit(1);
    }));
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. `tracing_subscriber` is initialised; `RUST_LOG` sets the filter.
/// 2. A panic hook is installed that logs the panic and exits with status 1.
/// 3. CLI arguments are parsed into a [`ServerConfig`].
/// 4. The platform profile is detected and the OS services are built.
/// 5. A PIN is generated and printed for the first device.
/// 6. A Ctrl+C handler clears the shared `running` flag.
/// 7. [`run_server`] serves until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    install_fatal_panic_hook(|code| {
        std::process::exit(code);
    });

    // ── Configuration ─────────────────────────────────────────────────────────
    let cli = Cli::parse();
    let dry_run = cli.dry_run;
    let use_ydotool = !cli.no_ydotool;
    let config = cli.into_server_config()?;

    let profile = PlatformProfile::detect(|key| std::env::var(key).ok());
    info!(
        os = ?profile.os,
        display = ?profile.display_server,
        config = %config.runtime_config_path.display(),
        "Rein server starting"
    );
    if profile.is_wayland() {
        warn!("Wayland session: screen mirroring is unavailable and pointer warps may need ydotool");
    }

    // ── Services and shared context ───────────────────────────────────────────
    let services = build_services(&profile, &config, dry_run, use_ydotool).await?;
    let pin = generate_pin(&mut rand::thread_rng());
    info!("connection PIN: {pin}");

    let ctx = ServerContext::new(config, profile, server_ip().to_string(), pin, services);

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ──────────────────────────────────────────────────────
    run_server(ctx, running).await?;

    info!("Rein server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        // Arrange: parse with no arguments (all defaults apply)
        let cli = Cli::parse_from(["rein-server"]);

        // Assert
        assert_eq!(cli.port, 3000);
        assert_eq!(cli.bind, "0.0.0.0");
        assert_eq!(cli.token_ttl_hours, 12);
        assert!(!cli.no_clipboard_sync);
        assert!(!cli.no_ydotool);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["rein-server", "--port", "8123"]);
        assert_eq!(cli.port, 8123);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "rein-server",
            "--no-clipboard-sync",
            "--no-ydotool",
            "--dry-run",
        ]);
        assert!(cli.no_clipboard_sync);
        assert!(cli.no_ydotool);
        assert!(cli.dry_run);
    }

    #[test]
    fn test_into_server_config_defaults() {
        // Arrange
        let cli = Cli::parse_from(["rein-server", "--config", "/tmp/rein.json"]);

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.token_idle_ttl, Duration::from_secs(12 * 3600));
        assert_eq!(config.token_max_age, Duration::from_secs(12 * 3600));
        assert!(config.clipboard_sync);
        assert_eq!(config.runtime_config_path, PathBuf::from("/tmp/rein.json"));
        assert_eq!(config.ws_path, "/ws");
    }

    #[test]
    fn test_into_server_config_custom_values() {
        let cli = Cli::parse_from([
            "rein-server",
            "--bind",
            "127.0.0.1",
            "--port",
            "4000",
            "--token-ttl-hours",
            "2",
            "--no-clipboard-sync",
        ]);
        let config = cli.into_server_config().unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:4000");
        assert_eq!(config.token_idle_ttl, Duration::from_secs(2 * 3600));
        assert!(!config.clipboard_sync);
    }

    #[test]
    fn test_into_server_config_invalid_bind_returns_error() {
        // Arrange: provide an invalid IP address string
        let cli = Cli::parse_from(["rein-server", "--bind", "not.an.ip"]);

        // Act
        let result = cli.into_server_config();

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_panic_hook_exits_with_status_one() {
        use std::sync::atomic::AtomicI32;
        static EXIT_CODE: AtomicI32 = AtomicI32::new(-1);

        // Arrange
        install_fatal_panic_hook(|code| EXIT_CODE.store(code, Ordering::SeqCst));

        // Act
        let result = std::panic::catch_unwind(|| panic!("worker died"));
        let _ = std::panic::take_hook();

        // Assert
        assert!(result.is_err());
        assert_eq!(EXIT_CODE.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_into_server_config_zero_ttl_returns_error() {
        let cli = Cli::parse_from(["rein-server", "--token-ttl-hours", "0"]);
        assert!(cli.into_server_config().is_err());
    }
}
