//! The `update-config` use case.
//!
//! Validates an operator's change, persists it through a [`ConfigStore`] and
//! swaps the live [`RuntimeConfig`] so the next message already sees it.

use std::sync::RwLock;

use rein_core::ServerMessage;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::application::write;
use crate::domain::{validate_update, ConfigError, RuntimeConfig};

/// Persistent storage for the runtime configuration.
pub trait ConfigStore: Send + Sync {
    /// Reads the stored configuration, or the defaults if nothing is stored.
    fn load(&self) -> Result<RuntimeConfig, ConfigError>;

    /// Merges `accepted` into the stored configuration and returns the result
    /// as re-read from storage.
    fn merge(&self, accepted: &Map<String, Value>) -> Result<RuntimeConfig, ConfigError>;
}

/// Runs one `update-config` request and returns the `config-updated` reply.
pub fn apply_config_update(
    store: &dyn ConfigStore,
    live: &RwLock<RuntimeConfig>,
    update: &Map<String, Value>,
) -> ServerMessage {
    let accepted = match validate_update(update) {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!("config update refused: {e}");
            return ServerMessage::ConfigUpdated {
                success: false,
                error: Some(e.to_string()),
            };
        }
    };

    match store.merge(&accepted) {
        Ok(config) => {
            info!(keys = ?accepted.keys().collect::<Vec<_>>(), "server configuration updated");
            *write(live) = config;
            ServerMessage::ConfigUpdated {
                success: true,
                error: None,
            }
        }
        Err(e) => {
            error!("failed to persist config update: {e}");
            ServerMessage::ConfigUpdated {
                success: false,
                error: Some(e.to_string()),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::JsonConfigStore;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_update_is_persisted_and_applied() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join("server-config.json"));
        let live = RwLock::new(store.load().unwrap());

        // Act
        let reply = apply_config_update(&store, &live, &map(json!({"inputThrottleMs": 25})));

        // Assert
        assert_eq!(reply, ServerMessage::ConfigUpdated { success: true, error: None });
        assert_eq!(live.read().unwrap().input_throttle_ms, 25);
        assert_eq!(store.load().unwrap().input_throttle_ms, 25);
    }

    #[test]
    fn test_invalid_update_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join("server-config.json"));
        let live = RwLock::new(RuntimeConfig::default());

        let reply = apply_config_update(&store, &live, &map(json!({"frontendPort": 0})));

        assert_eq!(
            reply,
            ServerMessage::ConfigUpdated {
                success: false,
                error: Some("Invalid port number (must be 1–65535)".into())
            }
        );
        assert_eq!(*live.read().unwrap(), RuntimeConfig::default());
        assert!(!dir.path().join("server-config.json").exists());
    }

    #[test]
    fn test_update_over_broken_stored_value_is_refused_without_writing() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server-config.json");
        std::fs::write(&path, r#"{"mouseSensitivity":"fast"}"#).unwrap();
        let store = JsonConfigStore::new(path.clone());
        let live = RwLock::new(RuntimeConfig::default());

        // Act
        let reply = apply_config_update(&store, &live, &map(json!({"inputThrottleMs": 20})));

        // Assert
        assert!(matches!(reply, ServerMessage::ConfigUpdated { success: false, .. }));
        assert_eq!(*live.read().unwrap(), RuntimeConfig::default());
        assert!(!std::fs::read_to_string(&path).unwrap().contains("inputThrottleMs"));
    }
}
