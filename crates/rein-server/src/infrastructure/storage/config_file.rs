//! JSON file implementation of [`ConfigStore`].
//!
//! Default location:
//! - Windows:  `%APPDATA%\Rein\server-config.json`
//! - Linux:    `$XDG_CONFIG_HOME/rein/server-config.json` (or `~/.config/rein/…`)
//! - macOS:    `~/Library/Application Support/Rein/server-config.json`
//!
//! # Atomic writes
//!
//! An update is written to a sibling temporary file and renamed over the
//! original, so a crash mid-write leaves either the old or the new file,
//! never half of one.  The file is then re-read, and what was read back is
//! what the server applies.
//!
//! A merge whose result would not load (say an existing key of the wrong
//! type) is refused before anything is written.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::application::update_config::ConfigStore;
use crate::domain::{ConfigError, RuntimeConfig};

const FILE_NAME: &str = "server-config.json";

/// Runtime configuration stored as a JSON object in one file.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// The stored JSON object, or an empty one if the file does not exist.
    fn read_object(&self) -> Result<Map<String, Value>, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Map::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write_object(&self, object: &Map<String, Value>) -> Result<(), ConfigError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
            path: dir.clone(),
            source,
        })?;

        let content = serde_json::to_string_pretty(object)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        debug!(path = %self.path.display(), "runtime config written");
        Ok(())
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<RuntimeConfig, ConfigError> {
        let object = self.read_object()?;
        Ok(serde_json::from_value(Value::Object(object))?)
    }

    fn merge(&self, accepted: &Map<String, Value>) -> Result<RuntimeConfig, ConfigError> {
        let mut object = self.read_object()?;
        for (key, value) in accepted {
            object.insert(key.clone(), value.clone());
        }
        serde_json::from_value::<RuntimeConfig>(Value::Object(object.clone()))?;
        self.write_object(&object)?;
        self.load()
    }
}

/// Resolves `<platform config dir>/<app>/server-config.json`, or the bare file
/// name in the working directory when no base directory is known.
pub fn default_config_path() -> PathBuf {
    platform_config_dir()
        .map(|dir| dir.join(FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(FILE_NAME))
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Rein"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("rein"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Rein")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> JsonConfigStore {
        JsonConfigStore::new(dir.path().join("nested").join(FILE_NAME))
    }

    #[test]
    fn test_load_returns_default_when_file_absent() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        // Act
        let cfg = store.load().unwrap();

        // Assert
        assert_eq!(cfg, RuntimeConfig::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_merge_keeps_unrelated_keys() {
        // Arrange: a file written by an older or newer version.
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{"theme":"dark","frontendPort":4000}"#).unwrap();

        // Act
        let accepted = json!({"invertScroll": true}).as_object().cloned().unwrap();
        let cfg = store.merge(&accepted).unwrap();

        // Assert
        assert!(cfg.invert_scroll);
        assert_eq!(cfg.frontend_port, 4000);
        let on_disk: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["theme"], "dark");
        assert_eq!(on_disk["invertScroll"], true);
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join(FILE_NAME));
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(store.load(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_merge_leaves_file_untouched_when_result_would_not_load() {
        // Arrange: a stored key of the wrong type
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join(FILE_NAME));
        let original = r#"{"mouseSensitivity":"fast"}"#;
        std::fs::write(store.path(), original).unwrap();

        // Act
        let accepted = json!({"inputThrottleMs": 20}).as_object().cloned().unwrap();
        let result = store.merge(&accepted);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), original);
    }

    #[test]
    fn test_default_path_ends_with_file_name() {
        assert!(default_config_path().ends_with(FILE_NAME));
    }
}
