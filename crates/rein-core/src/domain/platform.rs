//! Host platform capabilities, resolved once at startup.
//!
//! Several behaviours depend on the desktop the server runs on:
//!
//! | Concern                | Linux/X11 | Linux/Wayland | Windows | macOS   |
//! |------------------------|-----------|---------------|---------|---------|
//! | Shortcut modifier      | Ctrl      | Ctrl          | Ctrl    | Command |
//! | Zoom modifier          | Ctrl      | Ctrl          | Ctrl    | Command |
//! | Screen capture         | yes       | no            | yes     | yes     |
//! | ydotool fallback       | yes       | yes           | no      | no      |
//!
//! Instead of scattering `cfg!(target_os = …)` and environment checks through
//! the executor and mirror pipeline, [`PlatformProfile`] is built once and
//! passed down.  Tests build profiles for any platform with
//! [`PlatformProfile::for_os`].

use crate::keymap::LogicalKey;

/// Operating system family of the desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    Windows,
    MacOs,
    Other,
}

impl HostOs {
    /// The OS this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Other
        }
    }
}

/// Display server the desktop session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    X11,
    Wayland,
    Windows,
    Quartz,
    Unknown,
}

/// Capability profile of the host desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    pub os: HostOs,
    pub display_server: DisplayServer,
    /// Modifier used for copy/paste shortcuts and substituted for a logical
    /// `ctrl` in combos.
    pub command_modifier: LogicalKey,
    /// Modifier held while scrolling to zoom.
    pub zoom_modifier: LogicalKey,
}

impl PlatformProfile {
    /// Builds the profile for `os`; `wayland` only matters on Linux.
    pub fn for_os(os: HostOs, wayland: bool) -> Self {
        let display_server = match os {
            HostOs::Linux if wayland => DisplayServer::Wayland,
            HostOs::Linux => DisplayServer::X11,
            HostOs::Windows => DisplayServer::Windows,
            HostOs::MacOs => DisplayServer::Quartz,
            HostOs::Other => DisplayServer::Unknown,
        };
        let command_modifier = if os == HostOs::MacOs {
            LogicalKey::Meta
        } else {
            LogicalKey::Control
        };
        Self {
            os,
            display_server,
            command_modifier,
            zoom_modifier: command_modifier,
        }
    }

    /// Detects the current host from the compile target and session
    /// variables supplied by `lookup` (normally `std::env::var`).
    ///
    /// A session counts as Wayland when `XDG_SESSION_TYPE` is `wayland` or
    /// `WAYLAND_DISPLAY` is set to a non-empty value.
    pub fn detect(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let session_is_wayland = lookup("XDG_SESSION_TYPE")
            .map(|v| v.eq_ignore_ascii_case("wayland"))
            .unwrap_or(false);
        let wayland_display = lookup("WAYLAND_DISPLAY")
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        Self::for_os(HostOs::current(), session_is_wayland || wayland_display)
    }

    pub fn is_wayland(&self) -> bool {
        self.display_server == DisplayServer::Wayland
    }

    /// Replaces a logical Control with the platform's native shortcut
    /// modifier.  Every other key is returned unchanged.
    pub fn translate_modifier(&self, key: LogicalKey) -> LogicalKey {
        if key == LogicalKey::Control {
            self.command_modifier
        } else {
            key
        }
    }

    /// Whether the ydotool pointer fallback can exist on this host at all.
    pub fn supports_ydotool(&self) -> bool {
        self.os == HostOs::Linux
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_macos_translates_ctrl_to_command() {
        let profile = PlatformProfile::for_os(HostOs::MacOs, false);
        assert_eq!(profile.translate_modifier(LogicalKey::Control), LogicalKey::Meta);
        assert_eq!(profile.translate_modifier(LogicalKey::Shift), LogicalKey::Shift);
    }

    #[test]
    fn test_windows_keeps_ctrl() {
        let profile = PlatformProfile::for_os(HostOs::Windows, false);
        assert_eq!(profile.translate_modifier(LogicalKey::Control), LogicalKey::Control);
        assert_eq!(profile.zoom_modifier, LogicalKey::Control);
    }

    #[test]
    fn test_wayland_flag_only_applies_on_linux() {
        assert!(PlatformProfile::for_os(HostOs::Linux, true).is_wayland());
        assert!(!PlatformProfile::for_os(HostOs::Windows, true).is_wayland());
    }

    #[test]
    fn test_detect_reads_session_type() {
        // Arrange
        let env: HashMap<&str, &str> = [("XDG_SESSION_TYPE", "Wayland")].into();

        // Act
        let profile = PlatformProfile::detect(|k| env.get(k).map(|v| v.to_string()));

        // Assert
        assert_eq!(profile.is_wayland(), HostOs::current() == HostOs::Linux);
    }

    #[test]
    fn test_detect_ignores_empty_wayland_display() {
        let env: HashMap<&str, &str> = [("WAYLAND_DISPLAY", "")].into();
        let profile = PlatformProfile::detect(|k| env.get(k).map(|v| v.to_string()));
        assert!(!profile.is_wayland());
    }

    #[test]
    fn test_ydotool_is_linux_only() {
        assert!(PlatformProfile::for_os(HostOs::Linux, false).supports_ydotool());
        assert!(!PlatformProfile::for_os(HostOs::MacOs, false).supports_ydotool());
    }
}
