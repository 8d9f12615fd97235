//! Logical key names and per-platform key code tables.
//!
//! Devices send keys by *name*: `"enter"`, `"ctrl"`, `"vol+"`, `"↑"`, or a
//! single character such as `"a"`.  [`parse_key_name`] turns such a name into
//! a [`KeyName`]:
//!
//! - [`KeyName::Named`] – the name is in the table; the OS adapter presses
//!   the corresponding physical key.
//! - [`KeyName::Literal`] – a single printable character with no table entry;
//!   it is typed as text.
//! - [`KeyName::Unknown`] – a multi-character name we do not know.  It must be
//!   dropped with a warning, never guessed at.
//!
//! Name matching is case-insensitive.  The platform tables ([`x11`],
//! [`windows_vk`], [`macos`]) map a [`LogicalKey`] to the native code the
//! injection API expects.

pub mod macos;
pub mod windows_vk;
pub mod x11;

/// A physical key, independent of platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    Enter,
    Escape,
    Tab,
    Backspace,
    Delete,
    Insert,
    Space,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// `F1` through `F12`.
    Function(u8),
    Control,
    Shift,
    Alt,
    /// Windows / Command / Super.
    Meta,
    CapsLock,
    PrintScreen,
    PlayPause,
    PreviousTrack,
    NextTrack,
    VolumeUp,
    VolumeDown,
    Mute,
    /// A lowercase ASCII letter or digit key.
    Char(char),
}

impl LogicalKey {
    /// Returns the key that produces `c` on a US layout without modifiers,
    /// for ASCII letters and digits only.
    pub fn for_char(c: char) -> Option<Self> {
        if c.is_ascii_alphanumeric() {
            Some(Self::Char(c.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// `true` for Control, Shift, Alt and Meta.
    pub fn is_modifier(self) -> bool {
        matches!(self, Self::Control | Self::Shift | Self::Alt | Self::Meta)
    }
}

/// Result of looking up a key name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName {
    Named(LogicalKey),
    Literal(char),
    Unknown,
}

/// Resolves a device-supplied key name.
///
/// # Example
///
/// ```rust
/// use rein_core::keymap::{parse_key_name, KeyName, LogicalKey};
///
/// assert_eq!(parse_key_name("Enter"), KeyName::Named(LogicalKey::Enter));
/// assert_eq!(parse_key_name("é"), KeyName::Literal('é'));
/// assert_eq!(parse_key_name("hyperdrive"), KeyName::Unknown);
/// ```
pub fn parse_key_name(name: &str) -> KeyName {
    let lowered = name.to_lowercase();
    if let Some(key) = named_key(&lowered) {
        return KeyName::Named(key);
    }

    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => KeyName::Literal(c),
        _ => KeyName::Unknown,
    }
}

fn named_key(name: &str) -> Option<LogicalKey> {
    use LogicalKey::*;

    let key = match name {
        "enter" | "return" => Enter,
        "esc" | "escape" => Escape,
        "tab" => Tab,
        "backspace" | "bksp" => Backspace,
        "delete" | "del" => Delete,
        "insert" | "ins" => Insert,
        "space" | " " => Space,
        "up" | "arrowup" | "↑" => Up,
        "down" | "arrowdown" | "↓" => Down,
        "left" | "arrowleft" | "←" => Left,
        "right" | "arrowright" | "→" => Right,
        "home" => Home,
        "end" => End,
        "pageup" | "pgup" | "page_up" => PageUp,
        "pagedown" | "pgdn" | "page_down" => PageDown,
        "ctrl" | "control" => Control,
        "shift" => Shift,
        "alt" | "option" => Alt,
        "meta" | "cmd" | "command" | "super" | "win" | "windows" => Meta,
        "capslock" | "caps" => CapsLock,
        "printscreen" | "prtsc" | "print" => PrintScreen,
        "play" | "playpause" | "pause" => PlayPause,
        "prev" | "previous" => PreviousTrack,
        "next" => NextTrack,
        "vol+" | "volumeup" | "volup" => VolumeUp,
        "vol-" | "volumedown" | "voldown" => VolumeDown,
        "mute" | "volumemute" => Mute,
        _ => return function_key(name),
    };
    Some(key)
}

fn function_key(name: &str) -> Option<LogicalKey> {
    let n: u8 = name.strip_prefix('f')?.parse().ok()?;
    (1..=12).contains(&n).then_some(LogicalKey::Function(n))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
