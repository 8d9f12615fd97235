//! [`LogicalKey`] to Windows Virtual-Key code table.
//!
//! Values are from `WinUser.h`.  Media keys are real VKs on Windows, so every
//! logical key has an entry.

use super::LogicalKey;

/// Returns the Windows VK code for `key`.
pub fn vk(key: LogicalKey) -> Option<u16> {
    use LogicalKey::*;

    let code = match key {
        Enter => 0x0D,     // VK_RETURN
        Escape => 0x1B,    // VK_ESCAPE
        Tab => 0x09,       // VK_TAB
        Backspace => 0x08, // VK_BACK
        Delete => 0x2E,    // VK_DELETE
        Insert => 0x2D,    // VK_INSERT
        Space => 0x20,     // VK_SPACE
        Up => 0x26,
        Down => 0x28,
        Left => 0x25,
        Right => 0x27,
        Home => 0x24,
        End => 0x23,
        PageUp => 0x21,   // VK_PRIOR
        PageDown => 0x22, // VK_NEXT
        Function(n @ 1..=12) => 0x70 + u16::from(n - 1), // VK_F1..VK_F12
        Function(_) => return None,
        Control => 0x11,     // VK_CONTROL
        Shift => 0x10,       // VK_SHIFT
        Alt => 0x12,         // VK_MENU
        Meta => 0x5B,        // VK_LWIN
        CapsLock => 0x14,    // VK_CAPITAL
        PrintScreen => 0x2C, // VK_SNAPSHOT
        PlayPause => 0xB3,
        PreviousTrack => 0xB1,
        NextTrack => 0xB0,
        VolumeUp => 0xAF,
        VolumeDown => 0xAE,
        Mute => 0xAD,
        // VK codes for letters and digits are their uppercase ASCII values.
        Char(c) if c.is_ascii_alphanumeric() => c.to_ascii_uppercase() as u16,
        Char(_) => return None,
    };
    Some(code)
}

/// Keys that must carry `KEYEVENTF_EXTENDEDKEY` when injected.
pub fn is_extended(key: LogicalKey) -> bool {
    use LogicalKey::*;
    matches!(
        key,
        Up | Down | Left | Right | Home | End | PageUp | PageDown | Insert | Delete | Meta
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_use_uppercase_ascii() {
        assert_eq!(vk(LogicalKey::Char('v')), Some(0x56));
    }

    #[test]
    fn test_function_key_range() {
        assert_eq!(vk(LogicalKey::Function(1)), Some(0x70));
        assert_eq!(vk(LogicalKey::Function(12)), Some(0x7B));
    }

    #[test]
    fn test_navigation_keys_are_extended() {
        assert!(is_extended(LogicalKey::Left));
        assert!(!is_extended(LogicalKey::Enter));
    }
}
