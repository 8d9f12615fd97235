//! [`LogicalKey`] to macOS `CGKeyCode` table.
//!
//! Codes are ANSI key positions from `HIToolbox/Events.h`.  Play/previous/next
//! and Print Screen are not keyboard events on macOS and have no entry.

use super::LogicalKey;

/// Returns the `CGKeyCode` for `key`, or `None` if there is none.
pub fn keycode(key: LogicalKey) -> Option<u16> {
    use LogicalKey::*;

    let code = match key {
        Enter => 0x24,     // kVK_Return
        Escape => 0x35,    // kVK_Escape
        Tab => 0x30,       // kVK_Tab
        Backspace => 0x33, // kVK_Delete
        Delete => 0x75,    // kVK_ForwardDelete
        Insert => 0x72,    // kVK_Help
        Space => 0x31,
        Up => 0x7E,
        Down => 0x7D,
        Left => 0x7B,
        Right => 0x7C,
        Home => 0x73,
        End => 0x77,
        PageUp => 0x74,
        PageDown => 0x79,
        Function(n) => return function_keycode(n),
        Control => 0x3B,
        Shift => 0x38,
        Alt => 0x3A,     // kVK_Option
        Meta => 0x37,    // kVK_Command
        CapsLock => 0x39,
        VolumeUp => 0x48,
        VolumeDown => 0x49,
        Mute => 0x4A,
        PlayPause | PreviousTrack | NextTrack | PrintScreen => return None,
        Char(c) => return char_keycode(c),
    };
    Some(code)
}

fn function_keycode(n: u8) -> Option<u16> {
    const F_KEYS: [u16; 12] = [
        0x7A, 0x78, 0x63, 0x76, 0x60, 0x61, 0x62, 0x64, 0x65, 0x6D, 0x67, 0x6F,
    ];
    F_KEYS.get(usize::from(n).checked_sub(1)?).copied()
}

fn char_keycode(c: char) -> Option<u16> {
    let code = match c.to_ascii_lowercase() {
        'a' => 0x00,
        's' => 0x01,
        'd' => 0x02,
        'f' => 0x03,
        'h' => 0x04,
        'g' => 0x05,
        'z' => 0x06,
        'x' => 0x07,
        'c' => 0x08,
        'v' => 0x09,
        'b' => 0x0B,
        'q' => 0x0C,
        'w' => 0x0D,
        'e' => 0x0E,
        'r' => 0x0F,
        'y' => 0x10,
        't' => 0x11,
        '1' => 0x12,
        '2' => 0x13,
        '3' => 0x14,
        '4' => 0x15,
        '6' => 0x16,
        '5' => 0x17,
        '9' => 0x19,
        '7' => 0x1A,
        '8' => 0x1C,
        '0' => 0x1D,
        'o' => 0x1F,
        'u' => 0x20,
        'i' => 0x22,
        'p' => 0x23,
        'l' => 0x25,
        'j' => 0x26,
        'k' => 0x28,
        'n' => 0x2D,
        'm' => 0x2E,
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_paste_letters() {
        assert_eq!(keycode(LogicalKey::Char('c')), Some(0x08));
        assert_eq!(keycode(LogicalKey::Char('v')), Some(0x09));
    }

    #[test]
    fn test_function_keys_bounds() {
        assert_eq!(keycode(LogicalKey::Function(1)), Some(0x7A));
        assert_eq!(keycode(LogicalKey::Function(12)), Some(0x6F));
        assert_eq!(keycode(LogicalKey::Function(0)), None);
        assert_eq!(keycode(LogicalKey::Function(13)), None);
    }

    #[test]
    fn test_media_transport_has_no_keycode() {
        assert_eq!(keycode(LogicalKey::PlayPause), None);
    }
}
