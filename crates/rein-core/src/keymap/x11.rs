//! [`LogicalKey`] to X11 KeySym table.
//!
//! KeySym values come from `X11/keysymdef.h` and `X11/XF86keysym.h`.  The X11
//! adapter converts a KeySym to a hardware keycode with `XKeysymToKeycode`.

use super::LogicalKey;

/// Returns the X11 KeySym for `key`, or `None` if X11 has no equivalent.
pub fn keysym(key: LogicalKey) -> Option<u32> {
    use LogicalKey::*;

    let sym = match key {
        Enter => 0xFF0D,     // XK_Return
        Escape => 0xFF1B,    // XK_Escape
        Tab => 0xFF09,       // XK_Tab
        Backspace => 0xFF08, // XK_BackSpace
        Delete => 0xFFFF,    // XK_Delete
        Insert => 0xFF63,    // XK_Insert
        Space => 0x0020,     // XK_space
        Up => 0xFF52,
        Down => 0xFF54,
        Left => 0xFF51,
        Right => 0xFF53,
        Home => 0xFF50,
        End => 0xFF57,
        PageUp => 0xFF55,
        PageDown => 0xFF56,
        Function(n @ 1..=12) => 0xFFBE + u32::from(n - 1), // XK_F1..XK_F12
        Function(_) => return None,
        Control => 0xFFE3,     // XK_Control_L
        Shift => 0xFFE1,       // XK_Shift_L
        Alt => 0xFFE9,         // XK_Alt_L
        Meta => 0xFFEB,        // XK_Super_L
        CapsLock => 0xFFE5,    // XK_Caps_Lock
        PrintScreen => 0xFF61, // XK_Print
        PlayPause => 0x1008_FF14,
        PreviousTrack => 0x1008_FF16,
        NextTrack => 0x1008_FF17,
        VolumeUp => 0x1008_FF13,
        VolumeDown => 0x1008_FF11,
        Mute => 0x1008_FF12,
        // Latin-1 keysyms equal the ASCII code point.
        Char(c) if c.is_ascii_alphanumeric() => c.to_ascii_lowercase() as u32,
        Char(_) => return None,
    };
    Some(sym)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_keys_are_contiguous() {
        assert_eq!(keysym(LogicalKey::Function(1)), Some(0xFFBE));
        assert_eq!(keysym(LogicalKey::Function(12)), Some(0xFFC9));
        assert_eq!(keysym(LogicalKey::Function(13)), None);
    }

    #[test]
    fn test_letters_use_latin1_keysyms() {
        assert_eq!(keysym(LogicalKey::Char('c')), Some(0x63));
        assert_eq!(keysym(LogicalKey::Char('0')), Some(0x30));
    }

    #[test]
    fn test_modifiers_map_to_left_variants() {
        assert_eq!(keysym(LogicalKey::Control), Some(0xFFE3));
        assert_eq!(keysym(LogicalKey::Meta), Some(0xFFEB));
    }
}
