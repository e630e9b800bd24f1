//! Modifier flag definitions and key names
//!
//! Provides the device-independent modifier bits of a macOS `CGEventFlags`
//! value, normalization of raw flags down to those bits, and the US-layout
//! names used for shortcut labels.

/// Modifier flag masks from macOS CGEventFlags
pub mod flags {
    /// Shift key modifier flag
    pub const SHIFT: u64 = 0x0002_0000;
    /// Control key modifier flag
    pub const CONTROL: u64 = 0x0004_0000;
    /// Option/Alt key modifier flag
    pub const OPTION: u64 = 0x0008_0000;
    /// Command key modifier flag
    pub const COMMAND: u64 = 0x0010_0000;

    /// Every bit a shortcut is compared on
    pub const NORMALIZED: u64 = SHIFT | CONTROL | OPTION | COMMAND;
    /// Modifiers that make a shortcut safe to reserve system-wide
    pub const STRONG: u64 = CONTROL | OPTION | COMMAND;
}

/// Strip device-specific bits (left/right side, Caps Lock, Fn, NumPad, ...)
/// from raw event flags.
pub fn normalize(raw_flags: u64) -> u64 {
    raw_flags & flags::NORMALIZED
}

/// Which of the comparable modifier keys are held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Control key is held
    pub control: bool,
    /// Option/Alt key is held
    pub option: bool,
    /// Shift key is held
    pub shift: bool,
    /// Command key is held
    pub command: bool,
}

impl ModifierState {
    /// Create a new ModifierState from raw CGEventFlags bits
    pub fn from_flags(raw_flags: u64) -> Self {
        Self {
            control: raw_flags & flags::CONTROL != 0,
            option: raw_flags & flags::OPTION != 0,
            shift: raw_flags & flags::SHIFT != 0,
            command: raw_flags & flags::COMMAND != 0,
        }
    }

    /// Glyphs in the order macOS menus print them
    pub fn glyphs(&self) -> String {
        let mut out = String::new();
        if self.control {
            out.push('⌃');
        }
        if self.option {
            out.push('⌥');
        }
        if self.shift {
            out.push('⇧');
        }
        if self.command {
            out.push('⌘');
        }
        out
    }
}

/// Name of a macOS virtual key code on a US keyboard layout
pub fn key_name(key_code: u16) -> Option<&'static str> {
    let name = match key_code {
        0 => "A",
        1 => "S",
        2 => "D",
        3 => "F",
        4 => "H",
        5 => "G",
        6 => "Z",
        7 => "X",
        8 => "C",
        9 => "V",
        11 => "B",
        12 => "Q",
        13 => "W",
        14 => "E",
        15 => "R",
        16 => "Y",
        17 => "T",
        18 => "1",
        19 => "2",
        20 => "3",
        21 => "4",
        22 => "6",
        23 => "5",
        24 => "=",
        25 => "9",
        26 => "7",
        27 => "-",
        28 => "8",
        29 => "0",
        30 => "]",
        31 => "O",
        32 => "U",
        33 => "[",
        34 => "I",
        35 => "P",
        36 => "↩",
        37 => "L",
        38 => "J",
        39 => "'",
        40 => "K",
        41 => ";",
        42 => "\\",
        43 => ",",
        44 => "/",
        45 => "N",
        46 => "M",
        47 => ".",
        48 => "⇥",
        49 => "Space",
        50 => "`",
        51 => "⌫",
        53 => "⎋",
        96 => "F5",
        97 => "F6",
        98 => "F7",
        99 => "F3",
        100 => "F8",
        101 => "F9",
        103 => "F11",
        109 => "F10",
        111 => "F12",
        118 => "F4",
        120 => "F2",
        122 => "F1",
        123 => "←",
        124 => "→",
        125 => "↓",
        126 => "↑",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_device_bits() {
        // left command (0x08) + right shift (0x04) + caps lock (0x10000) + fn (0x800000)
        let raw = flags::COMMAND | 0x08 | flags::SHIFT | 0x04 | 0x0001_0000 | 0x0080_0000;
        assert_eq!(normalize(raw), flags::COMMAND | flags::SHIFT);
    }

    #[test]
    fn test_empty_state_has_no_glyphs() {
        assert_eq!(ModifierState::from_flags(0).glyphs(), "");
    }

    #[test]
    fn test_state_from_mask() {
        let mask = flags::CONTROL | flags::COMMAND;
        let state = ModifierState::from_flags(mask);
        assert!(state.control);
        assert!(state.command);
        assert!(!state.option);
        assert!(!state.shift);
    }

    #[test]
    fn test_glyph_order() {
        let state = ModifierState::from_flags(flags::NORMALIZED);
        assert_eq!(state.glyphs(), "⌃⌥⇧⌘");
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_name(11), Some("B"));
        assert_eq!(key_name(49), Some("Space"));
        assert_eq!(key_name(10), None);
    }
}
