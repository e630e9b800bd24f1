//! Unlock shortcut value type and matching
//!
//! A shortcut is a virtual key code plus a normalized modifier mask. Matching
//! is exact: the key code must be equal and the normalized modifiers of the
//! event must be exactly the shortcut's, so holding an extra modifier never
//! matches.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::keys::{self, flags, ModifierState};

/// Key code of the `B` key
pub const DEFAULT_KEY_CODE: u16 = 11;
/// Command + Shift
pub const DEFAULT_MODIFIERS: u64 = flags::COMMAND | flags::SHIFT;

/// Errors raised when building or persisting a shortcut
#[derive(Debug, thiserror::Error)]
pub enum ShortcutError {
    #[error("shortcut needs at least one of Command, Control or Option")]
    MissingModifier,

    #[error("key code {0} is out of range")]
    KeyCodeOutOfRange(i64),

    #[error("failed to access shortcut file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode shortcut record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An unlock key combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shortcut {
    key_code: u16,
    modifiers: u64,
}

impl Shortcut {
    /// Build a shortcut, normalizing `modifiers` and rejecting combinations
    /// without a strong modifier.
    pub fn new(key_code: u16, modifiers: u64) -> Result<Self, ShortcutError> {
        let shortcut = Self {
            key_code,
            modifiers: keys::normalize(modifiers),
        };
        if !shortcut.has_valid_modifiers() {
            return Err(ShortcutError::MissingModifier);
        }
        Ok(shortcut)
    }

    pub fn key_code(&self) -> u16 {
        self.key_code
    }

    /// Normalized modifier mask
    pub fn modifiers(&self) -> u64 {
        self.modifiers
    }

    /// At least one of Command, Control or Option is part of the combination
    pub fn has_valid_modifiers(&self) -> bool {
        self.modifiers & flags::STRONG != 0
    }

    /// Exact match against a raw key event
    pub fn matches(&self, key_code: u16, raw_flags: u64) -> bool {
        self.key_code == key_code && self.modifiers == keys::normalize(raw_flags)
    }

    /// Menu label, e.g. `⇧⌘B`
    pub fn label(&self) -> String {
        let glyphs = ModifierState::from_flags(self.modifiers).glyphs();
        match keys::key_name(self.key_code) {
            Some(name) => format!("{glyphs}{name}"),
            None => format!("{glyphs}Key{}", self.key_code),
        }
    }

    fn pack(self) -> u64 {
        (u64::from(self.key_code) << 48) | self.modifiers
    }

    fn unpack(bits: u64) -> Self {
        Self {
            key_code: (bits >> 48) as u16,
            modifiers: bits & flags::NORMALIZED,
        }
    }
}

impl Default for Shortcut {
    fn default() -> Self {
        Self {
            key_code: DEFAULT_KEY_CODE,
            modifiers: DEFAULT_MODIFIERS,
        }
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Persisted form of a shortcut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutRecord {
    pub key_code: i64,
    pub modifier_mask: u64,
}

impl From<Shortcut> for ShortcutRecord {
    fn from(shortcut: Shortcut) -> Self {
        Self {
            key_code: i64::from(shortcut.key_code),
            modifier_mask: shortcut.modifiers,
        }
    }
}

impl TryFrom<ShortcutRecord> for Shortcut {
    type Error = ShortcutError;

    fn try_from(record: ShortcutRecord) -> Result<Self, Self::Error> {
        let key_code = u16::try_from(record.key_code)
            .map_err(|_| ShortcutError::KeyCodeOutOfRange(record.key_code))?;
        Shortcut::new(key_code, record.modifier_mask)
    }
}

/// The active shortcut, shared between the main context (writer) and the
/// tap callback (reader) without locking.
#[derive(Debug)]
pub struct ShortcutCell(AtomicU64);

impl ShortcutCell {
    pub fn new(shortcut: Shortcut) -> Self {
        Self(AtomicU64::new(shortcut.pack()))
    }

    pub fn get(&self) -> Shortcut {
        Shortcut::unpack(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, shortcut: Shortcut) {
        self.0.store(shortcut.pack(), Ordering::Release);
    }
}

impl Default for ShortcutCell {
    fn default() -> Self {
        Self::new(Shortcut::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [u64; 4] = [flags::SHIFT, flags::CONTROL, flags::OPTION, flags::COMMAND];

    fn subset(bits: usize) -> u64 {
        ALL.iter()
            .enumerate()
            .filter(|(i, _)| bits & (1 << i) != 0)
            .fold(0, |mask, (_, flag)| mask | flag)
    }

    #[test]
    fn test_default_shortcut() {
        let shortcut = Shortcut::default();
        assert_eq!(shortcut.key_code(), 11);
        assert_eq!(shortcut.modifiers(), flags::COMMAND | flags::SHIFT);
        assert!(shortcut.has_valid_modifiers());
        assert_eq!(shortcut.label(), "⇧⌘B");
    }

    #[test]
    fn test_rejects_missing_modifier() {
        assert!(matches!(
            Shortcut::new(11, 0),
            Err(ShortcutError::MissingModifier)
        ));
        assert!(matches!(
            Shortcut::new(11, flags::SHIFT),
            Err(ShortcutError::MissingModifier)
        ));
        assert!(Shortcut::new(11, flags::OPTION).is_ok());
    }

    #[test]
    fn test_extra_modifier_does_not_match() {
        let shortcut = Shortcut::default();
        let with_option = flags::COMMAND | flags::SHIFT | flags::OPTION;
        assert!(!shortcut.matches(11, with_option));
        assert!(shortcut.matches(11, flags::COMMAND | flags::SHIFT));
    }

    #[test]
    fn test_device_noise_still_matches() {
        let shortcut = Shortcut::default();
        // left command + left shift device bits and caps lock
        let raw = flags::COMMAND | flags::SHIFT | 0x08 | 0x02 | 0x0001_0000;
        assert!(shortcut.matches(11, raw));
    }

    #[test]
    fn test_wrong_key_does_not_match() {
        let shortcut = Shortcut::default();
        assert!(!shortcut.matches(12, flags::COMMAND | flags::SHIFT));
    }

    #[test]
    fn test_matches_only_exact_modifier_set() {
        for configured in 0..16 {
            let Ok(shortcut) = Shortcut::new(40, subset(configured)) else {
                continue;
            };
            for pressed in 0..16 {
                assert_eq!(
                    shortcut.matches(40, subset(pressed)),
                    pressed == configured,
                    "configured {configured:#06b} pressed {pressed:#06b}"
                );
            }
        }
    }

    #[test]
    fn test_record_conversion() {
        let record = ShortcutRecord {
            key_code: 40,
            modifier_mask: flags::CONTROL | flags::OPTION | 0x20,
        };
        let shortcut = Shortcut::try_from(record).unwrap();
        assert_eq!(shortcut.modifiers(), flags::CONTROL | flags::OPTION);

        let bad = ShortcutRecord {
            key_code: 70_000,
            modifier_mask: flags::COMMAND,
        };
        assert!(matches!(
            Shortcut::try_from(bad),
            Err(ShortcutError::KeyCodeOutOfRange(70_000))
        ));
    }

    #[test]
    fn test_cell_swaps_shortcut() {
        let cell = ShortcutCell::default();
        assert_eq!(cell.get(), Shortcut::default());

        let next = Shortcut::new(126, flags::CONTROL | flags::COMMAND).unwrap();
        cell.set(next);
        assert_eq!(cell.get(), next);
        assert_eq!(cell.get().label(), "⌃⌘↑");
    }
}
