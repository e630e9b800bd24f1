//! Input event kinds seen by the tap
//!
//! Raw `CGEventType` values are folded into a closed enum before any decision
//! is made. Values the tap never asked for land in `Other` instead of being
//! transmuted into an enum they may not belong to.

/// Every event kind the interception callback distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    LeftMouseDown,
    LeftMouseUp,
    RightMouseDown,
    RightMouseUp,
    MouseMoved,
    LeftMouseDragged,
    RightMouseDragged,
    KeyDown,
    KeyUp,
    FlagsChanged,
    ScrollWheel,
    OtherMouseDown,
    OtherMouseUp,
    OtherMouseDragged,
    /// Trackpad gesture (NSEventTypeGesture)
    Gesture,
    /// The OS disabled the tap because a callback ran too long
    TapDisabledByTimeout,
    /// The OS disabled the tap because of a user input storm
    TapDisabledByUserInput,
    Other(u32),
}

impl EventKind {
    /// Kinds requested when the tap is installed
    pub const INTERCEPTED: [EventKind; 15] = [
        EventKind::LeftMouseDown,
        EventKind::LeftMouseUp,
        EventKind::RightMouseDown,
        EventKind::RightMouseUp,
        EventKind::MouseMoved,
        EventKind::LeftMouseDragged,
        EventKind::RightMouseDragged,
        EventKind::KeyDown,
        EventKind::KeyUp,
        EventKind::FlagsChanged,
        EventKind::ScrollWheel,
        EventKind::OtherMouseDown,
        EventKind::OtherMouseUp,
        EventKind::OtherMouseDragged,
        EventKind::Gesture,
    ];

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::LeftMouseDown,
            2 => Self::LeftMouseUp,
            3 => Self::RightMouseDown,
            4 => Self::RightMouseUp,
            5 => Self::MouseMoved,
            6 => Self::LeftMouseDragged,
            7 => Self::RightMouseDragged,
            10 => Self::KeyDown,
            11 => Self::KeyUp,
            12 => Self::FlagsChanged,
            22 => Self::ScrollWheel,
            25 => Self::OtherMouseDown,
            26 => Self::OtherMouseUp,
            27 => Self::OtherMouseDragged,
            29 => Self::Gesture,
            0xFFFF_FFFE => Self::TapDisabledByTimeout,
            0xFFFF_FFFF => Self::TapDisabledByUserInput,
            other => Self::Other(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::LeftMouseDown => 1,
            Self::LeftMouseUp => 2,
            Self::RightMouseDown => 3,
            Self::RightMouseUp => 4,
            Self::MouseMoved => 5,
            Self::LeftMouseDragged => 6,
            Self::RightMouseDragged => 7,
            Self::KeyDown => 10,
            Self::KeyUp => 11,
            Self::FlagsChanged => 12,
            Self::ScrollWheel => 22,
            Self::OtherMouseDown => 25,
            Self::OtherMouseUp => 26,
            Self::OtherMouseDragged => 27,
            Self::Gesture => 29,
            Self::TapDisabledByTimeout => 0xFFFF_FFFE,
            Self::TapDisabledByUserInput => 0xFFFF_FFFF,
            Self::Other(raw) => raw,
        }
    }

    pub fn is_tap_disabled(self) -> bool {
        matches!(
            self,
            Self::TapDisabledByTimeout | Self::TapDisabledByUserInput
        )
    }
}

/// `CGEventMask` covering every intercepted kind
pub fn event_mask() -> u64 {
    EventKind::INTERCEPTED
        .iter()
        .fold(0, |mask, kind| mask | (1u64 << kind.raw()))
}

/// The parts of an event the callback decides on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: EventKind,
    /// Virtual key code, only meaningful for key events
    pub key_code: u16,
    /// Raw `CGEventFlags` bits, only read for key-down
    pub flags: u64,
}

impl InputEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            key_code: 0,
            flags: 0,
        }
    }

    pub fn key_down(key_code: u16, flags: u64) -> Self {
        Self {
            kind: EventKind::KeyDown,
            key_code,
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip_for_intercepted_kinds() {
        for kind in EventKind::INTERCEPTED {
            assert_eq!(EventKind::from_raw(kind.raw()), kind);
        }
    }

    #[test]
    fn test_unknown_raw_is_other() {
        assert_eq!(EventKind::from_raw(14), EventKind::Other(14));
        assert_eq!(EventKind::from_raw(0), EventKind::Other(0));
    }

    #[test]
    fn test_tap_disabled_kinds() {
        assert!(EventKind::from_raw(0xFFFF_FFFE).is_tap_disabled());
        assert!(EventKind::from_raw(0xFFFF_FFFF).is_tap_disabled());
        assert!(!EventKind::KeyDown.is_tap_disabled());
    }

    #[test]
    fn test_event_mask_bits() {
        let mask = event_mask();
        for bit in [1, 2, 3, 4, 5, 6, 7, 10, 11, 12, 22, 25, 26, 27, 29] {
            assert_ne!(mask & (1 << bit), 0, "bit {bit} missing");
        }
        assert_eq!(mask.count_ones(), 15);
        assert_eq!(mask & (1 << 14), 0);
    }
}
