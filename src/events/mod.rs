//! Events module for lock state changes
//!
//! Everything published on the event bus: lock transitions, overlay
//! visibility requests, shortcut and permission changes, tap recovery.

use serde::{Deserialize, Serialize};

/// Events published by the main context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LockEvent {
    /// Input is now blocked
    Locked,

    /// Input is restored
    Unlocked {
        /// Duration in milliseconds that input was locked
        duration_ms: u64,
    },

    /// The overlay collaborator should become visible or hidden
    OverlayRequested { visible: bool },

    /// Lock was requested but the tap could not be installed
    InterceptionUnavailable { reason: String },

    /// A disabled or invalidated tap was brought back
    TapRecovered { recreated: bool },

    /// The unlock shortcut changed
    ShortcutChanged {
        key_code: u16,
        modifier_mask: u64,
        label: String,
    },

    /// Accessibility permission became available
    PermissionGranted,
}

impl std::fmt::Display for LockEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockEvent::Locked => write!(f, "LOCKED"),
            LockEvent::Unlocked { duration_ms } => write!(f, "UNLOCKED ({}ms)", duration_ms),
            LockEvent::OverlayRequested { visible: true } => write!(f, "OVERLAY_SHOW"),
            LockEvent::OverlayRequested { visible: false } => write!(f, "OVERLAY_HIDE"),
            LockEvent::InterceptionUnavailable { reason } => {
                write!(f, "INTERCEPTION_UNAVAILABLE ({})", reason)
            }
            LockEvent::TapRecovered { recreated } => {
                write!(f, "TAP_RECOVERED (recreated: {})", recreated)
            }
            LockEvent::ShortcutChanged { label, .. } => write!(f, "SHORTCUT_CHANGED ({})", label),
            LockEvent::PermissionGranted => write!(f, "PERMISSION_GRANTED"),
        }
    }
}
