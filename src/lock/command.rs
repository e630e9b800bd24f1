//! Messages drained by the main context

use tokio::sync::oneshot;

use super::machine::LockState;
use super::overlay::TransitionId;
use crate::engine::TapSignal;
use crate::resilience::SystemNotice;
use crate::shortcut::{Shortcut, ShortcutError};

/// Everything that can change lock state arrives as one of these
#[derive(Debug)]
pub enum Command {
    /// Menu/IPC toggle request
    Toggle {
        reply: Option<oneshot::Sender<ToggleOutcome>>,
    },

    /// Posted from the tap thread
    Tap(TapSignal),

    /// Overlay animation finished
    TransitionFinished(TransitionId),

    /// The system resumed from sleep, display sleep or the screensaver
    Reconnect(SystemNotice),

    /// Permission polling observed a grant
    PermissionGranted,

    /// Replace and persist the unlock shortcut. Replies with the new label.
    SetShortcut {
        shortcut: Shortcut,
        reply: oneshot::Sender<Result<String, ShortcutError>>,
    },

    /// Read-only view for the menu contract
    Snapshot {
        reply: oneshot::Sender<LockSnapshot>,
    },

    Shutdown,
}

/// Result of a toggle request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// State after the request was handled
    pub state: LockState,
    /// Whether a transition actually started
    pub accepted: bool,
    /// The request was refused until Accessibility permission is granted
    pub permission_required: bool,
    /// A tap is installed and input is actually being swallowed
    pub intercepting: bool,
}

/// Menu-facing view of the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSnapshot {
    pub locked: bool,
    /// False while locked means the tap could not be installed
    pub intercepting: bool,
    pub transitioning: bool,
    pub permission_granted: bool,
    pub shortcut_label: String,
}
