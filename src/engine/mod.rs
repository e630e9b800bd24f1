//! Event interception engine
//!
//! Owns the system-wide input tap. While active every keyboard, mouse and
//! trackpad event is swallowed except the unlock shortcut, which is turned
//! into a toggle request for the main context.

mod callback;
mod event;
mod handles;
mod interception;

pub use callback::{classify, Disposition, TapContext, TapSignal, Verdict};
pub use event::{event_mask, EventKind, InputEvent};
pub use handles::{HandleTable, Slot, TAP_CONTEXTS};
pub use interception::{
    EngineError, InstalledTap, InterceptionEngine, Reconnect, TapBackend, TapHandle,
};
