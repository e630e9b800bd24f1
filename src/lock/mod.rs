//! Lock state management
//!
//! The state machine, the overlay contract it drives and the controller task
//! that feeds it from the command queue.

mod command;
mod controller;
mod machine;
mod overlay;

pub use command::{Command, LockSnapshot, ToggleOutcome};
pub use controller::Controller;
pub use machine::{LockState, LockStateMachine, DEFAULT_DEBOUNCE};
pub use overlay::{Completion, Overlay, TimedOverlay, TransitionId};
