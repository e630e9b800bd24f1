//! Unlock shortcut: representation, matching and persistence
//!
//! The shortcut is the one key combination the interception callback lets
//! act while input is locked.

pub mod keys;
mod matcher;
mod store;

pub use matcher::{Shortcut, ShortcutCell, ShortcutError, ShortcutRecord};
pub use store::ShortcutStore;
