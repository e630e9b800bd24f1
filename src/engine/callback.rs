//! Tap callback decisions
//!
//! Runs on the tap's own thread. It must stay fast and never touch state owned
//! by the main context: the only side effects are re-enabling the tap and
//! posting a message on the command queue.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::event::{EventKind, InputEvent};
use super::interception::InstalledTap;
use crate::lock::Command;
use crate::shortcut::{Shortcut, ShortcutCell};

/// Callbacks slower than this risk the OS disabling the tap
const SLOW_CALLBACK_MS: u128 = 10;

/// Messages the callback posts to the main context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapSignal {
    /// The unlock shortcut was pressed
    ShortcutPressed,
    /// The OS disabled the tap and re-enabling it did not take
    TapLost,
}

/// What the callback does with one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Tap was disabled by the OS: re-enable and forward the event untouched
    Reenable,
    /// The unlock shortcut: swallow it and request a toggle
    Toggle,
    /// Anything else while locked
    Block,
}

/// Whether the event continues to the rest of the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    PassThrough,
    Suppress,
}

/// Decide what happens to an event while interception is active
pub fn classify(shortcut: &Shortcut, event: &InputEvent) -> Verdict {
    match event.kind {
        EventKind::TapDisabledByTimeout | EventKind::TapDisabledByUserInput => Verdict::Reenable,
        EventKind::KeyDown if shortcut.matches(event.key_code, event.flags) => Verdict::Toggle,
        _ => Verdict::Block,
    }
}

/// State the callback resolves through the handle table
pub struct TapContext {
    shortcut: Arc<ShortcutCell>,
    commands: mpsc::Sender<Command>,
    tap: OnceLock<Arc<dyn InstalledTap>>,
}

impl TapContext {
    pub fn new(shortcut: Arc<ShortcutCell>, commands: mpsc::Sender<Command>) -> Self {
        Self {
            shortcut,
            commands,
            tap: OnceLock::new(),
        }
    }

    /// Bind the installed tap so the callback can re-enable it
    pub fn attach(&self, tap: Arc<dyn InstalledTap>) {
        if self.tap.set(tap).is_err() {
            warn!("tap context already attached");
        }
    }

    /// Handle one event from the tap thread
    pub fn handle(&self, event: &InputEvent) -> Disposition {
        let start = Instant::now();
        let disposition = match classify(&self.shortcut.get(), event) {
            Verdict::Reenable => {
                warn!(kind = ?event.kind, "event tap disabled by the OS, re-enabling");
                self.reenable();
                Disposition::PassThrough
            }
            Verdict::Toggle => {
                debug!("unlock shortcut pressed");
                self.post(TapSignal::ShortcutPressed);
                Disposition::Suppress
            }
            Verdict::Block => Disposition::Suppress,
        };

        let elapsed = start.elapsed();
        if elapsed.as_millis() > SLOW_CALLBACK_MS {
            warn!(?elapsed, "tap callback was slow");
        }
        disposition
    }

    fn reenable(&self) {
        // disabled before the installer attached the tap: let the main
        // context re-enable it through the engine
        let Some(tap) = self.tap.get() else {
            warn!("event tap disabled before it was attached");
            self.post(TapSignal::TapLost);
            return;
        };
        tap.set_enabled(true);
        if !tap.is_enabled() {
            error!("event tap did not come back, asking for a restart");
            self.post(TapSignal::TapLost);
        }
    }

    fn post(&self, signal: TapSignal) {
        if let Err(e) = self.commands.try_send(Command::Tap(signal)) {
            warn!(?signal, %e, "dropped tap signal");
        }
    }
}
