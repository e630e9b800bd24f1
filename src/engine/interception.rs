//! Interception engine: owns the privileged input tap
//!
//! Phases are Stopped -> Starting -> Active -> Stopped. The tap handle lives
//! inside `Active`, so an active engine without a tap cannot be represented.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::callback::TapContext;
use super::event;
use super::handles::{Slot, TAP_CONTEXTS};
use crate::lock::Command;
use crate::permission::PermissionGate;
use crate::shortcut::ShortcutCell;

/// Errors that can occur while starting interception
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Accessibility permission is not granted")]
    PermissionDenied,

    #[error("failed to create event tap: {0}")]
    TapCreation(String),

    #[error("failed to spawn tap thread: {0}")]
    ThreadSpawn(String),

    #[error("input interception is not supported on this platform")]
    Unsupported,
}

/// An installed tap, controllable from any thread
pub trait InstalledTap: Send + Sync {
    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    /// Disable the tap, drop its run-loop binding and release the port.
    /// Called exactly once, from the main context.
    fn remove(&self);
}

/// OS boundary that creates taps
pub trait TapBackend: Send {
    /// Install a session-level, head-inserted, event-modifying tap for `mask`
    /// whose callback resolves its context from `slot`.
    fn install(&mut self, mask: u64, slot: Slot) -> Result<Arc<dyn InstalledTap>, EngineError>;
}

/// Exclusive owner of an installed tap
pub struct TapHandle {
    slot: Slot,
    tap: Arc<dyn InstalledTap>,
}

impl TapHandle {
    pub fn slot(&self) -> Slot {
        self.slot
    }
}

enum Phase {
    Stopped,
    Starting,
    Active(TapHandle),
}

/// Outcome of a reconnect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    /// The tap was enabled already
    Healthy,
    /// The tap was disabled and came back on re-enable
    Reenabled,
    /// The tap was torn down and installed again
    Recreated,
}

/// Installs, recovers and removes the system-wide input tap
pub struct InterceptionEngine<B: TapBackend> {
    backend: B,
    permission: PermissionGate,
    shortcut: Arc<ShortcutCell>,
    commands: mpsc::Sender<Command>,
    phase: Phase,
}

impl<B: TapBackend> InterceptionEngine<B> {
    pub fn new(
        backend: B,
        permission: PermissionGate,
        shortcut: Arc<ShortcutCell>,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            backend,
            permission,
            shortcut,
            commands,
            phase: Phase::Stopped,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    /// The installed tap, if interception is active
    pub fn tap_handle(&self) -> Option<&TapHandle> {
        match &self.phase {
            Phase::Active(handle) => Some(handle),
            _ => None,
        }
    }

    /// Begin intercepting input. Does nothing if already active.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.is_active() {
            debug!("interception already active");
            return Ok(());
        }

        if !self.permission.is_granted() {
            warn!("not starting interception - Accessibility permission missing");
            return Err(EngineError::PermissionDenied);
        }

        self.phase = Phase::Starting;

        let context = Arc::new(TapContext::new(
            Arc::clone(&self.shortcut),
            self.commands.clone(),
        ));
        let slot = TAP_CONTEXTS.insert(Arc::clone(&context));

        match self.backend.install(event::event_mask(), slot) {
            Ok(tap) => {
                context.attach(Arc::clone(&tap));
                self.phase = Phase::Active(TapHandle { slot, tap });
                info!(slot = slot.index(), "input interception active");
                Ok(())
            }
            Err(e) => {
                TAP_CONTEXTS.remove(slot);
                self.phase = Phase::Stopped;
                error!(?e, "failed to install event tap");
                Err(e)
            }
        }
    }

    /// Stop intercepting input. Safe to call when already stopped.
    pub fn stop(&mut self) {
        let Phase::Active(handle) = std::mem::replace(&mut self.phase, Phase::Stopped) else {
            return;
        };

        handle.tap.set_enabled(false);
        handle.tap.remove();
        TAP_CONTEXTS.remove(handle.slot);
        info!(slot = handle.slot.index(), "input interception stopped");
    }

    /// Make sure the tap is alive: re-enable it, or rebuild it from scratch
    /// when re-enabling does not take.
    pub fn reconnect(&mut self) -> Result<Reconnect, EngineError> {
        if let Phase::Active(handle) = &self.phase {
            if handle.tap.is_enabled() {
                return Ok(Reconnect::Healthy);
            }
            handle.tap.set_enabled(true);
            if handle.tap.is_enabled() {
                info!("event tap re-enabled");
                return Ok(Reconnect::Reenabled);
            }
            warn!("event tap refused to re-enable, recreating");
        }

        self.stop();
        self.start()?;
        Ok(Reconnect::Recreated)
    }
}

impl<B: TapBackend> Drop for InterceptionEngine<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
