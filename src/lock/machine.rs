//! Lock state machine
//!
//! Single source of truth for whether input is locked. Transitions are
//! debounced and guarded: while the overlay is still animating a transition,
//! every further request is rejected rather than queued.

use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::command::Command;
use super::overlay::{Completion, Overlay, TransitionId};
use crate::engine::{InterceptionEngine, Reconnect, TapBackend};
use crate::events::LockEvent;

/// Minimum time between accepted toggles
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(350);

/// Whether input is locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    /// Input flows normally
    #[default]
    Idle,
    /// Input is blocked except the unlock shortcut
    Locked,
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockState::Idle => write!(f, "Idle"),
            LockState::Locked => write!(f, "Locked"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Locked,
    /// The state already reads as `target`; the overlay has not finished yet
    Transitioning { target: LockState, id: TransitionId },
}

/// Drives the interception engine and the overlay from lock requests
pub struct LockStateMachine<B: TapBackend, O: Overlay> {
    phase: Phase,
    engine: InterceptionEngine<B>,
    overlay: O,
    debounce: Duration,
    /// Time of the last accepted transition
    last_transition: Option<Instant>,
    /// Time the current lock began
    locked_at: Option<Instant>,
    next_id: u64,
    commands: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<LockEvent>,
}

impl<B: TapBackend, O: Overlay> LockStateMachine<B, O> {
    pub fn new(
        engine: InterceptionEngine<B>,
        overlay: O,
        debounce: Duration,
        commands: mpsc::Sender<Command>,
        event_tx: broadcast::Sender<LockEvent>,
    ) -> Self {
        Self {
            phase: Phase::Idle,
            engine,
            overlay,
            debounce,
            last_transition: None,
            locked_at: None,
            next_id: 0,
            commands,
            event_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> LockState {
        match self.phase {
            Phase::Idle => LockState::Idle,
            Phase::Locked => LockState::Locked,
            Phase::Transitioning { target, .. } => target,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.phase, Phase::Transitioning { .. })
    }

    /// Whether a tap is installed right now
    pub fn is_intercepting(&self) -> bool {
        self.engine().is_active()
    }

    pub fn engine(&self) -> &InterceptionEngine<B> {
        &self.engine
    }

    /// Flip between Idle and Locked, unless a transition is in flight or the
    /// last one was accepted less than the debounce interval ago.
    pub fn toggle(&mut self) -> LockState {
        self.toggle_at(Instant::now())
    }

    pub(crate) fn toggle_at(&mut self, now: Instant) -> LockState {
        if self.is_transitioning() {
            debug!(state = %self.state(), "toggle rejected - transition in flight");
            return self.state();
        }
        if let Some(last) = self.last_transition {
            if now.saturating_duration_since(last) < self.debounce {
                debug!(state = %self.state(), "toggle rejected - debounce");
                return self.state();
            }
        }

        match self.phase {
            Phase::Idle => self.engage_at(now),
            Phase::Locked => self.disengage_at(now),
            Phase::Transitioning { .. } => self.state(),
        }
    }

    /// Lock input
    pub fn engage(&mut self) -> LockState {
        self.engage_at(Instant::now())
    }

    fn engage_at(&mut self, now: Instant) -> LockState {
        if self.phase != Phase::Idle {
            debug!(phase = ?self.phase, "engage ignored");
            return self.state();
        }

        let id = self.next_transition();
        self.phase = Phase::Transitioning {
            target: LockState::Locked,
            id,
        };
        self.last_transition = Some(now);
        self.locked_at = Some(now);

        info!(from = %LockState::Idle, to = %LockState::Locked, "lock transition");

        if let Err(e) = self.engine.start() {
            warn!(?e, "locked without an active tap");
            self.emit(LockEvent::InterceptionUnavailable {
                reason: e.to_string(),
            });
        }

        self.emit(LockEvent::Locked);
        self.overlay.show(Completion::new(id, self.commands.clone()));
        LockState::Locked
    }

    /// Unlock input. The tap is removed before the overlay is asked to hide,
    /// so input never stays blocked once the indicator is gone.
    pub fn disengage(&mut self) -> LockState {
        self.disengage_at(Instant::now())
    }

    fn disengage_at(&mut self, now: Instant) -> LockState {
        if self.phase != Phase::Locked {
            debug!(phase = ?self.phase, "disengage ignored");
            return self.state();
        }

        self.engine.stop();

        let id = self.next_transition();
        self.phase = Phase::Transitioning {
            target: LockState::Idle,
            id,
        };
        self.last_transition = Some(now);

        let duration_ms = self
            .locked_at
            .take()
            .map(|t| now.saturating_duration_since(t).as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %LockState::Locked,
            to = %LockState::Idle,
            duration_ms = duration_ms,
            "lock transition"
        );

        self.emit(LockEvent::Unlocked { duration_ms });
        self.overlay.hide(Completion::new(id, self.commands.clone()));
        LockState::Idle
    }

    /// Overlay finished animating transition `id`. Returns whether the guard
    /// was cleared.
    pub fn transition_finished(&mut self, id: TransitionId) -> bool {
        match self.phase {
            Phase::Transitioning { target, id: current } if current == id => {
                self.phase = match target {
                    LockState::Idle => Phase::Idle,
                    LockState::Locked => Phase::Locked,
                };
                debug!(state = %target, id = id.0, "transition complete");
                true
            }
            _ => {
                debug!(id = id.0, phase = ?self.phase, "stale transition completion");
                false
            }
        }
    }

    /// Verify the tap after the OS may have invalidated it. No-op unless
    /// locked.
    pub fn reconnect_if_needed(&mut self) -> Option<Reconnect> {
        if self.state() != LockState::Locked {
            debug!("reconnect skipped - not locked");
            return None;
        }

        match self.engine.reconnect() {
            Ok(Reconnect::Healthy) => {
                debug!("event tap healthy");
                Some(Reconnect::Healthy)
            }
            Ok(outcome) => {
                info!(?outcome, "event tap recovered");
                self.emit(LockEvent::TapRecovered {
                    recreated: outcome == Reconnect::Recreated,
                });
                Some(outcome)
            }
            Err(e) => {
                warn!(?e, "event tap could not be recovered");
                self.emit(LockEvent::InterceptionUnavailable {
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Release the tap unconditionally
    pub fn shutdown(&mut self) {
        self.engine.stop();
    }

    fn next_transition(&mut self) -> TransitionId {
        self.next_id += 1;
        TransitionId(self.next_id)
    }

    fn emit(&self, event: LockEvent) {
        debug!(%event, "emitting lock event");
        let _ = self.event_tx.send(event);
    }
}
