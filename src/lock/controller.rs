//! Main execution context
//!
//! The controller task owns the lock state machine and applies commands one at
//! a time, in arrival order. Nothing else mutates lock state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::command::{Command, LockSnapshot, ToggleOutcome};
use super::machine::{LockState, LockStateMachine};
use super::overlay::Overlay;
use crate::engine::{TapBackend, TapSignal};
use crate::events::LockEvent;
use crate::permission::PermissionGate;
use crate::shortcut::{Shortcut, ShortcutCell, ShortcutError, ShortcutStore};

pub struct Controller<B: TapBackend, O: Overlay> {
    machine: LockStateMachine<B, O>,
    shortcut: Arc<ShortcutCell>,
    store: ShortcutStore,
    permission: PermissionGate,
    poll_interval: Duration,
    permission_poll: Option<JoinHandle<()>>,
    commands: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<LockEvent>,
}

impl<B: TapBackend, O: Overlay> Controller<B, O> {
    pub fn new(
        machine: LockStateMachine<B, O>,
        shortcut: Arc<ShortcutCell>,
        store: ShortcutStore,
        permission: PermissionGate,
        poll_interval: Duration,
        commands: mpsc::Sender<Command>,
        event_tx: broadcast::Sender<LockEvent>,
    ) -> Self {
        Self {
            machine,
            shortcut,
            store,
            permission,
            poll_interval,
            permission_poll: None,
            commands,
            event_tx,
        }
    }

    /// Drain the command queue until `Shutdown`, then release the tap
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(
            shortcut = %self.shortcut.get(),
            permission_granted = self.permission.is_granted(),
            "controller started in Idle state"
        );

        while let Some(command) = commands.recv().await {
            if matches!(command, Command::Shutdown) {
                debug!("shutdown command received");
                break;
            }
            self.handle(command);
        }

        self.machine.shutdown();
        if let Some(poll) = self.permission_poll.take() {
            poll.abort();
        }
        info!("controller stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Toggle { reply } => {
                let outcome = self.toggle();
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Command::Tap(TapSignal::ShortcutPressed) => {
                debug!("unlock shortcut pressed");
                self.toggle();
            }
            Command::Tap(TapSignal::TapLost) => {
                warn!("event tap lost, reconnecting");
                self.machine.reconnect_if_needed();
            }
            Command::TransitionFinished(id) => {
                self.machine.transition_finished(id);
            }
            Command::Reconnect(notice) => {
                info!(%notice, "reconnect requested");
                self.machine.reconnect_if_needed();
            }
            Command::PermissionGranted => {
                self.permission_poll = None;
                let _ = self.event_tx.send(LockEvent::PermissionGranted);
                self.machine.reconnect_if_needed();
            }
            Command::SetShortcut { shortcut, reply } => {
                let _ = reply.send(self.set_shortcut(shortcut));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    /// A lock request without permission prompts for it instead of engaging
    fn toggle(&mut self) -> ToggleOutcome {
        let before = self.machine.state();

        if before == LockState::Idle
            && !self.machine.is_transitioning()
            && !self.permission.is_granted()
        {
            info!("lock refused until Accessibility permission is granted");
            self.permission.request_grant();
            self.start_permission_poll();
            return ToggleOutcome {
                state: before,
                accepted: false,
                permission_required: true,
                intercepting: false,
            };
        }

        let after = self.machine.toggle();
        ToggleOutcome {
            state: after,
            accepted: after != before,
            permission_required: false,
            intercepting: self.machine.is_intercepting(),
        }
    }

    fn start_permission_poll(&mut self) {
        if let Some(poll) = &self.permission_poll {
            if !poll.is_finished() {
                return;
            }
        }

        let commands = self.commands.clone();
        self.permission_poll = Some(self.permission.poll_until_granted(
            self.poll_interval,
            move || {
                if let Err(e) = commands.try_send(Command::PermissionGranted) {
                    warn!(?e, "failed to post permission grant");
                }
            },
        ));
    }

    fn set_shortcut(&mut self, shortcut: Shortcut) -> Result<String, ShortcutError> {
        self.store.save(&shortcut)?;
        self.shortcut.set(shortcut);

        let label = shortcut.label();
        info!(%shortcut, "unlock shortcut changed");
        let _ = self.event_tx.send(LockEvent::ShortcutChanged {
            key_code: shortcut.key_code(),
            modifier_mask: shortcut.modifiers(),
            label: label.clone(),
        });
        Ok(label)
    }

    fn snapshot(&self) -> LockSnapshot {
        LockSnapshot {
            locked: self.machine.state() == LockState::Locked,
            intercepting: self.machine.is_intercepting(),
            transitioning: self.machine.is_transitioning(),
            permission_granted: self.permission.is_granted(),
            shortcut_label: self.shortcut.get().label(),
        }
    }
}
