//! Overlay visibility contract
//!
//! The core never draws anything. It asks an overlay collaborator to become
//! visible or hidden and waits for the matching [`Completion`] before it
//! accepts the next transition.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use super::command::Command;
use crate::events::LockEvent;

/// Identifies one lock transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionId(pub u64);

/// Completion callback handed to the overlay with each request
#[derive(Debug)]
pub struct Completion {
    id: TransitionId,
    commands: mpsc::Sender<Command>,
}

impl Completion {
    pub fn new(id: TransitionId, commands: mpsc::Sender<Command>) -> Self {
        Self { id, commands }
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    /// Report that the show/hide animation finished
    pub async fn complete(self) {
        if self
            .commands
            .send(Command::TransitionFinished(self.id))
            .await
            .is_err()
        {
            warn!(id = self.id.0, "command queue closed before overlay completion");
        }
    }
}

/// Rendering collaborator for the lock indicator
pub trait Overlay: Send {
    fn show(&mut self, done: Completion);

    fn hide(&mut self, done: Completion);
}

/// Publishes visibility requests on the event bus, where an out-of-process
/// renderer follows them, and completes after the animation time.
pub struct TimedOverlay {
    events: broadcast::Sender<LockEvent>,
    animation: Duration,
}

impl TimedOverlay {
    pub fn new(events: broadcast::Sender<LockEvent>, animation: Duration) -> Self {
        Self { events, animation }
    }

    fn request(&self, visible: bool, done: Completion) {
        debug!(visible, id = done.id().0, "overlay visibility requested");
        let _ = self.events.send(LockEvent::OverlayRequested { visible });

        let animation = self.animation;
        tokio::spawn(async move {
            tokio::time::sleep(animation).await;
            done.complete().await;
        });
    }
}

impl Overlay for TimedOverlay {
    fn show(&mut self, done: Completion) {
        self.request(true, done);
    }

    fn hide(&mut self, done: Completion) {
        self.request(false, done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_overlay_publishes_and_completes() {
        let (event_tx, mut event_rx) = broadcast::channel(8);
        let (command_tx, mut command_rx) = mpsc::channel(8);
        let mut overlay = TimedOverlay::new(event_tx, Duration::from_millis(5));

        overlay.show(Completion::new(TransitionId(3), command_tx.clone()));

        assert_eq!(
            event_rx.recv().await.unwrap(),
            LockEvent::OverlayRequested { visible: true }
        );
        let command = tokio::time::timeout(Duration::from_secs(2), command_rx.recv())
            .await
            .unwrap();
        assert!(matches!(
            command,
            Some(Command::TransitionFinished(TransitionId(3)))
        ));
    }

    #[test]
    fn test_completion_after_queue_closed_does_not_panic() {
        let (command_tx, command_rx) = mpsc::channel(1);
        drop(command_rx);
        tokio_test::block_on(Completion::new(TransitionId(1), command_tx).complete());
    }
}
