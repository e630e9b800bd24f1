//! Inert boundaries for targets without a system-wide input tap

use std::sync::mpsc;
use std::sync::Arc;

use crate::engine::{EngineError, InstalledTap, Slot, TapBackend};
use crate::permission::PermissionSource;
use crate::resilience::{NotificationSource, ResilienceError, ResilienceMonitor};

#[derive(Debug, Default)]
pub struct UnsupportedTapBackend;

impl TapBackend for UnsupportedTapBackend {
    fn install(&mut self, _mask: u64, _slot: Slot) -> Result<Arc<dyn InstalledTap>, EngineError> {
        Err(EngineError::Unsupported)
    }
}

/// Never trusted, so lock requests always report that permission is missing
#[derive(Debug, Default)]
pub struct UnsupportedPermission;

impl PermissionSource for UnsupportedPermission {
    fn is_trusted(&self) -> bool {
        false
    }

    fn prompt(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct UnsupportedNotifications;

impl NotificationSource for UnsupportedNotifications {
    fn subscribe(&mut self, _monitor: ResilienceMonitor) -> Result<(), ResilienceError> {
        Err(ResilienceError::Unsupported)
    }
}

/// Blocks the main thread until released
pub struct MainLoop {
    release_tx: mpsc::Sender<()>,
    release_rx: mpsc::Receiver<()>,
}

impl MainLoop {
    pub fn current() -> Self {
        let (release_tx, release_rx) = mpsc::channel();
        Self {
            release_tx,
            release_rx,
        }
    }

    pub fn releaser(&self) -> MainLoopReleaser {
        MainLoopReleaser {
            release_tx: self.release_tx.clone(),
        }
    }

    pub fn park(&self) {
        let _ = self.release_rx.recv();
    }
}

/// Dropping it ends [`MainLoop::park`]
pub struct MainLoopReleaser {
    release_tx: mpsc::Sender<()>,
}

impl Drop for MainLoopReleaser {
    fn drop(&mut self) {
        let _ = self.release_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_reports_unsupported() {
        let result = UnsupportedTapBackend.install(0, Slot::from_user_info(std::ptr::null_mut()));
        assert!(matches!(result, Err(EngineError::Unsupported)));
    }

    #[test]
    fn test_main_loop_release() {
        let main_loop = MainLoop::current();
        let releaser = main_loop.releaser();
        let handle = std::thread::spawn(move || drop(releaser));
        main_loop.park();
        handle.join().unwrap();
    }
}
