//! macOS implementations of the OS boundaries

mod notifications;
mod permission;
mod tap;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop, CFRunLoopRunResult};

pub use notifications::WorkspaceNotifications;
pub use permission::AccessibilityPermission;
pub use tap::MacTapBackend;

const MAIN_LOOP_SLICE: Duration = Duration::from_millis(250);

/// Keeps the process main thread turning its CFRunLoop, which is where
/// workspace and distributed notifications are delivered.
pub struct MainLoop {
    released: Arc<AtomicBool>,
    run_loop: CFRunLoop,
}

impl MainLoop {
    /// Must be called on the main thread
    pub fn current() -> Self {
        Self {
            released: Arc::new(AtomicBool::new(false)),
            run_loop: CFRunLoop::get_current(),
        }
    }

    pub fn releaser(&self) -> MainLoopReleaser {
        MainLoopReleaser {
            released: Arc::clone(&self.released),
            run_loop: self.run_loop.clone(),
        }
    }

    /// Run the main run loop until released
    pub fn park(&self) {
        while !self.released.load(Ordering::SeqCst) {
            let result =
                unsafe { CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, MAIN_LOOP_SLICE, false) };
            // no sources registered: the loop returns at once
            if let CFRunLoopRunResult::Finished = result {
                std::thread::sleep(MAIN_LOOP_SLICE);
            }
        }
    }
}

/// Sendable handle; dropping it ends [`MainLoop::park`]
pub struct MainLoopReleaser {
    released: Arc<AtomicBool>,
    run_loop: CFRunLoop,
}

// CFRunLoopStop may be called from any thread
unsafe impl Send for MainLoopReleaser {}

impl Drop for MainLoopReleaser {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
        self.run_loop.stop();
    }
}
