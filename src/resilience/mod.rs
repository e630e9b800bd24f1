//! System resilience monitor
//!
//! Sleep, display sleep and the screensaver can silently invalidate the input
//! tap. The monitor listens for the OS lifecycle notifications and asks the
//! main context to verify the tap whenever the system comes back.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::lock::Command;

/// Errors from the notification layer
#[derive(Debug, thiserror::Error)]
pub enum ResilienceError {
    #[error("failed to register for system notifications: {0}")]
    Registration(String),

    #[error("system notifications are not supported on this platform")]
    Unsupported,
}

/// Which notification center delivers a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCenter {
    /// NSWorkspace's own center
    Workspace,
    /// The cross-process distributed center
    Distributed,
}

/// OS lifecycle notifications the daemon reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemNotice {
    WillSleep,
    DidWake,
    ScreensDidSleep,
    ScreensDidWake,
    ScreensaverDidStart,
    ScreensaverDidStop,
}

impl SystemNotice {
    pub const ALL: [SystemNotice; 6] = [
        SystemNotice::WillSleep,
        SystemNotice::DidWake,
        SystemNotice::ScreensDidSleep,
        SystemNotice::ScreensDidWake,
        SystemNotice::ScreensaverDidStart,
        SystemNotice::ScreensaverDidStop,
    ];

    /// OS notification name
    pub fn name(self) -> &'static str {
        match self {
            SystemNotice::WillSleep => "NSWorkspaceWillSleepNotification",
            SystemNotice::DidWake => "NSWorkspaceDidWakeNotification",
            SystemNotice::ScreensDidSleep => "NSWorkspaceScreensDidSleepNotification",
            SystemNotice::ScreensDidWake => "NSWorkspaceScreensDidWakeNotification",
            SystemNotice::ScreensaverDidStart => "com.apple.screensaver.didstart",
            SystemNotice::ScreensaverDidStop => "com.apple.screensaver.didstop",
        }
    }

    pub fn center(self) -> NotificationCenter {
        match self {
            SystemNotice::ScreensaverDidStart | SystemNotice::ScreensaverDidStop => {
                NotificationCenter::Distributed
            }
            _ => NotificationCenter::Workspace,
        }
    }

    /// Whether the tap has to be checked after this notice
    pub fn is_resume(self) -> bool {
        matches!(
            self,
            SystemNotice::DidWake | SystemNotice::ScreensDidWake | SystemNotice::ScreensaverDidStop
        )
    }
}

impl fmt::Display for SystemNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// OS boundary that delivers lifecycle notifications to the monitor.
///
/// Registrations live as long as the source; dropping it unregisters.
pub trait NotificationSource {
    fn subscribe(&mut self, monitor: ResilienceMonitor) -> Result<(), ResilienceError>;
}

/// Turns lifecycle notifications into reconnect requests
#[derive(Debug, Clone)]
pub struct ResilienceMonitor {
    commands: mpsc::Sender<Command>,
}

impl ResilienceMonitor {
    pub fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    /// Called from the notification thread. Never blocks.
    pub fn notify(&self, notice: SystemNotice) {
        if !notice.is_resume() {
            debug!(%notice, "system notice");
            return;
        }

        info!(%notice, "system resumed, requesting tap check");
        if let Err(e) = self.commands.try_send(Command::Reconnect(notice)) {
            warn!(%notice, ?e, "failed to post reconnect request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_names() {
        assert_eq!(
            SystemNotice::WillSleep.name(),
            "NSWorkspaceWillSleepNotification"
        );
        assert_eq!(
            SystemNotice::ScreensaverDidStop.name(),
            "com.apple.screensaver.didstop"
        );
        assert_eq!(SystemNotice::DidWake.to_string(), SystemNotice::DidWake.name());
    }

    #[test]
    fn test_screensaver_uses_distributed_center() {
        assert_eq!(
            SystemNotice::ScreensaverDidStop.center(),
            NotificationCenter::Distributed
        );
        assert_eq!(SystemNotice::DidWake.center(), NotificationCenter::Workspace);
    }

    #[test]
    fn test_only_resume_notices_request_reconnect() {
        let (tx, mut rx) = mpsc::channel(8);
        let monitor = ResilienceMonitor::new(tx);

        for notice in SystemNotice::ALL {
            monitor.notify(notice);
        }

        let mut posted = Vec::new();
        while let Ok(Command::Reconnect(notice)) = rx.try_recv() {
            posted.push(notice);
        }
        assert_eq!(
            posted,
            vec![
                SystemNotice::DidWake,
                SystemNotice::ScreensDidWake,
                SystemNotice::ScreensaverDidStop,
            ]
        );
    }


    #[test]
    fn test_full_queue_does_not_block() {
        let (tx, _rx) = mpsc::channel(1);
        let monitor = ResilienceMonitor::new(tx);
        monitor.notify(SystemNotice::DidWake);
        monitor.notify(SystemNotice::DidWake);
    }
}
