//! Accessibility permission gate
//!
//! Creating a system-wide input tap requires the user to trust this process
//! in System Settings. The gate never caches the answer: every query goes to
//! the OS.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Deep link to Privacy & Security > Accessibility
pub const SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";

/// OS boundary for the Accessibility trust check
pub trait PermissionSource: Send + Sync {
    /// Current trust status, without side effects
    fn is_trusted(&self) -> bool;

    /// Current trust status, showing the OS consent prompt if untrusted
    fn prompt(&self) -> bool;
}

/// Queries and requests the input-interception permission
#[derive(Clone)]
pub struct PermissionGate {
    source: Arc<dyn PermissionSource>,
}

impl PermissionGate {
    pub fn new(source: Arc<dyn PermissionSource>) -> Self {
        Self { source }
    }

    /// Whether the OS currently grants the permission
    pub fn is_granted(&self) -> bool {
        self.source.is_trusted()
    }

    /// Show the OS prompt if needed and return the current status.
    ///
    /// The prompt is asynchronous from the OS side, so `false` here does not
    /// mean the user declined.
    pub fn request_grant(&self) -> bool {
        if self.source.is_trusted() {
            return true;
        }
        info!("requesting Accessibility permission");
        self.source.prompt()
    }

    /// Check the permission every `interval` until it is granted, then call
    /// `on_granted` once and stop.
    pub fn poll_until_granted<F>(&self, interval: Duration, on_granted: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let gate = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if gate.is_granted() {
                    info!("Accessibility permission granted");
                    on_granted();
                    return;
                }
                debug!("Accessibility permission still missing");
            }
        })
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::FakePermission;

    #[test]
    fn test_is_granted_follows_source() {
        let source = Arc::new(FakePermission::new(false));
        let gate = PermissionGate::new(source.clone());
        assert!(!gate.is_granted());
        source.set(true);
        assert!(gate.is_granted());
    }

    #[test]
    fn test_request_grant_prompts_only_when_missing() {
        let source = Arc::new(FakePermission::new(false));
        let gate = PermissionGate::new(source.clone());

        assert!(!gate.request_grant());
        assert_eq!(source.prompts(), 1);

        source.set(true);
        assert!(gate.request_grant());
        assert_eq!(source.prompts(), 1);
    }

    #[tokio::test]
    async fn test_poll_fires_once_after_grant() {
        let source = Arc::new(FakePermission::new(false));
        let gate = PermissionGate::new(source.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let poll = gate.poll_until_granted(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        source.set(true);
        tokio::time::timeout(Duration::from_secs(2), poll)
            .await
            .expect("poll task should finish")
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_settings_url_targets_accessibility() {
        assert!(SETTINGS_URL.ends_with("Privacy_Accessibility"));
    }
}
