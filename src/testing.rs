//! Test doubles for the OS boundaries

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::{EngineError, InstalledTap, Slot, TapBackend};
use crate::lock::{Completion, Overlay, TransitionId};
use crate::permission::PermissionSource;

/// Permission source with a switchable answer
#[derive(Debug, Default)]
pub struct FakePermission {
    granted: AtomicBool,
    prompts: AtomicUsize,
}

impl FakePermission {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl PermissionSource for FakePermission {
    fn is_trusted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn prompt(&self) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.is_trusted()
    }
}

/// Installed tap that only records what was done to it
#[derive(Debug)]
pub struct FakeTap {
    enabled: AtomicBool,
    refuse: AtomicBool,
    enable_calls: AtomicUsize,
    removals: Arc<AtomicUsize>,
}

impl Default for FakeTap {
    fn default() -> Self {
        Self::with_counter(Arc::new(AtomicUsize::new(0)))
    }
}

impl FakeTap {
    fn with_counter(removals: Arc<AtomicUsize>) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            refuse: AtomicBool::new(false),
            enable_calls: AtomicUsize::new(0),
            removals,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.enable_calls.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return;
            }
        }
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Disable the tap and ignore every later re-enable
    pub fn refuse_enable(&self) {
        self.refuse.store(true, Ordering::SeqCst);
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Number of `set_enabled(true)` calls
    pub fn enable_calls(&self) -> usize {
        self.enable_calls.load(Ordering::SeqCst)
    }
}

impl InstalledTap for FakeTap {
    fn is_enabled(&self) -> bool {
        FakeTap::is_enabled(self)
    }

    fn set_enabled(&self, enabled: bool) {
        FakeTap::set_enabled(self, enabled)
    }

    fn remove(&self) {
        self.removals.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct BackendState {
    installs: usize,
    last_mask: Option<u64>,
    fail_next: bool,
    taps: Vec<Arc<FakeTap>>,
}

/// Tap backend that hands out [`FakeTap`]s. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
    removals: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn installs(&self) -> usize {
        self.state.lock().unwrap().installs
    }

    pub fn last_mask(&self) -> Option<u64> {
        self.state.lock().unwrap().last_mask
    }

    pub fn fail_next_install(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }

    pub fn removal_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.removals)
    }

    pub fn last_tap(&self) -> Option<Arc<FakeTap>> {
        self.state.lock().unwrap().taps.last().cloned()
    }
}

impl TapBackend for FakeBackend {
    fn install(&mut self, mask: u64, _slot: Slot) -> Result<Arc<dyn InstalledTap>, EngineError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next) {
            return Err(EngineError::TapCreation("refused by fake backend".into()));
        }
        state.installs += 1;
        state.last_mask = Some(mask);
        let tap = Arc::new(FakeTap::with_counter(Arc::clone(&self.removals)));
        state.taps.push(Arc::clone(&tap));
        Ok(tap as Arc<dyn InstalledTap>)
    }
}

#[derive(Debug, Default)]
struct OverlayLog {
    requests: Vec<(bool, TransitionId, usize)>,
    watch: Option<Arc<AtomicUsize>>,
}

/// Overlay that records requests and never completes them on its own
#[derive(Debug, Clone, Default)]
pub struct RecordingOverlay {
    log: Arc<Mutex<OverlayLog>>,
}

impl RecordingOverlay {
    /// Record the value of `counter` alongside every later request
    pub fn watch_removals(&self, counter: Arc<AtomicUsize>) {
        self.log.lock().unwrap().watch = Some(counter);
    }

    pub fn requests(&self) -> Vec<(bool, TransitionId)> {
        self.snapshots()
            .into_iter()
            .map(|(visible, id, _)| (visible, id))
            .collect()
    }

    pub fn snapshots(&self) -> Vec<(bool, TransitionId, usize)> {
        self.log.lock().unwrap().requests.clone()
    }

    pub fn last_id(&self) -> Option<TransitionId> {
        self.requests().last().map(|(_, id)| *id)
    }

    fn record(&self, visible: bool, done: Completion) {
        let mut log = self.log.lock().unwrap();
        let watched = log
            .watch
            .as_ref()
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0);
        log.requests.push((visible, done.id(), watched));
    }
}

impl Overlay for RecordingOverlay {
    fn show(&mut self, done: Completion) {
        self.record(true, done);
    }

    fn hide(&mut self, done: Completion) {
        self.record(false, done);
    }
}
