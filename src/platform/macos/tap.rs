//! CGEventTap backend
//!
//! Each installed tap gets a dedicated thread running its own CFRunLoop. The
//! callback finds its context through the slot index passed as `user_info`.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::base::TCFType;
use core_foundation::mach_port::{CFMachPort, CFMachPortRef};
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, EventField,
};
use core_graphics::sys;
use foreign_types::ForeignType;
use tracing::{debug, error, info, warn};

use crate::engine::{
    Disposition, EngineError, EventKind, InputEvent, InstalledTap, Slot, TapBackend, TAP_CONTEXTS,
};

type TapCallback = unsafe extern "C" fn(
    proxy: *mut c_void,
    event_type: u32,
    event: sys::CGEventRef,
    user_info: *mut c_void,
) -> sys::CGEventRef;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: TapCallback,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);

    fn CGEventTapIsEnabled(tap: CFMachPortRef) -> bool;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortInvalidate(port: CFMachPortRef);
}

/// How long the tap thread's run loop runs before checking `running`
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

unsafe extern "C" fn tap_callback(
    _proxy: *mut c_void,
    event_type: u32,
    event: sys::CGEventRef,
    user_info: *mut c_void,
) -> sys::CGEventRef {
    let Some(context) = TAP_CONTEXTS.get(Slot::from_user_info(user_info)) else {
        return event;
    };

    let kind = EventKind::from_raw(event_type);
    let input = if kind == EventKind::KeyDown && !event.is_null() {
        // the tap still owns the event, never release it here
        let cg_event = ManuallyDrop::new(CGEvent::from_ptr(event));
        let key_code = cg_event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
        InputEvent::key_down(key_code, cg_event.get_flags().bits())
    } else {
        InputEvent::new(kind)
    };

    match context.handle(&input) {
        Disposition::PassThrough => event,
        Disposition::Suppress => std::ptr::null_mut(),
    }
}

/// Creates session-level taps on their own run-loop threads
#[derive(Debug, Default)]
pub struct MacTapBackend;

impl TapBackend for MacTapBackend {
    fn install(&mut self, mask: u64, slot: Slot) -> Result<Arc<dyn InstalledTap>, EngineError> {
        let tap = Arc::new(MacTap::default());
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), EngineError>>();

        let thread_tap = Arc::clone(&tap);
        let handle = thread::Builder::new()
            .name("input-tap".to_string())
            .spawn(move || run_tap_thread(thread_tap, mask, slot, ready_tx))
            .map_err(|e| EngineError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                *tap.thread.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                Ok(tap as Arc<dyn InstalledTap>)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(EngineError::TapCreation(
                    "tap thread exited during startup".to_string(),
                ))
            }
        }
    }
}

/// Run loop of a tap thread, stopped from the main context
struct TapRunLoop(CFRunLoop);

// CFRunLoopStop may be called from any thread
unsafe impl Send for TapRunLoop {}

/// A live CGEventTap
#[derive(Default)]
struct MacTap {
    /// `CFMachPortRef` while the tap thread owns a valid port, else 0
    port: AtomicUsize,
    running: AtomicBool,
    run_loop: Mutex<Option<TapRunLoop>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MacTap {
    fn port(&self) -> Option<CFMachPortRef> {
        match self.port.load(Ordering::SeqCst) {
            0 => None,
            raw => Some(raw as CFMachPortRef),
        }
    }
}

impl InstalledTap for MacTap {
    fn is_enabled(&self) -> bool {
        match self.port() {
            Some(port) => unsafe { CGEventTapIsEnabled(port) },
            None => false,
        }
    }

    fn set_enabled(&self, enabled: bool) {
        if let Some(port) = self.port() {
            unsafe { CGEventTapEnable(port, enabled) };
        }
    }

    fn remove(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.port.store(0, Ordering::SeqCst);

        if let Some(run_loop) = self.run_loop.lock().unwrap_or_else(|e| e.into_inner()).take() {
            run_loop.0.stop();
        }

        let handle = self.thread.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("input tap thread panicked");
            }
        }
    }
}

fn run_tap_thread(
    tap: Arc<MacTap>,
    mask: u64,
    slot: Slot,
    ready: mpsc::Sender<Result<(), EngineError>>,
) {
    let port_ref = unsafe {
        CGEventTapCreate(
            CGEventTapLocation::Session as u32,
            CGEventTapPlacement::HeadInsertEventTap as u32,
            CGEventTapOptions::Default as u32,
            mask,
            tap_callback,
            slot.as_user_info(),
        )
    };

    if port_ref.is_null() {
        let _ = ready.send(Err(EngineError::TapCreation(
            "CGEventTapCreate returned null".to_string(),
        )));
        return;
    }

    let port = unsafe { CFMachPort::wrap_under_create_rule(port_ref) };
    let source = match port.create_runloop_source(0) {
        Ok(source) => source,
        Err(_) => {
            unsafe { CFMachPortInvalidate(port_ref) };
            let _ = ready.send(Err(EngineError::TapCreation(
                "failed to create run loop source".to_string(),
            )));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.port
        .store(port.as_concrete_TypeRef() as usize, Ordering::SeqCst);
    *tap.run_loop.lock().unwrap_or_else(|e| e.into_inner()) = Some(TapRunLoop(run_loop.clone()));
    tap.running.store(true, Ordering::SeqCst);
    unsafe { CGEventTapEnable(port_ref, true) };

    if ready.send(Ok(())).is_err() {
        warn!("tap installer went away, tearing tap down");
        tap.running.store(false, Ordering::SeqCst);
    } else {
        info!(slot = slot.index(), "event tap thread running");
    }

    while tap.running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, false);
        }
    }

    unsafe {
        run_loop.remove_source(&source, kCFRunLoopCommonModes);
        CGEventTapEnable(port_ref, false);
        CFMachPortInvalidate(port_ref);
    }
    debug!(slot = slot.index(), "event tap thread stopped");
}
