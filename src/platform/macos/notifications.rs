//! Workspace and screensaver notifications
//!
//! Observers are block-based and registered with a nil queue, so they run on
//! the thread that posts the notification: the main thread, whose run loop
//! [`MainLoop`](super::MainLoop) keeps turning.

use std::ffi::{CStr, CString};

use block2::RcBlock;
use objc2::msg_send;
use objc2::runtime::{AnyClass, AnyObject};
use tracing::{debug, info};

use crate::resilience::{
    NotificationCenter, NotificationSource, ResilienceError, ResilienceMonitor, SystemNotice,
};

#[link(name = "AppKit", kind = "framework")]
extern "C" {}

#[link(name = "Foundation", kind = "framework")]
extern "C" {}

type Id = *mut AnyObject;

fn class(name: &CStr) -> Result<&'static AnyClass, ResilienceError> {
    AnyClass::get(name)
        .ok_or_else(|| ResilienceError::Registration(format!("class {name:?} not found")))
}

struct Observer {
    center: Id,
    token: Id,
}

/// Registers workspace and distributed-center observers for every
/// [`SystemNotice`]. Must be created and dropped on the main thread.
#[derive(Default)]
pub struct WorkspaceNotifications {
    observers: Vec<Observer>,
}

impl WorkspaceNotifications {
    fn center(kind: NotificationCenter) -> Result<Id, ResilienceError> {
        let center: Id = match kind {
            NotificationCenter::Workspace => {
                let cls = class(c"NSWorkspace")?;
                unsafe {
                    let workspace: Id = msg_send![cls, sharedWorkspace];
                    msg_send![workspace, notificationCenter]
                }
            }
            NotificationCenter::Distributed => {
                let cls = class(c"NSDistributedNotificationCenter")?;
                unsafe { msg_send![cls, defaultCenter] }
            }
        };
        if center.is_null() {
            return Err(ResilienceError::Registration(format!(
                "{kind:?} notification center unavailable"
            )));
        }
        Ok(center)
    }

    fn observe(
        &mut self,
        notice: SystemNotice,
        monitor: ResilienceMonitor,
    ) -> Result<(), ResilienceError> {
        let center = Self::center(notice.center())?;
        let name = CString::new(notice.name())
            .map_err(|e| ResilienceError::Registration(e.to_string()))?;

        let string_class = class(c"NSString")?;
        let block = RcBlock::new(move |_note: Id| monitor.notify(notice));

        let token: Id = unsafe {
            let ns_name: Id = msg_send![string_class, stringWithUTF8String: name.as_ptr()];
            let nil: Id = std::ptr::null_mut();
            msg_send![
                center,
                addObserverForName: ns_name,
                object: nil,
                queue: nil,
                usingBlock: &*block
            ]
        };
        if token.is_null() {
            return Err(ResilienceError::Registration(format!(
                "observer for {notice} was not registered"
            )));
        }

        debug!(%notice, "observing system notification");
        self.observers.push(Observer { center, token });
        Ok(())
    }
}

impl NotificationSource for WorkspaceNotifications {
    fn subscribe(&mut self, monitor: ResilienceMonitor) -> Result<(), ResilienceError> {
        for notice in SystemNotice::ALL {
            self.observe(notice, monitor.clone())?;
        }
        info!(count = self.observers.len(), "system notification observers installed");
        Ok(())
    }
}

impl Drop for WorkspaceNotifications {
    fn drop(&mut self) {
        for observer in self.observers.drain(..) {
            unsafe {
                let _: () = msg_send![observer.center, removeObserver: observer.token];
            }
        }
    }
}
