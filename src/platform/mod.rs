//! Platform bindings for the tap, the permission check and lifecycle
//! notifications

#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(target_os = "macos"))]
mod unsupported;

#[cfg(target_os = "macos")]
pub use macos::{
    AccessibilityPermission as SystemPermission, MacTapBackend as SystemTapBackend, MainLoop,
    WorkspaceNotifications as SystemNotifications,
};
#[cfg(not(target_os = "macos"))]
pub use unsupported::{
    MainLoop, UnsupportedNotifications as SystemNotifications,
    UnsupportedPermission as SystemPermission, UnsupportedTapBackend as SystemTapBackend,
};
