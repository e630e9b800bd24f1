//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::LockEvent;
use crate::lock::{LockSnapshot, LockState, ToggleOutcome};
use crate::permission::SETTINGS_URL;

/// Largest frame either side will accept
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from UI to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Lock if idle, unlock if locked
    Toggle,

    /// Replace the unlock shortcut
    SetShortcut { key_code: i64, modifier_mask: u64 },

    /// Subscribe to lock event notifications
    Subscribe,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Result of a toggle request
    Toggled {
        locked: bool,
        accepted: bool,
        permission_required: bool,
        intercepting: bool,
        /// Where the user grants the permission, when it is required
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settings_url: Option<String>,
    },

    /// The new shortcut is active and saved
    ShortcutUpdated { label: String },

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<ToggleOutcome> for Response {
    fn from(outcome: ToggleOutcome) -> Self {
        Self::Toggled {
            locked: outcome.state == LockState::Locked,
            accepted: outcome.accepted,
            permission_required: outcome.permission_required,
            intercepting: outcome.intercepting,
            settings_url: outcome
                .permission_required
                .then(|| SETTINGS_URL.to_string()),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "notification")]
pub struct Notification {
    pub event: LockEvent,
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    pub locked: bool,

    /// A tap is installed. `locked` without this means input is not blocked.
    pub intercepting: bool,

    /// An overlay animation is still running
    pub transitioning: bool,

    pub permission_granted: bool,

    /// Accessibility settings deep link, present while permission is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_url: Option<String>,

    /// Menu label of the unlock shortcut, e.g. `⇧⌘B`
    pub shortcut_label: String,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl DaemonStatus {
    pub fn new(snapshot: LockSnapshot, uptime_secs: u64) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            locked: snapshot.locked,
            intercepting: snapshot.intercepting,
            transitioning: snapshot.transitioning,
            permission_granted: snapshot.permission_granted,
            settings_url: (!snapshot.permission_granted).then(|| SETTINGS_URL.to_string()),
            shortcut_label: snapshot.shortcut_label,
            uptime_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::SetShortcut {
            key_code: 11,
            modifier_mask: 0x0012_0000,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("set_shortcut"));
        assert!(json.contains("\"key_code\":11"));
    }

    #[test]
    fn test_request_parsing() {
        let req: Request = serde_json::from_str(r#"{"type":"toggle"}"#).unwrap();
        assert_eq!(req, Request::Toggle);
        assert!(serde_json::from_str::<Request>(r#"{"type":"set_mode"}"#).is_err());
    }

    #[test]
    fn test_status_serialization() {
        let snapshot = LockSnapshot {
            locked: true,
            intercepting: true,
            transitioning: false,
            permission_granted: true,
            shortcut_label: "⇧⌘B".to_string(),
        };
        let resp = Response::Status(DaemonStatus::new(snapshot, 42));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["locked"], true);
        assert_eq!(json["intercepting"], true);
        assert_eq!(json["shortcut_label"], "⇧⌘B");
        assert_eq!(json["uptime_secs"], 42);
        assert!(json.get("settings_url").is_none());
    }

    #[test]
    fn test_status_without_permission_links_settings() {
        let snapshot = LockSnapshot {
            locked: true,
            intercepting: false,
            transitioning: false,
            permission_granted: false,
            shortcut_label: "⇧⌘B".to_string(),
        };
        let status = DaemonStatus::new(snapshot, 0);
        assert!(!status.intercepting);
        assert_eq!(status.settings_url.as_deref(), Some(SETTINGS_URL));

        let json = serde_json::to_string(&Response::Status(status.clone())).unwrap();
        assert_eq!(
            serde_json::from_str::<Response>(&json).unwrap(),
            Response::Status(status)
        );
    }

    #[test]
    fn test_toggle_outcome_response() {
        let resp = Response::from(ToggleOutcome {
            state: LockState::Idle,
            accepted: false,
            permission_required: true,
            intercepting: false,
        });
        assert_eq!(
            resp,
            Response::Toggled {
                locked: false,
                accepted: false,
                permission_required: true,
                intercepting: false,
                settings_url: Some(SETTINGS_URL.to_string()),
            }
        );

        let locked = Response::from(ToggleOutcome {
            state: LockState::Locked,
            accepted: true,
            permission_required: false,
            intercepting: false,
        });
        let json = serde_json::to_value(&locked).unwrap();
        assert_eq!(json["locked"], true);
        assert_eq!(json["intercepting"], false);
        assert!(json.get("settings_url").is_none());
    }

    #[test]
    fn test_notification_wraps_event() {
        let note = Notification {
            event: LockEvent::Unlocked { duration_ms: 7 },
        };
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["event"]["type"], "unlocked");
        assert_eq!(json["event"]["duration_ms"], 7);
    }
}
