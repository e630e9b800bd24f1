//! Shortcut persistence (JSON)

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::matcher::{Shortcut, ShortcutError, ShortcutRecord};

/// Reads and writes the active unlock shortcut
#[derive(Debug, Clone)]
pub struct ShortcutStore {
    path: PathBuf,
}

impl ShortcutStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the stored shortcut, falling back to the default when the file is
    /// missing, unreadable, malformed or holds an invalid combination.
    pub fn load(&self) -> Shortcut {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "no stored shortcut, using default");
                return Shortcut::default();
            }
            Err(e) => {
                warn!(?e, path = ?self.path, "failed to read shortcut, using default");
                return Shortcut::default();
            }
        };

        let record: ShortcutRecord = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(?e, "malformed shortcut record, using default");
                return Shortcut::default();
            }
        };

        match Shortcut::try_from(record) {
            Ok(shortcut) => {
                info!(%shortcut, "loaded unlock shortcut");
                shortcut
            }
            Err(e) => {
                warn!(?e, ?record, "invalid stored shortcut, using default");
                Shortcut::default()
            }
        }
    }

    /// Persist a shortcut
    pub fn save(&self, shortcut: &Shortcut) -> Result<(), ShortcutError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&ShortcutRecord::from(*shortcut))?;
        fs::write(&self.path, json)?;
        debug!(%shortcut, path = ?self.path, "shortcut saved");
        Ok(())
    }
}
