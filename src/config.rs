//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::lock::DEFAULT_DEBOUNCE;

const APP_DIR: &str = "inputlock";
const DEFAULT_OVERLAY: Duration = Duration::from_millis(300);
const DEFAULT_PERMISSION_POLL: Duration = Duration::from_secs(1);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Persisted unlock shortcut
    pub shortcut_path: PathBuf,

    /// Minimum time between accepted lock toggles
    pub debounce: Duration,

    /// How long the overlay takes to show or hide
    pub overlay_animation: Duration,

    /// Interval between Accessibility permission checks while waiting for a grant
    pub permission_poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Self::from_parts(Path::new(&home), |key| std::env::var(key).ok())
    }

    /// Build the configuration from a home directory and an environment lookup
    pub fn from_parts(home: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = home
            .join("Library")
            .join("Application Support")
            .join(APP_DIR);

        let permission_poll_interval = millis(
            &env,
            "INPUTLOCK_PERMISSION_POLL_MS",
            DEFAULT_PERMISSION_POLL,
        )?;
        anyhow::ensure!(
            !permission_poll_interval.is_zero(),
            "INPUTLOCK_PERMISSION_POLL_MS must be greater than zero"
        );

        Ok(Self {
            socket_path: data_dir.join("daemon.sock"),
            shortcut_path: data_dir.join("shortcut.json"),
            debounce: millis(&env, "INPUTLOCK_DEBOUNCE_MS", DEFAULT_DEBOUNCE)?,
            overlay_animation: millis(&env, "INPUTLOCK_OVERLAY_MS", DEFAULT_OVERLAY)?,
            permission_poll_interval,
            data_dir,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn millis(env: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    let Some(raw) = env(key) else {
        return Ok(default);
    };
    let ms = raw
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of milliseconds, got {raw:?}"))?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_parts(Path::new("/Users/test"), |_| None).unwrap();
        assert_eq!(
            config.socket_path,
            PathBuf::from("/Users/test/Library/Application Support/inputlock/daemon.sock")
        );
        assert!(config.shortcut_path.ends_with("inputlock/shortcut.json"));
        assert_eq!(config.debounce, DEFAULT_DEBOUNCE);
        assert_eq!(config.debounce, Duration::from_millis(350));
        assert_eq!(config.overlay_animation, Duration::from_millis(300));
        assert_eq!(config.permission_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_parts(Path::new("/tmp/home"), |key| match key {
            "INPUTLOCK_DEBOUNCE_MS" => Some("500".to_string()),
            "INPUTLOCK_OVERLAY_MS" => Some(" 0 ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert_eq!(config.overlay_animation, Duration::ZERO);
        assert_eq!(config.permission_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let err = Config::from_parts(Path::new("/tmp/home"), |key| {
            (key == "INPUTLOCK_PERMISSION_POLL_MS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("INPUTLOCK_PERMISSION_POLL_MS"));

        let zero = Config::from_parts(Path::new("/tmp/home"), |key| {
            (key == "INPUTLOCK_PERMISSION_POLL_MS").then(|| "0".to_string())
        });
        assert!(zero.is_err());
    }

    #[test]
    fn test_ensure_dirs() {
        let home = tempfile::tempdir().unwrap();
        let config = Config::from_parts(home.path(), |_| None).unwrap();
        config.ensure_dirs().unwrap();
        assert!(config.data_dir.is_dir());
    }
}
