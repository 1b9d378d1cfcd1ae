//! Configuration loading and management

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::swap::SwapOptions;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Unix domain socket or named pipe for IPC
    pub ipc_endpoint: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Persisted key sequence
    pub settings_path: PathBuf,

    /// How long a rebind waits for a new combination
    pub capture_timeout: Duration,

    /// Clipboard swap tunables
    pub swap: SwapOptions,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("neither HOME nor USERPROFILE is set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("clipswap");

        let settings_path = data_dir.join("settings.json");

        #[cfg(unix)]
        let ipc_endpoint = data_dir.join("daemon.sock");
        #[cfg(windows)]
        let ipc_endpoint = PathBuf::from(r"\\.\pipe\clipswap");

        let capture_timeout =
            Duration::from_millis(env_or("CLIPSWAP_CAPTURE_TIMEOUT_MS", 3000u64)?);
        let swap = SwapOptions {
            delay: Duration::from_millis(env_or("CLIPSWAP_SWAP_DELAY_MS", 20u64)?),
            restore_on_empty_capture: env_or("CLIPSWAP_RESTORE_ON_EMPTY_CAPTURE", true)?,
        };

        Ok(Self {
            ipc_endpoint,
            data_dir,
            settings_path,
            capture_timeout,
            swap,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

/// Parse an environment override, falling back to `default` when unset
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", name, value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.data_dir.to_string_lossy().contains("clipswap"));
        assert!(config.settings_path.ends_with("settings.json"));
    }

    #[test]
    fn test_env_or_default_when_unset() {
        let value: u64 = env_or("CLIPSWAP_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_env_or_rejects_garbage() {
        std::env::set_var("CLIPSWAP_TEST_GARBAGE", "soon");
        assert!(env_or::<u64>("CLIPSWAP_TEST_GARBAGE", 1).is_err());
        std::env::remove_var("CLIPSWAP_TEST_GARBAGE");
    }
}
