//! Persisted user settings
//!
//! Holds the bound key sequence in `settings.json`. Read once at startup
//! and written only when a client asks to save the current binding.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::hotkey::KeyCombination;

const DEFAULT_SEQUENCE: &str = "Ctrl+b";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Key sequence in textual form, e.g. `Ctrl+Shift+K`
    #[serde(default = "default_sequence")]
    pub sequence: String,
}

fn default_sequence() -> String {
    DEFAULT_SEQUENCE.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sequence: default_sequence(),
        }
    }
}

impl Settings {
    /// Load settings, using defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Write settings atomically so readers never see a partial file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("failed to create settings directory")?;
        }

        let json = serde_json::to_vec_pretty(self)?;
        let mut file = AtomicWriteFile::options()
            .open(path)
            .with_context(|| format!("failed to open {} for atomic write", path.display()))?;
        file.write_all(&json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        file.commit()
            .with_context(|| format!("failed to replace {}", path.display()))?;

        info!(?path, sequence = %self.sequence, "settings saved");
        Ok(())
    }

    /// The stored combination, or the default when it cannot be used
    pub fn combination(&self) -> KeyCombination {
        let parsed = self
            .sequence
            .parse::<KeyCombination>()
            .and_then(|combo| combo.validate().map(|()| combo));

        match parsed {
            Ok(combo) => combo,
            Err(e) => {
                warn!(sequence = %self.sequence, %e, "stored key sequence unusable, using default");
                KeyCombination::default()
            }
        }
    }
}
