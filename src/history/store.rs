// src/history/store.rs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::history::model::{BuildHistorySnapshot, BuiltFile};

/// Schema version written into every history document.
pub const HISTORY_SCHEMA_VERSION: u32 = 1;

/// Default location of the history file, relative to the config directory.
pub const HISTORY_FILE_PATH: &str = ".incbuild/history.json";

#[derive(Debug, Serialize, Deserialize)]
struct HistoryDocument {
    version: u32,
    files: Vec<BuiltFile>,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Reads and atomically replaces the persisted build history.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Load the previous build history.
    ///
    /// A missing file is an empty history. A document written with another
    /// schema version is discarded with a warning, which makes the next build
    /// a full one.
    pub fn load(&self, fs: &dyn FileSystem) -> Result<BuildHistorySnapshot> {
        if !fs.exists(&self.path) {
            debug!(path = ?self.path, "no build history yet");
            return Ok(BuildHistorySnapshot::new());
        }

        let contents = fs.read_to_string(&self.path)?;

        let probe: VersionProbe = serde_json::from_str(&contents).map_err(|e| {
            BuildError::History(format!("malformed history {:?}: {e}", self.path))
        })?;
        if probe.version != HISTORY_SCHEMA_VERSION {
            warn!(
                path = ?self.path,
                found = probe.version,
                expected = HISTORY_SCHEMA_VERSION,
                "ignoring build history with unsupported schema version"
            );
            return Ok(BuildHistorySnapshot::new());
        }

        let doc: HistoryDocument = serde_json::from_str(&contents).map_err(|e| {
            BuildError::History(format!("malformed history {:?}: {e}", self.path))
        })?;

        info!(path = ?self.path, files = doc.files.len(), "loaded build history");
        Ok(BuildHistorySnapshot::from_files(doc.files))
    }

    /// Persist `snapshot`, replacing the previous history in one rename.
    pub fn save(&self, fs: &dyn FileSystem, snapshot: &BuildHistorySnapshot) -> Result<()> {
        let doc = HistoryDocument {
            version: HISTORY_SCHEMA_VERSION,
            files: snapshot.iter().cloned().collect(),
        };
        let contents = serde_json::to_string_pretty(&doc)
            .map_err(|e| BuildError::History(format!("serializing history: {e}")))?;

        let temp = self.temp_path();
        fs.write(&temp, contents.as_bytes())?;
        fs.rename(&temp, &self.path)?;

        info!(path = ?self.path, files = snapshot.len(), "committed build history");
        Ok(())
    }
}
