// src/history/model.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ArchiveKind;

/// State of a scanned file relative to its previous build image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    /// No previous image exists for this path.
    Added,
    /// A previous image exists and differs per the enabled comparison modes.
    Replaced,
    /// A previous image exists and matches.
    Existing,
    /// Present in the previous build only. Never produced by the lister.
    Deleted,
}

impl FileState {
    pub fn is_changed(self) -> bool {
        matches!(self, FileState::Added | FileState::Replaced)
    }
}

/// One file found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the scanned root, `/`-separated. Unique per catalog.
    pub path: String,
    pub size: u64,
    pub last_write_ms: i64,
    pub hash: Option<String>,
    pub state: FileState,
}

impl SourceFile {
    /// Directory part of `path` (empty for root-level files).
    pub fn directory(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }

    /// Base name of `path`.
    pub fn file_name(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[idx + 1..],
            None => &self.path,
        }
    }
}

/// One resolved output location of a source file.
///
/// The derived ordering and hashing match [`TargetRecord::key`], so sets of
/// records can be diffed directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetRecord {
    Copy {
        path: String,
    },
    ArchiveEntry {
        container: String,
        kind: ArchiveKind,
        entry: String,
    },
    Remote {
        url: String,
    },
}

impl TargetRecord {
    pub fn copy(path: impl Into<String>) -> Self {
        TargetRecord::Copy { path: path.into() }
    }

    pub fn archive_entry(
        container: impl Into<String>,
        kind: ArchiveKind,
        entry: impl Into<String>,
    ) -> Self {
        TargetRecord::ArchiveEntry {
            container: container.into(),
            kind,
            entry: entry.into(),
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        TargetRecord::Remote { url: url.into() }
    }

    /// Stable identity used for set difference.
    pub fn key(&self) -> String {
        match self {
            TargetRecord::Copy { path } => format!("copy:{path}"),
            TargetRecord::ArchiveEntry {
                container,
                kind,
                entry,
            } => format!("archive:{kind}:{container}!{entry}"),
            TargetRecord::Remote { url } => format!("remote:{url}"),
        }
    }
}

impl fmt::Display for TargetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A schema entity a compiled artifact was built against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatabaseReference {
    Table { name: String, crc: String },
    Sequence { name: String },
}

impl DatabaseReference {
    pub fn table(name: impl Into<String>, crc: impl Into<String>) -> Self {
        DatabaseReference::Table {
            name: name.into(),
            crc: crc.into(),
        }
    }

    pub fn sequence(name: impl Into<String>) -> Self {
        DatabaseReference::Sequence { name: name.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            DatabaseReference::Table { name, .. } | DatabaseReference::Sequence { name } => name,
        }
    }
}

/// What a compiled artifact depends on besides its own source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    /// Source paths (catalog keys) read while compiling, e.g. include files.
    #[serde(default)]
    pub required_files: Vec<String>,
    #[serde(default)]
    pub required_references: Vec<DatabaseReference>,
}

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.required_files.is_empty() && self.required_references.is_empty()
    }
}

/// Persisted record of a file as of the end of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltFile {
    pub path: String,
    pub size: u64,
    pub last_write_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub targets: Vec<TargetRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
}

impl BuiltFile {
    pub fn from_source(
        file: &SourceFile,
        targets: Vec<TargetRecord>,
        dependencies: Option<Dependencies>,
    ) -> Self {
        Self {
            path: file.path.clone(),
            size: file.size,
            last_write_ms: file.last_write_ms,
            hash: file.hash.clone(),
            targets,
            dependencies,
        }
    }

    pub fn required_files(&self) -> &[String] {
        self.dependencies
            .as_ref()
            .map(|d| d.required_files.as_slice())
            .unwrap_or_default()
    }

    pub fn required_references(&self) -> &[DatabaseReference] {
        self.dependencies
            .as_ref()
            .map(|d| d.required_references.as_slice())
            .unwrap_or_default()
    }
}

/// Map of path to [`BuiltFile`] for one build.
///
/// The previous snapshot is only ever read during a build; the next one is
/// assembled separately and swapped in by the history store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildHistorySnapshot {
    files: BTreeMap<String, BuiltFile>,
}

impl BuildHistorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files(files: impl IntoIterator<Item = BuiltFile>) -> Self {
        Self {
            files: files.into_iter().map(|f| (f.path.clone(), f)).collect(),
        }
    }

    /// Previous image of `path`, if it was part of the build.
    pub fn get(&self, path: &str) -> Option<&BuiltFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in path order.
    pub fn iter(&self) -> impl Iterator<Item = &BuiltFile> {
        self.files.values()
    }
}
