// src/source/lister.rs

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, trace};

use crate::cancel::CancelToken;
use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::history::{BuildHistorySnapshot, BuiltFile, FileState, SourceFile};
use crate::source::filter::{passes_vcs, FileFilter};
use crate::source::hash::compute_file_hash;
use crate::source::path::relative_str;

/// Which file properties decide between `Existing` and `Replaced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonModes {
    pub size: bool,
    pub mtime: bool,
    /// Content hashing. Opt-in: every scanned file gets read in full.
    pub hash: bool,
}

impl Default for ComparisonModes {
    fn default() -> Self {
        Self {
            size: true,
            mtime: true,
            hash: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Read size and mtime (and the hash, if enabled) for every file.
    pub with_metadata: bool,
    pub compare: ComparisonModes,
}

/// Recursive directory scanner producing an ordered catalog.
///
/// Symlinks are never followed. Paths that existed in the previous build but
/// are gone now are not reported; callers diff against the history for that.
#[derive(Debug, Clone, Copy)]
pub struct SourceLister<'a> {
    fs: &'a dyn FileSystem,
    root: &'a Path,
    filter: Option<&'a FileFilter>,
    vcs: Option<&'a HashSet<String>>,
    previous: Option<&'a BuildHistorySnapshot>,
    options: ListOptions,
}

impl<'a> SourceLister<'a> {
    pub fn new(fs: &'a dyn FileSystem, root: &'a Path) -> Self {
        Self {
            fs,
            root,
            filter: None,
            vcs: None,
            previous: None,
            options: ListOptions::default(),
        }
    }

    pub fn with_filter(mut self, filter: &'a FileFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Only keep paths reported by the version-control collaborator.
    pub fn with_vcs(mut self, paths: &'a HashSet<String>) -> Self {
        self.vcs = Some(paths);
        self
    }

    pub fn with_previous(mut self, previous: &'a BuildHistorySnapshot) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn with_options(mut self, options: ListOptions) -> Self {
        self.options = options;
        self
    }

    /// Scan the root. A missing root yields an empty catalog.
    pub fn list(&self, cancel: &CancelToken) -> Result<Vec<SourceFile>> {
        if !self.fs.exists(self.root) {
            debug!(root = ?self.root, "scan root does not exist; empty catalog");
            return Ok(Vec::new());
        }
        if !self.fs.is_dir(self.root) {
            return Err(BuildError::root_io(
                self.root,
                anyhow::anyhow!("scan root is not a directory"),
            ));
        }

        let mut files = Vec::new();
        let mut stack = vec![self.root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            cancel.check()?;

            let entries = self.fs.read_dir(&dir).map_err(|e| {
                if dir == self.root {
                    BuildError::root_io(self.root, e)
                } else {
                    BuildError::Other(e)
                }
            })?;

            for path in entries {
                if self.fs.is_symlink(&path) {
                    trace!(?path, "skipping symlink");
                    continue;
                }
                if self.fs.is_dir(&path) {
                    stack.push(path);
                    continue;
                }
                if !self.fs.is_file(&path) {
                    continue;
                }
                let Some(rel) = relative_str(self.root, &path) else {
                    continue;
                };
                if !self.filter.is_none_or(|f| f.matches(&rel)) || !passes_vcs(&rel, self.vcs) {
                    continue;
                }
                files.push(self.describe(&path, rel)?);
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(root = ?self.root, files = files.len(), "scan complete");
        Ok(files)
    }

    fn describe(&self, path: &Path, rel: String) -> Result<SourceFile> {
        let previous = self.previous.and_then(|p| p.get(&rel));

        if !self.options.with_metadata {
            let state = if previous.is_some() {
                FileState::Existing
            } else {
                FileState::Added
            };
            return Ok(SourceFile {
                path: rel,
                size: 0,
                last_write_ms: 0,
                hash: None,
                state,
            });
        }

        let meta = self.fs.metadata(path)?;
        let hash = if self.options.compare.hash {
            Some(compute_file_hash(self.fs, path)?)
        } else {
            None
        };

        let mut file = SourceFile {
            path: rel,
            size: meta.size,
            last_write_ms: meta.modified_ms,
            hash,
            state: FileState::Added,
        };
        file.state = compute_state(&file, previous, self.options.compare);
        Ok(file)
    }
}

/// State of `current` against its previous image.
pub fn compute_state(
    current: &SourceFile,
    previous: Option<&BuiltFile>,
    compare: ComparisonModes,
) -> FileState {
    let Some(prev) = previous else {
        return FileState::Added;
    };

    let hash_differs = compare.hash
        && match (&current.hash, &prev.hash) {
            (Some(now), Some(then)) => now != then,
            _ => true,
        };
    let mtime_differs = compare.mtime && current.last_write_ms != prev.last_write_ms;
    let size_differs = compare.size && current.size != prev.size;

    if hash_differs || mtime_differs || size_differs {
        FileState::Replaced
    } else {
        FileState::Existing
    }
}
