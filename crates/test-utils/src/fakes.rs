#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use incbuild::cancel::CancelToken;
use incbuild::exec::{Archiver, CompileRequest, Compiler, VersionControlFilter};
use incbuild::history::Dependencies;
use incbuild::types::{ArchiveKind, VcsMode};

/// A fake compiler that:
/// - records which paths were compiled (in call order)
/// - fails for configured paths
/// - returns configured dependency metadata
/// - can trip a cancel token on its first call
#[derive(Clone, Default)]
pub struct FakeCompiler {
    compiled: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    deps: Arc<Mutex<HashMap<String, Dependencies>>>,
    cancel_on_compile: Arc<Mutex<Option<CancelToken>>>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn with_dependencies(&self, path: &str, deps: Dependencies) {
        self.deps.lock().unwrap().insert(path.to_string(), deps);
    }

    pub fn cancel_on_compile(&self, token: CancelToken) {
        *self.cancel_on_compile.lock().unwrap() = Some(token);
    }

    /// Compiled paths, sorted (workers may run in any order).
    pub fn compiled(&self) -> Vec<String> {
        let mut out = self.compiled.lock().unwrap().clone();
        out.sort();
        out
    }

    pub fn reset(&self) {
        self.compiled.lock().unwrap().clear();
    }
}

impl Compiler for FakeCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<Option<Dependencies>> {
        if let Some(token) = self.cancel_on_compile.lock().unwrap().as_ref() {
            token.cancel();
        }
        self.compiled.lock().unwrap().push(request.path.clone());
        if self.failing.lock().unwrap().contains(&request.path) {
            bail!("syntax error in {}", request.path);
        }
        Ok(self.deps.lock().unwrap().get(&request.path).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiverOp {
    Copy { source: PathBuf, target: String },
    WriteEntries { container: String, kind: ArchiveKind, entries: Vec<String> },
    Upload { source: PathBuf, url: String },
    RemoveFiles(Vec<String>),
    RemoveEntries { container: String, kind: ArchiveKind, entries: Vec<String> },
    RemoveRemote(Vec<String>),
}

/// An archiver that only records what it was asked to do.
#[derive(Clone, Default)]
pub struct RecordingArchiver {
    ops: Arc<Mutex<Vec<ArchiverOp>>>,
    failing_targets: Arc<Mutex<HashSet<String>>>,
}

impl RecordingArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make copies/uploads to `target` (or writes to container `target`) fail.
    pub fn fail_on(&self, target: &str) {
        self.failing_targets.lock().unwrap().insert(target.to_string());
    }

    pub fn ops(&self) -> Vec<ArchiverOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn removed_files(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                ArchiverOp::RemoveFiles(paths) => Some(paths),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn copied_targets(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                ArchiverOp::Copy { target, .. } => Some(target),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    fn record(&self, op: ArchiverOp, target: &str) -> Result<()> {
        self.ops.lock().unwrap().push(op);
        if self.failing_targets.lock().unwrap().contains(target) {
            bail!("write to {target} failed");
        }
        Ok(())
    }
}

impl Archiver for RecordingArchiver {
    fn copy_file(&self, source: &Path, target: &str) -> Result<()> {
        self.record(
            ArchiverOp::Copy {
                source: source.to_path_buf(),
                target: target.to_string(),
            },
            target,
        )
    }

    fn write_entries(
        &self,
        container: &str,
        kind: ArchiveKind,
        entries: &[(String, PathBuf)],
    ) -> Result<()> {
        self.record(
            ArchiverOp::WriteEntries {
                container: container.to_string(),
                kind,
                entries: entries.iter().map(|(e, _)| e.clone()).collect(),
            },
            container,
        )
    }

    fn upload(&self, source: &Path, url: &str) -> Result<()> {
        self.record(
            ArchiverOp::Upload {
                source: source.to_path_buf(),
                url: url.to_string(),
            },
            url,
        )
    }

    fn remove_files(&self, paths: &[String]) -> Result<()> {
        self.record(ArchiverOp::RemoveFiles(paths.to_vec()), "")
    }

    fn remove_entries(&self, container: &str, kind: ArchiveKind, entries: &[String]) -> Result<()> {
        self.record(
            ArchiverOp::RemoveEntries {
                container: container.to_string(),
                kind,
                entries: entries.to_vec(),
            },
            container,
        )
    }

    fn remove_remote(&self, urls: &[String]) -> Result<()> {
        self.record(ArchiverOp::RemoveRemote(urls.to_vec()), "")
    }
}

/// Version control filter answering from fixed sets.
#[derive(Clone, Default)]
pub struct FakeVcs {
    modified: HashSet<String>,
    branch: HashSet<String>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modified(mut self, paths: &[&str]) -> Self {
        self.modified = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn branch(mut self, paths: &[&str]) -> Self {
        self.branch = paths.iter().map(|p| p.to_string()).collect();
        self
    }
}

impl VersionControlFilter for FakeVcs {
    fn changed_paths(&self, _root: &Path, mode: VcsMode) -> Result<HashSet<String>> {
        Ok(match mode {
            VcsMode::Modified => self.modified.clone(),
            VcsMode::Branch => self.branch.clone(),
        })
    }
}
