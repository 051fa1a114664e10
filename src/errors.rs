// src/errors.rs

//! Crate-wide error types.
//!
//! - `ConfigError` is raised while validating the config, before any scan.
//! - `Execution` aggregates per-file task failures into one report.
//! - `Cancelled` and `RootIo` abort the build immediately.
//!
//! None of them lets the new build history be committed.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Build cancelled")]
    Cancelled,

    #[error("IO error on root directory {path:?}: {source}")]
    RootIo {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Build failed:\n{0}")]
    Execution(FailureReport),

    #[error("Build history error: {0}")]
    History(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    pub fn config(msg: impl Into<String>) -> Self {
        BuildError::ConfigError(msg.into())
    }

    pub fn root_io(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        BuildError::RootIo {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// One task failing against one file (or against the whole step, for
/// tasks that are not per-file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    pub step: String,
    pub task: String,
    pub task_index: usize,
    pub path: Option<String>,
    pub message: String,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step '{}' task #{} '{}'", self.step, self.task_index, self.task)?;
        if let Some(path) = &self.path {
            write!(f, " file '{path}'")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// All execution failures collected during a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    failures: Vec<ExecutionFailure>,
}

impl FailureReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: ExecutionFailure) {
        self.failures.push(failure);
    }

    pub fn extend(&mut self, failures: impl IntoIterator<Item = ExecutionFailure>) {
        self.failures.extend(failures);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[ExecutionFailure] {
        &self.failures
    }
}

impl IntoIterator for FailureReport {
    type Item = ExecutionFailure;
    type IntoIter = std::vec::IntoIter<ExecutionFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} failure(s)", self.failures.len())?;
        for failure in &self.failures {
            writeln!(f, "  - {failure}")?;
        }
        Ok(())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
