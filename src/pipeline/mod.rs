// src/pipeline/mod.rs

//! Build orchestration.
//!
//! - [`runner`]: `TaskPipeline`, which loads the history, plans the
//!   incremental work, runs the phases and commits the new history.
//! - [`executor`]: per-phase step execution (configure, execute, finalize).
//! - [`report`]: what a build did, for the CLI summary and tests.

pub mod executor;
pub mod report;
pub mod runner;

use std::sync::Arc;

use anyhow::bail;

use crate::cancel::CancelToken;
use crate::config::ConfigFile;
use crate::errors::Result;
use crate::exec::{
    Archiver, CommandCompiler, CompileRequest, Compiler, GitFilter, LocalArchiver,
    VersionControlFilter,
};
use crate::fs::FileSystem;
use crate::history::Dependencies;

pub use report::{BuildReport, StepReport, TaskReport};
pub use runner::{current_targets, TaskPipeline};

/// The collaborators a build runs against.
#[derive(Clone)]
pub struct BuildContext {
    pub fs: Arc<dyn FileSystem>,
    pub compiler: Arc<dyn Compiler>,
    pub archiver: Arc<dyn Archiver>,
    pub vcs: Arc<dyn VersionControlFilter>,
    pub cancel: CancelToken,
}

impl BuildContext {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        compiler: Arc<dyn Compiler>,
        archiver: Arc<dyn Archiver>,
        vcs: Arc<dyn VersionControlFilter>,
    ) -> Self {
        Self {
            fs,
            compiler,
            archiver,
            vcs,
            cancel: CancelToken::new(),
        }
    }

    /// Local collaborators: the `[compiler]` command, plain-file archiver and
    /// `git`.
    pub fn local(config: &ConfigFile, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let compiler: Arc<dyn Compiler> = if config.compiler.cmd.is_some() {
            Arc::new(CommandCompiler::from_section(&config.compiler, Arc::clone(&fs))?)
        } else {
            Arc::new(NoCompiler)
        };
        let archiver = Arc::new(LocalArchiver::new(Arc::clone(&fs)));
        let vcs = Arc::new(GitFilter::new(config.config.vcs_base.clone()));
        Ok(Self::new(fs, compiler, archiver, vcs))
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Stand-in for configs without compile tasks.
struct NoCompiler;

impl Compiler for NoCompiler {
    fn compile(&self, request: &CompileRequest) -> anyhow::Result<Option<Dependencies>> {
        bail!("no compiler configured for '{}'", request.path)
    }
}
