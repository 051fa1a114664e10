#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

use incbuild::cancel::CancelToken;
use incbuild::config::ConfigFile;
use incbuild::fs::mock::MockFileSystem;
use incbuild::history::{
    BuildHistorySnapshot, BuiltFile, Dependencies, FileState, HistoryStore, SourceFile,
    TargetRecord,
};
use incbuild::pipeline::{BuildContext, TaskPipeline};
use incbuild::plan::EnvironmentSnapshot;
use incbuild_test_utils::fakes::{FakeCompiler, FakeVcs, RecordingArchiver};


pub type TestResult = Result<(), Box<dyn Error>>;

pub fn source(path: &str, state: FileState) -> SourceFile {
    SourceFile {
        path: path.to_string(),
        size: 10,
        last_write_ms: 1_000,
        hash: None,
        state,
    }
}

pub fn built(path: &str, targets: Vec<TargetRecord>, deps: Option<Dependencies>) -> BuiltFile {
    BuiltFile {
        path: path.to_string(),
        size: 10,
        last_write_ms: 1_000,
        hash: None,
        targets,
        dependencies: deps,
    }
}

pub fn history(files: Vec<BuiltFile>) -> BuildHistorySnapshot {
    BuildHistorySnapshot::from_files(files)
}

/// In-memory build: mock filesystem plus recording fakes.
pub struct Harness {
    pub fs: MockFileSystem,
    pub compiler: FakeCompiler,
    pub archiver: RecordingArchiver,
    pub vcs: FakeVcs,
    pub cancel: CancelToken,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            fs: MockFileSystem::new(),
            compiler: FakeCompiler::new(),
            archiver: RecordingArchiver::new(),
            vcs: FakeVcs::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_vcs(mut self, vcs: FakeVcs) -> Self {
        self.vcs = vcs;
        self
    }

    pub fn context(&self) -> BuildContext {
        BuildContext::new(
            Arc::new(self.fs.clone()),
            Arc::new(self.compiler.clone()),
            Arc::new(self.archiver.clone()),
            Arc::new(self.vcs.clone()),
        )
        .with_cancel(self.cancel.clone())
    }

    pub fn pipeline(&self, config: ConfigFile) -> TaskPipeline {
        TaskPipeline::new(config, self.context())
    }

    pub fn pipeline_with_env(&self, config: ConfigFile, env: EnvironmentSnapshot) -> TaskPipeline {
        self.pipeline(config).with_environment(env)
    }

    /// History as currently committed.
    pub fn history(&self, config: &ConfigFile) -> BuildHistorySnapshot {
        HistoryStore::new(config.config.history_file.clone())
            .load(&self.fs)
            .expect("history should load")
    }
}
