#![allow(dead_code)]

use std::path::PathBuf;

use incbuild::config::{ConfigFile, ConfigSection, RawConfigFile, StepConfig, TaskConfig};
use incbuild::errors::BuildError;
use incbuild::types::{ArchiveKind, Phase, TargetType, TaskKindName, VcsMode};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Defaults match an in-memory layout: sources under `src`, outputs under
/// `build`, and a no-op compiler command.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.compiler.cmd = Some("true".to_string());
        Self { config }
    }

    pub fn source_dir(mut self, dir: &str) -> Self {
        self.config.config.source_dir = PathBuf::from(dir);
        self
    }

    pub fn output_dir(mut self, dir: &str) -> Self {
        self.config.config.output_dir = PathBuf::from(dir);
        self
    }

    pub fn history_file(mut self, path: &str) -> Self {
        self.config.config.history_file = PathBuf::from(path);
        self
    }

    pub fn compiler_cmd(mut self, cmd: Option<&str>) -> Self {
        self.config.compiler.cmd = cmd.map(str::to_string);
        self
    }

    /// Tweak `[config]` directly.
    pub fn configure(mut self, f: impl FnOnce(&mut ConfigSection)) -> Self {
        f(&mut self.config.config);
        self
    }

    pub fn step(mut self, phase: Phase, step: StepConfig) -> Self {
        self.config.steps_in_mut(phase).push(step);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile, BuildError> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            step: StepConfig::new(name),
        }
    }

    pub fn root(mut self, root: &str) -> Self {
        self.step.root = Some(PathBuf::from(root));
        self
    }

    pub fn include(mut self, patterns_str: &str) -> Self {
        self.step.include = Some(patterns_str.to_string());
        self
    }

    pub fn exclude(mut self, patterns_str: &str) -> Self {
        self.step.exclude = Some(patterns_str.to_string());
        self
    }

    pub fn include_regex(mut self, patterns_str: &str) -> Self {
        self.step.include_regex = Some(patterns_str.to_string());
        self
    }

    pub fn exclude_regex(mut self, patterns_str: &str) -> Self {
        self.step.exclude_regex = Some(patterns_str.to_string());
        self
    }

    pub fn vcs(mut self, mode: VcsMode) -> Self {
        self.step.vcs = Some(mode);
        self
    }

    pub fn task(mut self, task: TaskConfig) -> Self {
        self.step.task.push(task);
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(kind: TaskKindName) -> Self {
        Self {
            task: TaskConfig::new(kind),
        }
    }

    pub fn compile(target: &str) -> Self {
        Self::new(TaskKindName::Compile).target(target)
    }

    pub fn copy(target: &str) -> Self {
        Self::new(TaskKindName::Copy).target(target)
    }

    pub fn archive(kind: ArchiveKind, archive: &str, target: &str) -> Self {
        Self::new(TaskKindName::Archive)
            .archive_kind(kind)
            .archive_template(archive)
            .target(target)
    }

    pub fn upload(base_url: &str, target: &str) -> Self {
        Self::new(TaskKindName::Upload)
            .base_url(base_url)
            .target(target)
    }

    pub fn exec(cmd: &str) -> Self {
        Self::new(TaskKindName::Exec).cmd(cmd)
    }

    pub fn label(mut self, label: &str) -> Self {
        self.task.label = Some(label.to_string());
        self
    }

    pub fn include(mut self, patterns_str: &str) -> Self {
        self.task.include = Some(patterns_str.to_string());
        self
    }

    pub fn exclude(mut self, patterns_str: &str) -> Self {
        self.task.exclude = Some(patterns_str.to_string());
        self
    }

    pub fn include_regex(mut self, patterns_str: &str) -> Self {
        self.task.include_regex = Some(patterns_str.to_string());
        self
    }

    pub fn exclude_regex(mut self, patterns_str: &str) -> Self {
        self.task.exclude_regex = Some(patterns_str.to_string());
        self
    }

    pub fn target(mut self, target: &str) -> Self {
        self.task.target = Some(target.to_string());
        self
    }

    pub fn targets(mut self, targets: &[&str]) -> Self {
        self.task.targets = Some(targets.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn target_type(mut self, target_type: TargetType) -> Self {
        self.task.target_type = target_type;
        self
    }

    pub fn archive_template(mut self, archive: &str) -> Self {
        self.task.archive = Some(archive.to_string());
        self
    }

    pub fn archives(mut self, archives: &[&str]) -> Self {
        self.task.archives = Some(archives.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn archive_kind(mut self, kind: ArchiveKind) -> Self {
        self.task.archive_kind = Some(kind);
        self
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.task.base_url = Some(url.to_string());
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.task.cmd = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
