// src/task/mod.rs

//! Validated, immutable tasks and the steps that group them.

pub mod step;

use crate::history::TargetRecord;
use crate::source::FileFilter;
use crate::target::Template;
use crate::types::{ArchiveKind, TargetType};

pub use step::BuildStep;

/// What a task needs from its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub include_exclude: bool,
    pub single_target: bool,
    pub archive_target: bool,
}

/// Why a synthetic removal task was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    /// Outputs of source files that no longer exist.
    DeletedSources,
    /// Outputs a still-existing file no longer resolves to.
    StaleTargets,
}

impl CleanupReason {
    pub fn label(self) -> &'static str {
        match self {
            CleanupReason::DeletedSources => "cleanup:deleted-sources",
            CleanupReason::StaleTargets => "cleanup:stale-targets",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Compile matching files through the compiler collaborator.
    Compile,
    /// Copy matching files to every resolved location.
    Copy,
    /// Put matching files into archive containers.
    Archive { kind: ArchiveKind },
    /// Upload matching files below `base_url`.
    Upload { base_url: String },
    /// Run a shell command once, in the phase root.
    Exec { cmd: String },
    /// Remove a fixed batch of outputs. Only built by the cleanup planner.
    Remove {
        reason: CleanupReason,
        records: Vec<TargetRecord>,
    },
}

impl TaskKind {
    pub fn capabilities(&self) -> Capabilities {
        match self {
            TaskKind::Compile | TaskKind::Copy | TaskKind::Upload { .. } => Capabilities {
                include_exclude: true,
                single_target: true,
                archive_target: false,
            },
            TaskKind::Archive { .. } => Capabilities {
                include_exclude: true,
                single_target: true,
                archive_target: true,
            },
            TaskKind::Exec { .. } | TaskKind::Remove { .. } => Capabilities {
                include_exclude: false,
                single_target: false,
                archive_target: false,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Compile => "compile",
            TaskKind::Copy => "copy",
            TaskKind::Archive { .. } => "archive",
            TaskKind::Upload { .. } => "upload",
            TaskKind::Exec { .. } => "exec",
            TaskKind::Remove { .. } => "remove",
        }
    }
}

/// A validated task. Matchers and templates are compiled once and never
/// change afterwards.
#[derive(Debug, Clone)]
pub struct Task {
    label: String,
    index: usize,
    kind: TaskKind,
    filter: FileFilter,
    targets: Vec<Template>,
    target_type: TargetType,
    archives: Vec<Template>,
}

impl Task {
    pub fn new(label: impl Into<String>, index: usize, kind: TaskKind) -> Self {
        Self {
            label: label.into(),
            index,
            kind,
            filter: FileFilter::accept_all(),
            targets: Vec::new(),
            target_type: TargetType::default(),
            archives: Vec::new(),
        }
    }

    /// Synthetic task removing `records`.
    pub fn removal(index: usize, reason: CleanupReason, records: Vec<TargetRecord>) -> Self {
        Self::new(reason.label(), index, TaskKind::Remove { reason, records })
    }

    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_targets(mut self, targets: Vec<Template>, target_type: TargetType) -> Self {
        self.targets = targets;
        self.target_type = target_type;
        self
    }

    pub fn with_archives(mut self, archives: Vec<Template>) -> Self {
        self.archives = archives;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    /// Tasks that act on individual files and produce target records.
    pub fn is_file_task(&self) -> bool {
        self.capabilities().single_target
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    pub fn targets(&self) -> &[Template] {
        &self.targets
    }

    pub fn target_type(&self) -> TargetType {
        self.target_type
    }

    pub fn archives(&self) -> &[Template] {
        &self.archives
    }

    pub fn matches(&self, path: &str) -> bool {
        self.is_file_task() && self.filter.matches(path)
    }
}
