// src/task/step.rs

use std::path::PathBuf;

use crate::source::FileFilter;
use crate::task::Task;
use crate::types::{Phase, VcsMode};

/// An ordered list of tasks sharing one file set.
#[derive(Debug, Clone)]
pub struct BuildStep {
    pub name: String,
    pub phase: Phase,
    /// Scan root override (used when this is the first step of its phase).
    pub root: Option<PathBuf>,
    pub filter: FileFilter,
    pub vcs: Option<VcsMode>,
    pub tasks: Vec<Task>,
}

impl BuildStep {
    pub fn new(name: impl Into<String>, phase: Phase) -> Self {
        Self {
            name: name.into(),
            phase,
            root: None,
            filter: FileFilter::accept_all(),
            vcs: None,
            tasks: Vec::new(),
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn file_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_file_task())
    }
}
