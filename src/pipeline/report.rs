// src/pipeline/report.rs

use std::fmt;

use crate::plan::{CleanupPlan, RebuildPlan};
use crate::types::Phase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub label: String,
    pub kind: &'static str,
    /// Files (or, for removal tasks, records) the task acted on.
    pub processed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub phase: Phase,
    pub name: String,
    pub files: usize,
    pub tasks: Vec<TaskReport>,
}

/// What one build did.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub dry_run: bool,
    pub catalog_files: usize,
    pub rebuild: RebuildPlan,
    pub cleanup: CleanupPlan,
    pub steps: Vec<StepReport>,
    pub history_written: bool,
}

impl BuildReport {
    pub fn step(&self, phase: Phase, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.phase == phase && s.name == name)
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "incbuild dry-run")?;
        }
        writeln!(
            f,
            "catalog: {} file(s), rebuild: {} file(s)",
            self.catalog_files,
            self.rebuild.len()
        )?;
        for planned in self.rebuild.iter() {
            writeln!(f, "  rebuild {} ({})", planned.path, planned.reason)?;
        }
        for record in &self.cleanup.deleted_sources {
            writeln!(f, "  remove {record} (source deleted)")?;
        }
        for record in &self.cleanup.stale_targets {
            writeln!(f, "  remove {record} (stale target)")?;
        }
        for step in &self.steps {
            writeln!(f, "[{}] {}: {} file(s)", step.phase, step.name, step.files)?;
            for task in &step.tasks {
                writeln!(
                    f,
                    "    {} ({}): {} processed, {} failed",
                    task.label, task.kind, task.processed, task.failed
                )?;
            }
        }
        Ok(())
    }
}
