// src/plan/cleanup.rs

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::history::{BuildHistorySnapshot, SourceFile, TargetRecord};
use crate::task::{CleanupReason, Task};

/// Current target records per catalog path.
pub type TargetSets = BTreeMap<String, Vec<TargetRecord>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupFlags {
    /// Remove the outputs of source files that were deleted.
    pub mirror_deleted_source_file_to_output: bool,
    /// Remove outputs an existing file no longer resolves to.
    pub mirror_deleted_targets_to_output: bool,
}

impl Default for CleanupFlags {
    fn default() -> Self {
        Self {
            mirror_deleted_source_file_to_output: true,
            mirror_deleted_targets_to_output: true,
        }
    }
}

/// Outputs to remove, split by why they became obsolete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupPlan {
    pub deleted_sources: Vec<TargetRecord>,
    pub stale_targets: Vec<TargetRecord>,
}

impl CleanupPlan {
    pub fn is_empty(&self) -> bool {
        self.deleted_sources.is_empty() && self.stale_targets.is_empty()
    }

    /// Synthetic removal tasks, numbered from `first_index`. Empty batches
    /// produce no task.
    pub fn into_tasks(self, first_index: usize) -> Vec<Task> {
        let mut tasks = Vec::new();
        for (reason, records) in [
            (CleanupReason::DeletedSources, self.deleted_sources),
            (CleanupReason::StaleTargets, self.stale_targets),
        ] {
            if !records.is_empty() {
                tasks.push(Task::removal(first_index + tasks.len(), reason, records));
            }
        }
        tasks
    }
}

/// Diffs the previous build's outputs against the current ones.
pub struct CleanupPlanner<'a> {
    previous: &'a BuildHistorySnapshot,
    catalog: &'a [SourceFile],
    current: &'a TargetSets,
    flags: CleanupFlags,
}

impl<'a> CleanupPlanner<'a> {
    pub fn new(
        previous: &'a BuildHistorySnapshot,
        catalog: &'a [SourceFile],
        current: &'a TargetSets,
        flags: CleanupFlags,
    ) -> Self {
        Self {
            previous,
            catalog,
            current,
            flags,
        }
    }

    pub fn plan(&self) -> CleanupPlan {
        let present: HashSet<&str> = self.catalog.iter().map(|f| f.path.as_str()).collect();
        // Outputs some current file still produces are never removed, even
        // when they moved to another source.
        let claimed: HashSet<String> = self
            .current
            .values()
            .flatten()
            .map(TargetRecord::key)
            .collect();

        let mut plan = CleanupPlan::default();
        let mut seen_deleted = HashSet::new();
        let mut seen_stale = HashSet::new();

        for built in self.previous.iter() {
            if !present.contains(built.path.as_str()) {
                if self.flags.mirror_deleted_source_file_to_output {
                    for record in &built.targets {
                        let key = record.key();
                        if !claimed.contains(&key) && seen_deleted.insert(key) {
                            plan.deleted_sources.push(record.clone());
                        }
                    }
                }
                continue;
            }

            if !self.flags.mirror_deleted_targets_to_output {
                continue;
            }
            for record in &built.targets {
                let key = record.key();
                if !claimed.contains(&key) && seen_stale.insert(key) {
                    plan.stale_targets.push(record.clone());
                }
            }
        }

        debug!(
            deleted_sources = plan.deleted_sources.len(),
            stale_targets = plan.stale_targets.len(),
            "cleanup plan computed"
        );
        plan
    }
}
