// src/plan/incremental.rs

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::history::{BuildHistorySnapshot, DatabaseReference, FileState, SourceFile, TargetRecord};

/// Current state of the database schema the sources are compiled against.
///
/// Passed in explicitly by the caller; loaded from a TOML file by the CLI:
///
/// ```toml
/// sequences = ["next_order"]
///
/// [tables]
/// "sports.customer" = "13452"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvironmentSnapshot {
    #[serde(default)]
    tables: BTreeMap<String, String>,
    #[serde(default)]
    sequences: BTreeSet<String>,
}

impl EnvironmentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, crc: impl Into<String>) -> Self {
        self.tables.insert(name.into(), crc.into());
        self
    }

    pub fn with_sequence(mut self, name: impl Into<String>) -> Self {
        self.sequences.insert(name.into());
        self
    }

    pub fn table_crc(&self, name: &str) -> Option<&str> {
        self.tables.get(name).map(String::as_str)
    }

    pub fn has_sequence(&self, name: &str) -> bool {
        self.sequences.contains(name)
    }

    /// Read a snapshot from a TOML file.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let contents = fs.read_to_string(path)?;
        let env: EnvironmentSnapshot = toml::from_str(&contents)?;
        debug!(
            ?path,
            tables = env.tables.len(),
            sequences = env.sequences.len(),
            "loaded environment snapshot"
        );
        Ok(env)
    }

    /// Why `reference` no longer holds in this environment, if it doesn't.
    pub fn stale_reason(&self, reference: &DatabaseReference) -> Option<RebuildReason> {
        match reference {
            DatabaseReference::Table { name, crc } => match self.table_crc(name) {
                Some(current) if current == crc => None,
                _ => Some(RebuildReason::TableChanged { name: name.clone() }),
            },
            DatabaseReference::Sequence { name } => {
                if self.has_sequence(name) {
                    None
                } else {
                    Some(RebuildReason::SequenceMissing { name: name.clone() })
                }
            }
        }
    }
}

/// Why a file was put in the rebuild set. The first reason found wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    Added,
    Replaced,
    FullRebuild,
    TableChanged { name: String },
    SequenceMissing { name: String },
    DependencyChanged { dependency: String },
    TargetsChanged,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::Added => f.write_str("added"),
            RebuildReason::Replaced => f.write_str("replaced"),
            RebuildReason::FullRebuild => f.write_str("full rebuild"),
            RebuildReason::TableChanged { name } => write!(f, "table '{name}' changed"),
            RebuildReason::SequenceMissing { name } => write!(f, "sequence '{name}' missing"),
            RebuildReason::DependencyChanged { dependency } => {
                write!(f, "dependency '{dependency}' changed")
            }
            RebuildReason::TargetsChanged => f.write_str("targets changed"),
        }
    }
}

/// Computes a file's target set from the live task configuration.
pub trait TargetOracle {
    fn targets_for(&self, file: &SourceFile) -> Vec<TargetRecord>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanFlags {
    pub full_rebuild: bool,
    /// Also rebuild files whose resolved targets differ from the recorded ones.
    pub rebuild_files_with_new_targets: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub path: String,
    pub reason: RebuildReason,
}

/// The rebuild set, in catalog order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildPlan {
    entries: Vec<PlannedFile>,
    index: HashSet<String>,
}

impl RebuildPlan {
    fn push(&mut self, path: &str, reason: RebuildReason) {
        if self.index.insert(path.to_string()) {
            self.entries.push(PlannedFile {
                path: path.to_string(),
                reason,
            });
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedFile> {
        self.entries.iter()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.path.as_str()).collect()
    }

    pub fn reason_of(&self, path: &str) -> Option<&RebuildReason> {
        self.entries.iter().find(|e| e.path == path).map(|e| &e.reason)
    }
}

/// Decides which files of the current catalog must be rebuilt.
///
/// Runs a bounded number of passes:
/// 1. changed files (or everything on a full rebuild),
/// 2. files built against a table/sequence that changed,
/// 3. files requiring a file selected by 1-2 (one level only),
/// 4. optionally, files whose target set changed.
pub struct IncrementalPlanner<'a> {
    catalog: &'a [SourceFile],
    history: &'a BuildHistorySnapshot,
    env: &'a EnvironmentSnapshot,
    flags: PlanFlags,
    oracle: Option<&'a dyn TargetOracle>,
}

impl<'a> IncrementalPlanner<'a> {
    pub fn new(
        catalog: &'a [SourceFile],
        history: &'a BuildHistorySnapshot,
        env: &'a EnvironmentSnapshot,
        flags: PlanFlags,
    ) -> Self {
        Self {
            catalog,
            history,
            env,
            flags,
            oracle: None,
        }
    }

    /// Source of live target sets for the targets-changed pass.
    pub fn with_target_oracle(mut self, oracle: &'a dyn TargetOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn plan(&self, cancel: &CancelToken) -> Result<RebuildPlan> {
        cancel.check()?;

        let mut plan = RebuildPlan::default();

        if self.flags.full_rebuild {
            for file in self.catalog {
                plan.push(&file.path, RebuildReason::FullRebuild);
            }
            info!(files = plan.len(), "full rebuild requested");
            return Ok(plan);
        }

        let mut selected: HashMap<&str, RebuildReason> = HashMap::new();

        for file in self.catalog {
            match file.state {
                FileState::Added => {
                    selected.insert(&file.path, RebuildReason::Added);
                }
                FileState::Replaced => {
                    selected.insert(&file.path, RebuildReason::Replaced);
                }
                FileState::Existing | FileState::Deleted => {}
            }
        }

        for file in self.catalog {
            if selected.contains_key(file.path.as_str()) {
                continue;
            }
            let Some(built) = self.history.get(&file.path) else {
                continue;
            };
            if let Some(reason) = built
                .required_references()
                .iter()
                .find_map(|r| self.env.stale_reason(r))
            {
                debug!(path = %file.path, %reason, "environment drift");
                selected.insert(&file.path, reason);
            }
        }

        cancel.check()?;

        let seeded: HashSet<&str> = selected.keys().copied().collect();
        for file in self.catalog {
            if selected.contains_key(file.path.as_str()) {
                continue;
            }
            let Some(built) = self.history.get(&file.path) else {
                continue;
            };
            // Required files that are gone from the catalog never appear in
            // `seeded`, so stale pointers drop out here.
            if let Some(dep) = built
                .required_files()
                .iter()
                .find(|dep| seeded.contains(dep.as_str()))
            {
                debug!(path = %file.path, dependency = %dep, "dependency changed");
                selected.insert(
                    &file.path,
                    RebuildReason::DependencyChanged {
                        dependency: dep.clone(),
                    },
                );
            }
        }

        if self.flags.rebuild_files_with_new_targets {
            if let Some(oracle) = self.oracle {
                cancel.check()?;
                for file in self.catalog {
                    if selected.contains_key(file.path.as_str()) {
                        continue;
                    }
                    let Some(built) = self.history.get(&file.path) else {
                        continue;
                    };
                    let now: BTreeSet<String> =
                        oracle.targets_for(file).iter().map(TargetRecord::key).collect();
                    let then: BTreeSet<String> =
                        built.targets.iter().map(TargetRecord::key).collect();
                    if now != then {
                        debug!(path = %file.path, "target set changed");
                        selected.insert(&file.path, RebuildReason::TargetsChanged);
                    }
                }
            }
        }

        for file in self.catalog {
            if let Some(reason) = selected.remove(file.path.as_str()) {
                plan.push(&file.path, reason);
            }
        }

        info!(
            catalog = self.catalog.len(),
            rebuild = plan.len(),
            "incremental plan computed"
        );
        Ok(plan)
    }
}
