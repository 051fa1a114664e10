// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::history::HISTORY_FILE_PATH;
use crate::plan::{CleanupFlags, PlanFlags};
use crate::source::{ComparisonModes, PatternPolicy};
use crate::task::{BuildStep, TaskKind};
use crate::types::{ArchiveKind, Phase, TargetType, TaskKindName, VcsMode};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// source_dir = "src"
/// output_dir = "build"
///
/// [compiler]
/// cmd = "compile {source} {targets}"
///
/// [[build_source]]
/// name = "compile"
/// include = "*.p;*.w"
///
/// [[build_source.task]]
/// kind = "compile"
/// target = "<FILE_SOURCE_DIRECTORY>"
/// ```
///
/// Every section is optional. Steps run in phase order, then in the order
/// they are declared.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub compiler: CompilerSection,

    #[serde(default)]
    pub pre_build: Vec<StepConfig>,

    #[serde(default)]
    pub build_source: Vec<StepConfig>,

    #[serde(default)]
    pub build_output: Vec<StepConfig>,

    #[serde(default)]
    pub post_build: Vec<StepConfig>,
}

impl RawConfigFile {
    pub fn steps_in(&self, phase: Phase) -> &[StepConfig] {
        match phase {
            Phase::PreBuild => &self.pre_build,
            Phase::BuildSource => &self.build_source,
            Phase::BuildOutput => &self.build_output,
            Phase::PostBuild => &self.post_build,
        }
    }

    pub fn steps_in_mut(&mut self, phase: Phase) -> &mut Vec<StepConfig> {
        match phase {
            Phase::PreBuild => &mut self.pre_build,
            Phase::BuildSource => &mut self.build_source,
            Phase::BuildOutput => &mut self.build_output,
            Phase::PostBuild => &mut self.post_build,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Root scanned by pre-build and build-source steps.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Where non-rooted targets land; scanned by build-output and post-build.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,

    #[serde(default)]
    pub full_rebuild: bool,

    #[serde(default)]
    pub rebuild_files_with_new_targets: bool,

    #[serde(default = "default_true")]
    pub mirror_deleted_source_file_to_output: bool,

    #[serde(default = "default_true")]
    pub mirror_deleted_targets_to_output: bool,

    #[serde(default = "default_true")]
    pub compare_size: bool,

    #[serde(default = "default_true")]
    pub compare_mtime: bool,

    /// Content hashing is opt-in; it reads every file on each scan.
    #[serde(default)]
    pub compare_hash: bool,

    #[serde(default = "default_true")]
    pub case_sensitive: bool,

    /// Treat `\` in wildcard patterns as `/`.
    #[serde(default = "default_true")]
    pub normalize_separators: bool,

    /// Compile files independently across a worker pool. When off, compile
    /// runs on one worker and stops at its first failure.
    #[serde(default = "default_true")]
    pub process_isolation: bool,

    #[serde(default = "default_workers_per_core")]
    pub workers_per_core: f64,

    #[serde(default = "default_min_files_per_worker")]
    pub min_files_per_worker: usize,

    /// Base ref for `vcs = "branch"` steps.
    #[serde(default = "default_vcs_base")]
    pub vcs_base: String,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("src")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_history_file() -> PathBuf {
    PathBuf::from(HISTORY_FILE_PATH)
}

fn default_true() -> bool {
    true
}

fn default_workers_per_core() -> f64 {
    1.0
}

fn default_min_files_per_worker() -> usize {
    10
}

fn default_vcs_base() -> String {
    "main".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            history_file: default_history_file(),
            full_rebuild: false,
            rebuild_files_with_new_targets: false,
            mirror_deleted_source_file_to_output: true,
            mirror_deleted_targets_to_output: true,
            compare_size: true,
            compare_mtime: true,
            compare_hash: false,
            case_sensitive: true,
            normalize_separators: true,
            process_isolation: true,
            workers_per_core: default_workers_per_core(),
            min_files_per_worker: default_min_files_per_worker(),
            vcs_base: default_vcs_base(),
        }
    }
}

impl ConfigSection {
    pub fn pattern_policy(&self) -> PatternPolicy {
        PatternPolicy {
            case_sensitive: self.case_sensitive,
            normalize_separators: self.normalize_separators,
        }
    }

    pub fn comparison_modes(&self) -> ComparisonModes {
        ComparisonModes {
            size: self.compare_size,
            mtime: self.compare_mtime,
            hash: self.compare_hash,
        }
    }

    pub fn plan_flags(&self) -> PlanFlags {
        PlanFlags {
            full_rebuild: self.full_rebuild,
            rebuild_files_with_new_targets: self.rebuild_files_with_new_targets,
        }
    }

    pub fn cleanup_flags(&self) -> CleanupFlags {
        CleanupFlags {
            mirror_deleted_source_file_to_output: self.mirror_deleted_source_file_to_output,
            mirror_deleted_targets_to_output: self.mirror_deleted_targets_to_output,
        }
    }

    /// Scan root of the first step of `phase`.
    pub fn phase_root(&self, phase: Phase) -> &PathBuf {
        if phase.scans_sources() {
            &self.source_dir
        } else {
            &self.output_dir
        }
    }
}

/// `[compiler]` section, used by the command-line compiler.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompilerSection {
    /// Shell command run per file; `{source}` and `{targets}` are substituted.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Exported as `PROPATH`, joined with `,`.
    #[serde(default)]
    pub propath: Vec<String>,

    /// Where the compiler leaves `<path>.deps.json` files.
    #[serde(default)]
    pub deps_dir: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `[[<phase>]]` step entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub name: String,

    #[serde(default)]
    pub root: Option<PathBuf>,

    /// `;`-separated wildcards.
    #[serde(default)]
    pub include: Option<String>,

    #[serde(default)]
    pub exclude: Option<String>,

    /// `;`-separated regexes; mutually exclusive with `include`.
    #[serde(default)]
    pub include_regex: Option<String>,

    #[serde(default)]
    pub exclude_regex: Option<String>,

    #[serde(default)]
    pub vcs: Option<VcsMode>,

    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

impl StepConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
            include: None,
            exclude: None,
            include_regex: None,
            exclude_regex: None,
            vcs: None,
            task: Vec::new(),
        }
    }
}

/// `[[<phase>.task]]` entry.
///
/// Which fields are allowed depends on `kind`; that is checked during
/// validation rather than by serde so errors can name the step and task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub label: Option<String>,

    pub kind: TaskKindName,

    #[serde(default)]
    pub include: Option<String>,

    #[serde(default)]
    pub exclude: Option<String>,

    #[serde(default)]
    pub include_regex: Option<String>,

    #[serde(default)]
    pub exclude_regex: Option<String>,

    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub targets: Option<Vec<String>>,

    #[serde(default)]
    pub target_type: TargetType,

    #[serde(default)]
    pub archive: Option<String>,

    #[serde(default)]
    pub archives: Option<Vec<String>>,

    #[serde(default)]
    pub archive_kind: Option<ArchiveKind>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub cmd: Option<String>,
}

impl TaskConfig {
    pub fn new(kind: TaskKindName) -> Self {
        Self {
            label: None,
            kind,
            include: None,
            exclude: None,
            include_regex: None,
            exclude_regex: None,
            target: None,
            targets: None,
            target_type: TargetType::default(),
            archive: None,
            archives: None,
            archive_kind: None,
            base_url: None,
            cmd: None,
        }
    }
}

/// Validated configuration: every matcher and template is compiled.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub compiler: CompilerSection,
    steps: Vec<BuildStep>,
}

impl ConfigFile {
    /// Build from already-validated parts.
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        compiler: CompilerSection,
        steps: Vec<BuildStep>,
    ) -> Self {
        Self {
            config,
            compiler,
            steps,
        }
    }

    /// All steps, in execution order.
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    pub fn steps_in(&self, phase: Phase) -> impl Iterator<Item = &BuildStep> {
        self.steps.iter().filter(move |s| s.phase == phase)
    }

    pub fn has_compile_tasks(&self) -> bool {
        self.steps
            .iter()
            .flat_map(|s| s.tasks.iter())
            .any(|t| matches!(t.kind(), TaskKind::Compile))
    }

    /// Join every relative directory in the config onto `base`.
    pub fn rooted_at(mut self, base: &Path) -> Self {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.config.source_dir);
        join(&mut self.config.output_dir);
        join(&mut self.config.history_file);
        if let Some(deps) = self.compiler.deps_dir.as_mut() {
            join(deps);
        }
        for step in &mut self.steps {
            if let Some(root) = step.root.as_mut() {
                join(root);
            }
        }
        self
    }
}
