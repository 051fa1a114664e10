// src/pipeline/runner.rs

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::{error, info};

use crate::config::ConfigFile;
use crate::errors::{BuildError, FailureReport, Result};
use crate::history::{BuildHistorySnapshot, BuiltFile, Dependencies, HistoryStore, SourceFile, TargetRecord};
use crate::pipeline::executor::{IncrementalScope, PhaseInput, StepExecutor};
use crate::pipeline::report::BuildReport;
use crate::pipeline::BuildContext;
use crate::plan::{
    CleanupPlan, CleanupPlanner, EnvironmentSnapshot, IncrementalPlanner, RebuildPlan,
    TargetOracle, TargetSets,
};
use crate::source::{ListOptions, SourceLister};
use crate::target::TargetResolver;
use crate::task::BuildStep;
use crate::types::Phase;

/// Everything computed for the BuildSource phase before any task runs.
struct SourceState {
    root: PathBuf,
    catalog: Vec<SourceFile>,
    targets: TargetSets,
    rebuild: RebuildPlan,
    cleanup: CleanupPlan,
}

/// Target sets computed up front, served to the planner.
struct PrecomputedTargets<'a>(&'a TargetSets);

impl TargetOracle for PrecomputedTargets<'_> {
    fn targets_for(&self, file: &SourceFile) -> Vec<TargetRecord> {
        self.0.get(&file.path).cloned().unwrap_or_default()
    }
}

/// Current targets of every catalog file across the BuildSource file tasks.
///
/// Step filters chain the same way the executor chains file sets; version
/// control narrowing is deliberately left out.
pub fn current_targets<'s>(
    steps: impl IntoIterator<Item = &'s BuildStep>,
    resolver: &TargetResolver,
    catalog: &[SourceFile],
) -> TargetSets {
    let mut sets: TargetSets = catalog
        .iter()
        .map(|f| (f.path.clone(), Vec::new()))
        .collect();

    let mut files: Vec<&SourceFile> = catalog.iter().collect();
    for step in steps {
        files.retain(|f| step.filter.matches(&f.path));
        for file in &files {
            let Some(records) = sets.get_mut(&file.path) else {
                continue;
            };
            for task in step.file_tasks() {
                for record in resolver.resolve(task, file) {
                    if !records.contains(&record) {
                        records.push(record);
                    }
                }
            }
        }
    }
    sets
}

/// Sequences the four phases and owns the history commit.
pub struct TaskPipeline {
    config: ConfigFile,
    ctx: BuildContext,
    env: EnvironmentSnapshot,
    store: HistoryStore,
    dry_run: bool,
}

impl TaskPipeline {
    pub fn new(config: ConfigFile, ctx: BuildContext) -> Self {
        let store = HistoryStore::new(config.config.history_file.clone());
        Self {
            config,
            ctx,
            env: EnvironmentSnapshot::default(),
            store,
            dry_run: false,
        }
    }

    pub fn with_environment(mut self, env: EnvironmentSnapshot) -> Self {
        self.env = env;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    fn resolver(&self) -> TargetResolver {
        TargetResolver::new(self.config.config.output_dir.to_string_lossy().into_owned())
    }

    /// Run the build.
    ///
    /// The new history is written only if every phase completed without
    /// failures and the build was not cancelled.
    pub async fn run(&self) -> Result<BuildReport> {
        let cancel = &self.ctx.cancel;
        cancel.check()?;

        let previous = self.store.load(&*self.ctx.fs)?;
        let resolver = self.resolver();
        let has_sources = self.config.steps_in(Phase::BuildSource).next().is_some();

        let mut report = BuildReport {
            dry_run: self.dry_run,
            ..BuildReport::default()
        };

        if self.dry_run {
            if has_sources {
                let state = self.prepare_sources(&previous, &resolver)?;
                report.catalog_files = state.catalog.len();
                report.rebuild = state.rebuild;
                report.cleanup = state.cleanup;
            }
            info!("dry-run complete (no execution)");
            return Ok(report);
        }

        let executor = StepExecutor::new(&self.ctx, &self.config, &resolver);
        let mut failures = FailureReport::new();
        let mut compiled: HashMap<String, Option<Dependencies>> = HashMap::new();
        let mut vcs_skipped: HashSet<String> = HashSet::new();
        let mut sources: Option<SourceState> = None;

        for phase in Phase::ALL {
            if phase == Phase::BuildSource && has_sources {
                sources = Some(self.prepare_sources(&previous, &resolver)?);
            }

            let input = match (&sources, phase) {
                (Some(state), Phase::BuildSource) => {
                    report.catalog_files = state.catalog.len();
                    report.rebuild = state.rebuild.clone();
                    report.cleanup = state.cleanup.clone();
                    PhaseInput {
                        phase,
                        incremental: Some(IncrementalScope {
                            root: &state.root,
                            catalog: &state.catalog,
                            rebuild: &state.rebuild,
                        }),
                        cleanup: Some(state.cleanup.clone()),
                    }
                }
                _ => PhaseInput::plain(phase),
            };

            let out = executor.run_phase(input).await?;
            report.steps.extend(out.steps);
            compiled.extend(out.compiled);
            if phase == Phase::BuildSource {
                vcs_skipped.extend(out.vcs_skipped);
            }
            failures.extend(out.failures);

            if !failures.is_empty() {
                break;
            }
        }

        if !failures.is_empty() {
            error!(failures = failures.len(), "build failed; history not written");
            return Err(BuildError::Execution(failures));
        }
        cancel.check()?;

        let next = match &sources {
            Some(state) => next_history(state, &previous, &compiled, &vcs_skipped),
            None => previous,
        };
        self.store.save(&*self.ctx.fs, &next)?;
        report.history_written = true;

        info!(
            rebuilt = report.rebuild.len(),
            files = next.len(),
            "build complete"
        );
        Ok(report)
    }

    /// Scan the full source catalog and plan the incremental work.
    fn prepare_sources(
        &self,
        previous: &BuildHistorySnapshot,
        resolver: &TargetResolver,
    ) -> Result<SourceState> {
        let cfg = &self.config.config;
        let root = self
            .config
            .steps_in(Phase::BuildSource)
            .next()
            .and_then(|s| s.root.clone())
            .unwrap_or_else(|| cfg.source_dir.clone());

        let catalog = SourceLister::new(&*self.ctx.fs, &root)
            .with_previous(previous)
            .with_options(ListOptions {
                with_metadata: true,
                compare: cfg.comparison_modes(),
            })
            .list(&self.ctx.cancel)?;
        info!(?root, files = catalog.len(), "scanned source catalog");

        let targets = current_targets(self.config.steps_in(Phase::BuildSource), resolver, &catalog);

        let oracle = PrecomputedTargets(&targets);
        let rebuild = IncrementalPlanner::new(&catalog, previous, &self.env, cfg.plan_flags())
            .with_target_oracle(&oracle)
            .plan(&self.ctx.cancel)?;

        let cleanup = CleanupPlanner::new(previous, &catalog, &targets, cfg.cleanup_flags()).plan();

        Ok(SourceState {
            root,
            catalog,
            targets,
            rebuild,
            cleanup,
        })
    }
}

/// History for the build that just succeeded: every catalog file with its
/// current targets, and fresh dependency metadata where it was compiled.
///
/// A file that was due for a rebuild but skipped by version control keeps
/// its previous record, or stays out of the history if it never had one, so
/// a later build still picks it up.
fn next_history(
    state: &SourceState,
    previous: &BuildHistorySnapshot,
    compiled: &HashMap<String, Option<Dependencies>>,
    vcs_skipped: &HashSet<String>,
) -> BuildHistorySnapshot {
    BuildHistorySnapshot::from_files(state.catalog.iter().filter_map(|file| {
        if vcs_skipped.contains(&file.path) && state.rebuild.contains(&file.path) {
            return previous.get(&file.path).cloned();
        }
        let targets = state.targets.get(&file.path).cloned().unwrap_or_default();
        let dependencies = match compiled.get(&file.path) {
            Some(fresh) => fresh.clone(),
            None => previous
                .get(&file.path)
                .and_then(|built| built.dependencies.clone()),
        };
        Some(BuiltFile::from_source(file, targets, dependencies))
    }))
}
