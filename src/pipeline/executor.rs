// src/pipeline/executor.rs

//! Runs the steps of one phase: configure, execute, finalize.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::{BuildError, ExecutionFailure, FailureReport, Result};
use crate::exec::{
    available_cores, compile_all, run_shell, CommandOutcome, CompileRequest, PoolConfig,
    ShellCommand,
};
use crate::history::{Dependencies, SourceFile, TargetRecord};
use crate::pipeline::report::{StepReport, TaskReport};
use crate::pipeline::BuildContext;
use crate::plan::{CleanupPlan, RebuildPlan};
use crate::source::filter::passes_vcs;
use crate::source::path::absolute;
use crate::source::SourceLister;
use crate::target::{group_by_container, group_entry_names, TargetResolver};
use crate::task::{BuildStep, Task, TaskKind};
use crate::types::Phase;

/// The BuildSource phase's pre-scanned catalog and rebuild set.
pub(crate) struct IncrementalScope<'a> {
    pub root: &'a Path,
    pub catalog: &'a [SourceFile],
    pub rebuild: &'a RebuildPlan,
}

pub(crate) struct PhaseInput<'a> {
    pub phase: Phase,
    pub incremental: Option<IncrementalScope<'a>>,
    /// Appended to the phase's terminal step.
    pub cleanup: Option<CleanupPlan>,
}

impl PhaseInput<'_> {
    pub fn plain(phase: Phase) -> Self {
        Self {
            phase,
            incremental: None,
            cleanup: None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PhaseOutput {
    pub steps: Vec<StepReport>,
    /// Fresh compiler output per compiled path.
    pub compiled: HashMap<String, Option<Dependencies>>,
    /// Catalog paths a step matched but version control narrowed away.
    pub vcs_skipped: HashSet<String>,
    pub failures: FailureReport,
}

/// Failure attribution for the task being executed.
struct TaskScope<'a> {
    step: &'a BuildStep,
    task: &'a Task,
}

impl TaskScope<'_> {
    fn failure(&self, path: Option<&str>, message: impl Into<String>) -> ExecutionFailure {
        ExecutionFailure {
            step: self.step.name.clone(),
            task: self.task.label().to_string(),
            task_index: self.task.index(),
            path: path.map(str::to_string),
            message: message.into(),
        }
    }
}

pub(crate) struct StepExecutor<'a> {
    ctx: &'a BuildContext,
    config: &'a ConfigFile,
    resolver: &'a TargetResolver,
    pool: PoolConfig,
}

impl<'a> StepExecutor<'a> {
    pub fn new(ctx: &'a BuildContext, config: &'a ConfigFile, resolver: &'a TargetResolver) -> Self {
        let pool = PoolConfig {
            process_isolation: config.config.process_isolation,
            workers_per_core: config.config.workers_per_core,
            min_files_per_worker: config.config.min_files_per_worker,
        };
        Self {
            ctx,
            config,
            resolver,
            pool,
        }
    }

    fn stop_on_failure(&self) -> bool {
        !self.pool.process_isolation
    }

    /// Run every step of `input.phase` in order.
    ///
    /// Execution failures are collected; the phase stops after the first step
    /// that produced any. Cancellation and root I/O errors abort immediately.
    pub async fn run_phase(&self, mut input: PhaseInput<'_>) -> Result<PhaseOutput> {
        let phase = input.phase;
        let steps: Vec<&BuildStep> = self.config.steps_in(phase).collect();
        let mut out = PhaseOutput::default();
        let Some(first) = steps.first() else {
            return Ok(out);
        };

        let root: PathBuf = match &input.incremental {
            Some(scope) => scope.root.to_path_buf(),
            None => first
                .root
                .clone()
                .unwrap_or_else(|| self.config.config.phase_root(phase).clone()),
        };
        info!(%phase, steps = steps.len(), ?root, "starting phase");

        let last = steps.len() - 1;
        let mut prior: Vec<SourceFile> = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            self.ctx.cancel.check()?;

            let (files, skipped) =
                self.configure(index, step, &root, &prior, input.incremental.as_ref())?;
            out.vcs_skipped.extend(skipped);
            info!(%phase, step = %step.name, files = files.len(), "step configured");

            let mut report = StepReport {
                phase,
                name: step.name.clone(),
                files: files.len(),
                tasks: Vec::new(),
            };

            for task in &step.tasks {
                let task_report = self
                    .execute_task(step, task, &files, &root, input.incremental.as_ref(), &mut out)
                    .await?;
                report.tasks.push(task_report);
            }

            if index == last && out.failures.is_empty() {
                if let Some(plan) = input.cleanup.take() {
                    for task in plan.into_tasks(step.tasks.len()) {
                        let task_report = self.execute_task(step, &task, &[], &root, None, &mut out).await?;
                        report.tasks.push(task_report);
                    }
                }
            }

            out.steps.push(report);
            prior = files;

            if !out.failures.is_empty() {
                warn!(
                    %phase,
                    step = %step.name,
                    failures = out.failures.len(),
                    "step failed; stopping build"
                );
                break;
            }
        }

        Ok(out)
    }

    /// The step's file set: a fresh scan (or the pre-scanned catalog) for
    /// the first step, the prior step's set otherwise, narrowed by the step
    /// filter and version control. Also returns the paths the step filter
    /// matched that version control dropped.
    fn configure(
        &self,
        index: usize,
        step: &BuildStep,
        root: &Path,
        prior: &[SourceFile],
        scope: Option<&IncrementalScope<'_>>,
    ) -> Result<(Vec<SourceFile>, Vec<String>)> {
        let vcs_paths = match step.vcs {
            Some(mode) => Some(self.ctx.vcs.changed_paths(root, mode).map_err(|e| {
                BuildError::Other(e.context(format!(
                    "version control filter for step '{}'",
                    step.name
                )))
            })?),
            None => None,
        };

        let base: &[SourceFile] = match (index, scope) {
            (0, Some(scope)) => scope.catalog,
            (0, None) => {
                let mut lister = SourceLister::new(&*self.ctx.fs, root).with_filter(&step.filter);
                if let Some(paths) = &vcs_paths {
                    lister = lister.with_vcs(paths);
                }
                return Ok((lister.list(&self.ctx.cancel)?, Vec::new()));
            }
            _ => prior,
        };

        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for file in base.iter().filter(|f| step.filter.matches(&f.path)) {
            if passes_vcs(&file.path, vcs_paths.as_ref()) {
                files.push(file.clone());
            } else {
                skipped.push(file.path.clone());
            }
        }
        if !skipped.is_empty() {
            debug!(step = %step.name, skipped = skipped.len(), "version control narrowed step");
        }
        Ok((files, skipped))
    }

    async fn execute_task(
        &self,
        step: &BuildStep,
        task: &Task,
        files: &[SourceFile],
        root: &Path,
        scope: Option<&IncrementalScope<'_>>,
        out: &mut PhaseOutput,
    ) -> Result<TaskReport> {
        self.ctx.cancel.check()?;

        let ts = TaskScope { step, task };
        let mut report = TaskReport {
            label: task.label().to_string(),
            kind: task.kind().name(),
            processed: 0,
            failed: 0,
        };

        match task.kind() {
            TaskKind::Exec { cmd } => {
                self.run_exec(&ts, cmd, root, &mut report, out).await?;
            }
            TaskKind::Remove { records, .. } => {
                self.run_removal(&ts, records, &mut report, out)?;
            }
            TaskKind::Compile | TaskKind::Copy | TaskKind::Upload { .. } | TaskKind::Archive { .. } => {
                let selected: Vec<&SourceFile> = files
                    .iter()
                    .filter(|f| task.matches(&f.path))
                    .filter(|f| scope.is_none_or(|s| s.rebuild.contains(&f.path)))
                    .collect();
                debug!(
                    step = %step.name,
                    task = %task.label(),
                    files = selected.len(),
                    "executing file task"
                );

                match task.kind() {
                    TaskKind::Compile => {
                        self.run_compile(&ts, &selected, root, &mut report, out).await?;
                    }
                    TaskKind::Archive { .. } => {
                        self.run_archive(&ts, &selected, root, &mut report, out)?;
                    }
                    _ => self.run_transfer(&ts, &selected, root, &mut report, out)?,
                }
            }
        }

        info!(
            step = %step.name,
            task = %report.label,
            kind = report.kind,
            processed = report.processed,
            failed = report.failed,
            "task finished"
        );
        Ok(report)
    }

    async fn run_exec(
        &self,
        ts: &TaskScope<'_>,
        cmd: &str,
        root: &Path,
        report: &mut TaskReport,
        out: &mut PhaseOutput,
    ) -> Result<()> {
        let mut command = ShellCommand::new(cmd);
        if self.ctx.fs.is_dir(root) {
            command = command.current_dir(root);
        }
        match run_shell(&command, &self.ctx.cancel).await {
            Ok(CommandOutcome::Success) => report.processed += 1,
            Ok(CommandOutcome::Cancelled) => return Err(BuildError::Cancelled),
            Ok(CommandOutcome::Failed { code, stderr }) => {
                report.failed += 1;
                out.failures.push(ts.failure(
                    None,
                    format!("command exited with code {code}: {}", stderr.trim()),
                ));
            }
            Err(e) => {
                report.failed += 1;
                out.failures.push(ts.failure(None, format!("{e:#}")));
            }
        }
        Ok(())
    }

    async fn run_compile(
        &self,
        ts: &TaskScope<'_>,
        files: &[&SourceFile],
        root: &Path,
        report: &mut TaskReport,
        out: &mut PhaseOutput,
    ) -> Result<()> {
        let requests: Vec<CompileRequest> = files
            .iter()
            .map(|f| CompileRequest {
                path: f.path.clone(),
                source: absolute(root, &f.path),
                targets: self.resolver.resolve(ts.task, f),
            })
            .collect();

        let workers = self.pool.size_for(requests.len(), available_cores());
        let outputs = compile_all(
            Arc::clone(&self.ctx.compiler),
            requests,
            workers,
            self.stop_on_failure(),
            &self.ctx.cancel,
        )
        .await?;
        self.ctx.cancel.check()?;

        for output in outputs {
            match output.result {
                Ok(deps) => {
                    report.processed += 1;
                    out.compiled.insert(output.path, deps);
                }
                Err(e) => {
                    report.failed += 1;
                    out.failures
                        .push(ts.failure(Some(&output.path), format!("{e:#}")));
                }
            }
        }
        Ok(())
    }

    /// Copy and upload: one archiver call per file and record.
    fn run_transfer(
        &self,
        ts: &TaskScope<'_>,
        files: &[&SourceFile],
        root: &Path,
        report: &mut TaskReport,
        out: &mut PhaseOutput,
    ) -> Result<()> {
        for file in files {
            self.ctx.cancel.check()?;
            let source = absolute(root, &file.path);

            let result = self
                .resolver
                .resolve(ts.task, file)
                .iter()
                .try_for_each(|record| match record {
                    TargetRecord::Copy { path } => self.ctx.archiver.copy_file(&source, path),
                    TargetRecord::Remote { url } => self.ctx.archiver.upload(&source, url),
                    TargetRecord::ArchiveEntry { .. } => Ok(()),
                });

            match result {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    report.failed += 1;
                    out.failures.push(ts.failure(Some(&file.path), format!("{e:#}")));
                    if self.stop_on_failure() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Archive: one batched write per container.
    fn run_archive(
        &self,
        ts: &TaskScope<'_>,
        files: &[&SourceFile],
        root: &Path,
        report: &mut TaskReport,
        out: &mut PhaseOutput,
    ) -> Result<()> {
        let mut items: Vec<(TargetRecord, (String, PathBuf))> = Vec::new();
        for file in files {
            let source = absolute(root, &file.path);
            for record in self.resolver.resolve(ts.task, file) {
                if let TargetRecord::ArchiveEntry { entry, .. } = &record {
                    let payload = (entry.clone(), source.clone());
                    items.push((record, payload));
                }
            }
        }

        for group in group_by_container(items.iter().map(|(r, p)| (r, p.clone()))) {
            self.ctx.cancel.check()?;
            match self
                .ctx
                .archiver
                .write_entries(&group.container, group.kind, &group.entries)
            {
                Ok(()) => report.processed += group.entries.len(),
                Err(e) => {
                    report.failed += group.entries.len();
                    out.failures.push(ts.failure(
                        None,
                        format!("container '{}': {e:#}", group.container),
                    ));
                    if self.stop_on_failure() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn run_removal(
        &self,
        ts: &TaskScope<'_>,
        records: &[TargetRecord],
        report: &mut TaskReport,
        out: &mut PhaseOutput,
    ) -> Result<()> {
        let mut copies = Vec::new();
        let mut remotes = Vec::new();
        for record in records {
            match record {
                TargetRecord::Copy { path } => copies.push(path.clone()),
                TargetRecord::Remote { url } => remotes.push(url.clone()),
                TargetRecord::ArchiveEntry { .. } => {}
            }
        }

        let mut outcome = |result: anyhow::Result<()>, count: usize, what: &str| match result {
            Ok(()) => report.processed += count,
            Err(e) => {
                report.failed += count;
                out.failures.push(ts.failure(None, format!("{what}: {e:#}")));
            }
        };

        if !copies.is_empty() {
            self.ctx.cancel.check()?;
            outcome(self.ctx.archiver.remove_files(&copies), copies.len(), "removing files");
        }
        for group in group_entry_names(records) {
            self.ctx.cancel.check()?;
            let what = format!("container '{}'", group.container);
            outcome(
                self.ctx
                    .archiver
                    .remove_entries(&group.container, group.kind, &group.entries),
                group.entries.len(),
                &what,
            );
        }
        if !remotes.is_empty() {
            self.ctx.cancel.check()?;
            outcome(self.ctx.archiver.remove_remote(&remotes), remotes.len(), "removing remote targets");
        }
        Ok(())
    }
}
