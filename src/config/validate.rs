// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, ConfigSection, RawConfigFile, StepConfig, TaskConfig};
use crate::errors::{BuildError, Result};
use crate::source::filter::compile_patterns;
use crate::source::{FileFilter, PatternPolicy};
use crate::target::Template;
use crate::task::{BuildStep, Task, TaskKind};
use crate::types::{Phase, TaskKindName};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_global_config(&raw.config)?;

        let policy = raw.config.pattern_policy();
        let mut steps = Vec::new();
        for phase in Phase::ALL {
            let mut names = HashSet::new();
            for step in raw.steps_in(phase) {
                if !names.insert(step.name.as_str()) {
                    return Err(BuildError::config(format!(
                        "[{phase}] duplicate step name '{}'",
                        step.name
                    )));
                }
                steps.push(compile_step(phase, step, policy)?);
            }
        }

        let cfg = ConfigFile::new_unchecked(raw.config, raw.compiler, steps);
        if cfg.has_compile_tasks() && cfg.compiler.cmd.is_none() {
            return Err(BuildError::config(
                "compile tasks require [compiler].cmd to be set",
            ));
        }
        Ok(cfg)
    }
}

fn validate_global_config(cfg: &ConfigSection) -> Result<()> {
    if !cfg.workers_per_core.is_finite() || cfg.workers_per_core <= 0.0 {
        return Err(BuildError::config(format!(
            "[config].workers_per_core must be > 0 (got {})",
            cfg.workers_per_core
        )));
    }

    if cfg.min_files_per_worker == 0 {
        return Err(BuildError::config(
            "[config].min_files_per_worker must be >= 1 (got 0)",
        ));
    }

    if cfg.source_dir.as_os_str().is_empty() || cfg.output_dir.as_os_str().is_empty() {
        return Err(BuildError::config(
            "[config].source_dir and [config].output_dir must not be empty",
        ));
    }

    Ok(())
}

fn compile_step(phase: Phase, step: &StepConfig, policy: PatternPolicy) -> Result<BuildStep> {
    if step.name.trim().is_empty() {
        return Err(BuildError::config(format!("[{phase}] step name must not be empty")));
    }

    let filter = compile_filter(
        step.include.as_deref(),
        step.include_regex.as_deref(),
        step.exclude.as_deref(),
        step.exclude_regex.as_deref(),
        policy,
    )
    .map_err(|msg| BuildError::config(format!("[{phase}] step '{}': {msg}", step.name)))?;

    let mut compiled = BuildStep::new(step.name.clone(), phase);
    compiled.root = step.root.clone();
    compiled.filter = filter;
    compiled.vcs = step.vcs;

    for (index, task) in step.task.iter().enumerate() {
        let label = task
            .label
            .clone()
            .unwrap_or_else(|| format!("{}#{index}", kind_str(task.kind)));
        let compiled_task = compile_task(phase, &label, index, task, policy).map_err(|msg| {
            BuildError::config(format!(
                "[{phase}] step '{}' task #{index} '{label}': {msg}",
                step.name
            ))
        })?;
        compiled.tasks.push(compiled_task);
    }

    Ok(compiled)
}

fn kind_str(kind: TaskKindName) -> &'static str {
    match kind {
        TaskKindName::Compile => "compile",
        TaskKindName::Copy => "copy",
        TaskKindName::Archive => "archive",
        TaskKindName::Upload => "upload",
        TaskKindName::Exec => "exec",
    }
}

fn compile_filter(
    include: Option<&str>,
    include_regex: Option<&str>,
    exclude: Option<&str>,
    exclude_regex: Option<&str>,
    policy: PatternPolicy,
) -> std::result::Result<FileFilter, String> {
    let include = match (include, include_regex) {
        (Some(_), Some(_)) => {
            return Err("`include` and `include_regex` are mutually exclusive".to_string());
        }
        (Some(patterns_str), None) => compile_patterns(patterns_str, false, policy)?,
        (None, Some(patterns_str)) => compile_patterns(patterns_str, true, policy)?,
        (None, None) => Vec::new(),
    };
    let exclude = match (exclude, exclude_regex) {
        (Some(_), Some(_)) => {
            return Err("`exclude` and `exclude_regex` are mutually exclusive".to_string());
        }
        (Some(patterns_str), None) => compile_patterns(patterns_str, false, policy)?,
        (None, Some(patterns_str)) => compile_patterns(patterns_str, true, policy)?,
        (None, None) => Vec::new(),
    };
    Ok(FileFilter::new(include, exclude))
}

/// `single` / `many` pair of the same setting, e.g. `target` / `targets`.
fn one_or_many(
    single: &Option<String>,
    many: &Option<Vec<String>>,
    single_name: &str,
    many_name: &str,
) -> std::result::Result<Vec<String>, String> {
    match (single, many) {
        (Some(_), Some(_)) => Err(format!(
            "`{single_name}` and `{many_name}` are mutually exclusive"
        )),
        (Some(one), None) => Ok(vec![one.clone()]),
        (None, Some(list)) => Ok(list.clone()),
        (None, None) => Ok(Vec::new()),
    }
}

fn parse_templates(raw: &[String]) -> std::result::Result<Vec<Template>, String> {
    raw.iter().map(|t| Template::parse(t)).collect()
}

fn has_filter(task: &TaskConfig) -> bool {
    task.include.is_some()
        || task.include_regex.is_some()
        || task.exclude.is_some()
        || task.exclude_regex.is_some()
}

fn compile_task(
    phase: Phase,
    label: &str,
    index: usize,
    task: &TaskConfig,
    policy: PatternPolicy,
) -> std::result::Result<Task, String> {
    let targets = one_or_many(&task.target, &task.targets, "target", "targets")?;
    let archives = one_or_many(&task.archive, &task.archives, "archive", "archives")?;

    let kind = match task.kind {
        TaskKindName::Exec => {
            let cmd = task
                .cmd
                .clone()
                .filter(|c| !c.trim().is_empty())
                .ok_or("exec tasks require `cmd`")?;
            if !targets.is_empty() || !archives.is_empty() {
                return Err("exec tasks take no targets".to_string());
            }
            if has_filter(task) {
                return Err("exec tasks take no include/exclude patterns".to_string());
            }
            return Ok(Task::new(label, index, TaskKind::Exec { cmd }));
        }
        TaskKindName::Compile => {
            if phase != Phase::BuildSource {
                return Err(format!(
                    "compile tasks are only allowed in build_source (found in {phase})"
                ));
            }
            TaskKind::Compile
        }
        TaskKindName::Copy => TaskKind::Copy,
        TaskKindName::Archive => {
            let kind = task.archive_kind.ok_or("archive tasks require `archive_kind`")?;
            if archives.is_empty() {
                return Err("archive tasks require `archive` or `archives`".to_string());
            }
            TaskKind::Archive { kind }
        }
        TaskKindName::Upload => {
            let base_url = task
                .base_url
                .clone()
                .filter(|u| !u.trim().is_empty())
                .ok_or("upload tasks require `base_url`")?;
            TaskKind::Upload { base_url }
        }
    };

    if task.cmd.is_some() {
        return Err("`cmd` is only valid for exec tasks".to_string());
    }
    if targets.is_empty() {
        return Err("at least one `target` is required".to_string());
    }
    if !kind.capabilities().archive_target && !archives.is_empty() {
        return Err("`archive` is only valid for archive tasks".to_string());
    }

    let filter = compile_filter(
        task.include.as_deref(),
        task.include_regex.as_deref(),
        task.exclude.as_deref(),
        task.exclude_regex.as_deref(),
        policy,
    )?;

    Ok(Task::new(label, index, kind)
        .with_filter(filter)
        .with_targets(parse_templates(&targets)?, task.target_type)
        .with_archives(parse_templates(&archives)?))
}
