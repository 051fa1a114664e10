mod common;

use std::path::Path;
use std::sync::Arc;

use common::{Harness, TestResult};
use incbuild::config::ConfigFile;
use incbuild::errors::BuildError;
use incbuild::exec::LocalArchiver;
use incbuild::fs::FileSystem;
use incbuild::history::{DatabaseReference, Dependencies, TargetRecord};
use incbuild::pipeline::{BuildContext, TaskPipeline};
use incbuild::plan::{EnvironmentSnapshot, RebuildReason};
use incbuild::types::{ArchiveKind, Phase, VcsMode};
use incbuild_test_utils::builders::{ConfigFileBuilder, StepConfigBuilder, TaskConfigBuilder};
use incbuild_test_utils::fakes::{ArchiverOp, FakeVcs};
use incbuild_test_utils::{init_tracing, with_timeout};

/// `src/*.p` compiled into `build/r/<dir>`.
fn compile_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .step(
            Phase::BuildSource,
            StepConfigBuilder::new("compile")
                .include("*.p")
                .task(TaskConfigBuilder::compile("r/<FILE_SOURCE_DIRECTORY>").build())
                .build(),
        )
        .build()
}

/// [`compile_config`] narrowed to modified files.
fn vcs_compile_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .step(
            Phase::BuildSource,
            StepConfigBuilder::new("compile")
                .include("*.p")
                .vcs(VcsMode::Modified)
                .task(TaskConfigBuilder::compile("r/<FILE_SOURCE_DIRECTORY>").build())
                .build(),
        )
        .build()
}

fn copy_config(target: &str) -> ConfigFileBuilder {
    ConfigFileBuilder::new().step(
        Phase::BuildSource,
        StepConfigBuilder::new("mirror")
            .task(TaskConfigBuilder::copy(target).build())
            .build(),
    )
}

fn seed(h: &Harness, paths: &[&str]) {
    for path in paths {
        h.fs.add_file(format!("src/{path}"), format!("source of {path}").into_bytes());
    }
}

#[tokio::test]
async fn test_second_build_without_changes_compiles_nothing() -> TestResult {
    init_tracing();
    let h = Harness::new();
    seed(&h, &["a.p", "lib/b.p", "notes.txt"]);
    let config = compile_config();

    let report = with_timeout(h.pipeline(config.clone()).run()).await?;
    assert_eq!(h.compiler.compiled(), vec!["a.p", "lib/b.p"]);
    assert!(report.history_written);
    assert_eq!(report.catalog_files, 3);

    let history = h.history(&config);
    assert_eq!(history.len(), 3);
    assert_eq!(
        history.get("lib/b.p").map(|b| b.targets.clone()),
        Some(vec![TargetRecord::copy("build/r/lib/b.p")])
    );
    // Files no task matches are still tracked, without targets.
    assert_eq!(history.get("notes.txt").map(|b| b.targets.len()), Some(0));

    h.compiler.reset();
    let report = with_timeout(h.pipeline(config).run()).await?;
    assert!(h.compiler.compiled().is_empty());
    assert!(report.rebuild.is_empty());
    assert!(report.history_written);
    Ok(())
}

#[tokio::test]
async fn test_touched_file_is_rebuilt_alone() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p", "b.p"]);
    let config = compile_config();
    h.pipeline(config.clone()).run().await?;

    h.compiler.reset();
    h.fs.touch("src/b.p");
    let report = h.pipeline(config).run().await?;

    assert_eq!(h.compiler.compiled(), vec!["b.p"]);
    assert_eq!(report.rebuild.reason_of("b.p"), Some(&RebuildReason::Replaced));
    Ok(())
}

#[tokio::test]
async fn test_compile_failure_keeps_previous_history() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p", "b.p"]);
    let config = compile_config();
    h.compiler.fail_on("b.p");

    let err = h.pipeline(config.clone()).run().await.unwrap_err();
    match err {
        BuildError::Execution(report) => {
            assert_eq!(report.len(), 1);
            let failure = &report.failures()[0];
            assert_eq!(failure.step, "compile");
            assert_eq!(failure.task, "compile#0");
            assert_eq!(failure.path.as_deref(), Some("b.p"));
            assert!(failure.message.contains("syntax error in b.p"));
        }
        other => panic!("expected an execution failure, got {other:?}"),
    }
    assert!(!h.fs.exists(Path::new(".incbuild/history.json")));

    // Nothing was committed, so everything is retried.
    let fresh = incbuild_test_utils::fakes::FakeCompiler::new();
    let retry = Harness {
        compiler: fresh.clone(),
        ..h
    };
    retry.pipeline(config).run().await?;
    assert_eq!(fresh.compiled(), vec!["a.p", "b.p"]);
    Ok(())
}

#[tokio::test]
async fn test_failure_in_build_source_skips_later_phases() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p"]);
    h.compiler.fail_on("a.p");
    let config = ConfigFileBuilder::new()
        .step(
            Phase::BuildSource,
            StepConfigBuilder::new("compile")
                .task(TaskConfigBuilder::compile("r").build())
                .build(),
        )
        .step(
            Phase::PostBuild,
            StepConfigBuilder::new("ship")
                .task(TaskConfigBuilder::upload("ftp://host", "x").build())
                .build(),
        )
        .build();

    assert!(h.pipeline(config).run().await.is_err());
    assert!(h
        .archiver
        .ops()
        .iter()
        .all(|op| !matches!(op, ArchiverOp::Upload { .. })));
    Ok(())
}

#[tokio::test]
async fn test_cancellation_during_compile_writes_no_history() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p", "b.p", "c.p"]);
    h.compiler.cancel_on_compile(h.cancel.clone());
    let config = compile_config();

    let err = h.pipeline(config).run().await.unwrap_err();
    assert!(matches!(err, BuildError::Cancelled), "got {err:?}");
    assert!(!h.fs.exists(Path::new(".incbuild/history.json")));
    Ok(())
}

#[tokio::test]
async fn test_dry_run_plans_without_side_effects() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p", "b.p"]);
    let config = compile_config();

    let report = h.pipeline(config).with_dry_run(true).run().await?;
    assert!(report.dry_run);
    assert_eq!(report.rebuild.paths(), vec!["a.p", "b.p"]);
    assert!(report.steps.is_empty());
    assert!(!report.history_written);
    assert!(h.compiler.compiled().is_empty());
    assert!(!h.fs.exists(Path::new(".incbuild/history.json")));
    Ok(())
}

#[tokio::test]
async fn test_deleted_source_removes_its_outputs() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p", "b.p"]);
    let config = copy_config("out").build();
    h.pipeline(config.clone()).run().await?;
    assert_eq!(h.archiver.copied_targets(), vec!["build/out/a.p", "build/out/b.p"]);

    h.archiver.clear();
    h.fs.remove_file(Path::new("src/b.p"))?;
    let report = h.pipeline(config.clone()).run().await?;

    assert_eq!(h.archiver.removed_files(), vec!["build/out/b.p"]);
    assert!(h.archiver.copied_targets().is_empty());
    let step = report.step(Phase::BuildSource, "mirror").expect("step report");
    assert_eq!(step.tasks.last().map(|t| t.label.as_str()), Some("cleanup:deleted-sources"));
    assert!(!h.history(&config).contains("b.p"));
    Ok(())
}

#[tokio::test]
async fn test_changed_target_is_rebuilt_and_old_output_removed() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p"]);
    h.pipeline(copy_config("v1").build()).run().await?;

    h.archiver.clear();
    let config = copy_config("v2")
        .configure(|c| c.rebuild_files_with_new_targets = true)
        .build();
    let report = h.pipeline(config.clone()).run().await?;

    assert_eq!(report.rebuild.reason_of("a.p"), Some(&RebuildReason::TargetsChanged));
    assert_eq!(h.archiver.copied_targets(), vec!["build/v2/a.p"]);
    assert_eq!(h.archiver.removed_files(), vec!["build/v1/a.p"]);
    assert_eq!(
        h.history(&config).get("a.p").map(|b| b.targets.clone()),
        Some(vec![TargetRecord::copy("build/v2/a.p")])
    );
    Ok(())
}

#[tokio::test]
async fn test_cleanup_can_be_disabled() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p", "b.p"]);
    let config = copy_config("out")
        .configure(|c| c.mirror_deleted_source_file_to_output = false)
        .build();
    h.pipeline(config.clone()).run().await?;

    h.archiver.clear();
    h.fs.remove_file(Path::new("src/a.p"))?;
    let report = h.pipeline(config).run().await?;
    assert!(report.cleanup.is_empty());
    assert!(h.archiver.removed_files().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_table_change_triggers_recompile() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p", "b.p"]);
    h.compiler.with_dependencies(
        "b.p",
        Dependencies {
            required_files: vec![],
            required_references: vec![DatabaseReference::table("cust", "111")],
        },
    );
    let config = compile_config();
    let v1 = EnvironmentSnapshot::new().with_table("cust", "111");
    h.pipeline_with_env(config.clone(), v1.clone()).run().await?;
    assert_eq!(
        h.history(&config).get("b.p").map(|b| b.required_references().to_vec()),
        Some(vec![DatabaseReference::table("cust", "111")])
    );

    h.compiler.reset();
    h.pipeline_with_env(config.clone(), v1).run().await?;
    assert!(h.compiler.compiled().is_empty());

    let v2 = EnvironmentSnapshot::new().with_table("cust", "222");
    let report = h.pipeline_with_env(config, v2).run().await?;
    assert_eq!(h.compiler.compiled(), vec!["b.p"]);
    assert_eq!(
        report.rebuild.reason_of("b.p"),
        Some(&RebuildReason::TableChanged { name: "cust".into() })
    );
    Ok(())
}

#[tokio::test]
async fn test_include_file_change_rebuilds_dependents() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p", "b.p", "defs.i"]);
    h.compiler.with_dependencies(
        "a.p",
        Dependencies {
            required_files: vec!["defs.i".into()],
            required_references: vec![],
        },
    );
    let config = ConfigFileBuilder::new()
        .step(
            Phase::BuildSource,
            StepConfigBuilder::new("compile")
                .task(TaskConfigBuilder::compile("r").include("*.p").build())
                .build(),
        )
        .build();
    h.pipeline(config.clone()).run().await?;

    h.compiler.reset();
    h.fs.touch("src/defs.i");
    h.pipeline(config.clone()).run().await?;
    assert_eq!(h.compiler.compiled(), vec!["a.p"]);

    // Unchanged build: dependencies are carried over from the last history.
    h.compiler.reset();
    h.pipeline(config.clone()).run().await?;
    assert!(h.compiler.compiled().is_empty());
    assert_eq!(
        h.history(&config).get("a.p").map(|b| b.required_files().to_vec()),
        Some(vec!["defs.i".to_string()])
    );
    Ok(())
}

#[tokio::test]
async fn test_vcs_step_narrows_file_set() -> TestResult {
    let h = Harness::new().with_vcs(FakeVcs::new().modified(&["b.p"]));
    seed(&h, &["a.p", "b.p"]);
    let config = ConfigFileBuilder::new()
        .step(
            Phase::BuildSource,
            StepConfigBuilder::new("compile")
                .vcs(VcsMode::Modified)
                .task(TaskConfigBuilder::compile("r").build())
                .build(),
        )
        .build();

    let report = h.pipeline(config).run().await?;
    assert_eq!(h.compiler.compiled(), vec!["b.p"]);
    assert_eq!(report.step(Phase::BuildSource, "compile").map(|s| s.files), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_steps_chain_their_file_sets() -> TestResult {
    let h = Harness::new();
    seed(&h, &["a.p", "b.w", "sub/c.p", "d.txt"]);
    let config = ConfigFileBuilder::new()
        .step(
            Phase::BuildSource,
            StepConfigBuilder::new("code")
                .include("*.p;*.w")
                .task(TaskConfigBuilder::compile("r").build())
                .build(),
        )
        .step(
            Phase::BuildSource,
            StepConfigBuilder::new("procedures")
                .include("*.p")
                .exclude("sub/**")
                .task(
                    TaskConfigBuilder::archive(ArchiveKind::Library, "app.pl", "<FILE_SOURCE_DIRECTORY>")
                        .build(),
                )
                .build(),
        )
        .build();

    let report = h.pipeline(config.clone()).run().await?;
    assert_eq!(h.compiler.compiled(), vec!["a.p", "b.w", "sub/c.p"]);
    assert_eq!(report.step(Phase::BuildSource, "procedures").map(|s| s.files), Some(1));
    assert_eq!(
        h.archiver.ops(),
        vec![ArchiverOp::WriteEntries {
            container: "build/app.pl".into(),
            kind: ArchiveKind::Library,
            entries: vec!["a.p".into()],
        }]
    );

    let a = h.history(&config).get("a.p").map(|b| b.targets.clone());
    assert_eq!(
        a,
        Some(vec![
            TargetRecord::copy("build/r/a.p"),
            TargetRecord::archive_entry("build/app.pl", ArchiveKind::Library, "a.p"),
        ])
    );
    Ok(())
}

#[tokio::test]
async fn test_later_phases_scan_the_output_tree() -> TestResult {
    let h = Harness::new();
    h.fs.add_file("build/app.r", b"r".to_vec());
    h.fs.add_file("build/readme.md", b"md".to_vec());
    let config = ConfigFileBuilder::new()
        .step(
            Phase::PostBuild,
            StepConfigBuilder::new("ship")
                .include("*.r")
                .task(TaskConfigBuilder::upload("ftp://host/pub", "<FILE_SOURCE_DIRECTORY>").build())
                .build(),
        )
        .build();

    let report = h.pipeline(config).run().await?;
    assert_eq!(
        h.archiver.ops(),
        vec![ArchiverOp::Upload {
            source: Path::new("build").join("app.r"),
            url: "ftp://host/pub/app.r".into(),
        }]
    );
    assert!(report.history_written);
    assert_eq!(report.catalog_files, 0);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_exec_task_exit_code_is_a_failure() -> TestResult {
    let h = Harness::new();
    let ok = ConfigFileBuilder::new()
        .step(
            Phase::PostBuild,
            StepConfigBuilder::new("hook")
                .task(TaskConfigBuilder::exec("true").build())
                .build(),
        )
        .build();
    let report = with_timeout(h.pipeline(ok).run()).await?;
    assert_eq!(
        report.step(Phase::PostBuild, "hook").map(|s| s.tasks[0].processed),
        Some(1)
    );

    let failing = ConfigFileBuilder::new()
        .step(
            Phase::PostBuild,
            StepConfigBuilder::new("hook")
                .task(TaskConfigBuilder::exec("echo broken >&2; exit 3").build())
                .build(),
        )
        .build();
    let err = with_timeout(h.pipeline(failing).run()).await.unwrap_err();
    match err {
        BuildError::Execution(report) => {
            let message = &report.failures()[0].message;
            assert!(message.contains("code 3"), "{message}");
            assert!(message.contains("broken"), "{message}");
        }
        other => panic!("expected an execution failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_local_archiver_copies_through_the_filesystem() -> TestResult {
    let h = Harness::new();
    seed(&h, &["sub/a.p"]);
    let fs: Arc<dyn FileSystem> = Arc::new(h.fs.clone());
    let ctx = BuildContext::new(
        Arc::clone(&fs),
        Arc::new(h.compiler.clone()),
        Arc::new(LocalArchiver::new(Arc::clone(&fs))),
        Arc::new(h.vcs.clone()),
    );
    let config = copy_config("out/<FILE_SOURCE_DIRECTORY>").build();

    TaskPipeline::new(config.clone(), ctx.clone()).run().await?;
    assert_eq!(
        h.fs.contents("build/out/sub/a.p"),
        Some(b"source of sub/a.p".to_vec())
    );

    h.fs.remove_file(Path::new("src/sub/a.p"))?;
    TaskPipeline::new(config, ctx).run().await?;
    assert_eq!(h.fs.contents("build/out/sub/a.p"), None);
    Ok(())
}

#[tokio::test]
async fn test_moved_source_keeps_its_shared_output() -> TestResult {
    let h = Harness::new();
    seed(&h, &["x/a.p"]);
    let fs: Arc<dyn FileSystem> = Arc::new(h.fs.clone());
    let ctx = BuildContext::new(
        Arc::clone(&fs),
        Arc::new(h.compiler.clone()),
        Arc::new(LocalArchiver::new(Arc::clone(&fs))),
        Arc::new(h.vcs.clone()),
    );
    let config = copy_config("out").build();
    TaskPipeline::new(config.clone(), ctx.clone()).run().await?;

    h.fs.remove_file(Path::new("src/x/a.p"))?;
    seed(&h, &["y/a.p"]);
    let report = TaskPipeline::new(config.clone(), ctx.clone()).run().await?;

    assert!(report.cleanup.is_empty(), "{:?}", report.cleanup);
    assert_eq!(h.fs.contents("build/out/a.p"), Some(b"source of y/a.p".to_vec()));
    assert_eq!(
        h.history(&config).get("y/a.p").map(|b| b.targets.clone()),
        Some(vec![TargetRecord::copy("build/out/a.p")])
    );
    Ok(())
}

#[tokio::test]
async fn test_files_skipped_by_vcs_are_built_later() -> TestResult {
    let h = Harness::new().with_vcs(FakeVcs::new().modified(&["b.p"]));
    seed(&h, &["a.p", "b.p"]);
    let narrowed = vcs_compile_config();
    h.pipeline(narrowed.clone()).run().await?;
    assert_eq!(h.compiler.compiled(), vec!["b.p"]);

    let history = h.history(&narrowed);
    assert!(!history.contains("a.p"));
    assert!(history.contains("b.p"));

    h.compiler.reset();
    let report = h.pipeline(compile_config()).run().await?;
    assert_eq!(h.compiler.compiled(), vec!["a.p"]);
    assert_eq!(report.rebuild.reason_of("a.p"), Some(&RebuildReason::Added));
    Ok(())
}

#[tokio::test]
async fn test_skipped_file_keeps_its_previous_record() -> TestResult {
    let h = Harness::new().with_vcs(FakeVcs::new().modified(&["b.p"]));
    seed(&h, &["a.p", "b.p"]);
    let config = compile_config();
    h.pipeline(config.clone()).run().await?;
    let before = h.history(&config).get("a.p").cloned();

    h.fs.touch("src/a.p");
    h.fs.touch("src/b.p");
    h.compiler.reset();
    h.pipeline(vcs_compile_config()).run().await?;
    assert_eq!(h.compiler.compiled(), vec!["b.p"]);
    assert_eq!(h.history(&config).get("a.p").cloned(), before);

    h.compiler.reset();
    h.pipeline(config).run().await?;
    assert_eq!(h.compiler.compiled(), vec!["a.p"]);
    Ok(())
}
