mod common;

use common::{built, history, source};
use incbuild::history::{FileState, TargetRecord};
use incbuild::plan::{CleanupFlags, CleanupPlanner, TargetSets};
use incbuild::task::{CleanupReason, TaskKind};
use incbuild::types::ArchiveKind;

fn sets(entries: &[(&str, Vec<TargetRecord>)]) -> TargetSets {
    entries
        .iter()
        .map(|(p, records)| (p.to_string(), records.clone()))
        .collect()
}

#[test]
fn test_stale_and_deleted_outputs() {
    let t1 = TargetRecord::copy("build/a1.r");
    let t2 = TargetRecord::copy("build/a2.r");
    let t3 = TargetRecord::copy("build/b.r");

    let previous = history(vec![
        built("a.p", vec![t1.clone(), t2.clone()], None),
        built("b.p", vec![t3.clone()], None),
    ]);
    let catalog = vec![source("a.p", FileState::Existing)];
    let current = sets(&[("a.p", vec![t1.clone()])]);

    let plan = CleanupPlanner::new(&previous, &catalog, &current, CleanupFlags::default()).plan();

    assert_eq!(plan.stale_targets, vec![t2]);
    assert_eq!(plan.deleted_sources, vec![t3]);
}

#[test]
fn test_flags_disable_each_batch() {
    let previous = history(vec![
        built("a.p", vec![TargetRecord::copy("build/old.r")], None),
        built("gone.p", vec![TargetRecord::copy("build/gone.r")], None),
    ]);
    let catalog = vec![source("a.p", FileState::Existing)];
    let current = sets(&[("a.p", vec![])]);

    let no_deleted = CleanupFlags {
        mirror_deleted_source_file_to_output: false,
        ..CleanupFlags::default()
    };
    let plan = CleanupPlanner::new(&previous, &catalog, &current, no_deleted).plan();
    assert!(plan.deleted_sources.is_empty());
    assert_eq!(plan.stale_targets, vec![TargetRecord::copy("build/old.r")]);

    let no_stale = CleanupFlags {
        mirror_deleted_targets_to_output: false,
        ..CleanupFlags::default()
    };
    let plan = CleanupPlanner::new(&previous, &catalog, &current, no_stale).plan();
    assert!(plan.stale_targets.is_empty());
    assert_eq!(plan.deleted_sources, vec![TargetRecord::copy("build/gone.r")]);

    let neither = CleanupFlags {
        mirror_deleted_source_file_to_output: false,
        mirror_deleted_targets_to_output: false,
    };
    assert!(CleanupPlanner::new(&previous, &catalog, &current, neither)
        .plan()
        .is_empty());
}

#[test]
fn test_shared_outputs_are_removed_once() {
    let shared = TargetRecord::archive_entry("build/app.pl", ArchiveKind::Library, "common.r");
    let previous = history(vec![
        built("x.p", vec![shared.clone()], None),
        built("y.p", vec![shared.clone()], None),
    ]);

    let plan = CleanupPlanner::new(&previous, &[], &TargetSets::new(), CleanupFlags::default())
        .plan();
    assert_eq!(plan.deleted_sources, vec![shared]);
}

#[test]
fn test_nothing_to_clean_when_targets_are_unchanged() {
    let t = TargetRecord::remote("ftp://host/a.r");
    let previous = history(vec![built("a.p", vec![t.clone()], None)]);
    let catalog = vec![source("a.p", FileState::Replaced)];
    let current = sets(&[("a.p", vec![t])]);

    let plan = CleanupPlanner::new(&previous, &catalog, &current, CleanupFlags::default()).plan();
    assert!(plan.is_empty());
    assert!(plan.into_tasks(0).is_empty());
}

#[test]
fn test_plan_turns_into_numbered_removal_tasks() {
    let previous = history(vec![
        built("a.p", vec![TargetRecord::copy("build/stale.r")], None),
        built("b.p", vec![TargetRecord::copy("build/b.r")], None),
    ]);
    let catalog = vec![source("a.p", FileState::Existing)];
    let current = sets(&[("a.p", vec![])]);

    let tasks = CleanupPlanner::new(&previous, &catalog, &current, CleanupFlags::default())
        .plan()
        .into_tasks(3);

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].index(), 3);
    assert_eq!(tasks[0].label(), "cleanup:deleted-sources");
    assert_eq!(tasks[1].index(), 4);
    assert_eq!(tasks[1].label(), "cleanup:stale-targets");
    assert!(!tasks[0].is_file_task());

    match tasks[1].kind() {
        TaskKind::Remove { reason, records } => {
            assert_eq!(*reason, CleanupReason::StaleTargets);
            assert_eq!(records, &vec![TargetRecord::copy("build/stale.r")]);
        }
        other => panic!("expected a removal task, got {other:?}"),
    }
}

#[test]
fn test_single_batch_gets_first_index() {
    let previous = history(vec![built("gone.p", vec![TargetRecord::copy("build/g.r")], None)]);
    let tasks = CleanupPlanner::new(&previous, &[], &TargetSets::new(), CleanupFlags::default())
        .plan()
        .into_tasks(0);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].index(), 0);
    assert_eq!(tasks[0].label(), CleanupReason::DeletedSources.label());
}

#[test]
fn test_outputs_claimed_by_another_file_are_kept() {
    let moved = TargetRecord::copy("build/out/a.p");
    let handed_over = TargetRecord::copy("build/shared.r");
    let previous = history(vec![
        built("x/a.p", vec![moved.clone()], None),
        built("b.p", vec![handed_over.clone()], None),
    ]);
    let catalog = vec![
        source("y/a.p", FileState::Added),
        source("b.p", FileState::Existing),
        source("c.p", FileState::Added),
    ];
    let current = sets(&[
        ("y/a.p", vec![moved]),
        ("b.p", vec![]),
        ("c.p", vec![handed_over]),
    ]);

    let plan = CleanupPlanner::new(&previous, &catalog, &current, CleanupFlags::default()).plan();
    assert!(plan.is_empty(), "{plan:?}");
}
