mod common;

use std::collections::HashSet;
use std::path::Path;

use common::{built, history, TestResult};
use incbuild::cancel::CancelToken;
use incbuild::errors::BuildError;
use incbuild::fs::mock::MockFileSystem;
use incbuild::fs::RealFileSystem;
use incbuild::history::FileState;
use incbuild::source::hash::compute_file_hash;
use incbuild::source::{
    ComparisonModes, FileFilter, ListOptions, Matcher, PatternPolicy, SourceLister,
};
use incbuild_test_utils::init_tracing;

fn with_metadata() -> ListOptions {
    ListOptions {
        with_metadata: true,
        compare: ComparisonModes::default(),
    }
}

fn wildcard(p: &str) -> Matcher {
    Matcher::wildcard(p, PatternPolicy::default()).unwrap()
}

#[test]
fn test_missing_root_is_empty_catalog() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    let files = SourceLister::new(&fs, Path::new("nope")).list(&CancelToken::new())?;
    assert!(files.is_empty());
    Ok(())
}

#[test]
fn test_root_that_is_a_file_is_root_io_error() {
    let fs = MockFileSystem::new();
    fs.add_file("src", b"not a dir".to_vec());

    let err = SourceLister::new(&fs, Path::new("src"))
        .list(&CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, BuildError::RootIo { .. }), "got {err:?}");
}

#[test]
fn test_recursive_scan_is_sorted_and_relative() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("src/z.p", b"z".to_vec());
    fs.add_file("src/a/b.p", b"b".to_vec());
    fs.add_file("src/a/c/d.i", b"d".to_vec());

    let files = SourceLister::new(&fs, Path::new("src")).list(&CancelToken::new())?;
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["a/b.p", "a/c/d.i", "z.p"]);
    Ok(())
}

#[test]
fn test_symlinks_are_not_followed() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("src/a.p", b"a".to_vec());
    fs.add_symlink("src/link.p", "src/a.p");

    let files = SourceLister::new(&fs, Path::new("src")).list(&CancelToken::new())?;
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["a.p"]);
    Ok(())
}

#[test]
fn test_include_exclude_and_vcs_filters() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("src/a.p", b"a".to_vec());
    fs.add_file("src/b.p", b"b".to_vec());
    fs.add_file("src/tmp/c.p", b"c".to_vec());
    fs.add_file("src/d.w", b"d".to_vec());

    let filter = FileFilter::new(vec![wildcard("*.p")], vec![wildcard("tmp/**")]);
    let files = SourceLister::new(&fs, Path::new("src"))
        .with_filter(&filter)
        .list(&CancelToken::new())?;
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["a.p", "b.p"]);

    let vcs: HashSet<String> = ["b.p".to_string(), "d.w".to_string()].into();
    let files = SourceLister::new(&fs, Path::new("src"))
        .with_filter(&filter)
        .with_vcs(&vcs)
        .list(&CancelToken::new())?;
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["b.p"]);
    Ok(())
}

#[test]
fn test_state_against_previous_snapshot() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/same.p", b"0123456789".to_vec(), 1_000);
    fs.add_file_with_mtime("src/newer.p", b"0123456789".to_vec(), 5_000);
    fs.add_file_with_mtime("src/fresh.p", b"x".to_vec(), 1_000);

    let previous = history(vec![
        built("same.p", vec![], None),
        built("newer.p", vec![], None),
        built("gone.p", vec![], None),
    ]);

    let files = SourceLister::new(&fs, Path::new("src"))
        .with_previous(&previous)
        .with_options(with_metadata())
        .list(&CancelToken::new())?;

    let state = |p: &str| files.iter().find(|f| f.path == p).map(|f| f.state);
    assert_eq!(state("same.p"), Some(FileState::Existing));
    assert_eq!(state("newer.p"), Some(FileState::Replaced));
    assert_eq!(state("fresh.p"), Some(FileState::Added));
    // Deleted paths are never reported.
    assert_eq!(state("gone.p"), None);
    Ok(())
}

#[test]
fn test_hash_comparison_detects_same_size_same_mtime_edit() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.p", b"0123456789".to_vec(), 1_000);

    let mut prev = built("a.p", vec![], None);
    prev.hash = Some(compute_file_hash(&fs, Path::new("src/a.p"))?);
    let previous = history(vec![prev]);

    let options = ListOptions {
        with_metadata: true,
        compare: ComparisonModes {
            size: true,
            mtime: true,
            hash: true,
        },
    };

    let files = SourceLister::new(&fs, Path::new("src"))
        .with_previous(&previous)
        .with_options(options)
        .list(&CancelToken::new())?;
    assert_eq!(files[0].state, FileState::Existing);

    fs.add_file_with_mtime("src/a.p", b"9876543210".to_vec(), 1_000);
    let files = SourceLister::new(&fs, Path::new("src"))
        .with_previous(&previous)
        .with_options(options)
        .list(&CancelToken::new())?;
    assert_eq!(files[0].state, FileState::Replaced);
    assert!(files[0].hash.is_some());
    Ok(())
}

#[test]
fn test_without_metadata_state_only_tracks_presence() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("src/a.p", b"a".to_vec());
    fs.add_file("src/b.p", b"b".to_vec());
    let previous = history(vec![built("a.p", vec![], None)]);

    let files = SourceLister::new(&fs, Path::new("src"))
        .with_previous(&previous)
        .list(&CancelToken::new())?;
    assert_eq!(files[0].state, FileState::Existing);
    assert_eq!(files[0].size, 0);
    assert_eq!(files[1].state, FileState::Added);
    Ok(())
}

#[test]
fn test_cancelled_scan_returns_cancelled() {
    let fs = MockFileSystem::new();
    fs.add_file("src/a.p", b"a".to_vec());
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = SourceLister::new(&fs, Path::new("src")).list(&cancel).unwrap_err();
    assert!(matches!(err, BuildError::Cancelled));
}

#[test]
fn test_real_filesystem_scan() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("a/b"))?;
    std::fs::write(dir.path().join("a/b/x.p"), "x")?;
    std::fs::write(dir.path().join("y.w"), "yy")?;

    let fs = RealFileSystem;
    let files = SourceLister::new(&fs, dir.path())
        .with_options(with_metadata())
        .list(&CancelToken::new())?;

    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["a/b/x.p", "y.w"]);
    assert_eq!(files[1].size, 2);
    assert!(files.iter().all(|f| f.state == FileState::Added));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_real_filesystem_skips_symlinked_dirs() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("real"))?;
    std::fs::write(dir.path().join("real/x.p"), "x")?;
    std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias"))?;

    let files = SourceLister::new(&RealFileSystem, dir.path()).list(&CancelToken::new())?;
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["real/x.p"]);
    Ok(())
}

#[test]
fn test_content_hash_is_blake3_hex() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("test.txt", b"hello world".to_vec());

    let hash = compute_file_hash(&fs, Path::new("test.txt"))?;
    assert_eq!(
        hash,
        "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
    );
    assert!(compute_file_hash(&fs, Path::new("missing.txt")).is_err());
    Ok(())
}
