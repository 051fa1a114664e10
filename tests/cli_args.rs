use std::path::{Path, PathBuf};

use clap::Parser;
use incbuild::cli::{CliArgs, LogLevel};
use incbuild::config_root_dir;
use incbuild::logging::parse_level_str;

#[test]
fn test_defaults() {
    let args = CliArgs::try_parse_from(["incbuild"]).expect("defaults parse");
    assert_eq!(args.config, "Incbuild.toml");
    assert!(args.environment.is_none());
    assert!(!args.full_rebuild);
    assert!(!args.dry_run);
    assert!(args.log_level.is_none());
}

#[test]
fn test_all_flags() {
    let args = CliArgs::try_parse_from([
        "incbuild",
        "--config",
        "ci/Incbuild.toml",
        "--environment",
        "env.toml",
        "--full-rebuild",
        "--dry-run",
        "--log-level",
        "debug",
    ])
    .expect("flags parse");
    assert_eq!(args.config, "ci/Incbuild.toml");
    assert_eq!(args.environment.as_deref(), Some("env.toml"));
    assert!(args.full_rebuild);
    assert!(args.dry_run);
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));

    assert!(CliArgs::try_parse_from(["incbuild", "--log-level", "loud"]).is_err());
}

#[test]
fn test_level_strings() {
    assert_eq!(parse_level_str(" WARNING "), Some(tracing::Level::WARN));
    assert_eq!(parse_level_str("trace"), Some(tracing::Level::TRACE));
    assert_eq!(parse_level_str("verbose"), None);
}

#[test]
fn test_config_root_dir() {
    assert_eq!(
        config_root_dir(Path::new("ci/Incbuild.toml")),
        PathBuf::from("ci")
    );
    let cwd = std::env::current_dir().expect("cwd");
    assert_eq!(config_root_dir(Path::new("Incbuild.toml")), cwd);
}
