// src/target/resolver.rs

use std::collections::BTreeMap;

use crate::history::{SourceFile, TargetRecord};
use crate::task::{Task, TaskKind};
use crate::types::{ArchiveKind, TargetType};

/// Expands task target templates into concrete output locations.
///
/// Resolution is pure string computation: the same task and file always
/// give the same records in the same order.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    output_dir: String,
}

impl TargetResolver {
    /// `output_dir` is where non-rooted results are placed.
    pub fn new(output_dir: impl Into<String>) -> Self {
        let output_dir = output_dir.into().replace('\\', "/");
        Self { output_dir }
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    /// All records `task` produces for `file`.
    ///
    /// One batch per matching include pattern (a file matched by two include
    /// clauses gets two batches), each batch being targets × archives.
    pub fn resolve(&self, task: &Task, file: &SourceFile) -> Vec<TargetRecord> {
        let mut records = Vec::new();
        if !task.is_file_task() {
            return records;
        }

        let source_dir = file.directory();
        let base_name = file.file_name();

        for captures in task.filter().include_matches(&file.path) {
            for target in task.targets() {
                let rendered = target.render(source_dir, &captures);
                let resolved = finish_target(&rendered, task.target_type(), base_name);

                match task.kind() {
                    TaskKind::Compile | TaskKind::Copy => {
                        records.push(TargetRecord::copy(self.under_output(&resolved)));
                    }
                    TaskKind::Upload { base_url } => {
                        records.push(TargetRecord::remote(join_url(base_url, &resolved)));
                    }
                    TaskKind::Archive { kind } => {
                        let entry = resolved.trim_start_matches('/').to_string();
                        for archive in task.archives() {
                            let container = collapse_separators(
                                archive.render(source_dir, &captures).trim_end_matches('/'),
                            );
                            records.push(TargetRecord::archive_entry(
                                self.under_output(&container),
                                *kind,
                                entry.clone(),
                            ));
                        }
                    }
                    TaskKind::Exec { .. } | TaskKind::Remove { .. } => {}
                }
            }
        }

        records
    }

    fn under_output(&self, path: &str) -> String {
        if is_rooted(path) || self.output_dir.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.output_dir.trim_end_matches('/'), path)
        }
    }
}

/// Apply the directory/file target rule to a rendered template.
fn finish_target(rendered: &str, target_type: TargetType, base_name: &str) -> String {
    let normalized = collapse_separators(rendered);
    let rooted_at_slash = normalized.starts_with('/');
    let trimmed = normalized.trim_end_matches('/');

    match target_type {
        TargetType::Directory if trimmed.is_empty() => {
            if rooted_at_slash {
                format!("/{base_name}")
            } else {
                base_name.to_string()
            }
        }
        TargetType::Directory => format!("{trimmed}/{base_name}"),
        TargetType::File if trimmed.is_empty() && rooted_at_slash => "/".to_string(),
        TargetType::File => trimmed.to_string(),
    }
}

/// Normalize `\` to `/` and squash repeated separators, leaving the `//`
/// of a URL scheme alone.
fn collapse_separators(path: &str) -> String {
    let path = path.replace('\\', "/");
    let (scheme, rest) = match path.find("://") {
        Some(idx) => path.split_at(idx + 3),
        None => ("", path.as_str()),
    };

    let mut out = String::with_capacity(path.len());
    out.push_str(scheme);
    let mut prev_slash = false;
    for c in rest.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}

/// Absolute paths, drive-prefixed paths and URLs are used as-is.
pub fn is_rooted(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') || path.contains("://") {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn join_url(base_url: &str, path: &str) -> String {
    if path.contains("://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Archive entries of one container, ready for a batched write or removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveGroup<E = String> {
    pub container: String,
    pub kind: ArchiveKind,
    pub entries: Vec<E>,
}

/// Group archive records by container, attaching a payload to each entry.
///
/// Non-archive records are skipped. Groups come out in container order;
/// entries keep their input order.
pub fn group_by_container<'r, E>(
    items: impl IntoIterator<Item = (&'r TargetRecord, E)>,
) -> Vec<ArchiveGroup<E>> {
    let mut groups: BTreeMap<(String, ArchiveKind), Vec<E>> = BTreeMap::new();
    for (record, payload) in items {
        if let TargetRecord::ArchiveEntry {
            container, kind, ..
        } = record
        {
            groups
                .entry((container.clone(), *kind))
                .or_default()
                .push(payload);
        }
    }
    groups
        .into_iter()
        .map(|((container, kind), entries)| ArchiveGroup {
            container,
            kind,
            entries,
        })
        .collect()
}

/// Group archive records into container → entry paths.
pub fn group_entry_names<'r>(
    records: impl IntoIterator<Item = &'r TargetRecord>,
) -> Vec<ArchiveGroup<String>> {
    group_by_container(records.into_iter().filter_map(|r| match r {
        TargetRecord::ArchiveEntry { entry, .. } => Some((r, entry.clone())),
        _ => None,
    }))
}
