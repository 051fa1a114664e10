// src/target/template.rs

use std::fmt;

use crate::source::CaptureMap;

/// Placeholder replaced by the matched file's directory.
pub const FILE_SOURCE_DIRECTORY: &str = "FILE_SOURCE_DIRECTORY";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    SourceDirectory,
    Capture(String),
}

/// A parsed target template: literal text with `<NAME>` placeholders.
///
/// Parsing rejects malformed placeholders and characters that cannot appear
/// in a path, so rendering never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.trim().is_empty() {
            return Err("template is empty".to_string());
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(ch) = rest.chars().next() {
            match ch {
                '<' => {
                    let close = rest
                        .find('>')
                        .ok_or_else(|| format!("unterminated placeholder in template '{raw}'"))?;
                    let name = &rest[1..close];
                    if !is_placeholder_name(name) {
                        return Err(format!(
                            "malformed placeholder '<{name}>' in template '{raw}'"
                        ));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(if name == FILE_SOURCE_DIRECTORY {
                        Segment::SourceDirectory
                    } else {
                        Segment::Capture(name.to_string())
                    });
                    rest = &rest[close + 1..];
                }
                '>' | '"' | '|' | '?' | '*' => {
                    return Err(format!("illegal character '{ch}' in template '{raw}'"));
                }
                c if c.is_control() => {
                    return Err(format!(
                        "illegal control character {:?} in template '{raw}'",
                        c
                    ));
                }
                c => {
                    literal.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Substitute placeholders. Unknown capture names render as empty.
    pub fn render(&self, source_dir: &str, captures: &CaptureMap) -> String {
        let mut out = String::with_capacity(self.raw.len() + source_dir.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::SourceDirectory => out.push_str(source_dir),
                Segment::Capture(name) => {
                    if let Some(value) = captures.get(name) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_placeholder_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
