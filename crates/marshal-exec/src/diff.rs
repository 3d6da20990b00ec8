//! Unified diff parsing and application.
//!
//! The applier is strict: context and deletion lines must match the current
//! file contents exactly, and the new content is fully materialized before
//! anything is written. A mismatch anywhere yields `PatchConflict` and the
//! file is left untouched.

use marshal_protocol::{MarshalError, MarshalResult};

#[derive(Debug, Clone, PartialEq)]
pub enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hunk {
    /// 1-based start line in the old file; 0 for pure insertions into an
    /// empty file.
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<HunkLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDiff {
    /// Old-side path from the `---` header, when present. `/dev/null`
    /// marks a file-creation diff.
    pub old_path: Option<String>,
    pub hunks: Vec<Hunk>,
}

impl ParsedDiff {
    pub fn creates_file(&self) -> bool {
        self.old_path.as_deref() == Some("/dev/null")
    }
}

/// Parse a unified diff body into hunks.
pub fn parse_diff(diff: &str) -> MarshalResult<ParsedDiff> {
    let mut old_path = None;
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("--- ") {
            old_path = Some(strip_prefix_marker(rest).to_owned());
            continue;
        }
        if line.starts_with("+++ ")
            || line.starts_with("diff ")
            || line.starts_with("index ")
            || line.starts_with("new file")
            || line.starts_with("deleted file")
            || line.starts_with("\\ No newline")
        {
            continue;
        }
        if let Some(header) = line.strip_prefix("@@") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            current = Some(parse_hunk_header(header)?);
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            // Preamble noise before the first hunk is tolerated.
            continue;
        };
        if let Some(rest) = line.strip_prefix('+') {
            hunk.lines.push(HunkLine::Add(rest.to_owned()));
        } else if let Some(rest) = line.strip_prefix('-') {
            hunk.lines.push(HunkLine::Remove(rest.to_owned()));
        } else if let Some(rest) = line.strip_prefix(' ') {
            hunk.lines.push(HunkLine::Context(rest.to_owned()));
        } else if line.is_empty() {
            hunk.lines.push(HunkLine::Context(String::new()));
        } else {
            return Err(MarshalError::PatchConflict(format!(
                "unrecognized diff line: `{line}`"
            )));
        }
    }
    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }

    if hunks.is_empty() {
        return Err(MarshalError::PatchConflict(
            "diff contains no hunks".to_owned(),
        ));
    }
    Ok(ParsedDiff { old_path, hunks })
}

/// Apply parsed hunks to the original content, producing the new content.
pub fn apply_hunks(original: &str, hunks: &[Hunk]) -> MarshalResult<String> {
    let original_lines: Vec<&str> = original.lines().collect();
    let mut output: Vec<String> = Vec::new();
    let mut cursor = 0usize;

    for hunk in hunks {
        let start = hunk.old_start.saturating_sub(1);
        if start < cursor {
            return Err(MarshalError::PatchConflict(
                "hunks overlap or are out of order".to_owned(),
            ));
        }
        if start > original_lines.len() {
            return Err(MarshalError::PatchConflict(format!(
                "hunk starts at line {} but file has {} lines",
                hunk.old_start,
                original_lines.len()
            )));
        }
        for line in &original_lines[cursor..start] {
            output.push((*line).to_owned());
        }
        cursor = start;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(text) => {
                    match original_lines.get(cursor) {
                        Some(actual) if *actual == text => {}
                        Some(actual) => {
                            return Err(MarshalError::PatchConflict(format!(
                                "context mismatch at line {}: expected `{text}`, found `{actual}`",
                                cursor + 1
                            )));
                        }
                        None => {
                            return Err(MarshalError::PatchConflict(format!(
                                "context `{text}` expected past end of file"
                            )));
                        }
                    }
                    output.push(text.clone());
                    cursor += 1;
                }
                HunkLine::Remove(text) => {
                    match original_lines.get(cursor) {
                        Some(actual) if *actual == text => {}
                        Some(actual) => {
                            return Err(MarshalError::PatchConflict(format!(
                                "deletion mismatch at line {}: expected `{text}`, found `{actual}`",
                                cursor + 1
                            )));
                        }
                        None => {
                            return Err(MarshalError::PatchConflict(format!(
                                "deletion `{text}` expected past end of file"
                            )));
                        }
                    }
                    cursor += 1;
                }
                HunkLine::Add(text) => output.push(text.clone()),
            }
        }
    }

    for line in &original_lines[cursor..] {
        output.push((*line).to_owned());
    }

    if output.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!("{}\n", output.join("\n")))
    }
}

fn parse_hunk_header(header: &str) -> MarshalResult<Hunk> {
    // Header tail looks like ` -l[,c] +l[,c] @@ ...`.
    let malformed = || MarshalError::PatchConflict(format!("malformed hunk header: `@@{header}`"));
    let body = header.split("@@").next().ok_or_else(malformed)?.trim();
    let mut parts = body.split_whitespace();

    let old = parts.next().ok_or_else(malformed)?;
    let new = parts.next().ok_or_else(malformed)?;
    let (old_start, old_count) = parse_range(old.strip_prefix('-').ok_or_else(malformed)?)
        .ok_or_else(malformed)?;
    let (new_start, new_count) = parse_range(new.strip_prefix('+').ok_or_else(malformed)?)
        .ok_or_else(malformed)?;

    Ok(Hunk {
        old_start,
        old_count,
        new_start,
        new_count,
        lines: Vec::new(),
    })
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

fn strip_prefix_marker(path: &str) -> &str {
    // `--- a/src/lib.rs` and plain `--- src/lib.rs` are both accepted;
    // `/dev/null` stays as-is.
    let path = path.split('\t').next().unwrap_or(path).trim();
    if path == "/dev/null" {
        return path;
    }
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
}
