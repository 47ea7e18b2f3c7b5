//! Patch engine
//!
//! Rewrites the exact source line that declares a failing locator with the
//! oracle's suggestion. Strategies are layered: the captured line number is
//! tried first, then a full-file search guarded by the same declaration
//! validation the resolver uses. The engine never does a blind whole-file
//! replace; a candidate line must either be the captured site or pass
//! declaration validation, so the same string inside a call, comment, or
//! assertion is never mutated.
//!
//! Each applied record changes exactly one line. The file's line-ending
//! style is preserved and the rewrite is atomic. Re-applying an
//! already-applied record finds the old literal gone and reports
//! `NotFound`, which callers treat as a no-op.

use crate::record::FailureRecord;
use crate::resolve::match_declaration;
use crate::util::write_atomic;
use std::fs;
use std::path::{Path, PathBuf};

/// Which layered strategy produced the patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStrategy {
    /// The captured line number still held the quoted literal
    ExactLine,
    /// Line number was stale; a validated declaration was found elsewhere
    FullFileSearch,
    /// No strategy applied
    None,
}

/// Why a record was skipped or failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Record carries no suggested locator; capturable but not healable
    NoSuggestion,
    /// Record carries no source location to patch
    NoLocation,
    /// The failing literal is absent from every valid declaration line
    NotFound,
    /// The target file could not be read or written
    Io(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoSuggestion => write!(f, "no suggested locator"),
            SkipReason::NoLocation => write!(f, "no source location captured"),
            SkipReason::NotFound => write!(f, "declaration literal not found"),
            SkipReason::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

/// The one-line change made by an applied patch, in the shape the PR
/// collaborator needs (no store access required downstream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineChange {
    pub file: PathBuf,
    /// 1-based line that was rewritten
    pub line_number: usize,
    pub old_line: String,
    pub new_line: String,
}

/// Outcome of one `PatchEngine::apply` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchResult {
    pub applied: bool,
    pub strategy: PatchStrategy,
    pub reason: Option<SkipReason>,
    pub change: Option<LineChange>,
}

impl PatchResult {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            applied: false,
            strategy: PatchStrategy::None,
            reason: Some(reason),
            change: None,
        }
    }

    fn applied(strategy: PatchStrategy, change: LineChange) -> Self {
        Self {
            applied: true,
            strategy,
            reason: None,
            change: Some(change),
        }
    }
}

/// Stateless between invocations: a pure function of a record and the
/// file system.
pub struct PatchEngine {
    project_root: PathBuf,
}

impl PatchEngine {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    pub fn apply(&self, record: &FailureRecord) -> PatchResult {
        let Some(suggestion) = record
            .suggested_locator
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        else {
            return PatchResult::skipped(SkipReason::NoSuggestion);
        };

        let Some(file) = record.test_file.as_ref() else {
            return PatchResult::skipped(SkipReason::NoLocation);
        };
        let path = if file.is_absolute() {
            file.clone()
        } else {
            self.project_root.join(file)
        };

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => return PatchResult::skipped(SkipReason::Io(e.to_string())),
        };

        // Lines with their terminators so CRLF/LF style survives untouched.
        let mut lines: Vec<String> = content
            .split_inclusive('\n')
            .map(str::to_string)
            .collect();

        let patched = Self::try_exact_line(&lines, record, suggestion)
            .or_else(|| Self::try_full_file(&lines, record, suggestion));

        let Some((index, new_text, strategy)) = patched else {
            return PatchResult::skipped(SkipReason::NotFound);
        };

        let old_line = strip_eol(&lines[index]).to_string();
        let new_line = strip_eol(&new_text).to_string();
        lines[index] = new_text;

        let rewritten: String = lines.concat();
        if let Err(e) = write_atomic(&path, &rewritten) {
            return PatchResult::skipped(SkipReason::Io(e.to_string()));
        }

        PatchResult::applied(
            strategy,
            LineChange {
                file: path,
                line_number: index + 1,
                old_line,
                new_line,
            },
        )
    }

    /// Strategy 1: the captured line number, when still in range and still
    /// holding the quoted literal.
    fn try_exact_line(
        lines: &[String],
        record: &FailureRecord,
        suggestion: &str,
    ) -> Option<(usize, String, PatchStrategy)> {
        let line_number = record.line_number?;
        if line_number == 0 || line_number > lines.len() {
            return None;
        }
        let index = line_number - 1;
        let new_text = replace_quoted(&lines[index], &record.failing_locator, suggestion)?;
        Some((index, new_text, PatchStrategy::ExactLine))
    }

    /// Strategy 2: the captured line drifted; find a line that passes
    /// declaration validation for the literal anywhere in the file.
    fn try_full_file(
        lines: &[String],
        record: &FailureRecord,
        suggestion: &str,
    ) -> Option<(usize, String, PatchStrategy)> {
        for (index, line) in lines.iter().enumerate() {
            if match_declaration(strip_eol(line), &record.failing_locator).is_none() {
                continue;
            }
            if let Some(new_text) = replace_quoted(line, &record.failing_locator, suggestion) {
                return Some((index, new_text, PatchStrategy::FullFileSearch));
            }
        }
        None
    }
}

/// Replace the first quoted occurrence of `literal` in `line`, preserving
/// the original quote character. Double quotes are tried before single
/// quotes. Returns `None` when no quoted occurrence exists; a bare
/// substring outside quotes never matches.
fn replace_quoted(line: &str, literal: &str, replacement: &str) -> Option<String> {
    for quote in ['"', '\''] {
        let old = format!("{}{}{}", quote, literal, quote);
        if line.contains(&old) {
            let new = format!("{}{}{}", quote, replacement, quote);
            return Some(line.replacen(&old, &new, 1));
        }
    }
    None
}

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches('\n').trim_end_matches('\r')
}
