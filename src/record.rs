//! Failure record data model
//!
//! A `FailureRecord` is the unit of work between capture (inside a test
//! worker) and healing (the later orchestrator pass). Field names are part
//! of the on-disk contract: CI artifact tooling diffs the store file across
//! runs, so they must stay stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One captured locator failure, immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Capture instant
    pub timestamp: DateTime<Utc>,
    /// Source file that declares the failing locator (best-effort)
    pub test_file: Option<PathBuf>,
    /// 1-based line of the declaration (best-effort)
    pub line_number: Option<usize>,
    /// The exact string that failed to resolve to a UI element
    pub failing_locator: String,
    /// The oracle's candidate replacement, if it produced one
    pub suggested_locator: Option<String>,
    /// Human-readable hint describing the element's purpose
    pub element_description: String,
    /// The underlying lookup failure text
    pub error_message: String,
}

impl FailureRecord {
    /// Build a record. Rejects an empty locator: a record without one is
    /// meaningless to both the store and the patch engine.
    pub fn new(
        failing_locator: impl Into<String>,
        element_description: impl Into<String>,
        error_message: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let failing_locator = failing_locator.into();
        if failing_locator.trim().is_empty() {
            anyhow::bail!("failing_locator must not be empty");
        }
        Ok(Self {
            timestamp: Utc::now(),
            test_file: None,
            line_number: None,
            failing_locator,
            suggested_locator: None,
            element_description: element_description.into(),
            error_message: error_message.into(),
        })
    }

    pub fn with_location(mut self, file: PathBuf, line: usize) -> Self {
        self.test_file = Some(file);
        self.line_number = Some(line);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        let s = suggestion.into();
        if !s.trim().is_empty() {
            self.suggested_locator = Some(s);
        }
        self
    }

    /// Deduplication key: same locator failing at the same declaration site
    /// within one store lifetime is redundant healing work.
    pub fn dedup_key(&self) -> (String, Option<PathBuf>, Option<usize>) {
        (
            self.failing_locator.clone(),
            self.test_file.clone(),
            self.line_number,
        )
    }

    /// A record with no suggestion is capturable but not healable.
    pub fn is_healable(&self) -> bool {
        self.suggested_locator
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// How confident the resolver is that a line is the true declaration site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// Assignment + naming convention + quoted literal all matched
    Exact,
    /// Literal found somewhere, declaration shape not verified
    Heuristic,
}

/// Where a locator string is declared in the source tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationSite {
    pub file_path: PathBuf,
    /// 1-based
    pub line_number: usize,
    pub line_text: String,
    pub confidence: Confidence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_rejects_empty_locator() {
        assert!(FailureRecord::new("", "login button", "not found").is_err());
        assert!(FailureRecord::new("   ", "login button", "not found").is_err());
    }

    #[test]
    fn test_record_without_suggestion_is_not_healable() {
        let record = FailureRecord::new("#old-btn", "submit", "timeout").unwrap();
        assert!(!record.is_healable());

        let record = record.with_suggestion("[data-testid='submit']");
        assert!(record.is_healable());
    }

    #[test]
    fn test_blank_suggestion_is_ignored() {
        let record = FailureRecord::new("#old-btn", "submit", "timeout")
            .unwrap()
            .with_suggestion("  ");
        assert!(record.suggested_locator.is_none());
    }

    #[test]
    fn test_dedup_key_ignores_error_text() {
        let a = FailureRecord::new("#btn", "submit", "timeout 30s")
            .unwrap()
            .with_location(PathBuf::from("pages/login.py"), 12);
        let mut b = a.clone();
        b.error_message = "different error".to_string();
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_serialized_field_names_are_stable() {
        let record = FailureRecord::new("#btn", "submit", "timeout")
            .unwrap()
            .with_location(PathBuf::from("pages/login.py"), 12)
            .with_suggestion("#new-btn");
        let json = serde_json::to_string(&record).unwrap();
        for field in [
            "timestamp",
            "test_file",
            "line_number",
            "failing_locator",
            "suggested_locator",
            "element_description",
            "error_message",
        ] {
            assert!(json.contains(field), "missing field {} in {}", field, json);
        }
    }
}
