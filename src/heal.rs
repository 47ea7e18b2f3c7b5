//! Healing orchestrator
//!
//! Drains the failure store and applies the patch engine to each record
//! independently, in persisted order. One record's failure never blocks the
//! rest; the summary carries everything the PR collaborator needs.

use crate::patch::{LineChange, PatchEngine, PatchResult, PatchStrategy, SkipReason};
use crate::record::FailureRecord;
use crate::store::FailureStore;
use crate::util::truncate;
use anyhow::Result;

/// Per-record outcome, in human-reportable form.
#[derive(Debug, Clone)]
pub struct HealDetail {
    pub failing_locator: String,
    pub suggested_locator: Option<String>,
    pub element_description: String,
    pub outcome: HealOutcome,
}

#[derive(Debug, Clone)]
pub enum HealOutcome {
    Applied {
        strategy: PatchStrategy,
        change: LineChange,
    },
    Skipped(SkipReason),
    Failed(SkipReason),
}

#[derive(Debug, Clone, Default)]
pub struct HealSummary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub details: Vec<HealDetail>,
}

impl HealSummary {
    pub fn total(&self) -> usize {
        self.applied + self.skipped + self.failed
    }

    fn push(&mut self, record: &FailureRecord, result: PatchResult) {
        let outcome = match (result.applied, result.change, result.reason) {
            (true, Some(change), _) => {
                self.applied += 1;
                HealOutcome::Applied {
                    strategy: result.strategy,
                    change,
                }
            }
            (_, _, Some(reason @ SkipReason::Io(_))) => {
                self.failed += 1;
                HealOutcome::Failed(reason)
            }
            (_, _, Some(reason)) => {
                self.skipped += 1;
                HealOutcome::Skipped(reason)
            }
            // An unapplied result always carries a reason; guard anyway.
            (_, _, None) => {
                self.skipped += 1;
                HealOutcome::Skipped(SkipReason::NotFound)
            }
        };
        self.details.push(HealDetail {
            failing_locator: record.failing_locator.clone(),
            suggested_locator: record.suggested_locator.clone(),
            element_description: record.element_description.clone(),
            outcome,
        });
    }

    /// PR title for the branch carrying these fixes.
    pub fn pr_title(&self) -> String {
        if self.applied == 1 {
            "Fix 1 broken locator".to_string()
        } else {
            format!("Fix {} broken locators", self.applied)
        }
    }

    /// Markdown PR body: one diff block per applied fix, then the skip
    /// list. This is the sole input the PR collaborator needs.
    pub fn pr_body(&self) -> String {
        let mut body = String::from(
            "## Locator fixes\n\nAutomated single-line replacements for locators that \
             failed during the last test run. Please verify each selector against the \
             current UI before merging.\n",
        );

        for detail in &self.details {
            if let HealOutcome::Applied { change, .. } = &detail.outcome {
                body.push_str(&format!(
                    "\n### `{}` ({})\n`{}:{}`\n```diff\n- {}\n+ {}\n```\n",
                    detail.failing_locator,
                    detail.element_description,
                    change.file.display(),
                    change.line_number,
                    change.old_line,
                    change.new_line,
                ));
            }
        }

        let unapplied: Vec<&HealDetail> = self
            .details
            .iter()
            .filter(|d| !matches!(d.outcome, HealOutcome::Applied { .. }))
            .collect();
        if !unapplied.is_empty() {
            body.push_str("\n### Not applied\n");
            for detail in unapplied {
                let reason = match &detail.outcome {
                    HealOutcome::Skipped(r) | HealOutcome::Failed(r) => r.to_string(),
                    HealOutcome::Applied { .. } => unreachable!(),
                };
                body.push_str(&format!(
                    "- `{}` ({}): {}\n",
                    detail.failing_locator,
                    truncate(&detail.element_description, 60),
                    reason
                ));
            }
        }

        body
    }

    /// One-line-per-record console report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for detail in &self.details {
            match &detail.outcome {
                HealOutcome::Applied { strategy, change } => {
                    let via = match strategy {
                        PatchStrategy::ExactLine => "exact line",
                        PatchStrategy::FullFileSearch => "file search",
                        PatchStrategy::None => "none",
                    };
                    out.push_str(&format!(
                        "  + {} -> {} ({}:{}, {})\n",
                        detail.failing_locator,
                        detail.suggested_locator.as_deref().unwrap_or("?"),
                        change.file.display(),
                        change.line_number,
                        via
                    ));
                }
                HealOutcome::Skipped(reason) => {
                    out.push_str(&format!(
                        "  · {} skipped: {}\n",
                        detail.failing_locator, reason
                    ));
                }
                HealOutcome::Failed(reason) => {
                    out.push_str(&format!(
                        "  ● {} failed: {}\n",
                        detail.failing_locator, reason
                    ));
                }
            }
        }
        out.push_str(&format!(
            "\n  {} applied, {} skipped, {} failed ({} record{})\n",
            self.applied,
            self.skipped,
            self.failed,
            self.total(),
            if self.total() == 1 { "" } else { "s" }
        ));
        out
    }
}

/// Read all pending records and patch each one independently.
pub fn run(store: &FailureStore, engine: &PatchEngine) -> Result<HealSummary> {
    let records = store.read_all()?;
    let mut summary = HealSummary::default();
    for record in &records {
        let result = engine.apply(record);
        summary.push(record, result);
    }
    Ok(summary)
}
