//! Failure capture orchestration
//!
//! `FailureRecorder` sits between the test harness and the rest of the
//! pipeline. On a failed locator lookup it resolves the declaration site,
//! asks the oracle for a replacement, and either persists a record for a
//! later healing pass (capture mode, CI) or hands the candidate back for a
//! single in-test retry (immediate mode, local runs).
//!
//! Capture faults never change what the test suite reports: the original
//! lookup failure is what the caller surfaces, always.

use crate::config::{HealConfig, HealMode};
use crate::oracle::SuggestionOracle;
use crate::record::FailureRecord;
use crate::resolve::SourceResolver;
use crate::store::{FailureStore, StoreError};

pub struct FailureRecorder<O: SuggestionOracle> {
    mode: HealMode,
    resolver: SourceResolver,
    oracle: O,
    store: FailureStore,
}

impl<O: SuggestionOracle> FailureRecorder<O> {
    pub fn new(config: &HealConfig, resolver: SourceResolver, oracle: O) -> Self {
        Self {
            mode: config.mode,
            resolver,
            oracle,
            store: FailureStore::new(config.store_path.clone()),
        }
    }

    pub fn mode(&self) -> HealMode {
        self.mode
    }

    /// Handle one failed locator lookup.
    ///
    /// Capture mode: build and persist a record, return `Ok(None)` so the
    /// caller lets the original failure propagate. A store that stays busy
    /// past its retries is the only error surfaced here.
    ///
    /// Immediate mode: return `Ok(Some(candidate))` when the oracle produced
    /// one; the caller retries the lookup exactly once and abandons the
    /// attempt if that also fails.
    pub fn on_lookup_failure(
        &self,
        locator: &str,
        description: &str,
        error_message: &str,
    ) -> Result<Option<String>, StoreError> {
        // Resolve and consult the oracle before any store lock is taken;
        // both can be slow and neither may hold write exclusivity.
        let site = self.resolver.resolve(locator);

        let suggestion = match self.oracle.suggest(locator, description, error_message) {
            Ok(candidate) => Some(candidate),
            Err(err) => {
                eprintln!("  Warning: suggestion oracle unavailable: {}", err);
                None
            }
        };

        match self.mode {
            HealMode::Immediate => Ok(suggestion),
            HealMode::Capture => {
                let mut record = match FailureRecord::new(locator, description, error_message) {
                    Ok(r) => r,
                    Err(err) => {
                        // Empty locator: nothing to capture, nothing to heal.
                        eprintln!("  Warning: skipping capture: {}", err);
                        return Ok(None);
                    }
                };
                if let Some(site) = site {
                    record = record.with_location(site.file_path, site.line_number);
                }
                if let Some(candidate) = suggestion {
                    record = record.with_suggestion(candidate);
                }
                self.store.append(&record)?;
                Ok(None)
            }
        }
    }
}
