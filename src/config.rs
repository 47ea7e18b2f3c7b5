//! Runtime configuration for locheal
//!
//! Everything is plain data read once at startup and passed into the
//! components that need it. The capture-mode flag in particular is never
//! consulted as ambient global state, so tests can exercise both modes
//! without touching the process environment.

use std::path::PathBuf;
use std::time::Duration;

/// Default location of the captured-failures store, kept stable so CI can
/// upload it as an artifact.
pub const DEFAULT_STORE_PATH: &str = "reports/captured_locator_failures.json";

const DEFAULT_ORACLE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_ORACLE_MODEL: &str = "openai/gpt-oss-120b:nitro";
const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;

/// Operating mode, fixed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealMode {
    /// Record failures for a later healing pass; the test fails naturally.
    Capture,
    /// Hand a suggested locator back to the caller for one in-test retry.
    Immediate,
}

/// Whether duplicate suppression survives across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupScope {
    /// Store is truncated at session start; keys live for one run.
    PerRun,
    /// Store file is kept; keys from earlier runs still suppress appends.
    Persistent,
}

#[derive(Debug, Clone)]
pub struct HealConfig {
    pub mode: HealMode,
    pub store_path: PathBuf,
    /// Directories scanned for locator declarations, relative to the
    /// project root (page-object and helper trees).
    pub search_roots: Vec<PathBuf>,
    pub dedup_scope: DedupScope,
    pub oracle_url: String,
    pub oracle_model: String,
    pub oracle_api_key: Option<String>,
    pub oracle_timeout: Duration,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            mode: HealMode::Immediate,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            search_roots: vec![PathBuf::from("SRC/pages"), PathBuf::from("SRC/helpers")],
            dedup_scope: DedupScope::PerRun,
            oracle_url: DEFAULT_ORACLE_URL.to_string(),
            oracle_model: DEFAULT_ORACLE_MODEL.to_string(),
            oracle_api_key: None,
            oracle_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
        }
    }
}

impl HealConfig {
    /// Read configuration from the environment once.
    ///
    /// Capture mode is selected when `LOCHEAL_CAPTURE=1` or when a CI
    /// environment is detected (`CI` / `GITHUB_ACTIONS`); local runs heal
    /// immediately so a developer sees the retry in the same session.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let capture = match std::env::var("LOCHEAL_CAPTURE").ok().as_deref() {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            _ => env_flag("GITHUB_ACTIONS") || env_flag("CI"),
        };
        config.mode = if capture {
            HealMode::Capture
        } else {
            HealMode::Immediate
        };

        if let Ok(path) = std::env::var("LOCHEAL_STORE") {
            if !path.trim().is_empty() {
                config.store_path = PathBuf::from(path);
            }
        }

        if let Ok(roots) = std::env::var("LOCHEAL_SEARCH_ROOTS") {
            let parsed: Vec<PathBuf> = roots
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
            if !parsed.is_empty() {
                config.search_roots = parsed;
            }
        }

        if env_flag("LOCHEAL_PERSISTENT_DEDUP") {
            config.dedup_scope = DedupScope::Persistent;
        }

        if let Ok(url) = std::env::var("LOCHEAL_ORACLE_URL") {
            if !url.trim().is_empty() {
                config.oracle_url = url;
            }
        }
        if let Ok(model) = std::env::var("LOCHEAL_ORACLE_MODEL") {
            if !model.trim().is_empty() {
                config.oracle_model = model;
            }
        }
        config.oracle_api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        if let Some(secs) = std::env::var("LOCHEAL_ORACLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.oracle_timeout = Duration::from_secs(secs.clamp(1, 300));
        }

        config
    }
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).ok().as_deref(),
        Some("1") | Some("true")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_immediate_mode() {
        let config = HealConfig::default();
        assert_eq!(config.mode, HealMode::Immediate);
        assert_eq!(config.dedup_scope, DedupScope::PerRun);
        assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE_PATH));
    }

    #[test]
    fn test_default_search_roots_cover_page_objects() {
        let config = HealConfig::default();
        assert!(config
            .search_roots
            .iter()
            .any(|p| p.ends_with("pages")));
    }
}
