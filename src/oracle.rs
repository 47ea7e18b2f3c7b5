//! Suggestion oracle
//!
//! External collaborator that turns failure evidence into a candidate
//! replacement locator. The core treats it as opaque: any error here
//! degrades to "no suggestion" in the capture path, never a test failure.
//!
//! The shipped implementation calls an OpenRouter-compatible
//! chat-completions endpoint with a blocking client and a bounded timeout;
//! capture runs inside synchronous test workers, so there is no async
//! runtime to borrow.

use crate::config::HealConfig;
use crate::util::truncate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("suggestion oracle not configured (no API key)")]
    Unconfigured,
    #[error("suggestion oracle timed out")]
    Timeout,
    #[error("suggestion oracle request failed: {0}")]
    Transport(String),
    #[error("suggestion oracle returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("suggestion oracle response had no usable content")]
    MalformedResponse,
}

/// Single-method capability interface for replacement-locator suggestions.
pub trait SuggestionOracle {
    fn suggest(
        &self,
        locator: &str,
        description: &str,
        error_message: &str,
    ) -> Result<String, OracleError>;
}

const SYSTEM_PROMPT: &str = "You are an expert QA automation engineer. \
Analyze the failed locator and suggest a better CSS selector or XPath.\n\
Rules:\n\
- The selector must target exactly one element.\n\
- Prefer test IDs and data attributes ([data-testid='...']), then semantic \
attributes (aria-label, placeholder), then id/name, then specific class \
combinations, then XPath as a last resort.\n\
- Avoid position-based selectors and hashed class names.\n\
- Return ONLY the raw selector string, no explanation, no quotes.";

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Oracle backed by an OpenRouter-compatible chat-completions API.
pub struct HttpOracle {
    url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpOracle {
    pub fn from_config(config: &HealConfig) -> Self {
        Self {
            url: config.oracle_url.clone(),
            model: config.oracle_model.clone(),
            api_key: config.oracle_api_key.clone(),
            timeout: config.oracle_timeout,
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_prompt(locator: &str, description: &str, error_message: &str) -> String {
        format!(
            "Failed locator: '{}'\nElement description: '{}'\nError: {}\n\n\
             Suggest a better, more robust selector for the '{}' element. \
             Return only the selector string.",
            locator,
            description,
            truncate(error_message, 500),
            description
        )
    }
}

impl SuggestionOracle for HttpOracle {
    fn suggest(
        &self,
        locator: &str,
        description: &str,
        error_message: &str,
    ) -> Result<String, OracleError> {
        let api_key = self.api_key.as_deref().ok_or(OracleError::Unconfigured)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: Self::build_prompt(locator, description, error_message),
                },
            ],
            max_tokens: 200,
            stream: false,
        };

        let response = client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Http {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        let chat: ChatResponse = response
            .json()
            .map_err(|_| OracleError::MalformedResponse)?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or(OracleError::MalformedResponse)?;

        let candidate = clean_suggestion(content);
        if candidate.is_empty() {
            return Err(OracleError::MalformedResponse);
        }
        Ok(candidate)
    }
}

/// Strip quote/backtick wrapping and stray whitespace from a model reply.
/// Models often return the selector inside markdown or quotes despite the
/// prompt asking for the raw string.
pub fn clean_suggestion(raw: &str) -> String {
    let mut s = raw.trim();
    loop {
        let stripped = s
            .strip_prefix("```")
            .map(|rest| rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()))
            .unwrap_or(s);
        let stripped = stripped.strip_suffix("```").unwrap_or(stripped).trim();
        let stripped = stripped
            .trim_matches(|c| c == '`' || c == '"' || c == '\'')
            .trim();
        if stripped == s {
            break;
        }
        s = stripped;
    }
    // A multi-line reply means the model explained itself; keep the first
    // non-empty line, which is where the selector lands in practice.
    s.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_clean_suggestion_strips_wrapping() {
        assert_eq!(clean_suggestion("\"#login-button\""), "#login-button");
        assert_eq!(clean_suggestion("`[data-testid='x']`"), "[data-testid='x']");
        assert_eq!(
            clean_suggestion("```css\n.submit-btn.primary\n```"),
            ".submit-btn.primary"
        );
        assert_eq!(clean_suggestion("  #plain  "), "#plain");
    }

    #[test]
    fn test_clean_suggestion_takes_first_line_of_prose() {
        let raw = "[data-testid='submit']\n\nThis targets the submit button.";
        assert_eq!(clean_suggestion(raw), "[data-testid='submit']");
    }

    #[test]
    fn test_unconfigured_oracle_errors_without_network() {
        let config = HealConfig {
            oracle_api_key: None,
            ..HealConfig::default()
        };
        let oracle = HttpOracle::from_config(&config);
        assert!(!oracle.is_available());
        let err = oracle.suggest("#btn", "submit", "not found").unwrap_err();
        assert!(matches!(err, OracleError::Unconfigured));
    }

    #[test]
    fn test_prompt_truncates_long_errors() {
        let long_error = "x".repeat(2000);
        let prompt = HttpOracle::build_prompt("#btn", "submit", &long_error);
        assert!(prompt.len() < 1200);
        assert!(prompt.contains("#btn"));
    }

    #[test]
    fn test_config_plumbing() {
        let config = HealConfig {
            oracle_api_key: Some("sk-test".to_string()),
            search_roots: vec![PathBuf::from("pages")],
            ..HealConfig::default()
        };
        let oracle = HttpOracle::from_config(&config);
        assert!(oracle.is_available());
    }
}
