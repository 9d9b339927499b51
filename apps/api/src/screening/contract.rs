//! Response contracts: pluggable pairing of prompt templates with the parser that
//! understands what those prompts ask the model to emit.
//!
//! Default: `FreeTextContract` (best-effort line/number heuristics).
//! Stricter: `JsonContract` (templates demand a small JSON payload).
//!
//! `AppState` holds an `Arc<dyn ResponseContract>`, chosen at startup via RESPONSE_FORMAT.
//! The session state machine never sees which one is in use.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;

use crate::config::ResponseFormat;
use crate::errors::ScreeningError;
use crate::screening::models::{Question, ScoreFragment, QUESTION_COUNT};
use crate::screening::questions::extract_questions;
use crate::screening::scoring::{parse_score, validate_score};
use crate::screening::template::PromptSet;

pub trait ResponseContract: Send + Sync {
    /// "text" | "json", for logs and the session view.
    fn name(&self) -> &'static str;

    fn prompts(&self) -> &PromptSet;

    fn extract_questions(&self, raw: &str) -> Result<Vec<Question>, ScreeningError>;

    fn parse_score(&self, raw: &str) -> Result<ScoreFragment, ScreeningError>;
}

/// Builds the contract for `format`, applying prompt overrides from `prompts_dir`.
pub fn build_contract(
    format: ResponseFormat,
    prompts_dir: Option<&Path>,
) -> Result<Arc<dyn ResponseContract>> {
    let prompts = PromptSet::load(format, prompts_dir)?;
    Ok(match format {
        ResponseFormat::Text => Arc::new(FreeTextContract { prompts }),
        ResponseFormat::Json => Arc::new(JsonContract { prompts }),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// FreeTextContract
// ────────────────────────────────────────────────────────────────────────────

pub struct FreeTextContract {
    pub prompts: PromptSet,
}

impl ResponseContract for FreeTextContract {
    fn name(&self) -> &'static str {
        "text"
    }

    fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    fn extract_questions(&self, raw: &str) -> Result<Vec<Question>, ScreeningError> {
        extract_questions(raw)
    }

    fn parse_score(&self, raw: &str) -> Result<ScoreFragment, ScreeningError> {
        parse_score(raw)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JsonContract
// ────────────────────────────────────────────────────────────────────────────

pub struct JsonContract {
    pub prompts: PromptSet,
}

#[derive(Debug, Deserialize)]
struct QuestionsPayload {
    questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ScorePayload {
    score: i64,
    explanation: String,
}

impl ResponseContract for JsonContract {
    fn name(&self) -> &'static str {
        "json"
    }

    fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    fn extract_questions(&self, raw: &str) -> Result<Vec<Question>, ScreeningError> {
        let payload: QuestionsPayload = serde_json::from_str(strip_json_fences(raw))
            .map_err(|e| ScreeningError::malformed(format!("questions payload: {e}")))?;

        let texts: Vec<String> = payload
            .questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();

        if texts.len() < QUESTION_COUNT {
            return Err(ScreeningError::malformed(format!(
                "expected {QUESTION_COUNT} questions, payload had {}",
                texts.len()
            )));
        }

        Ok(texts
            .into_iter()
            .take(QUESTION_COUNT)
            .enumerate()
            .map(|(i, text)| Question { index: i + 1, text })
            .collect())
    }

    fn parse_score(&self, raw: &str) -> Result<ScoreFragment, ScreeningError> {
        let payload: ScorePayload = serde_json::from_str(strip_json_fences(raw))
            .map_err(|e| ScreeningError::malformed(format!("score payload: {e}")))?;

        let score = validate_score(payload.score)?;
        let explanation = payload.explanation.trim().to_string();
        if explanation.is_empty() {
            return Err(ScreeningError::malformed("score payload has an empty explanation"));
        }

        Ok(ScoreFragment { score, explanation })
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
