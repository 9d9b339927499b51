//! Template rendering: fills prompt skeletons with runtime values.
//!
//! Substitution is plain and single-pass: a value that itself contains `{x}` is inserted
//! literally and never re-expanded. Brace runs that are not identifiers (e.g. JSON examples
//! inside a template) are left untouched.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::config::ResponseFormat;
use crate::errors::ScreeningError;
use crate::screening::prompts::{
    QUESTIONS_JSON_TEMPLATE, QUESTIONS_PROMPT_FILE, QUESTIONS_TEXT_TEMPLATE,
    SCORING_JSON_TEMPLATE, SCORING_PROMPT_FILE, SCORING_TEXT_TEMPLATE,
};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

/// The two prompts the pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateName {
    GenerateQuestions,
    ScoreAnswer,
}

impl TemplateName {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateName::GenerateQuestions => "generate_questions",
            TemplateName::ScoreAnswer => "score_answer",
        }
    }

    /// Placeholders the pipeline supplies when rendering this template.
    pub fn variables(self) -> &'static [&'static str] {
        match self {
            TemplateName::GenerateQuestions => &["job_description", "resume_text"],
            TemplateName::ScoreAnswer => &["question", "answer"],
        }
    }

    fn override_file(self) -> &'static str {
        match self {
            TemplateName::GenerateQuestions => QUESTIONS_PROMPT_FILE,
            TemplateName::ScoreAnswer => SCORING_PROMPT_FILE,
        }
    }
}

/// Substitutes every `{name}` in `template` with `vars[name]`.
pub fn render(
    template_name: &str,
    template: &str,
    vars: &HashMap<&str, &str>,
) -> Result<String, ScreeningError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        let value = vars
            .get(name)
            .ok_or_else(|| ScreeningError::MissingVariable {
                template: template_name.to_string(),
                variable: name.to_string(),
            })?;
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(value);
        last = whole.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}

/// The question-generation and scoring templates in use for this process.
#[derive(Debug, Clone)]
pub struct PromptSet {
    questions: String,
    scoring: String,
}

impl PromptSet {
    pub fn builtin(format: ResponseFormat) -> Self {
        let (questions, scoring) = match format {
            ResponseFormat::Text => (QUESTIONS_TEXT_TEMPLATE, SCORING_TEXT_TEMPLATE),
            ResponseFormat::Json => (QUESTIONS_JSON_TEMPLATE, SCORING_JSON_TEMPLATE),
        };
        Self {
            questions: questions.to_string(),
            scoring: scoring.to_string(),
        }
    }

    /// Built-in templates, with any override files found in `dir` taking precedence.
    /// Overrides are validated here so a bad placeholder fails at startup, not mid-session.
    pub fn load(format: ResponseFormat, dir: Option<&Path>) -> Result<Self> {
        let mut set = Self::builtin(format);

        if let Some(dir) = dir {
            for name in [TemplateName::GenerateQuestions, TemplateName::ScoreAnswer] {
                let path = dir.join(name.override_file());
                if !path.exists() {
                    continue;
                }
                let body = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
                info!("Loaded {} prompt override from {}", name.as_str(), path.display());
                *set.slot_mut(name) = body;
            }
        }

        set.validate()?;
        Ok(set)
    }

    pub fn template(&self, name: TemplateName) -> &str {
        match name {
            TemplateName::GenerateQuestions => &self.questions,
            TemplateName::ScoreAnswer => &self.scoring,
        }
    }

    fn slot_mut(&mut self, name: TemplateName) -> &mut String {
        match name {
            TemplateName::GenerateQuestions => &mut self.questions,
            TemplateName::ScoreAnswer => &mut self.scoring,
        }
    }

    /// Replaces one template without validation; lets tests build broken sets.
    #[cfg(test)]
    pub fn with_template(mut self, name: TemplateName, body: &str) -> Self {
        *self.slot_mut(name) = body.to_string();
        self
    }

    pub fn render(
        &self,
        name: TemplateName,
        vars: &HashMap<&str, &str>,
    ) -> Result<String, ScreeningError> {
        render(name.as_str(), self.template(name), vars)
    }

    /// Dry-renders both templates with placeholder values.
    pub fn validate(&self) -> Result<(), ScreeningError> {
        for name in [TemplateName::GenerateQuestions, TemplateName::ScoreAnswer] {
            let vars: HashMap<&str, &str> = name.variables().iter().map(|v| (*v, "")).collect();
            self.render(name, &vars)?;

            for var in name.variables() {
                if !self.template(name).contains(&format!("{{{var}}}")) {
                    warn!("Prompt '{}' never uses {{{}}}", name.as_str(), var);
                }
            }
        }
        Ok(())
    }
}
