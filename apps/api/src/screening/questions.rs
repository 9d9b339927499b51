//! Question extraction: turns a free-form completion into exactly three ordered questions.
//!
//! Rules:
//! 1. Blank lines and pure markup (```, ---) are discarded.
//! 2. Numbered lines (`1.`, `2)`, `Q3:`, `Question 1 -`) are question items. With three or
//!    more of them, the first three win and bullets are ignored.
//! 3. Otherwise bullets (`-`, `*`, `•`) are the items, again first three in order.
//! 4. Otherwise, if exactly three lines remain once lead-ins ending in `:` are dropped,
//!    those three lines are the questions.
//! 5. A bullet indented under a numbered line is a hint for that question, never an item.
//! 6. Anything else is `MalformedCompletion`. Never padded.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ScreeningError;
use crate::screening::models::{Question, QUESTION_COUNT};

static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:q(?:uestion)?\s*)?\(?\d{1,2}\s*[.):\-]\s*(.*)$").expect("valid regex")
});

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*•]\s+(.*)$").expect("valid regex"));

#[derive(Debug, PartialEq)]
enum LineKind {
    Numbered(String),
    Bullet(String),
    Plain(String),
}

/// Extracts exactly `QUESTION_COUNT` questions from `raw`, in document order.
pub fn extract_questions(raw: &str) -> Result<Vec<Question>, ScreeningError> {
    let lines = classify_lines(raw);

    let numbered: Vec<&str> = lines
        .iter()
        .filter_map(|kind| match kind {
            LineKind::Numbered(item) if !item.is_empty() => Some(item.as_str()),
            _ => None,
        })
        .collect();
    let bullets: Vec<&str> = lines
        .iter()
        .filter_map(|kind| match kind {
            LineKind::Bullet(item) if !item.is_empty() => Some(item.as_str()),
            _ => None,
        })
        .collect();

    let items = if numbered.len() >= QUESTION_COUNT {
        numbered
    } else if bullets.len() >= QUESTION_COUNT {
        bullets
    } else {
        let plain: Vec<&str> = lines
            .iter()
            .filter_map(|kind| match kind {
                LineKind::Plain(line) if line.ends_with(':') => None,
                LineKind::Numbered(item) | LineKind::Bullet(item) | LineKind::Plain(item) => {
                    Some(item.as_str())
                }
            })
            .filter(|item| !item.is_empty())
            .collect();
        if plain.len() != QUESTION_COUNT {
            return Err(ScreeningError::malformed(format!(
                "expected {QUESTION_COUNT} questions, found {} numbered, {} bulleted and {} plain lines",
                numbered.len(),
                bullets.len(),
                plain.len()
            )));
        }
        plain
    };

    Ok(items
        .into_iter()
        .take(QUESTION_COUNT)
        .enumerate()
        .map(|(i, text)| Question {
            index: i + 1,
            text: text.to_string(),
        })
        .collect())
}

/// Classifies each meaningful line, dropping bullets nested under a numbered line.
fn classify_lines(raw: &str) -> Vec<LineKind> {
    let mut kinds = Vec::new();
    let mut numbered_indent: Option<usize> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if !trimmed.chars().any(char::is_alphanumeric) {
            continue;
        }
        let indent = line.len() - line.trim_start().len();

        if let Some(caps) = BULLET_RE.captures(trimmed) {
            if numbered_indent.is_some_and(|parent| indent > parent) {
                continue;
            }
            kinds.push(LineKind::Bullet(clean_item(&caps[1])));
            continue;
        }

        // "**1. Question**" and "## 1. Question" put markup before the number
        let unmarked = trimmed.trim_start_matches(['*', '#', '_']).trim_start();
        if let Some(caps) = NUMBERED_RE.captures(unmarked) {
            numbered_indent = Some(indent);
            kinds.push(LineKind::Numbered(clean_item(&caps[1])));
        } else {
            kinds.push(LineKind::Plain(clean_item(trimmed)));
        }
    }

    kinds
}

fn clean_item(text: &str) -> String {
    text.trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
        .to_string()
}
