//! Answer scoring: pulls a 1–10 score and its explanation out of a scoring completion.
//!
//! The first integer token is the score. A sign directly before it counts (`-3`), a hyphen
//! inside a word does not (`Q-2`), and digits glued to letters are skipped (`gpt4`).
//! The explanation is whatever follows the score, minus a `/10` or `out of 10`
//! denominator and leading punctuation. If nothing follows, the text before the score is
//! used instead, minus a trailing `Score:` label.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ScreeningError;
use crate::screening::models::{ScoreFragment, MAX_SCORE, MIN_SCORE};

static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w-])(-?\d+)").expect("valid regex"));

static DENOMINATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:/|out\s+of)\s*10\b").expect("valid regex"));

static TRAILING_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:score|rating|grade)\s*(?:is)?[\s\p{P}]*$").expect("valid regex")
});

pub fn parse_score(raw: &str) -> Result<ScoreFragment, ScreeningError> {
    let caps = INTEGER_RE
        .captures(raw)
        .ok_or_else(|| ScreeningError::malformed("no score found in completion"))?;
    let Some(token) = caps.get(1) else {
        return Err(ScreeningError::malformed("no score found in completion"));
    };

    let score = parse_token(token.as_str());
    let score = validate_score(score)?;

    let after = DENOMINATOR_RE.replace(&raw[token.end()..], "");
    let mut explanation = trim_explanation(&after);

    if explanation.is_empty() {
        let before = TRAILING_LABEL_RE.replace(&raw[..token.start()], "");
        explanation = trim_explanation(&before);
    }

    if explanation.is_empty() {
        return Err(ScreeningError::malformed(format!(
            "score {score} has no accompanying explanation"
        )));
    }

    Ok(ScoreFragment { score, explanation })
}

/// Range check shared by every response contract. Never clamps.
pub fn validate_score(score: i64) -> Result<u8, ScreeningError> {
    if (i64::from(MIN_SCORE)..=i64::from(MAX_SCORE)).contains(&score) {
        Ok(score as u8)
    } else {
        Err(ScreeningError::ScoreOutOfRange { score })
    }
}

/// Digit runs too long for i64 are still out of range, not unparseable.
fn parse_token(token: &str) -> i64 {
    token.parse::<i64>().unwrap_or(if token.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    })
}

fn trim_explanation(text: &str) -> String {
    text.trim_start_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .trim_end()
        .to_string()
}
