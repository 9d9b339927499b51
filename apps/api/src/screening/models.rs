//! Screening data model. These types double as the persisted record format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of questions asked in every screening session.
pub const QUESTION_COUNT: usize = 3;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// Immutable input to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningRequest {
    pub job_description: String,
    pub resume_text: String,
}

/// An interview question. `index` is 1-based and reflects presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub index: usize,
    pub text: String,
}

/// A candidate's answer to one question.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub question: Question,
    pub candidate_text: String,
}

/// What the Answer Scorer extracts from a scoring completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFragment {
    /// Always within `MIN_SCORE..=MAX_SCORE`.
    pub score: u8,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub question: Question,
    pub answer: String,
    pub score: u8,
    pub explanation: String,
}

impl ScoreResult {
    pub fn new(answer: Answer, fragment: ScoreFragment) -> Self {
        Self {
            question: answer.question,
            answer: answer.candidate_text,
            score: fragment.score,
            explanation: fragment.explanation,
        }
    }
}

/// Outcome of one completed session. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningRecord {
    pub request: ScreeningRequest,
    pub results: Vec<ScoreResult>,
    pub created_at: DateTime<Utc>,
}

impl ScreeningRecord {
    /// Mean score rounded to one decimal place.
    pub fn average_score(&self) -> f64 {
        average_score(&self.results)
    }

    /// Storage key derived from the creation timestamp.
    pub fn storage_key(&self) -> String {
        format!(
            "screening_{}.json",
            self.created_at.format("%Y%m%d_%H%M%S_%6f")
        )
    }
}

pub fn average_score(results: &[ScoreResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: u32 = results.iter().map(|r| u32::from(r.score)).sum();
    let mean = f64::from(total) / results.len() as f64;
    (mean * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn result(index: usize, score: u8) -> ScoreResult {
        ScoreResult {
            question: Question {
                index,
                text: format!("Question {index}?"),
            },
            answer: format!("Answer {index}"),
            score,
            explanation: "Clear and relevant.".to_string(),
        }
    }

    fn record() -> ScreeningRecord {
        ScreeningRecord {
            request: ScreeningRequest {
                job_description: "Backend engineer, Go experience".to_string(),
                resume_text: "5 years Go, distributed systems".to_string(),
            },
            results: vec![result(1, 7), result(2, 9), result(3, 4)],
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
                + chrono::Duration::microseconds(589_793),
        }
    }

    #[test]
    fn test_record_json_roundtrip_preserves_fields() {
        let original = record();
        let json = serde_json::to_string_pretty(&original).unwrap();
        let recovered: ScreeningRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, original);
        assert_eq!(recovered.results[1].question.index, 2);
    }

    #[test]
    fn test_record_json_field_names() {
        let value = serde_json::to_value(record()).unwrap();
        assert!(value.get("request").is_some());
        assert!(value.get("createdAt").is_some());
        assert_eq!(
            value["request"]["jobDescription"],
            "Backend engineer, Go experience"
        );
        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["question"]["text"], "Question 1?");
        assert_eq!(results[0]["answer"], "Answer 1");
        assert_eq!(results[0]["score"], 7);
        assert_eq!(results[0]["explanation"], "Clear and relevant.");
    }

    #[test]
    fn test_average_score_rounds_to_one_decimal() {
        // (7 + 9 + 4) / 3 = 6.666...
        assert_eq!(record().average_score(), 6.7);
    }

    #[test]
    fn test_average_score_empty_is_zero() {
        assert_eq!(average_score(&[]), 0.0);
    }

    #[test]
    fn test_storage_key_uses_timestamp() {
        assert_eq!(
            record().storage_key(),
            "screening_20260314_092653_589793.json"
        );
    }
}
