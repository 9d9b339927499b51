use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::screening::session::SessionStatus;

/// Failure kinds of the screening pipeline.
///
/// Every variant except `InvalidTransition` terminates the session it occurred in.
/// `InvalidTransition` is caller misuse and leaves the session untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScreeningError {
    #[error("Template '{template}' references '{{{variable}}}' but no value was supplied")]
    MissingVariable { template: String, variable: String },

    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    #[error("Malformed completion: {0}")]
    MalformedCompletion(String),

    #[error("Score {score} is outside the accepted range 1-10")]
    ScoreOutOfRange { score: i64 },

    #[error("Required credential '{var}' is not configured")]
    MissingCredential { var: String },

    #[error("Cannot {action} while session is {status}")]
    InvalidTransition {
        action: &'static str,
        status: SessionStatus,
    },
}

impl ScreeningError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedCompletion(msg.into())
    }

    /// Stable machine-readable code, shared by the HTTP envelope and the session view.
    pub fn code(&self) -> &'static str {
        match self {
            ScreeningError::MissingVariable { .. } => "TEMPLATE_ERROR",
            ScreeningError::GenerationFailure(_) => "GENERATION_FAILURE",
            ScreeningError::MalformedCompletion(_) => "MALFORMED_COMPLETION",
            ScreeningError::ScoreOutOfRange { .. } => "SCORE_OUT_OF_RANGE",
            ScreeningError::MissingCredential { .. } => "CONFIGURATION_ERROR",
            ScreeningError::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Screening(#[from] ScreeningError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Screening(e) => {
                let status = match e {
                    ScreeningError::InvalidTransition { .. } => StatusCode::CONFLICT,
                    ScreeningError::GenerationFailure(_)
                    | ScreeningError::MalformedCompletion(_)
                    | ScreeningError::ScoreOutOfRange { .. } => StatusCode::BAD_GATEWAY,
                    ScreeningError::MissingVariable { .. }
                    | ScreeningError::MissingCredential { .. } => {
                        tracing::error!("Screening configuration error: {e}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.code(), e.to_string())
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "The screening record could not be saved".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_maps_to_conflict() {
        let err = AppError::from(ScreeningError::InvalidTransition {
            action: "submit an answer",
            status: SessionStatus::Completed,
        });
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_generation_failure_maps_to_bad_gateway() {
        let err = AppError::from(ScreeningError::GenerationFailure("timeout".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_score_out_of_range_message_names_score() {
        let err = ScreeningError::ScoreOutOfRange { score: 11 };
        assert!(err.to_string().contains("11"));
        assert_eq!(err.code(), "SCORE_OUT_OF_RANGE");
    }

    #[test]
    fn test_missing_variable_message_shows_placeholder() {
        let err = ScreeningError::MissingVariable {
            template: "score_answer".to_string(),
            variable: "answer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Template 'score_answer' references '{answer}' but no value was supplied"
        );
    }
}
