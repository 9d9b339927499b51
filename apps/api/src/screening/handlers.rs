//! Axum route handlers for the Screening API.
//!
//! Each pipeline step runs in its own task holding the session lock, so a client that
//! disconnects mid-call cannot leave a session stuck between states.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::{AppError, ScreeningError};
use crate::screening::documents::{extract_text, DocumentKind};
use crate::screening::models::{
    average_score, Question, ScoreResult, ScreeningRecord, ScreeningRequest,
};
use crate::screening::registry::{SessionEntry, SessionHandle};
use crate::screening::session::{
    AnswerOutcome, FailureReason, ScreeningSession, SessionState, SessionStatus,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateScreeningRequest {
    pub job_description: String,
    pub resume_text: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct FailureView {
    pub code: &'static str,
    pub message: String,
}

/// Snapshot of a session. `complete` is false for anything short of Completed,
/// so partial results are never mistaken for a final record.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub state: SessionStatus,
    pub complete: bool,
    pub questions: Vec<Question>,
    pub current_question: Option<Question>,
    pub results: Vec<ScoreResult>,
    pub average_score: Option<f64>,
    pub failure: Option<FailureView>,
    pub record_key: Option<String>,
}

impl SessionView {
    fn from_entry(entry: &SessionEntry) -> Self {
        let session = &entry.session;
        let complete = matches!(session.state(), SessionState::Completed);
        let failure = match session.state() {
            SessionState::Failed(FailureReason::Abandoned) => Some(FailureView {
                code: "ABANDONED",
                message: FailureReason::Abandoned.to_string(),
            }),
            SessionState::Failed(FailureReason::Error(e)) => Some(FailureView {
                code: e.code(),
                message: e.to_string(),
            }),
            _ => None,
        };

        Self {
            session_id: session.id(),
            state: session.state().status(),
            complete,
            questions: session.questions().to_vec(),
            current_question: session.current_question().cloned(),
            results: session.results().to_vec(),
            average_score: complete.then(|| average_score(session.results())),
            failure,
            record_key: entry.stored_key.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub result: ScoreResult,
    pub next_question: Option<Question>,
    pub record: Option<ScreeningRecord>,
    pub average_score: Option<f64>,
    pub record_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub record_key: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/screenings
///
/// Creates a session and generates its three interview questions.
pub async fn handle_create_screening(
    State(state): State<AppState>,
    Json(request): Json<CreateScreeningRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let request = validated_request(request.job_description, request.resume_text)?;
    start_session(state, request).await
}

/// POST /api/v1/screenings/upload
///
/// Multipart variant: `job_description` or `job_description_file` (TXT/PDF),
/// and `resume_text` or `resume_file` (PDF).
pub async fn handle_upload_screening(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let mut job_description = String::new();
    let mut resume_text = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("{name}: {e}")))?;

        let allowed: &[DocumentKind] = match name.as_str() {
            "job_description_file" => &[DocumentKind::PlainText, DocumentKind::Pdf],
            "resume_file" => &[DocumentKind::Pdf],
            "job_description" | "resume_text" => &[],
            _ => continue,
        };

        // Browsers send an unselected file input as an empty part with filename=""
        if !allowed.is_empty() && bytes.is_empty() {
            continue;
        }

        let text = if allowed.is_empty() {
            String::from_utf8(bytes.to_vec())
                .map_err(|_| AppError::Validation(format!("{name} must be UTF-8 text")))?
        } else {
            extract_text(
                &name,
                file_name.as_deref(),
                content_type.as_deref(),
                bytes,
                allowed,
            )
            .await?
        };

        // An empty text field must not clobber an uploaded file for the same input
        if text.trim().is_empty() {
            continue;
        }
        match name.as_str() {
            "job_description" | "job_description_file" => job_description = text,
            _ => resume_text = text,
        }
    }

    let request = validated_request(job_description, resume_text)?;
    start_session(state, request).await
}

/// GET /api/v1/screenings/:id
pub async fn handle_get_screening(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = find_session(&state, id).await?;
    let entry = handle.lock().await;
    Ok(Json(SessionView::from_entry(&entry)))
}

/// POST /api/v1/screenings/:id/answers
///
/// Scores the answer to the current question. The final answer completes the
/// session and persists its record.
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    if request.answer.trim().is_empty() {
        return Err(AppError::Validation("answer cannot be empty".to_string()));
    }

    let handle = find_session(&state, id).await?;
    let task_state = state.clone();

    let response = tokio::spawn(async move {
        let mut entry = handle.lock_owned().await;
        let outcome = entry
            .session
            .submit_answer(
                &request.answer,
                task_state.llm.as_ref(),
                task_state.contract.as_ref(),
            )
            .await;
        entry.mark_if_settled();
        let outcome = outcome?;

        Ok::<_, AppError>(match outcome {
            AnswerOutcome::Next {
                result,
                next_question,
            } => SubmitAnswerResponse {
                result,
                next_question: Some(next_question),
                record: None,
                average_score: None,
                record_key: None,
            },
            AnswerOutcome::Completed { result, record } => {
                let record_key = persist(&task_state, &mut entry).await?;
                SubmitAnswerResponse {
                    result,
                    next_question: None,
                    average_score: Some(record.average_score()),
                    record: Some(record),
                    record_key: Some(record_key),
                }
            }
        })
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Answer task failed: {e}")))??;

    Ok(Json(response))
}

/// POST /api/v1/screenings/:id/save
///
/// Persists a completed session's record. Returns the existing key if already saved.
pub async fn handle_save_screening(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SaveResponse>, AppError> {
    let handle = find_session(&state, id).await?;
    let mut entry = handle.lock().await;
    let record_key = persist(&state, &mut entry).await?;
    Ok(Json(SaveResponse { record_key }))
}

/// DELETE /api/v1/screenings/:id
///
/// Abandons the session. Nothing is persisted for an abandoned session.
pub async fn handle_abandon_screening(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let handle = state
        .sessions
        .remove(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Screening {id} not found")))?;
    handle.lock().await.session.abandon();
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn validated_request(
    job_description: String,
    resume_text: String,
) -> Result<ScreeningRequest, AppError> {
    if job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }
    if resume_text.trim().is_empty() {
        return Err(AppError::Validation("resume_text cannot be empty".to_string()));
    }
    Ok(ScreeningRequest {
        job_description,
        resume_text,
    })
}

async fn start_session(
    state: AppState,
    request: ScreeningRequest,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let (id, handle) = state.sessions.insert(ScreeningSession::new(request)).await;
    let task_state = state.clone();

    let started = tokio::spawn(async move {
        let mut entry = handle.lock_owned().await;
        entry
            .session
            .start(task_state.llm.as_ref(), task_state.contract.as_ref())
            .await
            .map(|_| ())?;
        Ok::<_, ScreeningError>(SessionView::from_entry(&entry))
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Question generation task failed: {e}")))?;

    match started {
        Ok(view) => {
            info!("Screening {id} started");
            Ok((StatusCode::CREATED, Json(view)))
        }
        Err(e) => {
            // Nothing to resume: the session never reached its first question
            state.sessions.remove(id).await;
            Err(e.into())
        }
    }
}

async fn find_session(state: &AppState, id: Uuid) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Screening {id} not found")))
}

/// Writes the session's record once; later calls return the stored key.
async fn persist(state: &AppState, entry: &mut SessionEntry) -> Result<String, AppError> {
    if let Some(key) = &entry.stored_key {
        return Ok(key.clone());
    }

    let record = entry
        .session
        .record()
        .ok_or_else(|| ScreeningError::InvalidTransition {
            action: "save the record",
            status: entry.session.state().status(),
        })?;

    match state.records.store(record).await {
        Ok(key) => {
            info!(
                session_id = %entry.session.id(),
                backend = state.records.backend(),
                "Screening record stored as {key}"
            );
            entry.stored_key = Some(key.clone());
            Ok(key)
        }
        Err(e) => {
            error!(session_id = %entry.session.id(), "Failed to store screening record: {e}");
            Err(e.into())
        }
    }
}
