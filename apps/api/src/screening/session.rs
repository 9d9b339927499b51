//! Screening session pipeline, one state machine per candidate.
//!
//! Created → QuestionsRequested → QuestionsReady → AnsweringQuestion(i) → ScoringQuestion(i)
//!   → AnsweringQuestion(i+1) … → Completed
//! Failed(reason) is reachable from every non-terminal state.
//!
//! Generation calls are strictly sequential within a session: `&mut self` on every
//! transition means the next call cannot start before the previous one resolved.
//! A record only exists once the session is Completed.

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ScreeningError;
use crate::llm_client::CompletionClient;
use crate::screening::contract::ResponseContract;
use crate::screening::models::{
    Answer, Question, ScoreFragment, ScoreResult, ScreeningRecord, ScreeningRequest,
    QUESTION_COUNT,
};
use crate::screening::template::TemplateName;

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The caller walked away before completion.
    Abandoned,
    Error(ScreeningError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Abandoned => write!(f, "session abandoned"),
            FailureReason::Error(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Created,
    QuestionsRequested,
    QuestionsReady,
    /// 1-based index of the question awaiting an answer.
    AnsweringQuestion(usize),
    ScoringQuestion(usize),
    Completed,
    Failed(FailureReason),
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Created => SessionStatus::Created,
            SessionState::QuestionsRequested => SessionStatus::QuestionsRequested,
            SessionState::QuestionsReady => SessionStatus::QuestionsReady,
            SessionState::AnsweringQuestion(i) => SessionStatus::AnsweringQuestion(*i),
            SessionState::ScoringQuestion(i) => SessionStatus::ScoringQuestion(*i),
            SessionState::Completed => SessionStatus::Completed,
            SessionState::Failed(_) => SessionStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed(_))
    }
}

/// Data-free view of `SessionState`, safe to embed in errors and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "question", rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    QuestionsRequested,
    QuestionsReady,
    AnsweringQuestion(usize),
    ScoringQuestion(usize),
    Completed,
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Created => write!(f, "created"),
            SessionStatus::QuestionsRequested => write!(f, "questions_requested"),
            SessionStatus::QuestionsReady => write!(f, "questions_ready"),
            SessionStatus::AnsweringQuestion(i) => write!(f, "answering_question({i})"),
            SessionStatus::ScoringQuestion(i) => write!(f, "scoring_question({i})"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What happened after an answer was scored.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Next {
        result: ScoreResult,
        next_question: Question,
    },
    Completed {
        result: ScoreResult,
        record: ScreeningRecord,
    },
}

#[derive(Debug)]
pub struct ScreeningSession {
    id: Uuid,
    request: ScreeningRequest,
    state: SessionState,
    questions: Vec<Question>,
    results: Vec<ScoreResult>,
    record: Option<ScreeningRecord>,
}

impl ScreeningSession {
    pub fn new(request: ScreeningRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            state: SessionState::Created,
            questions: Vec::new(),
            results: Vec::new(),
            record: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Scored results so far, in question order. Partial unless Completed.
    pub fn results(&self) -> &[ScoreResult] {
        &self.results
    }

    /// Present only once the session is Completed.
    pub fn record(&self) -> Option<&ScreeningRecord> {
        self.record.as_ref()
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            SessionState::AnsweringQuestion(i) | SessionState::ScoringQuestion(i) => {
                self.questions.get(i - 1)
            }
            _ => None,
        }
    }

    /// Created → QuestionsRequested → QuestionsReady → AnsweringQuestion(1).
    pub async fn start(
        &mut self,
        llm: &dyn CompletionClient,
        contract: &dyn ResponseContract,
    ) -> Result<&[Question], ScreeningError> {
        self.expect_state(SessionState::Created, "request questions")?;
        self.state = SessionState::QuestionsRequested;
        info!(session_id = %self.id, contract = contract.name(), "requesting interview questions");

        let questions = match self.generate_questions(llm, contract).await {
            Ok(questions) => questions,
            Err(e) => return Err(self.fail(e)),
        };

        self.questions = questions;
        self.state = SessionState::QuestionsReady;
        info!(session_id = %self.id, count = self.questions.len(), "questions ready");

        self.state = SessionState::AnsweringQuestion(1);
        Ok(&self.questions)
    }

    /// AnsweringQuestion(i) → ScoringQuestion(i) → AnsweringQuestion(i+1) | Completed.
    pub async fn submit_answer(
        &mut self,
        candidate_text: &str,
        llm: &dyn CompletionClient,
        contract: &dyn ResponseContract,
    ) -> Result<AnswerOutcome, ScreeningError> {
        let index = match self.state {
            SessionState::AnsweringQuestion(i) => i,
            _ => {
                return Err(ScreeningError::InvalidTransition {
                    action: "submit an answer",
                    status: self.state.status(),
                })
            }
        };
        let answer = Answer {
            question: self.questions[index - 1].clone(),
            candidate_text: candidate_text.to_string(),
        };

        self.state = SessionState::ScoringQuestion(index);
        info!(session_id = %self.id, question = index, "scoring answer");

        let fragment = match self.score(&answer, llm, contract).await {
            Ok(fragment) => fragment,
            Err(e) => return Err(self.fail(e)),
        };

        info!(session_id = %self.id, question = index, score = fragment.score, "answer scored");
        let result = ScoreResult::new(answer, fragment);
        self.results.push(result.clone());

        if index < QUESTION_COUNT {
            self.state = SessionState::AnsweringQuestion(index + 1);
            return Ok(AnswerOutcome::Next {
                result,
                next_question: self.questions[index].clone(),
            });
        }

        let record = ScreeningRecord {
            request: self.request.clone(),
            results: self.results.clone(),
            created_at: Utc::now(),
        };
        self.record = Some(record.clone());
        self.state = SessionState::Completed;
        info!(
            session_id = %self.id,
            average_score = record.average_score(),
            "screening completed"
        );

        Ok(AnswerOutcome::Completed { result, record })
    }

    /// Moves any non-terminal session to Failed(Abandoned). Terminal sessions are left as-is.
    pub fn abandon(&mut self) {
        if !self.state.is_terminal() {
            info!(session_id = %self.id, status = %self.state.status(), "session abandoned");
            self.state = SessionState::Failed(FailureReason::Abandoned);
        }
    }

    async fn generate_questions(
        &self,
        llm: &dyn CompletionClient,
        contract: &dyn ResponseContract,
    ) -> Result<Vec<Question>, ScreeningError> {
        let vars = HashMap::from([
            ("job_description", self.request.job_description.as_str()),
            ("resume_text", self.request.resume_text.as_str()),
        ]);
        let prompt = contract
            .prompts()
            .render(TemplateName::GenerateQuestions, &vars)?;
        let raw = llm.complete(&prompt).await?;
        contract.extract_questions(&raw)
    }

    async fn score(
        &self,
        answer: &Answer,
        llm: &dyn CompletionClient,
        contract: &dyn ResponseContract,
    ) -> Result<ScoreFragment, ScreeningError> {
        let vars = HashMap::from([
            ("question", answer.question.text.as_str()),
            ("answer", answer.candidate_text.as_str()),
        ]);
        let prompt = contract.prompts().render(TemplateName::ScoreAnswer, &vars)?;
        let raw = llm.complete(&prompt).await?;
        contract.parse_score(&raw)
    }

    fn expect_state(
        &self,
        expected: SessionState,
        action: &'static str,
    ) -> Result<(), ScreeningError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ScreeningError::InvalidTransition {
                action,
                status: self.state.status(),
            })
        }
    }

    fn fail(&mut self, error: ScreeningError) -> ScreeningError {
        warn!(
            session_id = %self.id,
            status = %self.state.status(),
            code = error.code(),
            "session failed: {error}"
        );
        self.state = SessionState::Failed(FailureReason::Error(error.clone()));
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::config::ResponseFormat;
    use crate::screening::contract::FreeTextContract;
    use crate::screening::template::PromptSet;

    /// Replays scripted completions in order and records every prompt it receives.
    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<String, ScreeningError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<&str, ScreeningError>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, prompt: &str) -> Result<String, ScreeningError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ScreeningError::GenerationFailure("script exhausted".into())))
        }
    }

    const QUESTIONS: &str = "1. How have you used goroutines and channels in production?\n\
                             2. Describe a distributed system you built and its failure modes.\n\
                             3. How do you profile a slow Go service?";

    fn contract() -> FreeTextContract {
        FreeTextContract {
            prompts: PromptSet::builtin(ResponseFormat::Text),
        }
    }

    fn go_request() -> ScreeningRequest {
        ScreeningRequest {
            job_description: "Backend engineer, Go experience".to_string(),
            resume_text: "5 years Go, distributed systems".to_string(),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_completes_with_three_ordered_results() {
        let llm = ScriptedClient::new(vec![
            Ok(QUESTIONS),
            Ok("7 - Solid production experience with channels."),
            Ok("Score: 9/10. Clear reasoning about partitions."),
            Ok("4 - Mentions pprof but no methodology."),
        ]);
        let contract = contract();
        let mut session = ScreeningSession::new(go_request());
        assert_eq!(session.state(), &SessionState::Created);

        let questions = session.start(&llm, &contract).await.unwrap().to_vec();
        assert_eq!(questions.len(), 3);
        assert_eq!(session.state(), &SessionState::AnsweringQuestion(1));
        assert_eq!(session.current_question(), Some(&questions[0]));

        let first_prompt = llm.prompts.lock().unwrap()[0].clone();
        assert!(first_prompt.contains("Backend engineer, Go experience"));
        assert!(first_prompt.contains("5 years Go, distributed systems"));

        let outcome = session.submit_answer("Worker pools.", &llm, &contract).await.unwrap();
        assert!(matches!(outcome, AnswerOutcome::Next { ref next_question, .. } if next_question.index == 2));
        assert_eq!(session.state(), &SessionState::AnsweringQuestion(2));

        session.submit_answer("Raft-based KV store.", &llm, &contract).await.unwrap();
        let outcome = session.submit_answer("I use pprof.", &llm, &contract).await.unwrap();

        let record = match outcome {
            AnswerOutcome::Completed { record, .. } => record,
            other => panic!("expected completion, got {other:?}"),
        };
        assert_eq!(session.state(), &SessionState::Completed);
        assert_eq!(session.record(), Some(&record));
        assert_eq!(record.request, go_request());
        assert_eq!(
            record.results.iter().map(|r| r.score).collect::<Vec<_>>(),
            vec![7, 9, 4]
        );
        assert_eq!(
            record.results.iter().map(|r| r.question.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(record.results[1].answer, "Raft-based KV store.");
        assert_eq!(record.results[0].question, questions[0]);
        assert_eq!(llm.calls(), 4);

        let scoring_prompt = llm.prompts.lock().unwrap()[3].clone();
        assert!(scoring_prompt.contains("How do you profile a slow Go service?"));
        assert!(scoring_prompt.contains("I use pprof."));
    }

    #[tokio::test]
    async fn test_scoring_failure_on_question_two_keeps_only_first_result() {
        let llm = ScriptedClient::new(vec![
            Ok(QUESTIONS),
            Ok("8 - Good."),
            Err(ScreeningError::GenerationFailure(
                "API error (status 500): internal".to_string(),
            )),
        ]);
        let contract = contract();
        let mut session = ScreeningSession::new(go_request());
        session.start(&llm, &contract).await.unwrap();
        session.submit_answer("a1", &llm, &contract).await.unwrap();

        let err = session.submit_answer("a2", &llm, &contract).await.unwrap_err();
        assert!(matches!(err, ScreeningError::GenerationFailure(_)));
        assert_eq!(
            session.state(),
            &SessionState::Failed(FailureReason::Error(err.clone()))
        );
        assert_eq!(session.results().len(), 1);
        assert_eq!(session.results()[0].question.index, 1);
        assert!(session.record().is_none());

        // Failed is terminal: no further calls are issued
        let again = session.submit_answer("a3", &llm, &contract).await.unwrap_err();
        assert!(matches!(again, ScreeningError::InvalidTransition { .. }));
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn test_malformed_questions_fail_session() {
        let llm = ScriptedClient::new(vec![Ok("1. Just one question?")]);
        let contract = contract();
        let mut session = ScreeningSession::new(go_request());

        let err = session.start(&llm, &contract).await.unwrap_err();
        assert!(matches!(err, ScreeningError::MalformedCompletion(_)));
        assert_eq!(session.state().status(), SessionStatus::Failed);
        assert!(session.questions().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_on_questions_fails_session() {
        let llm = ScriptedClient::new(vec![Err(ScreeningError::GenerationFailure(
            "request timed out after 30s".to_string(),
        ))]);
        let contract = contract();
        let mut session = ScreeningSession::new(go_request());

        assert!(session.start(&llm, &contract).await.is_err());
        assert!(session.state().is_terminal());
    }

    #[tokio::test]
    async fn test_out_of_range_score_fails_without_clamping() {
        let llm = ScriptedClient::new(vec![Ok(QUESTIONS), Ok("11 - Beyond excellent.")]);
        let contract = contract();
        let mut session = ScreeningSession::new(go_request());
        session.start(&llm, &contract).await.unwrap();

        let err = session.submit_answer("a1", &llm, &contract).await.unwrap_err();
        assert_eq!(err, ScreeningError::ScoreOutOfRange { score: 11 });
        assert!(session.results().is_empty());
        assert!(session.record().is_none());
    }

    #[tokio::test]
    async fn test_missing_template_variable_fails_before_any_call() {
        let llm = ScriptedClient::new(vec![Ok(QUESTIONS)]);
        let prompts = PromptSet::builtin(ResponseFormat::Text)
            .with_template(TemplateName::ScoreAnswer, "{question} {rubric}");
        let contract = FreeTextContract { prompts };

        let mut session = ScreeningSession::new(go_request());
        session.start(&llm, &contract).await.unwrap();
        let err = session.submit_answer("a1", &llm, &contract).await.unwrap_err();
        assert!(matches!(err, ScreeningError::MissingVariable { ref variable, .. } if variable == "rubric"));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_answer_before_start_is_invalid_transition() {
        let llm = ScriptedClient::new(vec![]);
        let contract = contract();
        let mut session = ScreeningSession::new(go_request());

        let err = session.submit_answer("early", &llm, &contract).await.unwrap_err();
        assert_eq!(
            err,
            ScreeningError::InvalidTransition {
                action: "submit an answer",
                status: SessionStatus::Created,
            }
        );
        // Misuse does not fail the session
        assert_eq!(session.state(), &SessionState::Created);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_is_invalid_transition() {
        let llm = ScriptedClient::new(vec![Ok(QUESTIONS)]);
        let contract = contract();
        let mut session = ScreeningSession::new(go_request());
        session.start(&llm, &contract).await.unwrap();

        assert!(matches!(
            session.start(&llm, &contract).await,
            Err(ScreeningError::InvalidTransition { .. })
        ));
        assert_eq!(session.state(), &SessionState::AnsweringQuestion(1));
    }

    #[tokio::test]
    async fn test_abandon_mid_flow() {
        let llm = ScriptedClient::new(vec![Ok(QUESTIONS), Ok("6 - fine")]);
        let contract = contract();
        let mut session = ScreeningSession::new(go_request());
        session.start(&llm, &contract).await.unwrap();
        session.submit_answer("a1", &llm, &contract).await.unwrap();

        session.abandon();
        assert_eq!(
            session.state(),
            &SessionState::Failed(FailureReason::Abandoned)
        );
        assert!(session.record().is_none());
    }

    #[test]
    fn test_abandon_leaves_terminal_state() {
        let mut session = ScreeningSession::new(go_request());
        session.state = SessionState::Completed;
        session.abandon();
        assert_eq!(session.state(), &SessionState::Completed);
    }

    #[test]
    fn test_status_serializes_with_question_index() {
        let value = serde_json::to_value(SessionStatus::AnsweringQuestion(2)).unwrap();
        assert_eq!(value["status"], "answering_question");
        assert_eq!(value["question"], 2);
        let value = serde_json::to_value(SessionStatus::Completed).unwrap();
        assert_eq!(value["status"], "completed");
    }
}
