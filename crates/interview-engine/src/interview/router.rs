use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::error;

use super::definition::InterviewDraft;
use super::domain::{InterviewId, QuestionId, SessionId, UserId};
use super::error::InterviewError;
use super::repository::{DefinitionRepository, SessionRepository};
use super::service::InterviewService;

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionParams {
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: QuestionId,
    #[serde(default)]
    pub value: Option<Map<String, Value>>,
}

/// Router builder exposing the interview boundary operations over HTTP.
pub fn interview_router<D, S>(service: Arc<InterviewService<D, S>>) -> Router
where
    D: DefinitionRepository + 'static,
    S: SessionRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/interviews",
            post(create_handler::<D, S>).get(list_handler::<D, S>),
        )
        .route(
            "/api/v1/interviews/:interview_id",
            get(interview_handler::<D, S>),
        )
        .route(
            "/api/v1/interviews/:interview_id/sessions",
            post(start_handler::<D, S>),
        )
        .route(
            "/api/v1/interviews/sessions/:session_id/next",
            get(next_handler::<D, S>),
        )
        .route(
            "/api/v1/interviews/sessions/:session_id/answers",
            post(submit_handler::<D, S>).get(answers_handler::<D, S>),
        )
        .route(
            "/api/v1/interviews/sessions/:session_id/abandon",
            post(abandon_handler::<D, S>),
        )
        .with_state(service)
}

/// HTTP status for each failure class. Conflicts are retryable by the caller.
pub fn status_for(err: &InterviewError) -> StatusCode {
    match err {
        InterviewError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        InterviewError::InterviewNotFound(_)
        | InterviewError::SessionNotFound(_)
        | InterviewError::QuestionNotFound { .. } => StatusCode::NOT_FOUND,
        InterviewError::InvalidState { .. } | InterviewError::Conflict(_) => StatusCode::CONFLICT,
        InterviewError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: InterviewError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "interview request failed");
    }
    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn create_handler<D, S>(
    State(service): State<Arc<InterviewService<D, S>>>,
    axum::Json(draft): axum::Json<InterviewDraft>,
) -> Response
where
    D: DefinitionRepository + 'static,
    S: SessionRepository + 'static,
{
    match service.create_interview(draft) {
        Ok(definition) => (StatusCode::CREATED, axum::Json(definition)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<D, S>(
    State(service): State<Arc<InterviewService<D, S>>>,
) -> Response
where
    D: DefinitionRepository + 'static,
    S: SessionRepository + 'static,
{
    match service.list_interviews() {
        Ok(summaries) => (StatusCode::OK, axum::Json(summaries)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn interview_handler<D, S>(
    State(service): State<Arc<InterviewService<D, S>>>,
    Path(interview_id): Path<u64>,
) -> Response
where
    D: DefinitionRepository + 'static,
    S: SessionRepository + 'static,
{
    match service.get_interview(InterviewId(interview_id)) {
        Ok(definition) => (StatusCode::OK, axum::Json(definition)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn start_handler<D, S>(
    State(service): State<Arc<InterviewService<D, S>>>,
    Path(interview_id): Path<u64>,
    Query(params): Query<StartSessionParams>,
) -> Response
where
    D: DefinitionRepository + 'static,
    S: SessionRepository + 'static,
{
    match service.start_session(InterviewId(interview_id), params.user_id) {
        Ok(start) => (StatusCode::CREATED, axum::Json(start)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn next_handler<D, S>(
    State(service): State<Arc<InterviewService<D, S>>>,
    Path(session_id): Path<u64>,
) -> Response
where
    D: DefinitionRepository + 'static,
    S: SessionRepository + 'static,
{
    match service.get_next_question(SessionId(session_id)) {
        Ok(next) => (StatusCode::OK, axum::Json(next)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<D, S>(
    State(service): State<Arc<InterviewService<D, S>>>,
    Path(session_id): Path<u64>,
    axum::Json(request): axum::Json<SubmitAnswerRequest>,
) -> Response
where
    D: DefinitionRepository + 'static,
    S: SessionRepository + 'static,
{
    match service.submit_answer(SessionId(session_id), request.question_id, request.value) {
        Ok(next) => (StatusCode::OK, axum::Json(next)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn answers_handler<D, S>(
    State(service): State<Arc<InterviewService<D, S>>>,
    Path(session_id): Path<u64>,
) -> Response
where
    D: DefinitionRepository + 'static,
    S: SessionRepository + 'static,
{
    match service.session_answers(SessionId(session_id)) {
        Ok(answers) => (StatusCode::OK, axum::Json(answers)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn abandon_handler<D, S>(
    State(service): State<Arc<InterviewService<D, S>>>,
    Path(session_id): Path<u64>,
) -> Response
where
    D: DefinitionRepository + 'static,
    S: SessionRepository + 'static,
{
    match service.abandon_session(SessionId(session_id)) {
        Ok(session) => (StatusCode::OK, axum::Json(session)).into_response(),
        Err(err) => error_response(err),
    }
}
