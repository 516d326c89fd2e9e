use super::definition::DefinitionError;
use super::domain::{InterviewId, QuestionId, SessionId, SessionStatus};
use super::repository::RepositoryError;

/// Failures surfaced by the interview boundary operations.
#[derive(Debug, thiserror::Error)]
pub enum InterviewError {
    #[error(transparent)]
    Validation(#[from] DefinitionError),
    #[error("interview {0} not found")]
    InterviewNotFound(InterviewId),
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("question {question_id} is not part of interview {interview_id}")]
    QuestionNotFound {
        interview_id: InterviewId,
        question_id: QuestionId,
    },
    #[error("session {session_id} is {status}; only active sessions accept changes")]
    InvalidState {
        session_id: SessionId,
        status: SessionStatus,
    },
    #[error("session {0} was modified concurrently; reload and retry")]
    Conflict(SessionId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl InterviewError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InterviewError::InterviewNotFound(_)
                | InterviewError::SessionNotFound(_)
                | InterviewError::QuestionNotFound { .. }
        )
    }
}
