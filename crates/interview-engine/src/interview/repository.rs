use serde::{Deserialize, Serialize};

use super::domain::{
    InterviewAnswer, InterviewDefinition, InterviewId, InterviewSession, QuestionId, SessionId,
};

/// Record families whose identifiers are handed out by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Interview,
    Question,
    Option,
    Rule,
    Session,
    Answer,
}

/// Storage for authored definitions. Definitions are written once and read many times.
pub trait DefinitionRepository: Send + Sync {
    /// Persists the interview with all questions, options, and rules in one unit.
    fn insert(
        &self,
        definition: InterviewDefinition,
    ) -> Result<InterviewDefinition, RepositoryError>;
    fn fetch(&self, id: InterviewId) -> Result<Option<InterviewDefinition>, RepositoryError>;
    fn list(&self) -> Result<Vec<InterviewDefinition>, RepositoryError>;
    /// Interview owning the question id, if any.
    fn question_owner(&self, id: QuestionId) -> Result<Option<InterviewId>, RepositoryError>;
    /// Next unused identifier for an interview, question, option, or rule.
    fn next_definition_id(&self, kind: RecordKind) -> Result<u64, RepositoryError>;
}

/// Storage for sessions and their append-only answer log.
pub trait SessionRepository: Send + Sync {
    fn insert(&self, session: InterviewSession) -> Result<InterviewSession, RepositoryError>;
    fn fetch(&self, id: SessionId) -> Result<Option<InterviewSession>, RepositoryError>;
    /// Answers for the session in the order they were appended.
    fn answers(&self, id: SessionId) -> Result<Vec<InterviewAnswer>, RepositoryError>;
    /// Applies the session update and optional answer atomically. Fails with
    /// [`RepositoryError::Conflict`] when the stored version differs from
    /// `expected_version`; the stored session receives `expected_version + 1`.
    fn commit(&self, commit: SessionCommit) -> Result<InterviewSession, RepositoryError>;
    /// Next unused identifier for a session or an answer.
    fn next_session_id(&self, kind: RecordKind) -> Result<u64, RepositoryError>;
}

/// One atomic session write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCommit {
    pub session: InterviewSession,
    pub expected_version: u64,
    pub answer: Option<InterviewAnswer>,
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("conflicting write: record exists or changed underneath")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
