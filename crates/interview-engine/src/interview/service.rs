use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use super::definition::{DefinitionPolicy, DefinitionStore, InterviewDraft};
use super::domain::{
    InterviewAnswer, InterviewDefinition, InterviewId, InterviewSession, InterviewSummary,
    QuestionId, SessionId, UserId,
};
use super::error::InterviewError;
use super::repository::{DefinitionRepository, SessionRepository};
use super::rules::NoMetrics;
use super::session::{
    AnswerOutcome, Clock, DerivedMetricsProvider, NextQuestion, SessionEngine, SessionStart,
    SystemClock,
};

/// Boundary facade composing the definition store and the session engine.
pub struct InterviewService<D, S> {
    definitions: DefinitionStore<D>,
    sessions: SessionEngine<S>,
    clock: Arc<dyn Clock>,
}

impl<D, S> InterviewService<D, S>
where
    D: DefinitionRepository + 'static,
    S: SessionRepository + 'static,
{
    pub fn new(definitions: Arc<D>, sessions: Arc<S>, policy: DefinitionPolicy) -> Self {
        Self::with_collaborators(
            definitions,
            sessions,
            policy,
            Arc::new(NoMetrics),
            Arc::new(SystemClock),
        )
    }

    pub fn with_collaborators(
        definitions: Arc<D>,
        sessions: Arc<S>,
        policy: DefinitionPolicy,
        metrics: Arc<dyn DerivedMetricsProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            definitions: DefinitionStore::new(definitions, policy),
            sessions: SessionEngine::with_metrics(sessions, metrics),
            clock,
        }
    }

    pub fn create_interview(
        &self,
        draft: InterviewDraft,
    ) -> Result<InterviewDefinition, InterviewError> {
        self.definitions
            .create(draft, self.clock.now())
            .inspect_err(|err| warn!(error = %err, "interview definition rejected"))
    }

    pub fn get_interview(&self, id: InterviewId) -> Result<InterviewDefinition, InterviewError> {
        self.definitions.get(id)
    }

    pub fn list_interviews(&self) -> Result<Vec<InterviewSummary>, InterviewError> {
        self.definitions.list()
    }

    pub fn start_session(
        &self,
        interview_id: InterviewId,
        user_id: Option<UserId>,
    ) -> Result<SessionStart, InterviewError> {
        let definition = self.definitions.get(interview_id)?;
        self.sessions.start(&definition, user_id, self.clock.now())
    }

    pub fn get_session(&self, session_id: SessionId) -> Result<InterviewSession, InterviewError> {
        self.sessions.load(session_id)
    }

    pub fn get_next_question(&self, session_id: SessionId) -> Result<NextQuestion, InterviewError> {
        let session = self.sessions.load(session_id)?;
        let definition = self.definitions.get(session.interview_id)?;
        self.sessions.next(session, &definition, self.clock.now())
    }

    pub fn submit_answer(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
        value: Option<Map<String, Value>>,
    ) -> Result<AnswerOutcome, InterviewError> {
        let session = self.sessions.load(session_id)?;
        let definition = self.definitions.get(session.interview_id)?;
        self.sessions
            .submit(session, &definition, question_id, value, self.clock.now())
    }

    /// Marks an active session abandoned; used by external timeout or cleanup jobs.
    pub fn abandon_session(
        &self,
        session_id: SessionId,
    ) -> Result<InterviewSession, InterviewError> {
        let session = self.sessions.load(session_id)?;
        self.sessions.abandon(session, self.clock.now())
    }

    pub fn session_answers(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<InterviewAnswer>, InterviewError> {
        self.sessions.answers(session_id)
    }
}
