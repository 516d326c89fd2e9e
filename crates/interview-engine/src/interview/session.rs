use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::domain::{
    AnswerId, AnswerSheet, AnswerValue, InterviewAnswer, InterviewDefinition, InterviewSession,
    Question, QuestionId, SessionId, SessionStatus, UserId,
};
use super::error::InterviewError;
use super::repository::{RecordKind, RepositoryError, SessionCommit, SessionRepository};
use super::rules::{self, DerivedMetrics, NoMetrics, RuleOutcome};

/// Source of timestamps for sessions and answers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Host hook that supplies derived metrics for `gte` conditions, e.g. an external
/// scoring collaborator. Called once per recomputation with the full answer sheet.
pub trait DerivedMetricsProvider: Send + Sync {
    fn metrics(&self, session: &InterviewSession, answers: &AnswerSheet) -> BTreeMap<String, f64>;
}

impl DerivedMetricsProvider for NoMetrics {
    fn metrics(
        &self,
        _session: &InterviewSession,
        _answers: &AnswerSheet,
    ) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }
}

/// What the session should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Ask(QuestionId),
    Complete,
}

/// First question by `order`, or completion for an empty definition.
pub fn seed(definition: &InterviewDefinition) -> Step {
    match definition.first_question() {
        Some(question) => Step::Ask(question.id),
        None => Step::Complete,
    }
}

/// Recomputes the next step from the full answer sheet.
///
/// The rules consulted are those of the answered question with the highest
/// `order`. A jump to a question missing from the definition completes the session.
pub fn next_step<M>(definition: &InterviewDefinition, answers: &AnswerSheet, derived: &M) -> Step
where
    M: DerivedMetrics + ?Sized,
{
    let Some(last) = last_answered(definition, answers) else {
        return seed(definition);
    };

    match rules::evaluate(&last.rules, answers, derived) {
        RuleOutcome::End => Step::Complete,
        RuleOutcome::Advance(target) if definition.contains(target) => Step::Ask(target),
        RuleOutcome::Advance(target) => {
            debug!(question_id = %target, "rule jumped outside the interview; completing");
            Step::Complete
        }
        RuleOutcome::NoMatch => definition
            .ordered_questions()
            .into_iter()
            .find(|question| !answers.contains(question.id))
            .map(|question| Step::Ask(question.id))
            .unwrap_or(Step::Complete),
    }
}

fn last_answered<'a>(
    definition: &'a InterviewDefinition,
    answers: &AnswerSheet,
) -> Option<&'a Question> {
    definition
        .questions
        .iter()
        .filter(|question| answers.contains(question.id))
        .max_by_key(|question| question.position())
}

fn apply(session: &mut InterviewSession, step: Step, now: DateTime<Utc>) {
    match step {
        Step::Ask(question_id) => session.current_question_id = Some(question_id),
        Step::Complete => {
            session.status = SessionStatus::Completed;
            session.current_question_id = None;
            session.completed_at = Some(now);
        }
    }
}

fn log_completion(session: &InterviewSession) {
    if session.status == SessionStatus::Completed {
        info!(session_id = %session.id, "interview session completed");
    }
}

/// Returned when a session is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStart {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub first_question: Option<Question>,
}

/// The question to serve next, or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextQuestion {
    pub question: Option<Question>,
    pub completed: bool,
    pub status: SessionStatus,
}

impl NextQuestion {
    fn from_session(session: &InterviewSession, definition: &InterviewDefinition) -> Self {
        let question = session
            .current_question_id
            .and_then(|id| definition.question(id))
            .cloned();
        Self {
            question,
            completed: session.status == SessionStatus::Completed,
            status: session.status,
        }
    }
}

/// Result of a submitted answer: the question to serve after it, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub next_question: Option<Question>,
    pub completed: bool,
    pub status: SessionStatus,
}

impl From<NextQuestion> for AnswerOutcome {
    fn from(next: NextQuestion) -> Self {
        Self {
            next_question: next.question,
            completed: next.completed,
            status: next.status,
        }
    }
}

/// Owns the session state machine and its answer log.
pub struct SessionEngine<S> {
    repository: Arc<S>,
    metrics: Arc<dyn DerivedMetricsProvider>,
}

impl<S> SessionEngine<S>
where
    S: SessionRepository + 'static,
{
    pub fn new(repository: Arc<S>) -> Self {
        Self::with_metrics(repository, Arc::new(NoMetrics))
    }

    pub fn with_metrics(repository: Arc<S>, metrics: Arc<dyn DerivedMetricsProvider>) -> Self {
        Self {
            repository,
            metrics,
        }
    }

    pub fn load(&self, session_id: SessionId) -> Result<InterviewSession, InterviewError> {
        self.repository
            .fetch(session_id)?
            .ok_or(InterviewError::SessionNotFound(session_id))
    }

    pub fn answers(&self, session_id: SessionId) -> Result<Vec<InterviewAnswer>, InterviewError> {
        self.load(session_id)?;
        Ok(self.repository.answers(session_id)?)
    }

    pub fn start(
        &self,
        definition: &InterviewDefinition,
        user_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<SessionStart, InterviewError> {
        let mut session = InterviewSession {
            id: SessionId(self.repository.next_session_id(RecordKind::Session)?),
            interview_id: definition.id,
            user_id,
            status: SessionStatus::Active,
            current_question_id: None,
            started_at: now,
            completed_at: None,
            version: 0,
        };
        apply(&mut session, seed(definition), now);

        let stored = self.repository.insert(session)?;
        info!(
            session_id = %stored.id,
            interview_id = %stored.interview_id,
            status = %stored.status,
            "interview session started"
        );

        let question = stored
            .current_question_id
            .and_then(|id| definition.question(id))
            .cloned();
        Ok(SessionStart {
            session_id: stored.id,
            status: stored.status,
            first_question: question,
        })
    }

    /// Serves the pending question. Repeated calls without an answer in between
    /// return the same question and write nothing.
    pub fn next(
        &self,
        session: InterviewSession,
        definition: &InterviewDefinition,
        now: DateTime<Utc>,
    ) -> Result<NextQuestion, InterviewError> {
        if !session.is_active() {
            return Ok(NextQuestion::from_session(&session, definition));
        }

        if let Some(current) = session.current_question_id {
            if definition.contains(current) {
                return Ok(NextQuestion::from_session(&session, definition));
            }
        }

        let answers = self.repository.answers(session.id)?;
        let sheet = AnswerSheet::from_answers(&answers);
        let expected_version = session.version;
        let mut session = session;
        session.current_question_id = None;
        self.advance(&mut session, definition, &sheet, now);

        let stored = self.commit(session, expected_version, None)?;
        log_completion(&stored);
        Ok(NextQuestion::from_session(&stored, definition))
    }

    /// Appends the answer and recomputes the pointer in one commit.
    pub fn submit(
        &self,
        session: InterviewSession,
        definition: &InterviewDefinition,
        question_id: QuestionId,
        value: Option<Map<String, Value>>,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, InterviewError> {
        if !session.is_active() {
            return Err(InterviewError::InvalidState {
                session_id: session.id,
                status: session.status,
            });
        }
        if !definition.contains(question_id) {
            return Err(InterviewError::QuestionNotFound {
                interview_id: definition.id,
                question_id,
            });
        }
        if session.current_question_id != Some(question_id) {
            debug!(
                session_id = %session.id,
                %question_id,
                "answer submitted for a question other than the pending one"
            );
        }

        let answer = InterviewAnswer {
            id: AnswerId(self.repository.next_session_id(RecordKind::Answer)?),
            session_id: session.id,
            question_id,
            value: AnswerValue::from_optional(value),
            created_at: now,
        };

        let mut answers = self.repository.answers(session.id)?;
        answers.push(answer.clone());
        let sheet = AnswerSheet::from_answers(&answers);

        let expected_version = session.version;
        let mut session = session;
        session.current_question_id = None;
        self.advance(&mut session, definition, &sheet, now);

        let stored = self.commit(session, expected_version, Some(answer))?;
        log_completion(&stored);
        Ok(NextQuestion::from_session(&stored, definition).into())
    }

    /// Terminal transition requested by an external cleanup process.
    pub fn abandon(
        &self,
        session: InterviewSession,
        now: DateTime<Utc>,
    ) -> Result<InterviewSession, InterviewError> {
        if !session.is_active() {
            return Err(InterviewError::InvalidState {
                session_id: session.id,
                status: session.status,
            });
        }

        let expected_version = session.version;
        let mut session = session;
        session.status = SessionStatus::Abandoned;
        session.current_question_id = None;
        session.completed_at = Some(now);

        let stored = self.commit(session, expected_version, None)?;
        info!(session_id = %stored.id, "interview session abandoned");
        Ok(stored)
    }

    fn advance(
        &self,
        session: &mut InterviewSession,
        definition: &InterviewDefinition,
        sheet: &AnswerSheet,
        now: DateTime<Utc>,
    ) {
        let derived = self.metrics.metrics(session, sheet);
        let step = next_step(definition, sheet, &derived);
        debug!(session_id = %session.id, ?step, answered = sheet.len(), "session recomputed");
        apply(session, step, now);
    }

    fn commit(
        &self,
        session: InterviewSession,
        expected_version: u64,
        answer: Option<InterviewAnswer>,
    ) -> Result<InterviewSession, InterviewError> {
        let session_id = session.id;
        self.repository
            .commit(SessionCommit {
                session,
                expected_version,
                answer,
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => InterviewError::Conflict(session_id),
                RepositoryError::NotFound => InterviewError::SessionNotFound(session_id),
                other => InterviewError::Repository(other),
            })
    }
}
