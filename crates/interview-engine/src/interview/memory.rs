//! Process-local store backing the CLI, the HTTP demo server, and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    InterviewAnswer, InterviewDefinition, InterviewId, InterviewSession, QuestionId, SessionId,
};
use super::repository::{
    DefinitionRepository, RecordKind, RepositoryError, SessionCommit, SessionRepository,
};

#[derive(Default)]
struct StoreState {
    interviews: HashMap<InterviewId, InterviewDefinition>,
    question_owners: HashMap<QuestionId, InterviewId>,
    sessions: HashMap<SessionId, InterviewSession>,
    answers: HashMap<SessionId, Vec<InterviewAnswer>>,
    issued: HashMap<RecordKind, u64>,
}

/// Single-lock store; every write happens under one mutex so commits are atomic.
#[derive(Default, Clone)]
pub struct InMemoryInterviewStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryInterviewStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("interview store mutex poisoned".to_string()))
    }

    /// Ids are shared by every service built over clones of this store.
    fn issue(&self, kind: RecordKind) -> Result<u64, RepositoryError> {
        let mut guard = self.lock()?;
        let last = guard.issued.entry(kind).or_insert(0);
        *last += 1;
        Ok(*last)
    }
}

impl DefinitionRepository for InMemoryInterviewStore {
    fn insert(
        &self,
        definition: InterviewDefinition,
    ) -> Result<InterviewDefinition, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.interviews.contains_key(&definition.id) {
            return Err(RepositoryError::Conflict);
        }
        if definition
            .questions
            .iter()
            .any(|question| guard.question_owners.contains_key(&question.id))
        {
            return Err(RepositoryError::Conflict);
        }

        for question in &definition.questions {
            guard.question_owners.insert(question.id, definition.id);
        }
        guard.interviews.insert(definition.id, definition.clone());
        Ok(definition)
    }

    fn fetch(&self, id: InterviewId) -> Result<Option<InterviewDefinition>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.interviews.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<InterviewDefinition>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.interviews.values().cloned().collect())
    }

    fn question_owner(&self, id: QuestionId) -> Result<Option<InterviewId>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.question_owners.get(&id).copied())
    }

    fn next_definition_id(&self, kind: RecordKind) -> Result<u64, RepositoryError> {
        self.issue(kind)
    }
}

impl SessionRepository for InMemoryInterviewStore {
    fn insert(&self, session: InterviewSession) -> Result<InterviewSession, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.sessions.contains_key(&session.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    fn fetch(&self, id: SessionId) -> Result<Option<InterviewSession>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.sessions.get(&id).cloned())
    }

    fn answers(&self, id: SessionId) -> Result<Vec<InterviewAnswer>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.answers.get(&id).cloned().unwrap_or_default())
    }

    fn commit(&self, commit: SessionCommit) -> Result<InterviewSession, RepositoryError> {
        let SessionCommit {
            mut session,
            expected_version,
            answer,
        } = commit;

        let mut guard = self.lock()?;
        let stored_version = guard
            .sessions
            .get(&session.id)
            .map(|stored| stored.version)
            .ok_or(RepositoryError::NotFound)?;
        if stored_version != expected_version {
            return Err(RepositoryError::Conflict);
        }

        if let Some(answer) = &answer {
            let duplicate = guard
                .answers
                .values()
                .flatten()
                .any(|stored| stored.id == answer.id);
            if duplicate {
                return Err(RepositoryError::Conflict);
            }
        }

        session.version = expected_version + 1;
        if let Some(answer) = answer {
            guard.answers.entry(session.id).or_default().push(answer);
        }
        guard.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    fn next_session_id(&self, kind: RecordKind) -> Result<u64, RepositoryError> {
        self.issue(kind)
    }
}
