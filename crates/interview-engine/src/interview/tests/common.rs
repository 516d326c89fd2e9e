use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::interview::definition::{DefinitionPolicy, InterviewDraft, QuestionSpec, RuleSpec};
use crate::interview::domain::{
    AnswerSheet, AnswerValue, ConditionNode, InterviewAnswer, InterviewDefinition, InterviewId,
    InterviewSession, QuestionId, QuestionRule, QuestionType, RuleAction, RuleId, SessionId,
};
use crate::interview::memory::InMemoryInterviewStore;
use crate::interview::repository::{
    DefinitionRepository, RecordKind, RepositoryError, SessionCommit, SessionRepository,
};
use crate::interview::rules::{DerivedMetrics, NoMetrics};
use crate::interview::service::InterviewService;
use crate::interview::session::{Clock, DerivedMetricsProvider};

pub(super) const Q1: QuestionId = QuestionId(1);
pub(super) const Q2: QuestionId = QuestionId(2);
pub(super) const Q3: QuestionId = QuestionId(3);

pub(super) fn started_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) struct FixedClock(pub(super) DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(super) type MemoryService = InterviewService<InMemoryInterviewStore, InMemoryInterviewStore>;

pub(super) fn build_service() -> (MemoryService, Arc<InMemoryInterviewStore>) {
    build_service_with_metrics(Arc::new(NoMetrics))
}

pub(super) fn build_service_with_metrics(
    metrics: Arc<dyn DerivedMetricsProvider>,
) -> (MemoryService, Arc<InMemoryInterviewStore>) {
    let store = Arc::new(InMemoryInterviewStore::default());
    let service = InterviewService::with_collaborators(
        store.clone(),
        store.clone(),
        DefinitionPolicy::default(),
        metrics,
        Arc::new(FixedClock(started_at())),
    );
    (service, store)
}

pub(super) fn answer(value: &str) -> Option<Map<String, Value>> {
    Some(AnswerValue::scalar(value).0)
}

/// Q1 (no rules) -> Q2 (Q1 == "yes" ends, anything else jumps to Q3) -> Q3.
pub(super) fn screening_draft() -> InterviewDraft {
    InterviewDraft {
        name: "Backend screening".to_string(),
        description: Some("Adaptive phone screen".to_string()),
        questions: vec![
            QuestionSpec::new(QuestionType::SingleChoice, "Do you hold a work permit?", 1)
                .with_id(Q1)
                .with_option("Yes", "yes")
                .with_option("No", "no"),
            QuestionSpec::new(QuestionType::Text, "Preferred start date?", 2)
                .with_id(Q2)
                .with_rule(RuleSpec::new(
                    1,
                    ConditionNode::equals(Q1, "yes"),
                    RuleAction::end(),
                ))
                .with_rule(RuleSpec::new(2, ConditionNode::always(), RuleAction::go_to(Q3))),
            QuestionSpec::new(QuestionType::Text, "Which visa sponsorship do you need?", 3)
                .with_id(Q3),
        ],
    }
}

pub(super) fn linear_draft(count: i32) -> InterviewDraft {
    InterviewDraft {
        name: "Linear".to_string(),
        description: None,
        questions: (1..=count)
            .map(|order| QuestionSpec::new(QuestionType::Text, format!("Question {order}"), order * 10))
            .collect(),
    }
}

pub(super) fn rule(id: u64, priority: i32, condition: ConditionNode, action: RuleAction) -> QuestionRule {
    QuestionRule {
        id: RuleId(id),
        question_id: Q1,
        priority,
        condition: Some(condition),
        action,
    }
}

pub(super) fn sheet(entries: &[(QuestionId, &str)]) -> AnswerSheet {
    let mut sheet = AnswerSheet::default();
    for (question_id, value) in entries {
        sheet.record(*question_id, AnswerValue::scalar(*value));
    }
    sheet
}

/// Metric source that remembers every lookup.
#[derive(Default)]
pub(super) struct ProbeMetrics {
    pub(super) values: BTreeMap<String, f64>,
    pub(super) lookups: RefCell<Vec<String>>,
}

impl DerivedMetrics for ProbeMetrics {
    fn metric(&self, name: &str) -> Option<f64> {
        self.lookups.borrow_mut().push(name.to_string());
        self.values.get(name).copied()
    }
}

/// Provider reporting how many questions have been answered as `answered`.
pub(super) struct AnsweredCountProvider;

impl DerivedMetricsProvider for AnsweredCountProvider {
    fn metrics(&self, _session: &InterviewSession, answers: &AnswerSheet) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("answered".to_string(), answers.len() as f64);
        metrics
    }
}

/// Store that lets one competing writer land right before the first session commit.
#[derive(Default)]
pub(super) struct RacingStore {
    pub(super) inner: InMemoryInterviewStore,
    raced: AtomicBool,
}

impl DefinitionRepository for RacingStore {
    fn insert(&self, definition: InterviewDefinition) -> Result<InterviewDefinition, RepositoryError> {
        DefinitionRepository::insert(&self.inner, definition)
    }

    fn fetch(&self, id: InterviewId) -> Result<Option<InterviewDefinition>, RepositoryError> {
        DefinitionRepository::fetch(&self.inner, id)
    }

    fn list(&self) -> Result<Vec<InterviewDefinition>, RepositoryError> {
        self.inner.list()
    }

    fn question_owner(&self, id: QuestionId) -> Result<Option<InterviewId>, RepositoryError> {
        self.inner.question_owner(id)
    }

    fn next_definition_id(&self, kind: RecordKind) -> Result<u64, RepositoryError> {
        self.inner.next_definition_id(kind)
    }
}

impl SessionRepository for RacingStore {
    fn insert(&self, session: InterviewSession) -> Result<InterviewSession, RepositoryError> {
        SessionRepository::insert(&self.inner, session)
    }

    fn fetch(&self, id: SessionId) -> Result<Option<InterviewSession>, RepositoryError> {
        SessionRepository::fetch(&self.inner, id)
    }

    fn answers(&self, id: SessionId) -> Result<Vec<InterviewAnswer>, RepositoryError> {
        self.inner.answers(id)
    }

    fn commit(&self, commit: SessionCommit) -> Result<InterviewSession, RepositoryError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let competing = SessionCommit {
                session: commit.session.clone(),
                expected_version: commit.expected_version,
                answer: None,
            };
            self.inner.commit(competing)?;
        }
        self.inner.commit(commit)
    }

    fn next_session_id(&self, kind: RecordKind) -> Result<u64, RepositoryError> {
        self.inner.next_session_id(kind)
    }
}

/// Definition store whose next `misses` ownership lookups come back empty, as if
/// a concurrent draft claimed the ids between the check and the insert.
#[derive(Default)]
pub(super) struct BlindOwnerStore {
    pub(super) inner: InMemoryInterviewStore,
    pub(super) misses: AtomicUsize,
}

impl DefinitionRepository for BlindOwnerStore {
    fn insert(&self, definition: InterviewDefinition) -> Result<InterviewDefinition, RepositoryError> {
        DefinitionRepository::insert(&self.inner, definition)
    }

    fn fetch(&self, id: InterviewId) -> Result<Option<InterviewDefinition>, RepositoryError> {
        DefinitionRepository::fetch(&self.inner, id)
    }

    fn list(&self) -> Result<Vec<InterviewDefinition>, RepositoryError> {
        self.inner.list()
    }

    fn question_owner(&self, id: QuestionId) -> Result<Option<InterviewId>, RepositoryError> {
        let missed = self
            .misses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if missed {
            return Ok(None);
        }
        self.inner.question_owner(id)
    }

    fn next_definition_id(&self, kind: RecordKind) -> Result<u64, RepositoryError> {
        self.inner.next_definition_id(kind)
    }
}

pub(super) struct UnavailableRepository;

impl DefinitionRepository for UnavailableRepository {
    fn insert(&self, _definition: InterviewDefinition) -> Result<InterviewDefinition, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: InterviewId) -> Result<Option<InterviewDefinition>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<InterviewDefinition>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn question_owner(&self, _id: QuestionId) -> Result<Option<InterviewId>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn next_definition_id(&self, _kind: RecordKind) -> Result<u64, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl SessionRepository for UnavailableRepository {
    fn insert(&self, _session: InterviewSession) -> Result<InterviewSession, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: SessionId) -> Result<Option<InterviewSession>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn answers(&self, _id: SessionId) -> Result<Vec<InterviewAnswer>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit(&self, _commit: SessionCommit) -> Result<InterviewSession, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn next_session_id(&self, _kind: RecordKind) -> Result<u64, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn draft_json() -> Value {
    json!({
        "name": "Support engineer screen",
        "questions": [
            { "id": 501, "type": "text", "prompt": "Years in support?", "order": 1 },
            {
                "id": 502,
                "type": "single_choice",
                "prompt": "On-call OK?",
                "order": 2,
                "options": [
                    { "label": "Yes", "value": "yes" },
                    { "label": "No", "value": "no" }
                ],
                "rules": [
                    { "priority": 1, "condition": { "equals": { "questionId": 502, "value": "no" } }, "action": { "end": true } }
                ]
            },
            { "id": 503, "type": "scale", "prompt": "Rate your SQL", "order": 3, "meta": { "min": 1, "max": 5 } }
        ]
    })
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
