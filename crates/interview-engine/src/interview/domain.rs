use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of an authored interview definition.
    InterviewId
);
record_id!(
    /// Identifier of a question; unique across all interviews.
    QuestionId
);
record_id!(OptionId);
record_id!(RuleId);
record_id!(
    /// Identifier of one candidate traversal.
    SessionId
);
record_id!(AnswerId);
record_id!(
    /// Candidate identity supplied by the host; sessions may be anonymous.
    UserId
);

/// Supported answer widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    SingleChoice,
    MultiChoice,
    Scale,
    Date,
    File,
}

impl QuestionType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::SingleChoice => "single_choice",
            Self::MultiChoice => "multi_choice",
            Self::Scale => "scale",
            Self::Date => "date",
            Self::File => "file",
        }
    }

    pub const fn is_choice(self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultiChoice)
    }
}

/// Authored interview with its questions sorted by `order`, ties broken by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewDefinition {
    pub id: InterviewId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<Question>,
}

impl InterviewDefinition {
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == id)
    }

    pub fn contains(&self, id: QuestionId) -> bool {
        self.question(id).is_some()
    }

    /// Questions in traversal order, independent of storage order.
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut ordered: Vec<&Question> = self.questions.iter().collect();
        ordered.sort_by_key(|question| question.position());
        ordered
    }

    pub fn first_question(&self) -> Option<&Question> {
        self.questions
            .iter()
            .min_by_key(|question| question.position())
    }

    pub fn summary(&self) -> InterviewSummary {
        InterviewSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            active: self.active,
            question_count: self.questions.len(),
            created_at: self.created_at,
        }
    }
}

/// Listing view of a definition without its question tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSummary {
    pub id: InterviewId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub question_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub interview_id: InterviewId,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: String,
    pub help_text: Option<String>,
    pub required: bool,
    pub order: i32,
    /// Type-specific constraints such as scale bounds.
    pub meta: Option<Map<String, Value>>,
    pub options: Vec<QuestionOption>,
    pub rules: Vec<QuestionRule>,
}

impl Question {
    /// Sort key used for every traversal decision.
    pub fn position(&self) -> (i32, QuestionId) {
        (self.order, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub question_id: QuestionId,
    pub label: String,
    pub value: String,
}

/// Branching rule consulted after its question has been answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRule {
    pub id: RuleId,
    pub question_id: QuestionId,
    pub priority: i32,
    pub condition: Option<ConditionNode>,
    pub action: RuleAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(default, alias = "goTo")]
    pub go_to: Option<QuestionId>,
    #[serde(default)]
    pub end: bool,
}

impl RuleAction {
    pub fn end() -> Self {
        Self {
            go_to: None,
            end: true,
        }
    }

    pub fn go_to(question_id: QuestionId) -> Self {
        Self {
            go_to: Some(question_id),
            end: false,
        }
    }

    /// A matching rule with this action changes nothing.
    pub fn is_inert(&self) -> bool {
        !self.end && self.go_to.is_none()
    }
}

/// Boolean condition tree. Unknown shapes fail to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionNode {
    All(Vec<ConditionNode>),
    Any(Vec<ConditionNode>),
    Equals(EqualsCondition),
    Gte(GteCondition),
}

impl ConditionNode {
    pub fn equals(question_id: QuestionId, value: impl Into<Value>) -> Self {
        Self::Equals(EqualsCondition {
            question_id,
            value: value.into(),
        })
    }

    pub fn gte(derived: impl Into<String>, value: f64) -> Self {
        Self::Gte(GteCondition {
            derived: derived.into(),
            value,
        })
    }

    /// `all: []`, the condition that always holds.
    pub fn always() -> Self {
        Self::All(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualsCondition {
    #[serde(alias = "questionId")]
    pub question_id: QuestionId,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GteCondition {
    pub derived: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One candidate's traversal of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: SessionId,
    pub interview_id: InterviewId,
    pub user_id: Option<UserId>,
    pub status: SessionStatus,
    pub current_question_id: Option<QuestionId>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Revision counter checked on every write.
    pub version: u64,
}

impl InterviewSession {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Free-form answer payload. A missing payload is stored as an empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerValue(pub Map<String, Value>);

impl AnswerValue {
    pub fn scalar(value: impl Into<Value>) -> Self {
        let mut map = Map::new();
        map.insert("value".to_string(), value.into());
        Self(map)
    }

    pub fn from_optional(value: Option<Map<String, Value>>) -> Self {
        Self(value.unwrap_or_default())
    }

    /// Compares against a rule value: either the whole object, or its `value` field.
    pub fn matches(&self, expected: &Value) -> bool {
        if let Value::Object(expected) = expected {
            if *expected == self.0 {
                return true;
            }
        }

        self.0.get("value") == Some(expected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewAnswer {
    pub id: AnswerId,
    pub session_id: SessionId,
    pub question_id: QuestionId,
    pub value: AnswerValue,
    pub created_at: DateTime<Utc>,
}

/// Answers keyed by question; a later answer to the same question replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerSheet {
    answers: BTreeMap<QuestionId, AnswerValue>,
}

impl AnswerSheet {
    pub fn from_answers<'a, I>(answers: I) -> Self
    where
        I: IntoIterator<Item = &'a InterviewAnswer>,
    {
        let mut sheet = Self::default();
        for answer in answers {
            sheet.record(answer.question_id, answer.value.clone());
        }
        sheet
    }

    pub fn record(&mut self, question_id: QuestionId, value: AnswerValue) {
        self.answers.insert(question_id, value);
    }

    pub fn get(&self, question_id: QuestionId) -> Option<&AnswerValue> {
        self.answers.get(&question_id)
    }

    pub fn contains(&self, question_id: QuestionId) -> bool {
        self.answers.contains_key(&question_id)
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }
}
