//! Adaptive interviews: authored definitions whose question order is computed at
//! runtime from per-question branching rules, and the candidate sessions that
//! traverse them.

pub mod definition;
pub mod domain;
pub mod error;
pub mod memory;
pub mod repository;
pub mod router;
pub mod rules;
pub mod service;
pub mod session;

#[cfg(test)]
mod tests;

pub use definition::{
    validate, DefinitionError, DefinitionPolicy, DefinitionStore, InterviewDraft, OptionSpec,
    QuestionSpec, RuleSpec, DEFAULT_RULE_PRIORITY,
};
pub use domain::{
    AnswerId, AnswerSheet, AnswerValue, ConditionNode, EqualsCondition, GteCondition,
    InterviewAnswer, InterviewDefinition, InterviewId, InterviewSession, InterviewSummary,
    OptionId, Question, QuestionId, QuestionOption, QuestionRule, QuestionType, RuleAction,
    RuleId, SessionId, SessionStatus, UserId,
};
pub use error::InterviewError;
pub use memory::InMemoryInterviewStore;
pub use repository::{
    DefinitionRepository, RecordKind, RepositoryError, SessionCommit, SessionRepository,
};
pub use router::{interview_router, status_for};
pub use rules::{evaluate, DerivedMetrics, NoMetrics, RuleOutcome};
pub use service::InterviewService;
pub use session::{
    AnswerOutcome, Clock, DerivedMetricsProvider, NextQuestion, SessionEngine, SessionStart, Step,
    SystemClock,
};
