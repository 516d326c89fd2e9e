use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::domain::{
    ConditionNode, InterviewDefinition, InterviewId, InterviewSummary, OptionId, Question,
    QuestionId, QuestionOption, QuestionRule, QuestionType, RuleAction, RuleId,
};
use super::error::InterviewError;
use super::repository::{DefinitionRepository, RecordKind, RepositoryError};

pub const DEFAULT_RULE_PRIORITY: i32 = 100;

/// Payload accepted by [`DefinitionStore::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub questions: Vec<QuestionSpec>,
}

/// Authoring shape of a question. `id` is optional; it is only needed when rules
/// elsewhere in the draft refer to this question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSpec {
    #[serde(default)]
    pub id: Option<QuestionId>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: String,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default = "required_by_default")]
    pub required: bool,
    pub order: i32,
    #[serde(default)]
    pub meta: Option<Map<String, Value>>,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

fn required_by_default() -> bool {
    true
}

impl QuestionSpec {
    pub fn new(question_type: QuestionType, prompt: impl Into<String>, order: i32) -> Self {
        Self {
            id: None,
            question_type,
            prompt: prompt.into(),
            help_text: None,
            required: true,
            order,
            meta: None,
            options: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: QuestionId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_option(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(OptionSpec {
            label: label.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_rule(mut self, rule: RuleSpec) -> Self {
        self.rules.push(rule);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub condition: Option<ConditionNode>,
    #[serde(default)]
    pub action: RuleAction,
}

fn default_priority() -> i32 {
    DEFAULT_RULE_PRIORITY
}

impl RuleSpec {
    pub fn new(priority: i32, condition: ConditionNode, action: RuleAction) -> Self {
        Self {
            priority,
            condition: Some(condition),
            action,
        }
    }
}

/// Strictness applied at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionPolicy {
    /// Reject rules that could match but declare neither `end` nor `go_to`.
    pub reject_inert_rules: bool,
    /// Reject choice questions without options.
    pub require_choice_options: bool,
}

impl Default for DefinitionPolicy {
    fn default() -> Self {
        Self {
            reject_inert_rules: true,
            require_choice_options: false,
        }
    }
}

/// Malformed definitions, reported before anything is stored.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("interview name must not be blank")]
    BlankName,
    #[error("interview must contain at least one question")]
    NoQuestions,
    #[error("question id {0} is declared more than once")]
    DuplicateQuestionId(QuestionId),
    #[error("question id {0} already belongs to another interview")]
    QuestionIdTaken(QuestionId),
    #[error("rule on question with order {order} jumps to unknown question {target}")]
    DanglingGoTo { order: i32, target: QuestionId },
    #[error("rule with priority {priority} on question with order {order} declares no action")]
    InertRule { order: i32, priority: i32 },
    #[error("choice question with order {order} has no options")]
    MissingOptions { order: i32 },
    #[error("scale question with order {order} has min {min} above max {max}")]
    InvalidScaleBounds { order: i32, min: f64, max: f64 },
}

/// Checks a draft against the structural invariants and the configured policy.
pub fn validate(draft: &InterviewDraft, policy: &DefinitionPolicy) -> Result<(), DefinitionError> {
    if draft.name.trim().is_empty() {
        return Err(DefinitionError::BlankName);
    }
    if draft.questions.is_empty() {
        return Err(DefinitionError::NoQuestions);
    }

    let mut declared = BTreeSet::new();
    for spec in &draft.questions {
        if let Some(id) = spec.id {
            if !declared.insert(id) {
                return Err(DefinitionError::DuplicateQuestionId(id));
            }
        }
    }

    for spec in &draft.questions {
        if policy.require_choice_options
            && spec.question_type.is_choice()
            && spec.options.is_empty()
        {
            return Err(DefinitionError::MissingOptions { order: spec.order });
        }

        if spec.question_type == QuestionType::Scale {
            if let Some((min, max)) = scale_bounds(spec.meta.as_ref()) {
                if min > max {
                    return Err(DefinitionError::InvalidScaleBounds {
                        order: spec.order,
                        min,
                        max,
                    });
                }
            }
        }

        for rule in &spec.rules {
            if let Some(target) = rule.action.go_to {
                if !declared.contains(&target) {
                    return Err(DefinitionError::DanglingGoTo {
                        order: spec.order,
                        target,
                    });
                }
            }
            if policy.reject_inert_rules && rule.condition.is_some() && rule.action.is_inert() {
                return Err(DefinitionError::InertRule {
                    order: spec.order,
                    priority: rule.priority,
                });
            }
        }
    }

    Ok(())
}

fn scale_bounds(meta: Option<&Map<String, Value>>) -> Option<(f64, f64)> {
    let meta = meta?;
    let min = meta.get("min")?.as_f64()?;
    let max = meta.get("max")?.as_f64()?;
    Some((min, max))
}

/// Validates drafts, assigns identifiers, and hands complete definitions to the repository.
pub struct DefinitionStore<D> {
    repository: Arc<D>,
    policy: DefinitionPolicy,
}

impl<D> DefinitionStore<D>
where
    D: DefinitionRepository + 'static,
{
    pub fn new(repository: Arc<D>, policy: DefinitionPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn create(
        &self,
        draft: InterviewDraft,
        now: DateTime<Utc>,
    ) -> Result<InterviewDefinition, InterviewError> {
        validate(&draft, &self.policy)?;

        let explicit: BTreeSet<QuestionId> =
            draft.questions.iter().filter_map(|spec| spec.id).collect();
        if let Some(id) = self.first_owned(&explicit)? {
            return Err(DefinitionError::QuestionIdTaken(id).into());
        }
        let mut reserved = explicit.clone();

        let interview_id = InterviewId(self.next_id(RecordKind::Interview)?);
        let mut questions = Vec::with_capacity(draft.questions.len());

        for spec in draft.questions {
            let question_id = match spec.id {
                Some(id) => id,
                None => self.allocate_question_id(&reserved)?,
            };
            reserved.insert(question_id);

            let options = spec
                .options
                .into_iter()
                .map(|option| {
                    Ok(QuestionOption {
                        id: OptionId(self.next_id(RecordKind::Option)?),
                        question_id,
                        label: option.label,
                        value: option.value,
                    })
                })
                .collect::<Result<Vec<_>, InterviewError>>()?;

            let rules = spec
                .rules
                .into_iter()
                .map(|rule| {
                    Ok(QuestionRule {
                        id: RuleId(self.next_id(RecordKind::Rule)?),
                        question_id,
                        priority: rule.priority,
                        condition: rule.condition,
                        action: rule.action,
                    })
                })
                .collect::<Result<Vec<_>, InterviewError>>()?;

            questions.push(Question {
                id: question_id,
                interview_id,
                question_type: spec.question_type,
                prompt: spec.prompt,
                help_text: spec.help_text,
                required: spec.required,
                order: spec.order,
                meta: spec.meta,
                options,
                rules,
            });
        }

        questions.sort_by_key(|question| question.position());

        let definition = InterviewDefinition {
            id: interview_id,
            name: draft.name,
            description: draft.description,
            active: true,
            created_at: now,
            questions,
        };

        let stored = match self.repository.insert(definition) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                // Another draft claimed one of the explicit ids after the check above.
                return Err(match self.first_owned(&explicit)? {
                    Some(id) => DefinitionError::QuestionIdTaken(id).into(),
                    None => RepositoryError::Conflict.into(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            interview_id = %stored.id,
            questions = stored.questions.len(),
            "interview definition created"
        );
        Ok(stored)
    }

    pub fn get(&self, id: InterviewId) -> Result<InterviewDefinition, InterviewError> {
        self.repository
            .fetch(id)?
            .ok_or(InterviewError::InterviewNotFound(id))
    }

    pub fn list(&self) -> Result<Vec<InterviewSummary>, InterviewError> {
        let mut summaries: Vec<InterviewSummary> = self
            .repository
            .list()?
            .iter()
            .map(InterviewDefinition::summary)
            .collect();
        summaries.sort_by_key(|summary| summary.id);
        Ok(summaries)
    }

    fn next_id(&self, kind: RecordKind) -> Result<u64, InterviewError> {
        Ok(self.repository.next_definition_id(kind)?)
    }

    fn first_owned(
        &self,
        ids: &BTreeSet<QuestionId>,
    ) -> Result<Option<QuestionId>, InterviewError> {
        for &id in ids {
            if self.repository.question_owner(id)?.is_some() {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    fn allocate_question_id(
        &self,
        reserved: &BTreeSet<QuestionId>,
    ) -> Result<QuestionId, InterviewError> {
        loop {
            let candidate = QuestionId(self.next_id(RecordKind::Question)?);
            if reserved.contains(&candidate) {
                continue;
            }
            if self.repository.question_owner(candidate)?.is_some() {
                debug!(question_id = %candidate, "skipping question id already in use");
                continue;
            }
            return Ok(candidate);
        }
    }
}
