//! Branching rule evaluation.
//!
//! Everything in here is a pure function of its inputs. The session engine calls
//! [`evaluate`] once per recomputation.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::domain::{AnswerSheet, ConditionNode, QuestionId, QuestionRule};

/// Result of consulting a question's rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "question_id")]
pub enum RuleOutcome {
    Advance(QuestionId),
    End,
    NoMatch,
}

/// Named numeric metrics computed outside the engine and consumed by `gte` conditions.
pub trait DerivedMetrics {
    fn metric(&self, name: &str) -> Option<f64>;
}

impl DerivedMetrics for BTreeMap<String, f64> {
    fn metric(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl DerivedMetrics for HashMap<String, f64> {
    fn metric(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

/// Metric source with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetrics;

impl DerivedMetrics for NoMetrics {
    fn metric(&self, _name: &str) -> Option<f64> {
        None
    }
}

/// Picks the action of the first rule (priority ascending, definition order on ties)
/// whose condition holds.
pub fn evaluate<M>(rules: &[QuestionRule], answers: &AnswerSheet, derived: &M) -> RuleOutcome
where
    M: DerivedMetrics + ?Sized,
{
    let mut ordered: Vec<&QuestionRule> = rules.iter().collect();
    ordered.sort_by_key(|rule| rule.priority);

    for rule in ordered {
        let Some(condition) = &rule.condition else {
            continue;
        };

        if condition_holds(condition, answers, derived) {
            if rule.action.end {
                return RuleOutcome::End;
            }
            return match rule.action.go_to {
                Some(target) => RuleOutcome::Advance(target),
                None => RuleOutcome::NoMatch,
            };
        }
    }

    RuleOutcome::NoMatch
}

/// Depth-first evaluation; `all`/`any` stop at the first decisive child.
pub fn condition_holds<M>(condition: &ConditionNode, answers: &AnswerSheet, derived: &M) -> bool
where
    M: DerivedMetrics + ?Sized,
{
    match condition {
        ConditionNode::All(children) => children
            .iter()
            .all(|child| condition_holds(child, answers, derived)),
        ConditionNode::Any(children) => children
            .iter()
            .any(|child| condition_holds(child, answers, derived)),
        ConditionNode::Equals(equals) => answers
            .get(equals.question_id)
            .map(|answer| answer.matches(&equals.value))
            .unwrap_or(false),
        ConditionNode::Gte(gte) => derived
            .metric(&gte.derived)
            .map(|metric| metric >= gte.value)
            .unwrap_or(false),
    }
}
