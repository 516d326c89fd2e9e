use interview_engine::interview::{
    ConditionNode, InterviewDraft, QuestionId, QuestionSpec, QuestionType, RuleAction, RuleSpec,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Map, Value};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const WORK_PERMIT: QuestionId = QuestionId(1);
pub(crate) const SPONSORSHIP: QuestionId = QuestionId(2);
pub(crate) const RUST_RATING: QuestionId = QuestionId(3);
pub(crate) const START_DATE: QuestionId = QuestionId(4);

/// Phone screen used by the `demo` command.
///
/// Candidates with a work permit skip the sponsorship question. A self rating
/// of 1 ends the screen early.
pub(crate) fn sample_interview_draft() -> InterviewDraft {
    let mut rating_bounds = Map::new();
    rating_bounds.insert("min".to_string(), json!(1));
    rating_bounds.insert("max".to_string(), json!(5));

    let mut rating = QuestionSpec::new(QuestionType::Scale, "How would you rate your Rust?", 30)
        .with_id(RUST_RATING)
        .with_rule(RuleSpec::new(
            1,
            ConditionNode::equals(RUST_RATING, 1),
            RuleAction::end(),
        ))
        .with_rule(RuleSpec::new(
            2,
            ConditionNode::always(),
            RuleAction::go_to(START_DATE),
        ));
    rating.meta = Some(rating_bounds);

    InterviewDraft {
        name: "Backend engineer phone screen".to_string(),
        description: Some("Sample adaptive interview".to_string()),
        questions: vec![
            QuestionSpec::new(QuestionType::SingleChoice, "Do you hold a work permit?", 10)
                .with_id(WORK_PERMIT)
                .with_option("Yes", "yes")
                .with_option("No", "no")
                .with_rule(RuleSpec::new(
                    1,
                    ConditionNode::equals(WORK_PERMIT, "yes"),
                    RuleAction::go_to(RUST_RATING),
                )),
            QuestionSpec::new(QuestionType::Text, "Which visa sponsorship do you need?", 20)
                .with_id(SPONSORSHIP),
            rating,
            QuestionSpec::new(QuestionType::Date, "Earliest start date?", 40)
                .with_id(START_DATE)
                .with_rule(RuleSpec::new(1, ConditionNode::always(), RuleAction::end())),
        ],
    }
}

/// Fallback answer when the caller did not supply one on the command line.
pub(crate) fn default_answer(question_type: QuestionType) -> Value {
    match question_type {
        QuestionType::SingleChoice | QuestionType::MultiChoice => json!("yes"),
        QuestionType::Scale => json!(4),
        QuestionType::Date => json!("2025-11-03"),
        QuestionType::Text | QuestionType::File => json!("n/a"),
    }
}

/// `--answer QUESTION_ID=VALUE` where VALUE is parsed as JSON when possible.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AnswerArg {
    pub(crate) question_id: QuestionId,
    pub(crate) value: Value,
}

pub(crate) fn parse_answer(raw: &str) -> Result<AnswerArg, String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected QUESTION_ID=VALUE, got '{raw}'"))?;
    let question_id = key
        .trim()
        .parse::<u64>()
        .map(QuestionId)
        .map_err(|err| format!("failed to parse question id '{key}' ({err})"))?;
    let value = value.trim();
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    Ok(AnswerArg { question_id, value })
}
