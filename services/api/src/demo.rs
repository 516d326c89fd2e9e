use crate::infra::{default_answer, parse_answer, sample_interview_draft, AnswerArg};
use clap::Args;
use interview_engine::error::AppError;
use interview_engine::interview::{
    AnswerValue, DefinitionPolicy, InMemoryInterviewStore, InterviewAnswer, InterviewService,
    QuestionId, QuestionType, SessionStatus,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Answer to give for a question, as QUESTION_ID=VALUE. Repeatable.
    #[arg(long = "answer", value_name = "QUESTION_ID=VALUE", value_parser = parse_answer)]
    pub(crate) answers: Vec<AnswerArg>,
    /// Print the stored answer log as JSON after the walk.
    #[arg(long)]
    pub(crate) show_answers: bool,
}

#[derive(Debug)]
pub(crate) struct DemoStep {
    pub(crate) question_id: QuestionId,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: String,
    pub(crate) answer: Value,
}

#[derive(Debug)]
pub(crate) struct DemoTranscript {
    pub(crate) interview_name: String,
    pub(crate) steps: Vec<DemoStep>,
    pub(crate) status: SessionStatus,
    pub(crate) answers: Vec<InterviewAnswer>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        answers,
        show_answers,
    } = args;

    let transcript = walk_sample_interview(&answers)?;

    println!("Adaptive interview demo: {}", transcript.interview_name);
    for (index, step) in transcript.steps.iter().enumerate() {
        println!(
            "  {}. [{} {}] {} -> {}",
            index + 1,
            step.question_id,
            step.question_type.label(),
            step.prompt,
            step.answer
        );
    }
    println!("Session finished with status '{}'", transcript.status);

    if show_answers {
        match serde_json::to_string_pretty(&transcript.answers) {
            Ok(json) => println!("Answer log:\n{}", json),
            Err(err) => println!("Answer log unavailable: {}", err),
        }
    }

    Ok(())
}

/// Starts a session on the sample interview and answers every served question,
/// preferring caller-supplied answers over the per-type defaults.
pub(crate) fn walk_sample_interview(overrides: &[AnswerArg]) -> Result<DemoTranscript, AppError> {
    let store = Arc::new(InMemoryInterviewStore::default());
    let service = InterviewService::new(store.clone(), store, DefinitionPolicy::default());

    let definition = service.create_interview(sample_interview_draft())?;
    let overrides: HashMap<QuestionId, &Value> = overrides
        .iter()
        .map(|arg| (arg.question_id, &arg.value))
        .collect();

    let start = service.start_session(definition.id, None)?;
    let mut pending = start.first_question;
    let mut steps = Vec::new();
    // Rule jumps can revisit answered questions.
    let max_steps = definition.questions.len() * 2;

    while let Some(question) = pending.take() {
        if steps.len() >= max_steps {
            println!("Stopping after {} answers; the rules appear to loop", max_steps);
            break;
        }

        let answer = overrides
            .get(&question.id)
            .map(|value| (*value).clone())
            .unwrap_or_else(|| default_answer(question.question_type));
        let next = service.submit_answer(
            start.session_id,
            question.id,
            Some(AnswerValue::scalar(answer.clone()).0),
        )?;

        steps.push(DemoStep {
            question_id: question.id,
            question_type: question.question_type,
            prompt: question.prompt,
            answer,
        });
        pending = next.next_question;
    }

    let session = service.get_session(start.session_id)?;
    let answers = service.session_answers(start.session_id)?;

    Ok(DemoTranscript {
        interview_name: definition.name,
        steps,
        status: session.status,
        answers,
    })
}
