use std::str::FromStr;

use common::{
    error::AppError,
    storage::types::question::{AnswerKey, Difficulty, QuestionOptions},
};
use serde::Deserialize;

/// A generated, not-yet-validated exam item. Exists only in memory for the
/// duration of one generation + validation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuestion {
    pub question_text: String,
    pub options: QuestionOptions,
    pub correct_answer: AnswerKey,
    pub explanation: String,
    pub topic: String,
    pub sub_topic: Option<String>,
    pub difficulty: Difficulty,
    pub legal_reference: Option<String>,
}

/// Outcome of strictly parsing one generated item. Either a fully-populated
/// candidate or a reason it was discarded; never a partial struct.
#[derive(Debug)]
pub enum ParseResult {
    Valid(CandidateQuestion),
    Invalid { reason: String },
}

#[derive(Debug, Deserialize)]
struct RawGenerationBatch {
    questions: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    question_text: String,
    options: QuestionOptions,
    correct_answer: String,
    explanation: String,
    #[serde(default)]
    sub_topic: Option<String>,
    #[serde(default)]
    legal_reference: Option<String>,
}

/// Parses the generation model's structured output into per-item results.
///
/// Fails only when the payload as a whole is not the expected JSON shape;
/// individually malformed items become `ParseResult::Invalid` so a single
/// bad item never discards its siblings.
pub fn parse_generation_payload(
    content: &str,
    topic: &str,
    difficulty: Difficulty,
) -> Result<Vec<ParseResult>, AppError> {
    let batch = serde_json::from_str::<RawGenerationBatch>(content).map_err(|e| {
        AppError::LLMParsing(format!("Failed to parse generation response batch: {e}"))
    })?;

    let results = batch
        .questions
        .into_iter()
        .map(|value| match serde_json::from_value::<RawCandidate>(value) {
            Ok(raw) => into_candidate(raw, topic, difficulty),
            Err(e) => ParseResult::Invalid {
                reason: format!("malformed question object: {e}"),
            },
        })
        .collect();

    Ok(results)
}

fn into_candidate(raw: RawCandidate, topic: &str, difficulty: Difficulty) -> ParseResult {
    let correct_answer = match AnswerKey::from_str(&raw.correct_answer) {
        Ok(answer) => answer,
        Err(_) => {
            return ParseResult::Invalid {
                reason: format!("correct_answer '{}' is not one of A-E", raw.correct_answer),
            }
        }
    };

    let candidate = CandidateQuestion {
        question_text: raw.question_text,
        options: raw.options,
        correct_answer,
        explanation: raw.explanation,
        topic: topic.to_string(),
        sub_topic: raw.sub_topic,
        difficulty,
        legal_reference: raw.legal_reference,
    };

    match validate_structure(&candidate) {
        Ok(()) => ParseResult::Valid(candidate),
        Err(reason) => ParseResult::Invalid { reason },
    }
}

/// The structural admission gate: exactly five distinct non-empty options,
/// an A-E answer, and non-empty stem, explanation and topic. Cheap; runs
/// before any expert call.
pub fn validate_structure(candidate: &CandidateQuestion) -> Result<(), String> {
    if candidate.question_text.trim().is_empty() {
        return Err("question text is empty".into());
    }
    if !candidate.options.all_populated() {
        return Err("one or more options are empty".into());
    }
    if !candidate.options.all_distinct() {
        return Err("options contain duplicates".into());
    }
    if candidate.explanation.trim().is_empty() {
        return Err("explanation is empty".into());
    }
    if candidate.topic.trim().is_empty() {
        return Err("topic is empty".into());
    }

    Ok(())
}
