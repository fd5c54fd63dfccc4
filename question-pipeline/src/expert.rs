use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ResponseFormat,
    ResponseFormatJsonSchema,
};
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            question::{AnswerKey, Confidence, QuestionOptions},
            system_settings::SystemSettings,
        },
    },
};
use retrieval_pipeline::{passages_to_context_json, LegalRetriever};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, instrument};

use crate::llm_instructions::{
    get_expert_solve_schema, get_legal_answer_schema, LEGAL_ANSWER_SYSTEM_MESSAGE,
    VERIFICATION_SYSTEM_MESSAGE,
};

/// Verification runs near-deterministic; answer variance would weaken
/// agreement as a signal.
const EXPERT_TEMPERATURE: f32 = 0.1;

/// The expert's independently-derived choice for a multiple-choice item.
/// Consumed immediately by the validation pipeline; only its verdict is
/// persisted, as admission metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpertOpinion {
    pub answer: AnswerKey,
    pub confidence: Confidence,
    pub reasoning: String,
}

/// Free-form legal answer with citations, for the study-assistant Q&A path.
#[derive(Debug, Clone)]
pub struct LegalAnswer {
    pub answer: String,
    pub citations: Vec<String>,
    pub confidence: Confidence,
}

#[derive(Debug, Deserialize)]
struct RawOpinion {
    answer: String,
    confidence: String,
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RawLegalAnswer {
    answer: String,
    citations: Vec<String>,
    confidence: String,
}

/// Answers legal questions and independently solves multiple-choice items,
/// grounded in its own retrieval pass over the legal corpus.
pub struct LegalExpert {
    db: Arc<SurrealDbClient>,
    openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
    retriever: LegalRetriever,
}

impl LegalExpert {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
        retriever: LegalRetriever,
    ) -> Self {
        Self {
            db,
            openai_client,
            retriever,
        }
    }

    /// Free-form Q&A grounded in retrieved context.
    #[instrument(skip_all)]
    pub async fn answer(&self, query: &str, k: usize) -> Result<LegalAnswer, AppError> {
        let passages = self.retriever.retrieve(query, k, None).await?;
        let context_json = passages_to_context_json(&passages);
        let user_message = build_answer_user_message(&context_json, query);

        let settings = SystemSettings::get_current(&self.db).await?;
        let request = build_expert_request(
            &settings.verification_model,
            &settings.legal_answer_system_prompt,
            user_message,
            "legal_answer",
            get_legal_answer_schema(),
        )?;

        let content = self.request_completion(request).await?;
        parse_legal_answer(&content)
    }

    /// Independently solves a multiple-choice item from the stem and options
    /// alone. The candidate's claimed answer is not a parameter here, which
    /// is what makes downstream agreement a meaningful signal.
    #[instrument(skip_all)]
    pub async fn solve(
        &self,
        question_text: &str,
        options: &QuestionOptions,
        k: usize,
    ) -> Result<ExpertOpinion, AppError> {
        let retrieval_query = solve_retrieval_query(question_text, options);
        let passages = self.retriever.retrieve(&retrieval_query, k, None).await?;
        if passages.is_empty() {
            debug!("solving without retrieved context");
        }
        let context_json = passages_to_context_json(&passages);
        let user_message = build_solve_user_message(question_text, options, &context_json);

        let settings = SystemSettings::get_current(&self.db).await?;
        let request = build_expert_request(
            &settings.verification_model,
            &settings.verification_system_prompt,
            user_message,
            "expert_solution",
            get_expert_solve_schema(),
        )?;

        let content = self.request_completion(request).await?;
        parse_opinion(&content)
    }

    async fn request_completion(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<String, AppError> {
        let response = self
            .openai_client
            .chat()
            .create(request)
            .await
            .map_err(|e| AppError::Reasoning(format!("completion provider failed: {e}")))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(AppError::Reasoning(
                "No content found in expert response".into(),
            ))
    }
}

fn build_expert_request(
    model: &str,
    system_prompt: &str,
    user_message: String,
    schema_name: &str,
    schema: serde_json::Value,
) -> Result<CreateChatCompletionRequest, AppError> {
    let response_format = ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            description: Some("Independent legal expert output".into()),
            name: schema_name.into(),
            schema: Some(schema),
            strict: Some(true),
        },
    };

    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .temperature(EXPERT_TEMPERATURE)
        .messages([
            ChatCompletionRequestSystemMessage::from(system_prompt.to_owned()).into(),
            ChatCompletionRequestUserMessage::from(user_message).into(),
        ])
        .response_format(response_format)
        .build()?;

    Ok(request)
}

/// Query text for the expert's own retrieval pass: stem plus option texts,
/// so the context covers what the distractors touch as well.
pub fn solve_retrieval_query(question_text: &str, options: &QuestionOptions) -> String {
    let option_texts: Vec<&str> = options.iter().map(|(_, text)| text).collect();
    format!("{}\n{}", question_text, option_texts.join("\n"))
}

/// Builds the verification prompt. A pure function of (stem, options):
/// the claimed answer is structurally unrepresentable here.
pub fn build_solve_user_message(
    question_text: &str,
    options: &QuestionOptions,
    context_json: &serde_json::Value,
) -> String {
    let options_block = options
        .iter()
        .map(|(key, text)| format!("{key}. {text}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r"
        Legal excerpts:
        ==================
        {context_json}

        Question:
        ==================
        {question_text}

        Options:
        ==================
        {options_block}
        "
    )
}

pub fn build_answer_user_message(context_json: &serde_json::Value, query: &str) -> String {
    format!(
        r"
        Legal excerpts:
        ==================
        {context_json}

        Question:
        ==================
        {query}
        "
    )
}

fn parse_opinion(content: &str) -> Result<ExpertOpinion, AppError> {
    let raw = serde_json::from_str::<RawOpinion>(content)
        .map_err(|e| AppError::Reasoning(format!("Failed to parse expert solution: {e}")))?;

    let answer = AnswerKey::from_str(&raw.answer)
        .map_err(|_| AppError::Reasoning(format!("expert chose invalid answer '{}'", raw.answer)))?;
    let confidence = Confidence::from_str(&raw.confidence).map_err(|_| {
        AppError::Reasoning(format!(
            "expert reported invalid confidence '{}'",
            raw.confidence
        ))
    })?;

    Ok(ExpertOpinion {
        answer,
        confidence,
        reasoning: raw.reasoning,
    })
}

fn parse_legal_answer(content: &str) -> Result<LegalAnswer, AppError> {
    let raw = serde_json::from_str::<RawLegalAnswer>(content)
        .map_err(|e| AppError::Reasoning(format!("Failed to parse legal answer: {e}")))?;

    let confidence = Confidence::from_str(&raw.confidence).map_err(|_| {
        AppError::Reasoning(format!(
            "expert reported invalid confidence '{}'",
            raw.confidence
        ))
    })?;

    Ok(LegalAnswer {
        answer: raw.answer,
        citations: raw.citations,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> QuestionOptions {
        QuestionOptions::new(
            "Refuse the order".into(),
            "Execute immediately".into(),
            "Consult the client's lawyer".into(),
            "Delay until tomorrow".into(),
            "Split the order".into(),
        )
    }

    #[test]
    fn solve_prompt_is_pure_in_stem_and_options() {
        let context = serde_json::json!([]);
        let first = build_solve_user_message("What should the broker do?", &options(), &context);
        let second = build_solve_user_message("What should the broker do?", &options(), &context);
        assert_eq!(first, second);

        assert!(first.contains("What should the broker do?"));
        for (key, text) in options().iter() {
            assert!(first.contains(&format!("{key}. {text}")));
        }
        // Nothing about a claimed or intended answer can leak into the prompt.
        assert!(!first.to_lowercase().contains("claimed"));
        assert!(!first.to_lowercase().contains("intended answer"));
    }

    #[test]
    fn parse_opinion_accepts_well_formed_output() {
        let content = serde_json::json!({
            "answer": "B",
            "confidence": "high",
            "reasoning": "Option B violates the duty of care."
        })
        .to_string();

        let opinion = parse_opinion(&content).unwrap();
        assert_eq!(opinion.answer, AnswerKey::B);
        assert_eq!(opinion.confidence, Confidence::High);
    }

    #[test]
    fn parse_opinion_surfaces_reasoning_failures() {
        assert!(matches!(
            parse_opinion("not json"),
            Err(AppError::Reasoning(_))
        ));

        let bad_answer = serde_json::json!({
            "answer": "Z",
            "confidence": "high",
            "reasoning": "..."
        })
        .to_string();
        assert!(matches!(
            parse_opinion(&bad_answer),
            Err(AppError::Reasoning(_))
        ));

        let bad_confidence = serde_json::json!({
            "answer": "A",
            "confidence": "certain",
            "reasoning": "..."
        })
        .to_string();
        assert!(matches!(
            parse_opinion(&bad_confidence),
            Err(AppError::Reasoning(_))
        ));
    }

    #[test]
    fn parse_legal_answer_round_trip() {
        let content = serde_json::json!({
            "answer": "An insider may not trade until disclosure.",
            "citations": ["Securities Law, p. 12"],
            "confidence": "medium"
        })
        .to_string();

        let answer = parse_legal_answer(&content).unwrap();
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.confidence, Confidence::Medium);
    }
}
