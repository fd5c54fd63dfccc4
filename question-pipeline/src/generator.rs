use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ReasoningEffort, ResponseFormat,
    ResponseFormatJsonSchema,
};
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{question::Difficulty, system_settings::SystemSettings},
    },
};
use retrieval_pipeline::{
    passages_to_context_json, references_to_exemplar_json, LegalRetriever, ReferenceRetriever,
};
use tracing::{info, instrument, warn};

use crate::{
    candidate::{parse_generation_payload, CandidateQuestion, ParseResult},
    llm_instructions::{get_generation_batch_schema, GENERATION_SYSTEM_MESSAGE},
};

#[derive(Debug, Clone)]
pub struct GeneratorTuning {
    /// Chunks of legal context fed to generation. Deliberately larger than
    /// typical RAG answering: the generator needs broad coverage of the
    /// topic, not narrow precision.
    pub context_chunks: usize,
    /// Reference questions used as style exemplars.
    pub exemplar_count: usize,
    /// Fraction of questions that should be scenario-style rather than
    /// definition-style.
    pub scenario_ratio: f32,
    /// Generation benefits from lexical variety; verification does not.
    pub temperature: f32,
}

impl Default for GeneratorTuning {
    fn default() -> Self {
        Self {
            context_chunks: 24,
            exemplar_count: 6,
            scenario_ratio: 0.5,
            temperature: 0.9,
        }
    }
}

/// Produces batches of structurally well-formed candidate questions grounded
/// in retrieved legal context and styled after reference questions.
pub struct QuestionGenerator {
    db: Arc<SurrealDbClient>,
    openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
    legal: LegalRetriever,
    reference: ReferenceRetriever,
    tuning: GeneratorTuning,
}

impl QuestionGenerator {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
        legal: LegalRetriever,
        reference: ReferenceRetriever,
        tuning: GeneratorTuning,
    ) -> Self {
        Self {
            db,
            openai_client,
            legal,
            reference,
            tuning,
        }
    }

    /// Best-effort batch generation: aims for `count` structurally valid
    /// candidates, silently discarding malformed items. Surplus sizing to
    /// compensate for downstream rejection belongs to the admission policy,
    /// not here.
    #[instrument(skip_all, fields(topic, count))]
    pub async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<CandidateQuestion>, AppError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let passages = self
            .legal
            .retrieve(topic, self.tuning.context_chunks, None)
            .await?;
        if passages.is_empty() {
            // Valid outcome: generate from general principles with no context.
            info!(topic, "no legal context cleared the similarity floor");
        }

        let exemplars = self
            .reference
            .retrieve(topic, Some(difficulty), self.tuning.exemplar_count)
            .await?;

        let user_message = build_generation_user_message(
            topic,
            difficulty,
            count,
            self.tuning.scenario_ratio,
            &passages_to_context_json(&passages),
            &references_to_exemplar_json(&exemplars),
        );

        let settings = SystemSettings::get_current(&self.db).await?;
        let request = self.prepare_request(&settings, user_message)?;

        let response = self.openai_client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(AppError::LLMParsing(
                "No content found in generation response".into(),
            ))?;

        let mut candidates = Vec::with_capacity(count);
        for result in parse_generation_payload(&content, topic, difficulty)? {
            match result {
                ParseResult::Valid(candidate) => candidates.push(candidate),
                ParseResult::Invalid { reason } => {
                    warn!(%reason, "discarding structurally invalid generated item");
                }
            }
        }

        info!(
            requested = count,
            produced = candidates.len(),
            "generation batch completed"
        );
        Ok(candidates)
    }

    fn prepare_request(
        &self,
        settings: &SystemSettings,
        user_message: String,
    ) -> Result<CreateChatCompletionRequest, AppError> {
        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: Some("A batch of generated exam questions".into()),
                name: "question_batch".into(),
                schema: Some(get_generation_batch_schema()),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(&settings.generation_model)
            .temperature(self.tuning.temperature)
            .reasoning_effort(ReasoningEffort::High)
            .messages([
                ChatCompletionRequestSystemMessage::from(GENERATION_SYSTEM_MESSAGE).into(),
                ChatCompletionRequestUserMessage::from(user_message).into(),
            ])
            .response_format(response_format)
            .build()?;

        Ok(request)
    }
}

pub fn build_generation_user_message(
    topic: &str,
    difficulty: Difficulty,
    count: usize,
    scenario_ratio: f32,
    context_json: &serde_json::Value,
    exemplars_json: &serde_json::Value,
) -> String {
    let scenario_count = scenario_target(count, scenario_ratio);

    format!(
        r"
        Topic:
        ==================
        {topic}

        Difficulty:
        ==================
        {difficulty}

        Number of questions to write: {count}
        Of these, write {scenario_count} scenario-style questions and the rest definition-style.

        Legal excerpts:
        ==================
        {context_json}

        Reference questions (style exemplars only):
        ==================
        {exemplars_json}
        "
    )
}

fn scenario_target(count: usize, ratio: f32) -> usize {
    let clamped = ratio.clamp(0.0, 1.0);
    ((count as f32) * clamped).round() as usize
}
