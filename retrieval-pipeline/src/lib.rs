#![allow(clippy::missing_docs_in_private_items)]

pub mod legal;
pub mod reference;
pub mod scoring;

use common::storage::types::{legal_chunk::LegalChunk, reference_question::ReferenceQuestion};
use serde_json::Value;

pub use legal::{DocumentFilter, LegalRetriever};
pub use reference::ReferenceRetriever;

/// A legal passage plus its similarity to the query, for downstream prompts.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub chunk: LegalChunk,
    pub score: f32,
}

/// A reference exam question plus its similarity to the requested topic.
#[derive(Debug, Clone)]
pub struct RetrievedReference {
    pub question: ReferenceQuestion,
    pub score: f32,
}

/// Tunable parameters shared by both retrievers.
#[derive(Debug, Clone)]
pub struct RetrievalTuning {
    /// HNSW search effort for the KNN operator.
    pub knn_ef: usize,
    /// Similarity floor; neighbors scoring below it are dropped rather than
    /// padded into the result.
    pub min_score: f32,
}

impl Default for RetrievalTuning {
    fn default() -> Self {
        Self {
            knn_ef: 40,
            min_score: 0.25,
        }
    }
}

/// Convert retrieved passages to JSON for LLM context.
pub fn passages_to_context_json(passages: &[RetrievedPassage]) -> Value {
    fn round_score(value: f32) -> f64 {
        (f64::from(value) * 1000.0).round() / 1000.0
    }

    serde_json::json!(passages
        .iter()
        .map(|passage| {
            serde_json::json!({
                "source": passage.chunk.citation(),
                "content": passage.chunk.content,
                "score": round_score(passage.score),
            })
        })
        .collect::<Vec<_>>())
}

/// Convert reference questions to style-exemplar JSON for the generation
/// prompt. Answers are deliberately omitted; exemplars inform style, not
/// ground truth.
pub fn references_to_exemplar_json(references: &[RetrievedReference]) -> Value {
    serde_json::json!(references
        .iter()
        .map(|reference| {
            serde_json::json!({
                "question_text": reference.question.question_text,
                "options": reference.question.options,
                "difficulty": reference.question.difficulty,
            })
        })
        .collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::{
        db::SurrealDbClient,
        types::{
            question::{AnswerKey, Difficulty, QuestionOptions},
            reference_question::ReferenceQuestion,
        },
    };
    use common::utils::embedding::EmbeddingProvider;
    use std::sync::Arc;
    use uuid::Uuid;

    const TEST_DIMENSION: usize = 8;

    async fn setup() -> (Arc<SurrealDbClient>, Arc<EmbeddingProvider>) {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        db.define_vector_indexes(TEST_DIMENSION)
            .await
            .expect("Failed to define vector indexes");

        let provider = Arc::new(EmbeddingProvider::new_hashed(TEST_DIMENSION));
        (Arc::new(db), provider)
    }

    async fn insert_chunk(
        db: &SurrealDbClient,
        provider: &EmbeddingProvider,
        document: &str,
        page: u32,
        content: &str,
    ) -> LegalChunk {
        let embedding = provider.embed(content).await.expect("embedding");
        let chunk = LegalChunk::new(document.to_string(), page, 0, content.to_string(), embedding);
        db.store_item(chunk.clone()).await.expect("store chunk");
        chunk
    }

    fn options() -> QuestionOptions {
        QuestionOptions::new(
            "First".into(),
            "Second".into(),
            "Third".into(),
            "Fourth".into(),
            "Fifth".into(),
        )
    }

    fn permissive_tuning() -> RetrievalTuning {
        RetrievalTuning {
            min_score: 0.0,
            ..RetrievalTuning::default()
        }
    }

    #[tokio::test]
    async fn legal_retrieval_returns_most_similar_first() {
        let (db, provider) = setup().await;

        let relevant = insert_chunk(
            &db,
            &provider,
            "Securities Law",
            12,
            "insider information trading prohibition material facts",
        )
        .await;
        insert_chunk(
            &db,
            &provider,
            "Fund Regulations",
            3,
            "mutual fund management fee disclosure schedule",
        )
        .await;

        let retriever =
            LegalRetriever::with_tuning(Arc::clone(&db), Arc::clone(&provider), permissive_tuning());
        let passages = retriever
            .retrieve("insider information trading", 2, None)
            .await
            .expect("retrieve");

        assert!(!passages.is_empty());
        assert_eq!(passages[0].chunk.id, relevant.id);
        let mut ids: Vec<&str> = passages.iter().map(|p| p.chunk.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), passages.len(), "no duplicate chunk ids");
    }

    #[tokio::test]
    async fn legal_retrieval_respects_document_filter() {
        let (db, provider) = setup().await;

        insert_chunk(
            &db,
            &provider,
            "Securities Law",
            1,
            "insider information definitions",
        )
        .await;
        let ethics = insert_chunk(
            &db,
            &provider,
            "Ethics Code",
            5,
            "insider information duties of portfolio managers",
        )
        .await;

        let retriever =
            LegalRetriever::with_tuning(Arc::clone(&db), Arc::clone(&provider), permissive_tuning());
        let filter = DocumentFilter {
            documents: vec!["Ethics Code".to_string()],
        };
        let passages = retriever
            .retrieve("insider information", 5, Some(&filter))
            .await
            .expect("retrieve");

        assert!(!passages.is_empty());
        assert!(passages.iter().all(|p| p.chunk.id == ethics.id));
    }

    #[tokio::test]
    async fn legal_retrieval_empty_corpus_is_ok_not_error() {
        let (db, provider) = setup().await;

        let retriever = LegalRetriever::new(Arc::clone(&db), Arc::clone(&provider));
        let passages = retriever
            .retrieve("a topic with no matching chunks", 5, None)
            .await
            .expect("empty retrieval must not error");

        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn reference_retrieval_filters_by_difficulty() {
        let (db, provider) = setup().await;

        let topic = "insider information";
        for (difficulty, stem) in [
            (Difficulty::Easy, "What counts as insider information?"),
            (Difficulty::Hard, "An officer hears of a pending merger..."),
        ] {
            let embedding = provider.embed(topic).await.expect("embedding");
            let question = ReferenceQuestion::new(
                stem.to_string(),
                options(),
                AnswerKey::A,
                "Because the statute says so.".into(),
                topic.to_string(),
                difficulty,
                embedding,
            );
            db.store_item(question).await.expect("store reference");
        }

        let retriever = ReferenceRetriever::with_tuning(
            Arc::clone(&db),
            Arc::clone(&provider),
            permissive_tuning(),
        );
        let easy_only = retriever
            .retrieve(topic, Some(Difficulty::Easy), 5)
            .await
            .expect("retrieve");

        assert_eq!(easy_only.len(), 1);
        assert_eq!(easy_only[0].question.difficulty, Difficulty::Easy);

        let both = retriever.retrieve(topic, None, 5).await.expect("retrieve");
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn exemplar_json_omits_reference_answers() {
        let reference = RetrievedReference {
            question: ReferenceQuestion::new(
                "Sample stem".into(),
                options(),
                AnswerKey::D,
                "Sample explanation".into(),
                "topic".into(),
                Difficulty::Easy,
                vec![0.0; TEST_DIMENSION],
            ),
            score: 0.9,
        };

        let json = references_to_exemplar_json(&[reference]);
        let serialized = json.to_string();
        assert!(serialized.contains("Sample stem"));
        assert!(!serialized.contains("correct_answer"));
        assert!(!serialized.contains("Sample explanation"));
    }
}
