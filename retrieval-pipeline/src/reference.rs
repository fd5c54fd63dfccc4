use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{question::Difficulty, reference_question::ReferenceQuestion},
    },
    utils::embedding::EmbeddingProvider,
};
use tracing::{debug, instrument};

use crate::{scoring::cosine_similarity, RetrievalTuning, RetrievedReference};

/// Read-only similarity search over previously validated exam questions.
///
/// Results are style exemplars for the generator, never a source of ground
/// truth; reference answers are not assumed correct.
pub struct ReferenceRetriever {
    db: Arc<SurrealDbClient>,
    embedding: Arc<EmbeddingProvider>,
    tuning: RetrievalTuning,
}

impl ReferenceRetriever {
    pub fn new(db: Arc<SurrealDbClient>, embedding: Arc<EmbeddingProvider>) -> Self {
        Self {
            db,
            embedding,
            tuning: RetrievalTuning::default(),
        }
    }

    pub fn with_tuning(
        db: Arc<SurrealDbClient>,
        embedding: Arc<EmbeddingProvider>,
        tuning: RetrievalTuning,
    ) -> Self {
        Self {
            db,
            embedding,
            tuning,
        }
    }

    /// Returns up to `k` reference questions stylistically close to the
    /// topic, best first, optionally restricted to one difficulty.
    #[instrument(skip_all, fields(topic, k))]
    pub async fn retrieve(
        &self,
        topic: &str,
        difficulty: Option<Difficulty>,
        k: usize,
    ) -> Result<Vec<RetrievedReference>, AppError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedding.embed(topic).await?;

        let mut statement = format!(
            "SELECT * FROM reference_question WHERE embedding <|{},{}|> $embedding",
            k, self.tuning.knn_ef
        );
        if difficulty.is_some() {
            statement.push_str(" AND difficulty = $difficulty");
        }

        let mut response = self
            .db
            .client
            .query(statement)
            .bind(("embedding", query_embedding.clone()))
            .bind(("difficulty", difficulty))
            .await?;
        let candidates: Vec<ReferenceQuestion> = response.take(0)?;

        let mut seen = std::collections::HashSet::new();
        let mut references: Vec<RetrievedReference> = candidates
            .into_iter()
            .filter_map(|question| {
                let score = cosine_similarity(&query_embedding, &question.embedding);
                if score < self.tuning.min_score || !seen.insert(question.id.clone()) {
                    return None;
                }
                Some(RetrievedReference { question, score })
            })
            .collect();

        references.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        references.truncate(k);

        debug!(returned = references.len(), "reference retrieval completed");
        Ok(references)
    }
}
