use std::sync::Arc;

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::legal_chunk::LegalChunk},
    utils::embedding::EmbeddingProvider,
};
use tracing::{debug, instrument};

use crate::{scoring::cosine_similarity, RetrievalTuning, RetrievedPassage};

/// Restricts a retrieval to a subset of source documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub documents: Vec<String>,
}

/// Read-only similarity search over the legal corpus.
pub struct LegalRetriever {
    db: Arc<SurrealDbClient>,
    embedding: Arc<EmbeddingProvider>,
    tuning: RetrievalTuning,
}

impl LegalRetriever {
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

    /// Returns up to `k` passages most similar to `query`, best first.
    ///
    /// An empty result is a valid outcome, not an error; callers proceed
    /// with reduced or no context.
    #[instrument(skip_all, fields(k))]
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&DocumentFilter>,
    ) -> Result<Vec<RetrievedPassage>, AppError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedding.embed(query).await?;

        let mut statement = format!(
            "SELECT * FROM legal_chunk WHERE embedding <|{},{}|> $embedding",
            k, self.tuning.knn_ef
        );
        let documents = filter
            .map(|f| f.documents.clone())
            .filter(|docs| !docs.is_empty());
        if documents.is_some() {
            statement.push_str(" AND document_name IN $documents");
        }

        let mut response = self
            .db
            .client
            .query(statement)
            .bind(("embedding", query_embedding.clone()))
            .bind(("documents", documents.unwrap_or_default()))
            .await?;
        let candidates: Vec<LegalChunk> = response.take(0)?;

        let passages = rank_passages(candidates, &query_embedding, k, self.tuning.min_score);
        debug!(returned = passages.len(), "legal retrieval completed");

        Ok(passages)
    }
}

/// Scores candidates against the query embedding, applies the similarity
/// floor, drops duplicate ids and keeps the best `k`.
fn rank_passages(
    candidates: Vec<LegalChunk>,
    query_embedding: &[f32],
    k: usize,
    min_score: f32,
) -> Vec<RetrievedPassage> {
    let mut seen = std::collections::HashSet::new();
    let mut passages: Vec<RetrievedPassage> = candidates
        .into_iter()
        .filter_map(|chunk| {
            let score = cosine_similarity(query_embedding, &chunk.embedding);
            if score < min_score || !seen.insert(chunk.id.clone()) {
                return None;
            }
            Some(RetrievedPassage { chunk, score })
        })
        .collect();

    passages.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    passages.truncate(k);
    passages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(id: &str, embedding: Vec<f32>) -> LegalChunk {
        let mut chunk = LegalChunk::new(
            "Securities Law".into(),
            1,
            0,
            format!("passage {id}"),
            embedding,
        );
        chunk.id = id.to_string();
        chunk
    }

    #[test]
    fn rank_passages_orders_floors_and_dedupes() {
        let query = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            chunk_with("far", vec![0.0, 1.0, 0.0]),
            chunk_with("near", vec![0.9, 0.1, 0.0]),
            chunk_with("near", vec![0.9, 0.1, 0.0]),
            chunk_with("close", vec![0.8, 0.6, 0.0]),
        ];

        let ranked = rank_passages(candidates, &query, 10, 0.3);

        let ids: Vec<&str> = ranked.iter().map(|p| p.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "close"], "floored, deduped, best first");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn rank_passages_caps_at_k() {
        let query = vec![1.0, 0.0];
        let candidates = (0..5)
            .map(|i| chunk_with(&format!("c{i}"), vec![1.0, i as f32 * 0.01]))
            .collect();

        let ranked = rank_passages(candidates, &query, 2, 0.0);
        assert_eq!(ranked.len(), 2);
    }
}
