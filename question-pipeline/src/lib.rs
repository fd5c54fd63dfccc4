#![allow(clippy::missing_docs_in_private_items)]

pub mod candidate;
pub mod expert;
pub mod generator;
pub mod llm_instructions;
pub mod pipeline;
pub mod policy;

use std::sync::Arc;

use common::storage::types::question::Difficulty;
use futures::{stream, StreamExt};

pub use candidate::{CandidateQuestion, ParseResult};
pub use expert::{ExpertOpinion, LegalAnswer, LegalExpert};
pub use generator::{GeneratorTuning, QuestionGenerator};
pub use pipeline::{
    AdmissionPipeline, CellReport, CellServices, DefaultCellServices, RejectReason,
    SingleVerification,
};
pub use policy::AdmissionPolicy;

/// One unit of work for the driver: fill a (topic, difficulty) cell up to
/// `target` admitted questions.
#[derive(Debug, Clone)]
pub struct CellTarget {
    pub topic: String,
    pub difficulty: Difficulty,
    pub target: usize,
}

/// Processes cells concurrently up to `concurrency` workers. Cells share no
/// mutable state beyond append-only inserts into the question bank, so no
/// cross-cell coordination is needed; each cell reports independently.
pub async fn run_cells(
    pipeline: Arc<AdmissionPipeline>,
    cells: Vec<CellTarget>,
    concurrency: usize,
) -> Vec<CellReport> {
    stream::iter(cells.into_iter().map(|cell| {
        let pipeline = Arc::clone(&pipeline);
        async move {
            pipeline
                .run_cell(&cell.topic, cell.difficulty, cell.target)
                .await
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await
}
