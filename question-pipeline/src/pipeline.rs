use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            exam_question::{ExamQuestion, ExpertValidationData},
            question::{AnswerKey, Confidence, Difficulty, QuestionOptions},
        },
    },
};
use futures::{stream, StreamExt};
use serde::Serialize;
use tokio::time::timeout;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{debug, info, info_span, warn};

use crate::{
    candidate::{validate_structure, CandidateQuestion},
    expert::{ExpertOpinion, LegalExpert},
    generator::QuestionGenerator,
    policy::AdmissionPolicy,
};

/// Seam between orchestration and the model-facing components, so cell
/// behavior is testable without a provider.
#[async_trait]
pub trait CellServices: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<CandidateQuestion>, AppError>;

    async fn solve(
        &self,
        question_text: &str,
        options: &QuestionOptions,
    ) -> Result<ExpertOpinion, AppError>;
}

pub struct DefaultCellServices {
    generator: QuestionGenerator,
    expert: LegalExpert,
    solve_context_chunks: usize,
}

impl DefaultCellServices {
    pub fn new(generator: QuestionGenerator, expert: LegalExpert, solve_context_chunks: usize) -> Self {
        Self {
            generator,
            expert,
            solve_context_chunks,
        }
    }
}

#[async_trait]
impl CellServices for DefaultCellServices {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<CandidateQuestion>, AppError> {
        self.generator.generate(topic, difficulty, count).await
    }

    async fn solve(
        &self,
        question_text: &str,
        options: &QuestionOptions,
    ) -> Result<ExpertOpinion, AppError> {
        self.expert
            .solve(question_text, options, self.solve_context_chunks)
            .await
    }
}

/// Why a candidate terminated at REJECTED.
#[derive(Debug, Clone)]
pub enum RejectReason {
    MalformedStructure(String),
    ExpertDisagreed { claimed: AnswerKey, expert: AnswerKey },
    LowConfidence { confidence: Confidence },
    VerificationFailed(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MalformedStructure(reason) => write!(f, "malformed structure: {reason}"),
            RejectReason::ExpertDisagreed { claimed, expert } => {
                write!(f, "expert chose {expert}, candidate claimed {claimed}")
            }
            RejectReason::LowConfidence { confidence } => {
                write!(f, "expert confidence '{confidence}' below admission gate")
            }
            RejectReason::VerificationFailed(reason) => {
                write!(f, "verification failed: {reason}")
            }
        }
    }
}

/// Terminal verdict for one candidate. Verdicts are final; a rejected
/// candidate is never re-asked, only a fresh batch can replace it.
#[derive(Debug)]
enum Verdict {
    Admit(ExpertOpinion),
    Reject(RejectReason),
}

/// Standalone verification result for an externally-sourced question.
#[derive(Debug, Clone)]
pub struct SingleVerification {
    pub agrees: bool,
    pub expert_answer: AnswerKey,
    pub confidence: Confidence,
    pub reasoning: String,
}

/// Operator-facing accounting for one (topic, difficulty) cell.
#[derive(Debug, Serialize)]
pub struct CellReport {
    pub topic: String,
    pub difficulty: Difficulty,
    pub target: usize,
    pub generated: usize,
    pub admitted: Vec<ExamQuestion>,
    pub rejected: usize,
    pub rounds: u32,
    pub shortfall: bool,
    /// Populated when the cell aborted early (generation outage, storage
    /// failure or cell deadline); whatever was admitted before stands.
    pub failure: Option<String>,
}

/// Orchestrates generation, structural gating, independent expert
/// verification and admission for (topic, difficulty) cells.
pub struct AdmissionPipeline {
    db: Arc<SurrealDbClient>,
    services: Arc<dyn CellServices>,
    policy: AdmissionPolicy,
}

impl AdmissionPipeline {
    pub fn new(db: Arc<SurrealDbClient>, services: Arc<dyn CellServices>, policy: AdmissionPolicy) -> Self {
        Self {
            db,
            services,
            policy,
        }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Runs one cell to completion: surplus-sized generation, validation of
    /// every candidate to a terminal state, bounded regeneration on
    /// shortfall. Never returns an error; failures land in the report.
    pub async fn run_cell(&self, topic: &str, difficulty: Difficulty, target: usize) -> CellReport {
        let span = info_span!("admission_cell", topic, %difficulty, target);
        let _enter = span.enter();
        let started = Instant::now();

        let mut report = CellReport {
            topic: topic.to_string(),
            difficulty,
            target,
            generated: 0,
            admitted: Vec::new(),
            rejected: 0,
            rounds: 0,
            shortfall: false,
            failure: None,
        };

        for round in 0..=self.policy.max_regeneration_rounds {
            if report.admitted.len() >= target {
                break;
            }
            if started.elapsed() >= self.policy.cell_timeout {
                report.failure = Some("cell deadline exceeded".to_string());
                warn!(round, "cell deadline exceeded; reporting partial results");
                break;
            }

            let needed = target.saturating_sub(report.admitted.len());
            let batch_size = self.policy.batch_size(needed);
            info!(round, needed, batch_size, "requesting generation batch");

            let candidates = match self.generate_with_retry(topic, difficulty, batch_size).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    // Systemic generation failure is batch-fatal: abort the
                    // cell with partial results rather than spinning.
                    warn!(error = %err, "generation failed after retries; aborting cell");
                    report.failure = Some(format!("generation failed: {err}"));
                    break;
                }
            };

            report.rounds += 1;
            report.generated += candidates.len();

            if let Err(err) = self.validate_batch(candidates, &mut report).await {
                report.failure = Some(format!("persisting admitted question failed: {err}"));
                break;
            }
        }

        report.shortfall = report.admitted.len() < target;
        info!(
            generated = report.generated,
            admitted = report.admitted.len(),
            rejected = report.rejected,
            rounds = report.rounds,
            shortfall = report.shortfall,
            "cell completed"
        );

        report
    }

    /// Validates an externally-sourced question without generation. The
    /// expert never sees the claimed answer; agreement is computed only
    /// after its opinion is formed.
    pub async fn verify_single(
        &self,
        question_text: &str,
        options: &QuestionOptions,
        claimed_answer: AnswerKey,
    ) -> Result<SingleVerification, AppError> {
        let opinion = self.services.solve(question_text, options).await?;

        Ok(SingleVerification {
            agrees: opinion.answer == claimed_answer,
            expert_answer: opinion.answer,
            confidence: opinion.confidence,
            reasoning: opinion.reasoning,
        })
    }

    async fn generate_with_retry(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<CandidateQuestion>, AppError> {
        let retry_strategy =
            ExponentialBackoff::from_millis(self.policy.generation_backoff.as_millis() as u64)
                .map(jitter)
                .take(self.policy.generation_attempts.saturating_sub(1));

        Retry::spawn(retry_strategy, || {
            self.services.generate(topic, difficulty, count)
        })
        .await
    }

    /// Runs every candidate of one batch to a terminal state. Returns an
    /// error only for storage failures; candidate-level problems are
    /// absorbed into the report.
    async fn validate_batch(
        &self,
        candidates: Vec<CandidateQuestion>,
        report: &mut CellReport,
    ) -> Result<(), AppError> {
        // Cheap filter first: no expert call for malformed candidates.
        let mut verifiable = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match validate_structure(&candidate) {
                Ok(()) => verifiable.push(candidate),
                Err(reason) => {
                    let reason = RejectReason::MalformedStructure(reason);
                    debug!(%reason, "candidate rejected before verification");
                    report.rejected += 1;
                }
            }
        }

        // Candidates are independent; verify with bounded concurrency and
        // re-associate results by index. Completion order is irrelevant.
        let mut verdicts: Vec<(usize, Verdict)> = stream::iter(verifiable.iter().enumerate())
            .map(|(index, candidate)| async move { (index, self.verify_candidate(candidate).await) })
            .buffer_unordered(self.policy.verify_concurrency.max(1))
            .collect()
            .await;
        verdicts.sort_by_key(|(index, _)| *index);

        for (index, verdict) in verdicts {
            let Some(candidate) = verifiable.get(index) else {
                continue;
            };
            match verdict {
                Verdict::Admit(opinion) => {
                    let admitted = ExamQuestion::admit(
                        candidate.question_text.clone(),
                        candidate.options.clone(),
                        candidate.correct_answer,
                        candidate.explanation.clone(),
                        candidate.topic.clone(),
                        candidate.sub_topic.clone(),
                        candidate.difficulty,
                        candidate.legal_reference.clone(),
                        ExpertValidationData {
                            expert_answer: opinion.answer,
                            confidence: opinion.confidence,
                            reasoning: opinion.reasoning,
                        },
                    )?;
                    self.db.store_item(admitted.clone()).await?;
                    report.admitted.push(admitted);
                }
                Verdict::Reject(reason) => {
                    debug!(%reason, "candidate rejected");
                    report.rejected += 1;
                }
            }
        }

        Ok(())
    }

    /// One candidate, one expert call, one terminal verdict. A reasoning
    /// failure or timeout rejects this candidate and nothing else.
    async fn verify_candidate(&self, candidate: &CandidateQuestion) -> Verdict {
        let solved = timeout(
            self.policy.verify_timeout,
            self.services
                .solve(&candidate.question_text, &candidate.options),
        )
        .await;

        let opinion = match solved {
            Err(_) => {
                return Verdict::Reject(RejectReason::VerificationFailed(
                    "verification call timed out".into(),
                ))
            }
            Ok(Err(err)) => {
                return Verdict::Reject(RejectReason::VerificationFailed(err.to_string()))
            }
            Ok(Ok(opinion)) => opinion,
        };

        if opinion.answer != candidate.correct_answer {
            return Verdict::Reject(RejectReason::ExpertDisagreed {
                claimed: candidate.correct_answer,
                expert: opinion.answer,
            });
        }

        if opinion.confidence < self.policy.min_confidence {
            return Verdict::Reject(RejectReason::LowConfidence {
                confidence: opinion.confidence,
            });
        }

        Verdict::Admit(opinion)
    }
}
