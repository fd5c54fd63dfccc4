use std::time::Duration;

use common::storage::types::question::Confidence;

/// Explicit orchestration policy for a (topic, difficulty) cell: how much
/// surplus to generate, how often to regenerate, and what the expert must
/// clear for admission.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    /// Generation batches are sized at `needed * surplus_multiplier` because
    /// a meaningful fraction of candidates fails expert verification.
    pub surplus_multiplier: f32,
    /// Additional generation rounds after the first when a cell falls short.
    /// Bounded: a stubborn cell reports a shortfall instead of looping.
    pub max_regeneration_rounds: u32,
    /// Minimum expert confidence for admission. The bar never moves to fill
    /// a shortfall.
    pub min_confidence: Confidence,
    /// Verification calls in flight at once within a cell.
    pub verify_concurrency: usize,
    /// Deadline per verification call; a timeout rejects that candidate only.
    pub verify_timeout: Duration,
    /// Wall-clock bound for a whole cell; exceeding it reports partial
    /// results.
    pub cell_timeout: Duration,
    /// Total attempts for one generation batch before the cell aborts.
    pub generation_attempts: usize,
    /// Initial backoff between generation attempts.
    pub generation_backoff: Duration,
    /// Context chunks retrieved for each independent verification.
    pub solve_context_chunks: usize,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            surplus_multiplier: 2.0,
            max_regeneration_rounds: 1,
            min_confidence: Confidence::High,
            verify_concurrency: 4,
            verify_timeout: Duration::from_secs(45),
            cell_timeout: Duration::from_secs(600),
            generation_attempts: 3,
            generation_backoff: Duration::from_millis(100),
            solve_context_chunks: 8,
        }
    }
}

impl AdmissionPolicy {
    /// How many candidates to request to end up with `needed` admissions.
    pub fn batch_size(&self, needed: usize) -> usize {
        let multiplier = self.surplus_multiplier.max(1.0);
        (((needed as f32) * multiplier).ceil() as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_applies_surplus_and_rounds_up() {
        let policy = AdmissionPolicy::default();
        assert_eq!(policy.batch_size(5), 10);
        assert_eq!(policy.batch_size(3), 6);

        let fractional = AdmissionPolicy {
            surplus_multiplier: 1.5,
            ..AdmissionPolicy::default()
        };
        assert_eq!(fractional.batch_size(3), 5);
    }

    #[test]
    fn batch_size_never_drops_below_one_or_needed() {
        let shrinking = AdmissionPolicy {
            surplus_multiplier: 0.1,
            ..AdmissionPolicy::default()
        };
        assert_eq!(shrinking.batch_size(4), 4, "multiplier floors at 1.0");
        assert_eq!(shrinking.batch_size(0), 1);
    }
}
