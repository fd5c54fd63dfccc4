use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use uuid::Uuid;

use super::question::{AnswerKey, Confidence, Difficulty, QuestionOptions};

/// Audit record of the expert opinion that admitted a question. Proves the
/// admission guarantee was honored at admission time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExpertValidationData {
    pub expert_answer: AnswerKey,
    pub confidence: Confidence,
    pub reasoning: String,
}

stored_object!(ExamQuestion, "exam_question", {
    question_text: String,
    options: QuestionOptions,
    correct_answer: AnswerKey,
    explanation: String,
    topic: String,
    #[serde(default)]
    sub_topic: Option<String>,
    difficulty: Difficulty,
    #[serde(default)]
    legal_reference: Option<String>,
    is_active: bool,
    expert_validated: bool,
    expert_validation_data: ExpertValidationData,
    #[serde(default)]
    quality_score: Option<f32>,
    times_shown: u32,
    times_correct: u32,
    times_wrong: u32
});

impl ExamQuestion {
    /// Builds an admitted question. This is the only constructor, and it
    /// refuses to produce a row whose stored answer disagrees with the
    /// expert opinion that admits it.
    #[allow(clippy::too_many_arguments)]
    pub fn admit(
        question_text: String,
        options: QuestionOptions,
        correct_answer: AnswerKey,
        explanation: String,
        topic: String,
        sub_topic: Option<String>,
        difficulty: Difficulty,
        legal_reference: Option<String>,
        validation: ExpertValidationData,
    ) -> Result<Self, AppError> {
        if validation.expert_answer != correct_answer {
            return Err(AppError::Validation(format!(
                "refusing to admit question: stored answer {} disagrees with expert answer {}",
                correct_answer, validation.expert_answer
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            question_text,
            options,
            correct_answer,
            explanation,
            topic,
            sub_topic,
            difficulty,
            legal_reference,
            is_active: true,
            expert_validated: true,
            expert_validation_data: validation,
            quality_score: None,
            times_shown: 0,
            times_correct: 0,
            times_wrong: 0,
        })
    }

    /// How many admitted questions already exist for a (topic, difficulty)
    /// cell. The driver uses this to size new generation runs.
    pub async fn count_for_cell(
        db: &SurrealDbClient,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<usize, AppError> {
        #[derive(serde::Deserialize)]
        struct CountRow {
            count: usize,
        }

        let row: Option<CountRow> = db
            .client
            .query(
                "SELECT count() FROM exam_question \
                 WHERE topic = $topic AND difficulty = $difficulty GROUP ALL",
            )
            .bind(("topic", topic.to_owned()))
            .bind(("difficulty", difficulty))
            .await?
            .take(0)?;

        Ok(row.map_or(0, |r| r.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> QuestionOptions {
        QuestionOptions::new(
            "Decline and report the approach".into(),
            "Accept the order quietly".into(),
            "Forward the tip to a relative".into(),
            "Trade through a foreign account".into(),
            "Ask the client for a larger fee".into(),
        )
    }

    fn validation(answer: AnswerKey) -> ExpertValidationData {
        ExpertValidationData {
            expert_answer: answer,
            confidence: Confidence::High,
            reasoning: "Only option A avoids acting on inside information.".into(),
        }
    }

    #[test]
    fn admit_requires_expert_agreement() {
        let admitted = ExamQuestion::admit(
            "A client passes a broker inside information. What must the broker do?".into(),
            options(),
            AnswerKey::A,
            "Brokers must refuse orders based on inside information.".into(),
            "insider information".into(),
            None,
            Difficulty::Easy,
            Some("Securities Law s.52".into()),
            validation(AnswerKey::A),
        )
        .expect("agreeing opinion should admit");

        assert!(admitted.is_active);
        assert!(admitted.expert_validated);
        assert_eq!(admitted.times_shown, 0);
        assert_eq!(admitted.expert_validation_data.expert_answer, AnswerKey::A);

        let disagreeing = ExamQuestion::admit(
            "Same stem".into(),
            options(),
            AnswerKey::A,
            "Explanation".into(),
            "insider information".into(),
            None,
            Difficulty::Easy,
            None,
            validation(AnswerKey::B),
        );
        assert!(disagreeing.is_err(), "disagreement must never persist");
    }

    #[tokio::test]
    async fn count_for_cell_filters_topic_and_difficulty() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        let in_cell = ExamQuestion::admit(
            "Stem one".into(),
            options(),
            AnswerKey::A,
            "Explanation".into(),
            "insider information".into(),
            None,
            Difficulty::Easy,
            None,
            validation(AnswerKey::A),
        )
        .unwrap();
        let other_difficulty = ExamQuestion::admit(
            "Stem two".into(),
            options(),
            AnswerKey::A,
            "Explanation".into(),
            "insider information".into(),
            None,
            Difficulty::Hard,
            None,
            validation(AnswerKey::A),
        )
        .unwrap();
        let other_topic = ExamQuestion::admit(
            "Stem three".into(),
            options(),
            AnswerKey::A,
            "Explanation".into(),
            "prospectus duties".into(),
            None,
            Difficulty::Easy,
            None,
            validation(AnswerKey::A),
        )
        .unwrap();

        for question in [in_cell, other_difficulty, other_topic] {
            db.store_item(question).await.expect("Failed to store");
        }

        let count = ExamQuestion::count_for_cell(&db, "insider information", Difficulty::Easy)
            .await
            .expect("count query");
        assert_eq!(count, 1);

        let empty = ExamQuestion::count_for_cell(&db, "fund fees", Difficulty::Easy)
            .await
            .expect("count query");
        assert_eq!(empty, 0);
    }
}
