use crate::stored_object;
use uuid::Uuid;

use super::question::{AnswerKey, Difficulty, QuestionOptions};

// Style exemplars shown to the generator. Not ground truth: reference items
// come from scanned exam banks and are not guaranteed error-free, so the
// pipeline never copies answers from them.
stored_object!(ReferenceQuestion, "reference_question", {
    question_text: String,
    options: QuestionOptions,
    correct_answer: AnswerKey,
    explanation: String,
    topic: String,
    difficulty: Difficulty,
    embedding: Vec<f32>
});

impl ReferenceQuestion {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        question_text: String,
        options: QuestionOptions,
        correct_answer: AnswerKey,
        explanation: String,
        topic: String,
        difficulty: Difficulty,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            question_text,
            options,
            correct_answer,
            explanation,
            topic,
            difficulty,
            embedding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::SurrealDbClient;

    fn options() -> QuestionOptions {
        QuestionOptions::new(
            "Yes, always".into(),
            "Only with board approval".into(),
            "Only after public disclosure".into(),
            "Never".into(),
            "Only for small amounts".into(),
        )
    }

    #[tokio::test]
    async fn test_reference_question_persists_with_letter_keys() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        let question = ReferenceQuestion::new(
            "May an analyst trade a security covered by a pending report?".into(),
            options(),
            AnswerKey::C,
            "Trading ahead of a known report breaches the duty of fairness.".into(),
            "conflicts of interest".into(),
            Difficulty::Medium,
            vec![0.2; 4],
        );

        db.store_item(question.clone())
            .await
            .expect("Failed to store");

        let fetched = db
            .get_item::<ReferenceQuestion>(&question.id)
            .await
            .expect("Failed to fetch")
            .expect("question present");
        assert_eq!(fetched.correct_answer, AnswerKey::C);
        assert_eq!(fetched.options.get(AnswerKey::B), "Only with board approval");
        assert_eq!(fetched.difficulty, Difficulty::Medium);
    }
}
