use serde::{Deserialize, Serialize};

use crate::{error::AppError, storage::db::SurrealDbClient};

use super::exam_question::deserialize_flexible_id;
use super::system_prompts::{
    DEFAULT_GENERATION_SYSTEM_PROMPT, DEFAULT_LEGAL_ANSWER_SYSTEM_PROMPT,
    DEFAULT_VERIFICATION_SYSTEM_PROMPT,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemSettings {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    /// Model used to synthesize candidate questions (higher capability).
    pub generation_model: String,
    /// Model used for independent verification and legal Q&A.
    pub verification_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: u32,
    pub generation_system_prompt: String,
    pub verification_system_prompt: String,
    pub legal_answer_system_prompt: String,
}

impl SystemSettings {
    pub async fn ensure_initialized(db: &SurrealDbClient) -> Result<Self, AppError> {
        let settings: Option<Self> = db.select(("system_settings", "current")).await?;

        if settings.is_none() {
            let created: Option<SystemSettings> = db
                .create(("system_settings", "current"))
                .content(Self::defaults())
                .await?;

            return created.ok_or(AppError::Validation("Failed to initialize settings".into()));
        };

        settings.ok_or(AppError::Validation("Failed to initialize settings".into()))
    }

    pub async fn get_current(db: &SurrealDbClient) -> Result<Self, AppError> {
        let settings: Option<Self> = db
            .client
            .query("SELECT * FROM type::thing('system_settings', 'current')")
            .await?
            .take(0)?;

        settings.ok_or(AppError::NotFound("System settings not found".into()))
    }

    pub async fn update(db: &SurrealDbClient, changes: Self) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query("UPDATE type::thing('system_settings', 'current') MERGE $changes RETURN AFTER")
            .bind(("changes", changes))
            .await?
            .take(0)?;

        updated.ok_or(AppError::Validation(
            "Something went wrong updating the settings".into(),
        ))
    }

    fn defaults() -> Self {
        Self {
            id: "current".to_string(),
            generation_model: "gpt-4o".to_string(),
            verification_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            generation_system_prompt: DEFAULT_GENERATION_SYSTEM_PROMPT.to_string(),
            verification_system_prompt: DEFAULT_VERIFICATION_SYSTEM_PROMPT.to_string(),
            legal_answer_system_prompt: DEFAULT_LEGAL_ANSWER_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_ensure_initialized_creates_defaults_once() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        let first = SystemSettings::ensure_initialized(&db)
            .await
            .expect("initialize settings");
        assert_eq!(first.embedding_dimensions, 1536);

        let mut changed = first.clone();
        changed.verification_model = "gpt-4o".to_string();
        SystemSettings::update(&db, changed).await.expect("update");

        let second = SystemSettings::ensure_initialized(&db)
            .await
            .expect("settings already initialized");
        assert_eq!(second.verification_model, "gpt-4o");

        let current = SystemSettings::get_current(&db).await.expect("get current");
        assert_eq!(current.verification_model, "gpt-4o");
    }
}
