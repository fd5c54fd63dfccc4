use crate::stored_object;
use uuid::Uuid;

stored_object!(LegalChunk, "legal_chunk", {
    document_name: String,
    page_number: u32,
    chunk_index: u32,
    content: String,
    embedding: Vec<f32>,
    #[serde(default)]
    metadata: Option<serde_json::Value>
});

impl LegalChunk {
    pub fn new(
        document_name: String,
        page_number: u32,
        chunk_index: u32,
        content: String,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            document_name,
            page_number,
            chunk_index,
            content,
            embedding,
            metadata: None,
        }
    }

    /// Human-readable source label used when citing this passage.
    pub fn citation(&self) -> String {
        format!("{}, p. {}", self.document_name, self.page_number)
    }
}
