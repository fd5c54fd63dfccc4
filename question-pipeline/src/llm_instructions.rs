use common::storage::types::system_prompts::{
    DEFAULT_GENERATION_SYSTEM_PROMPT, DEFAULT_LEGAL_ANSWER_SYSTEM_PROMPT,
    DEFAULT_VERIFICATION_SYSTEM_PROMPT,
};
use serde_json::json;

pub static GENERATION_SYSTEM_MESSAGE: &str = DEFAULT_GENERATION_SYSTEM_PROMPT;
pub static VERIFICATION_SYSTEM_MESSAGE: &str = DEFAULT_VERIFICATION_SYSTEM_PROMPT;
pub static LEGAL_ANSWER_SYSTEM_MESSAGE: &str = DEFAULT_LEGAL_ANSWER_SYSTEM_PROMPT;

fn options_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "A": { "type": "string" },
            "B": { "type": "string" },
            "C": { "type": "string" },
            "D": { "type": "string" },
            "E": { "type": "string" }
        },
        "required": ["A", "B", "C", "D", "E"],
        "additionalProperties": false
    })
}

pub fn get_generation_batch_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "question_text": { "type": "string" },
                        "options": options_schema(),
                        "correct_answer": { "type": "string", "enum": ["A", "B", "C", "D", "E"] },
                        "explanation": { "type": "string" },
                        "sub_topic": { "type": ["string", "null"] },
                        "legal_reference": { "type": ["string", "null"] }
                    },
                    "required": [
                        "question_text",
                        "options",
                        "correct_answer",
                        "explanation",
                        "sub_topic",
                        "legal_reference"
                    ],
                    "additionalProperties": false
                }
            }
        },
        "required": ["questions"],
        "additionalProperties": false
    })
}

pub fn get_expert_solve_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "answer": { "type": "string", "enum": ["A", "B", "C", "D", "E"] },
            "confidence": { "type": "string", "enum": ["low", "medium", "high"] },
            "reasoning": { "type": "string" }
        },
        "required": ["answer", "confidence", "reasoning"],
        "additionalProperties": false
    })
}

pub fn get_legal_answer_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "answer": { "type": "string" },
            "citations": {
                "type": "array",
                "items": { "type": "string" }
            },
            "confidence": { "type": "string", "enum": ["low", "medium", "high"] }
        },
        "required": ["answer", "citations", "confidence"],
        "additionalProperties": false
    })
}
