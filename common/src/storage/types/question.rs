use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Canonical option label for a five-choice exam item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerKey {
    A,
    B,
    C,
    D,
    E,
}

impl AnswerKey {
    pub const ALL: [AnswerKey; 5] = [
        AnswerKey::A,
        AnswerKey::B,
        AnswerKey::C,
        AnswerKey::D,
        AnswerKey::E,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerKey::A => "A",
            AnswerKey::B => "B",
            AnswerKey::C => "C",
            AnswerKey::D => "D",
            AnswerKey::E => "E",
        }
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnswerKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(AnswerKey::A),
            "B" => Ok(AnswerKey::B),
            "C" => Ok(AnswerKey::C),
            "D" => Ok(AnswerKey::D),
            "E" => Ok(AnswerKey::E),
            other => Err(AppError::Validation(format!(
                "answer must be one of A-E, got '{other}'"
            ))),
        }
    }
}

/// The five option texts of an exam item, keyed A through E.
///
/// Serializes with the canonical single-letter keys so rows at rest match the
/// persisted-state contract for the question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
    #[serde(rename = "E")]
    pub e: String,
}

impl QuestionOptions {
    pub fn new(a: String, b: String, c: String, d: String, e: String) -> Self {
        Self { a, b, c, d, e }
    }

    pub fn get(&self, key: AnswerKey) -> &str {
        match key {
            AnswerKey::A => &self.a,
            AnswerKey::B => &self.b,
            AnswerKey::C => &self.c,
            AnswerKey::D => &self.d,
            AnswerKey::E => &self.e,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnswerKey, &str)> {
        AnswerKey::ALL.into_iter().map(|key| (key, self.get(key)))
    }

    /// Every label present and non-empty.
    pub fn all_populated(&self) -> bool {
        self.iter().all(|(_, text)| !text.trim().is_empty())
    }

    /// No two options carry the same text.
    pub fn all_distinct(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.iter().all(|(_, text)| seen.insert(text.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for Difficulty {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(AppError::Validation(format!(
                "unknown difficulty '{other}'. Expected easy, medium or hard"
            ))),
        }
    }
}

/// Categorical confidence reported by the expert reasoner. Ordered so the
/// admission gate can be expressed as `confidence >= policy.min_confidence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for Confidence {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(AppError::Validation(format!(
                "unknown confidence level '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_options() -> QuestionOptions {
        QuestionOptions::new(
            "Report to the compliance officer".into(),
            "Execute the trade immediately".into(),
            "Share the information with a colleague".into(),
            "Wait until the information is public".into(),
            "Resign from the position".into(),
        )
    }

    #[test]
    fn answer_key_parses_case_insensitively() {
        assert_eq!(AnswerKey::from_str("c").unwrap(), AnswerKey::C);
        assert_eq!(AnswerKey::from_str(" E ").unwrap(), AnswerKey::E);
        assert!(AnswerKey::from_str("F").is_err());
        assert!(AnswerKey::from_str("").is_err());
    }

    #[test]
    fn options_serialize_with_canonical_letter_keys() {
        let json = serde_json::to_value(sample_options()).unwrap();
        for key in AnswerKey::ALL {
            assert!(json.get(key.as_str()).is_some(), "missing key {key}");
        }
    }

    #[test]
    fn options_populated_and_distinct_checks() {
        let options = sample_options();
        assert!(options.all_populated());
        assert!(options.all_distinct());

        let mut blank = sample_options();
        blank.d = "  ".into();
        assert!(!blank.all_populated());

        let mut duplicated = sample_options();
        duplicated.b = duplicated.a.clone();
        assert!(!duplicated.all_distinct());
    }

    #[test]
    fn confidence_ordering_supports_threshold_gate() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
        assert!(Confidence::High >= Confidence::High);
    }

    #[test]
    fn difficulty_round_trips_through_serde() {
        let json = serde_json::to_string(&Difficulty::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let parsed: Difficulty = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Difficulty::Medium);
    }
}
