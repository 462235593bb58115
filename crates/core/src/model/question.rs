use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question must offer at least two options")]
    TooFewOptions,

    #[error("option labels cannot be empty")]
    EmptyOptionLabel,

    #[error("correct label {label:?} is not one of the options")]
    UnknownCorrectLabel { label: String },

    #[error("invalid difficulty rank: {0}")]
    InvalidRank(String),
}

//
// ─── DIFFICULTY ───────────────────────────────────────────────────────────────
//

/// Difficulty of a quiz question. Each confident lesson asks one of each, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyRank {
    Medium,
    Hard,
}

impl DifficultyRank {
    /// Order in which ranks are asked within a lesson.
    pub const SEQUENCE: [DifficultyRank; 2] = [DifficultyRank::Medium, DifficultyRank::Hard];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyRank::Medium => "medium",
            DifficultyRank::Hard => "hard",
        }
    }

    /// Rank of the question asked after this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            DifficultyRank::Medium => Some(DifficultyRank::Hard),
            DifficultyRank::Hard => None,
        }
    }
}

impl fmt::Display for DifficultyRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyRank {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(QuestionError::InvalidRank(other.to_owned())),
        }
    }
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// A multiple-choice question issued for a lesson. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    id: QuestionId,
    lesson_name: String,
    prompt: String,
    options: BTreeMap<String, String>,
    correct_label: String,
    difficulty: DifficultyRank,
}

impl Question {
    /// Builds a validated question.
    ///
    /// Option labels are trimmed and upper-cased so `"a"` and `"A"` name the same option.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, fewer than two options are given,
    /// a label is blank, or `correct_label` does not name an option.
    pub fn new(
        id: QuestionId,
        lesson_name: impl Into<String>,
        prompt: impl Into<String>,
        options: impl IntoIterator<Item = (String, String)>,
        correct_label: &str,
        difficulty: DifficultyRank,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into().trim().to_owned();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }

        let mut normalized = BTreeMap::new();
        for (label, text) in options {
            let label = normalize_label(&label);
            if label.is_empty() {
                return Err(QuestionError::EmptyOptionLabel);
            }
            normalized.insert(label, text.trim().to_owned());
        }
        if normalized.len() < 2 {
            return Err(QuestionError::TooFewOptions);
        }

        let correct = normalize_label(correct_label);
        if !normalized.contains_key(&correct) {
            return Err(QuestionError::UnknownCorrectLabel {
                label: correct_label.to_owned(),
            });
        }

        Ok(Self {
            id,
            lesson_name: lesson_name.into(),
            prompt,
            options: normalized,
            correct_label: correct,
            difficulty,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn lesson_name(&self) -> &str {
        &self.lesson_name
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Options keyed by label, in label order.
    #[must_use]
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    #[must_use]
    pub fn correct_label(&self) -> &str {
        &self.correct_label
    }

    #[must_use]
    pub fn difficulty(&self) -> DifficultyRank {
        self.difficulty
    }

    /// Returns true if `label` selects the correct option.
    #[must_use]
    pub fn is_correct(&self, label: &str) -> bool {
        normalize_label(label) == self.correct_label
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_ascii_uppercase()
}
