use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;
use crate::model::question::{DifficultyRank, Question};

/// Record of a single answer (or timeout) to an issued question.
///
/// Created exactly once per issued question. A timeout is recorded as a
/// `None` selection, never as a missing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub question_id: QuestionId,
    pub selected_label: Option<String>,
    pub correct: bool,
    pub elapsed_seconds: u32,
    pub difficulty: DifficultyRank,
}

impl Response {
    /// Grade a selection against `question`.
    ///
    /// `None` means no answer was given; it is incorrect and charged the full
    /// `time_limit_secs`. Manual answers are capped at the limit.
    #[must_use]
    pub fn grade(
        question: &Question,
        selected_label: Option<&str>,
        elapsed_seconds: u32,
        time_limit_secs: u32,
    ) -> Self {
        match selected_label {
            Some(label) => Self {
                question_id: question.id().clone(),
                selected_label: Some(label.trim().to_ascii_uppercase()),
                correct: question.is_correct(label),
                elapsed_seconds: elapsed_seconds.min(time_limit_secs),
                difficulty: question.difficulty(),
            },
            None => Self::timed_out(question, time_limit_secs),
        }
    }

    /// The placeholder response recorded when the answer timer expires.
    #[must_use]
    pub fn timed_out(question: &Question, time_limit_secs: u32) -> Self {
        Self {
            question_id: question.id().clone(),
            selected_label: None,
            correct: false,
            elapsed_seconds: time_limit_secs,
            difficulty: question.difficulty(),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.selected_label.is_none()
    }
}
