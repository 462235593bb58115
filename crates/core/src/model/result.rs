use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::response::Response;
use crate::settings::AssessmentSettings;

//
// ─── LEARNING CATEGORY ────────────────────────────────────────────────────────
//

/// Learning-path bucket a lesson lands in after assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningCategory {
    /// Not confident, or no correct answers.
    CompulsoryLearning,
    /// One of the two answers correct.
    SuggestedLearning,
    /// Both answers correct.
    StrongTopic,
}

impl LearningCategory {
    /// Category for a confident lesson given how many of its two answers were correct.
    #[must_use]
    pub fn from_correct_count(correct: usize) -> Self {
        match correct {
            0 => Self::CompulsoryLearning,
            1 => Self::SuggestedLearning,
            _ => Self::StrongTopic,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompulsoryLearning => "compulsory_learning",
            Self::SuggestedLearning => "suggested_learning",
            Self::StrongTopic => "strong_topic",
        }
    }

    /// Recommendation text shown alongside the category.
    #[must_use]
    pub fn recommendation(self) -> &'static str {
        match self {
            Self::CompulsoryLearning => "Essential for structured learning path",
            Self::SuggestedLearning => "Recommended for focused practice and review",
            Self::StrongTopic => "Topic mastered \u{2014} minimal review needed",
        }
    }
}

impl fmt::Display for LearningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── PACE ─────────────────────────────────────────────────────────────────────
//

/// How quickly a lesson's questions were answered on average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceBand {
    Quick,
    Normal,
    Slow,
}

//
// ─── LESSON RESULT ────────────────────────────────────────────────────────────
//

/// Stored result whose fields contradict each other.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum LessonResultError {
    #[error("lesson name cannot be empty")]
    EmptyLessonName,

    #[error("{lesson:?}: unconfident lessons carry no responses, found {found}")]
    UnexpectedResponses { lesson: String, found: usize },

    #[error("{lesson:?}: confident lessons carry 2 responses, found {found}")]
    ResponseCount { lesson: String, found: usize },

    #[error("{lesson:?}: category {found} does not match the responses (expected {expected})")]
    CategoryMismatch {
        lesson: String,
        expected: LearningCategory,
        found: LearningCategory,
    },

    #[error("{lesson:?}: accuracy {found} does not match the responses (expected {expected})")]
    AccuracyMismatch {
        lesson: String,
        expected: f64,
        found: f64,
    },
}

/// Final classification of one lesson. Never mutated after creation.
///
/// Deserializing re-derives the category and accuracy from the responses and
/// rejects records where they disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LessonResultRecord")]
pub struct LessonResult {
    lesson_name: String,
    confident: bool,
    category: LearningCategory,
    responses: Vec<Response>,
    accuracy: f64,
}

impl LessonResult {
    /// Result for a lesson the learner declared no confidence in.
    #[must_use]
    pub fn not_confident(lesson_name: impl Into<String>) -> Self {
        Self {
            lesson_name: lesson_name.into(),
            confident: false,
            category: LearningCategory::CompulsoryLearning,
            responses: Vec::new(),
            accuracy: 0.0,
        }
    }

    /// Result for a confident lesson after both questions were answered.
    pub(crate) fn from_responses(lesson_name: impl Into<String>, responses: Vec<Response>) -> Self {
        let correct = responses.iter().filter(|r| r.correct).count();
        let accuracy = percentage(correct, responses.len());
        Self {
            lesson_name: lesson_name.into(),
            confident: true,
            category: LearningCategory::from_correct_count(correct),
            responses,
            accuracy,
        }
    }

    #[must_use]
    pub fn lesson_name(&self) -> &str {
        &self.lesson_name
    }

    #[must_use]
    pub fn confident(&self) -> bool {
        self.confident
    }

    #[must_use]
    pub fn category(&self) -> LearningCategory {
        self.category
    }

    #[must_use]
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Percentage of correct answers, `0.0` for lessons with no responses.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    #[must_use]
    pub fn recommendation(&self) -> &'static str {
        self.category.recommendation()
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.responses.iter().filter(|r| r.correct).count()
    }

    /// Mean seconds per response, `None` when nothing was asked.
    #[must_use]
    pub fn mean_elapsed_secs(&self) -> Option<f64> {
        if self.responses.is_empty() {
            return None;
        }
        let total: f64 = self
            .responses
            .iter()
            .map(|r| f64::from(r.elapsed_seconds))
            .sum();
        Some(total / f64::from(u32::try_from(self.responses.len()).unwrap_or(u32::MAX)))
    }

    #[must_use]
    pub fn pace(&self, settings: &AssessmentSettings) -> Option<PaceBand> {
        let mean = self.mean_elapsed_secs()?;
        Some(if mean <= f64::from(settings.quick_pace_max_secs()) {
            PaceBand::Quick
        } else if mean > f64::from(settings.slow_pace_min_secs()) {
            PaceBand::Slow
        } else {
            PaceBand::Normal
        })
    }
}

#[derive(Deserialize)]
struct LessonResultRecord {
    lesson_name: String,
    confident: bool,
    category: LearningCategory,
    responses: Vec<Response>,
    accuracy: f64,
}

impl TryFrom<LessonResultRecord> for LessonResult {
    type Error = LessonResultError;

    fn try_from(record: LessonResultRecord) -> Result<Self, Self::Error> {
        if record.lesson_name.trim().is_empty() {
            return Err(LessonResultError::EmptyLessonName);
        }
        let lesson = record.lesson_name.clone();
        let found = record.responses.len();

        let expected = if record.confident {
            if found != 2 {
                return Err(LessonResultError::ResponseCount { lesson, found });
            }
            Self::from_responses(record.lesson_name, record.responses)
        } else {
            if found != 0 {
                return Err(LessonResultError::UnexpectedResponses { lesson, found });
            }
            Self::not_confident(record.lesson_name)
        };

        if expected.category != record.category {
            return Err(LessonResultError::CategoryMismatch {
                lesson,
                expected: expected.category,
                found: record.category,
            });
        }
        if (expected.accuracy - record.accuracy).abs() > 1e-9 {
            return Err(LessonResultError::AccuracyMismatch {
                lesson,
                expected: expected.accuracy,
                found: record.accuracy,
            });
        }
        Ok(expected)
    }
}

pub(crate) fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let part = u32::try_from(part).unwrap_or(u32::MAX);
    let whole = u32::try_from(whole).unwrap_or(u32::MAX);
    f64::from(part) / f64::from(whole) * 100.0
}
