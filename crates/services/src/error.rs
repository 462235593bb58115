//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::model::{ModuleId, QuestionId, SessionStateError};
use assess_core::{LessonAssessmentError, SettingsError};
use storage::repository::StorageError;

use crate::sink::SinkError;

/// Errors emitted by assessment sessions and the engine.
///
/// None of these are retried automatically. `Sink` is the exception that
/// leaves the session completed: call `finalize` to publish again.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        state: String,
        operation: &'static str,
    },

    #[error("module {0} has no lessons")]
    NoLessons(ModuleId),

    #[error("question {0} was already answered")]
    DoubleSubmission(QuestionId),

    #[error("module lessons are malformed: {0}")]
    InvalidModule(String),

    #[error("question bank returned an unusable question: {0}")]
    InvalidQuestion(String),

    #[error("failed to publish outcome: {0}")]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl AssessmentError {
    /// Map a question-bank failure, naming what was looked up.
    pub(crate) fn from_bank(err: StorageError, what: impl FnOnce() -> String) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound(what()),
            other => Self::Storage(other),
        }
    }

    pub(crate) fn invalid_state(state: impl ToString, operation: &'static str) -> Self {
        Self::InvalidState {
            state: state.to_string(),
            operation,
        }
    }
}

impl From<LessonAssessmentError> for AssessmentError {
    fn from(err: LessonAssessmentError) -> Self {
        match err {
            LessonAssessmentError::InvalidState { state, operation } => {
                Self::invalid_state(state, operation)
            }
            other => Self::InvalidQuestion(other.to_string()),
        }
    }
}

impl From<SessionStateError> for AssessmentError {
    fn from(err: SessionStateError) -> Self {
        match err {
            SessionStateError::NoLessons(module_id) => Self::NoLessons(module_id),
            SessionStateError::InvalidPhase { phase, operation } => {
                Self::invalid_state(phase, operation)
            }
            SessionStateError::Lessons(err) => Self::InvalidModule(err.to_string()),
            other => Self::invalid_state(other, "record a lesson result"),
        }
    }
}
