use thiserror::Error;

use crate::assessment::LessonAssessmentError;
use crate::model::{
    LessonResultError, ModuleError, ParseIdError, QuestionError, SessionStateError,
};
use crate::settings::SettingsError;

/// Any error raised by the core domain.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Lesson(#[from] LessonAssessmentError),
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    LessonResult(#[from] LessonResultError),
}
