use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ModuleId, SessionId};
use crate::model::module::{Lesson, ModuleError, check_lessons};
use crate::model::result::LessonResult;
use crate::model::roadmap::Roadmap;
use crate::model::summary::AssessmentSummary;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("module {0} has no lessons")]
    NoLessons(ModuleId),

    #[error("cannot {operation} while session is {phase}")]
    InvalidPhase {
        phase: SessionPhase,
        operation: &'static str,
    },

    #[error("result for {got:?} does not belong to the current lesson {expected:?}")]
    LessonMismatch { expected: String, got: String },

    #[error(transparent)]
    Lessons(#[from] ModuleError),
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Where an assessment session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    ModuleSelection,
    ConfidenceCheck,
    Testing,
    Completed,
    /// Learner left mid-assessment. Terminal, produces no roadmap.
    Aborted,
}

impl SessionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModuleSelection => "module-selection",
            Self::ConfidenceCheck => "confidence-check",
            Self::Testing => "testing",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Bookkeeping for one learner walking one module.
///
/// Holds the ordered lessons, a cursor to the active lesson and the results
/// recorded so far. Every lesson yields exactly one result before the phase
/// can become `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    module_id: Option<ModuleId>,
    lessons: Vec<Lesson>,
    cursor: usize,
    results: Vec<LessonResult>,
    phase: SessionPhase,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            module_id: None,
            lessons: Vec::new(),
            cursor: 0,
            results: Vec::new(),
            phase: SessionPhase::ModuleSelection,
        }
    }

    /// Bind the session to a module's lessons and move to the first confidence check.
    ///
    /// Lessons are traversed in ordinal order.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::NoLessons` for an empty list,
    /// `SessionStateError::Lessons` for repeated names or ordinals and
    /// `SessionStateError::InvalidPhase` if a module was already selected.
    pub fn begin(
        &mut self,
        module_id: ModuleId,
        mut lessons: Vec<Lesson>,
    ) -> Result<&Lesson, SessionStateError> {
        self.expect_phase(&[SessionPhase::ModuleSelection], "select a module")?;
        if lessons.is_empty() {
            return Err(SessionStateError::NoLessons(module_id));
        }
        check_lessons(&lessons)?;
        lessons.sort_by_key(Lesson::ordinal);

        self.module_id = Some(module_id);
        self.lessons = lessons;
        self.cursor = 0;
        self.results.clear();
        self.phase = SessionPhase::ConfidenceCheck;
        Ok(&self.lessons[0])
    }

    /// Mark the active lesson as being quizzed.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidPhase` unless in `ConfidenceCheck`.
    pub fn start_testing(&mut self) -> Result<(), SessionStateError> {
        self.expect_phase(&[SessionPhase::ConfidenceCheck], "start testing")?;
        self.phase = SessionPhase::Testing;
        Ok(())
    }

    /// Append the active lesson's result and advance the cursor.
    ///
    /// Returns the next lesson, or `None` once every lesson has a result and the
    /// phase is `Completed`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidPhase` outside an active lesson and
    /// `SessionStateError::LessonMismatch` if the result names another lesson.
    pub fn record_result(
        &mut self,
        result: LessonResult,
    ) -> Result<Option<&Lesson>, SessionStateError> {
        self.expect_phase(
            &[SessionPhase::ConfidenceCheck, SessionPhase::Testing],
            "record a lesson result",
        )?;
        let expected = &self.lessons[self.cursor];
        if expected.name() != result.lesson_name() {
            return Err(SessionStateError::LessonMismatch {
                expected: expected.name().to_owned(),
                got: result.lesson_name().to_owned(),
            });
        }

        self.results.push(result);
        self.cursor += 1;
        if self.cursor < self.lessons.len() {
            self.phase = SessionPhase::ConfidenceCheck;
            Ok(self.lessons.get(self.cursor))
        } else {
            self.phase = SessionPhase::Completed;
            Ok(None)
        }
    }

    /// Abandon the session. The in-progress lesson produces no result.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidPhase` once completed.
    pub fn abort(&mut self) -> Result<(), SessionStateError> {
        if self.phase == SessionPhase::Completed {
            return Err(SessionStateError::InvalidPhase {
                phase: self.phase,
                operation: "abort",
            });
        }
        self.phase = SessionPhase::Aborted;
        Ok(())
    }

    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        self.module_id
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn results(&self) -> &[LessonResult] {
        &self.results
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The lesson currently being assessed, if any.
    #[must_use]
    pub fn current_lesson(&self) -> Option<&Lesson> {
        match self.phase {
            SessionPhase::ConfidenceCheck | SessionPhase::Testing => self.lessons.get(self.cursor),
            _ => None,
        }
    }

    fn expect_phase(
        &self,
        allowed: &[SessionPhase],
        operation: &'static str,
    ) -> Result<(), SessionStateError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(SessionStateError::InvalidPhase {
                phase: self.phase,
                operation,
            })
        }
    }
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// Everything a completed session hands to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    pub session_id: SessionId,
    pub module_id: ModuleId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub results: Vec<LessonResult>,
    pub roadmap: Roadmap,
    pub summary: AssessmentSummary,
}
