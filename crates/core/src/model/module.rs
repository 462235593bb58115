use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ModuleId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModuleError {
    #[error("module title cannot be empty")]
    EmptyTitle,

    #[error("lesson name cannot be empty")]
    EmptyLessonName,

    #[error("lesson ordinal must be > 0")]
    InvalidOrdinal,

    #[error("lesson name {0:?} appears more than once in the module")]
    DuplicateLessonName(String),

    #[error("lesson ordinal {0} appears more than once in the module")]
    DuplicateOrdinal(u32),
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// Immutable catalog entry grouping an ordered list of lessons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    id: ModuleId,
    title: String,
    description: Option<String>,
}

impl Module {
    /// Creates a catalog module.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::EmptyTitle` if the title is blank.
    pub fn new(
        id: ModuleId,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self, ModuleError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(ModuleError::EmptyTitle);
        }
        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            title,
            description,
        })
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A lesson inside a module. Traversal order is ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    ordinal: u32,
    name: String,
}

impl Lesson {
    /// Creates a lesson at the given 1-based position.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::InvalidOrdinal` for ordinal 0 and
    /// `ModuleError::EmptyLessonName` for a blank name.
    pub fn new(ordinal: u32, name: impl Into<String>) -> Result<Self, ModuleError> {
        if ordinal == 0 {
            return Err(ModuleError::InvalidOrdinal);
        }
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(ModuleError::EmptyLessonName);
        }
        Ok(Self { ordinal, name })
    }

    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Checks that a module's lessons have distinct names and distinct ordinals.
///
/// Lesson names become roadmap topics, so a repeated name would land in
/// more than one phase.
///
/// # Errors
///
/// Returns the first `ModuleError::DuplicateLessonName` or
/// `ModuleError::DuplicateOrdinal` found.
pub fn check_lessons(lessons: &[Lesson]) -> Result<(), ModuleError> {
    let mut names = HashSet::with_capacity(lessons.len());
    let mut ordinals = HashSet::with_capacity(lessons.len());
    for lesson in lessons {
        if !ordinals.insert(lesson.ordinal) {
            return Err(ModuleError::DuplicateOrdinal(lesson.ordinal));
        }
        if !names.insert(lesson.name.as_str()) {
            return Err(ModuleError::DuplicateLessonName(lesson.name.clone()));
        }
    }
    Ok(())
}
