use assess_core::model::SessionPhase;
use serde::Serialize;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub phase: SessionPhase,
    pub total_lessons: usize,
    pub completed_lessons: usize,
    pub remaining: usize,
    pub current_lesson: Option<String>,
    pub questions_answered: usize,
    pub correct_answers: usize,
}

impl SessionProgress {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}
