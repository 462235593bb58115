use serde::{Deserialize, Serialize};

/// One phase of a study roadmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapPhase {
    pub title: String,
    /// Lesson names, in lesson order.
    pub topics: Vec<String>,
    pub estimated_weeks: f64,
    pub description: String,
}

/// Three-phase study plan derived from a completed assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    pub phase1: RoadmapPhase,
    pub phase2: RoadmapPhase,
    pub phase3: RoadmapPhase,
    /// Share of lessons classified as strong topics, rounded to a whole percent.
    pub completion_percentage: u32,
}

impl Roadmap {
    #[must_use]
    pub fn phases(&self) -> [&RoadmapPhase; 3] {
        [&self.phase1, &self.phase2, &self.phase3]
    }

    /// Total estimated weeks across all phases.
    #[must_use]
    pub fn total_weeks(&self) -> f64 {
        self.phases().iter().map(|p| p.estimated_weeks).sum()
    }

    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.phases().iter().map(|p| p.topics.len()).sum()
    }
}
