use crate::model::{LearningCategory, LessonResult, Roadmap, RoadmapPhase};
use crate::settings::{AssessmentSettings, PhaseEstimate};

const FOUNDATION_TITLE: &str = "Foundation Building (Priority)";
const ENHANCEMENT_TITLE: &str = "Skills Enhancement (Recommended)";
const ADVANCED_TITLE: &str = "Advanced Applications (Optional)";

const FOUNDATION_DESCRIPTION: &str =
    "Build core understanding of the topics you are not yet comfortable with.";
const ENHANCEMENT_DESCRIPTION: &str =
    "Practice and review the topics you partially know to close the remaining gaps.";
const ADVANCED_DESCRIPTION: &str =
    "Apply the topics you have mastered to real projects and harder problems.";

/// Reduces lesson results into a three-phase study roadmap.
///
/// Synthesis is a pure function of the results and the settings: the same
/// input always yields the same roadmap.
///
/// # Examples
///
/// ```
/// # use assess_core::model::LessonResult;
/// # use assess_core::roadmap::RoadmapSynthesizer;
/// let results = vec![LessonResult::not_confident("Loops")];
/// let roadmap = RoadmapSynthesizer::default().synthesize(&results);
///
/// assert_eq!(roadmap.phase1.topics, vec!["Loops".to_string()]);
/// assert_eq!(roadmap.phase1.estimated_weeks, 1.0);
/// assert_eq!(roadmap.completion_percentage, 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoadmapSynthesizer {
    settings: AssessmentSettings,
}

impl RoadmapSynthesizer {
    #[must_use]
    pub fn new(settings: AssessmentSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &AssessmentSettings {
        &self.settings
    }

    /// Partition `results` by category, preserving lesson order, and estimate
    /// the effort of each phase.
    #[must_use]
    pub fn synthesize(&self, results: &[LessonResult]) -> Roadmap {
        let mut compulsory = Vec::new();
        let mut suggested = Vec::new();
        let mut strong = Vec::new();

        for result in results {
            let bucket = match result.category() {
                LearningCategory::CompulsoryLearning => &mut compulsory,
                LearningCategory::SuggestedLearning => &mut suggested,
                LearningCategory::StrongTopic => &mut strong,
            };
            bucket.push(result.lesson_name().to_owned());
        }

        let completion_percentage = completion_percentage(strong.len(), results.len());

        Roadmap {
            phase1: phase(
                FOUNDATION_TITLE,
                FOUNDATION_DESCRIPTION,
                compulsory,
                self.settings.foundation(),
            ),
            phase2: phase(
                ENHANCEMENT_TITLE,
                ENHANCEMENT_DESCRIPTION,
                suggested,
                self.settings.enhancement(),
            ),
            phase3: phase(
                ADVANCED_TITLE,
                ADVANCED_DESCRIPTION,
                strong,
                self.settings.advanced(),
            ),
            completion_percentage,
        }
    }
}

fn phase(
    title: &str,
    description: &str,
    topics: Vec<String>,
    estimate: PhaseEstimate,
) -> RoadmapPhase {
    RoadmapPhase {
        title: title.to_owned(),
        estimated_weeks: estimate.weeks_for(topics.len()),
        topics,
        description: description.to_owned(),
    }
}

/// `round(100 * strong / total)` with halves rounded up, `0` for an empty session.
fn completion_percentage(strong: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let rounded = (200 * strong + total) / (2 * total);
    u32::try_from(rounded).unwrap_or(100)
}
