use serde::{Deserialize, Serialize};

use crate::model::question::DifficultyRank;
use crate::model::result::{LessonResult, percentage};

/// Per-difficulty tally of answered questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyBreakdown {
    pub difficulty: DifficultyRank,
    pub attempted: u32,
    pub correct: u32,
    pub accuracy: f64,
    pub mean_elapsed_secs: f64,
}

/// Aggregate statistics for a completed assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub lessons_total: u32,
    /// Lessons the learner was confident in and therefore quizzed.
    pub lessons_tested: u32,
    pub questions_attempted: u32,
    pub correct_answers: u32,
    pub timeouts: u32,
    pub accuracy: f64,
    pub mean_elapsed_secs: f64,
    pub by_difficulty: Vec<DifficultyBreakdown>,
}

impl AssessmentSummary {
    /// Build a summary from lesson results.
    #[must_use]
    pub fn from_results(results: &[LessonResult]) -> Self {
        let responses: Vec<_> = results.iter().flat_map(LessonResult::responses).collect();

        let mut by_difficulty = Vec::new();
        for rank in DifficultyRank::SEQUENCE {
            let of_rank: Vec<_> = responses.iter().filter(|r| r.difficulty == rank).collect();
            if of_rank.is_empty() {
                continue;
            }
            let correct = of_rank.iter().filter(|r| r.correct).count();
            let elapsed: u64 = of_rank.iter().map(|r| u64::from(r.elapsed_seconds)).sum();
            by_difficulty.push(DifficultyBreakdown {
                difficulty: rank,
                attempted: count(of_rank.len()),
                correct: count(correct),
                accuracy: percentage(correct, of_rank.len()),
                mean_elapsed_secs: mean(elapsed, of_rank.len()),
            });
        }

        let correct = responses.iter().filter(|r| r.correct).count();
        let timeouts = responses.iter().filter(|r| r.is_timeout()).count();
        let elapsed: u64 = responses.iter().map(|r| u64::from(r.elapsed_seconds)).sum();

        Self {
            lessons_total: count(results.len()),
            lessons_tested: count(results.iter().filter(|r| r.confident()).count()),
            questions_attempted: count(responses.len()),
            correct_answers: count(correct),
            timeouts: count(timeouts),
            accuracy: percentage(correct, responses.len()),
            mean_elapsed_secs: mean(elapsed, responses.len()),
            by_difficulty,
        }
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[allow(clippy::cast_precision_loss)]
fn mean(total: u64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        total as f64 / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::LessonAssessment;
    use crate::model::{Lesson, Question, QuestionId};

    fn question(rank: DifficultyRank) -> Question {
        Question::new(
            QuestionId::new(format!("q-{rank}")),
            "Loops",
            "Pick A",
            vec![("A".into(), "yes".into()), ("B".into(), "no".into())],
            "A",
            rank,
        )
        .unwrap()
    }

    fn tested(first: Option<&str>, second: Option<&str>) -> LessonResult {
        let mut lesson = LessonAssessment::start(Lesson::new(1, "Loops").unwrap(), 45);
        lesson.submit_confidence(true).unwrap();
        lesson.issue_question(question(DifficultyRank::Medium)).unwrap();
        lesson.submit_answer(first, 10).unwrap();
        lesson.issue_question(question(DifficultyRank::Hard)).unwrap();
        lesson.submit_answer(second, 20).unwrap();
        lesson.into_result().unwrap()
    }

    #[test]
    fn summary_counts_answers_per_difficulty() {
        let results = vec![
            tested(Some("A"), None),
            LessonResult::not_confident("Functions"),
            tested(Some("B"), Some("A")),
        ];

        let summary = AssessmentSummary::from_results(&results);

        assert_eq!(summary.lessons_total, 3);
        assert_eq!(summary.lessons_tested, 2);
        assert_eq!(summary.questions_attempted, 4);
        assert_eq!(summary.correct_answers, 2);
        assert_eq!(summary.timeouts, 1);
        assert_eq!(summary.accuracy, 50.0);
        assert_eq!(summary.by_difficulty.len(), 2);
        assert_eq!(summary.by_difficulty[0].difficulty, DifficultyRank::Medium);
        assert_eq!(summary.by_difficulty[0].correct, 1);
        assert_eq!(summary.by_difficulty[0].mean_elapsed_secs, 10.0);
        // the timed-out hard answer is charged the full 45 seconds
        assert_eq!(summary.by_difficulty[1].mean_elapsed_secs, 32.5);
    }

    #[test]
    fn empty_results_yield_zeroes() {
        let summary = AssessmentSummary::from_results(&[]);
        assert_eq!(summary.questions_attempted, 0);
        assert_eq!(summary.accuracy, 0.0);
        assert!(summary.by_difficulty.is_empty());
    }
}
