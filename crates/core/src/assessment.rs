use std::fmt;

use thiserror::Error;

use crate::model::{DifficultyRank, Lesson, LessonResult, Question, QuestionId, Response};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonAssessmentError {
    #[error("cannot {operation} while lesson is {state}")]
    InvalidState {
        state: &'static str,
        operation: &'static str,
    },

    #[error("expected a {expected} question for {lesson:?}, got {question}")]
    QuestionMismatch {
        lesson: String,
        expected: DifficultyRank,
        question: QuestionId,
    },
}

//
// ─── STATES ────────────────────────────────────────────────────────────────────
//

/// State of a single lesson's assessment.
///
/// ```text
/// AwaitingConfidence --no--> Classified(compulsory_learning)
/// AwaitingConfidence --yes-> AwaitingQuestion(medium) -> AwaitingAnswer(q1)
///                        -> AwaitingQuestion(hard)   -> AwaitingAnswer(q2) -> Classified
/// ```
///
/// `AwaitingQuestion` is the hand-off point where the caller fetches the next
/// question from its question bank.
#[derive(Debug, Clone, PartialEq)]
pub enum LessonState {
    AwaitingConfidence,
    AwaitingQuestion(DifficultyRank),
    AwaitingAnswer(Question),
    Classified(LessonResult),
}

impl LessonState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            LessonState::AwaitingConfidence => "awaiting confidence",
            LessonState::AwaitingQuestion(_) => "awaiting a question",
            LessonState::AwaitingAnswer(_) => "awaiting an answer",
            LessonState::Classified(_) => "classified",
        }
    }
}

impl fmt::Display for LessonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum LessonStep {
    /// Fetch a question of this rank and pass it to [`LessonAssessment::issue_question`].
    NeedsQuestion(DifficultyRank),
    /// The lesson is finished.
    Classified(LessonResult),
}

//
// ─── STATE MACHINE ─────────────────────────────────────────────────────────────
//

/// Single-use assessment of one lesson: confidence gate, then two timed questions.
///
/// # Examples
///
/// ```
/// # use assess_core::assessment::{LessonAssessment, LessonStep};
/// # use assess_core::model::{LearningCategory, Lesson};
/// let lesson = Lesson::new(1, "Pandas Basics")?;
/// let mut assessment = LessonAssessment::start(lesson, 45);
///
/// let step = assessment.submit_confidence(false)?;
/// let LessonStep::Classified(result) = step else { unreachable!() };
/// assert_eq!(result.category(), LearningCategory::CompulsoryLearning);
/// assert!(result.responses().is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct LessonAssessment {
    lesson: Lesson,
    time_limit_secs: u32,
    state: LessonState,
    responses: Vec<Response>,
}

impl LessonAssessment {
    /// Enter `AwaitingConfidence` for `lesson`.
    #[must_use]
    pub fn start(lesson: Lesson, time_limit_secs: u32) -> Self {
        Self {
            lesson,
            time_limit_secs,
            state: LessonState::AwaitingConfidence,
            responses: Vec::with_capacity(2),
        }
    }

    #[must_use]
    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    #[must_use]
    pub fn state(&self) -> &LessonState {
        &self.state
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    /// Responses recorded so far, in question order.
    #[must_use]
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// The question awaiting an answer, if any.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match &self.state {
            LessonState::AwaitingAnswer(q) => Some(q),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_classified(&self) -> bool {
        matches!(self.state, LessonState::Classified(_))
    }

    #[must_use]
    pub fn result(&self) -> Option<&LessonResult> {
        match &self.state {
            LessonState::Classified(r) => Some(r),
            _ => None,
        }
    }

    /// Consume the machine, returning its result once classified.
    #[must_use]
    pub fn into_result(self) -> Option<LessonResult> {
        match self.state {
            LessonState::Classified(r) => Some(r),
            _ => None,
        }
    }

    /// Answer the confidence gate.
    ///
    /// Not confident classifies the lesson immediately as compulsory learning.
    /// Confident asks the caller for the medium question.
    ///
    /// # Errors
    ///
    /// Returns `LessonAssessmentError::InvalidState` outside `AwaitingConfidence`.
    pub fn submit_confidence(
        &mut self,
        confident: bool,
    ) -> Result<LessonStep, LessonAssessmentError> {
        self.expect(
            matches!(self.state, LessonState::AwaitingConfidence),
            "submit confidence",
        )?;

        if confident {
            let first = DifficultyRank::SEQUENCE[0];
            self.state = LessonState::AwaitingQuestion(first);
            Ok(LessonStep::NeedsQuestion(first))
        } else {
            Ok(self.classify(LessonResult::not_confident(self.lesson.name())))
        }
    }

    /// Hand the machine the question it asked for.
    ///
    /// # Errors
    ///
    /// Returns `LessonAssessmentError::InvalidState` outside `AwaitingQuestion`, and
    /// `LessonAssessmentError::QuestionMismatch` if the question has the wrong rank or
    /// belongs to another lesson. The state is unchanged on error.
    pub fn issue_question(
        &mut self,
        question: Question,
    ) -> Result<&Question, LessonAssessmentError> {
        let LessonState::AwaitingQuestion(expected) = self.state else {
            return Err(self.invalid("issue a question"));
        };
        if question.difficulty() != expected || question.lesson_name() != self.lesson.name() {
            return Err(LessonAssessmentError::QuestionMismatch {
                lesson: self.lesson.name().to_owned(),
                expected,
                question: question.id().clone(),
            });
        }

        self.state = LessonState::AwaitingAnswer(question);
        let LessonState::AwaitingAnswer(question) = &self.state else {
            return Err(self.invalid("issue a question"));
        };
        Ok(question)
    }

    /// Record an answer to the current question.
    ///
    /// `None` is a non-answer: incorrect, charged the full time limit.
    ///
    /// # Errors
    ///
    /// Returns `LessonAssessmentError::InvalidState` outside `AwaitingAnswer`.
    pub fn submit_answer(
        &mut self,
        label: Option<&str>,
        elapsed_secs: u32,
    ) -> Result<LessonStep, LessonAssessmentError> {
        let LessonState::AwaitingAnswer(question) = &self.state else {
            return Err(self.invalid("submit an answer"));
        };

        let response = Response::grade(question, label, elapsed_secs, self.time_limit_secs);
        let next = question.difficulty().next();
        self.responses.push(response);

        match next {
            Some(rank) => {
                self.state = LessonState::AwaitingQuestion(rank);
                Ok(LessonStep::NeedsQuestion(rank))
            }
            None => {
                let result =
                    LessonResult::from_responses(self.lesson.name(), self.responses.clone());
                Ok(self.classify(result))
            }
        }
    }

    /// Expiry of the answer timer. Identical to `submit_answer(None, ..)`.
    ///
    /// # Errors
    ///
    /// Returns `LessonAssessmentError::InvalidState` outside `AwaitingAnswer`.
    pub fn time_out(&mut self) -> Result<LessonStep, LessonAssessmentError> {
        self.submit_answer(None, self.time_limit_secs)
    }

    fn classify(&mut self, result: LessonResult) -> LessonStep {
        self.state = LessonState::Classified(result.clone());
        LessonStep::Classified(result)
    }

    fn expect(&self, ok: bool, operation: &'static str) -> Result<(), LessonAssessmentError> {
        if ok { Ok(()) } else { Err(self.invalid(operation)) }
    }

    fn invalid(&self, operation: &'static str) -> LessonAssessmentError {
        LessonAssessmentError::InvalidState {
            state: self.state.name(),
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LearningCategory;

    fn question(lesson: &str, rank: DifficultyRank) -> Question {
        Question::new(
            QuestionId::new(format!("{lesson}-{rank}")),
            lesson,
            format!("{rank} question about {lesson}"),
            vec![
                ("A".to_string(), "right".to_string()),
                ("B".to_string(), "wrong".to_string()),
            ],
            "A",
            rank,
        )
        .unwrap()
    }

    fn run(first: Option<&str>, second: Option<&str>) -> LessonResult {
        let mut lesson = LessonAssessment::start(Lesson::new(1, "Loops").unwrap(), 45);
        assert_eq!(
            lesson.submit_confidence(true).unwrap(),
            LessonStep::NeedsQuestion(DifficultyRank::Medium)
        );
        lesson.issue_question(question("Loops", DifficultyRank::Medium)).unwrap();
        assert_eq!(
            lesson.submit_answer(first, 12).unwrap(),
            LessonStep::NeedsQuestion(DifficultyRank::Hard)
        );
        lesson.issue_question(question("Loops", DifficultyRank::Hard)).unwrap();
        let LessonStep::Classified(result) = lesson.submit_answer(second, 30).unwrap() else {
            panic!("lesson should be classified after two answers");
        };
        assert_eq!(lesson.result(), Some(&result));
        result
    }

    #[test]
    fn classification_table() {
        let cases = [
            (Some("A"), Some("A"), LearningCategory::StrongTopic, 100.0),
            (Some("A"), Some("B"), LearningCategory::SuggestedLearning, 50.0),
            (Some("B"), Some("A"), LearningCategory::SuggestedLearning, 50.0),
            (Some("B"), Some("B"), LearningCategory::CompulsoryLearning, 0.0),
        ];
        for (first, second, category, accuracy) in cases {
            let result = run(first, second);
            assert_eq!(result.category(), category, "{first:?}/{second:?}");
            assert_eq!(result.accuracy(), accuracy, "{first:?}/{second:?}");
            assert_eq!(result.responses().len(), 2);
            assert!(result.confident());
        }
    }

    #[test]
    fn not_confident_short_circuits() {
        let mut lesson = LessonAssessment::start(Lesson::new(1, "Loops").unwrap(), 45);
        let LessonStep::Classified(result) = lesson.submit_confidence(false).unwrap() else {
            panic!("expected classification");
        };
        assert_eq!(result.category(), LearningCategory::CompulsoryLearning);
        assert!(result.responses().is_empty());
        assert_eq!(result.recommendation(), "Essential for structured learning path");
    }

    #[test]
    fn timeout_equals_null_answer() {
        let mut a = LessonAssessment::start(Lesson::new(1, "Loops").unwrap(), 45);
        let mut b = a.clone();
        for lesson in [&mut a, &mut b] {
            lesson.submit_confidence(true).unwrap();
            lesson.issue_question(question("Loops", DifficultyRank::Medium)).unwrap();
        }
        a.time_out().unwrap();
        b.submit_answer(None, 3).unwrap();

        assert_eq!(a.responses(), b.responses());
        assert_eq!(a.responses()[0].selected_label, None);
        assert!(!a.responses()[0].correct);
        assert_eq!(a.responses()[0].elapsed_seconds, 45);
    }

    #[test]
    fn first_correct_second_timeout_is_suggested() {
        let result = run(Some("A"), None);
        assert_eq!(result.category(), LearningCategory::SuggestedLearning);
        assert_eq!(result.accuracy(), 50.0);
    }

    #[test]
    fn classified_machine_rejects_everything() {
        let mut lesson = LessonAssessment::start(Lesson::new(1, "Loops").unwrap(), 45);
        lesson.submit_confidence(false).unwrap();

        assert!(matches!(
            lesson.submit_confidence(true),
            Err(LessonAssessmentError::InvalidState { state: "classified", .. })
        ));
        assert!(lesson.submit_answer(Some("A"), 1).is_err());
        assert!(lesson.time_out().is_err());
        assert!(lesson.issue_question(question("Loops", DifficultyRank::Medium)).is_err());
    }

    #[test]
    fn answer_before_confidence_is_invalid() {
        let mut lesson = LessonAssessment::start(Lesson::new(1, "Loops").unwrap(), 45);
        let err = lesson.submit_answer(Some("A"), 1).unwrap_err();
        assert_eq!(
            err,
            LessonAssessmentError::InvalidState {
                state: "awaiting confidence",
                operation: "submit an answer",
            }
        );
    }

    #[test]
    fn rejects_question_of_wrong_rank_or_lesson() {
        let mut lesson = LessonAssessment::start(Lesson::new(1, "Loops").unwrap(), 45);
        lesson.submit_confidence(true).unwrap();

        let err = lesson
            .issue_question(question("Loops", DifficultyRank::Hard))
            .unwrap_err();
        assert!(matches!(err, LessonAssessmentError::QuestionMismatch { .. }));
        assert!(lesson.issue_question(question("Sets", DifficultyRank::Medium)).is_err());
        assert_eq!(
            lesson.state(),
            &LessonState::AwaitingQuestion(DifficultyRank::Medium)
        );
    }
}
