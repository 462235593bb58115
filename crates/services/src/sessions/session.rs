use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use assess_core::model::{
    AssessmentOutcome, AssessmentSummary, DifficultyRank, Lesson, LessonResult, ModuleId,
    Question, QuestionId, Roadmap, SessionId, SessionPhase, SessionState,
};
use assess_core::time::whole_seconds_between;
use assess_core::{AssessmentSettings, Clock, LessonAssessment, LessonStep, RoadmapSynthesizer};
use chrono::{DateTime, Utc};
use storage::repository::QuestionBank;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::progress::SessionProgress;
use crate::error::AssessmentError;
use crate::sink::ResultSink;
use crate::timer::{ExpiryFuture, TimerHandle, TimerService};

//
// ─── PROMPTS ───────────────────────────────────────────────────────────────────
//

/// What the learner should be shown next.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPrompt {
    /// Ask whether the learner is confident in `lesson`. `position` is 1-based.
    Confidence {
        lesson: Lesson,
        position: usize,
        total: usize,
    },
    /// Show a timed question. `number` is 1 for the medium question, 2 for the hard one.
    /// Answer it with `ticket`.
    Question {
        lesson: String,
        question: Question,
        ticket: QuestionTicket,
        number: usize,
        time_limit_secs: u32,
    },
    Completed {
        roadmap: Roadmap,
    },
}

/// Names one issued question within one session.
///
/// Question IDs can repeat across lessons; a ticket is unique for the whole
/// session because it also carries the lesson position and the rank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuestionTicket {
    session: SessionId,
    lesson: usize,
    rank: DifficultyRank,
    question_id: QuestionId,
}

impl QuestionTicket {
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// 0-based position of the lesson in the module.
    #[must_use]
    pub fn lesson_index(&self) -> usize {
        self.lesson
    }

    #[must_use]
    pub fn rank(&self) -> DifficultyRank {
        self.rank
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }
}

/// Result of a session transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStep {
    /// Set when the transition finished a lesson.
    pub classified: Option<LessonResult>,
    pub prompt: SessionPrompt,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub(crate) struct SessionDeps {
    pub(crate) clock: Clock,
    pub(crate) bank: Arc<dyn QuestionBank>,
    pub(crate) timer: Arc<dyn TimerService>,
    pub(crate) sink: Arc<dyn ResultSink>,
    pub(crate) settings: AssessmentSettings,
}

struct ActiveQuestion {
    ticket: QuestionTicket,
    issued_at: DateTime<Utc>,
    timer: TimerHandle,
}

struct SessionInner {
    state: SessionState,
    lesson: Option<LessonAssessment>,
    active: Option<ActiveQuestion>,
    answered: HashSet<QuestionTicket>,
    started_at: DateTime<Utc>,
    outcome: Option<AssessmentOutcome>,
    published: bool,
}

impl SessionInner {
    fn confidence_prompt(&self, lesson: Lesson) -> SessionPrompt {
        SessionPrompt::Confidence {
            lesson,
            position: self.state.cursor() + 1,
            total: self.state.lessons().len(),
        }
    }

    fn lesson_mut(&mut self, operation: &'static str) -> Result<&mut LessonAssessment, AssessmentError> {
        let phase = self.state.phase();
        self.lesson
            .as_mut()
            .ok_or_else(|| AssessmentError::invalid_state(phase, operation))
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's assessment of one module.
///
/// Cloning yields another handle to the same session. Every operation, including
/// timer expiry, takes the session lock, so transitions never interleave. When a
/// timeout and a manual answer race, whichever takes the lock first is recorded
/// and the other is rejected (manual answer) or dropped (timeout).
#[derive(Clone)]
pub struct AssessmentSession {
    id: SessionId,
    inner: Arc<Mutex<SessionInner>>,
    deps: Arc<SessionDeps>,
}

impl AssessmentSession {
    pub(crate) fn new(deps: Arc<SessionDeps>) -> Self {
        let inner = SessionInner {
            state: SessionState::new(),
            lesson: None,
            active: None,
            answered: HashSet::new(),
            started_at: deps.clock.now(),
            outcome: None,
            published: false,
        };
        Self {
            id: SessionId::random(),
            inner: Arc::new(Mutex::new(inner)),
            deps,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.state.phase()
    }

    fn time_limit(&self) -> u32 {
        self.deps.settings.answer_time_limit_secs()
    }

    /// Bind the session to a module and ask for confidence in its first lesson.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown module,
    /// `AssessmentError::NoLessons` for an empty one and
    /// `AssessmentError::InvalidState` if a module was already selected.
    pub async fn select_module(&self, module_id: ModuleId) -> Result<SessionStep, AssessmentError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let phase = inner.state.phase();
        if phase != SessionPhase::ModuleSelection {
            return Err(AssessmentError::invalid_state(phase, "select a module"));
        }

        let lessons = self
            .deps
            .bank
            .get_lessons(module_id)
            .await
            .map_err(|e| AssessmentError::from_bank(e, || format!("module {module_id}")))?;
        let first = inner.state.begin(module_id, lessons)?.clone();
        inner.started_at = self.deps.clock.now();
        inner.lesson = Some(LessonAssessment::start(first.clone(), self.time_limit()));

        info!(
            session = %self.id,
            module = %module_id,
            lessons = inner.state.lessons().len(),
            "assessment started"
        );
        Ok(SessionStep {
            classified: None,
            prompt: inner.confidence_prompt(first),
        })
    }

    /// Answer the confidence gate for the current lesson.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::InvalidState` outside the confidence check, or a
    /// bank error if the first question cannot be fetched.
    pub async fn submit_confidence(&self, confident: bool) -> Result<SessionStep, AssessmentError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let phase = inner.state.phase();
        if phase != SessionPhase::ConfidenceCheck {
            return Err(AssessmentError::invalid_state(phase, "submit confidence"));
        }

        let lesson = inner.lesson_mut("submit confidence")?;
        let step = lesson.submit_confidence(confident)?;
        debug!(
            session = %self.id,
            lesson = lesson.lesson().name(),
            confident,
            "confidence recorded"
        );
        if confident {
            inner.state.start_testing()?;
        }
        self.advance(inner, step).await
    }

    /// Answer the question behind `ticket` now. `None` records a non-answer.
    ///
    /// # Errors
    ///
    /// See [`AssessmentSession::submit_answer_at`].
    pub async fn submit_answer(
        &self,
        ticket: &QuestionTicket,
        label: Option<&str>,
    ) -> Result<SessionStep, AssessmentError> {
        self.submit_answer_at(ticket, label, self.deps.clock.now())
            .await
    }

    /// Answer the question behind `ticket` at `answered_at`.
    ///
    /// Elapsed time is measured from when the question was issued and capped at the
    /// time limit.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::DoubleSubmission` if the question already has a
    /// response (including one recorded by its timer), and
    /// `AssessmentError::InvalidState` if the session is aborted or the ticket is
    /// not the one awaiting an answer.
    pub async fn submit_answer_at(
        &self,
        ticket: &QuestionTicket,
        label: Option<&str>,
        answered_at: DateTime<Utc>,
    ) -> Result<SessionStep, AssessmentError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let phase = inner.state.phase();
        if phase == SessionPhase::Aborted || ticket.session != self.id {
            return Err(AssessmentError::invalid_state(phase, "submit an answer"));
        }
        if inner.answered.contains(ticket) {
            return Err(AssessmentError::DoubleSubmission(ticket.question_id.clone()));
        }
        let active = match inner.active.take() {
            Some(active) if &active.ticket == ticket => active,
            other => {
                inner.active = other;
                return Err(AssessmentError::invalid_state(
                    phase,
                    "answer a question that is not awaiting an answer",
                ));
            }
        };

        self.deps.timer.disarm(active.timer);
        let elapsed = whole_seconds_between(active.issued_at, answered_at);
        inner.answered.insert(active.ticket);

        let step = inner
            .lesson_mut("submit an answer")?
            .submit_answer(label, elapsed)?;
        debug!(session = %self.id, question = %ticket.question_id, elapsed, "answer recorded");
        self.advance(inner, step).await
    }

    /// Leave the session. The in-progress lesson produces no result and no
    /// roadmap is emitted. Aborting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::InvalidState` once completed.
    pub async fn abort(&self) -> Result<(), AssessmentError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        match inner.state.phase() {
            SessionPhase::Aborted => return Ok(()),
            SessionPhase::Completed => {
                return Err(AssessmentError::invalid_state(SessionPhase::Completed, "abort"));
            }
            _ => {}
        }

        self.discard(inner)?;

        info!(
            session = %self.id,
            completed_lessons = inner.state.results().len(),
            "assessment aborted"
        );
        Ok(())
    }

    /// Publish the outcome if an earlier attempt failed. Never publishes twice.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::InvalidState` before completion and
    /// `AssessmentError::Sink` if publishing fails again.
    pub async fn finalize(&self) -> Result<AssessmentOutcome, AssessmentError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.publish(inner).await?;
        inner
            .outcome
            .clone()
            .ok_or_else(|| AssessmentError::invalid_state(inner.state.phase(), "finalize"))
    }

    /// The most recently classified lesson, if any.
    pub async fn last_result(&self) -> Option<LessonResult> {
        self.inner.lock().await.state.results().last().cloned()
    }

    /// The completed outcome, if any.
    pub async fn outcome(&self) -> Option<AssessmentOutcome> {
        self.inner.lock().await.outcome.clone()
    }

    pub async fn is_published(&self) -> bool {
        self.inner.lock().await.published
    }

    pub async fn progress(&self) -> SessionProgress {
        let inner = self.inner.lock().await;
        let in_flight = inner
            .lesson
            .as_ref()
            .map_or(&[][..], LessonAssessment::responses);
        let (answered, correct) = inner
            .state
            .results()
            .iter()
            .flat_map(LessonResult::responses)
            .chain(in_flight)
            .fold((0, 0), |(n, c), r| (n + 1, c + usize::from(r.correct)));

        let total = inner.state.lessons().len();
        let completed = inner.state.results().len();
        SessionProgress {
            phase: inner.state.phase(),
            total_lessons: total,
            completed_lessons: completed,
            remaining: total.saturating_sub(completed),
            current_lesson: inner.state.current_lesson().map(|l| l.name().to_owned()),
            questions_answered: answered,
            correct_answers: correct,
        }
    }

    /// The prompt currently awaiting the learner, if any.
    pub async fn current_prompt(&self) -> Option<SessionPrompt> {
        let inner = self.inner.lock().await;
        match inner.state.phase() {
            SessionPhase::ConfidenceCheck => {
                let lesson = inner.state.current_lesson()?.clone();
                Some(inner.confidence_prompt(lesson))
            }
            SessionPhase::Testing => {
                let lesson = inner.lesson.as_ref()?;
                let question = lesson.current_question()?.clone();
                let ticket = inner.active.as_ref()?.ticket.clone();
                Some(SessionPrompt::Question {
                    lesson: lesson.lesson().name().to_owned(),
                    question,
                    ticket,
                    number: lesson.responses().len() + 1,
                    time_limit_secs: lesson.time_limit_secs(),
                })
            }
            SessionPhase::Completed => inner.outcome.as_ref().map(|o| SessionPrompt::Completed {
                roadmap: o.roadmap.clone(),
            }),
            SessionPhase::ModuleSelection | SessionPhase::Aborted => None,
        }
    }

    // ─── transitions ──────────────────────────────────────────────────────────

    async fn advance(
        &self,
        inner: &mut SessionInner,
        step: LessonStep,
    ) -> Result<SessionStep, AssessmentError> {
        match step {
            LessonStep::NeedsQuestion(rank) => {
                let prompt = self.issue_question(inner, rank).await?;
                Ok(SessionStep {
                    classified: None,
                    prompt,
                })
            }
            LessonStep::Classified(result) => self.finish_lesson(inner, result).await,
        }
    }

    /// Fetch and arm the next question. A bank failure ends the session as
    /// aborted, since the lesson can no longer reach two responses.
    async fn issue_question(
        &self,
        inner: &mut SessionInner,
        rank: DifficultyRank,
    ) -> Result<SessionPrompt, AssessmentError> {
        let lesson_name = inner
            .lesson_mut("issue a question")?
            .lesson()
            .name()
            .to_owned();
        let fetched = self
            .deps
            .bank
            .get_question(&lesson_name, rank)
            .await
            .map_err(|e| {
                AssessmentError::from_bank(e, || format!("{rank} question for {lesson_name:?}"))
            })
            .and_then(|question| {
                Ok(inner
                    .lesson_mut("issue a question")?
                    .issue_question(question)?
                    .clone())
            });
        let question = match fetched {
            Ok(question) => question,
            Err(err) => {
                warn!(
                    session = %self.id,
                    lesson = %lesson_name,
                    error = %err,
                    "no usable question; aborting session"
                );
                self.discard(inner)?;
                return Err(err);
            }
        };

        let number = inner.lesson_mut("issue a question")?.responses().len() + 1;
        let ticket = QuestionTicket {
            session: self.id,
            lesson: inner.state.cursor(),
            rank,
            question_id: question.id().clone(),
        };
        let limit = self.time_limit();
        let timer = self.deps.timer.arm(
            Duration::from_secs(u64::from(limit)),
            self.expiry_future(ticket.clone()),
        );
        inner.active = Some(ActiveQuestion {
            ticket: ticket.clone(),
            issued_at: self.deps.clock.now(),
            timer,
        });

        debug!(session = %self.id, question = %question.id(), %rank, "question issued");
        Ok(SessionPrompt::Question {
            lesson: lesson_name,
            question,
            ticket,
            number,
            time_limit_secs: limit,
        })
    }

    /// Drop in-flight lesson state and move to `Aborted`.
    fn discard(&self, inner: &mut SessionInner) -> Result<(), AssessmentError> {
        if let Some(active) = inner.active.take() {
            self.deps.timer.disarm(active.timer);
        }
        inner.lesson = None;
        inner.state.abort()?;
        Ok(())
    }

    async fn finish_lesson(
        &self,
        inner: &mut SessionInner,
        result: LessonResult,
    ) -> Result<SessionStep, AssessmentError> {
        inner.lesson = None;
        debug!(
            session = %self.id,
            lesson = result.lesson_name(),
            category = %result.category(),
            "lesson classified"
        );

        let prompt = match inner.state.record_result(result.clone())?.cloned() {
            Some(next) => {
                inner.lesson = Some(LessonAssessment::start(next.clone(), self.time_limit()));
                inner.confidence_prompt(next)
            }
            None => {
                let roadmap = self.complete(inner)?;
                self.publish(inner).await?;
                SessionPrompt::Completed { roadmap }
            }
        };

        Ok(SessionStep {
            classified: Some(result),
            prompt,
        })
    }

    fn complete(&self, inner: &mut SessionInner) -> Result<Roadmap, AssessmentError> {
        let module_id = inner
            .state
            .module_id()
            .ok_or_else(|| AssessmentError::invalid_state(inner.state.phase(), "complete"))?;
        let results = inner.state.results().to_vec();
        let roadmap = RoadmapSynthesizer::new(self.deps.settings.clone()).synthesize(&results);

        info!(
            session = %self.id,
            module = %module_id,
            completion = roadmap.completion_percentage,
            "assessment completed"
        );
        inner.outcome = Some(AssessmentOutcome {
            session_id: self.id,
            module_id,
            started_at: inner.started_at,
            completed_at: self.deps.clock.now(),
            summary: AssessmentSummary::from_results(&results),
            results,
            roadmap: roadmap.clone(),
        });
        Ok(roadmap)
    }

    async fn publish(&self, inner: &mut SessionInner) -> Result<(), AssessmentError> {
        if inner.published {
            return Ok(());
        }
        let Some(outcome) = inner.outcome.as_ref() else {
            return Err(AssessmentError::invalid_state(
                inner.state.phase(),
                "publish an outcome",
            ));
        };

        match self.deps.sink.publish(outcome).await {
            Ok(()) => {
                inner.published = true;
                Ok(())
            }
            Err(err) => {
                warn!(session = %self.id, error = %err, "failed to publish assessment outcome");
                Err(err.into())
            }
        }
    }

    // ─── timeouts ─────────────────────────────────────────────────────────────

    fn expiry_future(&self, ticket: QuestionTicket) -> ExpiryFuture {
        let inner = Arc::downgrade(&self.inner);
        let deps = Arc::clone(&self.deps);
        let id = self.id;
        Box::pin(async move {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let session = AssessmentSession { id, inner, deps };
            if let Err(err) = session.handle_timeout(&ticket).await {
                warn!(
                    session = %id,
                    question = %ticket.question_id,
                    error = %err,
                    "timeout processing failed"
                );
            }
        })
    }

    async fn handle_timeout(&self, ticket: &QuestionTicket) -> Result<(), AssessmentError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let current = inner.active.as_ref().is_some_and(|a| &a.ticket == ticket);
        if !current {
            debug!(session = %self.id, question = %ticket.question_id, "stale timeout ignored");
            return Ok(());
        }

        inner.active = None;
        inner.answered.insert(ticket.clone());
        let step = inner.lesson_mut("time out")?.time_out()?;
        debug!(session = %self.id, question = %ticket.question_id, "answer timed out");
        self.advance(inner, step).await.map(|_| ())
    }
}

impl fmt::Debug for AssessmentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentSession")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
