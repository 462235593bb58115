use assess_core::model::{
    AssessmentOutcome, DifficultyRank, Lesson, Module, ModuleError, ModuleId, Question,
    QuestionId, check_lessons,
};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    InvalidModule(#[from] ModuleError),
}

/// Read-only catalog of modules, lessons and questions consumed by assessment sessions.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// All modules, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn list_modules(&self) -> Result<Vec<Module>, StorageError>;

    /// Fetch a module by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_module(&self, id: ModuleId) -> Result<Module, StorageError>;

    /// Lessons of a module, ordered by ordinal. An existing module may have none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the module is unknown, or other storage errors.
    async fn get_lessons(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError>;

    /// A question of the given rank for the named lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson has no question of that rank.
    async fn get_question(
        &self,
        lesson_name: &str,
        rank: DifficultyRank,
    ) -> Result<Question, StorageError>;
}

/// A persisted outcome with its storage ID.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRow {
    pub id: i64,
    pub outcome: AssessmentOutcome,
}

impl OutcomeRow {
    #[must_use]
    pub fn new(id: i64, outcome: AssessmentOutcome) -> Self {
        Self { id, outcome }
    }
}

/// Append-only store of completed assessments and their roadmaps.
#[async_trait]
pub trait RoadmapRepository: Send + Sync {
    /// Append an outcome and return its ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the outcome cannot be stored.
    async fn append_outcome(&self, outcome: &AssessmentOutcome) -> Result<i64, StorageError>;

    /// Fetch an outcome by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_outcome(&self, id: i64) -> Result<AssessmentOutcome, StorageError>;

    /// Outcomes for a module, most recently completed first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query or decode failure.
    async fn list_outcomes(
        &self,
        module_id: ModuleId,
        limit: u32,
    ) -> Result<Vec<OutcomeRow>, StorageError>;
}

//
// ─── FALLBACK QUESTIONS ────────────────────────────────────────────────────────
//

/// Generic question for a lesson that has no authored question of `rank`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the lesson name produces an invalid question.
pub fn fallback_question(lesson_name: &str, rank: DifficultyRank) -> Result<Question, StorageError> {
    let (prompt, options, answer) = match rank {
        DifficultyRank::Medium => (
            format!("What is a key concept in {lesson_name}?"),
            [
                "Basic concept",
                "Intermediate concept",
                "Advanced concept",
                "Unrelated concept",
            ],
            "A",
        ),
        DifficultyRank::Hard => (
            format!("How do you apply {lesson_name} in practice?"),
            [
                "Simple approach",
                "Standard approach",
                "Complex approach",
                "Incorrect approach",
            ],
            "B",
        ),
    };
    let options = ["A", "B", "C", "D"]
        .into_iter()
        .zip(options)
        .map(|(label, text)| (label.to_owned(), text.to_owned()));

    Question::new(
        fallback_question_id(lesson_name, rank),
        lesson_name,
        prompt,
        options,
        answer,
        rank,
    )
    .map_err(|e| StorageError::Serialization(e.to_string()))
}

/// `fallback:<rank>:<lesson name>`. The full name is kept so distinct lessons
/// never share an ID.
fn fallback_question_id(lesson_name: &str, rank: DifficultyRank) -> QuestionId {
    QuestionId::new(format!("fallback:{rank}:{lesson_name}"))
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
struct ModuleEntry {
    module: Module,
    lessons: Vec<Lesson>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// With `fallback_questions` enabled, lessons without an authored question of the
/// requested rank receive a generic one. With `shuffle` enabled, one of several
/// authored questions of the same rank is picked at random.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    modules: Arc<Mutex<BTreeMap<ModuleId, ModuleEntry>>>,
    questions: Arc<Mutex<HashMap<(String, DifficultyRank), Vec<Question>>>>,
    outcomes: Arc<Mutex<Vec<AssessmentOutcome>>>,
    fallback_questions: bool,
    shuffle: bool,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fallback_questions(mut self, enabled: bool) -> Self {
        self.fallback_questions = enabled;
        self
    }

    #[must_use]
    pub fn with_shuffle(mut self, enabled: bool) -> Self {
        self.shuffle = enabled;
        self
    }

    /// Register a module and its lessons.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidModule` if two lessons share a name or an
    /// ordinal, and `StorageError::Conflict` if the module ID is taken.
    pub fn add_module(&self, module: Module, mut lessons: Vec<Lesson>) -> Result<(), StorageError> {
        check_lessons(&lessons)?;
        let mut guard = self
            .modules
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&module.id()) {
            return Err(StorageError::Conflict);
        }
        lessons.sort_by_key(Lesson::ordinal);
        guard.insert(module.id(), ModuleEntry { module, lessons });
        Ok(())
    }

    /// Register an authored question under its lesson and rank.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a question with the same ID is already
    /// registered for that lesson and rank.
    pub fn add_question(&self, question: Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let slot = guard
            .entry((question.lesson_name().to_owned(), question.difficulty()))
            .or_default();
        if slot.iter().any(|q| q.id() == question.id()) {
            return Err(StorageError::Conflict);
        }
        slot.push(question);
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for InMemoryRepository {
    async fn list_modules(&self) -> Result<Vec<Module>, StorageError> {
        let guard = self
            .modules
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.values().map(|e| e.module.clone()).collect())
    }

    async fn get_module(&self, id: ModuleId) -> Result<Module, StorageError> {
        let guard = self
            .modules
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(&id)
            .map(|e| e.module.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn get_lessons(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError> {
        let guard = self
            .modules
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(&module_id)
            .map(|e| e.lessons.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn get_question(
        &self,
        lesson_name: &str,
        rank: DifficultyRank,
    ) -> Result<Question, StorageError> {
        let picked = {
            let guard = self
                .questions
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard
                .get(&(lesson_name.to_owned(), rank))
                .and_then(|candidates| {
                    if self.shuffle {
                        candidates.choose(&mut rand::rng()).cloned()
                    } else {
                        candidates.first().cloned()
                    }
                })
        };

        match picked {
            Some(question) => Ok(question),
            None if self.fallback_questions => fallback_question(lesson_name, rank),
            None => Err(StorageError::NotFound),
        }
    }
}

#[async_trait]
impl RoadmapRepository for InMemoryRepository {
    async fn append_outcome(&self, outcome: &AssessmentOutcome) -> Result<i64, StorageError> {
        let mut guard = self
            .outcomes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(outcome.clone());
        i64::try_from(guard.len()).map_err(|_| StorageError::Serialization("id overflow".into()))
    }

    async fn get_outcome(&self, id: i64) -> Result<AssessmentOutcome, StorageError> {
        let guard = self
            .outcomes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| guard.get(i))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_outcomes(
        &self,
        module_id: ModuleId,
        limit: u32,
    ) -> Result<Vec<OutcomeRow>, StorageError> {
        let guard = self
            .outcomes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<OutcomeRow> = guard
            .iter()
            .enumerate()
            .filter(|(_, o)| o.module_id == module_id)
            .filter_map(|(i, o)| Some(OutcomeRow::new(i64::try_from(i + 1).ok()?, o.clone())))
            .collect();
        rows.sort_by(|a, b| {
            b.outcome
                .completed_at
                .cmp(&a.outcome.completed_at)
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

/// Aggregates the question bank and outcome store behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub bank: Arc<dyn QuestionBank>,
    pub outcomes: Arc<dyn RoadmapRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    /// Wrap an already populated in-memory repository.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let bank: Arc<dyn QuestionBank> = Arc::new(repo.clone());
        let outcomes: Arc<dyn RoadmapRepository> = Arc::new(repo);
        Self { bank, outcomes }
    }
}
