//! JSON catalog of modules, lessons and authored questions.
//!
//! ```json
//! {
//!   "modules": [{
//!     "id": 1,
//!     "title": "Python for Data Science",
//!     "description": "optional",
//!     "lessons": [{
//!       "name": "Pandas Basics",
//!       "questions": [{
//!         "id": "pandas-m1",
//!         "prompt": "Which call loads a CSV file?",
//!         "options": { "A": "pd.read_csv", "B": "pd.load" },
//!         "answer": "A",
//!         "difficulty": "medium"
//!       }]
//!     }]
//!   }]
//! }
//! ```
//!
//! Lessons without an explicit `ordinal` are numbered by position, starting at 1.

use std::collections::BTreeMap;
use std::path::Path;

use assess_core::model::{
    DifficultyRank, Lesson, Module, ModuleError, ModuleId, Question, QuestionError, QuestionId,
    check_lessons,
};
use serde::Deserialize;
use thiserror::Error;

use crate::repository::{InMemoryRepository, StorageError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("invalid question {id}: {source}")]
    Question {
        id: String,
        #[source]
        source: QuestionError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub modules: Vec<CatalogModule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogModule {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lessons: Vec<CatalogLesson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogLesson {
    pub name: String,
    #[serde(default)]
    pub ordinal: Option<u32>,
    #[serde(default)]
    pub questions: Vec<CatalogQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogQuestion {
    pub id: String,
    pub prompt: String,
    pub options: BTreeMap<String, String>,
    pub answer: String,
    pub difficulty: DifficultyRank,
}

/// A validated module with its lessons and questions.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub module: Module,
    pub lessons: Vec<Lesson>,
    pub questions: Vec<Question>,
}

impl Catalog {
    /// # Errors
    ///
    /// Returns `CatalogError::Json` if the text is not a valid catalog.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Io` or `CatalogError::Json`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Validate every module, lesson and question into domain types.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for the first invalid entry.
    pub fn entries(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.modules.iter().map(CatalogModule::to_entry).collect()
    }

    /// Build an in-memory question bank holding this catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for invalid entries or duplicate IDs.
    pub fn into_repository(self) -> Result<InMemoryRepository, CatalogError> {
        let repo = InMemoryRepository::new();
        for entry in self.entries()? {
            repo.add_module(entry.module, entry.lessons)?;
            for question in entry.questions {
                repo.add_question(question)?;
            }
        }
        Ok(repo)
    }
}

impl CatalogModule {
    fn to_entry(&self) -> Result<CatalogEntry, CatalogError> {
        let module = Module::new(
            ModuleId::new(self.id),
            self.title.clone(),
            self.description.clone(),
        )?;

        let mut lessons = Vec::with_capacity(self.lessons.len());
        let mut questions = Vec::new();
        for (position, raw) in (1_u32..).zip(&self.lessons) {
            let lesson = Lesson::new(raw.ordinal.unwrap_or(position), raw.name.clone())?;
            for q in &raw.questions {
                let question = Question::new(
                    QuestionId::new(q.id.clone()),
                    lesson.name(),
                    q.prompt.clone(),
                    q.options.clone(),
                    &q.answer,
                    q.difficulty,
                )
                .map_err(|source| CatalogError::Question {
                    id: q.id.clone(),
                    source,
                })?;
                questions.push(question);
            }
            lessons.push(lesson);
        }
        check_lessons(&lessons)?;

        Ok(CatalogEntry {
            module,
            lessons,
            questions,
        })
    }
}
