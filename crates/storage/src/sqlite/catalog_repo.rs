use assess_core::model::{DifficultyRank, Lesson, Module, ModuleId, Question};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_lesson_row, map_module_row, map_question_row, to_json};
use crate::catalog::{Catalog, CatalogError};
use crate::repository::{QuestionBank, StorageError, fallback_question};

/// Counts of rows written by [`SqliteRepository::import_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogImport {
    pub modules: usize,
    pub lessons: usize,
    pub questions: usize,
}

impl SqliteRepository {
    /// Write a catalog into the database in one transaction.
    ///
    /// Modules and questions are upserted by ID; a module's lessons are replaced.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the catalog is invalid or a write fails. Nothing is
    /// written on error.
    pub async fn import_catalog(&self, catalog: &Catalog) -> Result<CatalogImport, CatalogError> {
        let entries = catalog.entries()?;
        let mut stats = CatalogImport::default();
        let mut tx = self.pool.begin().await.map_err(conn)?;

        for entry in &entries {
            let module_id = id_i64("module_id", entry.module.id().value())?;
            sqlx::query(
                r"
                INSERT INTO modules (id, title, description)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description
                ",
            )
            .bind(module_id)
            .bind(entry.module.title())
            .bind(entry.module.description())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
            stats.modules += 1;

            sqlx::query("DELETE FROM lessons WHERE module_id = ?1")
                .bind(module_id)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            for lesson in &entry.lessons {
                sqlx::query("INSERT INTO lessons (module_id, ordinal, name) VALUES (?1, ?2, ?3)")
                    .bind(module_id)
                    .bind(i64::from(lesson.ordinal()))
                    .bind(lesson.name())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| match e {
                        sqlx::Error::Database(db) if db.is_unique_violation() => {
                            StorageError::Conflict
                        }
                        other => conn(other),
                    })?;
                stats.lessons += 1;
            }

            for question in &entry.questions {
                upsert_question(&mut tx, question).await?;
                stats.questions += 1;
            }
        }

        tx.commit().await.map_err(conn)?;
        tracing::info!(
            modules = stats.modules,
            lessons = stats.lessons,
            questions = stats.questions,
            "catalog imported"
        );
        Ok(stats)
    }
}

async fn upsert_question(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    question: &Question,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO questions (id, lesson_name, difficulty, prompt, options, correct_label)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(id) DO UPDATE SET
            lesson_name = excluded.lesson_name,
            difficulty = excluded.difficulty,
            prompt = excluded.prompt,
            options = excluded.options,
            correct_label = excluded.correct_label
        ",
    )
    .bind(question.id().as_str())
    .bind(question.lesson_name())
    .bind(question.difficulty().as_str())
    .bind(question.prompt())
    .bind(to_json(question.options())?)
    .bind(question.correct_label())
    .execute(&mut **tx)
    .await
    .map_err(conn)?;
    Ok(())
}

#[async_trait::async_trait]
impl QuestionBank for SqliteRepository {
    async fn list_modules(&self) -> Result<Vec<Module>, StorageError> {
        let rows = sqlx::query("SELECT id, title, description FROM modules ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_module_row).collect()
    }

    async fn get_module(&self, id: ModuleId) -> Result<Module, StorageError> {
        let row = sqlx::query("SELECT id, title, description FROM modules WHERE id = ?1")
            .bind(id_i64("module_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        map_module_row(&row)
    }

    async fn get_lessons(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError> {
        // distinguishes an unknown module from one with no lessons
        self.get_module(module_id).await?;

        let rows = sqlx::query(
            r"
            SELECT ordinal, name
            FROM lessons
            WHERE module_id = ?1
            ORDER BY ordinal ASC
            ",
        )
        .bind(id_i64("module_id", module_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_lesson_row).collect()
    }

    async fn get_question(
        &self,
        lesson_name: &str,
        rank: DifficultyRank,
    ) -> Result<Question, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, lesson_name, difficulty, prompt, options, correct_label
            FROM questions
            WHERE lesson_name = ?1 AND difficulty = ?2
            ORDER BY id ASC
            LIMIT 1
            ",
        )
        .bind(lesson_name)
        .bind(rank.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_question_row(&row),
            None if self.fallback_questions => fallback_question(lesson_name, rank),
            None => Err(StorageError::NotFound),
        }
    }
}
