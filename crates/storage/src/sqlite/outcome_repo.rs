use assess_core::model::{AssessmentOutcome, ModuleId, SessionId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, from_json, id_i64, module_id_from_i64, ser, to_json};
use crate::repository::{OutcomeRow, RoadmapRepository, StorageError};

fn map_outcome_row(row: &sqlx::sqlite::SqliteRow) -> Result<AssessmentOutcome, StorageError> {
    let session_id: SessionId = row
        .try_get::<String, _>("session_id")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    Ok(AssessmentOutcome {
        session_id,
        module_id: module_id_from_i64(row.try_get::<i64, _>("module_id").map_err(ser)?)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        results: from_json(&row.try_get::<String, _>("results").map_err(ser)?)?,
        roadmap: from_json(&row.try_get::<String, _>("roadmap").map_err(ser)?)?,
        summary: from_json(&row.try_get::<String, _>("summary").map_err(ser)?)?,
    })
}

#[async_trait::async_trait]
impl RoadmapRepository for SqliteRepository {
    async fn append_outcome(&self, outcome: &AssessmentOutcome) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO outcomes (
                    session_id, module_id, started_at, completed_at,
                    completion_percentage, results, roadmap, summary
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(outcome.session_id.to_string())
        .bind(id_i64("module_id", outcome.module_id.value())?)
        .bind(outcome.started_at)
        .bind(outcome.completed_at)
        .bind(i64::from(outcome.roadmap.completion_percentage))
        .bind(to_json(&outcome.results)?)
        .bind(to_json(&outcome.roadmap)?)
        .bind(to_json(&outcome.summary)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;

        Ok(res.last_insert_rowid())
    }

    async fn get_outcome(&self, id: i64) -> Result<AssessmentOutcome, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    session_id, module_id, started_at, completed_at,
                    results, roadmap, summary
                FROM outcomes
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_outcome_row(&row)
    }

    async fn list_outcomes(
        &self,
        module_id: ModuleId,
        limit: u32,
    ) -> Result<Vec<OutcomeRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, session_id, module_id, started_at, completed_at,
                    results, roadmap, summary
                FROM outcomes
                WHERE module_id = ?1
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(id_i64("module_id", module_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(ser)?;
            out.push(OutcomeRow::new(id, map_outcome_row(&row)?));
        }
        Ok(out)
    }
}
