use async_trait::async_trait;
use hue_core::model::{ColorName, LevelId, RoundRecord};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, level_id_from_i64, level_id_to_i64, parse_outcome, ser, u8_from_i64, u32_from_i64,
};
use crate::repository::{RoundLogRepository, RoundRow, RoundRowId, StorageError};

fn map_round_row(row: &sqlx::sqlite::SqliteRow) -> Result<RoundRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let level = level_id_from_i64(row.try_get::<i64, _>("level_id").map_err(ser)?)?;
    let target =
        ColorName::new(row.try_get::<String, _>("target").map_err(ser)?).map_err(ser)?;
    let outcome = parse_outcome(&row.try_get::<String, _>("outcome").map_err(ser)?)?;
    let attempts_used = u8_from_i64(
        "attempts_used",
        row.try_get::<i64, _>("attempts_used").map_err(ser)?,
    )?;
    let score_after = u32_from_i64(
        "score_after",
        row.try_get::<i64, _>("score_after").map_err(ser)?,
    )?;
    let started_at = row.try_get("started_at").map_err(ser)?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;

    let record = RoundRecord::new(
        level,
        target,
        outcome,
        attempts_used,
        score_after,
        started_at,
        completed_at,
    )
    .map_err(ser)?;
    Ok(RoundRow { id, record })
}

#[async_trait]
impl RoundLogRepository for SqliteRepository {
    async fn append_round(&self, record: &RoundRecord) -> Result<RoundRowId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO round_log (
                    level_id, target, outcome, attempts_used,
                    score_after, started_at, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(level_id_to_i64(record.level()))
        .bind(record.target().as_str())
        .bind(record.outcome().as_str())
        .bind(i64::from(record.attempts_used()))
        .bind(i64::from(record.score_after()))
        .bind(record.started_at())
        .bind(record.completed_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn recent_rounds(
        &self,
        level: Option<LevelId>,
        limit: u32,
    ) -> Result<Vec<RoundRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, level_id, target, outcome, attempts_used,
                    score_after, started_at, completed_at
                FROM round_log
                WHERE (?1 IS NULL OR level_id = ?1)
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(level.map(level_id_to_i64))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_round_row).collect()
    }
}
