use async_trait::async_trait;
use chrono::Utc;
use hue_core::model::ProgressSnapshot;
use sqlx::Row;
use std::collections::{BTreeMap, BTreeSet};

use super::SqliteRepository;
use super::mapping::{conn, level_id_from_i64, level_id_to_i64, ser, u8_from_i64};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(&self) -> Result<Option<ProgressSnapshot>, StorageError> {
        let row = sqlx::query("SELECT current_level FROM player_progress WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let current_level =
            level_id_from_i64(row.try_get::<i64, _>("current_level").map_err(ser)?)?;

        let rows = sqlx::query(
            r"
            SELECT level_id, wins, unlocked
            FROM level_progress
            ORDER BY level_id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut unlocked = BTreeSet::new();
        let mut level_progress = BTreeMap::new();
        for row in rows {
            let level = level_id_from_i64(row.try_get::<i64, _>("level_id").map_err(ser)?)?;
            let wins = u8_from_i64("wins", row.try_get::<i64, _>("wins").map_err(ser)?)?;
            let is_unlocked: bool = row.try_get("unlocked").map_err(ser)?;
            if wins > 0 {
                level_progress.insert(level, wins);
            }
            if is_unlocked {
                unlocked.insert(level);
            }
        }

        Ok(Some(ProgressSnapshot {
            current_level,
            unlocked,
            level_progress,
        }))
    }

    async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO player_progress (id, current_level, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                current_level = excluded.current_level,
                updated_at = excluded.updated_at
            ",
        )
        .bind(level_id_to_i64(snapshot.current_level))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM level_progress")
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        let levels: BTreeSet<_> = snapshot
            .unlocked
            .iter()
            .chain(snapshot.level_progress.keys())
            .copied()
            .collect();
        for level in levels {
            sqlx::query(
                r"
                INSERT INTO level_progress (level_id, wins, unlocked)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(level_id_to_i64(level))
            .bind(i64::from(snapshot.progress_for(level)))
            .bind(snapshot.unlocked.contains(&level))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
