use std::sync::Arc;

use chrono::{DateTime, Utc};
use hue_core::model::{LevelId, LevelStats, RoundOutcome};
use storage::repository::{RoundLogRepository, RoundRow, RoundRowId, Storage};

use crate::error::GameServiceError;

/// Row shown in the round history list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundListItem {
    pub id: RoundRowId,
    pub level: LevelId,
    pub target: String,
    pub outcome: RoundOutcome,
    pub attempts_used: u8,
    pub score_after: u32,
    pub completed_at: DateTime<Utc>,
}

impl RoundListItem {
    fn from_row(row: &RoundRow) -> Self {
        let record = &row.record;
        Self {
            id: row.id,
            level: record.level(),
            target: record.target().as_str().to_owned(),
            outcome: record.outcome(),
            attempts_used: record.attempts_used(),
            score_after: record.score_after(),
            completed_at: record.completed_at(),
        }
    }
}

/// Read-only access to the round log.
#[derive(Clone)]
pub struct RoundHistoryService {
    rounds: Arc<dyn RoundLogRepository>,
}

impl RoundHistoryService {
    #[must_use]
    pub fn new(rounds: Arc<dyn RoundLogRepository>) -> Self {
        Self { rounds }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(Arc::clone(&storage.rounds))
    }

    /// Most recent rounds first, optionally for one level.
    ///
    /// # Errors
    ///
    /// Returns `GameServiceError::Storage` if the log cannot be read.
    pub async fn recent(
        &self,
        level: Option<LevelId>,
        limit: u32,
    ) -> Result<Vec<RoundListItem>, GameServiceError> {
        let rows = self.rounds.recent_rounds(level, limit).await?;
        Ok(rows.iter().map(RoundListItem::from_row).collect())
    }

    /// Aggregate the last `limit` rounds.
    ///
    /// # Errors
    ///
    /// Returns `GameServiceError::Storage` if the log cannot be read.
    pub async fn stats(
        &self,
        level: Option<LevelId>,
        limit: u32,
    ) -> Result<LevelStats, GameServiceError> {
        let rows = self.rounds.recent_rounds(level, limit).await?;
        Ok(LevelStats::from_records(rows.iter().map(|row| &row.record)))
    }
}
