use async_trait::async_trait;
use hue_core::model::{LevelId, ProgressSnapshot, RoundRecord};
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
}

/// Storage row id for a persisted round.
pub type RoundRowId = i64;

/// A persisted round together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRow {
    pub id: RoundRowId,
    pub record: RoundRecord,
}

/// Repository contract for player progress (unlocked levels, streaks, last level).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Load the saved progress, if any was ever written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn load_progress(&self) -> Result<Option<ProgressSnapshot>, StorageError>;

    /// Replace the saved progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), StorageError>;
}

/// Append-only log of resolved rounds.
#[async_trait]
pub trait RoundLogRepository: Send + Sync {
    /// Append a round and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the insert fails.
    async fn append_round(&self, record: &RoundRecord) -> Result<RoundRowId, StorageError>;

    /// Most recent rounds first, optionally for a single level.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query or decoding failures.
    async fn recent_rounds(
        &self,
        level: Option<LevelId>,
        limit: u32,
    ) -> Result<Vec<RoundRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<Option<ProgressSnapshot>>>,
    rounds: Arc<Mutex<Vec<RoundRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(&self) -> Result<Option<ProgressSnapshot>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }
}

#[async_trait]
impl RoundLogRepository for InMemoryRepository {
    async fn append_round(&self, record: &RoundRecord) -> Result<RoundRowId, StorageError> {
        let mut guard = self
            .rounds
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = RoundRowId::try_from(guard.len() + 1)
            .map_err(|_| StorageError::Serialization("round id overflow".into()))?;
        guard.push(RoundRow {
            id,
            record: record.clone(),
        });
        Ok(id)
    }

    async fn recent_rounds(
        &self,
        level: Option<LevelId>,
        limit: u32,
    ) -> Result<Vec<RoundRow>, StorageError> {
        let guard = self
            .rounds
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard
            .iter()
            .rev()
            .filter(|row| level.is_none_or(|level| row.record.level() == level))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub rounds: Arc<dyn RoundLogRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let rounds: Arc<dyn RoundLogRepository> = Arc::new(repo);
        Self { progress, rounds }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hue_core::model::{ColorName, RoundOutcome};
    use hue_core::time::fixed_now;
    use std::collections::{BTreeMap, BTreeSet};

    fn round(level: u32, outcome: RoundOutcome) -> RoundRecord {
        RoundRecord::new(
            LevelId::new(level),
            ColorName::new("Red").unwrap(),
            outcome,
            1,
            10,
            fixed_now(),
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn progress_starts_empty_and_round_trips() {
        let repo = InMemoryRepository::new();
        assert!(repo.load_progress().await.unwrap().is_none());

        let snapshot = ProgressSnapshot {
            current_level: LevelId::new(2),
            unlocked: BTreeSet::from([LevelId::new(1), LevelId::new(2)]),
            level_progress: BTreeMap::from([(LevelId::new(1), 3)]),
        };
        repo.save_progress(&snapshot).await.unwrap();
        assert_eq!(repo.load_progress().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn recent_rounds_are_newest_first_and_filtered() {
        let repo = InMemoryRepository::new();
        repo.append_round(&round(1, RoundOutcome::Won)).await.unwrap();
        repo.append_round(&round(2, RoundOutcome::Lost)).await.unwrap();
        let last = repo.append_round(&round(1, RoundOutcome::Lost)).await.unwrap();

        let all = repo.recent_rounds(None, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, last);

        let level_one = repo.recent_rounds(Some(LevelId::new(1)), 10).await.unwrap();
        assert_eq!(level_one.len(), 2);
        assert!(level_one.iter().all(|row| row.record.level() == LevelId::new(1)));

        let limited = repo.recent_rounds(None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn storage_in_memory_shares_one_backend() {
        let storage = Storage::in_memory();
        storage
            .rounds
            .append_round(&round(1, RoundOutcome::Won))
            .await
            .unwrap();
        assert_eq!(storage.rounds.recent_rounds(None, 5).await.unwrap().len(), 1);
        assert!(storage.progress.load_progress().await.unwrap().is_none());
    }
}
