use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::color::ColorName;
use crate::model::ids::LevelId;
use crate::model::session::MAX_ATTEMPTS;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoundRecordError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("attempts used must be between 1 and {max}, got {got}")]
    InvalidAttempts { got: u8, max: u8 },
}

/// How a resolved round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Won,
    Lost,
}

impl RoundOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RoundOutcome::Won => "won",
            RoundOutcome::Lost => "lost",
        }
    }
}

/// Record of one resolved round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRecord {
    level: LevelId,
    target: ColorName,
    outcome: RoundOutcome,
    attempts_used: u8,
    score_after: u32,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl RoundRecord {
    /// Build a record for a finished round.
    ///
    /// # Errors
    ///
    /// Returns `RoundRecordError::InvalidTimeRange` if `completed_at` is before
    /// `started_at`, and `RoundRecordError::InvalidAttempts` if `attempts_used`
    /// is outside `1..=MAX_ATTEMPTS`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        level: LevelId,
        target: ColorName,
        outcome: RoundOutcome,
        attempts_used: u8,
        score_after: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, RoundRecordError> {
        if completed_at < started_at {
            return Err(RoundRecordError::InvalidTimeRange);
        }
        if !(1..=MAX_ATTEMPTS).contains(&attempts_used) {
            return Err(RoundRecordError::InvalidAttempts {
                got: attempts_used,
                max: MAX_ATTEMPTS,
            });
        }

        Ok(Self {
            level,
            target,
            outcome,
            attempts_used,
            score_after,
            started_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn level(&self) -> LevelId {
        self.level
    }

    #[must_use]
    pub fn target(&self) -> &ColorName {
        &self.target
    }

    #[must_use]
    pub fn outcome(&self) -> RoundOutcome {
        self.outcome
    }

    #[must_use]
    pub fn attempts_used(&self) -> u8 {
        self.attempts_used
    }

    #[must_use]
    pub fn score_after(&self) -> u32 {
        self.score_after
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

/// Aggregate over a set of round records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelStats {
    pub played: u32,
    pub won: u32,
    pub lost: u32,
    pub best_score: u32,
}

impl LevelStats {
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a RoundRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.played = stats.played.saturating_add(1);
            match record.outcome() {
                RoundOutcome::Won => stats.won = stats.won.saturating_add(1),
                RoundOutcome::Lost => stats.lost = stats.lost.saturating_add(1),
            }
            stats.best_score = stats.best_score.max(record.score_after());
        }
        stats
    }

    /// Share of played rounds that were won, in `[0, 1]`.
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        if self.played == 0 {
            return 0.0;
        }
        f64::from(self.won) / f64::from(self.played)
    }
}
