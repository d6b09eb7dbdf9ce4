use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::ids::LevelId;

/// The part of a session that outlives a process: which levels are open, how
/// far the player is on each, and where they left off.
///
/// Score is deliberately absent; it is per-level and per-session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub current_level: LevelId,
    pub unlocked: BTreeSet<LevelId>,
    pub level_progress: BTreeMap<LevelId, u8>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn progress_for(&self, level: LevelId) -> u8 {
        self.level_progress.get(&level).copied().unwrap_or(0)
    }
}
