use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::model::color::ColorName;
use crate::model::ids::{LevelId, RoundId};
use crate::model::level::{Level, LevelCatalog};
use crate::model::progress::ProgressSnapshot;

/// Guesses allowed per round.
pub const MAX_ATTEMPTS: u8 = 3;

/// Points awarded for a won round.
pub const WIN_REWARD: u32 = 10;

/// Consecutive wins needed to master a level.
pub const PROGRESS_CAP: u8 = 3;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejected controller input. None of these mutate the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GameError {
    #[error("This round is over. Start a new round to keep playing.")]
    InactiveSession { phase: Phase },

    #[error("Please enter a color before guessing.")]
    EmptyInput,

    #[error("Level {level} is locked.")]
    LevelLocked { level: LevelId },

    #[error("Finish this round first.")]
    RoundInProgress,
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No round has been started yet.
    PreGame,
    Playing,
    Won,
    Lost,
}

impl Phase {
    /// A round finished, either way.
    #[must_use]
    pub fn is_resolved(self) -> bool {
        matches!(self, Phase::Won | Phase::Lost)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::PreGame => "pre-game",
            Phase::Playing => "playing",
            Phase::Won => "won",
            Phase::Lost => "lost",
        }
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Returned by every successful round start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStart {
    pub round: RoundId,
    pub level: LevelId,
    pub attempts_remaining: u8,
}

/// Result of an evaluated (non-empty, in-round) guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    Correct {
        target: ColorName,
        attempts_remaining: u8,
        reward: u32,
        score: u32,
        progress: u8,
        /// Level opened by this win, if it was the one that reached the cap.
        unlocked: Option<LevelId>,
        /// One-time suggestion to move on to the next level.
        advance_offer: Option<LevelId>,
    },
    Incorrect {
        guess: String,
        attempts_remaining: u8,
    },
    OutOfAttempts {
        target: ColorName,
    },
}

impl GuessOutcome {
    /// The phase this outcome left the session in.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            GuessOutcome::Correct { .. } => Phase::Won,
            GuessOutcome::Incorrect { .. } => Phase::Playing,
            GuessOutcome::OutOfAttempts { .. } => Phase::Lost,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.phase().is_resolved()
    }

    #[must_use]
    pub fn attempts_remaining(&self) -> u8 {
        match self {
            GuessOutcome::Correct {
                attempts_remaining, ..
            }
            | GuessOutcome::Incorrect {
                attempts_remaining, ..
            } => *attempts_remaining,
            GuessOutcome::OutOfAttempts { .. } => 0,
        }
    }

    /// Player-facing feedback line.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            GuessOutcome::Correct { target, reward, .. } => {
                format!("Correct! The color was {target}. +{reward} points.")
            }
            GuessOutcome::Incorrect {
                attempts_remaining: 1,
                ..
            } => "Incorrect, 1 attempt remains.".to_owned(),
            GuessOutcome::Incorrect {
                attempts_remaining, ..
            } => format!("Incorrect, {attempts_remaining} attempts remain."),
            GuessOutcome::OutOfAttempts { target } => {
                format!("Out of attempts! The color was {target}.")
            }
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Round/session state machine for the color-guessing game.
///
/// `PreGame → Playing → {Won, Lost} → Playing`. The session never touches
/// time or storage; callers pass in the RNG and persist snapshots themselves.
#[derive(Clone)]
pub struct GameSession {
    catalog: Arc<LevelCatalog>,
    round: RoundId,
    target: Option<ColorName>,
    attempts_remaining: u8,
    phase: Phase,
    score: u32,
    current_level: LevelId,
    level_progress: BTreeMap<LevelId, u8>,
    unlocked: BTreeSet<LevelId>,
    advance_offered: bool,
}

impl GameSession {
    /// Fresh session positioned on the first level, nothing else unlocked.
    #[must_use]
    pub fn new(catalog: Arc<LevelCatalog>) -> Self {
        let first = catalog.first().id();
        Self {
            catalog,
            round: RoundId::default(),
            target: None,
            attempts_remaining: MAX_ATTEMPTS,
            phase: Phase::PreGame,
            score: 0,
            current_level: first,
            level_progress: BTreeMap::new(),
            unlocked: BTreeSet::from([first]),
            advance_offered: false,
        }
    }

    /// Rebuild a session from persisted progress.
    ///
    /// Unknown level ids are dropped, progress is clamped to `PROGRESS_CAP`,
    /// the first level is always unlocked, and a current level that is not
    /// unlocked falls back to the first level.
    #[must_use]
    pub fn from_progress(catalog: Arc<LevelCatalog>, snapshot: &ProgressSnapshot) -> Self {
        let mut session = Self::new(catalog);

        for level in &snapshot.unlocked {
            if session.catalog.contains(*level) {
                session.unlocked.insert(*level);
            }
        }
        for (level, wins) in &snapshot.level_progress {
            if session.catalog.contains(*level) {
                session
                    .level_progress
                    .insert(*level, (*wins).min(PROGRESS_CAP));
            }
        }
        // A mastered level always opens its successor.
        let mastered: Vec<LevelId> = session
            .level_progress
            .iter()
            .filter(|(_, wins)| **wins >= PROGRESS_CAP)
            .map(|(level, _)| *level)
            .collect();
        for level in mastered {
            if let Some(next) = session.catalog.next_after(level) {
                session.unlocked.insert(next.id());
            }
        }

        if session.unlocked.contains(&snapshot.current_level) {
            session.current_level = snapshot.current_level;
        }
        session
    }

    #[must_use]
    pub fn progress_snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            current_level: self.current_level,
            unlocked: self.unlocked.clone(),
            level_progress: self.level_progress.clone(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn round(&self) -> RoundId {
        self.round
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn attempts_remaining(&self) -> u8 {
        self.attempts_remaining
    }

    /// Attempts consumed in the current round.
    #[must_use]
    pub fn attempts_used(&self) -> u8 {
        MAX_ATTEMPTS.saturating_sub(self.attempts_remaining)
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn current_level(&self) -> LevelId {
        self.current_level
    }

    /// The active level's definition.
    #[must_use]
    pub fn level(&self) -> &Level {
        self.catalog
            .get(self.current_level)
            .unwrap_or_else(|| self.catalog.first())
    }

    /// The secret for the current round. `None` before the first round.
    #[must_use]
    pub fn target(&self) -> Option<&ColorName> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn progress_for(&self, level: LevelId) -> u8 {
        self.level_progress.get(&level).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn unlocked_levels(&self) -> &BTreeSet<LevelId> {
        &self.unlocked
    }

    #[must_use]
    pub fn is_unlocked(&self, level: LevelId) -> bool {
        self.unlocked.contains(&level)
    }

    #[must_use]
    pub fn advance_offered(&self) -> bool {
        self.advance_offered
    }

    /// Whether guesses are currently accepted.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.phase == Phase::Playing
    }

    /// Whether a manual restart should be offered.
    #[must_use]
    pub fn restart_available(&self) -> bool {
        self.phase.is_resolved()
    }

    /// Start a round.
    ///
    /// `None` or the current level restarts in place. Any other level goes
    /// through [`GameSession::change_level`], which validates the unlock and
    /// resets the score.
    ///
    /// # Errors
    ///
    /// Returns `GameError::LevelLocked` only when switching to a level that is
    /// not unlocked.
    pub fn start_round<R: Rng + ?Sized>(
        &mut self,
        level: Option<LevelId>,
        rng: &mut R,
    ) -> Result<RoundStart, GameError> {
        match level {
            Some(level) if level != self.current_level => self.change_level(level, rng),
            _ => Ok(self.begin_round(rng)),
        }
    }

    /// Switch to another unlocked level and start a round there.
    ///
    /// Score always drops to 0, even when re-selecting the current level.
    ///
    /// # Errors
    ///
    /// Returns `GameError::LevelLocked` if `level` is not unlocked (unknown ids
    /// are never unlocked).
    pub fn change_level<R: Rng + ?Sized>(
        &mut self,
        level: LevelId,
        rng: &mut R,
    ) -> Result<RoundStart, GameError> {
        if !self.unlocked.contains(&level) {
            return Err(GameError::LevelLocked { level });
        }
        self.current_level = level;
        self.score = 0;
        self.advance_offered = false;
        Ok(self.begin_round(rng))
    }

    fn begin_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> RoundStart {
        let target = self.level().pick_target(rng).clone();
        self.target = Some(target);
        self.attempts_remaining = MAX_ATTEMPTS;
        self.phase = Phase::Playing;
        self.round = self.round.next();

        RoundStart {
            round: self.round,
            level: self.current_level,
            attempts_remaining: self.attempts_remaining,
        }
    }

    /// Evaluate a guess against the current target.
    ///
    /// The attempt is consumed before correctness is checked, and correctness
    /// is checked before exhaustion, so a right answer on the last attempt wins.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InactiveSession` outside `Playing` and
    /// `GameError::EmptyInput` for blank input. Neither mutates the session.
    pub fn submit_guess(&mut self, raw: &str) -> Result<GuessOutcome, GameError> {
        if self.phase != Phase::Playing {
            return Err(GameError::InactiveSession { phase: self.phase });
        }
        let guess = raw.trim();
        if guess.is_empty() {
            return Err(GameError::EmptyInput);
        }
        let Some(target) = self.target.clone() else {
            return Err(GameError::InactiveSession { phase: self.phase });
        };

        self.attempts_remaining = self.attempts_remaining.saturating_sub(1);

        if target.matches(guess) {
            return Ok(self.record_win(target));
        }

        if self.attempts_remaining > 0 {
            return Ok(GuessOutcome::Incorrect {
                guess: guess.to_owned(),
                attempts_remaining: self.attempts_remaining,
            });
        }

        self.phase = Phase::Lost;
        self.level_progress.insert(self.current_level, 0);
        Ok(GuessOutcome::OutOfAttempts { target })
    }

    fn record_win(&mut self, target: ColorName) -> GuessOutcome {
        self.phase = Phase::Won;
        self.score = self.score.saturating_add(WIN_REWARD);

        let before = self.progress_for(self.current_level);
        let after = before.saturating_add(1).min(PROGRESS_CAP);
        self.level_progress.insert(self.current_level, after);

        let next = self.catalog.next_after(self.current_level).map(Level::id);
        let mut unlocked = None;
        let mut advance_offer = None;
        if after == PROGRESS_CAP {
            if let Some(next) = next {
                if self.unlocked.insert(next) {
                    unlocked = Some(next);
                }
                if before < PROGRESS_CAP && !self.advance_offered {
                    self.advance_offered = true;
                    advance_offer = Some(next);
                }
            }
        }

        GuessOutcome::Correct {
            target,
            attempts_remaining: self.attempts_remaining,
            reward: WIN_REWARD,
            score: self.score,
            progress: after,
            unlocked,
            advance_offer,
        }
    }
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The target is left out so logs never leak the answer.
        f.debug_struct("GameSession")
            .field("round", &self.round)
            .field("phase", &self.phase)
            .field("attempts_remaining", &self.attempts_remaining)
            .field("score", &self.score)
            .field("current_level", &self.current_level)
            .field("level_progress", &self.level_progress)
            .field("unlocked", &self.unlocked)
            .field("advance_offered", &self.advance_offered)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
