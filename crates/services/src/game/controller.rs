use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use hue_core::model::{
    GameError, GameSession, GuessOutcome, LevelCatalog, LevelId, Phase, RoundOutcome,
    RoundRecord, RoundStart,
};
use storage::repository::{ProgressRepository, RoundLogRepository, Storage};

use super::restart::{DEFAULT_RESTART_DELAY, RestartEvents, RestartScheduler, RestartTick};
use super::view::GameView;
use crate::Clock;
use crate::error::GameServiceError;

/// Result of an evaluated guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessReport {
    pub outcome: GuessOutcome,
    pub view: GameView,
    /// Set when a lost round will restart on its own after this delay.
    pub restart_in: Option<Duration>,
}

impl GuessReport {
    /// Level the player should be invited to move on to, once per mastery.
    #[must_use]
    pub fn advance_offer(&self) -> Option<LevelId> {
        match &self.outcome {
            GuessOutcome::Correct { advance_offer, .. } => *advance_offer,
            _ => None,
        }
    }
}

/// Game Session Controller.
///
/// Owned by the presentation layer and driven through `&mut self`: one call
/// runs to completion before the next. Owns the time source, the RNG, the
/// deferred auto-restart, and the persistence hooks; the rules themselves
/// live in [`GameSession`].
pub struct GameController {
    session: GameSession,
    clock: Clock,
    rng: StdRng,
    progress: Arc<dyn ProgressRepository>,
    rounds: Arc<dyn RoundLogRepository>,
    restarts: RestartScheduler,
    events: Option<RestartEvents>,
    auto_restart: Option<Duration>,
    feedback: String,
    round_started_at: Option<DateTime<Utc>>,
}

impl GameController {
    /// Fresh controller in `PreGame`, ignoring any saved progress.
    #[must_use]
    pub fn new(
        catalog: Arc<LevelCatalog>,
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        rounds: Arc<dyn RoundLogRepository>,
    ) -> Self {
        Self::with_session(GameSession::new(catalog), clock, progress, rounds)
    }

    /// Controller restored from saved progress, or fresh if none exists.
    ///
    /// # Errors
    ///
    /// Returns `GameServiceError::Storage` if the saved progress cannot be read.
    pub async fn load(
        catalog: Arc<LevelCatalog>,
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        rounds: Arc<dyn RoundLogRepository>,
    ) -> Result<Self, GameServiceError> {
        let snapshot = progress.load_progress().await?;
        let session = match &snapshot {
            Some(snapshot) => GameSession::from_progress(catalog, snapshot),
            None => GameSession::new(catalog),
        };
        info!(
            level = %session.current_level(),
            unlocked = session.unlocked_levels().len(),
            restored = snapshot.is_some(),
            "game session loaded"
        );
        Ok(Self::with_session(session, clock, progress, rounds))
    }

    /// Shorthand for [`GameController::load`] over a `Storage` bundle.
    ///
    /// # Errors
    ///
    /// Returns `GameServiceError::Storage` if the saved progress cannot be read.
    pub async fn load_from(
        catalog: Arc<LevelCatalog>,
        clock: Clock,
        storage: &Storage,
    ) -> Result<Self, GameServiceError> {
        Self::load(
            catalog,
            clock,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.rounds),
        )
        .await
    }

    fn with_session(
        session: GameSession,
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        rounds: Arc<dyn RoundLogRepository>,
    ) -> Self {
        let (restarts, events) = RestartScheduler::channel();
        Self {
            session,
            clock,
            rng: StdRng::from_os_rng(),
            progress,
            rounds,
            restarts,
            events: Some(events),
            auto_restart: Some(DEFAULT_RESTART_DELAY),
            feedback: "Welcome! Start a round to begin.".to_owned(),
            round_started_at: None,
        }
    }

    /// Use a deterministic RNG.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Set the auto-restart delay; `None` means manual restarts only.
    #[must_use]
    pub fn with_auto_restart(mut self, delay: Option<Duration>) -> Self {
        self.auto_restart = delay;
        self
    }

    /// Hand out the restart tick receiver. Only the first call gets it.
    pub fn take_restart_events(&mut self) -> Option<RestartEvents> {
        self.events.take()
    }

    #[must_use]
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    #[must_use]
    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    #[must_use]
    pub fn restart_pending(&self) -> bool {
        self.restarts.is_pending()
    }

    #[must_use]
    pub fn view(&self) -> GameView {
        GameView::from_session(&self.session, &self.feedback, self.restarts.is_pending())
    }

    /// Manual "play again": begins the first round, or the next one once the
    /// current round is won or lost. Cancels any pending auto-restart.
    ///
    /// # Errors
    ///
    /// Returns `GameError::RoundInProgress` while a round is being played.
    /// The round must end in a win or a loss first.
    pub async fn play_again(&mut self) -> Result<GameView, GameError> {
        match self.session.phase() {
            Phase::PreGame | Phase::Won | Phase::Lost => self.start_round(None).await,
            Phase::Playing => Err(self.reject(GameError::RoundInProgress)),
        }
    }

    /// Start a round, by default in the current level, regardless of phase.
    /// Cancels any pending auto-restart.
    ///
    /// # Errors
    ///
    /// Returns `GameError::LevelLocked` when `level` names a different level
    /// that is not unlocked.
    pub async fn start_round(&mut self, level: Option<LevelId>) -> Result<GameView, GameError> {
        let previous = self.session.current_level();
        let start = match self.session.start_round(level, &mut self.rng) {
            Ok(start) => start,
            Err(err) => return Err(self.reject(err)),
        };
        self.on_round_started(&start);
        if start.level != previous {
            self.persist_progress().await;
        }
        Ok(self.view())
    }

    /// Switch to an unlocked level. Score resets to 0 and a new round starts.
    ///
    /// # Errors
    ///
    /// Returns `GameError::LevelLocked` if the level is not unlocked.
    pub async fn change_level(&mut self, level: LevelId) -> Result<GameView, GameError> {
        let start = match self.session.change_level(level, &mut self.rng) {
            Ok(start) => start,
            Err(err) => return Err(self.reject(err)),
        };
        self.on_round_started(&start);
        self.persist_progress().await;
        Ok(self.view())
    }

    /// Evaluate a guess.
    ///
    /// Resolved rounds are appended to the round log and progress is saved;
    /// a loss also schedules the auto-restart when enabled. Storage failures
    /// are logged and never fail the guess.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InactiveSession` or `GameError::EmptyInput`; the
    /// session is unchanged and the feedback line carries the message.
    pub async fn submit_guess(&mut self, raw: &str) -> Result<GuessReport, GameError> {
        let outcome = match self.session.submit_guess(raw) {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.reject(err)),
        };

        self.feedback = outcome_feedback(&outcome, &self.session);
        debug!(
            round = %self.session.round(),
            phase = outcome.phase().as_str(),
            attempts_remaining = outcome.attempts_remaining(),
            "guess evaluated"
        );

        let mut restart_in = None;
        if outcome.is_resolved() {
            info!(
                round = %self.session.round(),
                level = %self.session.current_level(),
                outcome = outcome.phase().as_str(),
                score = self.session.score(),
                "round resolved"
            );
            self.record_round(&outcome).await;
            self.persist_progress().await;

            if matches!(outcome, GuessOutcome::OutOfAttempts { .. }) {
                if let Some(delay) = self.auto_restart {
                    self.restarts.schedule(self.session.round(), delay);
                    restart_in = Some(delay);
                }
            }
        }

        Ok(GuessReport {
            outcome,
            view: self.view(),
            restart_in,
        })
    }

    /// Apply a restart tick from [`RestartEvents`].
    ///
    /// Returns the new view, or `None` when the tick is stale: cancelled,
    /// superseded, or aimed at a round that is no longer lost.
    pub fn handle_restart(&mut self, tick: RestartTick) -> Option<GameView> {
        if !self.restarts.claim(tick) {
            debug!(round = %tick.round, "ignoring stale restart tick");
            return None;
        }
        if self.session.phase() != Phase::Lost || self.session.round() != tick.round {
            debug!(round = %tick.round, "restart tick no longer applies");
            return None;
        }

        match self.session.start_round(None, &mut self.rng) {
            Ok(start) => {
                self.on_round_started(&start);
                Some(self.view())
            }
            Err(err) => {
                warn!(error = %err, "automatic restart rejected");
                None
            }
        }
    }

    fn reject(&mut self, err: GameError) -> GameError {
        debug!(error = ?err, "input rejected");
        self.feedback = err.to_string();
        err
    }

    fn on_round_started(&mut self, start: &RoundStart) {
        self.restarts.cancel();
        self.round_started_at = Some(self.clock.now());
        self.feedback = format!(
            "Level {} ({}): guess the color! {} attempts left.",
            start.level,
            self.session.level().name(),
            start.attempts_remaining
        );
        info!(round = %start.round, level = %start.level, "round started");
    }

    async fn record_round(&mut self, outcome: &GuessOutcome) {
        let (target, result) = match outcome {
            GuessOutcome::Correct { target, .. } => (target.clone(), RoundOutcome::Won),
            GuessOutcome::OutOfAttempts { target } => (target.clone(), RoundOutcome::Lost),
            GuessOutcome::Incorrect { .. } => return,
        };
        let completed_at = self.clock.now();
        let started_at = self.round_started_at.unwrap_or(completed_at);

        let record = match RoundRecord::new(
            self.session.current_level(),
            target,
            result,
            self.session.attempts_used(),
            self.session.score(),
            started_at,
            completed_at,
        ) {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "round not recorded");
                return;
            }
        };

        if let Err(err) = self.rounds.append_round(&record).await {
            warn!(error = %err, "failed to append round");
        }
    }

    async fn persist_progress(&self) {
        let snapshot = self.session.progress_snapshot();
        if let Err(err) = self.progress.save_progress(&snapshot).await {
            warn!(error = %err, "failed to save progress");
        }
    }
}

fn outcome_feedback(outcome: &GuessOutcome, session: &GameSession) -> String {
    let mut message = outcome.message();
    if let GuessOutcome::Correct {
        unlocked,
        advance_offer,
        ..
    } = outcome
    {
        if let Some(level) = unlocked {
            let name = session
                .catalog()
                .get(*level)
                .map_or("next", |level| level.name());
            message.push_str(&format!(" Level {level} ({name}) unlocked!"));
        }
        if let Some(level) = advance_offer {
            message.push_str(&format!(" Ready to move on to level {level}?"));
        }
    }
    message
}

impl fmt::Debug for GameController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameController")
            .field("session", &self.session)
            .field("clock", &self.clock)
            .field("auto_restart", &self.auto_restart)
            .field("restart_pending", &self.restarts.is_pending())
            .field("round_started_at", &self.round_started_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hue_core::model::{ColorName, Level, ProgressSnapshot, WIN_REWARD};
    use hue_core::time::fixed_clock;
    use storage::repository::{InMemoryRepository, RoundRow, RoundRowId, StorageError};

    fn catalog() -> Arc<LevelCatalog> {
        let level = |id: u32, name: &str, color: &str| {
            Level::new(LevelId::new(id), name, vec![ColorName::new(color).unwrap()]).unwrap()
        };
        Arc::new(LevelCatalog::new(vec![level(1, "One", "Red"), level(2, "Two", "Blue")]).unwrap())
    }

    fn controller(repo: &InMemoryRepository) -> GameController {
        GameController::new(
            catalog(),
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
        .with_seed(9)
    }

    struct BrokenRepository;

    #[async_trait]
    impl ProgressRepository for BrokenRepository {
        async fn load_progress(&self) -> Result<Option<ProgressSnapshot>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn save_progress(&self, _snapshot: &ProgressSnapshot) -> Result<(), StorageError> {
            Err(StorageError::Connection("offline".into()))
        }
    }

    #[async_trait]
    impl RoundLogRepository for BrokenRepository {
        async fn append_round(&self, _record: &RoundRecord) -> Result<RoundRowId, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn recent_rounds(
            &self,
            _level: Option<LevelId>,
            _limit: u32,
        ) -> Result<Vec<RoundRow>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }
    }

    #[tokio::test]
    async fn rejection_sets_feedback_without_mutation() {
        let repo = InMemoryRepository::new();
        let mut game = controller(&repo);

        let err = game.submit_guess("red").await.unwrap_err();
        assert!(matches!(err, GameError::InactiveSession { .. }));
        assert_eq!(game.feedback(), err.to_string());
        assert_eq!(game.session().phase(), Phase::PreGame);

        game.start_round(None).await.unwrap();
        let err = game.submit_guess("  ").await.unwrap_err();
        assert_eq!(err, GameError::EmptyInput);
        assert_eq!(game.view().attempts_remaining, 3);
    }

    #[tokio::test]
    async fn win_records_round_and_saves_progress() {
        let repo = InMemoryRepository::new();
        let mut game = controller(&repo);
        game.start_round(None).await.unwrap();

        let report = game.submit_guess("RED").await.unwrap();
        assert_eq!(report.view.phase, Phase::Won);
        assert_eq!(report.view.score, WIN_REWARD);
        assert!(report.view.restart_visible);
        assert!(report.restart_in.is_none());

        let rounds = repo.recent_rounds(None, 10).await.unwrap();
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].record.outcome(), RoundOutcome::Won);
        assert_eq!(rounds[0].record.attempts_used(), 1);

        let saved = repo.load_progress().await.unwrap().unwrap();
        assert_eq!(saved.progress_for(LevelId::new(1)), 1);
    }

    #[tokio::test]
    async fn storage_failures_do_not_fail_guesses() {
        let broken = Arc::new(BrokenRepository);
        let mut game =
            GameController::new(catalog(), fixed_clock(), broken.clone(), broken).with_seed(1);
        game.start_round(None).await.unwrap();
        let report = game.submit_guess("red").await.unwrap();
        assert_eq!(report.view.phase, Phase::Won);
    }

    #[tokio::test]
    async fn load_surfaces_storage_errors() {
        let broken = Arc::new(BrokenRepository);
        let err = GameController::load(catalog(), fixed_clock(), broken.clone(), broken)
            .await
            .unwrap_err();
        assert!(matches!(err, GameServiceError::Storage(_)));
    }

    #[tokio::test]
    async fn mastering_a_level_offers_advance_once() {
        let repo = InMemoryRepository::new();
        let mut game = controller(&repo);

        let mut offers = Vec::new();
        for _ in 0..4 {
            game.start_round(None).await.unwrap();
            let report = game.submit_guess("red").await.unwrap();
            offers.push(report.advance_offer());
        }
        assert_eq!(offers, vec![None, None, Some(LevelId::new(2)), None]);
        assert!(game.view().selectable_levels().contains(&LevelId::new(2)));
        assert!(game.feedback().contains("Correct"));

        let view = game.change_level(LevelId::new(2)).await.unwrap();
        assert_eq!(view.score, 0);
        assert_eq!(view.level, LevelId::new(2));
        assert!(view.interactive);
    }

    #[tokio::test]
    async fn locked_level_change_is_rejected() {
        let repo = InMemoryRepository::new();
        let mut game = controller(&repo);
        game.start_round(None).await.unwrap();

        let err = game.change_level(LevelId::new(2)).await.unwrap_err();
        assert_eq!(
            err,
            GameError::LevelLocked {
                level: LevelId::new(2)
            }
        );
        assert_eq!(game.feedback(), "Level 2 is locked.");
        assert_eq!(game.session().current_level(), LevelId::new(1));
    }

    #[tokio::test(start_paused = true)]
    async fn loss_schedules_restart_and_tick_starts_new_round() {
        let repo = InMemoryRepository::new();
        let mut game = controller(&repo);
        let mut events = game.take_restart_events().unwrap();
        assert!(game.take_restart_events().is_none());

        game.start_round(None).await.unwrap();
        let lost_round = game.session().round();
        for guess in ["green", "blue", "pink"] {
            game.submit_guess(guess).await.unwrap();
        }
        let view = game.view();
        assert_eq!(view.phase, Phase::Lost);
        assert!(view.restart_pending);
        assert!(view.feedback.contains("Red"));

        let tick = events.recv().await.unwrap();
        assert_eq!(tick.round, lost_round);
        let view = game.handle_restart(tick).unwrap();
        assert_eq!(view.phase, Phase::Playing);
        assert_eq!(view.attempts_remaining, 3);
        assert!(view.round > lost_round);
        assert!(!view.restart_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_restart_cancels_pending_restart() {
        let repo = InMemoryRepository::new();
        let mut game = controller(&repo);
        let mut events = game.take_restart_events().unwrap();

        game.start_round(None).await.unwrap();
        for guess in ["a", "b", "c"] {
            game.submit_guess(guess).await.unwrap();
        }
        assert!(game.restart_pending());

        game.start_round(None).await.unwrap();
        assert!(!game.restart_pending());
        let round = game.session().round();

        let waited = tokio::time::timeout(Duration::from_secs(30), events.recv()).await;
        assert!(waited.is_err(), "cancelled restart must not fire");
        assert_eq!(game.session().round(), round);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_tick_is_ignored_after_level_change() {
        let repo = InMemoryRepository::new();
        let mut game = controller(&repo).with_auto_restart(Some(Duration::from_millis(50)));
        let mut events = game.take_restart_events().unwrap();

        // Unlock level 2.
        for _ in 0..3 {
            game.start_round(None).await.unwrap();
            game.submit_guess("red").await.unwrap();
        }
        game.start_round(None).await.unwrap();
        for guess in ["a", "b", "c"] {
            game.submit_guess(guess).await.unwrap();
        }
        // Let the tick land in the channel before the player acts.
        let tick = events.recv().await.unwrap();

        game.change_level(LevelId::new(2)).await.unwrap();
        let round = game.session().round();
        assert!(game.handle_restart(tick).is_none());
        assert_eq!(game.session().round(), round);
        assert_eq!(game.session().phase(), Phase::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_only_mode_never_schedules() {
        let repo = InMemoryRepository::new();
        let mut game = controller(&repo).with_auto_restart(None);
        let mut events = game.take_restart_events().unwrap();

        game.start_round(None).await.unwrap();
        let mut last = None;
        for guess in ["a", "b", "c"] {
            last = Some(game.submit_guess(guess).await.unwrap());
        }
        assert!(last.unwrap().restart_in.is_none());
        assert!(!game.restart_pending());
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn play_again_refuses_to_abandon_a_round_in_progress() {
        let repo = InMemoryRepository::new();
        let mut game = controller(&repo).with_auto_restart(None);

        // PreGame: play again begins the first round.
        let view = game.play_again().await.unwrap();
        assert_eq!(view.phase, Phase::Playing);

        // Two wins, then two misses with one attempt left.
        game.submit_guess("red").await.unwrap();
        game.play_again().await.unwrap();
        game.submit_guess("red").await.unwrap();
        game.play_again().await.unwrap();
        game.submit_guess("green").await.unwrap();
        game.submit_guess("blue").await.unwrap();
        let round = game.session().round();
        assert_eq!(game.view().attempts_remaining, 1);
        assert!(!game.view().restart_visible);

        let err = game.play_again().await.unwrap_err();
        assert_eq!(err, GameError::RoundInProgress);
        assert_eq!(game.feedback(), "Finish this round first.");
        assert_eq!(game.session().round(), round);
        assert_eq!(game.session().phase(), Phase::Playing);
        assert_eq!(game.view().attempts_remaining, 1);

        // The round still has to be played out; a miss is a loss.
        game.submit_guess("pink").await.unwrap();
        assert_eq!(game.session().phase(), Phase::Lost);
        assert_eq!(game.session().progress_for(LevelId::new(1)), 0);
        assert!(!game.session().is_unlocked(LevelId::new(2)));

        let view = game.play_again().await.unwrap();
        assert_eq!(view.phase, Phase::Playing);
        assert!(view.round > round);
    }

    #[tokio::test]
    async fn load_restores_saved_progress() {
        let repo = InMemoryRepository::new();
        {
            let mut game = controller(&repo);
            for _ in 0..3 {
                game.start_round(None).await.unwrap();
                game.submit_guess("red").await.unwrap();
            }
            game.change_level(LevelId::new(2)).await.unwrap();
        }

        let game = GameController::load(
            catalog(),
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
        .await
        .unwrap();
        assert_eq!(game.session().current_level(), LevelId::new(2));
        assert!(game.session().is_unlocked(LevelId::new(2)));
        assert_eq!(game.session().progress_for(LevelId::new(1)), 3);
        assert_eq!(game.session().phase(), Phase::PreGame);
    }
}
