use hue_core::model::{GameSession, LevelId, MAX_ATTEMPTS, Phase, RoundId};

/// One entry of the level selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelOption {
    pub id: LevelId,
    pub name: String,
    /// Selectable; locked levels must be shown disabled.
    pub unlocked: bool,
    pub current: bool,
    pub progress: u8,
}

/// Everything a presentation layer needs to draw the game.
///
/// Rebuilt from the session after every controller call. Carries only the
/// data and the feedback line; layout and styling stay with the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub phase: Phase,
    pub round: RoundId,
    pub level: LevelId,
    pub level_name: String,
    pub attempts_remaining: u8,
    pub max_attempts: u8,
    pub score: u32,
    pub level_progress: u8,
    pub feedback: String,
    /// Guesses are accepted.
    pub interactive: bool,
    /// The manual restart control should be visible.
    pub restart_visible: bool,
    /// An automatic restart is scheduled.
    pub restart_pending: bool,
    pub levels: Vec<LevelOption>,
}

impl GameView {
    #[must_use]
    pub fn from_session(session: &GameSession, feedback: &str, restart_pending: bool) -> Self {
        let current = session.current_level();
        let levels = session
            .catalog()
            .levels()
            .iter()
            .map(|level| LevelOption {
                id: level.id(),
                name: level.name().to_owned(),
                unlocked: session.is_unlocked(level.id()),
                current: level.id() == current,
                progress: session.progress_for(level.id()),
            })
            .collect();

        Self {
            phase: session.phase(),
            round: session.round(),
            level: current,
            level_name: session.level().name().to_owned(),
            attempts_remaining: session.attempts_remaining(),
            max_attempts: MAX_ATTEMPTS,
            score: session.score(),
            level_progress: session.progress_for(current),
            feedback: feedback.to_owned(),
            interactive: session.is_interactive(),
            restart_visible: session.restart_available(),
            restart_pending,
            levels,
        }
    }

    /// Ids of the levels that can be selected right now.
    #[must_use]
    pub fn selectable_levels(&self) -> Vec<LevelId> {
        self.levels
            .iter()
            .filter(|option| option.unlocked)
            .map(|option| option.id)
            .collect()
    }
}
