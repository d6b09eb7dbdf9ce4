mod color;
mod ids;
mod level;
mod progress;
mod round;
mod session;

pub use color::{ColorError, ColorName, MAX_COLOR_NAME_LEN};
pub use ids::{LevelId, RoundId};
pub use level::{Level, LevelCatalog, LevelDraft, LevelError};
pub use progress::ProgressSnapshot;
pub use round::{LevelStats, RoundOutcome, RoundRecord, RoundRecordError};
pub use session::{
    GameError, GameSession, GuessOutcome, MAX_ATTEMPTS, PROGRESS_CAP, Phase, RoundStart,
    WIN_REWARD,
};
