#![forbid(unsafe_code)]

pub mod error;
pub mod game;
pub mod history;

pub use hue_core::Clock;

pub use error::GameServiceError;
pub use game::{
    DEFAULT_RESTART_DELAY, GameController, GameView, GuessReport, LevelOption, RestartEvents,
    RestartScheduler, RestartTick,
};
pub use history::{RoundHistoryService, RoundListItem};
