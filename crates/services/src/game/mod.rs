mod controller;
mod restart;
mod view;

// Public API of the game subsystem.
pub use controller::{GameController, GuessReport};
pub use restart::{DEFAULT_RESTART_DELAY, RestartEvents, RestartScheduler, RestartTick};
pub use view::{GameView, LevelOption};
