use std::fmt::Write as _;

use hue_core::model::{LevelId, LevelStats, PROGRESS_CAP, Phase};
use services::{GameView, RoundListItem};
use thiserror::Error;

pub const HELP: &str = "\
Type a color and press Enter to guess.
  :level <id>   switch to an unlocked level (score resets)
  :restart, :r  start a new round once this one is won or lost
  :levels       list levels
  :history      recent rounds
  :help         this text
  :quit, :q     exit";

/// One line of player input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Guess(String),
    Level(LevelId),
    Restart,
    Levels,
    History,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("usage: :level <id>")]
    MissingLevel,

    #[error("'{0}' is not a level number")]
    InvalidLevel(String),

    #[error("unknown command :{0} (try :help)")]
    Unknown(String),
}

impl Command {
    /// Parse a line. Anything not starting with `:` is a guess, blank included.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` for malformed `:` commands.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix(':') else {
            return Ok(Self::Guess(line.to_owned()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        match name.as_str() {
            "level" | "l" => {
                let raw = parts.next().ok_or(CommandError::MissingLevel)?;
                let id = raw
                    .parse::<u32>()
                    .map_err(|_| CommandError::InvalidLevel(raw.to_owned()))?;
                Ok(Self::Level(LevelId::new(id)))
            }
            "restart" | "r" => Ok(Self::Restart),
            "levels" => Ok(Self::Levels),
            "history" | "h" => Ok(Self::History),
            "" | "help" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            _ => Err(CommandError::Unknown(name)),
        }
    }
}

/// Status block printed after every action.
#[must_use]
pub fn render_view(view: &GameView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[level {} {}] score {} | streak {}/{PROGRESS_CAP} | attempts {}/{}",
        view.level,
        view.level_name,
        view.score,
        view.level_progress,
        view.attempts_remaining,
        view.max_attempts,
    );
    let _ = write!(out, "{}", view.feedback);
    match view.phase {
        Phase::Won | Phase::Lost if view.restart_pending => {
            out.push_str("\nA new round starts shortly (or type :restart).");
        }
        Phase::Won | Phase::Lost => out.push_str("\nType :restart to play again."),
        Phase::PreGame => out.push_str("\nType :restart to begin."),
        Phase::Playing => {}
    }
    out
}

#[must_use]
pub fn render_levels(view: &GameView) -> String {
    let mut out = String::from("Levels:");
    for option in &view.levels {
        let marker = if option.current { '>' } else { ' ' };
        let state = if option.unlocked { "" } else { " (locked)" };
        let _ = write!(
            out,
            "\n {marker} {} {} streak {}/{PROGRESS_CAP}{state}",
            option.id, option.name, option.progress
        );
    }
    out
}

#[must_use]
pub fn render_history(items: &[RoundListItem], stats: &LevelStats) -> String {
    if items.is_empty() {
        return "No rounds played yet.".to_owned();
    }
    let mut out = format!(
        "Played {} | won {} | lost {} | win rate {:.0}% | best score {}",
        stats.played,
        stats.won,
        stats.lost,
        stats.win_rate() * 100.0,
        stats.best_score,
    );
    for item in items {
        let _ = write!(
            out,
            "\n  {} level {} {:<10} {} in {} | score {}",
            item.completed_at.format("%Y-%m-%d %H:%M"),
            item.level,
            item.target,
            item.outcome.as_str(),
            item.attempts_used,
            item.score_after,
        );
    }
    out
}
