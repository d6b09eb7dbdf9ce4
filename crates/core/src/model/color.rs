use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const MAX_COLOR_NAME_LEN: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ColorError {
    #[error("color name cannot be empty")]
    Empty,

    #[error("color name is too long ({len} > {max})")]
    TooLong { len: usize, max: usize },
}

/// A guessable color.
///
/// Keeps the display form (e.g. `Red`) alongside a case-folded key so that
/// guesses compare regardless of how either side is capitalized.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColorName {
    display: String,
    key: String,
}

impl ColorName {
    /// Validate and normalize a color name.
    ///
    /// # Errors
    ///
    /// Returns `ColorError::Empty` for blank input and `ColorError::TooLong`
    /// past `MAX_COLOR_NAME_LEN` characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, ColorError> {
        let raw = raw.into();
        let display = raw.trim();
        if display.is_empty() {
            return Err(ColorError::Empty);
        }
        let len = display.chars().count();
        if len > MAX_COLOR_NAME_LEN {
            return Err(ColorError::TooLong {
                len,
                max: MAX_COLOR_NAME_LEN,
            });
        }

        Ok(Self {
            display: display.to_owned(),
            key: fold(display),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Case-folded comparison key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// True when `guess` names this color, ignoring surrounding whitespace and case.
    #[must_use]
    pub fn matches(&self, guess: &str) -> bool {
        fold(guess) == self.key
    }
}

pub(crate) fn fold(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl TryFrom<String> for ColorName {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ColorName> for String {
    fn from(value: ColorName) -> Self {
        value.display
    }
}

impl fmt::Debug for ColorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColorName({})", self.display)
    }
}

impl fmt::Display for ColorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_keeps_display_case() {
        let color = ColorName::new("  Turquoise ").unwrap();
        assert_eq!(color.as_str(), "Turquoise");
        assert_eq!(color.key(), "turquoise");
    }

    #[test]
    fn matches_ignore_case_and_whitespace() {
        let color = ColorName::new("Red").unwrap();
        assert!(color.matches("red"));
        assert!(color.matches("  RED\n"));
        assert!(!color.matches("re d"));
        assert!(!color.matches("blue"));
    }

    #[test]
    fn rejects_blank_and_oversized_names() {
        assert_eq!(ColorName::new("   ").unwrap_err(), ColorError::Empty);
        let long = "x".repeat(MAX_COLOR_NAME_LEN + 1);
        assert!(matches!(
            ColorName::new(long).unwrap_err(),
            ColorError::TooLong { .. }
        ));
    }
}
