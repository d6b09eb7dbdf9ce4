use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::color::{ColorError, ColorName};
use crate::model::ids::LevelId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LevelError {
    #[error("level name cannot be empty")]
    EmptyName,

    #[error("level {level} has no colors")]
    NoColors { level: LevelId },

    #[error("level {level} lists color {color} more than once")]
    DuplicateColor { level: LevelId, color: String },

    #[error("level {level} has an invalid color: {source}")]
    InvalidColor {
        level: LevelId,
        #[source]
        source: ColorError,
    },

    #[error("level {0} is defined more than once")]
    DuplicateLevel(LevelId),

    #[error("catalog must contain at least one level")]
    EmptyCatalog,
}

//
// ─── LEVEL ─────────────────────────────────────────────────────────────────────
//

/// A difficulty tier with its own fixed set of guess targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    id: LevelId,
    name: String,
    colors: Vec<ColorName>,
}

impl Level {
    /// Creates a level.
    ///
    /// # Errors
    ///
    /// Returns `LevelError` when the name is blank, the color set is empty, or
    /// two colors share the same case-folded name.
    pub fn new(
        id: LevelId,
        name: impl Into<String>,
        colors: Vec<ColorName>,
    ) -> Result<Self, LevelError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(LevelError::EmptyName);
        }
        if colors.is_empty() {
            return Err(LevelError::NoColors { level: id });
        }

        let mut seen = HashSet::with_capacity(colors.len());
        for color in &colors {
            if !seen.insert(color.key()) {
                return Err(LevelError::DuplicateColor {
                    level: id,
                    color: color.as_str().to_owned(),
                });
            }
        }

        Ok(Self { id, name, colors })
    }

    #[must_use]
    pub fn id(&self) -> LevelId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn colors(&self) -> &[ColorName] {
        &self.colors
    }

    /// Picks a target uniformly at random.
    pub fn pick_target<R: Rng + ?Sized>(&self, rng: &mut R) -> &ColorName {
        // `colors` is non-empty by construction.
        let idx = rng.random_range(0..self.colors.len());
        &self.colors[idx]
    }
}

/// Unvalidated level definition, as read from config files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDraft {
    pub id: LevelId,
    pub name: String,
    pub colors: Vec<String>,
}

impl LevelDraft {
    /// Validate the draft into a `Level`.
    ///
    /// # Errors
    ///
    /// Returns `LevelError` for invalid names or colors.
    pub fn validate(self) -> Result<Level, LevelError> {
        let level = self.id;
        let colors = self
            .colors
            .into_iter()
            .map(|raw| {
                ColorName::new(raw).map_err(|source| LevelError::InvalidColor { level, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Level::new(self.id, self.name, colors)
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Ordered, non-empty set of levels.
///
/// The first level is always playable; each later level is unlocked by
/// mastering the one before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCatalog {
    levels: Vec<Level>,
}

impl LevelCatalog {
    /// Build a catalog, ordering levels by id.
    ///
    /// # Errors
    ///
    /// Returns `LevelError::EmptyCatalog` for an empty list and
    /// `LevelError::DuplicateLevel` when two levels share an id.
    pub fn new(mut levels: Vec<Level>) -> Result<Self, LevelError> {
        if levels.is_empty() {
            return Err(LevelError::EmptyCatalog);
        }
        levels.sort_by_key(Level::id);
        for pair in levels.windows(2) {
            if pair[0].id() == pair[1].id() {
                return Err(LevelError::DuplicateLevel(pair[0].id()));
            }
        }
        Ok(Self { levels })
    }

    /// Validate a list of drafts into a catalog.
    ///
    /// # Errors
    ///
    /// Returns the first `LevelError` encountered.
    pub fn from_drafts(drafts: Vec<LevelDraft>) -> Result<Self, LevelError> {
        let levels = drafts
            .into_iter()
            .map(LevelDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(levels)
    }

    /// The built-in three-tier catalog.
    #[must_use]
    pub fn standard() -> Self {
        let tiers: [(u32, &str, &[&str]); 3] = [
            (1, "Primary", &["Red", "Blue", "Yellow", "Green"]),
            (
                2,
                "Secondary",
                &["Orange", "Purple", "Pink", "Brown", "Black", "White"],
            ),
            (
                3,
                "Spectrum",
                &[
                    "Cyan",
                    "Magenta",
                    "Teal",
                    "Maroon",
                    "Navy",
                    "Olive",
                    "Lime",
                    "Indigo",
                    "Violet",
                    "Turquoise",
                ],
            ),
        ];

        let levels = tiers
            .iter()
            .filter_map(|(id, name, colors)| {
                let colors = colors
                    .iter()
                    .filter_map(|c| ColorName::new(*c).ok())
                    .collect();
                Level::new(LevelId::new(*id), *name, colors).ok()
            })
            .collect();
        Self { levels }
    }

    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    #[must_use]
    pub fn first(&self) -> &Level {
        &self.levels[0]
    }

    #[must_use]
    pub fn get(&self, id: LevelId) -> Option<&Level> {
        self.levels.iter().find(|level| level.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: LevelId) -> bool {
        self.get(id).is_some()
    }

    /// The level unlocked by mastering `id`, if any.
    #[must_use]
    pub fn next_after(&self, id: LevelId) -> Option<&Level> {
        let idx = self.levels.iter().position(|level| level.id() == id)?;
        self.levels.get(idx + 1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl Default for LevelCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
