//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted while loading a game or reading history.
///
/// Gameplay rejections are `hue_core::model::GameError` and never appear here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GameServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
