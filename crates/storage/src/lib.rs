#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, ProgressRepository, RoundLogRepository, RoundRow, Storage, StorageError,
};
