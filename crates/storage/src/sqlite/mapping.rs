use hue_core::model::{LevelId, RoundOutcome};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn level_id_from_i64(v: i64) -> Result<LevelId, StorageError> {
    u32::try_from(v)
        .map(LevelId::new)
        .map_err(|_| StorageError::Serialization(format!("invalid level_id: {v}")))
}

pub(crate) fn level_id_to_i64(level: LevelId) -> i64 {
    i64::from(level.value())
}

pub(crate) fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn parse_outcome(s: &str) -> Result<RoundOutcome, StorageError> {
    match s {
        "won" => Ok(RoundOutcome::Won),
        "lost" => Ok(RoundOutcome::Lost),
        other => Err(StorageError::Serialization(format!(
            "unknown round outcome: {other}"
        ))),
    }
}
