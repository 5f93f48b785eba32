// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Failure kinds for the persistence and log-append contracts (spec §4.3).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("io error: {0}")]
    Io(String),
}

impl StorageError {
    pub fn into_core_error(self) -> cw_core::CoreError {
        match self {
            StorageError::NotFound(id) => cw_core::CoreError::NotFound(id),
            StorageError::InvalidId(id) => cw_core::CoreError::invalid_argument(format!("invalid id: {id}")),
            StorageError::Io(msg) => cw_core::CoreError::io(msg),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
