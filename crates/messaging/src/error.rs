// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessagingError {
    /// The peer did not acknowledge receipt within the configured ack
    /// timeout (spec §4.5: 1 minute for job-start/volume ops/cache-check,
    /// 10 minutes for image download).
    #[error("ack timeout waiting for subject {0}")]
    AckTimeout(String),

    /// The per-step completion deadline elapsed before a reply arrived.
    #[error("deadline exceeded waiting for subject {0}")]
    DeadlineExceeded(String),

    /// A transport-level failure (connection drop, serialization error).
    #[error("io error: {0}")]
    Io(String),
}

impl MessagingError {
    pub fn into_core_error(self) -> cw_core::CoreError {
        match self {
            MessagingError::AckTimeout(_) | MessagingError::DeadlineExceeded(_) => {
                cw_core::CoreError::DeadlineExceeded
            }
            MessagingError::Io(msg) => cw_core::CoreError::io(msg),
        }
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
