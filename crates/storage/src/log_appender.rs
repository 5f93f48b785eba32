// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The companion log-append contract for job output (spec §4.3, §4.7).

use async_trait::async_trait;
use cw_core::JobId;

use crate::error::StorageResult;

/// An ordered, append-only byte stream per job id. `append` is atomic per
/// call; ordering across calls for the same job id is the caller's
/// responsibility (the Output Ingester serializes per job, spec §4.7).
#[async_trait]
pub trait LogAppender: Send + Sync {
    async fn append(&self, job_id: &JobId, chunk: Vec<u8>) -> StorageResult<()>;
    async fn get(&self, job_id: &JobId) -> StorageResult<Vec<u8>>;
}
