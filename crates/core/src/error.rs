// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single error type callers of the workflow core deal with.
//!
//! Every subsystem (graph, storage, messaging) carries its own typed error;
//! this enum is the boundary type they converge into, matching spec §7's
//! behavioral kinds.

use thiserror::Error;

/// Behavioral failure kinds a core operation can return.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No verified identity was present on the request context.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A bad cursor, bad page size, unknown volume type, or unknown
    /// volume/job reference in a spec that doesn't map to a more specific
    /// variant below.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two volume specs in the same submission shared a name.
    #[error("duplicate volume name: {0}")]
    DuplicateVolume(String),

    /// `AddVertex` was called twice with the same id.
    #[error("duplicate job name: {0}")]
    DuplicateVertex(String),

    /// A job's `requires`/volume reference does not resolve within the spec.
    #[error("unknown job reference: {0}")]
    UnknownJobRef(String),

    /// A job's volume-requirement name does not resolve to a declared
    /// workflow volume.
    #[error("unknown volume reference: {0}")]
    UnknownVolumeRef(String),

    /// A volume spec named a `type` that isn't `EPHEMERAL`/`PERSISTENT`.
    #[error("invalid volume type: {0}")]
    InvalidVolumeType(String),

    /// The dependency graph induced by a spec is not acyclic.
    #[error("dependency cycle detected")]
    Cycle,

    /// Get/delete against an id with no matching record.
    #[error("not found: {0}")]
    NotFound(String),

    /// A failure crossing the persistence or messaging boundary.
    #[error("io error: {0}")]
    Io(String),

    /// A timed wait elapsed before the expected event arrived.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl CoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
