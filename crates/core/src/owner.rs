// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verified-identity types for the auth gate (spec §4.8).

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Opaque id of the authenticated caller that owns a workflow.
    pub struct OwnerId("own-");
}

/// The identity returned by `Viewer(ctx)`.
///
/// Token verification (signature, issuer, audience, expiry) happens in an
/// external collaborator; by the time a `Viewer` reaches the core it is
/// already trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: OwnerId,
    pub login: String,
}

impl Viewer {
    pub fn new(id: OwnerId, login: impl Into<String>) -> Self {
        Self { id, login: login.into() }
    }
}
