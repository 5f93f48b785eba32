// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Volume entity and its input spec (data model §3).

use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowId;

crate::define_id! {
    /// Opaque id of a volume, unique across the store.
    pub struct VolumeId("vol-");
}

/// `EPHEMERAL` volumes are torn down with the workflow; `PERSISTENT` ones
/// outlive it (the core only tracks the distinction — materialization is
/// the agent's job).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeType {
    Ephemeral,
    Persistent,
}

crate::simple_display! {
    VolumeType {
        Ephemeral => "EPHEMERAL",
        Persistent => "PERSISTENT",
    }
}

impl std::str::FromStr for VolumeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EPHEMERAL" => Ok(Self::Ephemeral),
            "PERSISTENT" => Ok(Self::Persistent),
            other => Err(other.to_string()),
        }
    }
}

/// A named storage volume provisioned alongside a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: VolumeId,
    pub workflow_id: WorkflowId,
    pub name: String,
    pub kind: VolumeType,
    pub created_at_ms: u64,
}

impl cw_page::Identified for Volume {
    fn cursor(&self) -> &str {
        self.id.as_str()
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct VolumeBuilder => Volume {
        into { name: String = "vol" }
        set { kind: VolumeType = VolumeType::Ephemeral }
        set { created_at_ms: u64 = 0 }
        computed { id: VolumeId = VolumeId::new() }
        computed { workflow_id: WorkflowId = WorkflowId::new() }
    }
}

/// Input-only volume declaration inside a `WorkflowSpec` (not persisted
/// as-is; `CreateVolume` turns each of these into a [`Volume`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    /// Raw type string as submitted; validated against [`VolumeType`]
    /// during submission so an unrecognized value surfaces as
    /// `InvalidVolumeType` rather than a deserialization failure.
    #[serde(rename = "type")]
    pub kind: String,
}

/// A job's reference to one of the workflow's volumes, resolved to an id
/// at submission time (spec §3: `{volumeId, name, location}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRequirement {
    pub volume_id: VolumeId,
    pub name: String,
    pub location: String,
}

/// Input-only volume-requirement declaration inside a `JobSpec`, naming a
/// sibling volume by spec name rather than assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRequirementSpec {
    pub name: String,
    pub location: String,
}
