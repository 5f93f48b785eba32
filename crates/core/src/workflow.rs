// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow entity and its input spec (data model §3).

use serde::{Deserialize, Serialize};

use crate::job::JobSpec;
use crate::owner::OwnerId;
use crate::volume::VolumeSpec;

crate::define_id! {
    /// Opaque id of a workflow, unique across the store.
    pub struct WorkflowId("wkf-");
}

/// Forward-only: `CREATED -> SCHEDULED -> RUNNING -> {COMPLETED, FAILED}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowStatus {
    Created,
    Scheduled,
    Running,
    Completed,
    Failed,
}

crate::simple_display! {
    WorkflowStatus {
        Created => "CREATED",
        Scheduled => "SCHEDULED",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

impl WorkflowStatus {
    /// True if `self -> next` is an allowed forward transition.
    pub fn can_advance_to(self, next: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        matches!(
            (self, next),
            (Created, Scheduled) | (Scheduled, Running) | (Running, Completed) | (Running, Failed)
        )
    }
}

/// A named, persisted unit of work consisting of jobs and optional volumes.
///
/// `owner_id` is not in the distilled data model but backs the
/// owner-scoped projections (`ListWorkflowsByOwner`, …) and the ownership
/// check in the auth gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub owner_id: OwnerId,
    pub name: String,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
    pub status: WorkflowStatus,
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct WorkflowBuilder => Workflow {
        into { name: String = "wf" }
        set { created_at_ms: u64 = 0 }
        option { started_at_ms: u64 = None }
        option { finished_at_ms: u64 = None }
        set { status: WorkflowStatus = WorkflowStatus::Created }
        computed { id: WorkflowId = WorkflowId::new() }
        computed { owner_id: OwnerId = OwnerId::new() }
    }
}

impl cw_page::Identified for Workflow {
    fn cursor(&self) -> &str {
        self.id.as_str()
    }
}

/// Input-only workflow specification submitted by a client. Never
/// persisted as-is — `submit_workflow` turns each declared volume/job into
/// a persisted [`crate::volume::Volume`]/[`crate::job::Job`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
}
