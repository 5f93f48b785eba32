// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job entity and its input spec (data model §3).

use serde::{Deserialize, Serialize};

use crate::volume::{VolumeRequirement, VolumeRequirementSpec};
use crate::workflow::WorkflowId;

crate::define_id! {
    /// Opaque id of a job, unique across the store.
    pub struct JobId("job-");
}

/// Forward-only: `CREATED -> RUNNING -> {COMPLETED, FAILED}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Created,
    Running,
    Completed,
    Failed,
}

crate::simple_display! {
    JobStatus {
        Created => "CREATED",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

impl JobStatus {
    /// True if `self -> next` is an allowed forward transition.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Created, Running) | (Running, Completed) | (Running, Failed)
        )
    }

    /// Only `COMPLETED`/`FAILED` jobs have a defined exit code (spec §3).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A single containerized process within a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub workflow_id: WorkflowId,
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    /// Dependency predecessors, by id, within the same workflow.
    pub requires: Vec<JobId>,
    pub volumes: Vec<VolumeRequirement>,
}

impl Job {
    /// Output is only readable once the job has reached `COMPLETED`
    /// (spec §4.5 "Job status finalization"); append continues regardless.
    pub fn output_readable(&self) -> bool {
        matches!(self.status, JobStatus::Completed)
    }
}

impl cw_page::Identified for Job {
    fn cursor(&self) -> &str {
        self.id.as_str()
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct JobBuilder => Job {
        into { name: String = "job" }
        into { image: String = "alpine" }
        set { command: Vec<String> = vec!["true".to_string()] }
        set { status: JobStatus = JobStatus::Created }
        set { exit_code: Option<i32> = None }
        set { requires: Vec<JobId> = Vec::new() }
        set { volumes: Vec<VolumeRequirement> = Vec::new() }
        computed { id: JobId = JobId::new() }
        computed { workflow_id: WorkflowId = WorkflowId::new() }
    }
}

/// Input-only job declaration inside a `WorkflowSpec`, naming dependency
/// predecessors and volumes by sibling spec name rather than assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<VolumeRequirementSpec>,
}
