// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Persister` capability interface (spec §4.3, §9 "dynamic dispatch").
//!
//! The core never constructs ids — every `create_*` method here is handed
//! the fields of a not-yet-persisted record and returns the full entity
//! with an id assigned by the store.

use async_trait::async_trait;
use cw_core::{
    Job, JobId, JobStatus, OwnerId, PageArgs, Volume, VolumeId, VolumeRequirement, VolumeType,
    Workflow, WorkflowId, WorkflowStatus,
};
use cw_page::Page;

use crate::error::StorageResult;

#[derive(Debug, Clone)]
pub struct NewWorkflow {
    pub owner_id: OwnerId,
    pub name: String,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct NewVolume {
    pub workflow_id: WorkflowId,
    pub name: String,
    pub kind: VolumeType,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub workflow_id: WorkflowId,
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub requires: Vec<JobId>,
    pub volumes: Vec<VolumeRequirement>,
}

/// The persistence operations the workflow core requires (spec §4.3).
///
/// All operations are async so a real driver crate can perform network
/// I/O; this trait carries no transaction semantics of its own — that is
/// an external collaborator's concern (spec §1 Non-goals).
#[async_trait]
pub trait Persister: Send + Sync {
    async fn create_workflow(&self, input: NewWorkflow) -> StorageResult<Workflow>;
    async fn get_workflow(&self, id: &WorkflowId) -> StorageResult<Workflow>;
    async fn delete_workflow(&self, id: &WorkflowId) -> StorageResult<Workflow>;
    async fn list_workflows(&self, args: PageArgs) -> StorageResult<Page<Workflow>>;
    async fn list_workflows_by_owner(
        &self,
        owner_id: &OwnerId,
        args: PageArgs,
    ) -> StorageResult<Page<Workflow>>;
    async fn set_workflow_status(
        &self,
        id: &WorkflowId,
        status: WorkflowStatus,
        at_ms: u64,
    ) -> StorageResult<()>;

    async fn create_job(&self, input: NewJob) -> StorageResult<Job>;
    async fn get_job(&self, id: &JobId) -> StorageResult<Job>;
    async fn list_jobs(&self, args: PageArgs) -> StorageResult<Page<Job>>;
    async fn list_jobs_by_workflow(
        &self,
        workflow_id: &WorkflowId,
        args: PageArgs,
    ) -> StorageResult<Page<Job>>;
    async fn list_jobs_by_ids(
        &self,
        workflow_id: &WorkflowId,
        ids: &[JobId],
        args: PageArgs,
    ) -> StorageResult<Page<Job>>;
    async fn list_jobs_by_owner(&self, owner_id: &OwnerId, args: PageArgs) -> StorageResult<Page<Job>>;
    async fn delete_jobs_by_workflow(&self, workflow_id: &WorkflowId) -> StorageResult<()>;
    async fn set_job_status(&self, id: &JobId, status: JobStatus) -> StorageResult<()>;
    async fn set_job_exit_code(&self, id: &JobId, exit_code: i32) -> StorageResult<()>;

    async fn create_volume(&self, input: NewVolume) -> StorageResult<Volume>;
    async fn list_volumes(&self, args: PageArgs) -> StorageResult<Page<Volume>>;
    async fn list_volumes_by_workflow(
        &self,
        workflow_id: &WorkflowId,
        args: PageArgs,
    ) -> StorageResult<Page<Volume>>;
    async fn list_volumes_by_owner(
        &self,
        owner_id: &OwnerId,
        args: PageArgs,
    ) -> StorageResult<Page<Volume>>;
    async fn delete_volumes_by_workflow(&self, workflow_id: &WorkflowId) -> StorageResult<()>;
}
