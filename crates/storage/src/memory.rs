// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reference implementation of [`Persister`] and [`LogAppender`].
//!
//! Backs unit/integration tests and doubles as the development default
//! before a real driver crate is wired in. Grounded on the teacher's
//! `MaterializedState` in-memory-map approach, simplified from WAL replay
//! to direct mutation since this contract owns no durability story of its
//! own (spec §4.3, §9 "dynamic dispatch").

use std::collections::HashMap;
use std::collections::HashSet;

use async_trait::async_trait;
use cw_core::{
    Job, JobId, JobStatus, OwnerId, PageArgs, Volume, VolumeId, Workflow, WorkflowId, WorkflowStatus,
};
use cw_page::Page;
use parking_lot::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::log_appender::LogAppender;
use crate::persister::{NewJob, NewVolume, NewWorkflow, Persister};

const MAX_PAGE_SIZE: usize = 100;

#[derive(Default)]
struct State {
    workflows: HashMap<WorkflowId, Workflow>,
    jobs: HashMap<JobId, Job>,
    volumes: HashMap<VolumeId, Volume>,
    logs: HashMap<JobId, Vec<u8>>,
}

/// A `HashMap`-backed store safe for concurrent use from multiple
/// execution tasks (spec §5 "shared resources").
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn owned_workflow_ids(&self, owner_id: &OwnerId) -> HashSet<WorkflowId> {
        self.state
            .read()
            .workflows
            .values()
            .filter(|w| &w.owner_id == owner_id)
            .map(|w| w.id)
            .collect()
    }
}

#[async_trait]
impl Persister for MemoryStore {
    async fn create_workflow(&self, input: NewWorkflow) -> StorageResult<Workflow> {
        let workflow = Workflow {
            id: WorkflowId::new(),
            owner_id: input.owner_id,
            name: input.name,
            created_at_ms: input.created_at_ms,
            started_at_ms: None,
            finished_at_ms: None,
            status: WorkflowStatus::Created,
        };
        self.state.write().workflows.insert(workflow.id, workflow.clone());
        Ok(workflow)
    }

    async fn get_workflow(&self, id: &WorkflowId) -> StorageResult<Workflow> {
        self.state
            .read()
            .workflows
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn delete_workflow(&self, id: &WorkflowId) -> StorageResult<Workflow> {
        self.state
            .write()
            .workflows
            .remove(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn list_workflows(&self, args: PageArgs) -> StorageResult<Page<Workflow>> {
        let records: Vec<Workflow> = self.state.read().workflows.values().cloned().collect();
        cw_page::paginate(MAX_PAGE_SIZE, records, |_| true, args)
            .map_err(|e| StorageError::InvalidId(e.to_string()))
    }

    async fn list_workflows_by_owner(
        &self,
        owner_id: &OwnerId,
        args: PageArgs,
    ) -> StorageResult<Page<Workflow>> {
        let records: Vec<Workflow> = self.state.read().workflows.values().cloned().collect();
        let owner_id = *owner_id;
        cw_page::paginate(MAX_PAGE_SIZE, records, |w| w.owner_id == owner_id, args)
            .map_err(|e| StorageError::InvalidId(e.to_string()))
    }

    async fn set_workflow_status(
        &self,
        id: &WorkflowId,
        status: WorkflowStatus,
        at_ms: u64,
    ) -> StorageResult<()> {
        let mut state = self.state.write();
        let workflow =
            state.workflows.get_mut(id).ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        workflow.status = status;
        if status == WorkflowStatus::Running {
            workflow.started_at_ms.get_or_insert(at_ms);
        }
        if matches!(status, WorkflowStatus::Completed | WorkflowStatus::Failed) {
            workflow.finished_at_ms.get_or_insert(at_ms);
        }
        Ok(())
    }

    async fn create_job(&self, input: NewJob) -> StorageResult<Job> {
        let job = Job {
            id: JobId::new(),
            workflow_id: input.workflow_id,
            name: input.name,
            image: input.image,
            command: input.command,
            status: JobStatus::Created,
            exit_code: None,
            requires: input.requires,
            volumes: input.volumes,
        };
        self.state.write().jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: &JobId) -> StorageResult<Job> {
        self.state.read().jobs.get(id).cloned().ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn list_jobs(&self, args: PageArgs) -> StorageResult<Page<Job>> {
        let records: Vec<Job> = self.state.read().jobs.values().cloned().collect();
        cw_page::paginate(MAX_PAGE_SIZE, records, |_| true, args)
            .map_err(|e| StorageError::InvalidId(e.to_string()))
    }

    async fn list_jobs_by_workflow(
        &self,
        workflow_id: &WorkflowId,
        args: PageArgs,
    ) -> StorageResult<Page<Job>> {
        let records: Vec<Job> = self.state.read().jobs.values().cloned().collect();
        let workflow_id = *workflow_id;
        cw_page::paginate(MAX_PAGE_SIZE, records, |j| j.workflow_id == workflow_id, args)
            .map_err(|e| StorageError::InvalidId(e.to_string()))
    }

    async fn list_jobs_by_ids(
        &self,
        workflow_id: &WorkflowId,
        ids: &[JobId],
        args: PageArgs,
    ) -> StorageResult<Page<Job>> {
        let id_set: HashSet<JobId> = ids.iter().copied().collect();
        let records: Vec<Job> = self.state.read().jobs.values().cloned().collect();
        let workflow_id = *workflow_id;
        cw_page::paginate(
            MAX_PAGE_SIZE,
            records,
            move |j| j.workflow_id == workflow_id && id_set.contains(&j.id),
            args,
        )
        .map_err(|e| StorageError::InvalidId(e.to_string()))
    }

    async fn list_jobs_by_owner(&self, owner_id: &OwnerId, args: PageArgs) -> StorageResult<Page<Job>> {
        let workflow_ids = self.owned_workflow_ids(owner_id);
        let records: Vec<Job> = self.state.read().jobs.values().cloned().collect();
        cw_page::paginate(MAX_PAGE_SIZE, records, move |j| workflow_ids.contains(&j.workflow_id), args)
            .map_err(|e| StorageError::InvalidId(e.to_string()))
    }

    async fn delete_jobs_by_workflow(&self, workflow_id: &WorkflowId) -> StorageResult<()> {
        self.state.write().jobs.retain(|_, j| &j.workflow_id != workflow_id);
        Ok(())
    }

    async fn set_job_status(&self, id: &JobId, status: JobStatus) -> StorageResult<()> {
        let mut state = self.state.write();
        let job = state.jobs.get_mut(id).ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        job.status = status;
        Ok(())
    }

    async fn set_job_exit_code(&self, id: &JobId, exit_code: i32) -> StorageResult<()> {
        let mut state = self.state.write();
        let job = state.jobs.get_mut(id).ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        job.exit_code = Some(exit_code);
        Ok(())
    }

    async fn create_volume(&self, input: NewVolume) -> StorageResult<Volume> {
        let volume = Volume {
            id: VolumeId::new(),
            workflow_id: input.workflow_id,
            name: input.name,
            kind: input.kind,
            created_at_ms: input.created_at_ms,
        };
        self.state.write().volumes.insert(volume.id, volume.clone());
        Ok(volume)
    }

    async fn list_volumes(&self, args: PageArgs) -> StorageResult<Page<Volume>> {
        let records: Vec<Volume> = self.state.read().volumes.values().cloned().collect();
        cw_page::paginate(MAX_PAGE_SIZE, records, |_| true, args)
            .map_err(|e| StorageError::InvalidId(e.to_string()))
    }

    async fn list_volumes_by_workflow(
        &self,
        workflow_id: &WorkflowId,
        args: PageArgs,
    ) -> StorageResult<Page<Volume>> {
        let records: Vec<Volume> = self.state.read().volumes.values().cloned().collect();
        let workflow_id = *workflow_id;
        cw_page::paginate(MAX_PAGE_SIZE, records, |v| v.workflow_id == workflow_id, args)
            .map_err(|e| StorageError::InvalidId(e.to_string()))
    }

    async fn list_volumes_by_owner(
        &self,
        owner_id: &OwnerId,
        args: PageArgs,
    ) -> StorageResult<Page<Volume>> {
        let workflow_ids = self.owned_workflow_ids(owner_id);
        let records: Vec<Volume> = self.state.read().volumes.values().cloned().collect();
        cw_page::paginate(MAX_PAGE_SIZE, records, move |v| workflow_ids.contains(&v.workflow_id), args)
            .map_err(|e| StorageError::InvalidId(e.to_string()))
    }

    async fn delete_volumes_by_workflow(&self, workflow_id: &WorkflowId) -> StorageResult<()> {
        self.state.write().volumes.retain(|_, v| &v.workflow_id != workflow_id);
        Ok(())
    }
}

#[async_trait]
impl LogAppender for MemoryStore {
    async fn append(&self, job_id: &JobId, chunk: Vec<u8>) -> StorageResult<()> {
        self.state.write().logs.entry(*job_id).or_default().extend_from_slice(&chunk);
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> StorageResult<Vec<u8>> {
        Ok(self.state.read().logs.get(job_id).cloned().unwrap_or_default())
    }
}
