// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `WorkflowService`: the Core API boundary named in spec §6, wiring the
//! auth gate, workflow submission, the scheduler, and the paged
//! projections (spec §2 item 9) onto a single `Persister`/`Messenger`
//! pair.
//!
//! Every method takes a [`RequestContext`] and calls [`AuthGate::viewer`]
//! first; the only authorization beyond that gating check is the
//! owner-scoped list queries filtering to the caller's own records (spec
//! §1 Non-goals: "no authorization policy beyond a gating check for an
//! authenticated caller"). Per spec §9 "lazy-loaded parent references",
//! entities stay plain data — every query lives here, never on
//! `Workflow`/`Job`/`Volume` themselves.

use std::sync::Arc;

use cw_core::{
    Clock, CoreError, CoreResult, Job, JobId, PageArgs, Viewer, Volume, Workflow, WorkflowId,
    WorkflowSpec,
};
use cw_page::Page;
use cw_storage::{LogAppender, Persister};

use crate::auth::{AuthGate, RequestContext};
use crate::scheduler::Scheduler;
use crate::submission;

/// Shared facade over the persistence/messaging handles and the
/// scheduler. Cheap to clone (every field is an `Arc`); safe to share
/// across connection-handling tasks (spec §5 "shared resources").
pub struct WorkflowService<C: Clock> {
    persister: Arc<dyn Persister>,
    log_appender: Arc<dyn LogAppender>,
    scheduler: Arc<Scheduler<C>>,
    clock: C,
}

impl<C: Clock + 'static> WorkflowService<C> {
    pub fn new(
        persister: Arc<dyn Persister>,
        log_appender: Arc<dyn LogAppender>,
        scheduler: Arc<Scheduler<C>>,
        clock: C,
    ) -> Self {
        Self { persister, log_appender, scheduler, clock }
    }

    /// `Viewer(ctx)` (spec §4.8, §6).
    pub fn viewer(&self, ctx: &RequestContext) -> CoreResult<Viewer> {
        AuthGate::viewer(ctx)
    }

    /// Validates and persists `spec` (§4.1/§4.4), then hands its
    /// execution plan to the scheduler (§4.5 steps 1-2). Returns the
    /// persisted workflow as soon as it and its jobs/volumes exist —
    /// execution itself runs on its own task and is not awaited here.
    pub async fn create_workflow(
        &self,
        ctx: &RequestContext,
        spec: WorkflowSpec,
    ) -> CoreResult<Workflow> {
        let viewer = AuthGate::viewer(ctx)?;
        let plan = submission::submit_workflow(self.persister.as_ref(), &self.clock, &viewer, spec).await?;
        let workflow = plan.workflow.clone();
        self.scheduler.submit(plan).await?;
        Ok(workflow)
    }

    pub async fn get_workflow(&self, ctx: &RequestContext, id: WorkflowId) -> CoreResult<Workflow> {
        AuthGate::viewer(ctx)?;
        self.persister.get_workflow(&id).await.map_err(|e| e.into_core_error())
    }

    /// Deletes the workflow and cascades to its jobs and volumes (spec
    /// §3 "Deletion ... atomically from the caller's viewpoint").
    pub async fn delete_workflow(&self, ctx: &RequestContext, id: WorkflowId) -> CoreResult<Workflow> {
        AuthGate::viewer(ctx)?;
        let workflow = self.persister.delete_workflow(&id).await.map_err(|e| e.into_core_error())?;
        self.persister.delete_jobs_by_workflow(&id).await.map_err(|e| e.into_core_error())?;
        self.persister.delete_volumes_by_workflow(&id).await.map_err(|e| e.into_core_error())?;
        Ok(workflow)
    }

    pub async fn list_workflows(&self, ctx: &RequestContext, args: PageArgs) -> CoreResult<Page<Workflow>> {
        AuthGate::viewer(ctx)?;
        self.persister.list_workflows(args).await.map_err(|e| e.into_core_error())
    }

    /// "workflows ... of a user" (spec §2 item 9): defaults to the
    /// caller's own workflows when `owner` is omitted.
    pub async fn list_workflows_by_owner(
        &self,
        ctx: &RequestContext,
        owner: Option<cw_core::OwnerId>,
        args: PageArgs,
    ) -> CoreResult<Page<Workflow>> {
        let viewer = AuthGate::viewer(ctx)?;
        let owner_id = owner.unwrap_or(viewer.id);
        self.persister.list_workflows_by_owner(&owner_id, args).await.map_err(|e| e.into_core_error())
    }

    pub async fn get_job(&self, ctx: &RequestContext, id: JobId) -> CoreResult<Job> {
        AuthGate::viewer(ctx)?;
        self.persister.get_job(&id).await.map_err(|e| e.into_core_error())
    }

    pub async fn list_jobs(&self, ctx: &RequestContext, args: PageArgs) -> CoreResult<Page<Job>> {
        AuthGate::viewer(ctx)?;
        self.persister.list_jobs(args).await.map_err(|e| e.into_core_error())
    }

    /// "jobs of a workflow" (spec §2 item 9).
    pub async fn list_jobs_by_workflow(
        &self,
        ctx: &RequestContext,
        workflow_id: WorkflowId,
        args: PageArgs,
    ) -> CoreResult<Page<Job>> {
        AuthGate::viewer(ctx)?;
        self.persister.list_jobs_by_workflow(&workflow_id, args).await.map_err(|e| e.into_core_error())
    }

    pub async fn list_jobs_by_ids(
        &self,
        ctx: &RequestContext,
        workflow_id: WorkflowId,
        ids: &[JobId],
        args: PageArgs,
    ) -> CoreResult<Page<Job>> {
        AuthGate::viewer(ctx)?;
        self.persister.list_jobs_by_ids(&workflow_id, ids, args).await.map_err(|e| e.into_core_error())
    }

    /// "required jobs of a job" (spec §2 item 9): pages the dependency
    /// predecessors recorded on `job.requires` at submission time.
    pub async fn list_required_jobs(
        &self,
        ctx: &RequestContext,
        job_id: JobId,
        args: PageArgs,
    ) -> CoreResult<Page<Job>> {
        AuthGate::viewer(ctx)?;
        let job = self.persister.get_job(&job_id).await.map_err(|e| e.into_core_error())?;
        self.persister
            .list_jobs_by_ids(&job.workflow_id, &job.requires, args)
            .await
            .map_err(|e| e.into_core_error())
    }

    /// "jobs ... of a user" (spec §2 item 9).
    pub async fn list_jobs_by_owner(
        &self,
        ctx: &RequestContext,
        owner: Option<cw_core::OwnerId>,
        args: PageArgs,
    ) -> CoreResult<Page<Job>> {
        let viewer = AuthGate::viewer(ctx)?;
        let owner_id = owner.unwrap_or(viewer.id);
        self.persister.list_jobs_by_owner(&owner_id, args).await.map_err(|e| e.into_core_error())
    }

    /// `GetJobOutput(jobId) -> bytes` (spec §6). Per spec §4.5 "Job status
    /// finalization", only a `COMPLETED` job's output is readable; append
    /// continues unconditionally as bytes arrive, so a running job's
    /// partial output is withheld rather than returned truncated.
    pub async fn get_job_output(&self, ctx: &RequestContext, job_id: JobId) -> CoreResult<Vec<u8>> {
        AuthGate::viewer(ctx)?;
        let job = self.persister.get_job(&job_id).await.map_err(|e| e.into_core_error())?;
        if !job.output_readable() {
            return Err(CoreError::invalid_argument(format!(
                "job {job_id} output is not readable until it reaches COMPLETED (current: {})",
                job.status
            )));
        }
        self.log_appender.get(&job_id).await.map_err(|e| e.into_core_error())
    }

    pub async fn list_volumes(&self, ctx: &RequestContext, args: PageArgs) -> CoreResult<Page<Volume>> {
        AuthGate::viewer(ctx)?;
        self.persister.list_volumes(args).await.map_err(|e| e.into_core_error())
    }

    /// "volumes of a workflow" (spec §2 item 9).
    pub async fn list_volumes_by_workflow(
        &self,
        ctx: &RequestContext,
        workflow_id: WorkflowId,
        args: PageArgs,
    ) -> CoreResult<Page<Volume>> {
        AuthGate::viewer(ctx)?;
        self.persister.list_volumes_by_workflow(&workflow_id, args).await.map_err(|e| e.into_core_error())
    }

    /// "volumes ... of a user" (spec §2 item 9).
    pub async fn list_volumes_by_owner(
        &self,
        ctx: &RequestContext,
        owner: Option<cw_core::OwnerId>,
        args: PageArgs,
    ) -> CoreResult<Page<Volume>> {
        let viewer = AuthGate::viewer(ctx)?;
        let owner_id = owner.unwrap_or(viewer.id);
        self.persister.list_volumes_by_owner(&owner_id, args).await.map_err(|e| e.into_core_error())
    }
}
