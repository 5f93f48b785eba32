// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workflow execution state machine (spec §4.5).
//!
//! Each submitted workflow runs on its own Tokio task: sequential within
//! the workflow (volumes, then jobs in submission order, then teardown),
//! concurrent and unordered across workflows (spec §5).

use std::sync::Arc;

use cw_core::{Clock, CoreError, CoreResult, Job, JobId, JobStatus, Volume, Workflow, WorkflowStatus};
use cw_messaging::{await_reply, Messenger};
use cw_storage::Persister;
use serde::Deserialize;

use crate::cache::{self, LibraryRegistry};
use crate::config::SchedulerConfig;

pub const JOB_START_SUBJECT: &str = "node.1.job.start";
pub const VOLUME_CREATE_SUBJECT: &str = "node.1.volume.create";
pub const VOLUME_DELETE_SUBJECT: &str = "node.1.volume.delete";

/// The output of workflow submission: a persisted workflow, its jobs in
/// topologically-sorted submission order, and its volumes — handed to
/// the scheduler as a single execution plan (spec §4.4 step 6).
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub workflow: Workflow,
    pub jobs: Vec<Job>,
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct JobFinished {
    status: String,
    rc: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct VolumeOpReply {
    err: Option<String>,
}

/// Owns the workflow lifecycle once submitted. Single-node topology: all
/// agent traffic addresses `node.1` (spec §4.5 "multi-agent routing is
/// out of scope here").
pub struct Scheduler<C: Clock> {
    persister: Arc<dyn Persister>,
    messenger: Arc<dyn Messenger>,
    registry: Arc<dyn LibraryRegistry>,
    clock: C,
    config: SchedulerConfig,
}

impl<C> Scheduler<C>
where
    C: Clock + 'static,
{
    pub fn new(
        persister: Arc<dyn Persister>,
        messenger: Arc<dyn Messenger>,
        registry: Arc<dyn LibraryRegistry>,
        clock: C,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self { persister, messenger, registry, clock, config })
    }

    /// Transitions the workflow to `SCHEDULED` and spawns its execution
    /// task, returning immediately (spec §4.5 steps 1-2).
    pub async fn submit(self: &Arc<Self>, plan: ExecutionPlan) -> CoreResult<()> {
        self.persister
            .set_workflow_status(&plan.workflow.id, WorkflowStatus::Scheduled, self.clock.epoch_ms())
            .await
            .map_err(|e| e.into_core_error())?;

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_workflow(plan).await });
        Ok(())
    }

    #[tracing::instrument(skip(self, plan), fields(workflow_id = %plan.workflow.id))]
    async fn run_workflow(&self, plan: ExecutionPlan) {
        let _ = self
            .persister
            .set_workflow_status(&plan.workflow.id, WorkflowStatus::Running, self.clock.epoch_ms())
            .await;

        let mut failed = false;

        for volume in &plan.volumes {
            if let Err(error) = self.create_volume(volume).await {
                tracing::warn!(volume_id = %volume.id, %error, "volume create failed, skipping remaining creates");
                failed = true;
                break;
            }
        }

        if !failed {
            for job in &plan.jobs {
                if let Err(error) = self.run_job(job).await {
                    tracing::warn!(job_id = %job.id, %error, "job failed, remaining jobs not attempted");
                    failed = true;
                    break;
                }
            }
        }

        for volume in &plan.volumes {
            if let Err(error) = self.delete_volume(volume).await {
                tracing::warn!(volume_id = %volume.id, %error, "volume delete failed");
            }
        }

        // The source always writes a terminal COMPLETED status here, even
        // when an earlier step failed (kept verbatim; see DESIGN.md).
        let _ = failed;
        let _ = self
            .persister
            .set_workflow_status(&plan.workflow.id, WorkflowStatus::Completed, self.clock.epoch_ms())
            .await;
    }

    async fn create_volume(&self, volume: &Volume) -> CoreResult<()> {
        let subject = format!("volume.{}.create", volume.id);
        let mut reply_sub = self.messenger.subscribe(&subject).await.map_err(|e| e.into_core_error())?;

        let payload =
            serde_json::to_vec(volume).map_err(|e| CoreError::io(format!("encoding volume: {e}")))?;
        self.messenger
            .publish_with_ack(VOLUME_CREATE_SUBJECT, payload, self.config.volume_ack)
            .await
            .map_err(|e| e.into_core_error())?;

        let reply = await_reply(reply_sub.as_mut(), &subject, self.config.completion_deadline)
            .await
            .map_err(|e| e.into_core_error())?;
        let reply: VolumeOpReply = serde_json::from_slice(&reply.payload)
            .map_err(|e| CoreError::io(format!("decoding {subject} reply: {e}")))?;
        match reply.err {
            Some(err) => Err(CoreError::io(format!("volume {} create failed: {err}", volume.id))),
            None => Ok(()),
        }
    }

    async fn delete_volume(&self, volume: &Volume) -> CoreResult<()> {
        let subject = format!("volume.{}.delete", volume.id);
        let mut reply_sub = self.messenger.subscribe(&subject).await.map_err(|e| e.into_core_error())?;

        let payload =
            serde_json::to_vec(volume).map_err(|e| CoreError::io(format!("encoding volume: {e}")))?;
        self.messenger
            .publish_with_ack(VOLUME_DELETE_SUBJECT, payload, self.config.volume_ack)
            .await
            .map_err(|e| e.into_core_error())?;

        let reply = await_reply(reply_sub.as_mut(), &subject, self.config.completion_deadline)
            .await
            .map_err(|e| e.into_core_error())?;
        let reply: VolumeOpReply = serde_json::from_slice(&reply.payload)
            .map_err(|e| CoreError::io(format!("decoding {subject} reply: {e}")))?;
        match reply.err {
            Some(err) => Err(CoreError::io(format!("volume {} delete failed: {err}", volume.id))),
            None => Ok(()),
        }
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    async fn run_job(&self, job: &Job) -> CoreResult<()> {
        self.persister
            .set_job_status(&job.id, JobStatus::Running)
            .await
            .map_err(|e| e.into_core_error())?;

        let cache_info =
            cache::prepare_agent(self.messenger.as_ref(), self.registry.as_ref(), &self.config, &job.image)
                .await?;

        let finished_subject = format!("job.{}.finished", job.id);
        let mut reply_sub =
            self.messenger.subscribe(&finished_subject).await.map_err(|e| e.into_core_error())?;

        let start_payload = serde_json::to_vec(&serde_json::json!({
            "Job": job,
            "agentCacheInfo": cache_info,
        }))
        .map_err(|e| CoreError::io(format!("encoding job-start payload: {e}")))?;
        self.messenger
            .publish_with_ack(JOB_START_SUBJECT, start_payload, self.config.job_start_ack)
            .await
            .map_err(|e| e.into_core_error())?;

        let reply = await_reply(reply_sub.as_mut(), &finished_subject, self.config.completion_deadline)
            .await
            .map_err(|e| e.into_core_error())?;
        let finished: JobFinished = serde_json::from_slice(&reply.payload)
            .map_err(|e| CoreError::io(format!("decoding {finished_subject} reply: {e}")))?;

        self.finalize_job(&job.id, &finished).await
    }

    async fn finalize_job(&self, job_id: &JobId, finished: &JobFinished) -> CoreResult<()> {
        let status = match finished.status.as_str() {
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            other => {
                return Err(CoreError::invalid_argument(format!(
                    "unknown job status in finished event: {other}"
                )))
            }
        };

        self.persister.set_job_status(job_id, status).await.map_err(|e| e.into_core_error())?;
        if let Some(rc) = finished.rc {
            self.persister.set_job_exit_code(job_id, rc).await.map_err(|e| e.into_core_error())?;
        }

        if status == JobStatus::Failed {
            return Err(CoreError::io(format!("job {job_id} reported FAILED (rc={:?})", finished.rc)));
        }
        Ok(())
    }
}
