// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow submission (spec §4.1, §4.4): validates a client-supplied
//! [`WorkflowSpec`], resolves its name-based references to ids, and
//! persists the result as a fully-formed [`ExecutionPlan`].
//!
//! The core never constructs ids itself (spec §4.3) — every id in the
//! returned plan comes back from a `Persister::create_*` call.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use cw_core::{
    Clock, CoreError, CoreResult, JobId, JobSpec, Viewer, VolumeId, VolumeRequirement,
    VolumeRequirementSpec, VolumeSpec, VolumeType, WorkflowSpec,
};
use cw_graph::Dag;
use cw_storage::{NewJob, NewVolume, NewWorkflow, Persister};

use crate::scheduler::ExecutionPlan;

/// Validates and persists `spec` under `viewer`'s ownership, step for
/// step as spec §4.4 describes it: the workflow is persisted first, then
/// volumes are created one at a time, then the job dependency graph is
/// validated, then jobs are persisted in topological order. A failure
/// partway through does **not** roll back what already landed — spec §9's
/// "submission does not roll back partial state" is observed here rather
/// than pre-validated away, so callers see exactly the partial state the
/// spec's scenario 2/3 describe (workflow persisted, no jobs).
pub async fn submit_workflow<C: Clock>(
    persister: &dyn Persister,
    clock: &C,
    viewer: &Viewer,
    spec: WorkflowSpec,
) -> CoreResult<ExecutionPlan> {
    let now = clock.epoch_ms();
    let workflow = persister
        .create_workflow(NewWorkflow {
            owner_id: viewer.id.clone(),
            name: spec.name.clone(),
            created_at_ms: now,
        })
        .await
        .map_err(|e| e.into_core_error())?;

    let mut seen_names: HashSet<String> = HashSet::with_capacity(spec.volumes.len());
    let mut volume_ids: HashMap<String, VolumeId> = HashMap::with_capacity(spec.volumes.len());
    let mut volumes = Vec::with_capacity(spec.volumes.len());
    for volume_spec in &spec.volumes {
        if !seen_names.insert(volume_spec.name.clone()) {
            return Err(CoreError::DuplicateVolume(volume_spec.name.clone()));
        }
        let kind = VolumeType::from_str(&volume_spec.kind)
            .map_err(|_| CoreError::InvalidVolumeType(volume_spec.kind.clone()))?;

        let volume = persister
            .create_volume(NewVolume {
                workflow_id: workflow.id.clone(),
                name: volume_spec.name.clone(),
                kind,
                created_at_ms: now,
            })
            .await
            .map_err(|e| e.into_core_error())?;
        volume_ids.insert(volume_spec.name.clone(), volume.id.clone());
        volumes.push(volume);
    }

    let job_order = validate_jobs(&spec.jobs, &volume_ids)?;

    let jobs_by_name: HashMap<&str, &JobSpec> =
        spec.jobs.iter().map(|j| (j.name.as_str(), j)).collect();
    let mut job_ids: HashMap<String, JobId> = HashMap::with_capacity(spec.jobs.len());
    let mut jobs = Vec::with_capacity(spec.jobs.len());
    for name in &job_order {
        let job_spec = jobs_by_name[name.as_str()];

        let requires = job_spec
            .requires
            .iter()
            .map(|dep| job_ids.get(dep).cloned().ok_or_else(|| CoreError::UnknownJobRef(dep.clone())))
            .collect::<CoreResult<Vec<_>>>()?;

        let volume_requirements = resolve_volume_requirements(&job_spec.volumes, &volume_ids)?;

        let job = persister
            .create_job(NewJob {
                workflow_id: workflow.id.clone(),
                name: job_spec.name.clone(),
                image: job_spec.image.clone(),
                command: job_spec.command.clone(),
                requires,
                volumes: volume_requirements,
            })
            .await
            .map_err(|e| e.into_core_error())?;
        job_ids.insert(name.clone(), job.id.clone());
        jobs.push(job);
    }

    Ok(ExecutionPlan { workflow, jobs, volumes })
}

/// Builds the job dependency graph from `requires` edges, rejects
/// duplicate job names and unresolved references, checks every job's
/// volume requirements resolve against the volumes already created, and
/// returns the jobs in topological submission order (spec §4.1 steps
/// 3-5).
fn validate_jobs(jobs: &[JobSpec], volume_ids: &HashMap<String, VolumeId>) -> CoreResult<Vec<String>> {
    let mut dag = Dag::new();
    for job in jobs {
        dag.add_vertex(job.name.clone(), job.requires.clone()).map_err(|e| e.into_core_error())?;
    }
    dag.validate().map_err(|e| e.into_core_error())?;

    for job in jobs {
        for requirement in &job.volumes {
            if !volume_ids.contains_key(&requirement.name) {
                return Err(CoreError::UnknownVolumeRef(requirement.name.clone()));
            }
        }
    }

    dag.topo_sort().map_err(|e| e.into_core_error())
}

fn resolve_volume_requirements(
    requirements: &[VolumeRequirementSpec],
    volume_ids: &HashMap<String, VolumeId>,
) -> CoreResult<Vec<VolumeRequirement>> {
    requirements
        .iter()
        .map(|requirement| {
            let volume_id = volume_ids
                .get(&requirement.name)
                .cloned()
                .ok_or_else(|| CoreError::UnknownVolumeRef(requirement.name.clone()))?;
            Ok(VolumeRequirement {
                volume_id,
                name: requirement.name.clone(),
                location: requirement.location.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use cw_core::{FakeClock, OwnerId};
    use cw_storage::MemoryStore;

    use super::*;

    fn viewer() -> Viewer {
        Viewer::new(OwnerId::new(), "ada")
    }

    fn job(name: &str, requires: Vec<&str>) -> JobSpec {
        JobSpec {
            name: name.to_string(),
            image: "alpine".to_string(),
            command: vec!["true".to_string()],
            requires: requires.into_iter().map(String::from).collect(),
            volumes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn submits_linear_chain_in_order() {
        let store = MemoryStore::new();
        let clock = FakeClock::new();
        let spec = WorkflowSpec {
            name: "wf".to_string(),
            jobs: vec![job("a", vec![]), job("b", vec!["a"]), job("c", vec!["b"])],
            volumes: Vec::new(),
        };

        let plan = submit_workflow(&store, &clock, &viewer(), spec).await.unwrap();
        let names: Vec<_> = plan.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(plan.jobs[2].requires, vec![plan.jobs[1].id.clone()]);
    }

    #[tokio::test]
    async fn rejects_unknown_dependency() {
        let store = MemoryStore::new();
        let clock = FakeClock::new();
        let spec = WorkflowSpec { name: "wf".to_string(), jobs: vec![job("a", vec!["ghost"])], volumes: Vec::new() };

        let err = submit_workflow(&store, &clock, &viewer(), spec).await.unwrap_err();
        assert_eq!(err, CoreError::UnknownJobRef("ghost".to_string()));
    }

    /// Spec §8 scenario 2: the workflow record itself is left in place
    /// (partial state is observable), but no job ever lands.
    #[tokio::test]
    async fn cycle_leaves_workflow_persisted_with_no_jobs() {
        use cw_core::PageArgs;

        let store = MemoryStore::new();
        let clock = FakeClock::new();
        let spec = WorkflowSpec {
            name: "wf".to_string(),
            jobs: vec![job("a", vec!["b"]), job("b", vec!["a"])],
            volumes: Vec::new(),
        };

        let err = submit_workflow(&store, &clock, &viewer(), spec).await.unwrap_err();
        assert_eq!(err, CoreError::Cycle);

        let workflows = store.list_workflows(PageArgs::default()).await.unwrap();
        assert_eq!(workflows.items.len(), 1);
        let jobs = store.list_jobs_by_workflow(&workflows.items[0].id, PageArgs::default()).await.unwrap();
        assert!(jobs.items.is_empty());
    }

    /// Spec §8 scenario 3, same partial-state shape as the cycle case.
    #[tokio::test]
    async fn unknown_volume_ref_leaves_workflow_persisted_with_no_jobs() {
        use cw_core::PageArgs;

        let store = MemoryStore::new();
        let clock = FakeClock::new();
        let mut a = job("a", vec![]);
        a.volumes = vec![VolumeRequirementSpec { name: "v2".to_string(), location: "/mnt".to_string() }];
        let spec = WorkflowSpec {
            name: "wf".to_string(),
            jobs: vec![a],
            volumes: vec![VolumeSpec { name: "v1".to_string(), kind: "EPHEMERAL".to_string() }],
        };

        let err = submit_workflow(&store, &clock, &viewer(), spec).await.unwrap_err();
        assert_eq!(err, CoreError::UnknownVolumeRef("v2".to_string()));

        let workflows = store.list_workflows(PageArgs::default()).await.unwrap();
        assert_eq!(workflows.items.len(), 1);
        let jobs = store.list_jobs_by_workflow(&workflows.items[0].id, PageArgs::default()).await.unwrap();
        assert!(jobs.items.is_empty());
    }

    /// Spec §4.4 step 2: the first volume (which created successfully)
    /// is left persisted; the conflicting second one is rejected.
    #[tokio::test]
    async fn rejects_duplicate_volume_name_after_persisting_the_first() {
        use cw_core::PageArgs;

        let store = MemoryStore::new();
        let clock = FakeClock::new();
        let spec = WorkflowSpec {
            name: "wf".to_string(),
            jobs: vec![],
            volumes: vec![
                VolumeSpec { name: "data".to_string(), kind: "EPHEMERAL".to_string() },
                VolumeSpec { name: "data".to_string(), kind: "PERSISTENT".to_string() },
            ],
        };

        let err = submit_workflow(&store, &clock, &viewer(), spec).await.unwrap_err();
        assert_eq!(err, CoreError::DuplicateVolume("data".to_string()));

        let workflows = store.list_workflows(PageArgs::default()).await.unwrap();
        let volumes =
            store.list_volumes_by_workflow(&workflows.items[0].id, PageArgs::default()).await.unwrap();
        assert_eq!(volumes.items.len(), 1, "the first volume spec was already persisted");
    }

    #[tokio::test]
    async fn rejects_unknown_volume_type() {
        let store = MemoryStore::new();
        let clock = FakeClock::new();
        let spec = WorkflowSpec {
            name: "wf".to_string(),
            jobs: vec![],
            volumes: vec![VolumeSpec { name: "data".to_string(), kind: "TEMP".to_string() }],
        };

        let err = submit_workflow(&store, &clock, &viewer(), spec).await.unwrap_err();
        assert_eq!(err, CoreError::InvalidVolumeType("TEMP".to_string()));
    }

    #[tokio::test]
    async fn resolves_job_volume_requirement_to_id() {
        let store = MemoryStore::new();
        let clock = FakeClock::new();
        let mut a = job("a", vec![]);
        a.volumes = vec![VolumeRequirementSpec { name: "data".to_string(), location: "/data".to_string() }];
        let spec = WorkflowSpec {
            name: "wf".to_string(),
            jobs: vec![a],
            volumes: vec![VolumeSpec { name: "data".to_string(), kind: "EPHEMERAL".to_string() }],
        };

        let plan = submit_workflow(&store, &clock, &viewer(), spec).await.unwrap();
        assert_eq!(plan.jobs[0].volumes[0].volume_id, plan.volumes[0].id);
    }
}
