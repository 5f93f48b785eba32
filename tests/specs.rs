// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level scenario tests (spec §8 "Concrete scenarios"): these drive
//! the full submission → scheduler → messaging → ingester path against
//! the in-memory fakes, the way a real deployment wires `cw-engine` to a
//! NATS bus and a durable store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cw_core::{CoreResult, FakeClock, OwnerId, PageArgs, Viewer, VolumeRequirementSpec, VolumeSpec};
use cw_engine::cache::{LibraryRegistry, IMAGE_CACHED_SUBJECT, IMAGE_DOWNLOAD_SUBJECT};
use cw_engine::scheduler::{Scheduler, JOB_START_SUBJECT, VOLUME_CREATE_SUBJECT, VOLUME_DELETE_SUBJECT};
use cw_engine::{RequestContext, SchedulerConfig, WorkflowService};
use cw_messaging::{InMemoryBroker, Messenger, Subscription};
use cw_storage::{LogAppender, MemoryStore, Persister};
use serde_json::json;

struct StaticHash(&'static str);

#[async_trait]
impl LibraryRegistry for StaticHash {
    async fn resolve_hash(&self, _path: &str, _tag: &str, _arch: &str) -> CoreResult<String> {
        Ok(self.0.to_string())
    }
}

fn viewer_ctx() -> (RequestContext, Viewer) {
    let viewer = Viewer::new(OwnerId::new(), "ada");
    (RequestContext::authenticated(viewer.clone()), viewer)
}

/// Answers every `node.1.*` request the scheduler makes, the way a real
/// agent would: acks the publish (just by having subscribed) and posts
/// the per-id reply subject the scheduler is waiting on.
async fn spawn_fake_agent(broker: Arc<InMemoryBroker>, cache_hit: bool) -> tokio::task::JoinHandle<()> {
    let mut job_start = broker.subscribe(JOB_START_SUBJECT).await.unwrap();
    let mut vol_create = broker.subscribe(VOLUME_CREATE_SUBJECT).await.unwrap();
    let mut vol_delete = broker.subscribe(VOLUME_DELETE_SUBJECT).await.unwrap();
    let mut cache_check = broker.subscribe(IMAGE_CACHED_SUBJECT).await.unwrap();
    let mut download = broker.subscribe(IMAGE_DOWNLOAD_SUBJECT).await.unwrap();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                next = job_start.next() => {
                    let Some(msg) = next else { break };
                    let body: serde_json::Value = serde_json::from_slice(&msg.payload).unwrap();
                    let job_id = body["Job"]["id"].as_str().unwrap().to_string();
                    let reply = json!({ "status": "COMPLETED", "rc": 0 });
                    broker
                        .publish(&format!("job.{job_id}.finished"), serde_json::to_vec(&reply).unwrap())
                        .await
                        .unwrap();
                }
                next = vol_create.next() => {
                    let Some(msg) = next else { break };
                    let volume: cw_core::Volume = serde_json::from_slice(&msg.payload).unwrap();
                    let reply = json!({ "err": null });
                    broker
                        .publish(&format!("volume.{}.create", volume.id), serde_json::to_vec(&reply).unwrap())
                        .await
                        .unwrap();
                }
                next = vol_delete.next() => {
                    let Some(msg) = next else { break };
                    let volume: cw_core::Volume = serde_json::from_slice(&msg.payload).unwrap();
                    let reply = json!({ "err": null });
                    broker
                        .publish(&format!("volume.{}.delete", volume.id), serde_json::to_vec(&reply).unwrap())
                        .await
                        .unwrap();
                }
                next = cache_check.next() => {
                    let Some(_msg) = next else { break };
                    let reply = json!({ "exists": cache_hit });
                    broker.publish("image.cached", serde_json::to_vec(&reply).unwrap()).await.unwrap();
                }
                next = download.next() => {
                    let Some(_msg) = next else { break };
                    let reply = json!({ "err": null });
                    broker.publish("image.download", serde_json::to_vec(&reply).unwrap()).await.unwrap();
                }
            }
        }
    })
}

fn service_with_agent(
    broker: Arc<InMemoryBroker>,
    registry: Arc<dyn LibraryRegistry>,
) -> (WorkflowService<FakeClock>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let persister: Arc<dyn cw_storage::Persister> = store.clone();
    let log_appender: Arc<dyn cw_storage::LogAppender> = store.clone();
    let messenger: Arc<dyn Messenger> = broker;
    let scheduler = Scheduler::new(
        persister.clone(),
        messenger,
        registry,
        FakeClock::new(),
        SchedulerConfig::default(),
    );
    (WorkflowService::new(persister, log_appender, scheduler, FakeClock::new()), store)
}

struct Unreachable;

#[async_trait]
impl LibraryRegistry for Unreachable {
    async fn resolve_hash(&self, _path: &str, _tag: &str, _arch: &str) -> CoreResult<String> {
        unreachable!("scenario submits no library: images")
    }
}

/// Scenario 1: linear workflow `a -> b`, no volumes.
#[tokio::test]
async fn linear_workflow_runs_jobs_in_dependency_order_to_completion() {
    let broker = Arc::new(InMemoryBroker::new());
    let _agent = spawn_fake_agent(broker.clone(), true).await;
    let (svc, store) = service_with_agent(broker, Arc::new(Unreachable));
    let (ctx, _) = viewer_ctx();

    let spec = cw_core::WorkflowSpec {
        name: "w".into(),
        jobs: vec![
            cw_core::JobSpec {
                name: "a".into(),
                image: "alpine".into(),
                command: vec!["true".into()],
                requires: vec![],
                volumes: vec![],
            },
            cw_core::JobSpec {
                name: "b".into(),
                image: "alpine".into(),
                command: vec!["true".into()],
                requires: vec!["a".into()],
                volumes: vec![],
            },
        ],
        volumes: vec![],
    };

    let workflow = svc.create_workflow(&ctx, spec).await.unwrap();
    let jobs = svc.list_jobs_by_workflow(&ctx, workflow.id, PageArgs::default()).await.unwrap();
    let names: Vec<_> = jobs.items.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);

    // Give the workflow's own task time to drive both jobs to completion.
    for _ in 0..50 {
        if store.get_workflow(&workflow.id).await.unwrap().status == cw_core::WorkflowStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let finished = store.get_workflow(&workflow.id).await.unwrap();
    assert_eq!(finished.status, cw_core::WorkflowStatus::Completed);

    let jobs = svc.list_jobs_by_workflow(&ctx, workflow.id, PageArgs::default()).await.unwrap();
    for job in &jobs.items {
        assert_eq!(job.status, cw_core::JobStatus::Completed);
    }
}

/// Scenario 2: cycle rejection leaves no jobs persisted.
#[tokio::test]
async fn cycle_is_rejected_before_anything_is_persisted() {
    let broker = Arc::new(InMemoryBroker::new());
    let (svc, _store) = service_with_agent(broker, Arc::new(Unreachable));
    let (ctx, _) = viewer_ctx();

    let spec = cw_core::WorkflowSpec {
        name: "w".into(),
        jobs: vec![
            cw_core::JobSpec {
                name: "a".into(),
                image: "alpine".into(),
                command: vec!["true".into()],
                requires: vec!["b".into()],
                volumes: vec![],
            },
            cw_core::JobSpec {
                name: "b".into(),
                image: "alpine".into(),
                command: vec!["true".into()],
                requires: vec!["a".into()],
                volumes: vec![],
            },
        ],
        volumes: vec![],
    };

    let err = svc.create_workflow(&ctx, spec).await.unwrap_err();
    assert_eq!(err, cw_core::CoreError::Cycle);

    let jobs = svc.list_jobs(&ctx, PageArgs::default()).await.unwrap();
    assert!(jobs.items.is_empty());
}

/// Scenario 3: a job's volume requirement naming an undeclared volume.
#[tokio::test]
async fn unknown_volume_reference_is_rejected_before_anything_is_persisted() {
    let broker = Arc::new(InMemoryBroker::new());
    let (svc, _store) = service_with_agent(broker, Arc::new(Unreachable));
    let (ctx, _) = viewer_ctx();

    let spec = cw_core::WorkflowSpec {
        name: "w".into(),
        jobs: vec![cw_core::JobSpec {
            name: "a".into(),
            image: "alpine".into(),
            command: vec!["true".into()],
            requires: vec![],
            volumes: vec![VolumeRequirementSpec { name: "v2".into(), location: "/mnt".into() }],
        }],
        volumes: vec![VolumeSpec { name: "v1".into(), kind: "EPHEMERAL".into() }],
    };

    let err = svc.create_workflow(&ctx, spec).await.unwrap_err();
    assert_eq!(err, cw_core::CoreError::UnknownVolumeRef("v2".into()));

    let jobs = svc.list_jobs(&ctx, PageArgs::default()).await.unwrap();
    assert!(jobs.items.is_empty());
}

/// Scenario 4/5: `library:` image resolution, exercised on both the
/// cache-hit and cache-miss branches.
#[tokio::test]
async fn library_image_resolves_through_the_agent_cache_protocol() {
    for cache_hit in [true, false] {
        let broker = Arc::new(InMemoryBroker::new());
        let _agent = spawn_fake_agent(broker.clone(), cache_hit).await;
        let (svc, store) = service_with_agent(broker, Arc::new(StaticHash("deadbeef")));
        let (ctx, _) = viewer_ctx();

        let spec = cw_core::WorkflowSpec {
            name: "w".into(),
            jobs: vec![cw_core::JobSpec {
                name: "a".into(),
                image: "library:example/foo:latest".into(),
                command: vec!["true".into()],
                requires: vec![],
                volumes: vec![],
            }],
            volumes: vec![],
        };

        let workflow = svc.create_workflow(&ctx, spec).await.unwrap();
        for _ in 0..50 {
            if store.get_workflow(&workflow.id).await.unwrap().status == cw_core::WorkflowStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let finished = store.get_workflow(&workflow.id).await.unwrap();
        assert_eq!(finished.status, cw_core::WorkflowStatus::Completed, "cache_hit={cache_hit}");

        let jobs = svc.list_jobs_by_workflow(&ctx, workflow.id, PageArgs::default()).await.unwrap();
        assert_eq!(jobs.items[0].status, cw_core::JobStatus::Completed, "cache_hit={cache_hit}");
    }
}

/// Scenario 6: five persisted jobs, forward cursor paging in `first=2` pages.
#[tokio::test]
async fn pagination_cursor_walks_persisted_jobs_in_order() {
    let broker = Arc::new(InMemoryBroker::new());
    let (svc, _store) = service_with_agent(broker, Arc::new(Unreachable));
    let (ctx, _) = viewer_ctx();

    let spec = cw_core::WorkflowSpec {
        name: "w".into(),
        jobs: (1..=5)
            .map(|i| cw_core::JobSpec {
                name: format!("job{i}"),
                image: "alpine".into(),
                command: vec!["true".into()],
                requires: vec![],
                volumes: vec![],
            })
            .collect(),
        volumes: vec![],
    };
    let workflow = svc.create_workflow(&ctx, spec).await.unwrap();

    let page1 =
        svc.list_jobs_by_workflow(&ctx, workflow.id, PageArgs::first(2)).await.unwrap();
    assert_eq!(page1.items.len(), 2);
    assert!(page1.page_info.has_next_page);
    let cursor1 = page1.page_info.end_cursor.clone().unwrap();

    let page2 = svc
        .list_jobs_by_workflow(&ctx, workflow.id, PageArgs::first_after(2, cursor1))
        .await
        .unwrap();
    assert_eq!(page2.items.len(), 2);
    assert!(page2.page_info.has_next_page);
    let cursor2 = page2.page_info.end_cursor.clone().unwrap();

    let page3 = svc
        .list_jobs_by_workflow(&ctx, workflow.id, PageArgs::first_after(2, cursor2))
        .await
        .unwrap();
    assert_eq!(page3.items.len(), 1);
    assert!(!page3.page_info.has_next_page);

    let mut all_ids: Vec<_> =
        page1.items.iter().chain(&page2.items).chain(&page3.items).map(|j| j.id).collect();
    all_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    let mut unique = all_ids.clone();
    unique.dedup();
    assert_eq!(unique.len(), 5, "every job appears exactly once across the paged walk");
}

/// A job's output is only readable once it reaches `COMPLETED`, and the
/// output ingester is what actually puts bytes there (spec §4.7/§6).
#[tokio::test]
async fn job_output_becomes_readable_once_the_ingester_appends_it() {
    let broker = Arc::new(InMemoryBroker::new());
    let _agent = spawn_fake_agent(broker.clone(), true).await;
    let (svc, store) = service_with_agent(broker.clone(), Arc::new(Unreachable));
    let ingester = cw_engine::Ingester::spawn(broker.clone(), store.clone()).await.unwrap();
    let (ctx, _) = viewer_ctx();

    let spec = cw_core::WorkflowSpec {
        name: "w".into(),
        jobs: vec![cw_core::JobSpec {
            name: "a".into(),
            image: "alpine".into(),
            command: vec!["true".into()],
            requires: vec![],
            volumes: vec![],
        }],
        volumes: vec![],
    };
    let workflow = svc.create_workflow(&ctx, spec).await.unwrap();
    let jobs = svc.list_jobs_by_workflow(&ctx, workflow.id, PageArgs::default()).await.unwrap();
    let job_id = jobs.items[0].id;

    broker.publish(&format!("job.{job_id}.output"), b"building...".to_vec()).await.unwrap();

    for _ in 0..50 {
        if store.get_job(&job_id).await.unwrap().status == cw_core::JobStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    ingester.shutdown().await;

    let output = svc.get_job_output(&ctx, job_id).await.unwrap();
    assert_eq!(output, b"building...");
}
