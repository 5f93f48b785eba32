// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent prep / image pre-staging cache (spec §4.6).
//!
//! Before a `library:`-prefixed job image runs, the scheduler resolves it
//! to a content hash, checks the agent's local cache, and downloads on a
//! miss — so the job always launches a content-addressed image rather
//! than a mutable tag.

use async_trait::async_trait;
use cw_core::{CoreError, CoreResult};
use cw_messaging::{await_reply, Messenger};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;

pub const IMAGE_CACHED_SUBJECT: &str = "node.1.image.cached";
pub const IMAGE_DOWNLOAD_SUBJECT: &str = "node.1.image.download";

/// Resolves a `{path, tag}` pair to the content hash of the matching
/// image build for the current architecture. Querying the library
/// registry is an external collaborator — this is an interface, not an
/// HTTP client (same "dynamic dispatch" treatment as `Persister`).
#[async_trait]
pub trait LibraryRegistry: Send + Sync {
    async fn resolve_hash(&self, path: &str, tag: &str, arch: &str) -> CoreResult<String>;
}

/// A parsed `library:[host/]path[:tag]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryReference {
    pub host: Option<String>,
    pub path: String,
    pub tag: String,
}

/// Bundled with the job-start request so the agent launches the exact,
/// content-addressed image (spec §4.6 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCacheInfo {
    #[serde(rename = "Cached")]
    pub cached: bool,
    #[serde(rename = "Hash")]
    pub hash: String,
}

#[derive(Debug, Deserialize)]
struct CacheCheckReply {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct DownloadReply {
    err: Option<String>,
}

/// Parses `library:[host/]path[:tag]`; defaults the tag to `"latest"`
/// when absent. A first path segment containing a `.` is treated as an
/// explicit host (spec §4.6 step 2: "supplied host, else default").
pub fn parse_library_reference(image: &str) -> CoreResult<LibraryReference> {
    let rest = image
        .strip_prefix("library:")
        .ok_or_else(|| CoreError::invalid_argument(format!("not a library reference: {image}")))?;

    let (path_and_tag, host) = match rest.split_once('/') {
        Some((maybe_host, tail)) if maybe_host.contains('.') => {
            (tail.to_string(), Some(maybe_host.to_string()))
        }
        _ => (rest.to_string(), None),
    };

    let (path, tag) = match path_and_tag.rsplit_once(':') {
        Some((p, t)) => (p.to_string(), t.to_string()),
        None => (path_and_tag, "latest".to_string()),
    };

    if path.is_empty() {
        return Err(CoreError::invalid_argument(format!("library reference has no path: {image}")));
    }

    Ok(LibraryReference { host, path, tag })
}

/// Runs the full 6-step protocol. Returns `None` when `image` does not
/// start with `library:` (the agent handles resolution itself); `Some`
/// otherwise, always with `cached: true` since by the time this returns
/// the image is guaranteed present.
pub async fn prepare_agent(
    messenger: &dyn Messenger,
    registry: &dyn LibraryRegistry,
    config: &SchedulerConfig,
    image: &str,
) -> CoreResult<Option<AgentCacheInfo>> {
    if !image.starts_with("library:") {
        return Ok(None);
    }

    let reference = parse_library_reference(image)?;
    let arch = std::env::consts::ARCH;
    let hash = registry.resolve_hash(&reference.path, &reference.tag, arch).await?;

    let mut cache_check_sub =
        messenger.subscribe("image.cached").await.map_err(|e| e.into_core_error())?;
    let cache_check_payload =
        serde_json::to_vec(&hash).map_err(|e| CoreError::io(format!("encoding cache-check payload: {e}")))?;
    messenger
        .publish_with_ack(IMAGE_CACHED_SUBJECT, cache_check_payload, config.cache_check_ack)
        .await
        .map_err(|e| e.into_core_error())?;
    let reply = await_reply(cache_check_sub.as_mut(), "image.cached", config.completion_deadline)
        .await
        .map_err(|e| e.into_core_error())?;
    let cache_check: CacheCheckReply = serde_json::from_slice(&reply.payload)
        .map_err(|e| CoreError::io(format!("decoding image.cached reply: {e}")))?;

    if !cache_check.exists {
        let mut download_sub =
            messenger.subscribe("image.download").await.map_err(|e| e.into_core_error())?;

        let mut substituted = reference.path.clone();
        substituted.push(':');
        substituted.push_str(&hash);
        let uri = match &reference.host {
            Some(host) => format!("{host}/{substituted}"),
            None => substituted,
        };
        let download_payload = serde_json::to_vec(&serde_json::json!({ "URI": uri }))
            .map_err(|e| CoreError::io(format!("encoding image-download payload: {e}")))?;
        messenger
            .publish_with_ack(IMAGE_DOWNLOAD_SUBJECT, download_payload, config.image_download_ack)
            .await
            .map_err(|e| e.into_core_error())?;
        let download_reply =
            await_reply(download_sub.as_mut(), "image.download", config.completion_deadline)
                .await
                .map_err(|e| e.into_core_error())?;
        let download: DownloadReply = serde_json::from_slice(&download_reply.payload)
            .map_err(|e| CoreError::io(format!("decoding image.download reply: {e}")))?;
        if let Some(err) = download.err {
            return Err(CoreError::io(format!("image download failed: {err}")));
        }
    }

    Ok(Some(AgentCacheInfo { cached: true, hash }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_library_image_is_skipped() {
        assert!(!"alpine".starts_with("library:"));
    }

    #[test]
    fn parses_path_without_tag_as_latest() {
        let r = parse_library_reference("library:example/foo").unwrap();
        assert_eq!(r, LibraryReference { host: None, path: "example/foo".into(), tag: "latest".into() });
    }

    #[test]
    fn parses_explicit_tag() {
        let r = parse_library_reference("library:example/foo:v2").unwrap();
        assert_eq!(r.tag, "v2");
        assert_eq!(r.path, "example/foo");
    }

    #[test]
    fn parses_explicit_host() {
        let r = parse_library_reference("library:cloud.example.org/example/foo:v2").unwrap();
        assert_eq!(r.host.as_deref(), Some("cloud.example.org"));
        assert_eq!(r.path, "example/foo");
        assert_eq!(r.tag, "v2");
    }

    #[test]
    fn rejects_non_library_prefix() {
        assert!(parse_library_reference("docker:example/foo").is_err());
    }
}
