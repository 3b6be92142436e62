//! Seam for an external stream health checker (a media prober run out of process).
//!
//! The library ships no concrete checker; it builds the URL to check and merges
//! whatever the checker reports back onto the channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ProbeFailure;
use crate::rtsp::inject_credentials;
use crate::scanner::{scan, ScanContext};
use crate::types::{ChannelResult, Credentials, HealthReport};

#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Name of the backing tool, used in log lines.
    fn name(&self) -> &str {
        "health checker"
    }

    /// False when the backing tool is not installed; callers then skip checking.
    fn is_available(&self) -> bool;

    async fn check(&self, url: &str) -> HealthReport;
}

/// Copy a checker's findings onto a channel. Fields the checker left empty keep
/// whatever the SDP already told us.
pub fn merge_health(channel: &mut ChannelResult, report: HealthReport) {
    channel.working = Some(report.working);
    if report.codec.is_some() {
        channel.codec = report.codec;
    }
    if report.resolution.is_some() {
        channel.resolution = report.resolution;
    }
    channel.fps = report.fps;
    channel.bitrate = report.bitrate;
    channel.check_error = report.error;
}

/// Run `checker` against every channel that answered 200; others pass through untouched.
///
/// An unavailable checker is not an error: the channels come back unchanged.
pub async fn check_health(
    channels: Vec<ChannelResult>,
    checker: Arc<dyn HealthChecker>,
    creds: Option<&Credentials>,
    ctx: &ScanContext,
) -> Vec<ChannelResult> {
    if !checker.is_available() {
        let reason = ProbeFailure::ToolUnavailable(checker.name().to_string());
        warn!(%reason, "skipping stream checks");
        return channels;
    }

    let (candidates, mut rest): (Vec<_>, Vec<_>) =
        channels.into_iter().partition(|c| c.status_code == 200);
    let creds = creds.cloned().filter(|c| !c.is_empty());

    let report = scan(candidates, ctx.config.health_workers, ctx, move |mut ch| {
        let checker = checker.clone();
        let creds = creds.clone();
        async move {
            let url = match &creds {
                Some(c) => inject_credentials(&ch.url, Some(c)).unwrap_or_else(|_| ch.url.clone()),
                None => ch.url.clone(),
            };
            let health = checker.check(&url).await;
            debug!(host = %ch.target, path = %ch.path, working = health.working, "health check");
            merge_health(&mut ch, health);
            Some(ch)
        }
    })
    .await;

    rest.extend(report.entries);
    rest
}
