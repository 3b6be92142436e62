use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ::time::{format_description::well_known, OffsetDateTime};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::corpus;
use crate::error::ScanError;
use crate::probe::{self, PermissivenessCache};
use crate::rtsp::RtspClient;
use crate::targets;
use crate::transport::probe_port;
use crate::types::{
    ChannelResult, CredentialAttempt, Credentials, PlaybackResult, PortResult,
    ProtocolProbeResult, ScanReport, Target,
};

/// Upper bound on any worker pool, whatever the caller asks for.
pub const MAX_WORKERS: usize = 5_000;

/// Called with `(completed, total)` after every finished unit of work.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Live counters a concurrent observer can poll while a scan runs.
#[derive(Clone, Debug)]
pub struct SharedProgress {
    pub scanned_total: Arc<AtomicU64>,
    pub scanned_done: Arc<AtomicU64>,
    pub found: Arc<AtomicU64>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self {
            scanned_total: Arc::new(AtomicU64::new(0)),
            scanned_done: Arc::new(AtomicU64::new(0)),
            found: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.scanned_done.load(Ordering::Relaxed),
            self.scanned_total.load(Ordering::Relaxed),
            self.found.load(Ordering::Relaxed),
        )
    }
}

impl Default for SharedProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration, cancellation and progress sinks for one or more scan calls.
#[derive(Clone, Default)]
pub struct ScanContext {
    pub config: Arc<ScanConfig>,
    pub cancel: CancellationToken,
    progress: Option<ProgressFn>,
    shared: Option<SharedProgress>,
}

impl ScanContext {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config: Arc::new(config),
            ..Self::default()
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, f: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn with_shared(mut self, shared: SharedProgress) -> Self {
        self.shared = Some(shared);
        self
    }
}

impl fmt::Debug for ScanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanContext")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .field("shared", &self.shared)
            .finish()
    }
}

/// Run `op` over every item on a pool of at most `workers` concurrent tasks.
///
/// Results are collected in completion order and only `Some` results are kept;
/// every finished item still counts toward progress. Cancellation stops new
/// submissions and waits for in-flight items to finish on their own timeouts.
pub async fn scan<I, T, F, Fut>(
    items: Vec<I>,
    workers: usize,
    ctx: &ScanContext,
    op: F,
) -> ScanReport<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Option<T>> + Send + 'static,
{
    let total = items.len() as u64;
    let started_at = now_iso_like();
    let scanned_done = Arc::new(AtomicU64::new(0));
    if let Some(s) = &ctx.shared {
        s.scanned_total.store(total, Ordering::Relaxed);
        s.scanned_done.store(0, Ordering::Relaxed);
        s.found.store(0, Ordering::Relaxed);
    }

    let sem = Arc::new(Semaphore::new(workers.clamp(1, MAX_WORKERS)));
    let mut set = JoinSet::new();

    for item in items {
        let permit = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            permit = sem.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };

        let fut = op(item);
        let scanned_done = scanned_done.clone();
        let progress = ctx.progress.clone();
        let shared = ctx.shared.clone();
        set.spawn(async move {
            let _permit = permit; // keep permit until task completes
            let out = fut.await;
            let done = scanned_done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(s) = &shared {
                s.scanned_done.fetch_add(1, Ordering::Relaxed);
                if out.is_some() {
                    s.found.fetch_add(1, Ordering::Relaxed);
                }
            }
            if let Some(cb) = &progress {
                cb(done, total);
            }
            out
        });
    }

    let mut entries = Vec::new();
    while let Some(res) = set.join_next().await {
        match res {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "scan task failed"),
        }
    }

    if ctx.cancel.is_cancelled() {
        info!(
            done = scanned_done.load(Ordering::Relaxed),
            total, "scan cancelled; in-flight work drained"
        );
    }

    ScanReport {
        scanned_total: total,
        scanned_done: scanned_done.load(Ordering::Relaxed),
        found: entries.len() as u64,
        started_at,
        finished_at: now_iso_like(),
        entries,
    }
}

/// TCP-connect every target; keeps open ports only.
pub async fn scan_ports(targets: &[Target], ctx: &ScanContext) -> ScanReport<PortResult> {
    let timeout = ctx.config.timeout;
    let targets = dedup(targets);
    info!(targets = targets.len(), "scanning ports");
    let report = scan(targets, ctx.config.port_workers, ctx, move |t| async move {
        let r = probe_port(&t, timeout).await;
        r.is_open().then_some(r)
    })
    .await;
    info!(open = report.found, scanned = report.scanned_done, "port scan complete");
    report
}

/// Expand target specs (host, range, CIDR) against `ports` and port-scan them.
///
/// A malformed target string fails the call before any probe is sent.
pub async fn scan_target_specs(
    specs: &[String],
    ports: &[u16],
    ctx: &ScanContext,
) -> Result<ScanReport<PortResult>, ScanError> {
    let targets = targets::expand_all(specs, ports)?;
    Ok(scan_ports(&targets, ctx).await)
}

/// OPTIONS every target; keeps the ones that answer with an RTSP status line.
pub async fn scan_protocols(targets: &[Target], ctx: &ScanContext) -> ScanReport<ProtocolProbeResult> {
    let client = Arc::new(RtspClient::new(&ctx.config));
    let targets = dedup(targets);
    info!(targets = targets.len(), "checking RTSP protocol");
    scan(targets, ctx.config.port_workers, ctx, move |t| {
        let client = client.clone();
        async move {
            let r = probe::check_rtsp_protocol(&client, &t).await;
            r.is_rtsp.then_some(r)
        }
    })
    .await
}

/// DESCRIBE every path on every target; keeps reachable channels.
///
/// Each target gets one permissiveness probe, run lazily by the first path probe
/// that needs it and shared by the rest.
pub async fn scan_channels(
    targets: &[Target],
    paths: &[String],
    creds: Option<&Credentials>,
    ctx: &ScanContext,
) -> ScanReport<ChannelResult> {
    let client = Arc::new(RtspClient::new(&ctx.config));
    let targets = dedup(targets);
    let cache = Arc::new(PermissivenessCache::new(&targets));
    let creds = creds.cloned().filter(|c| !c.is_empty());
    let paths = dedup(paths);

    let mut items = Vec::with_capacity(targets.len() * paths.len());
    for t in &targets {
        for p in &paths {
            items.push((t.clone(), p.clone()));
        }
    }
    info!(targets = targets.len(), paths = paths.len(), "scanning channel paths");

    let report = scan(items, ctx.config.channel_workers, ctx, move |(t, path)| {
        let client = client.clone();
        let cache = cache.clone();
        let creds = creds.clone();
        async move {
            let permissive = cache.is_permissive(&client, &t).await;
            probe::probe_channel(&client, &t, &path, creds.as_ref(), permissive).await
        }
    })
    .await;
    info!(found = report.found, "channel scan complete");
    report
}

/// Try every credential pair on every path of every target; keeps pairs that get 200 with SDP.
///
/// Without explicit paths, the first `credential_path_limit` corpus paths are used.
pub async fn scan_credentials(
    targets: &[Target],
    paths: Option<&[String]>,
    credentials: &[Credentials],
    ctx: &ScanContext,
) -> ScanReport<CredentialAttempt> {
    let paths = match paths {
        Some(p) if !p.is_empty() => dedup(p),
        _ => corpus::common_paths()
            .into_iter()
            .take(ctx.config.credential_path_limit)
            .collect(),
    };
    let targets = dedup(targets);
    let credentials = dedup(credentials);

    let mut items = Vec::with_capacity(targets.len() * credentials.len() * paths.len());
    for t in &targets {
        for c in &credentials {
            for p in &paths {
                items.push((t.clone(), c.clone(), p.clone()));
            }
        }
    }
    info!(
        targets = targets.len(),
        credentials = credentials.len(),
        paths = paths.len(),
        "scanning credentials"
    );

    let client = Arc::new(RtspClient::new(&ctx.config));
    let report = scan(items, ctx.config.channel_workers, ctx, move |(t, c, path)| {
        let client = client.clone();
        async move { probe::probe_credentials(&client, &t, &path, &c).await }
    })
    .await;
    info!(found = report.found, "credential scan complete");
    report
}

/// SETUP/PLAY each channel; every channel yields a record.
pub async fn verify_channels(
    channels: &[ChannelResult],
    creds: Option<&Credentials>,
    ctx: &ScanContext,
) -> ScanReport<PlaybackResult> {
    let client = Arc::new(RtspClient::new(&ctx.config));
    let creds = creds.cloned();
    scan(channels.to_vec(), ctx.config.verify_workers, ctx, move |ch| {
        let client = client.clone();
        let creds = creds.clone();
        async move { Some(probe::verify_playback(&client, &ch, creds.as_ref()).await) }
    })
    .await
}

/// Results of the port → protocol → channel pipeline.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Discovery {
    pub ports: ScanReport<PortResult>,
    pub protocols: ScanReport<ProtocolProbeResult>,
    pub channels: ScanReport<ChannelResult>,
}

impl Discovery {
    /// Open ports that did not answer RTSP.
    pub fn non_rtsp(&self) -> Vec<&PortResult> {
        let rtsp: HashSet<&Target> = self.protocols.entries.iter().map(|p| &p.target).collect();
        self.ports
            .entries
            .iter()
            .filter(|p| !rtsp.contains(&p.target))
            .collect()
    }

    /// RTSP host count per vendor name ("Unknown" when unrecognised).
    pub fn manufacturer_summary(&self) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        for p in &self.protocols.entries {
            let name = p
                .manufacturer
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            *out.entry(name).or_insert(0) += 1;
        }
        out
    }
}

/// Find open ports, keep the ones speaking RTSP, then enumerate `paths` on those.
pub async fn discover(
    targets: &[Target],
    paths: &[String],
    creds: Option<&Credentials>,
    ctx: &ScanContext,
) -> Discovery {
    let ports = scan_ports(targets, ctx).await;
    let open: Vec<Target> = ports.entries.iter().map(|p| p.target.clone()).collect();
    let protocols = scan_protocols(&open, ctx).await;
    let rtsp: Vec<Target> = protocols.entries.iter().map(|p| p.target.clone()).collect();
    let mut channels = scan_channels(&rtsp, paths, creds, ctx).await;

    // The DESCRIBE banner may be missing where OPTIONS carried one.
    for ch in &mut channels.entries {
        if ch.manufacturer.is_none() {
            if let Some(p) = protocols.entries.iter().find(|p| p.target == ch.target) {
                ch.manufacturer = p.manufacturer;
                if ch.server_banner.is_none() {
                    ch.server_banner = p.server_banner.clone();
                }
            }
        }
    }

    Discovery {
        ports,
        protocols,
        channels,
    }
}

/// Sort for stable presentation; scans themselves return completion order.
pub fn sort_channels(entries: &mut [ChannelResult]) {
    entries.sort_by(|a, b| (&a.target, &a.path).cmp(&(&b.target, &b.path)));
}

/// First occurrence of each item, in input order.
fn dedup<T: Clone + Eq + Hash>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    items.iter().filter(|i| seen.insert(*i)).cloned().collect()
}

pub(crate) fn now_iso_like() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
