//! Immutable scan configuration passed into every scan call.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::duration_ms;

/// Tunables shared by all probe kinds.
///
/// Worker defaults differ per operation: cheap TCP connects get the widest pool,
/// multi-step SETUP/PLAY verification and external health checks the narrowest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Bound on connect and on the first response read of every operation.
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    pub port_workers: usize,
    pub channel_workers: usize,
    pub verify_workers: usize,
    pub health_workers: usize,
    pub user_agent: String,
    /// Max response bytes read for OPTIONS/DESCRIBE.
    pub read_budget: usize,
    /// Max response bytes read for SETUP/PLAY.
    pub control_read_budget: usize,
    /// Once a response has started, stop reading after this much silence.
    #[serde(rename = "idle_window_ms", with = "duration_ms")]
    pub idle_window: Duration,
    /// Paths tried per credential pair when no explicit path list is given.
    pub credential_path_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            port_workers: 50,
            channel_workers: 20,
            verify_workers: 5,
            health_workers: 5,
            user_agent: format!("rtsp-scan-rs/{}", env!("CARGO_PKG_VERSION")),
            read_budget: 4096,
            control_read_budget: 1024,
            idle_window: Duration::from_millis(200),
            credential_path_limit: 20,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override every worker pool size at once, keeping the verify/health pools no wider
    /// than their defaults.
    pub fn workers(mut self, workers: usize) -> Self {
        let workers = workers.max(1);
        self.port_workers = workers;
        self.channel_workers = workers;
        self.verify_workers = self.verify_workers.min(workers);
        self.health_workers = self.health_workers.min(workers);
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn idle_window(mut self, window: Duration) -> Self {
        self.idle_window = window;
        self
    }

    /// Overlay `RTSP_SCAN_*` environment variables. Unparseable values are ignored.
    pub fn merge_env(self) -> Self {
        self.merge_from(|key| std::env::var(key).ok())
    }

    fn merge_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = lookup("RTSP_SCAN_TIMEOUT_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(n) = lookup("RTSP_SCAN_WORKERS").and_then(|v| v.trim().parse::<usize>().ok()) {
            self = self.workers(n);
        }
        if let Some(ua) = lookup("RTSP_SCAN_USER_AGENT") {
            if !ua.trim().is_empty() {
                self.user_agent = ua;
            }
        }
        self
    }
}
