use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProbeFailure;

/// One host:port pair to probe. Every result record carries the target it was produced for.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// A username/password pair. Either side may be empty.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Open,
    Closed,
}

/// Outcome of one TCP connect attempt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortResult {
    #[serde(flatten)]
    pub target: Target,
    pub status: PortStatus,
    #[serde(rename = "latency_ms", with = "duration_ms")]
    pub latency: Duration,
}

impl PortResult {
    pub fn is_open(&self) -> bool {
        self.status == PortStatus::Open
    }
}

/// Camera vendors recognised from the RTSP `Server` header.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Manufacturer {
    Hikvision,
    Dahua,
    Axis,
    Foscam,
    Amcrest,
    Reolink,
    Uniview,
    Hanwha,
    Vivotek,
    Geovision,
    Bosch,
    Honeywell,
    Pelco,
    Panasonic,
    Sony,
    Ubiquiti,
    #[serde(rename = "TP-Link")]
    TpLink,
    Wyze,
    Eufy,
}

impl Manufacturer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Manufacturer::Hikvision => "Hikvision",
            Manufacturer::Dahua => "Dahua",
            Manufacturer::Axis => "Axis",
            Manufacturer::Foscam => "Foscam",
            Manufacturer::Amcrest => "Amcrest",
            Manufacturer::Reolink => "Reolink",
            Manufacturer::Uniview => "Uniview",
            Manufacturer::Hanwha => "Hanwha",
            Manufacturer::Vivotek => "Vivotek",
            Manufacturer::Geovision => "Geovision",
            Manufacturer::Bosch => "Bosch",
            Manufacturer::Honeywell => "Honeywell",
            Manufacturer::Pelco => "Pelco",
            Manufacturer::Panasonic => "Panasonic",
            Manufacturer::Sony => "Sony",
            Manufacturer::Ubiquiti => "Ubiquiti",
            Manufacturer::TpLink => "TP-Link",
            Manufacturer::Wyze => "Wyze",
            Manufacturer::Eufy => "Eufy",
        }
    }
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an OPTIONS probe: is something on this port actually speaking RTSP?
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProtocolProbeResult {
    #[serde(flatten)]
    pub target: Target,
    pub is_rtsp: bool,
    pub server_banner: Option<String>,
    pub manufacturer: Option<Manufacturer>,
    pub supported_methods: Option<Vec<String>>,
    pub error: Option<ProbeFailure>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamType {
    Main,
    Sub,
    #[default]
    Unknown,
}

/// A stream path found on a target.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChannelResult {
    #[serde(flatten)]
    pub target: Target,
    pub url: String,
    pub path: String,
    pub status_code: u16,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
    pub stream_type: StreamType,
    pub codec: Option<String>,
    pub resolution: Option<String>,
    pub server_banner: Option<String>,
    pub manufacturer: Option<Manufacturer>,
    pub requires_auth: bool,
    /// Filled in by an external health checker, when one ran.
    pub working: Option<bool>,
    pub fps: Option<String>,
    pub bitrate: Option<String>,
    pub check_error: Option<String>,
}

/// A credential pair that unlocked a stream path.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialAttempt {
    #[serde(flatten)]
    pub target: Target,
    pub url: String,
    pub path: String,
    pub username: String,
    pub password: String,
    pub status_code: u16,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
}

/// Whether a SETUP/PLAY handshake was accepted for a channel.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PlaybackResult {
    #[serde(flatten)]
    pub target: Target,
    pub url: String,
    pub setup_ok: bool,
    pub play_ok: bool,
    pub playable: bool,
    pub session: Option<String>,
    pub error: Option<ProbeFailure>,
}

/// What an external stream health checker reports for one URL.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct HealthReport {
    pub working: bool,
    pub codec: Option<String>,
    pub resolution: Option<String>,
    pub fps: Option<String>,
    pub bitrate: Option<String>,
    pub error: Option<String>,
}

/// Aggregate results and progress counters of one scan call.
#[derive(Serialize, Debug, Clone)]
pub struct ScanReport<T> {
    pub scanned_total: u64,
    pub scanned_done: u64,
    pub found: u64,
    pub started_at: String,
    pub finished_at: String,
    pub entries: Vec<T>,
}

impl<T> ScanReport<T> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_display_brackets_ipv6() {
        assert_eq!(Target::new("10.0.0.5", 554).to_string(), "10.0.0.5:554");
        assert_eq!(Target::new("fe80::1", 554).to_string(), "[fe80::1]:554");
    }

    #[test]
    fn port_result_serializes_flat_with_millis() {
        let r = PortResult {
            target: Target::new("10.0.0.5", 554),
            status: PortStatus::Open,
            latency: Duration::from_millis(12),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["host"], "10.0.0.5");
        assert_eq!(v["port"], 554);
        assert_eq!(v["status"], "open");
        assert_eq!(v["latency_ms"], 12);
    }

    #[test]
    fn manufacturer_names() {
        assert_eq!(Manufacturer::TpLink.to_string(), "TP-Link");
        assert_eq!(
            serde_json::to_string(&Manufacturer::TpLink).unwrap(),
            "\"TP-Link\""
        );
    }
}
