//! Interpretation of a [`ConnectionOutcome`]: reachability, auth, vendor.

use crate::error::{ExchangeError, ProbeFailure};
use crate::rtsp::ConnectionOutcome;
use crate::types::Manufacturer;

/// `Server` header fragments, first match wins. Brand names precede the generic
/// fragments so that e.g. `DH-IPC-HFW` is Dahua rather than a bare `ipc` hit.
///
/// This intentionally departs from the usual vendor-grouped table, which lists
/// Hikvision's generic `hik`/`dvr`/`nvr`/`ipc` before Dahua's `dh-`/`ipc-` and so
/// reports every `DH-IPC-*` banner as Hikvision.
pub const MANUFACTURER_KEYWORDS: &[(&str, Manufacturer)] = &[
    ("hikvision", Manufacturer::Hikvision),
    ("dahua", Manufacturer::Dahua),
    ("axis", Manufacturer::Axis),
    ("vapix", Manufacturer::Axis),
    ("foscam", Manufacturer::Foscam),
    ("amcrest", Manufacturer::Amcrest),
    ("reolink", Manufacturer::Reolink),
    ("uniview", Manufacturer::Uniview),
    ("hanwha", Manufacturer::Hanwha),
    ("samsung", Manufacturer::Hanwha),
    ("wisenet", Manufacturer::Hanwha),
    ("vivotek", Manufacturer::Vivotek),
    ("geovision", Manufacturer::Geovision),
    ("bosch", Manufacturer::Bosch),
    ("honeywell", Manufacturer::Honeywell),
    ("pelco", Manufacturer::Pelco),
    ("panasonic", Manufacturer::Panasonic),
    ("sony", Manufacturer::Sony),
    ("ubiquiti", Manufacturer::Ubiquiti),
    ("ubnt", Manufacturer::Ubiquiti),
    ("unifi", Manufacturer::Ubiquiti),
    ("tp-link", Manufacturer::TpLink),
    ("tapo", Manufacturer::TpLink),
    ("wyze", Manufacturer::Wyze),
    ("eufy", Manufacturer::Eufy),
    ("anker", Manufacturer::Eufy),
    ("ipcam", Manufacturer::Foscam),
    ("dh-", Manufacturer::Dahua),
    ("ipc-", Manufacturer::Dahua),
    ("gv-", Manufacturer::Geovision),
    ("unv", Manufacturer::Uniview),
    ("hik", Manufacturer::Hikvision),
    ("dvr", Manufacturer::Hikvision),
    ("nvr", Manufacturer::Hikvision),
    ("ipc", Manufacturer::Hikvision),
];

pub fn detect_manufacturer(server: &str) -> Option<Manufacturer> {
    let lower = server.to_ascii_lowercase();
    MANUFACTURER_KEYWORDS
        .iter()
        .find(|(kw, _)| lower.contains(kw))
        .map(|(_, m)| *m)
}

/// Verdict on one DESCRIBE outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub reachable: bool,
    pub has_valid_sdp: bool,
    pub requires_auth: bool,
    pub error: Option<ProbeFailure>,
}

impl Classification {
    fn unreachable(error: ProbeFailure) -> Self {
        Self {
            reachable: false,
            has_valid_sdp: false,
            requires_auth: false,
            error: Some(error),
        }
    }
}

/// SDP-typed body carrying at least one session-description marker.
pub fn has_valid_sdp(outcome: &ConnectionOutcome) -> bool {
    outcome.sdp_content_type
        && outcome
            .body
            .iter()
            .any(|l| l.contains("v=") || l.contains("m=") || l.contains("a=rtpmap"))
}

/// Decide reachability of a path from its DESCRIBE outcome.
///
/// `permissive` marks a server already seen answering 401 (or SDP-bearing 200)
/// to a path that cannot exist; its 401s prove nothing about path existence.
pub fn classify(outcome: &ConnectionOutcome, permissive: bool) -> Classification {
    let Some(code) = outcome.status_code else {
        let reason = match &outcome.error {
            Some(ExchangeError::Timeout) => ProbeFailure::Timeout,
            Some(ExchangeError::SocketError(detail)) => ProbeFailure::SocketError(detail.clone()),
            Some(ExchangeError::InvalidResponse) | None => ProbeFailure::InvalidResponse,
        };
        return Classification::unreachable(reason);
    };

    match code {
        200 => {
            if has_valid_sdp(outcome) {
                Classification {
                    reachable: true,
                    has_valid_sdp: true,
                    requires_auth: false,
                    error: None,
                }
            } else {
                Classification::unreachable(ProbeFailure::NoValidContent)
            }
        }
        401 => Classification {
            reachable: !permissive,
            has_valid_sdp: false,
            requires_auth: true,
            error: Some(ProbeFailure::AuthRequired),
        },
        404 => Classification::unreachable(ProbeFailure::NotFound),
        other => Classification::unreachable(ProbeFailure::UnexpectedStatus(other)),
    }
}
