//! One unit of work each: a protocol check, a path probe, a credential probe,
//! a permissiveness probe, or a SETUP/PLAY verification.

use std::collections::HashMap;

use tokio::sync::OnceCell;
use tracing::debug;

use crate::classify::{classify, detect_manufacturer};
use crate::corpus::{detect_stream_type, PROBE_NONEXISTENT_PATH};
use crate::error::{ExchangeError, ProbeFailure};
use crate::rtsp::{build_rtsp_url, parse_rtsp_url, RtspClient, RtspMethod, RtspRequest};
use crate::sdp::parse_description;
use crate::types::{
    ChannelResult, CredentialAttempt, Credentials, PlaybackResult, ProtocolProbeResult, Target,
};

/// Session id sent with PLAY when SETUP did not return one.
const FALLBACK_SESSION: &str = "12345678";

/// Client ports announced in SETUP; nothing listens on them, only acceptance matters.
const SETUP_TRANSPORT: &str = "RTP/AVP;unicast;client_port=8000-8001";

/// OPTIONS `rtsp://host:port/` and report whether the peer speaks RTSP.
pub async fn check_rtsp_protocol(client: &RtspClient, target: &Target) -> ProtocolProbeResult {
    let url = build_rtsp_url(target, "/", None);
    let outcome = client
        .exchange(target, &RtspRequest::new(RtspMethod::Options, url))
        .await;

    let mut result = ProtocolProbeResult {
        target: target.clone(),
        is_rtsp: false,
        server_banner: None,
        manufacturer: None,
        supported_methods: None,
        error: None,
    };

    if outcome.status_code.is_none() {
        result.error = Some(match outcome.error {
            Some(e @ (ExchangeError::Timeout | ExchangeError::SocketError(_))) => e.into(),
            _ => ProbeFailure::NotRtsp,
        });
        debug!(%target, error = ?result.error, "no RTSP on port");
        return result;
    }

    result.is_rtsp = true;
    result.server_banner = outcome.server().map(str::to_string);
    result.manufacturer = result.server_banner.as_deref().and_then(detect_manufacturer);
    result.supported_methods = outcome.header("public").map(|methods| {
        methods
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    });
    debug!(%target, server = ?result.server_banner, "RTSP protocol detected");
    result
}

/// DESCRIBE a path that cannot exist. A server that still answers 401, or 200 with
/// SDP, accepts arbitrary paths. Transport failures count as strict.
pub async fn detect_permissive(client: &RtspClient, target: &Target) -> bool {
    let url = build_rtsp_url(target, PROBE_NONEXISTENT_PATH, None);
    let outcome = client
        .exchange(target, &RtspRequest::new(RtspMethod::Describe, url))
        .await;
    let verdict = classify(&outcome, false);
    let permissive = verdict.reachable;
    debug!(%target, status = ?outcome.status_code, permissive, "permissiveness probe");
    permissive
}

/// Per-target permissiveness verdicts, computed at most once each and shared
/// read-only by every path probe against that target.
#[derive(Debug, Default)]
pub struct PermissivenessCache {
    cells: HashMap<Target, OnceCell<bool>>,
}

impl PermissivenessCache {
    pub fn new<'a>(targets: impl IntoIterator<Item = &'a Target>) -> Self {
        Self {
            cells: targets
                .into_iter()
                .map(|t| (t.clone(), OnceCell::new()))
                .collect(),
        }
    }

    pub async fn is_permissive(&self, client: &RtspClient, target: &Target) -> bool {
        match self.cells.get(target) {
            Some(cell) => *cell
                .get_or_init(|| detect_permissive(client, target))
                .await,
            None => detect_permissive(client, target).await,
        }
    }
}

/// DESCRIBE one path and build a [`ChannelResult`] if it classifies as reachable.
pub async fn probe_channel(
    client: &RtspClient,
    target: &Target,
    path: &str,
    creds: Option<&Credentials>,
    permissive: bool,
) -> Option<ChannelResult> {
    let url = build_rtsp_url(target, path, creds);
    let request = RtspRequest::new(RtspMethod::Describe, url.clone()).basic_auth(creds);
    let outcome = client.exchange(target, &request).await;
    let verdict = classify(&outcome, permissive);

    let status_code = match (verdict.reachable, outcome.status_code) {
        (true, Some(code)) => code,
        _ => {
            debug!(%target, path, status = ?outcome.status_code, reason = ?verdict.error, "channel not available");
            return None;
        }
    };

    let description = if verdict.has_valid_sdp {
        parse_description(&outcome.body)
    } else {
        Default::default()
    };
    let server_banner = outcome.server().map(str::to_string);

    debug!(%target, path, status = status_code, "found channel");
    Some(ChannelResult {
        target: target.clone(),
        url,
        path: path.to_string(),
        status_code,
        elapsed: outcome.elapsed,
        stream_type: detect_stream_type(path),
        codec: description.codec,
        resolution: description.resolution,
        manufacturer: server_banner.as_deref().and_then(detect_manufacturer),
        server_banner,
        requires_auth: status_code == 401,
        working: None,
        fps: None,
        bitrate: None,
        check_error: None,
    })
}

/// DESCRIBE one path with one credential pair; kept only on 200 with SDP.
pub async fn probe_credentials(
    client: &RtspClient,
    target: &Target,
    path: &str,
    creds: &Credentials,
) -> Option<CredentialAttempt> {
    let url = build_rtsp_url(target, path, Some(creds));
    let request = RtspRequest::new(RtspMethod::Describe, url.clone()).basic_auth(Some(creds));
    let outcome = client.exchange(target, &request).await;
    let verdict = classify(&outcome, false);

    if !(verdict.reachable && outcome.status_code == Some(200)) {
        debug!(%target, path, user = %creds.username, status = ?outcome.status_code, "credentials rejected");
        return None;
    }

    debug!(%target, path, user = %creds.username, "credentials accepted");
    Some(CredentialAttempt {
        target: target.clone(),
        url,
        path: path.to_string(),
        username: creds.username.clone(),
        password: creds.password.clone(),
        status_code: 200,
        elapsed: outcome.elapsed,
    })
}

/// Confirm a SETUP then PLAY are accepted for a found channel.
///
/// Each request is an independent exchange on its own connection; the session id
/// returned by SETUP is carried into PLAY.
pub async fn verify_playback(
    client: &RtspClient,
    channel: &ChannelResult,
    creds: Option<&Credentials>,
) -> PlaybackResult {
    let mut result = PlaybackResult {
        target: channel.target.clone(),
        url: channel.url.clone(),
        setup_ok: false,
        play_ok: false,
        playable: false,
        session: None,
        error: None,
    };

    let creds = creds
        .cloned()
        .or_else(|| parse_rtsp_url(&channel.url).ok().and_then(|u| u.credentials))
        .filter(|c| !c.is_empty());

    if channel.status_code == 401 && creds.is_none() {
        result.error = Some(ProbeFailure::MissingCredentials);
        return result;
    }

    let target = &channel.target;
    let url = build_rtsp_url(target, &channel.path, creds.as_ref());

    let setup = RtspRequest::new(RtspMethod::Setup, url.clone())
        .cseq(2)
        .header("Transport", SETUP_TRANSPORT)
        .basic_auth(creds.as_ref());
    let outcome = client.exchange(target, &setup).await;
    let session = outcome
        .header("session")
        .and_then(|s| s.split(';').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if outcome.status_code != Some(200) && session.is_none() {
        result.error = Some(match (outcome.status_code, outcome.error) {
            (None, Some(e)) => e.into(),
            _ => ProbeFailure::SetupRejected,
        });
        debug!(%target, path = %channel.path, status = ?outcome.status_code, "SETUP rejected");
        return result;
    }
    result.setup_ok = true;
    result.session = session;

    let play = RtspRequest::new(RtspMethod::Play, url)
        .cseq(3)
        .header(
            "Session",
            result.session.as_deref().unwrap_or(FALLBACK_SESSION),
        )
        .header("Range", "npt=0.000-")
        .basic_auth(creds.as_ref());
    let outcome = client.exchange(target, &play).await;

    if outcome.status_code == Some(200) {
        result.play_ok = true;
        result.playable = true;
        debug!(%target, path = %channel.path, "stream playable");
    } else {
        result.error = Some(match (outcome.status_code, outcome.error) {
            (None, Some(e)) => e.into(),
            _ => ProbeFailure::PlayRejected,
        });
        debug!(%target, path = %channel.path, status = ?outcome.status_code, "PLAY rejected");
    }
    result
}
