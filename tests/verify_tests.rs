mod common;

use std::time::Duration;

use common::{not_found, reply, sdp_reply, unauthorized, H264_SDP};
use rtsp_scan_rs::config::ScanConfig;
use rtsp_scan_rs::error::ProbeFailure;
use rtsp_scan_rs::scanner::{scan_channels, verify_channels, ScanContext};
use rtsp_scan_rs::types::{ChannelResult, Credentials};

fn ctx() -> ScanContext {
    ScanContext::new(ScanConfig::new().timeout(Duration::from_millis(500)))
}

async fn found_channels(server: &common::MockServer, creds: Option<&Credentials>) -> Vec<ChannelResult> {
    scan_channels(&[server.target.clone()], &["/live".to_string()], creds, &ctx())
        .await
        .entries
}

#[tokio::test]
async fn setup_session_is_carried_into_play() {
    let server = common::spawn_rtsp(|req| match (req.method.as_str(), req.path().as_str()) {
        ("DESCRIBE", "/live") => sdp_reply("Reolink", H264_SDP),
        ("SETUP", "/live") => reply(200, "OK", &[("Session", "ABC123;timeout=60")], req.header("CSeq")),
        ("PLAY", "/live") if req.header("Session") == Some("ABC123") => {
            reply(200, "OK", &[("RTP-Info", "url=trackID=1")], req.header("CSeq"))
        }
        ("PLAY", _) => reply(454, "Session Not Found", &[], req.header("CSeq")),
        _ => not_found(),
    })
    .await;

    let channels = found_channels(&server, None).await;
    assert_eq!(channels.len(), 1);
    let report = verify_channels(&channels, None, &ctx()).await;

    assert_eq!(report.entries.len(), 1);
    let r = &report.entries[0];
    assert!(r.setup_ok && r.play_ok && r.playable);
    assert_eq!(r.session.as_deref(), Some("ABC123"));
    assert_eq!(r.error, None);

    let setup = server.requests().into_iter().find(|r| r.method == "SETUP").unwrap();
    assert_eq!(setup.header("CSeq"), Some("2"));
    assert!(setup.header("Transport").is_some_and(|t| t.contains("unicast")));
    let play = server.requests().into_iter().find(|r| r.method == "PLAY").unwrap();
    assert_eq!(play.header("CSeq"), Some("3"));
    assert_eq!(play.header("Range"), Some("npt=0.000-"));
}

#[tokio::test]
async fn missing_session_falls_back_to_placeholder() {
    let server = common::spawn_rtsp(|req| match req.method.as_str() {
        "DESCRIBE" if req.path() == "/live" => sdp_reply("Reolink", H264_SDP),
        "SETUP" => reply(200, "OK", &[], req.header("CSeq")),
        "PLAY" if req.header("Session") == Some("12345678") => reply(200, "OK", &[], req.header("CSeq")),
        _ => not_found(),
    })
    .await;

    let channels = found_channels(&server, None).await;
    let report = verify_channels(&channels, None, &ctx()).await;
    let r = &report.entries[0];
    assert!(r.setup_ok);
    assert_eq!(r.session, None);
    assert!(r.playable);
}

#[tokio::test]
async fn rejected_setup_stops_before_play() {
    let server = common::spawn_rtsp(|req| match req.method.as_str() {
        "DESCRIBE" if req.path() == "/live" => sdp_reply("Reolink", H264_SDP),
        "SETUP" => reply(461, "Unsupported Transport", &[], req.header("CSeq")),
        _ => not_found(),
    })
    .await;

    let channels = found_channels(&server, None).await;
    let report = verify_channels(&channels, None, &ctx()).await;
    let r = &report.entries[0];
    assert!(!r.setup_ok && !r.playable);
    assert_eq!(r.error, Some(ProbeFailure::SetupRejected));
    assert_eq!(server.requests().iter().filter(|r| r.method == "PLAY").count(), 0);
}

#[tokio::test]
async fn auth_channel_without_credentials_is_not_attempted() {
    let server = common::spawn_rtsp(|req| match req.path().as_str() {
        "/live" => unauthorized(),
        _ => not_found(),
    })
    .await;

    let channels = found_channels(&server, None).await;
    assert_eq!(channels.len(), 1);
    assert!(channels[0].requires_auth);

    let report = verify_channels(&channels, None, &ctx()).await;
    let r = &report.entries[0];
    assert!(!r.playable);
    assert_eq!(
        r.error.as_ref().map(|e| e.to_string()).as_deref(),
        Some("Authentication required but no credentials provided")
    );
    assert_eq!(server.requests().iter().filter(|r| r.method == "SETUP").count(), 0);
}

#[tokio::test]
async fn credentials_in_channel_url_are_reused() {
    let server = common::spawn_rtsp(|req| {
        let authorized = req.header("Authorization") == Some("Basic YWRtaW46MTIzNDU=");
        match (req.method.as_str(), req.path().as_str(), authorized) {
            (_, "/live", false) => unauthorized(),
            ("DESCRIBE", "/live", true) => sdp_reply("Hikvision-Webs", H264_SDP),
            ("SETUP", "/live", true) => reply(200, "OK", &[("Session", "77")], req.header("CSeq")),
            ("PLAY", "/live", true) => reply(200, "OK", &[], req.header("CSeq")),
            _ => not_found(),
        }
    })
    .await;

    let creds = Credentials::new("admin", "12345");
    let channels = found_channels(&server, Some(&creds)).await;
    assert_eq!(channels[0].status_code, 200);

    let report = verify_channels(&channels, None, &ctx()).await;
    assert!(report.entries[0].playable);
}
