mod common;

use std::time::Duration;

use common::{sdp_reply, H264_SDP};
use rtsp_scan_rs::config::ScanConfig;
use rtsp_scan_rs::error::ExchangeError;
use rtsp_scan_rs::rtsp::{build_rtsp_url, RtspClient, RtspMethod, RtspRequest};
use rtsp_scan_rs::types::Target;

fn describe(target: &Target) -> RtspRequest {
    RtspRequest::new(RtspMethod::Describe, build_rtsp_url(target, "/live", None))
}

#[tokio::test]
async fn silent_open_socket_times_out() {
    let server = common::spawn_hanging(String::new()).await;
    let client = RtspClient::new(&ScanConfig::new().timeout(Duration::from_millis(300)));

    let o = client.exchange(&server.target, &describe(&server.target)).await;

    assert_eq!(o.error, Some(ExchangeError::Timeout));
    assert_eq!(o.status_code, None);
    assert!(o.elapsed >= Duration::from_millis(250), "{:?}", o.elapsed);
    assert!(o.elapsed < Duration::from_secs(2), "{:?}", o.elapsed);
    assert_eq!(server.count("DESCRIBE", "/live"), 1);
}

#[tokio::test]
async fn reply_then_silence_returns_after_the_idle_window() {
    let server = common::spawn_hanging(sdp_reply("Reolink", H264_SDP)).await;
    let config = ScanConfig::new()
        .timeout(Duration::from_secs(3))
        .idle_window(Duration::from_millis(100));
    let client = RtspClient::new(&config);

    let o = client.exchange(&server.target, &describe(&server.target)).await;

    assert_eq!(o.error, None);
    assert_eq!(o.status_code, Some(200));
    assert!(o.sdp_content_type);
    assert_eq!(o.body.len(), H264_SDP.len());
    assert!(o.elapsed < Duration::from_millis(1500), "{:?}", o.elapsed);
}

#[tokio::test]
async fn oversized_reply_is_cut_at_the_read_budget() {
    let mut lines = vec!["v=0".to_string(), "m=video 0 RTP/AVP 96".to_string()];
    lines.extend((0..800).map(|i| format!("a=x-pad:{i:06}")));
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    let server = common::spawn_hanging(sdp_reply("Reolink", &lines)).await;

    let mut config = ScanConfig::new()
        .timeout(Duration::from_secs(5))
        .idle_window(Duration::from_secs(3));
    config.read_budget = 512;
    let client = RtspClient::new(&config);

    let o = client.exchange(&server.target, &describe(&server.target)).await;

    assert_eq!(o.status_code, Some(200));
    assert_eq!(o.body.first().map(String::as_str), Some("v=0"));
    assert!(o.body.len() < 40, "read {} body lines", o.body.len());
    // Budget reached before the idle window had a chance to expire.
    assert!(o.elapsed < Duration::from_secs(2), "{:?}", o.elapsed);
}

#[tokio::test]
async fn configured_user_agent_is_sent() {
    let server = common::spawn_rtsp(|req| common::reply(200, "OK", &[], req.header("CSeq"))).await;
    let client = RtspClient::new(
        &ScanConfig::new()
            .timeout(Duration::from_millis(500))
            .user_agent("cam-audit/2.1"),
    );

    let o = client.exchange(&server.target, &describe(&server.target)).await;

    assert_eq!(o.status_code, Some(200));
    let req = &server.requests()[0];
    assert_eq!(req.header("User-Agent"), Some("cam-audit/2.1"));
}
