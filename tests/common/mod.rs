//! In-process RTSP server for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use rtsp_scan_rs::rtsp::parse_rtsp_url;
use rtsp_scan_rs::types::Target;

/// What the mock saw of one request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Path plus query of the request URL.
    pub fn path(&self) -> String {
        parse_rtsp_url(&self.url)
            .map(|u| u.path)
            .unwrap_or_else(|_| self.url.clone())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct MockServer {
    pub target: Target,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl MockServer {
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path() == path)
            .count()
    }
}

/// Serve every connection with `handler`'s reply, then close it.
pub async fn spawn_rtsp<F>(handler: F) -> MockServer
where
    F: Fn(&Request) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let log = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            let handler = handler.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let Some(req) = read_request(&mut sock).await else {
                    return;
                };
                let reply = handler(&req);
                log.lock().unwrap().push(req);
                let _ = sock.write_all(reply.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });

    MockServer {
        target: Target::new("127.0.0.1", port),
        requests,
    }
}

/// Answer every connection with `reply` (possibly empty), then hold the socket
/// open until the client hangs up.
pub async fn spawn_hanging(reply: String) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let log = requests.clone();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let reply = reply.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let Some(req) = read_request(&mut sock).await else {
                    return;
                };
                log.lock().unwrap().push(req);
                if sock.write_all(reply.as_bytes()).await.is_err() {
                    return;
                }
                let mut sink = [0u8; 256];
                while matches!(sock.read(&mut sink).await, Ok(n) if n > 0) {}
            });
        }
    });

    MockServer {
        target: Target::new("127.0.0.1", port),
        requests,
    }
}

/// A TCP server that accepts and closes without a word.
pub async fn spawn_silent() -> Target {
    spawn_raw(String::new()).await
}

/// A TCP server that answers every connection with `payload` (e.g. an HTTP banner).
pub async fn spawn_raw(payload: String) -> Target {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let payload = payload.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(payload.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });
    Target::new("127.0.0.1", port)
}

/// A port with nothing listening on it.
pub async fn closed_target() -> Target {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Target::new("127.0.0.1", port)
}

async fn read_request(sock: &mut tokio::net::TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = sock.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let text = String::from_utf8_lossy(&buf);
    let mut lines = text.split("\r\n");
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let url = first.next()?.to_string();
    let headers = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();
    Some(Request {
        method,
        url,
        headers,
    })
}

pub fn reply(code: u16, reason: &str, extra_headers: &[(&str, &str)], cseq: Option<&str>) -> String {
    let mut out = format!("RTSP/1.0 {code} {reason}\r\nCSeq: {}\r\n", cseq.unwrap_or("1"));
    for (n, v) in extra_headers {
        out.push_str(&format!("{n}: {v}\r\n"));
    }
    out.push_str("\r\n");
    out
}

pub fn sdp_reply(server: &str, sdp_lines: &[&str]) -> String {
    let body = sdp_lines.join("\r\n") + "\r\n";
    format!(
        "RTSP/1.0 200 OK\r\nCSeq: 1\r\nServer: {server}\r\nContent-Type: application/sdp\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

pub fn unauthorized() -> String {
    reply(401, "Unauthorized", &[("WWW-Authenticate", "Basic realm=\"camera\"")], None)
}

pub fn not_found() -> String {
    reply(404, "Not Found", &[], None)
}

pub const H264_SDP: &[&str] = &[
    "v=0",
    "o=- 1 1 IN IP4 0.0.0.0",
    "s=Media Presentation",
    "m=video 0 RTP/AVP 96",
    "a=rtpmap:96 H264/90000",
    "a=x-dimensions=1920,1080",
];
