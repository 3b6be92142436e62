//! Single-request RTSP exchanges over a fresh TCP connection, plus URL helpers.
//!
//! Every exchange opens its own socket, writes one request, reads until the peer
//! closes, goes idle, the byte budget is spent or the deadline passes, and then
//! frames whatever arrived. Framing is deliberately lenient: consumer cameras
//! routinely send malformed header blocks and wrong `Content-Length` values.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as Base64;
use base64::Engine as _;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::debug;
use url::Url;

use crate::config::ScanConfig;
use crate::error::{ExchangeError, ScanError};
use crate::transport;
use crate::types::{Credentials, Target};

pub const DEFAULT_RTSP_PORT: u16 = 554;

static STATUS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^RTSP/\d\.\d\s+(\d{3})(?:\s+(.*))?$").expect("status line regex"));

static SDP_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]=").expect("sdp line regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtspMethod {
    Options,
    Describe,
    Setup,
    Play,
}

impl RtspMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RtspMethod::Options => "OPTIONS",
            RtspMethod::Describe => "DESCRIBE",
            RtspMethod::Setup => "SETUP",
            RtspMethod::Play => "PLAY",
        }
    }

    /// SETUP/PLAY replies are short header blocks; they get the smaller read budget.
    fn is_control(&self) -> bool {
        matches!(self, RtspMethod::Setup | RtspMethod::Play)
    }
}

impl fmt::Display for RtspMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to send.
#[derive(Debug, Clone)]
pub struct RtspRequest {
    pub method: RtspMethod,
    pub url: String,
    pub cseq: u32,
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    pub fn new(method: RtspMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            cseq: 1,
            headers: Vec::new(),
        }
    }

    pub fn cseq(mut self, cseq: u32) -> Self {
        self.cseq = cseq;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds `Authorization: Basic ...` unless the credentials are empty.
    pub fn basic_auth(self, creds: Option<&Credentials>) -> Self {
        match creds.filter(|c| !c.is_empty()) {
            Some(c) => {
                let token = Base64.encode(format!("{}:{}", c.username, c.password));
                self.header("Authorization", format!("Basic {token}"))
            }
            None => self,
        }
    }

    pub fn encode(&self, user_agent: &str) -> String {
        let mut req = format!(
            "{} {} RTSP/1.0\r\nCSeq: {}\r\nUser-Agent: {}\r\n",
            self.method, self.url, self.cseq, user_agent
        );
        if self.method == RtspMethod::Describe {
            req.push_str("Accept: application/sdp\r\n");
        }
        for (name, value) in &self.headers {
            req.push_str(name);
            req.push_str(": ");
            req.push_str(value);
            req.push_str("\r\n");
        }
        req.push_str("\r\n");
        req
    }
}

/// Raw, protocol-level result of one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOutcome {
    pub status_code: Option<u16>,
    pub reason: Option<String>,
    /// Header names lowercased; the last occurrence of a duplicate wins.
    pub headers: HashMap<String, String>,
    /// Non-blank lines following an SDP `Content-Type`, in order.
    pub body: Vec<String>,
    pub content_length: Option<usize>,
    pub sdp_content_type: bool,
    pub elapsed: Duration,
    pub error: Option<ExchangeError>,
}

impl ConnectionOutcome {
    fn failed(error: ExchangeError, elapsed: Duration) -> Self {
        Self {
            error: Some(error),
            elapsed,
            ..Self::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn server(&self) -> Option<&str> {
        self.header("server").filter(|s| !s.is_empty())
    }
}

/// Issues RTSP requests with the timeouts and read budgets of a [`ScanConfig`].
#[derive(Debug, Clone)]
pub struct RtspClient {
    timeout: Duration,
    idle_window: Duration,
    read_budget: usize,
    control_read_budget: usize,
    user_agent: String,
}

impl RtspClient {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            timeout: config.timeout,
            idle_window: config.idle_window,
            read_budget: config.read_budget.max(64),
            control_read_budget: config.control_read_budget.max(64),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Open a connection to `target`, send `request`, and frame the reply.
    ///
    /// Never fails; transport problems land in [`ConnectionOutcome::error`].
    pub async fn exchange(&self, target: &Target, request: &RtspRequest) -> ConnectionOutcome {
        let start = Instant::now();
        let deadline = start + self.timeout;

        let mut stream = match transport::connect(target, self.timeout).await {
            Ok(s) => s,
            Err(e) => {
                let err = ExchangeError::from(e);
                debug!(%target, method = %request.method, error = %err, "connect failed");
                return ConnectionOutcome::failed(err, start.elapsed());
            }
        };

        let payload = request.encode(&self.user_agent);
        match time::timeout_at(deadline, stream.write_all(payload.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return ConnectionOutcome::failed(e.into(), start.elapsed()),
            Err(_) => return ConnectionOutcome::failed(ExchangeError::Timeout, start.elapsed()),
        }

        let budget = if request.method.is_control() {
            self.control_read_budget
        } else {
            self.read_budget
        };
        let raw = read_response(&mut stream, budget, deadline, self.idle_window).await;
        let elapsed = start.elapsed();
        drop(stream);

        match raw {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let mut outcome = parse_response(&text);
                outcome.elapsed = elapsed;
                debug!(
                    %target,
                    method = %request.method,
                    url = %request.url,
                    status = ?outcome.status_code,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "rtsp exchange"
                );
                outcome
            }
            Err(err) => {
                debug!(%target, method = %request.method, error = %err, "read failed");
                ConnectionOutcome::failed(err, elapsed)
            }
        }
    }
}

/// Read until EOF, budget, idle window (after the first bytes) or deadline.
async fn read_response(
    stream: &mut TcpStream,
    budget: usize,
    deadline: Instant,
    idle_window: Duration,
) -> Result<Vec<u8>, ExchangeError> {
    let mut buf = vec![0u8; budget];
    let mut filled = 0usize;

    while filled < budget {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let wait = if filled == 0 {
            remaining
        } else {
            remaining.min(idle_window)
        };
        if wait.is_zero() {
            if filled == 0 {
                return Err(ExchangeError::Timeout);
            }
            break;
        }

        match time::timeout(wait, stream.read(&mut buf[filled..])).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => filled += n,
            Ok(Err(e)) if filled == 0 => return Err(e.into()),
            Err(_) if filled == 0 => return Err(ExchangeError::Timeout),
            // Partial response followed by reset or silence: keep what we have.
            Ok(Err(_)) | Err(_) => break,
        }
    }

    buf.truncate(filled);
    Ok(buf)
}

/// Frame a response. A first line that is not `RTSP/x.y NNN` yields `InvalidResponse`.
pub fn parse_response(raw: &str) -> ConnectionOutcome {
    let mut lines = raw.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    let status_line = lines.next().unwrap_or("").trim_end();
    let Some(caps) = STATUS_LINE.captures(status_line) else {
        return ConnectionOutcome {
            error: Some(ExchangeError::InvalidResponse),
            ..ConnectionOutcome::default()
        };
    };
    let status_code = caps.get(1).and_then(|m| m.as_str().parse::<u16>().ok());
    let reason = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .filter(|r| !r.is_empty());

    let mut outcome = ConnectionOutcome {
        status_code,
        reason,
        ..ConnectionOutcome::default()
    };

    let mut in_headers = true;
    for line in lines {
        if in_headers {
            if line.trim().is_empty() {
                in_headers = false;
                continue;
            }
            if let Some((name, value)) = split_header(line) {
                let name = name.to_ascii_lowercase();
                let value = value.trim().to_string();
                match name.as_str() {
                    "content-type" if value.to_ascii_lowercase().contains("sdp") => {
                        outcome.sdp_content_type = true;
                    }
                    "content-length" => {
                        outcome.content_length = value.parse().ok();
                    }
                    _ => {}
                }
                outcome.headers.insert(name, value);
                continue;
            }
            if !SDP_LINE.is_match(line) {
                // Malformed header line; skip it and keep reading headers.
                continue;
            }
            // Body started without the blank separator line.
            in_headers = false;
        }
        if outcome.sdp_content_type && !line.trim().is_empty() {
            outcome.body.push(line.to_string());
        }
    }

    outcome
}

/// `Name: value` where the name is a plain token; SDP lines like `a=rtpmap:96 ...` are not headers.
fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    let is_token = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    is_token.then_some((name, value))
}

/// Components of an `rtsp://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspUrl {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub credentials: Option<Credentials>,
}

impl RtspUrl {
    pub fn target(&self) -> Target {
        Target::new(self.host.clone(), self.port)
    }
}

/// Build `rtsp://[user[:pass]@]host:port/path`. Empty credentials are omitted,
/// and an empty password drops the `:` separator.
pub fn build_rtsp_url(target: &Target, path: &str, creds: Option<&Credentials>) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let plain = format!("rtsp://{target}{path}");
    let Ok(mut url) = Url::parse(&plain) else {
        return plain;
    };
    if set_userinfo(&mut url, creds).is_err() {
        return plain;
    }
    url.to_string()
}

/// Parse and validate an `rtsp://` URL.
pub fn parse_rtsp_url(url: &str) -> Result<RtspUrl, ScanError> {
    let parsed = Url::parse(url).map_err(|e| ScanError::InvalidTarget(format!("{url}: {e}")))?;
    if parsed.scheme() != "rtsp" {
        return Err(ScanError::InvalidTarget(format!("URL must start with 'rtsp://': {url}")));
    }

    let host = parsed
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ScanError::InvalidTarget(format!("missing hostname: {url}")))?;
    let port = match parsed.port() {
        Some(0) => return Err(ScanError::InvalidTarget(format!("invalid port in URL: {url}"))),
        Some(p) => p,
        None => DEFAULT_RTSP_PORT,
    };

    let mut path = match parsed.path() {
        "" => "/".to_string(),
        p => p.to_string(),
    };
    if let Some(q) = parsed.query() {
        path.push('?');
        path.push_str(q);
    }

    let credentials = (!parsed.username().is_empty() || parsed.password().is_some()).then(|| {
        Credentials::new(
            percent_decode(parsed.username()),
            percent_decode(parsed.password().unwrap_or("")),
        )
    });

    Ok(RtspUrl {
        host: host.to_string(),
        port,
        path,
        credentials,
    })
}

/// Replace whatever userinfo `url` carries with `creds` (or strip it when `None`).
pub fn inject_credentials(url: &str, creds: Option<&Credentials>) -> Result<String, ScanError> {
    let parsed = parse_rtsp_url(url)?;
    Ok(build_rtsp_url(&parsed.target(), &parsed.path, creds))
}

fn set_userinfo(url: &mut Url, creds: Option<&Credentials>) -> Result<(), ()> {
    match creds.filter(|c| !c.is_empty()) {
        Some(c) => {
            url.set_username(&c.username)?;
            let password = Some(c.password.as_str()).filter(|p| !p.is_empty());
            url.set_password(password)
        }
        None => {
            url.set_username("")?;
            url.set_password(None)
        }
    }
}

fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| s.to_string())
}
