use std::net::Ipv4Addr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Input errors that abort a whole scan call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid IP range {start}-{end} (start > end)")]
    InvalidRange { start: Ipv4Addr, end: Ipv4Addr },

    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),
}

/// Transport-level failure of a single RTSP exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("connection timeout")]
    Timeout,

    #[error("socket error: {0}")]
    SocketError(String),

    #[error("invalid RTSP response")]
    InvalidResponse,
}

impl From<std::io::Error> for ExchangeError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => ExchangeError::Timeout,
            _ => ExchangeError::SocketError(e.to_string()),
        }
    }
}

/// Why a unit of work produced a negative (or qualified) result.
///
/// These never abort a scan; they are folded into the result record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("Connection timeout")]
    Timeout,

    #[error("Socket error: {0}")]
    SocketError(String),

    #[error("Invalid RTSP response")]
    InvalidResponse,

    #[error("Not RTSP protocol")]
    NotRtsp,

    #[error("Authentication required")]
    AuthRequired,

    #[error("Authentication required but no credentials provided")]
    MissingCredentials,

    #[error("Path not found")]
    NotFound,

    #[error("No valid SDP content")]
    NoValidContent,

    #[error("Status code: {0}")]
    UnexpectedStatus(u16),

    #[error("SETUP request failed")]
    SetupRejected,

    #[error("PLAY request failed")]
    PlayRejected,

    #[error("health checker unavailable: {0}")]
    ToolUnavailable(String),
}

impl From<ExchangeError> for ProbeFailure {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::Timeout => ProbeFailure::Timeout,
            ExchangeError::SocketError(detail) => ProbeFailure::SocketError(detail),
            ExchangeError::InvalidResponse => ProbeFailure::InvalidResponse,
        }
    }
}

// Records carry the human-readable reason when exported.
impl Serialize for ProbeFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
