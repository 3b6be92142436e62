use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::types::{PortResult, PortStatus, Target};

/// Attempt one TCP connect to `target` within `timeout`.
///
/// Refusal, timeout, resolution failure and any other I/O error all map to
/// [`PortStatus::Closed`]; latency is measured from the call start either way.
/// The stream is dropped before returning.
pub async fn probe_port(target: &Target, timeout: Duration) -> PortResult {
    let start = Instant::now();
    let connect_res = time::timeout(
        timeout,
        TcpStream::connect((target.host.as_str(), target.port)),
    )
    .await;
    let latency = start.elapsed();

    let status = match connect_res {
        Ok(Ok(_stream)) => {
            debug!(host = %target.host, port = target.port, latency_ms = latency.as_millis() as u64, "port open");
            PortStatus::Open
        }
        Ok(Err(e)) => {
            debug!(host = %target.host, port = target.port, error = %e, "port closed");
            PortStatus::Closed
        }
        Err(_) => {
            debug!(host = %target.host, port = target.port, "connect timed out");
            PortStatus::Closed
        }
    };

    PortResult {
        target: target.clone(),
        status,
        latency,
    }
}

/// Connect helper shared by the RTSP exchange; timeouts surface as `TimedOut`.
pub(crate) async fn connect(target: &Target, timeout: Duration) -> std::io::Result<TcpStream> {
    match time::timeout(timeout, TcpStream::connect((target.host.as_str(), target.port))).await {
        Ok(res) => res,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "connection timed out",
        )),
    }
}
