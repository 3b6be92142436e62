//! Library crate for rtsp-scan-rs: RTSP camera discovery and fingerprinting.
pub mod classify;
pub mod config;
pub mod corpus;
pub mod error;
pub mod health;
pub mod netdetect;
pub mod ports;
pub mod probe;
pub mod rtsp;
pub mod scanner;
pub mod sdp;
pub mod targets;
pub mod transport;
pub mod types;
