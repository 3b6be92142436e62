//! Codec and resolution extraction from a DESCRIBE body.
//!
//! Not an SDP parser: a handful of attribute patterns seen in camera firmware.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static RTPMAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)a=rtpmap:\d+\s+(\w+)/\d+").expect("rtpmap regex"));

/// Resolution shapes in priority order; each captures width then height.
static RESOLUTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)x-dimensions=(\d+),(\d+)",
        r"(?i)framesize:\d+\s+(\d+)-(\d+)",
        r"(?i)resolution[:\s]+(\d+)x(\d+)",
        r"(?i)width[:\s]*=\s*(\d+).*height[:\s]*=\s*(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("resolution regex"))
    .collect()
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamDescription {
    pub codec: Option<String>,
    pub resolution: Option<String>,
}

/// Pull codec and resolution out of SDP lines. Missing attributes leave the field unset.
pub fn parse_description<S: AsRef<str>>(lines: &[S]) -> StreamDescription {
    let text = lines
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n");

    let codec = RTPMAP
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| normalize_codec(m.as_str()));

    let resolution = RESOLUTION_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(&text)?;
        Some(format!("{}x{}", caps.get(1)?.as_str(), caps.get(2)?.as_str()))
    });

    StreamDescription { codec, resolution }
}

pub fn normalize_codec(name: &str) -> String {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "H264" => "H.264".to_string(),
        "H265" | "HEVC" => "H.265".to_string(),
        "MJPEG" | "JPEG" => "MJPEG".to_string(),
        _ => upper,
    }
}
