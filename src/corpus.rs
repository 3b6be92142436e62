//! Static knowledge about camera stream paths and default credentials.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Credentials, StreamType};

/// Known stream paths, generic first, then grouped by vendor grammar.
pub const COMMON_PATHS: &[&str] = &[
    // generic
    "/",
    "/stream",
    "/live",
    "/media",
    "/video",
    "/h264",
    "/mpeg4",
    "/mjpeg",
    // Hikvision: /Streaming/Channels/{channel}{01 main | 02 sub}
    "/Streaming/Channels/101",
    "/Streaming/Channels/102",
    "/Streaming/Channels/201",
    "/Streaming/Channels/301",
    "/Streaming/Channels/401",
    "/Streaming/Channels/501",
    "/Streaming/Channels/601",
    "/Streaming/Channels/701",
    "/Streaming/Channels/801",
    "/h264/ch1/main/av_stream",
    "/h264/ch1/sub/av_stream",
    // Dahua / Amcrest
    "/cam/realmonitor?channel=1&subtype=0",
    "/cam/realmonitor?channel=1&subtype=1",
    "/cam/realmonitor?channel=2&subtype=0",
    "/cam/realmonitor?channel=3&subtype=0",
    "/cam/realmonitor?channel=4&subtype=0",
    // Axis
    "/axis-media/media.amp",
    "/axis-media/media.amp?videocodec=h264",
    "/axis-media/media.amp?resolution=1920x1080",
    "/mjpg/video.mjpg",
    // Foscam
    "/videoMain",
    "/videoSub",
    "/video.h264",
    "/11",
    "/12",
    // TP-Link
    "/stream1",
    "/stream2",
    "/h264_stream",
    // numbered channels
    "/ch01",
    "/ch02",
    "/ch03",
    "/ch04",
    "/channel1",
    "/channel2",
    "/channel3",
    "/channel4",
    "/video1",
    "/video2",
    "/cam1",
    "/cam2",
    // misc
    "/live/ch00_0",
    "/live/ch00_1",
    "/live/ch01_0",
    "/live.sdp",
    "/av0_0",
    "/av0_1",
    "/onvif1",
    "/onvif2",
    "/profile1",
    "/profile2",
    "/profile3",
];

/// The ten paths most likely to answer on an unknown camera.
pub const QUICK_PATHS: &[&str] = &[
    "/",
    "/stream",
    "/live",
    "/Streaming/Channels/101",
    "/Streaming/Channels/102",
    "/cam/realmonitor?channel=1&subtype=0",
    "/axis-media/media.amp",
    "/videoMain",
    "/h264/ch1/main/av_stream",
    "/channel1",
];

/// Numbering grammars expanded by [`numbered_channel_paths`]; `{}` is the channel number.
pub const NUMBERED_TEMPLATES: &[&str] = &[
    "/channel{}",
    "/ch{}",
    "/ch0{}",
    "/video{}",
    "/cam{}",
    "/stream{}",
    "/Streaming/Channels/{}01",
];

pub const DEFAULT_CHANNEL_RANGE: RangeInclusive<u32> = 1..=16;

/// A path no camera serves; used to detect servers that accept anything.
pub const PROBE_NONEXISTENT_PATH: &str = "/thispathshouldnotexist99999";

/// Default credential pairs, including empty values. Only used on request.
pub const COMMON_CREDENTIALS: &[(&str, &str)] = &[
    ("admin", "admin"),
    ("admin", ""),
    ("admin", "12345"),
    ("admin", "password"),
    ("admin", "123456"),
    ("root", "root"),
    ("root", ""),
    ("root", "pass"),
    ("user", "user"),
    ("", ""),
];

pub fn common_paths() -> Vec<String> {
    COMMON_PATHS.iter().map(|p| p.to_string()).collect()
}

pub fn quick_paths() -> Vec<String> {
    QUICK_PATHS.iter().map(|p| p.to_string()).collect()
}

pub fn common_credentials() -> Vec<Credentials> {
    COMMON_CREDENTIALS
        .iter()
        .map(|(u, p)| Credentials::new(*u, *p))
        .collect()
}

/// Every template for every channel number in `range`, channel-major.
pub fn numbered_channel_paths(range: RangeInclusive<u32>) -> Vec<String> {
    let mut out = Vec::new();
    for n in range {
        for tpl in NUMBERED_TEMPLATES {
            out.push(tpl.replace("{}", &n.to_string()));
        }
    }
    out
}

/// Hikvision channel ids end in 01 (main) or 02 (sub), e.g. 101, 102, 1601.
static HIKVISION_CHANNEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/streaming/channels/(\d*)0([12])(?:[/?]|$)").expect("hikvision channel regex")
});

/// Checked before the main indicators so a path carrying both resolves to Sub.
const SUB_INDICATORS: &[&str] = &[
    "/sub/",
    "subtype=1",
    "videosub",
    "/stream2",
    "/ch02",
    "/channel2",
    "/video2",
    "/cam2",
    "/av0_1",
    "/live/ch00_1",
    "resolution=640x480",
    "resolution=320x240",
];

const MAIN_INDICATORS: &[&str] = &[
    "/main/",
    "subtype=0",
    "videomain",
    "/stream1",
    "/ch01",
    "/channel1",
    "/video1",
    "/cam1",
    "/av0_0",
    "/live/ch00_0",
    "resolution=1920x1080",
    "resolution=1280x720",
];

/// Lexical main/sub guess for a stream path.
pub fn detect_stream_type(path: &str) -> StreamType {
    if let Some(caps) = HIKVISION_CHANNEL.captures(path) {
        match caps.get(2).map(|m| m.as_str()) {
            Some("1") => return StreamType::Main,
            Some("2") => return StreamType::Sub,
            _ => {}
        }
    }

    let lower = path.to_ascii_lowercase();
    if SUB_INDICATORS.iter().any(|i| lower.contains(i)) {
        return StreamType::Sub;
    }
    if MAIN_INDICATORS.iter().any(|i| lower.contains(i)) {
        return StreamType::Main;
    }
    StreamType::Unknown
}
