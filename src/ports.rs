use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Ports RTSP servers commonly listen on.
pub const DEFAULT_RTSP_PORTS: &[u16] = &[554, 8554, 7447, 5554, 88, 8000, 8080, 8888];

/// Parse a port list into a deduplicated list of TCP ports (1..=65535), keeping first-seen order.
///
/// Entries are separated by newlines or commas:
/// - single port number: `554`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` on a line is ignored
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut seen = HashSet::new();
    let mut ports = Vec::new();

    for (line_no, line) in (1..).zip(s.lines()) {
        let active = line.split_once('#').map_or(line, |(before, _)| before);
        for item in active.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (lo, hi) = parse_item(item).with_context(|| format!("line {line_no}: {item}"))?;
            ports.extend((lo..=hi).filter(|p| seen.insert(*p)));
        }
    }

    Ok(ports)
}

/// A single port or an inclusive `lo-hi` range.
fn parse_item(item: &str) -> Result<(u16, u16)> {
    let Some((lo, hi)) = item.split_once('-') else {
        let p = parse_port_str(item)?;
        return Ok((p, p));
    };
    let lo = parse_port_str(lo.trim()).context("invalid range start")?;
    let hi = parse_port_str(hi.trim()).context("invalid range end")?;
    if lo > hi {
        bail!("range {lo}-{hi} is reversed");
    }
    Ok((lo, hi))
}

/// Load a ports list from a file path.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read ports file {}", path.display()))?;
    parse_ports_str(&text)
}

/// Resolve a CLI `--ports` argument: an existing file, an inline list, or the RTSP defaults when absent.
pub fn resolve_ports_arg(arg: Option<&str>) -> Result<Vec<u16>> {
    let Some(arg) = arg.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok(default_ports());
    };
    let ports = if Path::new(arg).is_file() {
        load_ports_from_path(arg)?
    } else {
        parse_ports_str(arg)?
    };
    if ports.is_empty() {
        bail!("port list is empty: {arg}");
    }
    Ok(ports)
}

pub fn default_ports() -> Vec<u16> {
    DEFAULT_RTSP_PORTS.to_vec()
}

fn parse_port_str(s: &str) -> Result<u16> {
    match s.parse::<u16>() {
        Ok(0) => bail!("port 0 is not scannable"),
        Ok(p) => Ok(p),
        Err(e) => bail!("invalid port {s:?}: {e}"),
    }
}
