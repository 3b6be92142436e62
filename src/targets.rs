//! Parsing of scan target specifications and expansion into [`Target`] work items.

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net};

use crate::error::ScanError;
use crate::types::Target;

/// What the caller asked to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// A single IP address or hostname.
    Host(String),
    /// Inclusive IPv4 range `start-end`.
    Range { start: Ipv4Addr, end: Ipv4Addr },
    /// A CIDR block; host addresses only.
    Network(Ipv4Net),
}

impl TargetSpec {
    /// Parse `192.168.1.0/24`, `192.168.1.10-192.168.1.20`, an IP, or a hostname.
    pub fn parse(input: &str) -> Result<Self, ScanError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ScanError::InvalidTarget("empty target".into()));
        }

        if s.contains('/') {
            let net: IpNet = s
                .parse()
                .map_err(|e| ScanError::InvalidTarget(format!("{s}: {e}")))?;
            return match net {
                IpNet::V4(n4) => Ok(TargetSpec::Network(n4.trunc())),
                IpNet::V6(_) => Err(ScanError::UnsupportedNetwork(format!(
                    "{s}: IPv6 networks are not scanned"
                ))),
            };
        }

        if let Some((a, b)) = s.split_once('-') {
            let (a, b) = (a.trim(), b.trim());
            if let (Ok(start), Ok(end)) = (a.parse::<Ipv4Addr>(), b.parse::<Ipv4Addr>()) {
                if u32::from(start) > u32::from(end) {
                    return Err(ScanError::InvalidRange { start, end });
                }
                return Ok(TargetSpec::Range { start, end });
            }
            // Two things that look like addresses but are not: a malformed range,
            // not a hostname with a dash in it.
            if looks_like_ipv4(a) && looks_like_ipv4(b) {
                return Err(ScanError::InvalidTarget(format!("malformed IP range: {s}")));
            }
        }

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(TargetSpec::Host(ip.to_string()));
        }
        if looks_like_ipv4(s) || !is_valid_hostname(s) {
            return Err(ScanError::InvalidTarget(format!("not an IP address or hostname: {s}")));
        }
        Ok(TargetSpec::Host(s.to_string()))
    }

    /// Hosts named by this spec, in ascending address order.
    pub fn hosts(&self) -> Vec<String> {
        match self {
            TargetSpec::Host(h) => vec![h.clone()],
            TargetSpec::Range { start, end } => (u32::from(*start)..=u32::from(*end))
                .map(|n| Ipv4Addr::from(n).to_string())
                .collect(),
            TargetSpec::Network(net) => net.hosts().map(|ip| ip.to_string()).collect(),
        }
    }

    /// Cross the hosts with a port list into the explicit work-item list.
    pub fn expand(&self, ports: &[u16]) -> Vec<Target> {
        cross(&self.hosts(), ports)
    }
}

impl FromStr for TargetSpec {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetSpec::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::Host(h) => f.write_str(h),
            TargetSpec::Range { start, end } => write!(f, "{start}-{end}"),
            TargetSpec::Network(net) => write!(f, "{net}"),
        }
    }
}

/// Host × port list with duplicates removed, so each pair is probed once per scan.
pub fn cross(hosts: &[String], ports: &[u16]) -> Vec<Target> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(hosts.len() * ports.len());
    for host in hosts {
        for &port in ports {
            let t = Target::new(host.clone(), port);
            if seen.insert(t.clone()) {
                out.push(t);
            }
        }
    }
    out
}

/// Parse several specs and expand them all; the first malformed spec fails the whole call.
pub fn expand_all(specs: &[String], ports: &[u16]) -> Result<Vec<Target>, ScanError> {
    let mut hosts = Vec::new();
    for s in specs {
        hosts.extend(TargetSpec::parse(s)?.hosts());
    }
    Ok(cross(&hosts, ports))
}

fn looks_like_ipv4(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.') && s.contains('.')
}

fn is_valid_hostname(s: &str) -> bool {
    if s.len() > 253 {
        return false;
    }
    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
