use anyhow::{bail, Result};
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use crate::targets::TargetSpec;

/// A local interface address together with the /24 it is assumed to sit in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNetwork {
    pub ip: Ipv4Addr,
    pub network: Ipv4Net,
}

/// Detect local non-loopback IPv4 interfaces, one entry per distinct /24, sorted by network.
pub fn detect_local_networks() -> Result<Vec<LocalNetwork>> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = iface.addr {
            let ip = v4.ip;
            if ip.is_loopback() || ip.is_link_local() {
                continue;
            }
            let network = ipv4_to_default_cidr(ip);
            if seen.insert(u32::from(network.network())) {
                out.push(LocalNetwork { ip, network });
            }
        }
    }
    out.sort_by_key(|n| u32::from(n.network.network()));
    Ok(out)
}

/// The scan target used when none is given: the first private local /24.
pub fn default_scan_target() -> Result<(TargetSpec, Ipv4Addr)> {
    let nets = detect_local_networks()?;
    let pick = nets
        .iter()
        .find(|n| n.ip.is_private())
        .or_else(|| nets.first());
    match pick {
        Some(n) => Ok((TargetSpec::Network(n.network), n.ip)),
        None => bail!("no non-loopback IPv4 interface found; pass a target explicitly"),
    }
}

/// An interface IP `192.168.1.42` becomes `192.168.1.0/24`.
pub fn ipv4_to_default_cidr(ip: Ipv4Addr) -> Ipv4Net {
    let o = ip.octets();
    Ipv4Net::new(Ipv4Addr::new(o[0], o[1], o[2], 0), 24)
        .unwrap_or_else(|_| Ipv4Net::from(ip))
}
