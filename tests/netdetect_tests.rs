use rtsp_scan_rs::netdetect::ipv4_to_default_cidr;
use rtsp_scan_rs::targets::TargetSpec;
use std::net::Ipv4Addr;

#[test]
fn default_cidr_is_24() {
    let cidr = ipv4_to_default_cidr(Ipv4Addr::new(192, 168, 42, 99));
    assert_eq!(cidr.to_string(), "192.168.42.0/24");
}

#[test]
fn detected_default_network_expands_to_254_hosts() {
    let spec = TargetSpec::Network(ipv4_to_default_cidr(Ipv4Addr::new(10, 0, 0, 7)));
    let hosts = spec.hosts();
    assert_eq!(hosts.len(), 254);
    assert_eq!(hosts.first().map(String::as_str), Some("10.0.0.1"));
    assert_eq!(hosts.last().map(String::as_str), Some("10.0.0.254"));
}
