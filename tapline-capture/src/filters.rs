//! BPF expression builders
//!
//! Helpers that produce pcap-filter expression text for
//! [`Session::set_filter`](crate::Session::set_filter). They only build
//! strings; compilation is always the engine's job.

use std::net::IpAddr;

/// Direction qualifier for host and port primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Src,
    Dst,
    Any,
}

impl Dir {
    fn prefix(self) -> &'static str {
        match self {
            Dir::Src => "src ",
            Dir::Dst => "dst ",
            Dir::Any => "",
        }
    }
}

/// Transport qualifier for port primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
    Any,
}

impl Transport {
    fn prefix(self) -> &'static str {
        match self {
            Transport::Tcp => "tcp ",
            Transport::Udp => "udp ",
            Transport::Any => "",
        }
    }
}

/// Packets to or from a host
pub fn host(dir: Dir, ip: IpAddr) -> String {
    format!("{}host {}", dir.prefix(), ip)
}

/// Packets on a port
pub fn port(transport: Transport, dir: Dir, port: u16) -> String {
    format!("{}{}port {}", transport.prefix(), dir.prefix(), port)
}

/// Packets on an inclusive port range
pub fn port_range(transport: Transport, start: u16, end: u16) -> String {
    format!("{}portrange {}-{}", transport.prefix(), start, end)
}

/// Packets to or from a network given in CIDR form
pub fn net(network: IpAddr, prefix_len: u8) -> String {
    format!("net {}/{}", network, prefix_len)
}

/// Frames with the given EtherType
pub fn ether_proto(ethertype: u16) -> String {
    format!("ether proto 0x{:04x}", ethertype)
}

/// Frames to or from a MAC address
pub fn ether_host(dir: Dir, mac: [u8; 6]) -> String {
    format!(
        "ether {}host {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        dir.prefix(),
        mac[0],
        mac[1],
        mac[2],
        mac[3],
        mac[4],
        mac[5]
    )
}

/// 802.1Q tagged frames, optionally for one VLAN id
pub fn vlan(id: Option<u16>) -> String {
    match id {
        Some(id) => format!("vlan {}", id),
        None => "vlan".to_string(),
    }
}

/// Combine expressions with AND logic
pub fn all_of<S: AsRef<str>>(filters: &[S]) -> String {
    join(filters, " and ")
}

/// Combine expressions with OR logic
pub fn any_of<S: AsRef<str>>(filters: &[S]) -> String {
    join(filters, " or ")
}

/// Negate an expression
pub fn negate(filter: &str) -> String {
    format!("not ({})", filter)
}

fn join<S: AsRef<str>>(filters: &[S], op: &str) -> String {
    match filters {
        [] => String::new(),
        [single] => single.as_ref().to_string(),
        _ => filters
            .iter()
            .map(|f| format!("({})", f.as_ref()))
            .collect::<Vec<_>>()
            .join(op),
    }
}
