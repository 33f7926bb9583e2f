//! Network interface snapshot types
//!
//! Engines hand back [`RawInterface`] nodes; [`InterfaceDescriptor::from_raw`]
//! turns them into immutable descriptors with best-effort address rendering.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[cfg(unix)]
pub use libc::{AF_INET, AF_INET6};

#[cfg(windows)]
pub const AF_INET: i32 = 2;
#[cfg(windows)]
pub const AF_INET6: i32 = 23;

/// Interface flag: loopback device
pub const IF_LOOPBACK: u32 = 0x0000_0001;
/// Interface flag: administratively up
pub const IF_UP: u32 = 0x0000_0002;
/// Interface flag: running
pub const IF_RUNNING: u32 = 0x0000_0004;
/// Interface flag: wireless
pub const IF_WIRELESS: u32 = 0x0000_0008;

/// Socket address as the engine reported it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSockaddr {
    /// Address family (`AF_*`)
    pub family: i32,
    /// Address bytes in network order, without the family header
    pub data: Vec<u8>,
}

impl RawSockaddr {
    /// Raw form of an IP address
    pub fn from_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self {
                family: AF_INET,
                data: v4.octets().to_vec(),
            },
            IpAddr::V6(v6) => Self {
                family: AF_INET6,
                data: v6.octets().to_vec(),
            },
        }
    }
}

/// One address entry of an engine enumeration; `None` is a null pointer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAddress {
    pub addr: Option<RawSockaddr>,
    pub netmask: Option<RawSockaddr>,
    pub broadaddr: Option<RawSockaddr>,
    pub dstaddr: Option<RawSockaddr>,
}

/// One interface node of an engine enumeration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInterface {
    pub name: String,
    pub description: Option<String>,
    pub flags: u32,
    pub addresses: Vec<RawAddress>,
}

/// Socket length for families we know how to render
fn address_len(family: i32) -> Option<usize> {
    match family {
        f if f == AF_INET => Some(4),
        f if f == AF_INET6 => Some(16),
        _ => None,
    }
}

/// A present address role
///
/// `Family` means the family is known but no string form could be produced,
/// which is a different thing from the role being absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockAddr {
    /// Family known, string form unavailable
    Family(i32),
    /// Family plus numeric rendering
    Numeric { family: i32, text: String },
}

impl SockAddr {
    /// Render a raw address, downgrading to `Family` instead of failing
    pub fn render(raw: &RawSockaddr) -> Self {
        let Some(len) = address_len(raw.family) else {
            return Self::Family(raw.family);
        };
        if raw.data.len() < len {
            return Self::Family(raw.family);
        }

        let ip = match len {
            4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&raw.data[..4]);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            _ => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&raw.data[..16]);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
        };

        Self::Numeric {
            family: raw.family,
            text: ip.to_string(),
        }
    }

    /// Address family
    pub fn family(&self) -> i32 {
        match self {
            Self::Family(family) | Self::Numeric { family, .. } => *family,
        }
    }

    /// Numeric string form, if one was rendered
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Family(_) => None,
            Self::Numeric { text, .. } => Some(text),
        }
    }

    /// Parsed IP address, if one was rendered
    pub fn ip(&self) -> Option<IpAddr> {
        self.text().and_then(|text| text.parse().ok())
    }
}

impl fmt::Display for SockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Family(family) => write!(f, "<family {}>", family),
            Self::Numeric { text, .. } => f.write_str(text),
        }
    }
}

/// Addresses bound to an interface, by role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressDescriptor {
    pub address: Option<SockAddr>,
    pub netmask: Option<SockAddr>,
    pub broadcast: Option<SockAddr>,
    pub destination: Option<SockAddr>,
}

impl From<&RawAddress> for AddressDescriptor {
    fn from(raw: &RawAddress) -> Self {
        Self {
            address: raw.addr.as_ref().map(SockAddr::render),
            netmask: raw.netmask.as_ref().map(SockAddr::render),
            broadcast: raw.broadaddr.as_ref().map(SockAddr::render),
            destination: raw.dstaddr.as_ref().map(SockAddr::render),
        }
    }
}

/// Information about a capture-capable network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    /// Interface name (e.g., "eth0", "en0")
    pub name: String,
    /// Human-readable description
    pub description: Option<String>,
    /// Whether the interface is a loopback
    pub loopback: bool,
    /// Raw engine flags
    pub flags: u32,
    /// Addresses in enumeration order
    pub addresses: Vec<AddressDescriptor>,
}

impl InterfaceDescriptor {
    /// Map one engine node, addresses in their original order
    pub fn from_raw(raw: &RawInterface) -> Self {
        Self {
            name: raw.name.clone(),
            description: raw.description.clone(),
            loopback: raw.flags & IF_LOOPBACK != 0,
            flags: raw.flags,
            addresses: raw.addresses.iter().map(AddressDescriptor::from).collect(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.flags & IF_UP != 0
    }

    pub fn is_running(&self) -> bool {
        self.flags & IF_RUNNING != 0
    }

    pub fn is_wireless(&self) -> bool {
        self.flags & IF_WIRELESS != 0
    }

    /// Check if the interface is suitable as a default capture source
    pub fn is_capture_capable(&self) -> bool {
        self.is_up() && !self.loopback
    }

    /// First rendered IPv4 address, if any
    pub fn primary_ipv4(&self) -> Option<IpAddr> {
        self.ips().find(|ip| ip.is_ipv4())
    }

    /// First rendered IPv6 address, if any
    pub fn primary_ipv6(&self) -> Option<IpAddr> {
        self.ips().find(|ip| ip.is_ipv6())
    }

    fn ips(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.addresses
            .iter()
            .filter_map(|a| a.address.as_ref().and_then(SockAddr::ip))
    }
}

impl fmt::Display for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "{} ({})", self.name, desc),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> RawSockaddr {
        RawSockaddr::from_ip(IpAddr::V4(Ipv4Addr::new(a, b, c, d)))
    }

    #[test]
    fn test_render_ipv4() {
        let rendered = SockAddr::render(&v4(192, 168, 1, 10));
        assert_eq!(rendered.text(), Some("192.168.1.10"));
        assert_eq!(rendered.family(), AF_INET);
    }

    #[test]
    fn test_render_ipv6() {
        let raw = RawSockaddr::from_ip("fe80::1".parse().unwrap());
        let rendered = SockAddr::render(&raw);
        assert_eq!(rendered.text(), Some("fe80::1"));
        assert_eq!(rendered.family(), AF_INET6);
    }

    #[test]
    fn test_unknown_family_is_family_only() {
        let raw = RawSockaddr {
            family: 17,
            data: vec![0; 12],
        };
        assert_eq!(SockAddr::render(&raw), SockAddr::Family(17));
    }

    #[test]
    fn test_short_buffer_downgrades_to_family_only() {
        let raw = RawSockaddr {
            family: AF_INET,
            data: vec![10, 0],
        };
        let rendered = SockAddr::render(&raw);
        assert_eq!(rendered, SockAddr::Family(AF_INET));
        assert_eq!(rendered.text(), None);
        assert_eq!(rendered.ip(), None);
    }

    #[test]
    fn test_absent_present_and_family_only_roles() {
        let raw = RawAddress {
            addr: Some(v4(10, 0, 0, 1)),
            netmask: Some(RawSockaddr {
                family: 99,
                data: vec![],
            }),
            broadaddr: None,
            dstaddr: None,
        };
        let desc = AddressDescriptor::from(&raw);
        assert_eq!(desc.address.as_ref().and_then(SockAddr::text), Some("10.0.0.1"));
        assert_eq!(desc.netmask, Some(SockAddr::Family(99)));
        assert!(desc.broadcast.is_none());
        assert!(desc.destination.is_none());
    }

    #[test]
    fn test_interface_flags() {
        let raw = RawInterface {
            name: "lo".into(),
            description: None,
            flags: IF_LOOPBACK | IF_UP | IF_RUNNING,
            addresses: vec![],
        };
        let iface = InterfaceDescriptor::from_raw(&raw);
        assert!(iface.loopback);
        assert!(iface.is_up());
        assert!(iface.is_running());
        assert!(!iface.is_wireless());
        assert!(!iface.is_capture_capable());
    }

    #[test]
    fn test_primary_addresses() {
        let raw = RawInterface {
            name: "eth0".into(),
            description: Some("Ethernet".into()),
            flags: IF_UP,
            addresses: vec![
                RawAddress {
                    addr: Some(RawSockaddr::from_ip("2001:db8::5".parse().unwrap())),
                    ..Default::default()
                },
                RawAddress {
                    addr: Some(v4(172, 16, 0, 2)),
                    ..Default::default()
                },
            ],
        };
        let iface = InterfaceDescriptor::from_raw(&raw);
        assert_eq!(iface.primary_ipv4(), Some("172.16.0.2".parse().unwrap()));
        assert_eq!(iface.primary_ipv6(), Some("2001:db8::5".parse().unwrap()));
        assert_eq!(iface.to_string(), "eth0 (Ethernet)");
        assert!(iface.is_capture_capable());
    }
}
