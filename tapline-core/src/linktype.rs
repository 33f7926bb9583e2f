//! Link-layer header types

use std::fmt;

/// Datalink type of a capture handle (`DLT_*` value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Linktype(pub i32);

impl Linktype {
    pub const NULL: Self = Self(0);
    pub const ETHERNET: Self = Self(1);
    pub const IEEE802_5: Self = Self(6);
    pub const PPP: Self = Self(9);
    pub const FDDI: Self = Self(10);
    pub const RAW: Self = Self(12);
    pub const IEEE802_11: Self = Self(105);
    pub const LOOP: Self = Self(108);
    pub const LINUX_SLL: Self = Self(113);
    pub const IEEE802_11_RADIO: Self = Self(127);
    pub const IPV4: Self = Self(228);
    pub const IPV6: Self = Self(229);
    pub const NFLOG: Self = Self(239);
    pub const LINUX_SLL2: Self = Self(276);

    /// Short name as libpcap spells it, e.g. `EN10MB`
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "NULL",
            1 => "EN10MB",
            6 => "IEEE802",
            9 => "PPP",
            10 => "FDDI",
            12 | 14 | 101 => "RAW",
            105 => "IEEE802_11",
            108 => "LOOP",
            113 => "LINUX_SLL",
            127 => "IEEE802_11_RADIO",
            228 => "IPV4",
            229 => "IPV6",
            239 => "NFLOG",
            276 => "LINUX_SLL2",
            _ => return None,
        };
        Some(name)
    }

    /// Human-readable description
    pub fn description(self) -> Option<&'static str> {
        let desc = match self.0 {
            0 => "BSD loopback",
            1 => "Ethernet",
            6 => "Token ring",
            9 => "PPP",
            10 => "FDDI",
            12 | 14 | 101 => "Raw IP",
            105 => "802.11",
            108 => "OpenBSD loopback",
            113 => "Linux cooked v1",
            127 => "802.11 plus radiotap header",
            228 => "Raw IPv4",
            229 => "Raw IPv6",
            239 => "Linux netfilter log messages",
            276 => "Linux cooked v2",
            _ => return None,
        };
        Some(desc)
    }
}

impl fmt::Display for Linktype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "DLT_{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names() {
        assert_eq!(Linktype::ETHERNET.name(), Some("EN10MB"));
        assert_eq!(Linktype::LINUX_SLL.to_string(), "LINUX_SLL");
        assert_eq!(Linktype(101).name(), Some("RAW"));
    }

    #[test]
    fn test_unknown_falls_back_to_number() {
        assert_eq!(Linktype(9999).name(), None);
        assert_eq!(Linktype(9999).to_string(), "DLT_9999");
    }
}
