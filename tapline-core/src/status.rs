//! Native status codes returned across the capture engine boundary
//!
//! The values follow libpcap's `PCAP_ERROR_*` / `PCAP_WARNING_*` constants so
//! that every engine implementation speaks the same numeric language.

use std::fmt;

/// Raw status returned by a capture engine call
///
/// Zero is success, negative values are errors, positive values are
/// warnings that did not prevent the operation from completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Self = Self(0);

    pub const ERROR: Self = Self(-1);
    pub const ERROR_BREAK: Self = Self(-2);
    pub const ERROR_NOT_ACTIVATED: Self = Self(-3);
    pub const ERROR_ACTIVATED: Self = Self(-4);
    pub const ERROR_NO_SUCH_DEVICE: Self = Self(-5);
    pub const ERROR_RFMON_NOTSUP: Self = Self(-6);
    pub const ERROR_NOT_RFMON: Self = Self(-7);
    pub const ERROR_PERM_DENIED: Self = Self(-8);
    pub const ERROR_IFACE_NOT_UP: Self = Self(-9);
    pub const ERROR_CANTSET_TSTAMP_TYPE: Self = Self(-10);
    pub const ERROR_PROMISC_PERM_DENIED: Self = Self(-11);
    pub const ERROR_TSTAMP_PRECISION_NOTSUP: Self = Self(-12);

    pub const WARNING: Self = Self(1);
    pub const WARNING_PROMISC_NOTSUP: Self = Self(2);
    pub const WARNING_TSTAMP_TYPE_NOTSUP: Self = Self(3);

    /// Raw numeric value
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Operation succeeded without warnings
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Operation failed
    pub const fn is_error(self) -> bool {
        self.0 < 0
    }

    /// Operation completed with a warning
    pub const fn is_warning(self) -> bool {
        self.0 > 0
    }

    /// Symbolic name for known codes
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "OK",
            -1 => "PCAP_ERROR",
            -2 => "PCAP_ERROR_BREAK",
            -3 => "PCAP_ERROR_NOT_ACTIVATED",
            -4 => "PCAP_ERROR_ACTIVATED",
            -5 => "PCAP_ERROR_NO_SUCH_DEVICE",
            -6 => "PCAP_ERROR_RFMON_NOTSUP",
            -7 => "PCAP_ERROR_NOT_RFMON",
            -8 => "PCAP_ERROR_PERM_DENIED",
            -9 => "PCAP_ERROR_IFACE_NOT_UP",
            -10 => "PCAP_ERROR_CANTSET_TSTAMP_TYPE",
            -11 => "PCAP_ERROR_PROMISC_PERM_DENIED",
            -12 => "PCAP_ERROR_TSTAMP_PRECISION_NOTSUP",
            1 => "PCAP_WARNING",
            2 => "PCAP_WARNING_PROMISC_NOTSUP",
            3 => "PCAP_WARNING_TSTAMP_TYPE_NOTSUP",
            _ => return None,
        };
        Some(name)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(Status::OK.is_ok());
        assert!(Status::ERROR_BREAK.is_error());
        assert!(Status::WARNING_PROMISC_NOTSUP.is_warning());
        assert!(!Status::WARNING.is_error());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::ERROR.to_string(), "PCAP_ERROR (-1)");
        assert_eq!(Status(-99).to_string(), "status -99");
    }
}
