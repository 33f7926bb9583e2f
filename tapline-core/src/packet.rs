//! Packet types

use bytes::Bytes;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Per-packet header as reported by a capture engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawHeader {
    /// Timestamp, whole seconds since the epoch
    pub ts_sec: i64,
    /// Timestamp, microseconds part
    pub ts_usec: i64,
    /// Bytes actually captured
    pub caplen: u32,
    /// Length of the packet on the wire
    pub len: u32,
}

/// A captured packet
///
/// Records are built fresh for every read or callback and never change
/// afterwards. The payload always holds exactly `caplen` bytes, which is
/// never more than the wire length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    ts_sec: i64,
    ts_usec: i64,
    caplen: u32,
    len: u32,
    data: Bytes,
}

impl PacketRecord {
    /// Build a record from an engine header and the bytes it handed over
    ///
    /// The payload is cut to the smaller of the header's captured length
    /// and the buffer, and the wire length is raised if an engine ever
    /// reports it below what was captured.
    pub fn from_raw(header: &RawHeader, data: &[u8]) -> Self {
        let captured = (header.caplen as usize).min(data.len());
        let caplen = captured as u32;
        Self {
            ts_sec: header.ts_sec,
            ts_usec: header.ts_usec,
            caplen,
            len: header.len.max(caplen),
            data: Bytes::copy_from_slice(&data[..captured]),
        }
    }

    /// Build an untruncated record stamped with the current time
    ///
    /// Payloads longer than `u32::MAX` bytes are cut to that length.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let mut data = data.into();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let caplen = clamp_len(data.len());
        data.truncate(caplen as usize);
        Self {
            ts_sec: now.as_secs() as i64,
            ts_usec: now.subsec_micros() as i64,
            caplen,
            len: caplen,
            data,
        }
    }

    /// Timestamp in fractional seconds
    pub fn timestamp(&self) -> f64 {
        self.ts_sec as f64 + self.ts_usec as f64 / 1_000_000.0
    }

    /// Timestamp as whole seconds and microseconds
    pub fn timestamp_parts(&self) -> (i64, i64) {
        (self.ts_sec, self.ts_usec)
    }

    /// Timestamp as a `SystemTime`, if it is not before the epoch
    pub fn system_time(&self) -> Option<SystemTime> {
        let secs = u64::try_from(self.ts_sec).ok()?;
        let micros = u64::try_from(self.ts_usec).ok()?;
        UNIX_EPOCH.checked_add(Duration::from_secs(secs) + Duration::from_micros(micros))
    }

    /// Bytes captured
    pub fn caplen(&self) -> u32 {
        self.caplen
    }

    /// Length on the wire
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether the packet was empty on the wire
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the snapshot length cut the packet short
    pub fn is_truncated(&self) -> bool {
        self.caplen < self.len
    }

    /// Captured bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Captured bytes as a cheap clone
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Header describing this record, for savefile writers
    pub fn header(&self) -> RawHeader {
        RawHeader {
            ts_sec: self.ts_sec,
            ts_usec: self.ts_usec,
            caplen: self.caplen,
            len: self.len,
        }
    }
}

fn clamp_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header(caplen: u32, len: u32) -> RawHeader {
        RawHeader {
            ts_sec: 1_700_000_000,
            ts_usec: 250_000,
            caplen,
            len,
        }
    }

    #[test]
    fn test_untruncated_record() {
        let data = [0xde, 0xad, 0xbe, 0xef];
        let record = PacketRecord::from_raw(&header(4, 4), &data);
        assert_eq!(record.caplen(), record.len());
        assert_eq!(record.data(), &data);
        assert!(!record.is_truncated());
    }

    #[test]
    fn test_truncated_record() {
        let data = [0u8; 64];
        let record = PacketRecord::from_raw(&header(64, 1500), &data);
        assert_eq!(record.caplen(), 64);
        assert_eq!(record.len(), 1500);
        assert_eq!(record.data().len(), 64);
        assert!(record.is_truncated());
    }

    #[test]
    fn test_timestamp() {
        let record = PacketRecord::from_raw(&header(0, 0), &[]);
        assert!((record.timestamp() - 1_700_000_000.25).abs() < 1e-6);
        assert_eq!(record.timestamp_parts(), (1_700_000_000, 250_000));
        assert!(record.system_time().is_some());
    }

    #[test]
    fn test_header_matches_record() {
        let record = PacketRecord::from_raw(&header(3, 10), &[1, 2, 3]);
        assert_eq!(record.header(), header(3, 10));
    }

    #[test]
    fn test_new_is_untruncated() {
        let record = PacketRecord::new(vec![1u8, 2, 3]);
        assert_eq!(record.caplen(), 3);
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_clamp_len() {
        assert_eq!(clamp_len(0), 0);
        assert_eq!(clamp_len(1500), 1500);
        assert_eq!(clamp_len(u32::MAX as usize), u32::MAX);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_clamp_len_beyond_u32() {
        assert_eq!(clamp_len(u32::MAX as usize + 1), u32::MAX);
        assert_eq!(clamp_len(usize::MAX), u32::MAX);
    }

    proptest! {
        #[test]
        fn prop_caplen_never_exceeds_len(
            caplen in 0u32..4096,
            len in 0u32..4096,
            buf_len in 0usize..4096,
        ) {
            let data = vec![0xaa; buf_len];
            let record = PacketRecord::from_raw(&header(caplen, len), &data);
            prop_assert!(record.caplen() <= record.len());
            prop_assert_eq!(record.data().len(), record.caplen() as usize);
            if caplen as usize <= buf_len && caplen == len {
                prop_assert!(!record.is_truncated());
            }
        }
    }
}
