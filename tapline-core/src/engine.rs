//! Capture engine boundary
//!
//! These traits describe the native capture engine that sessions drive.
//! They mirror the libpcap call surface closely: setters and activation
//! return a raw [`Status`], failures carry the engine's last-error text, and
//! the blocking loop hands each packet to a plain callback.

use crate::interface::RawInterface;
use crate::packet::RawHeader;
use crate::status::Status;
use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Netmask value telling the filter compiler the netmask is unknown
pub const NETMASK_UNKNOWN: u32 = 0xffff_ffff;

/// Failed engine call: status plus the engine's diagnostic text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub status: Status,
    pub message: String,
}

impl NativeError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl From<NativeError> for crate::CaptureError {
    fn from(err: NativeError) -> Self {
        crate::CaptureError::from_status(err.status, err.message)
    }
}

/// Outcome of reading a single packet
#[derive(Debug)]
pub enum NextPacket<'a> {
    /// A packet was read
    Packet(RawHeader, &'a [u8]),
    /// Live read timed out with no data
    Timeout,
    /// Savefile has no more packets
    Exhausted,
    /// Read failed
    Failed(Status),
}

/// Which blocking loop primitive to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// `pcap_dispatch`: process what is available, at most one blocking read
    Dispatch,
    /// `pcap_loop`: keep reading until the count is reached or interrupted
    Loop,
}

/// Packet counters kept by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawStats {
    pub received: u32,
    pub dropped: u32,
    pub if_dropped: u32,
}

/// Thread-safe way to interrupt a running loop (`pcap_breakloop`)
pub trait BreakSignal: Send + Sync {
    fn request(&self);
}

/// A compiled filter program owned by the engine
pub trait CompiledFilter: Send + Sync + fmt::Debug {
    /// Expression the program was compiled from
    fn expression(&self) -> &str;

    /// Access to the concrete type for the engine that built it
    fn as_any(&self) -> &dyn Any;
}

/// Savefile writer (`pcap_dumper_t`); closed on drop
pub trait DumpWriter: Send {
    fn write(&mut self, header: &RawHeader, data: &[u8]);

    fn flush(&mut self) -> Status;
}

/// A capture handle (`pcap_t`); released on drop
///
/// Setters return [`Status::ERROR_ACTIVATED`] once the handle is active.
/// Callers fetch [`CaptureHandle::last_error`] after any non-OK status.
pub trait CaptureHandle: Send {
    fn set_snaplen(&mut self, snaplen: i32) -> Status;
    fn set_promisc(&mut self, promisc: bool) -> Status;
    fn set_timeout(&mut self, timeout_ms: i32) -> Status;
    fn set_rfmon(&mut self, rfmon: bool) -> Status;
    fn set_buffer_size(&mut self, bytes: i32) -> Status;
    fn set_immediate_mode(&mut self, immediate: bool) -> Status;

    /// Blocking mode is legal to change before and after activation
    fn set_nonblock(&mut self, nonblock: bool) -> Status;

    /// Commit configuration; positive statuses are warnings and still activate
    fn activate(&mut self) -> Status;

    fn next_packet(&mut self) -> NextPacket<'_>;

    /// Run a loop, returning the packet count (`>= 0`) or an error status
    ///
    /// A `count` of zero or less means no limit for [`LoopKind::Loop`] and
    /// "everything in one buffer" for [`LoopKind::Dispatch`].
    fn run_loop(
        &mut self,
        kind: LoopKind,
        count: i32,
        handler: &mut dyn FnMut(&RawHeader, &[u8]),
    ) -> Status;

    /// Signal that interrupts [`CaptureHandle::run_loop`] at its next check point
    fn break_signal(&mut self) -> Arc<dyn BreakSignal>;

    fn compile(
        &mut self,
        expression: &str,
        optimize: bool,
        netmask: u32,
    ) -> Result<Arc<dyn CompiledFilter>, NativeError>;

    fn set_filter(&mut self, program: &dyn CompiledFilter) -> Status;

    fn open_dump(&mut self, path: &Path) -> Result<Box<dyn DumpWriter>, NativeError>;

    fn datalink(&self) -> i32;

    fn snapshot(&self) -> i32;

    fn stats(&mut self) -> Result<RawStats, NativeError>;

    /// Savefile byte order differs from the host's
    fn is_swapped(&self) -> bool {
        false
    }

    /// Savefile format version
    fn version(&self) -> (i32, i32) {
        (0, 0)
    }

    /// Selectable descriptor, `-1` when there is none
    fn fileno(&self) -> i32 {
        -1
    }

    /// Text of the last error (`pcap_geterr`)
    fn last_error(&self) -> String;
}

/// Entry points of a capture engine
pub trait CaptureEngine: Send + Sync {
    /// Create an inactive handle for a live device (`pcap_create`)
    fn create(&self, device: &str) -> Result<Box<dyn CaptureHandle>, NativeError>;

    /// Open a savefile (`pcap_open_offline`); the handle is already active
    fn open_offline(&self, path: &Path) -> Result<Box<dyn CaptureHandle>, NativeError>;

    /// Enumerate capture devices (`pcap_findalldevs`)
    fn find_all_devs(&self) -> Result<Vec<RawInterface>, NativeError>;

    /// Engine version string (`pcap_lib_version`)
    fn lib_version(&self) -> String;
}
