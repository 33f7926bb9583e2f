//! libpcap-backed engine built on the `pcap` crate
//!
//! The `pcap` crate activates and loops on its own terms, so a few libpcap
//! behaviours are approximated here:
//!
//! - activation warnings are reported by the crate as failures;
//! - the filter netmask is not configurable;
//! - both loop kinds are driven through `next_packet`, and a break request is
//!   noticed between packets or after a read timeout;
//! - a live dispatch without a count stops after [`LIVE_DISPATCH_BATCH`]
//!   packets, since the crate cannot tell what is already buffered;
//! - a live handle can be switched to non-blocking mode but not back.
//!
//! The `pcap` crate has no wrapper for `pcap_lib_version`, so that one symbol
//! is declared here and read inside a single small `unsafe` block.

use pcap::{Activated, Active, Capture, Device, Inactive, Offline, Packet, PacketHeader};
use std::any::Any;
use std::ffi::CStr;
use std::fs::File;
use std::io::Read;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tapline_core::interface::{IF_LOOPBACK, IF_RUNNING, IF_UP, IF_WIRELESS};
use tapline_core::{
    BreakSignal, CaptureEngine, CaptureHandle, CompiledFilter, DumpWriter, LoopKind, NativeError,
    NextPacket, RawAddress, RawHeader, RawInterface, RawSockaddr, RawStats, Status,
};
use tracing::{debug, warn};

extern "C" {
    fn pcap_lib_version() -> *const c_char;
}

/// Capture engine backed by the system libpcap
#[derive(Debug, Default, Clone, Copy)]
pub struct PcapEngine;

impl PcapEngine {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureEngine for PcapEngine {
    fn create(&self, device: &str) -> Result<Box<dyn CaptureHandle>, NativeError> {
        let inactive = Capture::from_device(device).map_err(|e| native(&e))?;
        Ok(Box::new(PcapHandle::live(device, inactive)))
    }

    fn open_offline(&self, path: &Path) -> Result<Box<dyn CaptureHandle>, NativeError> {
        let header = SavefileHeader::sniff(path);
        let cap = Capture::from_file(path).map_err(|e| native(&e))?;
        Ok(Box::new(PcapHandle::offline(cap, header)))
    }

    fn find_all_devs(&self) -> Result<Vec<RawInterface>, NativeError> {
        let devices = Device::list().map_err(|e| native(&e))?;
        Ok(devices.into_iter().map(raw_interface).collect())
    }

    fn lib_version(&self) -> String {
        // SAFETY: takes no arguments and returns a pointer to a static
        // NUL-terminated string owned by libpcap, checked for null below.
        let version = unsafe { pcap_lib_version() };
        if version.is_null() {
            return "libpcap (unknown version)".to_string();
        }
        // SAFETY: non-null, NUL-terminated and valid for the process lifetime.
        let version = unsafe { CStr::from_ptr(version) };
        version.to_string_lossy().into_owned()
    }
}

fn raw_interface(device: Device) -> RawInterface {
    let if_flags = &device.flags.if_flags;
    let mut flags = 0;
    if if_flags.contains(pcap::IfFlags::LOOPBACK) {
        flags |= IF_LOOPBACK;
    }
    if if_flags.contains(pcap::IfFlags::UP) {
        flags |= IF_UP;
    }
    if if_flags.contains(pcap::IfFlags::RUNNING) {
        flags |= IF_RUNNING;
    }
    if if_flags.contains(pcap::IfFlags::WIRELESS) {
        flags |= IF_WIRELESS;
    }

    let addresses = device
        .addresses
        .iter()
        .map(|a| RawAddress {
            addr: Some(RawSockaddr::from_ip(a.addr)),
            netmask: a.netmask.map(RawSockaddr::from_ip),
            broadaddr: a.broadcast_addr.map(RawSockaddr::from_ip),
            dstaddr: a.dst_addr.map(RawSockaddr::from_ip),
        })
        .collect();

    RawInterface {
        name: device.name,
        description: device.desc,
        flags,
        addresses,
    }
}

/// Best-effort mapping of `pcap` crate errors onto libpcap statuses
fn classify(err: &pcap::Error) -> Status {
    let message = err.to_string().to_lowercase();
    if message.contains("no such device") {
        Status::ERROR_NO_SUCH_DEVICE
    } else if message.contains("permission") || message.contains("not permitted") {
        Status::ERROR_PERM_DENIED
    } else if message.contains("not up") {
        Status::ERROR_IFACE_NOT_UP
    } else if message.contains("monitor mode") {
        Status::ERROR_RFMON_NOTSUP
    } else {
        Status::ERROR
    }
}

fn native(err: &pcap::Error) -> NativeError {
    NativeError::new(classify(err), err.to_string())
}

/// Fields libpcap keeps from a savefile header
#[derive(Debug, Clone, Copy)]
struct SavefileHeader {
    swapped: bool,
    version: (i32, i32),
    snaplen: i32,
}

impl SavefileHeader {
    const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
    const PCAP_NSEC_MAGIC: u32 = 0xa1b2_3c4d;
    const PCAPNG_MAGIC: u32 = 0x0a0d_0d0a;
    const PCAPNG_BYTE_ORDER: u32 = 0x1a2b_3c4d;

    fn sniff(path: &Path) -> Self {
        let mut buf = [0u8; 24];
        let read = File::open(path).and_then(|mut f| f.read_exact(&mut buf));
        let header = match read {
            Ok(()) => Self::parse(&buf),
            Err(_) => None,
        };
        header.unwrap_or(Self {
            swapped: false,
            version: (0, 0),
            snaplen: 0,
        })
    }

    fn parse(buf: &[u8; 24]) -> Option<Self> {
        let word = |at: usize| [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]];
        let magic = u32::from_ne_bytes(word(0));

        if magic == Self::PCAPNG_MAGIC {
            let order = u32::from_ne_bytes(word(8));
            return Some(Self {
                swapped: order != Self::PCAPNG_BYTE_ORDER,
                version: (1, 0),
                snaplen: 0,
            });
        }

        let swapped = if magic == Self::PCAP_MAGIC || magic == Self::PCAP_NSEC_MAGIC {
            false
        } else if magic.swap_bytes() == Self::PCAP_MAGIC
            || magic.swap_bytes() == Self::PCAP_NSEC_MAGIC
        {
            true
        } else {
            return None;
        };

        let half = |at: usize| {
            let v = u16::from_ne_bytes([buf[at], buf[at + 1]]);
            if swapped {
                v.swap_bytes()
            } else {
                v
            }
        };
        let snaplen = u32::from_ne_bytes(word(16));
        let snaplen = if swapped { snaplen.swap_bytes() } else { snaplen };

        Some(Self {
            swapped,
            version: (half(4) as i32, half(6) as i32),
            snaplen: snaplen as i32,
        })
    }
}

#[derive(Default)]
struct PcapBreak(AtomicBool);

impl PcapBreak {
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

impl BreakSignal for PcapBreak {
    fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct PcapFilter {
    expression: String,
    optimize: bool,
}

impl CompiledFilter for PcapFilter {
    fn expression(&self) -> &str {
        &self.expression
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct PcapDump {
    savefile: pcap::Savefile,
}

impl DumpWriter for PcapDump {
    fn write(&mut self, header: &RawHeader, data: &[u8]) {
        let header = PacketHeader {
            ts: libc::timeval {
                tv_sec: header.ts_sec as libc::time_t,
                tv_usec: header.ts_usec as libc::suseconds_t,
            },
            caplen: header.caplen,
            len: header.len,
        };
        self.savefile.write(&Packet::new(&header, data));
    }

    fn flush(&mut self) -> Status {
        match self.savefile.flush() {
            Ok(()) => Status::OK,
            Err(e) => {
                warn!("Savefile flush failed: {}", e);
                Status::ERROR
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveSettings {
    snaplen: i32,
    promisc: bool,
    timeout_ms: i32,
    rfmon: bool,
    buffer_size: Option<i32>,
    immediate: bool,
    nonblock: bool,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            snaplen: 65535,
            promisc: false,
            timeout_ms: 0,
            rfmon: false,
            buffer_size: None,
            immediate: false,
            nonblock: false,
        }
    }
}

enum State {
    Inactive(Capture<Inactive>),
    Live(Capture<Active>),
    Offline(Capture<Offline>, SavefileHeader),
    Released,
}

struct PcapHandle {
    device: String,
    settings: LiveSettings,
    state: State,
    broken: Arc<PcapBreak>,
    last_error: String,
}

macro_rules! with_capture {
    ($self:ident, $cap:ident => $body:expr, else $fallback:expr) => {
        match &mut $self.state {
            State::Live($cap) => $body,
            State::Offline($cap, _) => $body,
            _ => $fallback,
        }
    };
}

impl PcapHandle {
    fn live(device: &str, inactive: Capture<Inactive>) -> Self {
        Self {
            device: device.to_string(),
            settings: LiveSettings::default(),
            state: State::Inactive(inactive),
            broken: Arc::new(PcapBreak::default()),
            last_error: String::new(),
        }
    }

    fn offline(cap: Capture<Offline>, header: SavefileHeader) -> Self {
        Self {
            device: String::new(),
            settings: LiveSettings {
                snaplen: header.snaplen,
                ..LiveSettings::default()
            },
            state: State::Offline(cap, header),
            broken: Arc::new(PcapBreak::default()),
            last_error: String::new(),
        }
    }

    fn configure<F>(&mut self, apply: F) -> Status
    where
        F: FnOnce(&mut LiveSettings),
    {
        match self.state {
            State::Inactive(_) => {
                apply(&mut self.settings);
                Status::OK
            }
            State::Released => self.fail(Status::ERROR, "capture handle was released"),
            _ => self.fail(
                Status::ERROR_ACTIVATED,
                "can't perform operation on activated capture",
            ),
        }
    }

    fn fail(&mut self, status: Status, message: impl Into<String>) -> Status {
        self.last_error = message.into();
        status
    }

    fn not_activated(&mut self) -> NativeError {
        self.last_error = "capture handle is not activated".to_string();
        NativeError::new(Status::ERROR_NOT_ACTIVATED, self.last_error.clone())
    }

    fn build(&self, inactive: Capture<Inactive>) -> Capture<Inactive> {
        let s = self.settings;
        let mut cap = inactive
            .snaplen(s.snaplen)
            .promisc(s.promisc)
            .timeout(s.timeout_ms)
            .immediate_mode(s.immediate);
        #[cfg(not(windows))]
        {
            cap = cap.rfmon(s.rfmon);
        }
        if let Some(size) = s.buffer_size {
            cap = cap.buffer_size(size);
        }
        cap
    }
}

fn header_of(header: &PacketHeader) -> RawHeader {
    RawHeader {
        ts_sec: header.ts.tv_sec as i64,
        ts_usec: header.ts.tv_usec as i64,
        caplen: header.caplen,
        len: header.len,
    }
}

fn read<'a, T: Activated + ?Sized>(
    cap: &'a mut Capture<T>,
    last_error: &mut String,
) -> NextPacket<'a> {
    match cap.next_packet() {
        Ok(packet) => NextPacket::Packet(header_of(packet.header), packet.data),
        Err(pcap::Error::TimeoutExpired) => NextPacket::Timeout,
        Err(pcap::Error::NoMorePackets) => NextPacket::Exhausted,
        Err(e) => {
            *last_error = e.to_string();
            NextPacket::Failed(classify(&e))
        }
    }
}

/// Packets a live dispatch processes when the caller gives no count
const LIVE_DISPATCH_BATCH: i32 = 64;

/// Count a loop runs with; live dispatches never exceed one batch
fn loop_limit(kind: LoopKind, count: i32, live: bool) -> i32 {
    if live && kind == LoopKind::Dispatch && (count <= 0 || count > LIVE_DISPATCH_BATCH) {
        LIVE_DISPATCH_BATCH
    } else {
        count
    }
}

fn drive<T: Activated + ?Sized>(
    cap: &mut Capture<T>,
    broken: &PcapBreak,
    kind: LoopKind,
    count: i32,
    handler: &mut dyn FnMut(&RawHeader, &[u8]),
    last_error: &mut String,
) -> Status {
    let mut processed = 0;
    loop {
        if broken.take() {
            return Status::ERROR_BREAK;
        }
        if count > 0 && processed >= count {
            break;
        }
        match cap.next_packet() {
            Ok(packet) => {
                handler(&header_of(packet.header), packet.data);
                processed += 1;
            }
            Err(pcap::Error::TimeoutExpired) if kind == LoopKind::Dispatch => break,
            Err(pcap::Error::TimeoutExpired) => {}
            Err(pcap::Error::NoMorePackets) => break,
            Err(e) => {
                *last_error = e.to_string();
                return classify(&e);
            }
        }
    }
    Status(processed)
}

impl CaptureHandle for PcapHandle {
    fn set_snaplen(&mut self, snaplen: i32) -> Status {
        self.configure(|s| s.snaplen = snaplen)
    }

    fn set_promisc(&mut self, promisc: bool) -> Status {
        self.configure(|s| s.promisc = promisc)
    }

    fn set_timeout(&mut self, timeout_ms: i32) -> Status {
        self.configure(|s| s.timeout_ms = timeout_ms)
    }

    fn set_rfmon(&mut self, rfmon: bool) -> Status {
        self.configure(|s| s.rfmon = rfmon)
    }

    fn set_buffer_size(&mut self, bytes: i32) -> Status {
        self.configure(|s| s.buffer_size = Some(bytes))
    }

    fn set_immediate_mode(&mut self, immediate: bool) -> Status {
        self.configure(|s| s.immediate = immediate)
    }

    fn set_nonblock(&mut self, nonblock: bool) -> Status {
        match std::mem::replace(&mut self.state, State::Released) {
            State::Inactive(cap) => {
                self.settings.nonblock = nonblock;
                self.state = State::Inactive(cap);
                Status::OK
            }
            State::Live(cap) if nonblock && !self.settings.nonblock => match cap.setnonblock() {
                Ok(cap) => {
                    self.settings.nonblock = true;
                    self.state = State::Live(cap);
                    Status::OK
                }
                Err(e) => self.fail(Status::ERROR, e.to_string()),
            },
            State::Live(cap) => {
                self.state = State::Live(cap);
                if nonblock == self.settings.nonblock {
                    Status::OK
                } else {
                    self.fail(Status::ERROR, "cannot switch a live capture back to blocking mode")
                }
            }
            other => {
                self.state = other;
                Status::OK
            }
        }
    }

    fn activate(&mut self) -> Status {
        let inactive = match std::mem::replace(&mut self.state, State::Released) {
            State::Inactive(cap) => cap,
            other => {
                self.state = other;
                return self.fail(
                    Status::ERROR_ACTIVATED,
                    "can't perform operation on activated capture",
                );
            }
        };

        match self.build(inactive).open() {
            Ok(cap) => {
                let cap = if self.settings.nonblock {
                    match cap.setnonblock() {
                        Ok(cap) => cap,
                        Err(e) => return self.fail(Status::ERROR, e.to_string()),
                    }
                } else {
                    cap
                };
                debug!(device = %self.device, "libpcap handle activated");
                self.state = State::Live(cap);
                Status::OK
            }
            Err(e) => {
                let status = classify(&e);
                self.last_error = e.to_string();
                // `open` consumed the handle; start over so the caller can retry.
                match Capture::from_device(self.device.as_str()) {
                    Ok(cap) => self.state = State::Inactive(cap),
                    Err(e) => warn!(device = %self.device, "Failed to recreate handle: {}", e),
                }
                status
            }
        }
    }

    fn next_packet(&mut self) -> NextPacket<'_> {
        let last_error = &mut self.last_error;
        match &mut self.state {
            State::Live(cap) => read(cap, last_error),
            State::Offline(cap, _) => read(cap, last_error),
            _ => {
                *last_error = "capture handle is not activated".to_string();
                NextPacket::Failed(Status::ERROR_NOT_ACTIVATED)
            }
        }
    }

    fn run_loop(
        &mut self,
        kind: LoopKind,
        count: i32,
        handler: &mut dyn FnMut(&RawHeader, &[u8]),
    ) -> Status {
        let broken = Arc::clone(&self.broken);
        let last_error = &mut self.last_error;
        match &mut self.state {
            State::Live(cap) => {
                let count = loop_limit(kind, count, true);
                drive(cap, &broken, kind, count, handler, last_error)
            }
            State::Offline(cap, _) => {
                let count = loop_limit(kind, count, false);
                drive(cap, &broken, kind, count, handler, last_error)
            }
            _ => {
                *last_error = "capture handle is not activated".to_string();
                Status::ERROR_NOT_ACTIVATED
            }
        }
    }

    fn break_signal(&mut self) -> Arc<dyn BreakSignal> {
        self.broken.clone()
    }

    fn compile(
        &mut self,
        expression: &str,
        optimize: bool,
        _netmask: u32,
    ) -> Result<Arc<dyn CompiledFilter>, NativeError> {
        let compiled = with_capture!(self, cap => cap.compile(expression, optimize).map(drop),
            else return Err(self.not_activated()));
        match compiled {
            Ok(()) => Ok(Arc::new(PcapFilter {
                expression: expression.to_string(),
                optimize,
            })),
            Err(e) => {
                self.last_error = e.to_string();
                Err(NativeError::new(Status::ERROR, self.last_error.clone()))
            }
        }
    }

    fn set_filter(&mut self, program: &dyn CompiledFilter) -> Status {
        let Some(filter) = program.as_any().downcast_ref::<PcapFilter>() else {
            return self.fail(Status::ERROR, "filter was not compiled by this engine");
        };
        let applied = with_capture!(self, cap => cap.filter(&filter.expression, filter.optimize),
            else return self.fail(Status::ERROR_NOT_ACTIVATED, "capture handle is not activated"));
        match applied {
            Ok(()) => Status::OK,
            Err(e) => self.fail(Status::ERROR, e.to_string()),
        }
    }

    fn open_dump(&mut self, path: &Path) -> Result<Box<dyn DumpWriter>, NativeError> {
        let savefile = with_capture!(self, cap => cap.savefile(path),
            else return Err(self.not_activated()));
        match savefile {
            Ok(savefile) => Ok(Box::new(PcapDump { savefile })),
            Err(e) => {
                self.last_error = e.to_string();
                Err(NativeError::new(Status::ERROR, self.last_error.clone()))
            }
        }
    }

    fn datalink(&self) -> i32 {
        match &self.state {
            State::Live(cap) => cap.get_datalink().0,
            State::Offline(cap, _) => cap.get_datalink().0,
            _ => -1,
        }
    }

    fn snapshot(&self) -> i32 {
        self.settings.snaplen
    }

    fn stats(&mut self) -> Result<RawStats, NativeError> {
        let stats = match &mut self.state {
            State::Live(cap) => cap.stats(),
            State::Offline(..) => {
                self.last_error = "Statistics aren't available from savefiles".to_string();
                return Err(NativeError::new(Status::ERROR, self.last_error.clone()));
            }
            _ => return Err(self.not_activated()),
        };
        stats
            .map(|s| RawStats {
                received: s.received,
                dropped: s.dropped,
                if_dropped: s.if_dropped,
            })
            .map_err(|e| native(&e))
    }

    fn is_swapped(&self) -> bool {
        matches!(&self.state, State::Offline(_, header) if header.swapped)
    }

    fn version(&self) -> (i32, i32) {
        match &self.state {
            State::Offline(_, header) => header.version,
            _ => (0, 0),
        }
    }

    #[cfg(unix)]
    fn fileno(&self) -> i32 {
        use std::os::unix::io::AsRawFd;
        match &self.state {
            State::Live(cap) => cap.as_raw_fd(),
            _ => -1,
        }
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcap_header(magic: u32, swapped: bool) -> [u8; 24] {
        let mut buf = [0u8; 24];
        let put32 = |buf: &mut [u8; 24], at: usize, v: u32| {
            let v = if swapped { v.swap_bytes() } else { v };
            buf[at..at + 4].copy_from_slice(&v.to_ne_bytes());
        };
        let put16 = |buf: &mut [u8; 24], at: usize, v: u16| {
            let v = if swapped { v.swap_bytes() } else { v };
            buf[at..at + 2].copy_from_slice(&v.to_ne_bytes());
        };
        put32(&mut buf, 0, magic);
        put16(&mut buf, 4, 2);
        put16(&mut buf, 6, 4);
        put32(&mut buf, 16, 262144);
        put32(&mut buf, 20, 1);
        buf
    }

    #[test]
    fn test_parse_native_header() {
        let header = SavefileHeader::parse(&pcap_header(SavefileHeader::PCAP_MAGIC, false)).unwrap();
        assert!(!header.swapped);
        assert_eq!(header.version, (2, 4));
        assert_eq!(header.snaplen, 262144);
    }

    #[test]
    fn test_parse_swapped_header() {
        let header =
            SavefileHeader::parse(&pcap_header(SavefileHeader::PCAP_NSEC_MAGIC, true)).unwrap();
        assert!(header.swapped);
        assert_eq!(header.version, (2, 4));
        assert_eq!(header.snaplen, 262144);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SavefileHeader::parse(&[0x42; 24]).is_none());
    }

    #[test]
    fn test_lib_version_names_libpcap() {
        assert!(PcapEngine::new().lib_version().to_lowercase().contains("pcap"));
    }

    fn write_savefile(dir: &Path, payloads: &[&[u8]]) -> std::path::PathBuf {
        let mut buf = pcap_header(SavefileHeader::PCAP_MAGIC, false).to_vec();
        for (i, data) in payloads.iter().enumerate() {
            for field in [100 + i as u32, 0, data.len() as u32, data.len() as u32] {
                buf.extend_from_slice(&field.to_ne_bytes());
            }
            buf.extend_from_slice(data);
        }
        let path = dir.join("three.pcap");
        std::fs::write(&path, buf).unwrap();
        path
    }

    fn three_records(dir: &Path) -> Box<dyn CaptureHandle> {
        let path = write_savefile(dir, &[&[1, 0xaa], &[2, 0xbb], &[3, 0xcc]]);
        PcapEngine::new().open_offline(&path).unwrap()
    }

    #[test]
    fn test_loop_limit() {
        assert_eq!(loop_limit(LoopKind::Dispatch, 0, true), LIVE_DISPATCH_BATCH);
        assert_eq!(loop_limit(LoopKind::Dispatch, -1, true), LIVE_DISPATCH_BATCH);
        assert_eq!(loop_limit(LoopKind::Dispatch, 10_000, true), LIVE_DISPATCH_BATCH);
        assert_eq!(loop_limit(LoopKind::Dispatch, 5, true), 5);
        assert_eq!(loop_limit(LoopKind::Dispatch, 0, false), 0);
        assert_eq!(loop_limit(LoopKind::Loop, 0, true), 0);
    }

    #[test]
    fn test_savefile_loop_delivers_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = three_records(dir.path());

        let mut seen = Vec::new();
        let status = handle.run_loop(LoopKind::Loop, 0, &mut |_: &RawHeader, data: &[u8]| {
            seen.push(data[0])
        });

        assert_eq!(status, Status(3));
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_savefile_dispatch_honours_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = three_records(dir.path());

        let mut seen = Vec::new();
        let first = handle.run_loop(LoopKind::Dispatch, 2, &mut |_: &RawHeader, data: &[u8]| {
            seen.push(data[0])
        });
        let rest = handle.run_loop(LoopKind::Dispatch, 0, &mut |_: &RawHeader, data: &[u8]| {
            seen.push(data[0])
        });

        assert_eq!(first, Status(2));
        assert_eq!(rest, Status(1));
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_break_before_loop_is_consumed() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = three_records(dir.path());
        handle.break_signal().request();

        let mut calls = 0;
        let broken = handle.run_loop(LoopKind::Loop, 0, &mut |_: &RawHeader, _: &[u8]| calls += 1);
        assert_eq!(broken, Status::ERROR_BREAK);
        assert_eq!(calls, 0);

        let status = handle.run_loop(LoopKind::Loop, 0, &mut |_: &RawHeader, _: &[u8]| calls += 1);
        assert_eq!(status, Status(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_missing_savefile_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.pcap");
        let err = PcapEngine::new().open_offline(&path).err().unwrap();
        assert!(err.status.is_error());
    }
}
