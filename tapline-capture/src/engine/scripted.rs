//! In-process capture engine driven by scripts
//!
//! Devices and savefiles are registered up front and replayed packet by
//! packet. The engine keeps libpcap's rules: handles can be created for any
//! name, unknown devices fail at activation, setters are refused once a
//! handle is active, and a break request is consumed by the loop it stops.
//! Filter expressions map to predicates registered by the caller.
//!
//! Savefiles opened for writing become replayable savefiles of the same
//! engine.

use bytes::Bytes;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tapline_core::{
    BreakSignal, CaptureEngine, CaptureHandle, CompiledFilter, DumpWriter, Linktype, LoopKind,
    NativeError, NextPacket, PacketRecord, RawHeader, RawInterface, RawStats, Status,
};

/// Filter predicate over raw packet bytes
pub type PacketPredicate = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// One step of a scripted capture
#[derive(Debug, Clone)]
pub enum ScriptEvent {
    /// Packet arrives
    Packet(RawHeader, Bytes),
    /// Read timeout expires with nothing to deliver
    Timeout,
    /// Read fails with a status and diagnostic text
    Fail(Status, String),
}

impl ScriptEvent {
    /// Untruncated packet with the given timestamp
    pub fn packet(ts_sec: i64, ts_usec: i64, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = data.len() as u32;
        Self::Packet(
            RawHeader {
                ts_sec,
                ts_usec,
                caplen: len,
                len,
            },
            data,
        )
    }
}

/// Behaviour of a scripted live device
#[derive(Debug, Clone)]
pub struct DeviceScript {
    linktype: Linktype,
    events: Vec<ScriptEvent>,
    rfmon_supported: bool,
    activation: Option<(Status, String)>,
    fd: i32,
}

impl DeviceScript {
    pub fn new(linktype: Linktype) -> Self {
        Self {
            linktype,
            events: Vec::new(),
            rfmon_supported: false,
            activation: None,
            fd: -1,
        }
    }

    pub fn ethernet() -> Self {
        Self::new(Linktype::ETHERNET)
    }

    pub fn event(mut self, event: ScriptEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn packet(self, ts_sec: i64, data: impl Into<Bytes>) -> Self {
        self.event(ScriptEvent::packet(ts_sec, 0, data))
    }

    pub fn timeout(self) -> Self {
        self.event(ScriptEvent::Timeout)
    }

    pub fn fail(self, status: Status, message: impl Into<String>) -> Self {
        self.event(ScriptEvent::Fail(status, message.into()))
    }

    /// Allow monitor mode on this device
    pub fn rfmon_supported(mut self, supported: bool) -> Self {
        self.rfmon_supported = supported;
        self
    }

    /// Status activation reports; errors leave the handle inactive
    pub fn activation(mut self, status: Status, message: impl Into<String>) -> Self {
        self.activation = Some((status, message.into()));
        self
    }

    /// Selectable descriptor reported once active
    pub fn fileno(mut self, fd: i32) -> Self {
        self.fd = fd;
        self
    }
}

/// Contents of a scripted savefile
#[derive(Debug, Clone)]
pub struct SavefileScript {
    linktype: Linktype,
    snaplen: i32,
    swapped: bool,
    version: (i32, i32),
    packets: Vec<(RawHeader, Bytes)>,
}

impl SavefileScript {
    pub fn new(linktype: Linktype) -> Self {
        Self {
            linktype,
            snaplen: 65535,
            swapped: false,
            version: (2, 4),
            packets: Vec::new(),
        }
    }

    pub fn snaplen(mut self, snaplen: i32) -> Self {
        self.snaplen = snaplen;
        self
    }

    /// Mark the file as written on a host of the other byte order
    pub fn swapped(mut self, swapped: bool) -> Self {
        self.swapped = swapped;
        self
    }

    pub fn version(mut self, major: i32, minor: i32) -> Self {
        self.version = (major, minor);
        self
    }

    pub fn packet(mut self, ts_sec: i64, data: impl Into<Bytes>) -> Self {
        if let ScriptEvent::Packet(header, data) = ScriptEvent::packet(ts_sec, 0, data) {
            self.packets.push((header, data));
        }
        self
    }

    pub fn record(mut self, header: RawHeader, data: impl Into<Bytes>) -> Self {
        self.packets.push((header, data.into()));
        self
    }
}

#[derive(Default)]
struct Registry {
    devices: HashMap<String, DeviceScript>,
    savefiles: HashMap<PathBuf, SavefileScript>,
    interfaces: Vec<RawInterface>,
    enumeration_error: Option<NativeError>,
    filters: HashMap<String, PacketPredicate>,
}

#[derive(Default)]
struct Counters {
    created: AtomicU64,
    released: AtomicU64,
    reads: AtomicU64,
}

/// Capture engine that replays registered scripts
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    registry: Arc<Mutex<Registry>>,
    counters: Arc<Counters>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, name: &str, script: DeviceScript) {
        self.registry.lock().devices.insert(name.to_string(), script);
    }

    pub fn add_savefile(&self, path: impl Into<PathBuf>, script: SavefileScript) {
        self.registry.lock().savefiles.insert(path.into(), script);
    }

    /// Append an interface to the enumeration
    pub fn add_interface(&self, interface: RawInterface) {
        self.registry.lock().interfaces.push(interface);
    }

    /// Make enumeration fail from now on
    pub fn fail_enumeration(&self, status: Status, message: &str) {
        self.registry.lock().enumeration_error = Some(NativeError::new(status, message));
    }

    /// Teach the compiler an expression
    pub fn register_filter<F>(&self, expression: &str, predicate: F)
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.registry
            .lock()
            .filters
            .insert(expression.to_string(), Arc::new(predicate));
    }

    /// Records written to a savefile so far
    pub fn savefile_records(&self, path: impl AsRef<Path>) -> Option<Vec<PacketRecord>> {
        self.registry.lock().savefiles.get(path.as_ref()).map(|file| {
            file.packets
                .iter()
                .map(|(header, data)| PacketRecord::from_raw(header, data))
                .collect()
        })
    }

    /// Handles created so far
    pub fn handles_created(&self) -> u64 {
        self.counters.created.load(Ordering::SeqCst)
    }

    /// Handles released so far
    pub fn handles_released(&self) -> u64 {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Read and loop calls that reached an active handle
    pub fn reads(&self) -> u64 {
        self.counters.reads.load(Ordering::SeqCst)
    }

    fn handle(&self, source: Source) -> ScriptedHandle {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        ScriptedHandle {
            registry: Arc::clone(&self.registry),
            counters: Arc::clone(&self.counters),
            source,
            active: false,
            snaplen: 65535,
            promisc: false,
            timeout_ms: 0,
            rfmon: false,
            buffer_size: None,
            immediate: false,
            nonblock: false,
            linktype: Linktype::ETHERNET,
            events: VecDeque::new(),
            filter: None,
            current: Bytes::new(),
            broken: Arc::new(ScriptedBreak::default()),
            received: 0,
            fd: -1,
            last_error: String::new(),
        }
    }
}

impl fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("ScriptedEngine")
            .field("devices", &registry.devices.len())
            .field("savefiles", &registry.savefiles.len())
            .field("interfaces", &registry.interfaces.len())
            .finish()
    }
}

impl CaptureEngine for ScriptedEngine {
    fn create(&self, device: &str) -> Result<Box<dyn CaptureHandle>, NativeError> {
        Ok(Box::new(self.handle(Source::Device(device.to_string()))))
    }

    fn open_offline(&self, path: &Path) -> Result<Box<dyn CaptureHandle>, NativeError> {
        let file = self
            .registry
            .lock()
            .savefiles
            .get(path)
            .cloned()
            .ok_or_else(|| {
                NativeError::new(
                    Status::ERROR,
                    format!("{}: No such file or directory", path.display()),
                )
            })?;

        let mut handle = self.handle(Source::Savefile {
            swapped: file.swapped,
            version: file.version,
        });
        handle.active = true;
        handle.linktype = file.linktype;
        handle.snaplen = file.snaplen;
        handle.events = file
            .packets
            .into_iter()
            .map(|(header, data)| ScriptEvent::Packet(header, data))
            .collect();
        Ok(Box::new(handle))
    }

    fn find_all_devs(&self) -> Result<Vec<RawInterface>, NativeError> {
        let registry = self.registry.lock();
        match &registry.enumeration_error {
            Some(err) => Err(err.clone()),
            None => Ok(registry.interfaces.clone()),
        }
    }

    fn lib_version(&self) -> String {
        format!("scripted engine {}", env!("CARGO_PKG_VERSION"))
    }
}

enum Source {
    Device(String),
    Savefile { swapped: bool, version: (i32, i32) },
}

#[derive(Default)]
struct ScriptedBreak(AtomicBool);

impl ScriptedBreak {
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

impl BreakSignal for ScriptedBreak {
    fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

struct ScriptedFilter {
    expression: String,
    predicate: PacketPredicate,
}

impl fmt::Debug for ScriptedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedFilter")
            .field("expression", &self.expression)
            .finish()
    }
}

impl CompiledFilter for ScriptedFilter {
    fn expression(&self) -> &str {
        &self.expression
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct ScriptedDump {
    registry: Arc<Mutex<Registry>>,
    path: PathBuf,
}

impl DumpWriter for ScriptedDump {
    fn write(&mut self, header: &RawHeader, data: &[u8]) {
        if let Some(file) = self.registry.lock().savefiles.get_mut(&self.path) {
            file.packets.push((*header, Bytes::copy_from_slice(data)));
        }
    }

    fn flush(&mut self) -> Status {
        Status::OK
    }
}

enum Step {
    Deliver(RawHeader),
    Skip,
    Timeout,
    Exhausted,
    Failed(Status),
}

struct ScriptedHandle {
    registry: Arc<Mutex<Registry>>,
    counters: Arc<Counters>,
    source: Source,
    active: bool,
    snaplen: i32,
    promisc: bool,
    timeout_ms: i32,
    rfmon: bool,
    buffer_size: Option<i32>,
    immediate: bool,
    nonblock: bool,
    linktype: Linktype,
    events: VecDeque<ScriptEvent>,
    filter: Option<PacketPredicate>,
    current: Bytes,
    broken: Arc<ScriptedBreak>,
    received: u32,
    fd: i32,
    last_error: String,
}

impl ScriptedHandle {
    fn is_live(&self) -> bool {
        matches!(self.source, Source::Device(_))
    }

    fn refuse_when_active(&mut self) -> Option<Status> {
        if self.active {
            self.last_error = "can't perform operation on activated capture".to_string();
            Some(Status::ERROR_ACTIVATED)
        } else {
            None
        }
    }

    fn refuse_when_inactive(&mut self) -> Option<Status> {
        if self.active {
            None
        } else {
            self.last_error = "capture handle is not activated".to_string();
            Some(Status::ERROR_NOT_ACTIVATED)
        }
    }

    /// Pop the next event, leaving a delivered payload in `current`
    fn step(&mut self) -> Step {
        match self.events.pop_front() {
            None => Step::Exhausted,
            Some(ScriptEvent::Timeout) => Step::Timeout,
            Some(ScriptEvent::Fail(status, message)) => {
                self.last_error = message;
                Step::Failed(status)
            }
            Some(ScriptEvent::Packet(mut header, data)) => {
                self.received += 1;
                if let Some(filter) = &self.filter {
                    if !filter(&data[..]) {
                        return Step::Skip;
                    }
                }
                let snaplen = self.snaplen.max(0) as usize;
                let keep = data.len().min(snaplen).min(header.caplen as usize);
                header.caplen = keep as u32;
                self.current = data.slice(..keep);
                Step::Deliver(header)
            }
        }
    }
}

impl fmt::Debug for ScriptedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedHandle")
            .field("active", &self.active)
            .field("snaplen", &self.snaplen)
            .field("promisc", &self.promisc)
            .field("timeout_ms", &self.timeout_ms)
            .field("rfmon", &self.rfmon)
            .field("buffer_size", &self.buffer_size)
            .field("immediate", &self.immediate)
            .field("nonblock", &self.nonblock)
            .field("pending", &self.events.len())
            .finish()
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

macro_rules! setter {
    ($name:ident, $field:ident, $ty:ty) => {
        fn $name(&mut self, value: $ty) -> Status {
            if let Some(status) = self.refuse_when_active() {
                return status;
            }
            self.$field = value;
            Status::OK
        }
    };
}

impl CaptureHandle for ScriptedHandle {
    setter!(set_snaplen, snaplen, i32);
    setter!(set_promisc, promisc, bool);
    setter!(set_timeout, timeout_ms, i32);
    setter!(set_rfmon, rfmon, bool);
    setter!(set_immediate_mode, immediate, bool);

    fn set_buffer_size(&mut self, bytes: i32) -> Status {
        if let Some(status) = self.refuse_when_active() {
            return status;
        }
        self.buffer_size = Some(bytes);
        Status::OK
    }

    fn set_nonblock(&mut self, nonblock: bool) -> Status {
        self.nonblock = nonblock;
        Status::OK
    }

    fn activate(&mut self) -> Status {
        if let Some(status) = self.refuse_when_active() {
            return status;
        }
        let Source::Device(name) = &self.source else {
            return Status::ERROR;
        };

        let script = self.registry.lock().devices.get(name).cloned();
        let Some(script) = script else {
            self.last_error = format!("{}: No such device exists", name);
            return Status::ERROR_NO_SUCH_DEVICE;
        };

        if self.rfmon && !script.rfmon_supported {
            self.last_error = format!("{}: That device doesn't support monitor mode", name);
            return Status::ERROR_RFMON_NOTSUP;
        }

        let status = match script.activation {
            Some((status, message)) => {
                self.last_error = message;
                status
            }
            None => Status::OK,
        };
        if status.is_error() {
            return status;
        }

        self.active = true;
        self.linktype = script.linktype;
        self.fd = script.fd;
        self.events = script.events.into_iter().collect();
        status
    }

    fn next_packet(&mut self) -> NextPacket<'_> {
        if let Some(status) = self.refuse_when_inactive() {
            return NextPacket::Failed(status);
        }
        self.counters.reads.fetch_add(1, Ordering::SeqCst);

        loop {
            match self.step() {
                Step::Deliver(header) => return NextPacket::Packet(header, &self.current[..]),
                Step::Skip => continue,
                Step::Timeout => return NextPacket::Timeout,
                Step::Failed(status) => return NextPacket::Failed(status),
                Step::Exhausted if self.is_live() => return NextPacket::Timeout,
                Step::Exhausted => return NextPacket::Exhausted,
            }
        }
    }

    fn run_loop(
        &mut self,
        kind: LoopKind,
        count: i32,
        handler: &mut dyn FnMut(&RawHeader, &[u8]),
    ) -> Status {
        if let Some(status) = self.refuse_when_inactive() {
            return status;
        }
        self.counters.reads.fetch_add(1, Ordering::SeqCst);

        let mut processed = 0;
        loop {
            if self.broken.take() {
                return Status::ERROR_BREAK;
            }
            if count > 0 && processed >= count {
                break;
            }
            match self.step() {
                Step::Deliver(header) => {
                    handler(&header, &self.current[..]);
                    processed += 1;
                }
                Step::Skip => {}
                Step::Timeout if kind == LoopKind::Dispatch => break,
                Step::Timeout => {}
                Step::Exhausted => break,
                Step::Failed(status) => return status,
            }
        }
        Status(processed)
    }

    fn break_signal(&mut self) -> Arc<dyn BreakSignal> {
        self.broken.clone()
    }

    fn compile(
        &mut self,
        expression: &str,
        _optimize: bool,
        _netmask: u32,
    ) -> Result<Arc<dyn CompiledFilter>, NativeError> {
        if let Some(status) = self.refuse_when_inactive() {
            return Err(NativeError::new(status, self.last_error.clone()));
        }

        let predicate = if expression.trim().is_empty() {
            Some(Arc::new(|_: &[u8]| true) as PacketPredicate)
        } else {
            self.registry.lock().filters.get(expression).cloned()
        };

        match predicate {
            Some(predicate) => Ok(Arc::new(ScriptedFilter {
                expression: expression.to_string(),
                predicate,
            })),
            None => {
                self.last_error = format!("syntax error in filter expression: {}", expression);
                Err(NativeError::new(Status::ERROR, self.last_error.clone()))
            }
        }
    }

    fn set_filter(&mut self, program: &dyn CompiledFilter) -> Status {
        match program.as_any().downcast_ref::<ScriptedFilter>() {
            Some(filter) => {
                self.filter = Some(Arc::clone(&filter.predicate));
                Status::OK
            }
            None => {
                self.last_error = "filter was not compiled by this engine".to_string();
                Status::ERROR
            }
        }
    }

    fn open_dump(&mut self, path: &Path) -> Result<Box<dyn DumpWriter>, NativeError> {
        if let Some(status) = self.refuse_when_inactive() {
            return Err(NativeError::new(status, self.last_error.clone()));
        }

        let file = SavefileScript::new(self.linktype).snaplen(self.snaplen);
        self.registry
            .lock()
            .savefiles
            .insert(path.to_path_buf(), file);
        Ok(Box::new(ScriptedDump {
            registry: Arc::clone(&self.registry),
            path: path.to_path_buf(),
        }))
    }

    fn datalink(&self) -> i32 {
        self.linktype.0
    }

    fn snapshot(&self) -> i32 {
        self.snaplen
    }

    fn stats(&mut self) -> Result<RawStats, NativeError> {
        if !self.is_live() {
            return Err(NativeError::new(
                Status::ERROR,
                "Statistics aren't available from savefiles",
            ));
        }
        Ok(RawStats {
            received: self.received,
            dropped: 0,
            if_dropped: 0,
        })
    }

    fn is_swapped(&self) -> bool {
        match self.source {
            Source::Savefile { swapped, .. } => swapped,
            Source::Device(_) => false,
        }
    }

    fn version(&self) -> (i32, i32) {
        match self.source {
            Source::Savefile { version, .. } => version,
            Source::Device(_) => (0, 0),
        }
    }

    fn fileno(&self) -> i32 {
        if self.is_live() {
            self.fd
        } else {
            -1
        }
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(handle: &mut dyn CaptureHandle, kind: LoopKind, count: i32) -> (Status, Vec<u8>) {
        let mut seen = Vec::new();
        let status = handle.run_loop(kind, count, &mut |_: &RawHeader, data: &[u8]| seen.push(data[0]));
        (status, seen)
    }

    #[test]
    fn test_unknown_device_fails_at_activation() {
        let engine = ScriptedEngine::new();
        let mut handle = engine.create("nope0").unwrap();
        assert_eq!(handle.activate(), Status::ERROR_NO_SUCH_DEVICE);
        assert!(handle.last_error().contains("nope0"));
    }

    #[test]
    fn test_setters_refused_after_activation() {
        let engine = ScriptedEngine::new();
        engine.add_device("eth0", DeviceScript::ethernet());
        let mut handle = engine.create("eth0").unwrap();

        assert_eq!(handle.set_snaplen(128), Status::OK);
        assert_eq!(handle.activate(), Status::OK);
        assert_eq!(handle.set_snaplen(256), Status::ERROR_ACTIVATED);
        assert_eq!(handle.snapshot(), 128);
        assert_eq!(handle.set_nonblock(true), Status::OK);
    }

    #[test]
    fn test_loop_counts_and_break() {
        let engine = ScriptedEngine::new();
        engine.add_device(
            "eth0",
            DeviceScript::ethernet().packet(1, vec![1]).packet(2, vec![2]).packet(3, vec![3]),
        );
        let mut handle = engine.create("eth0").unwrap();
        handle.activate();

        let (status, seen) = collect(handle.as_mut(), LoopKind::Loop, 2);
        assert_eq!(status, Status(2));
        assert_eq!(seen, vec![1, 2]);

        handle.break_signal().request();
        let (status, seen) = collect(handle.as_mut(), LoopKind::Loop, 0);
        assert_eq!(status, Status::ERROR_BREAK);
        assert!(seen.is_empty());

        let (status, seen) = collect(handle.as_mut(), LoopKind::Loop, 0);
        assert_eq!(status, Status(1));
        assert_eq!(seen, vec![3]);
    }

    #[test]
    fn test_dispatch_stops_at_timeout() {
        let engine = ScriptedEngine::new();
        engine.add_device(
            "eth0",
            DeviceScript::ethernet().packet(1, vec![1]).timeout().packet(2, vec![2]),
        );
        let mut handle = engine.create("eth0").unwrap();
        handle.activate();

        let (status, seen) = collect(handle.as_mut(), LoopKind::Dispatch, 0);
        assert_eq!(status, Status(1));
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn test_snaplen_truncates() {
        let engine = ScriptedEngine::new();
        engine.add_device("eth0", DeviceScript::ethernet().packet(1, vec![0u8; 100]));
        let mut handle = engine.create("eth0").unwrap();
        handle.set_snaplen(40);
        handle.activate();

        match handle.next_packet() {
            NextPacket::Packet(header, data) => {
                assert_eq!(header.caplen, 40);
                assert_eq!(header.len, 100);
                assert_eq!(data.len(), 40);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_expression_does_not_compile() {
        let engine = ScriptedEngine::new();
        engine.add_savefile("t.pcap", SavefileScript::new(Linktype::ETHERNET));
        let mut handle = engine.open_offline(Path::new("t.pcap")).unwrap();

        let err = handle.compile("bogus", true, 0).unwrap_err();
        assert_eq!(err.status, Status::ERROR);
        assert!(err.message.contains("bogus"));
        assert!(handle.compile("", true, 0).is_ok());
    }

    #[test]
    fn test_release_counted_once_per_handle() {
        let engine = ScriptedEngine::new();
        let handle = engine.create("eth0").unwrap();
        assert_eq!(engine.handles_created(), 1);
        drop(handle);
        assert_eq!(engine.handles_released(), 1);
    }
}
