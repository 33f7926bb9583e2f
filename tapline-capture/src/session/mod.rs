//! Capture sessions
//!
//! A session wraps one native capture handle and walks it through
//! `Configured -> Activated -> Closed`. [`LiveSession`] reads from a network
//! interface, [`OfflineSession`] from a savefile; both share
//! [`SessionCore`] and get every packet operation from the [`Session`] trait.

mod live;
mod offline;
mod state;


pub use live::LiveSession;
pub use offline::OfflineSession;
pub use state::{SessionCore, SessionState};
pub use tapline_core::LoopKind as LoopMode;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tapline_core::{BreakSignal, CaptureError, Linktype, LoopError, PacketRecord, Result};
use tracing::debug;
use uuid::Uuid;

use crate::dump::DumpSink;
use crate::filter::{FilterProgram, FilterSource};
use crate::stats::CaptureStats;

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::LiveSession {}
    impl Sealed for super::OfflineSession {}
}

/// Interrupts the loop of one session
///
/// Cheap to clone and safe to use from another thread or from inside a
/// running callback.
#[derive(Clone)]
pub struct BreakHandle {
    requested: Arc<AtomicBool>,
    signal: Arc<dyn BreakSignal>,
}

impl BreakHandle {
    pub(crate) fn new(signal: Arc<dyn BreakSignal>) -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            signal,
        }
    }

    /// Ask the current (or next) loop to stop with [`CaptureError::Break`]
    pub fn breakloop(&self) {
        debug!("Break requested");
        self.requested.store(true, Ordering::SeqCst);
        self.signal.request();
    }

    /// Whether a break is pending
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Native break only; used when a callback fails
    pub(crate) fn signal_engine(&self) {
        self.signal.request();
    }

    pub(crate) fn take_requested(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

impl std::fmt::Debug for BreakHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakHandle")
            .field("requested", &self.is_requested())
            .finish()
    }
}

/// Operations every capture session supports
///
/// Implemented by [`LiveSession`] and [`OfflineSession`] only.
pub trait Session: sealed::Sealed {
    fn core(&self) -> &SessionCore;

    fn core_mut(&mut self) -> &mut SessionCore;

    /// Commit configuration and start the capture
    ///
    /// Warnings come back as `Err` with [`CaptureError::is_warning`] set; the
    /// session is activated regardless.
    fn activate(&mut self) -> Result<()>;

    fn id(&self) -> Uuid {
        self.core().id()
    }

    /// Device name or savefile path
    fn source(&self) -> &str {
        self.core().source()
    }

    fn state(&self) -> SessionState {
        self.core().state()
    }

    fn is_activated(&self) -> bool {
        self.core().is_activated()
    }

    /// Read one packet
    ///
    /// `Ok(None)` means the savefile is exhausted; a live read that times out
    /// returns [`CaptureError::Timeout`].
    fn read_next(&mut self) -> Result<Option<PacketRecord>> {
        self.core_mut().read_next()
    }

    /// Iterate over packets until the input ends
    fn packets(&mut self) -> Packets<'_, Self>
    where
        Self: Sized,
    {
        Packets {
            session: self,
            done: false,
        }
    }

    /// Run `callback` for every packet the engine delivers
    ///
    /// [`LoopMode::Dispatch`] returns `Some(count)`, [`LoopMode::Loop`]
    /// returns `None`. A callback error stops the loop and comes back as
    /// [`LoopError::Handler`].
    fn run_loop<F, E>(
        &mut self,
        mode: LoopMode,
        limit: i32,
        callback: F,
    ) -> std::result::Result<Option<usize>, LoopError<E>>
    where
        F: FnMut(&PacketRecord) -> std::result::Result<(), E>,
    {
        self.core_mut().run_loop(mode, limit, callback)
    }

    /// Process at most `limit` available packets (`limit <= 0`: one buffer)
    fn dispatch<F, E>(&mut self, limit: i32, callback: F) -> std::result::Result<usize, LoopError<E>>
    where
        F: FnMut(&PacketRecord) -> std::result::Result<(), E>,
    {
        let count = self.run_loop(LoopMode::Dispatch, limit, callback)?;
        Ok(count.unwrap_or(0))
    }

    /// Process packets until `limit` is reached (`limit <= 0`: no limit)
    fn loop_packets<F, E>(&mut self, limit: i32, callback: F) -> std::result::Result<(), LoopError<E>>
    where
        F: FnMut(&PacketRecord) -> std::result::Result<(), E>,
    {
        self.run_loop(LoopMode::Loop, limit, callback).map(|_| ())
    }

    /// Interrupt the running loop, or the next one if none is running
    fn breakloop(&self) -> Result<()> {
        self.core().break_handle()?.breakloop();
        Ok(())
    }

    /// Handle for interrupting this session from elsewhere
    fn break_handle(&self) -> Result<BreakHandle> {
        self.core().break_handle()
    }

    /// Compile a filter expression against this session
    fn compile_filter(&mut self, expression: &str) -> Result<FilterProgram> {
        self.core_mut().compile_filter(expression)
    }

    /// Attach a compiled program or an expression
    fn set_filter(&mut self, filter: impl Into<FilterSource>) -> Result<()>
    where
        Self: Sized,
    {
        self.core_mut().set_filter(filter.into())
    }

    fn filter(&self) -> Option<&FilterProgram> {
        self.core().filter()
    }

    /// Savefile to open automatically at activation
    fn set_autosave(&mut self, path: impl Into<PathBuf>) -> Result<()>
    where
        Self: Sized,
    {
        self.core_mut().set_autosave(path.into())
    }

    fn autosave(&self) -> Option<&Path> {
        self.core().autosave()
    }

    /// Open a savefile and attach it; replaces an attached sink
    fn attach_dump(&mut self, path: impl AsRef<Path>) -> Result<()>
    where
        Self: Sized,
    {
        self.core_mut().attach_dump(path.as_ref())
    }

    /// Attach a sink opened with [`DumpSink::open`]
    fn set_dump(&mut self, sink: DumpSink) -> Result<()> {
        self.core_mut().set_dump(sink)
    }

    fn detach_dump(&mut self) -> Option<DumpSink> {
        self.core_mut().detach_dump()
    }

    fn dump(&self) -> Option<&DumpSink> {
        self.core().dump()
    }

    fn dump_path(&self) -> Option<&Path> {
        self.core().dump().map(|sink| sink.path())
    }

    /// Link-layer type of the capture
    fn datalink(&self) -> Result<Linktype> {
        self.core().datalink()
    }

    fn snapshot_len(&self) -> Result<i32> {
        self.core().snapshot_len()
    }

    /// Engine counters merged with delivery counters
    fn stats(&mut self) -> Result<CaptureStats> {
        self.core_mut().stats()
    }

    /// Packets and bytes delivered since activation
    fn delivered(&self) -> CaptureStats {
        self.core().delivered()
    }

    /// Release the native handle; later calls do nothing
    fn close(&mut self) {
        self.core_mut().close();
    }
}

/// Iterator returned by [`Session::packets`]
///
/// Ends when the input is exhausted or after yielding a non-recoverable
/// error. Timeouts are yielded and iteration continues.
pub struct Packets<'a, S: Session> {
    session: &'a mut S,
    done: bool,
}

impl<S: Session> Iterator for Packets<'_, S> {
    type Item = Result<PacketRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.session.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                if !matches!(e, CaptureError::Timeout) {
                    self.done = true;
                }
                Some(Err(e))
            }
        }
    }
}
