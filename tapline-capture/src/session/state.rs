//! State machine shared by live and offline sessions

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tapline_core::{
    CaptureEngine, CaptureError, CaptureHandle, LoopError, Linktype, NextPacket, PacketRecord,
    RawHeader, Result, Status, NETMASK_UNKNOWN,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BreakHandle, LoopMode};
use crate::dump::DumpSink;
use crate::filter::{FilterProgram, FilterSource};
use crate::stats::{CaptureStats, StatsAccumulator};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting configuration, no reads yet
    Configured,
    /// Configuration committed, reads allowed
    Activated,
    /// Native handle released
    Closed,
}

/// Core of every capture session
///
/// Holds the native handle and everything attached to it. Activation is
/// tracked by `state`, never by whether `handle` is present, because live
/// handles exist from construction on.
pub struct SessionCore {
    id: Uuid,
    source: String,
    engine: Arc<dyn CaptureEngine>,
    handle: Option<Box<dyn CaptureHandle>>,
    state: SessionState,
    filter: Option<FilterProgram>,
    dump: Option<DumpSink>,
    autosave: Option<PathBuf>,
    breaker: Option<BreakHandle>,
    stats: StatsAccumulator,
}

impl SessionCore {
    pub(crate) fn new(
        engine: Arc<dyn CaptureEngine>,
        source: impl Into<String>,
        handle: Option<Box<dyn CaptureHandle>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            engine,
            handle,
            state: SessionState::Configured,
            filter: None,
            dump: None,
            autosave: None,
            breaker: None,
            stats: StatsAccumulator::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Device name or savefile path
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_activated(&self) -> bool {
        self.state == SessionState::Activated
    }

    pub(crate) fn engine(&self) -> &Arc<dyn CaptureEngine> {
        &self.engine
    }

    fn closed_error(&self) -> CaptureError {
        closed(&self.source)
    }

    /// Fails unless the session still accepts configuration
    pub(crate) fn ensure_configurable(&self) -> Result<()> {
        match self.state {
            SessionState::Configured => Ok(()),
            SessionState::Activated => Err(CaptureError::AlreadyActivated),
            SessionState::Closed => Err(self.closed_error()),
        }
    }

    /// Pre-activation handle, for live setters
    pub(crate) fn configurable_handle(&mut self) -> Result<&mut dyn CaptureHandle> {
        self.ensure_configurable()?;
        match self.handle.as_mut() {
            Some(handle) => Ok(handle.as_mut()),
            None => Err(closed(&self.source)),
        }
    }

    /// Handle in any non-closed state
    pub(crate) fn open_handle(&mut self) -> Result<&mut dyn CaptureHandle> {
        if self.state == SessionState::Closed {
            return Err(closed(&self.source));
        }
        match self.handle.as_mut() {
            Some(handle) => Ok(handle.as_mut()),
            None => Err(CaptureError::NotActivated),
        }
    }

    /// Activated handle; the engine is not touched otherwise
    pub(crate) fn active_handle(&mut self) -> Result<&mut dyn CaptureHandle> {
        match self.state {
            SessionState::Configured => Err(CaptureError::NotActivated),
            SessionState::Closed => Err(closed(&self.source)),
            SessionState::Activated => match self.handle.as_mut() {
                Some(handle) => Ok(handle.as_mut()),
                None => Err(closed(&self.source)),
            },
        }
    }

    fn active_ref(&self) -> Result<&dyn CaptureHandle> {
        match (self.state, self.handle.as_ref()) {
            (SessionState::Activated, Some(handle)) => Ok(handle.as_ref()),
            (SessionState::Configured, _) => Err(CaptureError::NotActivated),
            _ => Err(self.closed_error()),
        }
    }

    pub(crate) fn install_handle(&mut self, handle: Box<dyn CaptureHandle>) {
        self.handle = Some(handle);
    }

    /// Commit an activation whose native status was not an error
    ///
    /// The session becomes activated before warnings are reported, and a
    /// configured autosave target is opened in either case.
    pub(crate) fn finish_activation(&mut self, status: Status) -> Result<()> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| CaptureError::generic("No capture handle to activate"))?;

        let warning = if status.is_warning() {
            Some(CaptureError::from_status(status, handle.last_error()))
        } else {
            None
        };

        self.breaker = Some(BreakHandle::new(handle.break_signal()));
        self.state = SessionState::Activated;
        self.stats.reset();

        info!(
            session = %self.id,
            source = %self.source,
            datalink = %Linktype(handle.datalink()),
            "Capture session activated"
        );

        if let Some(path) = self.autosave.clone() {
            self.attach_dump(&path)?;
        }

        match warning {
            Some(warning) => {
                warn!(session = %self.id, source = %self.source, "Activation warning: {}", warning);
                Err(warning)
            }
            None => Ok(()),
        }
    }

    /// Translate a failed activation status, leaving the session configurable
    pub(crate) fn activation_failed(&mut self, status: Status) -> CaptureError {
        let detail = self
            .handle
            .as_ref()
            .map(|h| h.last_error())
            .unwrap_or_default();
        let err = CaptureError::from_status(status, detail);
        warn!(session = %self.id, source = %self.source, "Activation failed: {}", err);
        err
    }

    fn deliver(&mut self, record: &PacketRecord) {
        self.stats.record_packet(record.data().len());
        if let Some(sink) = self.dump.as_mut() {
            sink.write(record);
        }
    }

    pub(crate) fn read_next(&mut self) -> Result<Option<PacketRecord>> {
        let handle = self.active_handle()?;
        let outcome = match handle.next_packet() {
            NextPacket::Packet(header, data) => Ok(Some(PacketRecord::from_raw(&header, data))),
            NextPacket::Exhausted => Ok(None),
            NextPacket::Timeout => return Err(CaptureError::Timeout),
            NextPacket::Failed(status) => Err(status),
        };

        match outcome {
            Ok(Some(record)) => {
                self.deliver(&record);
                Ok(Some(record))
            }
            Ok(None) => {
                debug!(source = %self.source, "End of capture input");
                Ok(None)
            }
            Err(status) => {
                let detail = handle_error(&self.handle);
                Err(CaptureError::from_status(status, detail))
            }
        }
    }

    /// Drive the engine loop, feeding each packet through `callback`
    ///
    /// The engine only sees a trampoline. A failing callback is parked in
    /// `failure` and a native break is requested; packets the engine still
    /// hands over before it notices are ignored. Once the engine returns, the
    /// parked failure wins over whatever status the engine produced. A
    /// pending session break is cleared on every exit.
    pub(crate) fn run_loop<F, E>(
        &mut self,
        mode: LoopMode,
        limit: i32,
        mut callback: F,
    ) -> std::result::Result<Option<usize>, LoopError<E>>
    where
        F: FnMut(&PacketRecord) -> std::result::Result<(), E>,
    {
        self.active_handle()?;

        let SessionCore {
            id,
            handle,
            dump,
            breaker,
            stats,
            ..
        } = self;
        let (Some(handle), Some(breaker)) = (handle.as_mut(), breaker.as_ref()) else {
            return Err(CaptureError::NotActivated.into());
        };

        debug!(session = %id, ?mode, limit, "Entering capture loop");

        let mut failure: Option<E> = None;
        let mut delivered = 0usize;
        let status = {
            let mut trampoline = |header: &RawHeader, data: &[u8]| {
                if failure.is_some() {
                    return;
                }
                let record = PacketRecord::from_raw(header, data);
                match callback(&record) {
                    Ok(()) => {
                        delivered += 1;
                        stats.record_packet(record.data().len());
                        if let Some(sink) = dump.as_mut() {
                            sink.write(&record);
                        }
                    }
                    Err(e) => {
                        failure = Some(e);
                        breaker.signal_engine();
                    }
                }
            };
            handle.run_loop(mode, limit, &mut trampoline)
        };

        let requested = breaker.take_requested();

        if let Some(e) = failure {
            debug!(session = %id, delivered, "Capture loop stopped by handler failure");
            return Err(LoopError::Handler(e));
        }

        if status == Status::ERROR_BREAK || requested {
            info!(session = %id, delivered, "Capture loop interrupted");
            return Err(CaptureError::Break.into());
        }

        if status.is_error() {
            return Err(CaptureError::from_status(status, handle.last_error()).into());
        }

        debug!(session = %id, delivered, "Capture loop finished");
        Ok(match mode {
            LoopMode::Dispatch => Some(delivered),
            LoopMode::Loop => None,
        })
    }

    pub(crate) fn break_handle(&self) -> Result<BreakHandle> {
        match (self.state, self.breaker.as_ref()) {
            (SessionState::Activated, Some(breaker)) => Ok(breaker.clone()),
            (SessionState::Closed, _) => Err(self.closed_error()),
            _ => Err(CaptureError::NotActivated),
        }
    }

    pub(crate) fn compile_filter(&mut self, expression: &str) -> Result<FilterProgram> {
        let id = self.id;
        let handle = self.active_handle()?;
        let linktype = Linktype(handle.datalink());
        let compiled = handle.compile(expression, true, NETMASK_UNKNOWN)?;
        debug!(session = %id, expression, "Compiled filter");
        Ok(FilterProgram::new(compiled, id, linktype))
    }

    pub(crate) fn set_filter(&mut self, source: FilterSource) -> Result<()> {
        let program = match source {
            FilterSource::Expression(expression) => self.compile_filter(&expression)?,
            FilterSource::Program(program) => program,
        };

        let id = self.id;
        let handle = self.active_handle()?;
        program.check_target(id, Linktype(handle.datalink()))?;
        let status = handle.set_filter(program.compiled());
        CaptureError::check(status, || handle.last_error())?;

        info!(session = %id, filter = program.expression(), "BPF filter set");
        self.filter = Some(program);
        Ok(())
    }

    pub fn filter(&self) -> Option<&FilterProgram> {
        self.filter.as_ref()
    }

    pub(crate) fn open_dump(&mut self, path: &Path) -> Result<DumpSink> {
        let id = self.id;
        let handle = self.active_handle()?;
        let writer = handle.open_dump(path)?;
        info!(session = %id, path = %path.display(), "Opened savefile");
        Ok(DumpSink::new(writer, path.to_path_buf(), id))
    }

    pub(crate) fn attach_dump(&mut self, path: &Path) -> Result<()> {
        let sink = self.open_dump(path)?;
        self.dump = Some(sink);
        Ok(())
    }

    pub(crate) fn set_dump(&mut self, sink: DumpSink) -> Result<()> {
        self.active_handle()?;
        if sink.session_id() != self.id {
            return Err(CaptureError::generic(
                "Dump sink was opened for a different session",
            ));
        }
        self.dump = Some(sink);
        Ok(())
    }

    pub(crate) fn detach_dump(&mut self) -> Option<DumpSink> {
        self.dump.take()
    }

    pub fn dump(&self) -> Option<&DumpSink> {
        self.dump.as_ref()
    }

    pub(crate) fn set_autosave(&mut self, path: PathBuf) -> Result<()> {
        self.ensure_configurable()?;
        debug!(session = %self.id, path = %path.display(), "Autosave configured");
        self.autosave = Some(path);
        Ok(())
    }

    pub fn autosave(&self) -> Option<&Path> {
        self.autosave.as_deref()
    }

    pub(crate) fn datalink(&self) -> Result<Linktype> {
        Ok(Linktype(self.active_ref()?.datalink()))
    }

    pub(crate) fn snapshot_len(&self) -> Result<i32> {
        Ok(self.active_ref()?.snapshot())
    }

    pub(crate) fn active_query<T>(&self, query: impl FnOnce(&dyn CaptureHandle) -> T) -> Result<T> {
        Ok(query(self.active_ref()?))
    }

    pub(crate) fn stats(&mut self) -> Result<CaptureStats> {
        let delivered = self.stats.snapshot();
        let raw = self.active_handle()?.stats()?;
        Ok(CaptureStats::from_engine(raw, delivered))
    }

    pub fn delivered(&self) -> CaptureStats {
        self.stats.snapshot()
    }

    /// Release everything exactly once
    pub(crate) fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(mut sink) = self.dump.take() {
            sink.close();
        }
        self.filter = None;
        self.breaker = None;
        if let Some(handle) = self.handle.take() {
            drop(handle);
        }
        self.state = SessionState::Closed;
        info!(session = %self.id, source = %self.source, "Capture session closed");
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        self.close();
    }
}

fn closed(source: &str) -> CaptureError {
    CaptureError::Generic(format!("Capture session on {} is closed", source))
}

fn handle_error(handle: &Option<Box<dyn CaptureHandle>>) -> String {
    handle.as_ref().map(|h| h.last_error()).unwrap_or_default()
}
