//! Live interface capture

use std::sync::Arc;
use tapline_core::{CaptureEngine, CaptureError, CaptureHandle, Result, Status};
use tracing::{debug, info};

use super::{Session, SessionCore};
use crate::config::LiveConfig;

/// Capture session on a network interface
///
/// The native handle is created up front, so configuration lands on it
/// immediately; [`LiveConfig`] mirrors what was applied.
pub struct LiveSession {
    core: SessionCore,
    device: String,
    config: LiveConfig,
}

impl LiveSession {
    /// Create a session for `device` with default settings
    pub fn new(engine: Arc<dyn CaptureEngine>, device: &str) -> Result<Self> {
        Self::with_config(engine, device, LiveConfig::default())
    }

    /// Create a session for `device` and apply `config` to it
    ///
    /// Nonexistent devices are only reported by [`Session::activate`].
    pub fn with_config(
        engine: Arc<dyn CaptureEngine>,
        device: &str,
        config: LiveConfig,
    ) -> Result<Self> {
        config.validate()?;

        let handle = engine.create(device)?;
        let mut session = Self {
            core: SessionCore::new(engine, device, Some(handle)),
            device: device.to_string(),
            config: LiveConfig::default(),
        };

        session.set_snaplen(config.snaplen)?;
        session.set_promiscuous(config.promiscuous)?;
        session.set_timeout(config.timeout_ms)?;
        if config.monitor {
            session.set_monitor(true)?;
        }
        if let Some(size) = config.buffer_size {
            session.set_buffer_size(size)?;
        }
        session.set_immediate_mode(config.immediate_mode)?;
        session.set_blocking(config.blocking)?;
        if let Some(path) = config.autosave {
            session.set_autosave(path)?;
        }

        debug!(session = %session.core.id(), device, "Live session created");
        Ok(session)
    }

    fn configure<F>(&mut self, what: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut dyn CaptureHandle) -> Status,
    {
        let handle = self.core.configurable_handle()?;
        let status = apply(&mut *handle);
        CaptureError::check(status, || handle.last_error())?;
        debug!(device = %self.device, "Applied {}", what);
        Ok(())
    }

    pub fn set_snaplen(&mut self, snaplen: i32) -> Result<()> {
        self.configure("snaplen", |h| h.set_snaplen(snaplen))?;
        self.config.snaplen = snaplen;
        Ok(())
    }

    pub fn set_promiscuous(&mut self, promiscuous: bool) -> Result<()> {
        self.configure("promiscuous mode", |h| h.set_promisc(promiscuous))?;
        self.config.promiscuous = promiscuous;
        Ok(())
    }

    /// Read timeout in milliseconds; see [`LiveConfig::timeout_ms`] about zero
    pub fn set_timeout(&mut self, timeout_ms: i32) -> Result<()> {
        self.configure("read timeout", |h| h.set_timeout(timeout_ms))?;
        self.config.timeout_ms = timeout_ms;
        Ok(())
    }

    /// Monitor (rfmon) mode for wireless devices
    pub fn set_monitor(&mut self, monitor: bool) -> Result<()> {
        self.configure("monitor mode", |h| h.set_rfmon(monitor))?;
        self.config.monitor = monitor;
        Ok(())
    }

    pub fn set_buffer_size(&mut self, bytes: i32) -> Result<()> {
        self.configure("buffer size", |h| h.set_buffer_size(bytes))?;
        self.config.buffer_size = Some(bytes);
        Ok(())
    }

    pub fn set_immediate_mode(&mut self, immediate: bool) -> Result<()> {
        self.configure("immediate mode", |h| h.set_immediate_mode(immediate))?;
        self.config.immediate_mode = immediate;
        Ok(())
    }

    /// Switch between blocking and non-blocking reads, before or after activation
    pub fn set_blocking(&mut self, blocking: bool) -> Result<()> {
        let handle = self.core.open_handle()?;
        let status = handle.set_nonblock(!blocking);
        CaptureError::check(status, || handle.last_error())?;
        self.config.blocking = blocking;
        Ok(())
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Configuration as applied so far
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn snaplen(&self) -> i32 {
        self.config.snaplen
    }

    pub fn is_promiscuous(&self) -> bool {
        self.config.promiscuous
    }

    pub fn timeout_ms(&self) -> i32 {
        self.config.timeout_ms
    }

    pub fn is_monitor(&self) -> bool {
        self.config.monitor
    }

    pub fn buffer_size(&self) -> Option<i32> {
        self.config.buffer_size
    }

    pub fn is_immediate_mode(&self) -> bool {
        self.config.immediate_mode
    }

    pub fn is_blocking(&self) -> bool {
        self.config.blocking
    }

    /// Selectable descriptor of the capture, if the engine has one
    pub fn fileno(&self) -> Result<Option<i32>> {
        let fd = self.core.active_query(|h| h.fileno())?;
        Ok((fd >= 0).then_some(fd))
    }
}

impl Session for LiveSession {
    fn core(&self) -> &SessionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SessionCore {
        &mut self.core
    }

    fn activate(&mut self) -> Result<()> {
        let status = self.core.configurable_handle()?.activate();
        if status.is_error() {
            return Err(self.core.activation_failed(status));
        }
        info!(
            device = %self.device,
            snaplen = self.config.snaplen,
            promiscuous = self.config.promiscuous,
            "Live capture started"
        );
        self.core.finish_activation(status)
    }
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("id", &self.core.id())
            .field("device", &self.device)
            .field("state", &self.core.state())
            .field("config", &self.config)
            .finish()
    }
}
