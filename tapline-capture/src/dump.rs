//! Savefile output

use std::fmt;
use std::path::{Path, PathBuf};
use tapline_core::{CaptureError, DumpWriter, PacketRecord, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::session::Session;

/// Savefile writer opened from an activated session
///
/// Records are appended in the order they are written. The underlying file
/// is closed exactly once, by [`DumpSink::close`] or on drop.
pub struct DumpSink {
    writer: Option<Box<dyn DumpWriter>>,
    path: PathBuf,
    session_id: Uuid,
    written: u64,
}

impl DumpSink {
    pub(crate) fn new(writer: Box<dyn DumpWriter>, path: PathBuf, session_id: Uuid) -> Self {
        Self {
            writer: Some(writer),
            path,
            session_id,
            written: 0,
        }
    }

    /// Open a savefile using the link type and snapshot length of `session`
    ///
    /// The sink is not attached; hand it to [`Session::set_dump`] for that or
    /// feed it records directly.
    pub fn open<S: Session>(session: &mut S, path: impl AsRef<Path>) -> Result<Self> {
        session.core_mut().open_dump(path.as_ref())
    }

    /// Append one record; ignored once closed
    pub fn write(&mut self, record: &PacketRecord) {
        if let Some(writer) = self.writer.as_mut() {
            writer.write(&record.header(), record.data());
            self.written += 1;
        }
    }

    /// Push buffered records to disk
    pub fn flush(&mut self) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => CaptureError::check(writer.flush(), || {
                format!("Failed to flush {}", self.path.display())
            }),
            None => Err(CaptureError::generic(format!(
                "Dump file {} is closed",
                self.path.display()
            ))),
        }
    }

    /// Close the file; later calls do nothing
    pub fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            writer.flush();
            drop(writer);
            info!(
                path = %self.path.display(),
                packets = self.written,
                "Closed savefile"
            );
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended so far
    pub fn packets_written(&self) -> u64 {
        self.written
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub(crate) fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl Drop for DumpSink {
    fn drop(&mut self) {
        if self.is_open() {
            debug!(path = %self.path.display(), "Dump sink dropped while open");
        }
        self.close();
    }
}

impl fmt::Debug for DumpSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpSink")
            .field("path", &self.path)
            .field("written", &self.written)
            .field("open", &self.is_open())
            .finish()
    }
}
