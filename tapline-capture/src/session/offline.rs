//! Savefile replay

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tapline_core::{CaptureEngine, CaptureError, Result};
use tracing::{info, warn};

use super::{Session, SessionCore};

/// Capture session reading a savefile
///
/// The file is only opened by [`Session::activate`]; byte order and format
/// version are known from then on.
pub struct OfflineSession {
    core: SessionCore,
    path: PathBuf,
}

impl OfflineSession {
    pub fn new(engine: Arc<dyn CaptureEngine>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source = path.display().to_string();
        Self {
            core: SessionCore::new(engine, source, None),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Savefile byte order differs from the host's
    pub fn is_swapped(&self) -> Result<bool> {
        self.core.active_query(|h| h.is_swapped())
    }

    /// Savefile format version as `(major, minor)`
    pub fn version(&self) -> Result<(i32, i32)> {
        self.core.active_query(|h| h.version())
    }

    pub fn major_version(&self) -> Result<i32> {
        Ok(self.version()?.0)
    }

    pub fn minor_version(&self) -> Result<i32> {
        Ok(self.version()?.1)
    }
}

impl Session for OfflineSession {
    fn core(&self) -> &SessionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SessionCore {
        &mut self.core
    }

    fn activate(&mut self) -> Result<()> {
        self.core.ensure_configurable()?;

        let handle = match self.core.engine().open_offline(&self.path) {
            Ok(handle) => handle,
            Err(e) => {
                let err = CaptureError::from(e);
                warn!(path = %self.path.display(), "Failed to open savefile: {}", err);
                return Err(err);
            }
        };
        self.core.install_handle(handle);

        info!(path = %self.path.display(), "Offline capture opened");
        self.core.finish_activation(tapline_core::Status::OK)
    }
}

impl std::fmt::Debug for OfflineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineSession")
            .field("id", &self.core.id())
            .field("path", &self.path)
            .field("state", &self.core.state())
            .finish()
    }
}
