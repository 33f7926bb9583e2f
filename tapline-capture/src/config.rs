//! Live capture configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tapline_core::{CaptureError, Result};

/// Default snapshot length (maximum bytes per packet)
pub const DEFAULT_SNAPLEN: i32 = 65535;

/// Default read timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: i32 = 1000;

/// Configuration for a live capture session
///
/// Everything except `blocking` is committed at activation and frozen
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Read timeout in milliseconds
    ///
    /// Zero blocks indefinitely, and some backends then buffer until a quota
    /// of packets arrives; prefer a nonzero value.
    pub timeout_ms: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Put wireless devices in monitor mode
    pub monitor: bool,
    /// Kernel buffer size in bytes (`None` = engine default)
    pub buffer_size: Option<i32>,
    /// Deliver packets as soon as they arrive
    pub immediate_mode: bool,
    /// Blocking reads; the only field that may change after activation
    pub blocking: bool,
    /// Savefile every delivered packet is written to once activated
    pub autosave: Option<PathBuf>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            monitor: false,
            buffer_size: None,
            immediate_mode: true,
            blocking: true,
            autosave: None,
        }
    }
}

impl LiveConfig {
    /// Parse a configuration from TOML; missing keys keep their defaults
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)
            .map_err(|e| CaptureError::Generic(format!("Invalid capture config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no engine would accept
    pub fn validate(&self) -> Result<()> {
        if self.snaplen <= 0 {
            return Err(CaptureError::Generic(format!(
                "snaplen must be positive, got {}",
                self.snaplen
            )));
        }
        if self.timeout_ms < 0 {
            return Err(CaptureError::Generic(format!(
                "timeout_ms must not be negative, got {}",
                self.timeout_ms
            )));
        }
        if let Some(size) = self.buffer_size {
            if size <= 0 {
                return Err(CaptureError::Generic(format!(
                    "buffer_size must be positive, got {}",
                    size
                )));
            }
        }
        Ok(())
    }
}
