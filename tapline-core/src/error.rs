//! Error types for tapline
//!
//! Every call that crosses into a capture engine ends in either a value or
//! exactly one [`CaptureError`] kind. Native status codes are translated with
//! [`CaptureError::from_status`].

use crate::status::Status;
use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Failure kinds surfaced by capture sessions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Operation requires an activated session
    #[error("Capture session is not activated")]
    NotActivated,

    /// Operation is only legal before activation
    #[error("Capture session is already activated")]
    AlreadyActivated,

    /// Engine failure with its diagnostic text
    #[error("Capture error: {0}")]
    Generic(String),

    /// Loop was interrupted by a break request
    #[error("Capture loop interrupted by breakloop")]
    Break,

    /// Device does not exist
    #[error("No such device: {0}")]
    NoSuchDevice(String),

    /// Device cannot be put into monitor mode
    #[error("Monitor mode is not supported on this device")]
    RfmonNotSupported,

    /// Operation requires monitor mode
    #[error("Device is not in monitor mode")]
    NotRfmon,

    /// Insufficient privileges to open the device
    #[error("Permission denied")]
    PermissionDenied,

    /// Interface is administratively down
    #[error("Interface is not up")]
    InterfaceNotUp,

    /// Non-fatal condition reported by the engine
    #[error("Capture warning: {0}")]
    Warning(String),

    /// Promiscuous mode was requested but is not available
    #[error("Promiscuous mode is not supported on this device")]
    WarningPromiscNotSupported,

    /// Read timed out without data
    #[error("Read timed out")]
    Timeout,
}

impl CaptureError {
    /// Translate a native status code into a failure kind
    ///
    /// Unknown codes become [`CaptureError::Generic`] carrying the raw value,
    /// so an engine can never report success by returning something odd.
    pub fn from_status(status: Status, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            Status::ERROR
            | Status::ERROR_CANTSET_TSTAMP_TYPE
            | Status::ERROR_TSTAMP_PRECISION_NOTSUP => Self::Generic(with_fallback(detail, status)),
            Status::ERROR_BREAK => Self::Break,
            Status::ERROR_NOT_ACTIVATED => Self::NotActivated,
            Status::ERROR_ACTIVATED => Self::AlreadyActivated,
            Status::ERROR_NO_SUCH_DEVICE => Self::NoSuchDevice(with_fallback(detail, status)),
            Status::ERROR_RFMON_NOTSUP => Self::RfmonNotSupported,
            Status::ERROR_NOT_RFMON => Self::NotRfmon,
            Status::ERROR_PERM_DENIED | Status::ERROR_PROMISC_PERM_DENIED => Self::PermissionDenied,
            Status::ERROR_IFACE_NOT_UP => Self::InterfaceNotUp,
            Status::WARNING | Status::WARNING_TSTAMP_TYPE_NOTSUP => {
                Self::Warning(with_fallback(detail, status))
            }
            Status::WARNING_PROMISC_NOTSUP => Self::WarningPromiscNotSupported,
            other if detail.is_empty() => {
                Self::Generic(format!("unrecognized status {}", other.code()))
            }
            other => Self::Generic(format!("unrecognized status {}: {}", other.code(), detail)),
        }
    }

    /// Turn a status into `Ok(())` on success, fetching the detail lazily
    pub fn check<F>(status: Status, detail: F) -> Result<()>
    where
        F: FnOnce() -> String,
    {
        if status.is_ok() {
            Ok(())
        } else {
            Err(Self::from_status(status, detail()))
        }
    }

    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Self::Generic(msg.into())
    }

    /// Conditions callers commonly retry on or treat as informational
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Break | Self::Warning(_) | Self::WarningPromiscNotSupported
        )
    }

    /// Warning kinds, raised even though the operation went through
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning(_) | Self::WarningPromiscNotSupported)
    }

    /// Detail text from the engine, if this kind carries one
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Generic(d) | Self::NoSuchDevice(d) | Self::Warning(d) => Some(d),
            _ => None,
        }
    }
}

fn with_fallback(detail: String, status: Status) -> String {
    if detail.is_empty() {
        status.to_string()
    } else {
        detail
    }
}

/// Failure of a callback-driven capture loop
///
/// `Handler` carries the callback's own error untouched; a loop never
/// reports a callback failure as [`CaptureError::Break`].
#[derive(Error, Debug)]
pub enum LoopError<E> {
    /// The session or engine failed
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The packet handler returned an error
    #[error("Packet handler failed: {0}")]
    Handler(E),
}

impl<E> LoopError<E> {
    /// The handler's error, if that is what stopped the loop
    pub fn into_handler(self) -> Option<E> {
        match self {
            Self::Handler(e) => Some(e),
            Self::Capture(_) => None,
        }
    }

    /// The capture error, if that is what stopped the loop
    pub fn capture(&self) -> Option<&CaptureError> {
        match self {
            Self::Capture(e) => Some(e),
            Self::Handler(_) => None,
        }
    }
}
