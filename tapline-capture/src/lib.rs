//! Packet capture sessions for tapline
//!
//! This crate turns a native capture engine into typed capture sessions with
//! an explicit activation lifecycle.
//!
//! ## Features
//!
//! - **Live and offline sessions**: configure-then-activate sessions on
//!   interfaces ([`LiveSession`]) and savefiles ([`OfflineSession`])
//! - **Callback loops**: `dispatch`/`loop` with the handler's own error type
//!   propagated unchanged, and cross-thread interruption via [`BreakHandle`]
//! - **BPF filters**: compile-and-attach bound to the compiling session, plus
//!   expression builders in [`filters`]
//! - **Savefiles**: [`DumpSink`] output, attachable or automatic at activation
//! - **Interface discovery**: address snapshots with best-effort rendering
//! - **Statistics**: engine counters merged with delivery counters
//!
//! ## Example
//!
//! ```no_run
//! # #[cfg(feature = "libpcap")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use tapline_capture::{default_engine, LiveSession, Session};
//!
//! let mut session = LiveSession::new(default_engine(), "eth0")?;
//! session.set_snaplen(256)?;
//! session.activate()?;
//! session.set_filter("tcp port 80")?;
//!
//! session.loop_packets(10, |packet| {
//!     println!("{} bytes at {:.6}", packet.len(), packet.timestamp());
//!     Ok::<(), std::io::Error>(())
//! })?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "libpcap"))]
//! # fn main() {}
//! ```

pub mod config;
pub mod dump;
pub mod engine;
pub mod filter;
pub mod filters;
pub mod interface;
pub mod session;
pub mod stats;

// Re-export main types
pub use config::{LiveConfig, DEFAULT_SNAPLEN, DEFAULT_TIMEOUT_MS};
pub use dump::DumpSink;
#[cfg(feature = "libpcap")]
pub use engine::{default_engine, PcapEngine};
pub use engine::{DeviceScript, SavefileScript, ScriptEvent, ScriptedEngine};
pub use filter::{FilterProgram, FilterSource};
pub use interface::{capture_interfaces, default_interface, discover, find_interface, lib_version};
pub use session::{
    BreakHandle, LiveSession, LoopMode, OfflineSession, Packets, Session, SessionState,
};
pub use stats::{CaptureStats, StatsAccumulator};
pub use tapline_core::{
    CaptureError, InterfaceDescriptor, Linktype, LoopError, PacketRecord, Result, SockAddr,
};
