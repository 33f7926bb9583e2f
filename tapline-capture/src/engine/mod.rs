//! Capture engine implementations
//!
//! [`ScriptedEngine`] is always available. [`PcapEngine`] needs the
//! `libpcap` feature and a system libpcap.

#[cfg(feature = "libpcap")]
mod pcap;
mod scripted;

#[cfg(feature = "libpcap")]
pub use self::pcap::PcapEngine;
pub use scripted::{DeviceScript, PacketPredicate, SavefileScript, ScriptEvent, ScriptedEngine};

/// The libpcap engine behind a shareable pointer
#[cfg(feature = "libpcap")]
pub fn default_engine() -> std::sync::Arc<dyn tapline_core::CaptureEngine> {
    std::sync::Arc::new(PcapEngine::new())
}
