//! tapline core library
//!
//! This crate provides the types shared by every capture engine and by the
//! session layer in `tapline-capture`: the failure taxonomy, native status
//! codes, packet records, interface descriptors and the engine boundary
//! traits.

pub mod engine;
pub mod error;
pub mod interface;
pub mod linktype;
pub mod packet;
pub mod status;

// Re-export commonly used types
pub use engine::{
    BreakSignal, CaptureEngine, CaptureHandle, CompiledFilter, DumpWriter, LoopKind, NativeError,
    NextPacket, RawStats, NETMASK_UNKNOWN,
};
pub use error::{CaptureError, LoopError, Result};
pub use interface::{
    AddressDescriptor, InterfaceDescriptor, RawAddress, RawInterface, RawSockaddr, SockAddr,
};
pub use linktype::Linktype;
pub use packet::{PacketRecord, RawHeader};
pub use status::Status;
