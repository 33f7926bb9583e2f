//! Network interface enumeration

use tapline_core::{CaptureEngine, CaptureError, InterfaceDescriptor, Result};
use tracing::debug;

/// Snapshot of every capture device the engine knows about
///
/// Devices and their addresses keep the engine's order. An empty list is
/// not an error.
pub fn discover(engine: &dyn CaptureEngine) -> Result<Vec<InterfaceDescriptor>> {
    let raw = engine.find_all_devs()?;
    let interfaces: Vec<_> = raw.iter().map(InterfaceDescriptor::from_raw).collect();
    debug!(count = interfaces.len(), "Enumerated capture devices");
    Ok(interfaces)
}

/// Look up one device by name
pub fn find_interface(engine: &dyn CaptureEngine, name: &str) -> Result<InterfaceDescriptor> {
    discover(engine)?
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| CaptureError::NoSuchDevice(name.to_string()))
}

/// First device that is up and not a loopback
pub fn default_interface(engine: &dyn CaptureEngine) -> Result<InterfaceDescriptor> {
    discover(engine)?
        .into_iter()
        .find(InterfaceDescriptor::is_capture_capable)
        .ok_or_else(|| CaptureError::generic("No suitable default interface found"))
}

/// All devices suitable for capture
pub fn capture_interfaces(engine: &dyn CaptureEngine) -> Result<Vec<InterfaceDescriptor>> {
    Ok(discover(engine)?
        .into_iter()
        .filter(InterfaceDescriptor::is_capture_capable)
        .collect())
}

/// Version string of the capture engine
pub fn lib_version(engine: &dyn CaptureEngine) -> String {
    engine.lib_version()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedEngine;
    use std::net::{IpAddr, Ipv4Addr};
    use tapline_core::interface::{IF_LOOPBACK, IF_RUNNING, IF_UP};
    use tapline_core::{RawAddress, RawInterface, RawSockaddr, Status};

    fn engine() -> ScriptedEngine {
        let engine = ScriptedEngine::new();
        engine.add_interface(RawInterface {
            name: "lo".into(),
            description: None,
            flags: IF_LOOPBACK | IF_UP | IF_RUNNING,
            addresses: Vec::new(),
        });
        engine.add_interface(RawInterface {
            name: "eth0".into(),
            description: Some("Onboard Ethernet".into()),
            flags: IF_UP | IF_RUNNING,
            addresses: vec![RawAddress {
                addr: Some(RawSockaddr::from_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)))),
                ..RawAddress::default()
            }],
        });
        engine.add_interface(RawInterface {
            name: "eth1".into(),
            description: None,
            flags: 0,
            addresses: Vec::new(),
        });
        engine
    }

    #[test]
    fn test_find_interface() {
        let engine = engine();
        let eth0 = find_interface(&engine, "eth0").unwrap();
        assert_eq!(eth0.description.as_deref(), Some("Onboard Ethernet"));
        assert_eq!(eth0.to_string(), "eth0 (Onboard Ethernet)");

        let missing = find_interface(&engine, "wlan7");
        assert_eq!(missing, Err(CaptureError::NoSuchDevice("wlan7".into())));
    }

    #[test]
    fn test_default_interface_skips_loopback_and_down() {
        let engine = engine();
        assert_eq!(default_interface(&engine).unwrap().name, "eth0");

        let names: Vec<_> = capture_interfaces(&engine)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["eth0"]);
    }

    #[test]
    fn test_no_default_interface() {
        let engine = ScriptedEngine::new();
        assert!(discover(&engine).unwrap().is_empty());
        assert!(matches!(default_interface(&engine), Err(CaptureError::Generic(_))));
    }

    #[test]
    fn test_enumeration_failure_maps_through_taxonomy() {
        let engine = engine();
        engine.fail_enumeration(Status::ERROR_PERM_DENIED, "socket: Operation not permitted");
        assert_eq!(discover(&engine), Err(CaptureError::PermissionDenied));
    }

    #[test]
    fn test_lib_version() {
        let engine = ScriptedEngine::new();
        assert!(lib_version(&engine).starts_with("scripted"));
    }
}
