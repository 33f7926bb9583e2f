//! Example: List all capture devices
//!
//! Run with: cargo run --example list_interfaces --features libpcap

use tapline_capture::{
    capture_interfaces, default_interface, discover, lib_version, PcapEngine, SockAddr,
};

fn render(role: &Option<SockAddr>) -> String {
    match role {
        Some(addr) => addr.to_string(),
        None => "-".to_string(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let engine = PcapEngine::new();
    println!("Engine: {}\n", lib_version(&engine));

    println!("=== All Capture Devices ===\n");

    for iface in discover(&engine)? {
        println!("Interface: {}", iface);
        println!("  Status:");
        println!("    Up: {}", iface.is_up());
        println!("    Running: {}", iface.is_running());
        println!("    Loopback: {}", iface.loopback);
        println!("    Wireless: {}", iface.is_wireless());

        println!("  Addresses:");
        for addr in &iface.addresses {
            println!(
                "    - {} netmask {} broadcast {} destination {}",
                render(&addr.address),
                render(&addr.netmask),
                render(&addr.broadcast),
                render(&addr.destination)
            );
        }
        println!();
    }

    println!("=== Capture-Capable Interfaces ===\n");
    for iface in capture_interfaces(&engine)? {
        println!("  {}", iface);
    }

    println!("\n=== Default Interface ===\n");
    match default_interface(&engine) {
        Ok(iface) => {
            println!("Default: {}", iface);
            if let Some(ipv4) = iface.primary_ipv4() {
                println!("Primary IPv4: {}", ipv4);
            }
        }
        Err(e) => println!("No default interface: {}", e),
    }

    Ok(())
}
