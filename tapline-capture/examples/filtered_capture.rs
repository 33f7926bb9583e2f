//! Example: Filtered packet capture
//!
//! Demonstrates compiling a BPF filter built with the expression helpers and
//! saving the matching packets to a savefile.
//! Note: Requires root/administrator privileges to run.
//!
//! Run with: sudo cargo run --example filtered_capture --features libpcap -- [out.pcap]

use tapline_capture::filters::{self, Dir, Transport};
use tapline_capture::{default_engine, default_interface, FilterProgram, LiveSession, Session};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let out = std::env::args().nth(1).unwrap_or_else(|| "web.pcap".to_string());
    let engine = default_engine();
    let iface = default_interface(engine.as_ref())?;
    println!("Capturing on: {}", iface);

    let mut session = LiveSession::new(engine, &iface.name)?;
    session.set_snaplen(128)?;
    session.set_autosave(&out)?;
    session.activate()?;

    // Web traffic plus DNS
    let filter = filters::any_of(&[
        filters::port(Transport::Tcp, Dir::Any, 80),
        filters::port(Transport::Tcp, Dir::Any, 443),
        filters::port(Transport::Udp, Dir::Dst, 53),
    ]);
    println!("BPF Filter: {}", filter);

    let program = FilterProgram::compile(&mut session, &filter)?;
    program.attach(&mut session)?;

    println!("Will capture 10 packets into {}", out);
    println!();

    session.loop_packets(10, |packet| {
        // Print first few bytes in hex
        let preview = packet
            .data()
            .iter()
            .take(32)
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{} bytes: {}", packet.len(), preview);
        Ok::<(), std::io::Error>(())
    })?;

    let written = session.dump().map(|d| d.packets_written()).unwrap_or(0);
    println!("\n=== Capture Complete ===");
    println!("Saved {} packets to {}", written, out);

    Ok(())
}
