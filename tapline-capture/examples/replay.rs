//! Example: Replay a savefile through a filter
//!
//! Run with: cargo run --example replay --features libpcap -- <in.pcap> [filter] [out.pcap]

use tapline_capture::{OfflineSession, PcapEngine, Session};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let input = args.next().ok_or("usage: replay <in.pcap> [filter] [out.pcap]")?;
    let filter = args.next();
    let output = args.next();

    let engine = std::sync::Arc::new(PcapEngine::new());
    let mut session = OfflineSession::new(engine, &input);
    session.activate()?;

    let (major, minor) = session.version()?;
    println!(
        "{}: format {}.{}, {}, link type {}, snaplen {}",
        input,
        major,
        minor,
        if session.is_swapped()? { "swapped" } else { "native byte order" },
        session.datalink()?,
        session.snapshot_len()?
    );

    if let Some(filter) = filter {
        session.set_filter(filter)?;
    }
    if let Some(output) = &output {
        session.attach_dump(output)?;
    }

    let mut bytes = 0u64;
    for packet in session.packets() {
        let packet = packet?;
        bytes += packet.caplen() as u64;
    }

    let delivered = session.delivered();
    println!(
        "{} packets, {} bytes matched",
        delivered.packets_delivered, bytes
    );
    if let Some(path) = session.dump_path() {
        println!("Written to {}", path.display());
    }

    Ok(())
}
