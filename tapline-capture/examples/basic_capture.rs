//! Example: Basic packet capture
//!
//! Captures 20 packets on the default interface, stopping after 10 seconds
//! through a break handle driven from a timer thread.
//! Note: Requires root/administrator privileges to run.
//!
//! Run with: sudo cargo run --example basic_capture --features libpcap

use std::thread;
use std::time::Duration;
use tapline_capture::{
    default_engine, default_interface, CaptureError, LiveSession, LoopError, Session,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let engine = default_engine();

    // Find default interface
    let iface = default_interface(engine.as_ref())?;
    println!("Capturing on: {}", iface);

    let mut session = LiveSession::new(engine, &iface.name)?;
    match session.activate() {
        Err(e) if e.is_warning() => println!("Warning: {}", e),
        other => other?,
    }

    println!("Starting packet capture... (will capture 20 packets)");
    println!();

    let breaker = session.break_handle()?;
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(10));
        breaker.breakloop();
    });

    let mut n = 0;
    let result = session.loop_packets(20, |packet| {
        n += 1;
        println!(
            "[{}] {:.6}: {} bytes captured of {}",
            n,
            packet.timestamp(),
            packet.caplen(),
            packet.len()
        );
        Ok::<(), std::io::Error>(())
    });

    match result {
        Ok(()) => {}
        Err(LoopError::Capture(CaptureError::Break)) => println!("\nTime limit reached"),
        Err(e) => return Err(e.into()),
    }

    // Print final statistics
    let stats = session.stats()?;
    println!("\n=== Final Statistics ===");
    println!("{}", stats.format());

    Ok(())
}
