//! End-to-end capture scenarios against the scripted engine

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tapline_capture::{
    discover, CaptureError, DeviceScript, DumpSink, FilterProgram, Linktype, LiveSession,
    LoopError, OfflineSession, SavefileScript, ScriptedEngine, Session, SockAddr,
};
use tapline_core::interface::{AF_INET, IF_LOOPBACK, IF_RUNNING, IF_UP};
use tapline_core::{RawAddress, RawHeader, RawInterface, RawSockaddr};

const UDP: u8 = 17;
const TCP: u8 = 6;

/// Frames whose first byte is the transport protocol and second a sequence number
fn frame(proto: u8, seq: u8) -> Vec<u8> {
    vec![proto, seq, 0xde, 0xad, 0xbe, 0xef]
}

fn engine() -> Arc<ScriptedEngine> {
    let engine = Arc::new(ScriptedEngine::new());
    engine.register_filter("udp", |data| data.first() == Some(&UDP));
    engine.register_filter("tcp", |data| data.first() == Some(&TCP));
    engine
}

fn mixed_savefile(engine: &ScriptedEngine, path: &str) {
    let protos = [UDP, TCP, UDP, UDP, TCP, UDP, TCP, TCP];
    let script = protos
        .iter()
        .enumerate()
        .fold(SavefileScript::new(Linktype::ETHERNET), |file, (i, proto)| {
            file.packet(100 + i as i64, frame(*proto, i as u8))
        });
    engine.add_savefile(path, script);
}

// ===== Offline Replay Tests =====

#[test]
fn test_filtered_replay_reaches_callback_and_dump() {
    let engine = engine();
    mixed_savefile(&engine, "mixed.pcap");

    let mut session = OfflineSession::new(engine.clone(), "mixed.pcap");
    session.activate().unwrap();
    session.set_filter("udp").unwrap();
    session.attach_dump("udp-only.pcap").unwrap();

    let mut seqs = Vec::new();
    session
        .loop_packets(0, |packet| {
            seqs.push(packet.data()[1]);
            Ok::<(), ()>(())
        })
        .unwrap();

    assert_eq!(seqs, vec![0, 2, 3, 5]);
    assert_eq!(session.dump().unwrap().packets_written(), 4);
    session.close();

    let dumped = engine.savefile_records("udp-only.pcap").unwrap();
    let dumped_seqs: Vec<u8> = dumped.iter().map(|p| p.data()[1]).collect();
    assert_eq!(dumped_seqs, seqs);
    assert!(dumped.iter().all(|p| p.data()[0] == UDP));
    assert_eq!(dumped[0].timestamp_parts(), (100, 0));
}

#[test]
fn test_dump_replays_as_savefile() {
    let engine = engine();
    mixed_savefile(&engine, "mixed.pcap");

    let mut writer = OfflineSession::new(engine.clone(), "mixed.pcap");
    writer.activate().unwrap();
    writer.set_filter("tcp").unwrap();
    writer.attach_dump("tcp.pcap").unwrap();
    while writer.read_next().unwrap().is_some() {}
    drop(writer);

    let mut reader = OfflineSession::new(engine, "tcp.pcap");
    reader.activate().unwrap();
    assert_eq!(reader.datalink().unwrap(), Linktype::ETHERNET);
    let seqs: Vec<u8> = reader.packets().map(|p| p.unwrap().data()[1]).collect();
    assert_eq!(seqs, vec![1, 4, 6, 7]);
}

#[test]
fn test_offline_metadata() {
    let engine = engine();
    engine.add_savefile(
        "old.pcap",
        SavefileScript::new(Linktype::RAW)
            .snaplen(96)
            .swapped(true)
            .version(2, 2),
    );

    let mut session = OfflineSession::new(engine, "old.pcap");
    assert_eq!(session.is_swapped(), Err(CaptureError::NotActivated));

    session.activate().unwrap();
    assert_eq!(session.is_swapped(), Ok(true));
    assert_eq!(session.version(), Ok((2, 2)));
    assert_eq!(session.major_version(), Ok(2));
    assert_eq!(session.minor_version(), Ok(2));
    assert_eq!(session.snapshot_len(), Ok(96));
    assert_eq!(session.datalink().unwrap().to_string(), "RAW");
}

#[test]
fn test_missing_savefile() {
    let mut session = OfflineSession::new(engine(), "nowhere.pcap");
    let err = session.activate().unwrap_err();
    assert!(matches!(err, CaptureError::Generic(ref d) if d.contains("nowhere.pcap")));
    assert!(!session.is_activated());
}

#[test]
fn test_truncated_savefile_records() {
    let engine = engine();
    engine.add_savefile(
        "cut.pcap",
        SavefileScript::new(Linktype::ETHERNET).record(
            RawHeader {
                ts_sec: 5,
                ts_usec: 250_000,
                caplen: 4,
                len: 1514,
            },
            vec![1, 2, 3, 4],
        ),
    );

    let mut session = OfflineSession::new(engine, "cut.pcap");
    session.activate().unwrap();
    let packet = session.read_next().unwrap().unwrap();

    assert_eq!(packet.caplen(), 4);
    assert_eq!(packet.len(), 1514);
    assert!(packet.is_truncated());
    assert!((packet.timestamp() - 5.25).abs() < 1e-9);
}

// ===== Filter Tests =====

#[test]
fn test_compiled_program_bound_to_its_session() {
    let engine = engine();
    mixed_savefile(&engine, "a.pcap");
    mixed_savefile(&engine, "b.pcap");

    let mut first = OfflineSession::new(engine.clone(), "a.pcap");
    let mut second = OfflineSession::new(engine, "b.pcap");
    first.activate().unwrap();
    second.activate().unwrap();

    let program = FilterProgram::compile(&mut first, "udp").unwrap();
    assert_eq!(program.session_id(), first.id());
    assert_eq!(program.linktype(), Linktype::ETHERNET);

    assert!(matches!(program.attach(&mut second), Err(CaptureError::Generic(_))));
    assert!(second.filter().is_none());

    program.attach(&mut first).unwrap();
    assert_eq!(first.filter().unwrap().expression(), "udp");
}

#[test]
fn test_bad_expression_is_generic_with_detail() {
    let engine = engine();
    mixed_savefile(&engine, "a.pcap");
    let mut session = OfflineSession::new(engine, "a.pcap");
    session.activate().unwrap();

    let err = session.set_filter("port eleventy").unwrap_err();
    assert!(matches!(err, CaptureError::Generic(ref d) if d.contains("port eleventy")));
    assert!(session.filter().is_none());
}

// ===== Dump Sink Tests =====

#[test]
fn test_dump_sink_lifecycle() {
    let engine = engine();
    mixed_savefile(&engine, "a.pcap");

    let mut unopened = OfflineSession::new(engine.clone(), "a.pcap");
    assert!(matches!(
        DumpSink::open(&mut unopened, "never.pcap"),
        Err(CaptureError::NotActivated)
    ));

    let mut session = OfflineSession::new(engine.clone(), "a.pcap");
    session.activate().unwrap();
    let mut sink = DumpSink::open(&mut session, "manual.pcap").unwrap();

    let first = session.read_next().unwrap().unwrap();
    sink.write(&first);
    sink.flush().unwrap();
    assert_eq!(sink.path().to_str(), Some("manual.pcap"));
    assert_eq!(sink.packets_written(), 1);

    sink.close();
    sink.close();
    assert!(!sink.is_open());
    assert!(sink.flush().is_err());
    sink.write(&first);
    assert_eq!(sink.packets_written(), 1);
    assert_eq!(engine.savefile_records("manual.pcap").unwrap().len(), 1);
}

#[test]
fn test_set_dump_rejects_foreign_sink() {
    let engine = engine();
    mixed_savefile(&engine, "a.pcap");

    let mut first = OfflineSession::new(engine.clone(), "a.pcap");
    let mut second = OfflineSession::new(engine, "a.pcap");
    first.activate().unwrap();
    second.activate().unwrap();

    let sink = DumpSink::open(&mut first, "x.pcap").unwrap();
    assert!(matches!(second.set_dump(sink), Err(CaptureError::Generic(_))));

    let own = DumpSink::open(&mut second, "y.pcap").unwrap();
    second.set_dump(own).unwrap();
    assert_eq!(second.dump_path().and_then(|p| p.to_str()), Some("y.pcap"));
    let detached = second.detach_dump().unwrap();
    assert!(detached.is_open());
    assert!(second.dump().is_none());
}

#[test]
fn test_autosave_opens_at_activation() {
    let engine = engine();
    engine.add_device(
        "eth0",
        DeviceScript::ethernet()
            .packet(1, frame(UDP, 1))
            .packet(2, frame(TCP, 2)),
    );

    let mut session = LiveSession::new(engine.clone(), "eth0").unwrap();
    session.set_autosave("auto.pcap").unwrap();
    assert!(session.dump().is_none());

    session.activate().unwrap();
    assert_eq!(session.dump_path().and_then(|p| p.to_str()), Some("auto.pcap"));

    assert_eq!(session.dispatch(0, |_| Ok::<(), ()>(())).unwrap(), 2);
    drop(session);
    assert_eq!(engine.savefile_records("auto.pcap").unwrap().len(), 2);
}

#[test]
fn test_failing_callback_packet_not_dumped() {
    let engine = engine();
    engine.add_device(
        "eth0",
        DeviceScript::ethernet()
            .packet(1, frame(UDP, 1))
            .packet(2, frame(UDP, 2))
            .packet(3, frame(UDP, 3)),
    );

    let mut session = LiveSession::new(engine.clone(), "eth0").unwrap();
    session.set_autosave("partial.pcap").unwrap();
    session.activate().unwrap();

    let result = session.loop_packets(0, |packet| {
        if packet.data()[1] == 2 {
            Err("bad frame")
        } else {
            Ok(())
        }
    });
    assert!(matches!(result, Err(LoopError::Handler("bad frame"))));
    drop(session);

    let dumped = engine.savefile_records("partial.pcap").unwrap();
    assert_eq!(dumped.len(), 1);
    assert_eq!(dumped[0].data()[1], 1);
}

// ===== Concurrency Tests =====

#[test]
fn test_breakloop_from_another_thread() {
    let engine = engine();
    let script = (1..=5).fold(DeviceScript::ethernet(), |script, seq| {
        script.packet(seq as i64, frame(UDP, seq))
    });
    engine.add_device("eth0", script);

    let mut session = LiveSession::new(engine, "eth0").unwrap();
    session.activate().unwrap();
    let breaker = session.break_handle().unwrap();
    let watcher = breaker.clone();

    let waker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        breaker.breakloop();
    });

    // The first callback holds the loop open until the other thread's
    // break is visible; without it every packet would be delivered.
    let mut seen = Vec::new();
    let result = session.loop_packets(0, |p| {
        seen.push(p.data()[1]);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !watcher.is_requested() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        Ok::<(), ()>(())
    });
    waker.join().unwrap();

    assert!(matches!(result, Err(LoopError::Capture(CaptureError::Break))));
    assert_eq!(seen, vec![1]);
    assert!(!watcher.is_requested());

    // Remaining packets are still there for the next loop
    assert_eq!(session.dispatch(0, |_| Ok::<(), ()>(())).unwrap(), 4);
}

// ===== Interface Discovery Tests =====

#[test]
fn test_discover_loopback_and_ethernet() {
    let engine = ScriptedEngine::new();
    engine.add_interface(RawInterface {
        name: "lo".into(),
        description: None,
        flags: IF_LOOPBACK | IF_UP | IF_RUNNING,
        addresses: Vec::new(),
    });
    engine.add_interface(RawInterface {
        name: "eth0".into(),
        description: None,
        flags: IF_UP | IF_RUNNING,
        addresses: vec![RawAddress {
            addr: Some(RawSockaddr::from_ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)))),
            ..RawAddress::default()
        }],
    });

    let interfaces = discover(&engine).unwrap();
    assert_eq!(interfaces.len(), 2);

    assert_eq!(interfaces[0].name, "lo");
    assert!(interfaces[0].loopback);
    assert!(interfaces[0].addresses.is_empty());

    assert_eq!(interfaces[1].name, "eth0");
    assert!(!interfaces[1].loopback);
    let addr = &interfaces[1].addresses[0];
    assert_eq!(
        addr.address,
        Some(SockAddr::Numeric {
            family: AF_INET,
            text: "192.168.1.20".into()
        })
    );
    assert!(addr.netmask.is_none());
    assert!(addr.broadcast.is_none());
    assert!(addr.destination.is_none());
}

#[test]
fn test_discover_family_only_rendering() {
    let engine = ScriptedEngine::new();
    engine.add_interface(RawInterface {
        name: "tun0".into(),
        description: None,
        flags: IF_UP,
        addresses: vec![
            RawAddress {
                addr: Some(RawSockaddr {
                    family: 17,
                    data: vec![0; 8],
                }),
                ..RawAddress::default()
            },
            RawAddress {
                addr: Some(RawSockaddr::from_ip(IpAddr::V6(Ipv6Addr::LOCALHOST))),
                netmask: Some(RawSockaddr {
                    family: AF_INET,
                    data: vec![255, 255],
                }),
                ..RawAddress::default()
            },
        ],
    });

    let tun = discover(&engine).unwrap().remove(0);
    assert_eq!(tun.addresses[0].address, Some(SockAddr::Family(17)));
    assert_eq!(
        tun.addresses[1].address.as_ref().and_then(SockAddr::text),
        Some("::1")
    );
    assert_eq!(tun.addresses[1].netmask, Some(SockAddr::Family(AF_INET)));
}
