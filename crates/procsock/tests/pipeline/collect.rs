//! Snapshot collection tests.

use procsock::{
    AddressFamily, CallerConfig, Collector, Protocol, Result, SocketLayout, Summary, TcpState,
};

use crate::common::{FixtureSource, SockBuf};

const LISTEN: i32 = 1;
const ESTABLISHED: i32 = 4;
const TIME_WAIT: i32 = 10;

fn sshd_host() -> FixtureSource {
    FixtureSource::new()
        .process(1, "launchd")
        .file(1, 0)
        .process(88, "sshd")
        .file(88, 0)
        .socket(88, 3, SockBuf::tcp("0.0.0.0:22", "0.0.0.0:0", LISTEN))
        .socket(88, 4, SockBuf::tcp("[::]:22", "[::]:0", LISTEN))
        .process(412, "sshd")
        .socket(
            412,
            5,
            SockBuf::tcp("10.0.0.5:22", "10.0.0.9:51000", ESTABLISHED).queues(0, 36),
        )
        .socket(412, 6, SockBuf::tcp("10.0.0.5:22", "10.0.0.7:50000", TIME_WAIT))
}

#[test]
fn test_default_snapshot() -> Result<()> {
    let collector = Collector::new(sshd_host(), &CallerConfig::default());
    let set = collector.collect()?;

    let rows: Vec<(&str, &str, &str)> = set
        .iter()
        .map(|r| {
            (
                r.state_name(),
                r.local_address.as_str(),
                r.remote_address.as_str(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("ESTAB", "10.0.0.5:22", "10.0.0.9:51000"),
            ("LISTEN", "[*]:22", "[*]:*"),
            ("LISTEN", "*:22", "*:*"),
        ]
    );

    let estab = set.iter().next().unwrap();
    assert_eq!(estab.send_queue_bytes, 36);
    assert_eq!((estab.owner_pid, estab.owner_fd), (412, 5));
    Ok(())
}

#[test]
fn test_ipv6_only_drops_ipv4_listener() -> Result<()> {
    let config = CallerConfig {
        ipv6_only: true,
        ..Default::default()
    };
    let set = Collector::new(sshd_host(), &config).collect()?;
    assert_eq!(set.len(), 1);
    assert!(set.iter().all(|r| r.family == AddressFamily::Inet6));
    Ok(())
}

#[test]
fn test_numeric_listing() -> Result<()> {
    let config = CallerConfig {
        tcp: true,
        listening: true,
        numeric: true,
        ..Default::default()
    };
    let set = Collector::new(sshd_host(), &config).collect()?;
    let locals: Vec<&str> = set.iter().map(|r| r.local_address.as_str()).collect();
    assert_eq!(locals, vec!["[::]:22", "0.0.0.0:22"]);
    Ok(())
}

#[test]
fn test_all_states() -> Result<()> {
    let config = CallerConfig {
        all: true,
        ..Default::default()
    };
    let set = Collector::new(sshd_host(), &config).collect()?;
    assert_eq!(set.len(), 4);
    assert!(set.iter().any(|r| r.state == TcpState::TimeWait));
    Ok(())
}

#[test]
fn test_shared_connection_collapses() -> Result<()> {
    // A connection inherited across fork is visible from both processes.
    let source = FixtureSource::new()
        .process(100, "parent")
        .socket(100, 7, SockBuf::tcp("10.0.0.5:51000", "10.0.0.9:443", ESTABLISHED))
        .process(200, "child")
        .socket(200, 3, SockBuf::tcp("10.0.0.5:51000", "10.0.0.9:443", ESTABLISHED));

    let config = CallerConfig {
        processes: true,
        ..Default::default()
    };
    let set = Collector::new(source, &config).collect()?;
    assert_eq!(set.len(), 1);

    let record = set.iter().next().unwrap();
    assert_eq!((record.owner_pid, record.owner_fd), (100, 7));
    assert_eq!(record.process_name.as_deref(), Some("parent"));
    Ok(())
}

#[test]
fn test_unix_socket_without_peer() -> Result<()> {
    let source = FixtureSource::new()
        .process(50, "syslogd")
        .socket(50, 3, SockBuf::unix_stream("/var/run/syslog", false))
        .socket(50, 4, SockBuf::unix_stream("", true));

    let config = CallerConfig {
        unix: true,
        ..Default::default()
    };
    let set = Collector::new(source, &config).collect()?;
    let records = set.into_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].remote_address, "[connected]");
    assert_eq!(records[1].protocol, Protocol::UnixStream);
    assert_eq!(records[1].local_address, "/var/run/syslog");
    assert_eq!(records[1].remote_address, "*");
    assert_eq!(records[1].state, TcpState::Unknown);
    Ok(())
}

#[test]
fn test_unreadable_descriptors_are_skipped() -> Result<()> {
    let source = FixtureSource::new()
        .process(10, "gone")
        .closed_socket(10, 3)
        .process(11, "odd")
        .socket(11, 3, SockBuf::other_family(32))
        .socket(11, 4, SockBuf::udp("0.0.0.0:5353", "0.0.0.0:0"))
        // a process that exited after enumeration
        .process(12, "exited");

    let set = Collector::new(source, &CallerConfig::default()).collect()?;
    assert_eq!(set.len(), 1);
    assert_eq!(set.iter().next().unwrap().local_address, "*:5353");
    Ok(())
}

#[test]
fn test_drifted_port_is_recovered() -> Result<()> {
    let source = || {
        FixtureSource::new().process(7, "mDNSResponder").socket(
            7,
            3,
            SockBuf::udp("0.0.0.0:0", "0.0.0.0:0").drifted_port(0x110, 5353),
        )
    };

    let collector =
        Collector::new(source(), &CallerConfig::default()).with_layout(SocketLayout::ios13());
    assert_eq!(collector.collect()?.iter().next().unwrap().local_port, 5353);

    // 0x110 is insi_gencnt on macOS, so the built-in layout ignores it.
    assert!(Collector::new(source(), &CallerConfig::default())
        .collect()?
        .is_empty());
    Ok(())
}

#[test]
fn test_last_scanned_process_listed_first() -> Result<()> {
    let source = FixtureSource::new()
        .process(1, "first")
        .socket(1, 3, SockBuf::udp("0.0.0.0:1111", "0.0.0.0:0"))
        .process(2, "second")
        .socket(2, 3, SockBuf::udp("0.0.0.0:2222", "0.0.0.0:0"))
        .socket(2, 4, SockBuf::udp("0.0.0.0:3333", "0.0.0.0:0"));

    let set = Collector::new(source, &CallerConfig::default()).collect()?;
    let rows: Vec<(i32, u16)> = set.iter().map(|r| (r.owner_pid, r.local_port)).collect();
    assert_eq!(rows, vec![(2, 3333), (2, 2222), (1, 1111)]);
    Ok(())
}

#[test]
fn test_custom_layout() -> Result<()> {
    // Probe only an offset the built-in list does not know.
    let layout = SocketLayout::from_json(r#"{ "port_probes": [{ "offset": 400 }] }"#)?;
    let source = FixtureSource::new().process(7, "daemon").socket(
        7,
        3,
        SockBuf::udp("0.0.0.0:0", "0.0.0.0:0").drifted_port(400, 6000),
    );

    let collector = Collector::new(source, &CallerConfig::default()).with_layout(layout);
    assert_eq!(collector.collect()?.iter().next().unwrap().local_port, 6000);
    Ok(())
}

#[test]
fn test_enumeration_failure_is_fatal() {
    let source = FixtureSource::new().process(1, "launchd").failing(1);
    let err = Collector::new(source, &CallerConfig::default())
        .collect()
        .unwrap_err();
    assert_eq!(err.errno(), Some(1));
    assert!(err.is_permission_denied());
}

#[test]
fn test_summary_counts_filtered_set() -> Result<()> {
    let source = FixtureSource::new()
        .process(30, "server")
        .socket(30, 3, SockBuf::tcp("10.0.0.1:443", "10.0.0.2:40001", ESTABLISHED))
        .socket(30, 4, SockBuf::tcp("10.0.0.1:443", "10.0.0.2:40002", ESTABLISHED))
        .socket(30, 5, SockBuf::tcp("10.0.0.1:443", "10.0.0.2:40003", ESTABLISHED))
        .socket(30, 6, SockBuf::tcp("0.0.0.0:443", "0.0.0.0:0", LISTEN))
        .socket(30, 7, SockBuf::udp("0.0.0.0:53", "0.0.0.0:0"));

    let summary = Collector::new(source, &CallerConfig::default()).summarize()?;
    assert_eq!(
        summary,
        Summary {
            tcp_total: 4,
            tcp_established: 3,
            tcp_listen: 1,
            udp_total: 1,
            ..Default::default()
        }
    );
    assert_eq!(summary.total(), 5);
    Ok(())
}

#[test]
fn test_names_only_for_kept_processes() -> Result<()> {
    let config = CallerConfig {
        processes: true,
        ..Default::default()
    };
    let collector = Collector::new(sshd_host(), &config);
    let set = collector.collect()?;

    // launchd has no sockets and 412 shares one name lookup for its socket.
    assert_eq!(collector.source().name_lookups(), 2);
    assert!(set.iter().all(|r| r.process_name.as_deref() == Some("sshd")));
    Ok(())
}
