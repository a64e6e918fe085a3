//! Port to process mapping tests.

use procsock::{PortMap, Result, SocketLayout};

use crate::common::{FixtureSource, SockBuf};

#[test]
fn test_port_map() -> Result<()> {
    let source = FixtureSource::new()
        .process(1, "launchd")
        .socket(1, 12, SockBuf::tcp("0.0.0.0:22", "0.0.0.0:0", 1))
        .socket(1, 13, SockBuf::tcp("127.0.0.1:631", "0.0.0.0:0", 1))
        .process(88, "sshd")
        .socket(88, 3, SockBuf::tcp("0.0.0.0:22", "0.0.0.0:0", 1))
        .process(200, "mDNSResponder")
        .socket(200, 7, SockBuf::udp("0.0.0.0:0", "0.0.0.0:0").drifted_port(0x10e, 5353))
        .socket(200, 8, SockBuf::unix_stream("/var/run/mDNSResponder", false));

    let map = PortMap::build(&source, &SocketLayout::darwin())?;
    assert_eq!(
        map.lines(),
        vec!["22 sshd 88 3", "631 launchd 1 13", "5353 mDNSResponder 200 7"]
    );
    Ok(())
}

#[test]
fn test_port_map_skips_portless_sockets() -> Result<()> {
    let source = FixtureSource::new()
        .process(5, "client")
        .socket(5, 3, SockBuf::udp("0.0.0.0:0", "0.0.0.0:0"))
        .closed_socket(5, 4);

    let map = PortMap::build(&source, &SocketLayout::darwin())?;
    assert!(map.is_empty());
    assert_eq!(source.name_lookups(), 0);
    Ok(())
}
