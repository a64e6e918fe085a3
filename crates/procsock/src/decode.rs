//! `socket_fdinfo` decoding.
//!
//! [`decode()`] turns the opaque buffer returned for one socket descriptor
//! into a [`SocketRecord`]. Every field is read through a bounds-checked
//! slice read at a [`SocketLayout`] offset, so a short or unexpected buffer
//! produces a [`DecodeError`] instead of a garbage record.

use crate::layout::{SocketLayout, read_array, read_i32, read_port_int, read_u32, read_u64};
use crate::record::{AddressStyle, SocketRecord, parse_ipv4, parse_ipv6};
use crate::types::{AddressFamily, Protocol, TcpState, darwin};
use std::net::IpAddr;

/// Why a buffer did not produce a record.
///
/// None of these are errors for the snapshot as a whole: the descriptor is
/// dropped and the scan moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A field lies past the end of the buffer.
    #[error("buffer truncated: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes needed to read the field.
        needed: usize,
        /// Bytes available.
        have: usize,
    },

    /// Not an IPv4, IPv6 or Unix socket.
    #[error("unsupported address family: {0}")]
    UnsupportedFamily(i32),

    /// An IP socket that is neither TCP nor UDP.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(i32),

    /// Neither the structured read nor any probe produced a usable port.
    #[error("no plausible local port")]
    NoPlausiblePort,
}

/// Decode one `socket_fdinfo` buffer.
pub fn decode(
    buf: &[u8],
    layout: &SocketLayout,
    style: AddressStyle,
) -> Result<SocketRecord, DecodeError> {
    let family = field(buf, layout.soi_family, read_i32)?;

    let record = match AddressFamily::from_raw(family) {
        AddressFamily::Inet | AddressFamily::Inet6 => decode_inet(buf, layout, family, style)?,
        AddressFamily::Unix => decode_unix(buf, layout)?,
        AddressFamily::Unknown => return Err(DecodeError::UnsupportedFamily(family)),
    };

    let recv = field(buf, layout.rcv_cc, read_u32)?;
    let send = field(buf, layout.snd_cc, read_u32)?;

    // The stat block is best effort: keep the record even without it.
    let uid = read_u32(buf, layout.stat_uid).unwrap_or(0);
    let inode = read_u64(buf, layout.stat_ino).unwrap_or(0);

    Ok(record.with_queues(recv, send).with_identity(uid, inode))
}

fn decode_inet(
    buf: &[u8],
    layout: &SocketLayout,
    family: i32,
    style: AddressStyle,
) -> Result<SocketRecord, DecodeError> {
    let proto = field(buf, layout.soi_protocol, read_i32)?;
    let protocol = match proto {
        darwin::IPPROTO_TCP => Protocol::Tcp,
        darwin::IPPROTO_UDP => Protocol::Udp,
        other => return Err(DecodeError::UnsupportedProtocol(other)),
    };

    let v6 = family == darwin::AF_INET6;
    let local = read_ip(buf, layout, layout.in_laddr, v6)?;
    let remote = read_ip(buf, layout, layout.in_faddr, v6)?;

    let local_port = field(buf, layout.in_lport, read_port_int)?;
    let local_port = if is_plausible_port(local_port) {
        local_port
    } else {
        recover_port(buf, layout).ok_or(DecodeError::NoPlausiblePort)?
    };
    let remote_port = field(buf, layout.in_fport, read_port_int)?;

    let state = if protocol == Protocol::Tcp {
        // tcpsi_state is only there when soi_proto holds a tcp_sockinfo
        let kind = field(buf, layout.soi_kind, read_i32)?;
        if kind == darwin::SOCKINFO_TCP {
            TcpState::from_raw(field(buf, layout.tcp_state, read_i32)?)
        } else {
            TcpState::Unknown
        }
    } else {
        TcpState::Unknown
    };

    Ok(SocketRecord::inet(
        protocol,
        state,
        local,
        local_port,
        remote,
        remote_port,
        style,
    ))
}

fn decode_unix(buf: &[u8], layout: &SocketLayout) -> Result<SocketRecord, DecodeError> {
    let sock_type = field(buf, layout.soi_type, read_i32)?;
    let conn_so = field(buf, layout.un_conn_so, read_u64)?;

    let end = layout.un_path + layout.un_path_len;
    let raw = buf.get(layout.un_path..end).ok_or(DecodeError::Truncated {
        needed: end,
        have: buf.len(),
    })?;
    let path_len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let path = String::from_utf8_lossy(&raw[..path_len]);

    Ok(SocketRecord::unix(
        sock_type == darwin::SOCK_STREAM,
        path,
        conn_so != 0,
    ))
}

/// Probe the layout's alternative offsets for the local port.
///
/// Returns the first candidate in `(0, 65535)`, in probe order.
pub fn recover_port(buf: &[u8], layout: &SocketLayout) -> Option<u16> {
    layout
        .port_probes
        .iter()
        .filter_map(|probe| probe.extract(buf))
        .find(|&port| is_plausible_port(port))
}

/// Read only the local port of an IP socket, probing if needed.
///
/// Used by the port mapper, which needs nothing else from the buffer.
pub fn local_port(buf: &[u8], layout: &SocketLayout) -> Option<u16> {
    let family = AddressFamily::from_raw(read_i32(buf, layout.soi_family)?);
    if !family.is_inet() {
        return None;
    }
    read_port_int(buf, layout.in_lport)
        .filter(|&port| is_plausible_port(port))
        .or_else(|| recover_port(buf, layout))
}

/// Ports 0 and 65535 are what a drifted layout most often reads.
pub fn is_plausible_port(port: u16) -> bool {
    port > 0 && port < u16::MAX
}

fn read_ip(
    buf: &[u8],
    layout: &SocketLayout,
    offset: usize,
    v6: bool,
) -> Result<IpAddr, DecodeError> {
    let raw: [u8; 16] = field(buf, offset, read_array)?;
    let ip = if v6 {
        parse_ipv6(&raw).map(IpAddr::V6)
    } else {
        raw.get(layout.in4_in_addr46..)
            .and_then(parse_ipv4)
            .map(IpAddr::V4)
    };
    ip.ok_or(DecodeError::Truncated {
        needed: offset + 16,
        have: buf.len(),
    })
}

fn field<T>(
    buf: &[u8],
    offset: usize,
    read: impl Fn(&[u8], usize) -> Option<T>,
) -> Result<T, DecodeError> {
    read(buf, offset).ok_or(DecodeError::Truncated {
        needed: offset.saturating_add(std::mem::size_of::<T>()),
        have: buf.len(),
    })
}
