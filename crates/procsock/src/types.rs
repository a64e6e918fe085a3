//! Core types for socket inventory.
//!
//! This module provides strongly-typed representations of socket address
//! families, protocols and TCP states, along with the raw Darwin values the
//! kernel reports them as. The raw values are spelled out here instead of
//! taken from `libc` so decoding behaves the same on every host, including
//! the Linux machines the tests run on.

use serde::{Deserialize, Serialize};

/// Darwin ABI constants used when decoding `socket_fdinfo`.
pub mod darwin {
    /// `AF_UNIX`.
    pub const AF_UNIX: i32 = 1;
    /// `AF_INET`.
    pub const AF_INET: i32 = 2;
    /// `AF_INET6` (30 on Darwin, not 10 as on Linux).
    pub const AF_INET6: i32 = 30;

    /// `SOCK_STREAM`.
    pub const SOCK_STREAM: i32 = 1;
    /// `SOCK_DGRAM`.
    pub const SOCK_DGRAM: i32 = 2;

    /// `IPPROTO_TCP`.
    pub const IPPROTO_TCP: i32 = 6;
    /// `IPPROTO_UDP`.
    pub const IPPROTO_UDP: i32 = 17;

    /// `soi_kind` for a generic socket.
    pub const SOCKINFO_GENERIC: i32 = 0;
    /// `soi_kind` when `soi_proto` holds an `in_sockinfo`.
    pub const SOCKINFO_IN: i32 = 1;
    /// `soi_kind` when `soi_proto` holds a `tcp_sockinfo`.
    pub const SOCKINFO_TCP: i32 = 2;
    /// `soi_kind` when `soi_proto` holds an `un_sockinfo`.
    pub const SOCKINFO_UN: i32 = 3;
}

/// Socket address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    /// IPv4.
    Inet,
    /// IPv6.
    Inet6,
    /// Unix domain sockets.
    Unix,
    /// Anything else.
    Unknown,
}

impl AddressFamily {
    /// Parse from a raw Darwin `soi_family` value.
    pub fn from_raw(value: i32) -> Self {
        match value {
            darwin::AF_INET => Self::Inet,
            darwin::AF_INET6 => Self::Inet6,
            darwin::AF_UNIX => Self::Unix,
            _ => Self::Unknown,
        }
    }

    /// Whether this is an IP family.
    pub fn is_inet(&self) -> bool {
        matches!(self, Self::Inet | Self::Inet6)
    }

    /// Get the family name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Inet => "inet",
            Self::Inet6 => "inet6",
            Self::Unix => "unix",
            Self::Unknown => "unknown",
        }
    }
}

/// Socket protocol.
///
/// Unix sockets are split by socket type, which is how `ss` labels them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// TCP over IPv4 or IPv6.
    Tcp,
    /// UDP over IPv4 or IPv6.
    Udp,
    /// Unix stream socket.
    UnixStream,
    /// Unix datagram socket.
    UnixDgram,
    /// Anything else.
    Unknown,
}

impl Protocol {
    /// Get the netid string (used by ss).
    ///
    /// `ss` uses `tcp`/`udp` for both IPv4 and IPv6.
    pub fn netid(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::UnixStream => "u_str",
            Self::UnixDgram => "u_dgr",
            Self::Unknown => "???",
        }
    }

    /// Whether this is one of the Unix socket protocols.
    pub fn is_unix(&self) -> bool {
        matches!(self, Self::UnixStream | Self::UnixDgram)
    }
}

/// TCP connection states.
///
/// Darwin's `tcp_fsm.h` numbering, which differs from Linux's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TcpState {
    /// Unmapped or absent state; also used for every non-TCP socket.
    Unknown,
    /// Socket is closed.
    Closed,
    /// Socket is listening.
    Listen,
    /// SYN sent, waiting for matching SYN.
    SynSent,
    /// SYN received, waiting for ACK.
    SynRecv,
    /// Connection established.
    Established,
    /// FIN received, close pending.
    CloseWait,
    /// FIN sent, waiting for FIN or FIN-ACK.
    FinWait1,
    /// Both sides sent FIN simultaneously.
    Closing,
    /// Close wait acknowledged, waiting for FIN.
    LastAck,
    /// FIN acknowledged, waiting for peer FIN.
    FinWait2,
    /// In TIME-WAIT state.
    TimeWait,
}

impl TcpState {
    /// The eleven real states, in `tcp_fsm.h` order.
    pub const ALL: [TcpState; 11] = [
        Self::Closed,
        Self::Listen,
        Self::SynSent,
        Self::SynRecv,
        Self::Established,
        Self::CloseWait,
        Self::FinWait1,
        Self::Closing,
        Self::LastAck,
        Self::FinWait2,
        Self::TimeWait,
    ];

    /// Parse from a raw Darwin `tcpsi_state` value.
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => Self::Closed,
            1 => Self::Listen,
            2 => Self::SynSent,
            3 => Self::SynRecv,
            4 => Self::Established,
            5 => Self::CloseWait,
            6 => Self::FinWait1,
            7 => Self::Closing,
            8 => Self::LastAck,
            9 => Self::FinWait2,
            10 => Self::TimeWait,
            _ => Self::Unknown,
        }
    }

    /// Index into [`TcpState::ALL`], `None` for `Unknown`.
    pub fn index(&self) -> Option<usize> {
        Self::ALL.iter().position(|s| s == self)
    }

    /// Get the state name as `ss` prints it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNCONN",
            Self::Closed => "CLOSED",
            Self::Listen => "LISTEN",
            Self::SynSent => "SYN-SENT",
            Self::SynRecv => "SYN-RECV",
            Self::Established => "ESTAB",
            Self::CloseWait => "CLOSE-WAIT",
            Self::FinWait1 => "FIN-WAIT-1",
            Self::Closing => "CLOSING",
            Self::LastAck => "LAST-ACK",
            Self::FinWait2 => "FIN-WAIT-2",
            Self::TimeWait => "TIME-WAIT",
        }
    }
}
