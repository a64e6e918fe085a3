//! Canonical socket records.
//!
//! A [`SocketRecord`] is what the decoder produces for one socket
//! descriptor. Endpoints are rendered to text at decode time so the record
//! can be deduplicated and printed without going back to the raw buffer.

use crate::types::{AddressFamily, Protocol, TcpState};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Remote endpoint shown for a Unix socket with a live peer.
pub const UNIX_CONNECTED: &str = "[connected]";

/// Rendering used for unspecified and unbound endpoints.
pub const WILDCARD: &str = "*";

/// How unspecified IP addresses are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressStyle {
    /// `*` for `INADDR_ANY` and `::` (`*:22`, `[*]:22`).
    #[default]
    Wildcard,
    /// The literal address (`0.0.0.0:22`, `[::]:22`).
    Numeric,
}

/// One socket, as observed through one process descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketRecord {
    /// Address family.
    pub family: AddressFamily,
    /// Protocol.
    pub protocol: Protocol,
    /// TCP state; always `Unknown` for non-TCP sockets.
    pub state: TcpState,
    /// Rendered local endpoint.
    pub local_address: String,
    /// Rendered remote endpoint.
    pub remote_address: String,
    /// Local port (0 = unbound).
    pub local_port: u16,
    /// Remote port (0 = not connected).
    pub remote_port: u16,
    /// Bound path of a Unix socket, empty otherwise.
    pub unix_path: String,
    /// Bytes waiting in the receive buffer.
    pub recv_queue_bytes: u32,
    /// Bytes waiting in the send buffer.
    pub send_queue_bytes: u32,
    /// PID of the process the descriptor was read from.
    pub owner_pid: i32,
    /// Descriptor number in that process.
    pub owner_fd: i32,
    /// Process name, only with process attribution.
    pub process_name: Option<String>,
    /// Socket owner UID (0 when unavailable).
    pub uid: u32,
    /// Socket inode number (0 when unavailable).
    pub inode: u64,
}

impl SocketRecord {
    /// Create a record for an IP socket.
    ///
    /// Non-TCP protocols always get `TcpState::Unknown`, whatever `state` says.
    pub fn inet(
        protocol: Protocol,
        state: TcpState,
        local: IpAddr,
        local_port: u16,
        remote: IpAddr,
        remote_port: u16,
        style: AddressStyle,
    ) -> Self {
        let family = match local {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        };
        let state = if protocol == Protocol::Tcp {
            state
        } else {
            TcpState::Unknown
        };

        Self {
            family,
            protocol,
            state,
            local_address: format_endpoint(local, local_port, style),
            remote_address: format_endpoint(remote, remote_port, style),
            local_port,
            remote_port,
            unix_path: String::new(),
            recv_queue_bytes: 0,
            send_queue_bytes: 0,
            owner_pid: 0,
            owner_fd: 0,
            process_name: None,
            uid: 0,
            inode: 0,
        }
    }

    /// Create a record for a Unix domain socket.
    ///
    /// `path` is the bound path (empty when unnamed); `connected` says
    /// whether the socket has a peer.
    pub fn unix(stream: bool, path: impl Into<String>, connected: bool) -> Self {
        let path = path.into();
        let local_address = if path.is_empty() {
            WILDCARD.to_string()
        } else {
            path.clone()
        };
        let remote_address = if connected {
            UNIX_CONNECTED
        } else {
            WILDCARD
        };

        Self {
            family: AddressFamily::Unix,
            protocol: if stream {
                Protocol::UnixStream
            } else {
                Protocol::UnixDgram
            },
            state: TcpState::Unknown,
            local_address,
            remote_address: remote_address.to_string(),
            local_port: 0,
            remote_port: 0,
            unix_path: path,
            recv_queue_bytes: 0,
            send_queue_bytes: 0,
            owner_pid: 0,
            owner_fd: 0,
            process_name: None,
            uid: 0,
            inode: 0,
        }
    }

    /// Set the queue depths.
    pub fn with_queues(mut self, recv: u32, send: u32) -> Self {
        self.recv_queue_bytes = recv;
        self.send_queue_bytes = send;
        self
    }

    /// Set the descriptor this record was read from.
    pub fn with_owner(mut self, pid: i32, fd: i32) -> Self {
        self.owner_pid = pid;
        self.owner_fd = fd;
        self
    }

    /// Set the owner UID and inode.
    pub fn with_identity(mut self, uid: u32, inode: u64) -> Self {
        self.uid = uid;
        self.inode = inode;
        self
    }

    /// Attach the owning process name.
    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = Some(name.into());
        self
    }

    /// Check if this is a listening TCP socket.
    pub fn is_listening(&self) -> bool {
        self.protocol == Protocol::Tcp && self.state == TcpState::Listen
    }

    /// Check if this is an established TCP socket.
    pub fn is_established(&self) -> bool {
        self.protocol == Protocol::Tcp && self.state == TcpState::Established
    }

    /// Get the state label for output.
    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }
}

/// Render an IP endpoint.
///
/// IPv6 addresses are bracketed; port 0 renders as `*`.
pub fn format_endpoint(addr: IpAddr, port: u16, style: AddressStyle) -> String {
    let host = match (addr, style) {
        (addr, AddressStyle::Wildcard) if addr.is_unspecified() => WILDCARD.to_string(),
        (addr, _) => addr.to_string(),
    };
    let port = if port == 0 {
        WILDCARD.to_string()
    } else {
        port.to_string()
    };

    match addr {
        IpAddr::V4(_) => format!("{}:{}", host, port),
        IpAddr::V6(_) => format!("[{}]:{}", host, port),
    }
}

/// Parse an IPv4 address from 4 bytes (network byte order).
pub fn parse_ipv4(data: &[u8]) -> Option<Ipv4Addr> {
    let octets: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(Ipv4Addr::from(octets))
}

/// Parse an IPv6 address from 16 bytes.
pub fn parse_ipv6(data: &[u8]) -> Option<Ipv6Addr> {
    let octets: [u8; 16] = data.get(..16)?.try_into().ok()?;
    Some(Ipv6Addr::from(octets))
}
