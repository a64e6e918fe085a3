//! Common test utilities for pipeline tests.
//!
//! Provides `FixtureSource`, an in-memory process table, and `SockBuf`,
//! a builder for synthetic `socket_fdinfo` buffers laid out the way the
//! built-in Darwin layout expects.

use procsock::types::darwin;
use procsock::{Descriptor, FdType, Pid, ProcessSource, Result, SocketLayout};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Builder for one `socket_fdinfo` buffer.
pub struct SockBuf {
    layout: SocketLayout,
    buf: Vec<u8>,
}

#[allow(dead_code)]
impl SockBuf {
    fn new(family: i32, sock_type: i32, protocol: i32, kind: i32) -> Self {
        let layout = SocketLayout::darwin();
        let buf = vec![0u8; layout.buffer_size()];
        let mut this = Self { layout, buf };
        this.put_i32(this.layout.soi_family, family);
        this.put_i32(this.layout.soi_type, sock_type);
        this.put_i32(this.layout.soi_protocol, protocol);
        this.put_i32(this.layout.soi_kind, kind);
        this
    }

    /// A TCP socket.
    pub fn tcp(local: &str, remote: &str, state: i32) -> Self {
        let (laddr, lport) = split(local);
        let (raddr, rport) = split(remote);
        let family = if laddr.is_ipv6() {
            darwin::AF_INET6
        } else {
            darwin::AF_INET
        };
        Self::new(
            family,
            darwin::SOCK_STREAM,
            darwin::IPPROTO_TCP,
            darwin::SOCKINFO_TCP,
        )
        .endpoints(laddr, lport, raddr, rport)
        .state(state)
    }

    /// A UDP socket.
    pub fn udp(local: &str, remote: &str) -> Self {
        let (laddr, lport) = split(local);
        let (raddr, rport) = split(remote);
        let family = if laddr.is_ipv6() {
            darwin::AF_INET6
        } else {
            darwin::AF_INET
        };
        Self::new(
            family,
            darwin::SOCK_DGRAM,
            darwin::IPPROTO_UDP,
            darwin::SOCKINFO_IN,
        )
        .endpoints(laddr, lport, raddr, rport)
    }

    /// A Unix stream socket.
    pub fn unix_stream(path: &str, connected: bool) -> Self {
        Self::new(
            darwin::AF_UNIX,
            darwin::SOCK_STREAM,
            0,
            darwin::SOCKINFO_UN,
        )
        .unix_path(path, connected)
    }

    /// A socket of a family the decoder does not handle.
    pub fn other_family(family: i32) -> Self {
        Self::new(family, darwin::SOCK_DGRAM, 0, darwin::SOCKINFO_GENERIC)
    }

    /// Set the queue depths.
    pub fn queues(mut self, recv: u32, send: u32) -> Self {
        let (rcv, snd) = (self.layout.rcv_cc, self.layout.snd_cc);
        self.buf[rcv..rcv + 4].copy_from_slice(&recv.to_ne_bytes());
        self.buf[snd..snd + 4].copy_from_slice(&send.to_ne_bytes());
        self
    }

    /// Zero the structured local port and write `port` at a raw offset,
    /// as a drifted layout would.
    pub fn drifted_port(mut self, offset: usize, port: u16) -> Self {
        let lport = self.layout.in_lport;
        self.put_i32(lport, 0);
        self.buf[offset..offset + 2].copy_from_slice(&port.to_be_bytes());
        self
    }

    /// Get the bytes.
    pub fn build(self) -> Vec<u8> {
        self.buf
    }

    fn endpoints(mut self, laddr: IpAddr, lport: u16, raddr: IpAddr, rport: u16) -> Self {
        let (l, r) = (self.layout.in_laddr, self.layout.in_faddr);
        self.put_addr(l, laddr);
        self.put_addr(r, raddr);
        let (lp, rp) = (self.layout.in_lport, self.layout.in_fport);
        self.put_i32(lp, i32::from(u16::to_be(lport)));
        self.put_i32(rp, i32::from(u16::to_be(rport)));
        self
    }

    fn state(mut self, state: i32) -> Self {
        let offset = self.layout.tcp_state;
        self.put_i32(offset, state);
        self
    }

    fn unix_path(mut self, path: &str, connected: bool) -> Self {
        let start = self.layout.un_path;
        self.buf[start..start + path.len()].copy_from_slice(path.as_bytes());
        let conn = self.layout.un_conn_so;
        let so: u64 = if connected { 0xffff_ff80_0bad_f00d } else { 0 };
        self.buf[conn..conn + 8].copy_from_slice(&so.to_ne_bytes());
        self
    }

    fn put_addr(&mut self, offset: usize, addr: IpAddr) {
        match addr {
            IpAddr::V4(v4) => {
                let start = offset + self.layout.in4_in_addr46;
                self.buf[start..start + 4].copy_from_slice(&v4.octets());
            }
            IpAddr::V6(v6) => self.buf[offset..offset + 16].copy_from_slice(&v6.octets()),
        }
    }

    fn put_i32(&mut self, offset: usize, value: i32) {
        self.buf[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    }
}

/// Split `"10.0.0.1:80"` or `"[::1]:80"` into address and port.
fn split(endpoint: &str) -> (IpAddr, u16) {
    let addr: std::net::SocketAddr = endpoint.parse().expect("test endpoint");
    (addr.ip(), addr.port())
}

struct FixtureProcess {
    name: String,
    descriptors: Vec<(Descriptor, Option<Vec<u8>>)>,
}

/// In-memory process table.
#[derive(Default)]
pub struct FixtureSource {
    processes: BTreeMap<Pid, FixtureProcess>,
    fail_errno: Option<i32>,
    name_lookups: AtomicUsize,
}

#[allow(dead_code)]
impl FixtureSource {
    /// Create an empty process table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a process with no descriptors.
    pub fn process(mut self, pid: Pid, name: &str) -> Self {
        self.processes.insert(
            pid,
            FixtureProcess {
                name: name.to_string(),
                descriptors: Vec::new(),
            },
        );
        self
    }

    /// Add a socket descriptor to a process added earlier.
    pub fn socket(self, pid: Pid, fd: i32, buf: SockBuf) -> Self {
        self.descriptor(pid, Descriptor::socket(fd), Some(buf.build()))
    }

    /// Add a socket descriptor whose metadata can no longer be read.
    pub fn closed_socket(self, pid: Pid, fd: i32) -> Self {
        self.descriptor(pid, Descriptor::socket(fd), None)
    }

    /// Add a regular file descriptor.
    pub fn file(self, pid: Pid, fd: i32) -> Self {
        self.descriptor(pid, Descriptor::new(fd, FdType::Vnode), None)
    }

    /// Make process enumeration fail.
    pub fn failing(mut self, errno: i32) -> Self {
        self.fail_errno = Some(errno);
        self
    }

    /// How often a process name was looked up.
    pub fn name_lookups(&self) -> usize {
        self.name_lookups.load(Ordering::SeqCst)
    }

    fn descriptor(mut self, pid: Pid, desc: Descriptor, buf: Option<Vec<u8>>) -> Self {
        self.processes
            .get_mut(&pid)
            .expect("process added before its descriptors")
            .descriptors
            .push((desc, buf));
        self
    }
}

impl ProcessSource for FixtureSource {
    fn list_process_ids(&self) -> Result<Vec<Pid>> {
        if let Some(errno) = self.fail_errno {
            return Err(procsock::Error::enumeration_failed(errno));
        }
        Ok(self.processes.keys().copied().collect())
    }

    fn list_descriptors(&self, pid: Pid) -> Vec<Descriptor> {
        self.processes
            .get(&pid)
            .map(|p| p.descriptors.iter().map(|(d, _)| *d).collect())
            .unwrap_or_default()
    }

    fn socket_metadata(&self, pid: Pid, fd: i32) -> Option<Vec<u8>> {
        self.processes
            .get(&pid)?
            .descriptors
            .iter()
            .find(|(d, _)| d.fd == fd)?
            .1
            .clone()
    }

    fn process_name(&self, pid: Pid) -> String {
        self.name_lookups.fetch_add(1, Ordering::SeqCst);
        self.processes
            .get(&pid)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "?".to_string())
    }
}
