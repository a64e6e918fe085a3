//! The OS collaborator.
//!
//! [`ProcessSource`] is everything the pipeline needs from the operating
//! system: the live PIDs, each process's descriptor table, the raw metadata
//! buffer of a socket descriptor and a process name. [`crate::Libproc`]
//! implements it with `libproc`; tests implement it in memory.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Process ID.
pub type Pid = i32;

/// Descriptor kind (`PROX_FDTYPE_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FdType {
    /// Vnode (regular file, directory, device).
    Vnode,
    /// Socket.
    Socket,
    /// POSIX shared memory.
    Pshm,
    /// POSIX semaphore.
    Psem,
    /// Kqueue.
    Kqueue,
    /// Pipe.
    Pipe,
    /// FSEvents.
    Fsevents,
    /// Other/unknown kind.
    Other(u32),
}

impl FdType {
    /// `PROX_FDTYPE_SOCKET`.
    pub const RAW_SOCKET: u32 = 2;

    /// Parse from a raw `proc_fdtype` value.
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => Self::Vnode,
            Self::RAW_SOCKET => Self::Socket,
            3 => Self::Pshm,
            4 => Self::Psem,
            5 => Self::Kqueue,
            6 => Self::Pipe,
            7 => Self::Fsevents,
            v => Self::Other(v),
        }
    }
}

/// One entry of a process's descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Descriptor number.
    pub fd: i32,
    /// Descriptor kind.
    pub kind: FdType,
}

impl Descriptor {
    /// Create a descriptor.
    pub fn new(fd: i32, kind: FdType) -> Self {
        Self { fd, kind }
    }

    /// Create a socket descriptor.
    pub fn socket(fd: i32) -> Self {
        Self::new(fd, FdType::Socket)
    }

    /// Check if this is a socket descriptor.
    pub fn is_socket(&self) -> bool {
        self.kind == FdType::Socket
    }
}

/// Descriptor table entry (struct proc_fdinfo).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ProcFdInfo {
    /// Descriptor number.
    pub proc_fd: i32,
    /// Descriptor kind (`PROX_FDTYPE_*`).
    pub proc_fdtype: u32,
}

impl ProcFdInfo {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create an entry.
    pub fn new(fd: i32, fdtype: u32) -> Self {
        Self {
            proc_fd: fd,
            proc_fdtype: fdtype,
        }
    }

    /// Parse from the start of a byte slice.
    pub fn from_bytes(data: &[u8]) -> Option<&Self> {
        Self::ref_from_prefix(data).map(|(r, _)| r).ok()
    }

    /// Parse every whole entry of a `PROC_PIDLISTFDS` answer.
    ///
    /// A trailing partial entry is ignored.
    pub fn parse_table(data: &[u8]) -> Vec<Descriptor> {
        data.chunks_exact(Self::SIZE)
            .filter_map(Self::from_bytes)
            .map(|info| info.descriptor())
            .collect()
    }

    /// Convert to a [`Descriptor`].
    pub fn descriptor(&self) -> Descriptor {
        Descriptor::new(self.proc_fd, FdType::from_raw(self.proc_fdtype))
    }
}

/// Access to processes and their descriptors.
///
/// Only [`list_process_ids`](ProcessSource::list_process_ids) can fail the
/// snapshot. The per-process calls answer "nothing" when the process is gone
/// or not inspectable, which the pipeline treats as a skip.
pub trait ProcessSource {
    /// List the PIDs of all live processes, in no particular order.
    fn list_process_ids(&self) -> Result<Vec<Pid>>;

    /// List the open descriptors of a process.
    ///
    /// Empty when the process has exited or cannot be inspected.
    fn list_descriptors(&self, pid: Pid) -> Vec<Descriptor>;

    /// Fetch the raw `socket_fdinfo` buffer of one socket descriptor.
    fn socket_metadata(&self, pid: Pid, fd: i32) -> Option<Vec<u8>>;

    /// Get a display name for a process, `"?"` when it cannot be resolved.
    fn process_name(&self, pid: Pid) -> String;
}

impl<S: ProcessSource + ?Sized> ProcessSource for &S {
    fn list_process_ids(&self) -> Result<Vec<Pid>> {
        (**self).list_process_ids()
    }

    fn list_descriptors(&self, pid: Pid) -> Vec<Descriptor> {
        (**self).list_descriptors(pid)
    }

    fn socket_metadata(&self, pid: Pid, fd: i32) -> Option<Vec<u8>> {
        (**self).socket_metadata(pid, fd)
    }

    fn process_name(&self, pid: Pid) -> String {
        (**self).process_name(pid)
    }
}

/// List the socket descriptors of a process, in the order the OS reports
/// them.
pub fn socket_descriptors<S: ProcessSource + ?Sized>(source: &S, pid: Pid) -> Vec<i32> {
    let fds: Vec<i32> = source
        .list_descriptors(pid)
        .into_iter()
        .filter(Descriptor::is_socket)
        .map(|d| d.fd)
        .collect();
    tracing::trace!(pid, sockets = fds.len(), "walked descriptor table");
    fds
}
