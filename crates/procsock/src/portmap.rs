//! Port to process mapping (`ss_proc`).
//!
//! A cut-down pass over the process table that only recovers the local port
//! of each IP socket and remembers who owns it. `launchd` opens listening
//! sockets on behalf of the daemons it starts, so it only keeps a port when
//! no other process holds it.

use crate::decode::local_port;
use crate::error::Result;
use crate::layout::SocketLayout;
use crate::source::{Pid, ProcessSource, socket_descriptors};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Longest command name kept (`MAXCOMLEN`).
pub const MAX_COMMAND_LEN: usize = 16;

const LAUNCHD: &str = "launchd";

/// Owner of one local port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortOwner {
    /// Local port.
    pub port: u16,
    /// Owning process.
    pub pid: Pid,
    /// Descriptor in that process.
    pub fd: i32,
    /// Command name, at most [`MAX_COMMAND_LEN`] bytes.
    pub command: String,
    /// Whether the owner is `launchd`.
    pub is_launchd: bool,
}

impl PortOwner {
    /// Create an owner entry, truncating the command name.
    pub fn new(port: u16, pid: Pid, fd: i32, command: &str) -> Self {
        Self {
            port,
            pid,
            fd,
            command: truncate_command(command).to_string(),
            is_launchd: command == LAUNCHD,
        }
    }

    /// Check if this owner should replace `current` for the same port.
    pub fn supersedes(&self, current: &PortOwner) -> bool {
        current.is_launchd && !self.is_launchd
    }
}

impl fmt::Display for PortOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.port, self.command, self.pid, self.fd)
    }
}

/// Local ports and their owners, in ascending port order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMap {
    owners: BTreeMap<u16, PortOwner>,
}

impl PortMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every process of `source`.
    pub fn build<S: ProcessSource + ?Sized>(source: &S, layout: &SocketLayout) -> Result<Self> {
        let mut map = Self::new();
        for pid in source.list_process_ids()? {
            if pid == 0 {
                continue;
            }

            let mut command: Option<String> = None;
            for fd in socket_descriptors(source, pid) {
                let Some(buf) = source.socket_metadata(pid, fd) else {
                    continue;
                };
                let Some(port) = local_port(&buf, layout) else {
                    tracing::trace!(pid, fd, "no local port");
                    continue;
                };
                let command = command.get_or_insert_with(|| source.process_name(pid));
                map.insert(PortOwner::new(port, pid, fd, command));
            }
        }
        tracing::debug!(ports = map.len(), "port map built");
        Ok(map)
    }

    /// Record an owner; returns `true` if it was kept.
    ///
    /// The first owner of a port stays unless it is `launchd` and the new
    /// one is not.
    pub fn insert(&mut self, owner: PortOwner) -> bool {
        match self.owners.get(&owner.port) {
            Some(current) if !owner.supersedes(current) => false,
            _ => {
                self.owners.insert(owner.port, owner);
                true
            }
        }
    }

    /// Get the owner of a port.
    pub fn get(&self, port: u16) -> Option<&PortOwner> {
        self.owners.get(&port)
    }

    /// Iterate in ascending port order.
    pub fn iter(&self) -> impl Iterator<Item = &PortOwner> {
        self.owners.values()
    }

    /// Number of ports.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Check if no port was found.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// One `port cmd pid fd` line per port.
    pub fn lines(&self) -> Vec<String> {
        self.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for PortMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for owner in self.iter() {
            writeln!(f, "{}", owner)?;
        }
        Ok(())
    }
}

fn truncate_command(command: &str) -> &str {
    if command.len() <= MAX_COMMAND_LEN {
        return command;
    }
    let mut end = MAX_COMMAND_LEN;
    while !command.is_char_boundary(end) {
        end -= 1;
    }
    &command[..end]
}
