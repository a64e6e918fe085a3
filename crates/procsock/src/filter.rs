//! Record selection.
//!
//! [`CallerConfig`] is what the user asked for; [`Filter`] is the resolved
//! form used on every record. Resolving happens once, so the per-record
//! check never has to reason about defaults.

use crate::record::{AddressStyle, SocketRecord};
use crate::types::{AddressFamily, Protocol, TcpState};
use serde::{Deserialize, Serialize};

/// Caller selection options.
///
/// Mirrors the `ss` command line: protocol selection, state selection,
/// family selection and presentation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallerConfig {
    /// Show TCP sockets.
    pub tcp: bool,
    /// Show UDP sockets.
    pub udp: bool,
    /// Show Unix domain sockets.
    pub unix: bool,
    /// Show only listening sockets.
    pub listening: bool,
    /// Show sockets in every state.
    pub all: bool,
    /// Render unspecified addresses literally.
    pub numeric: bool,
    /// Attach the owning process name.
    pub processes: bool,
    /// Only IPv4 sockets (Unix sockets unaffected).
    pub ipv4_only: bool,
    /// Only IPv6 sockets (Unix sockets unaffected).
    pub ipv6_only: bool,
}

impl CallerConfig {
    /// Check if any protocol was explicitly selected.
    pub fn has_protocol(&self) -> bool {
        self.tcp || self.udp || self.unix
    }
}

/// One inclusion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    /// The record's protocol was selected.
    Protocol,
    /// Listening-only selection.
    Listening,
    /// Transient TCP states are hidden unless asked for.
    DefaultState,
    /// IPv4-only / IPv6-only selection.
    Family,
}

impl Gate {
    /// Every gate, in evaluation order.
    pub const ALL: [Gate; 4] = [
        Self::Protocol,
        Self::Listening,
        Self::DefaultState,
        Self::Family,
    ];
}

/// Resolved record filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    tcp: bool,
    udp: bool,
    unix: bool,
    listening: bool,
    all: bool,
    ipv4_only: bool,
    ipv6_only: bool,
    style: AddressStyle,
    processes: bool,
}

impl Filter {
    /// Resolve a caller configuration.
    ///
    /// With no protocol selected, TCP and UDP are shown and Unix sockets
    /// are not.
    pub fn new(config: &CallerConfig) -> Self {
        let (tcp, udp, unix) = if config.has_protocol() {
            (config.tcp, config.udp, config.unix)
        } else {
            (true, true, false)
        };

        Self {
            tcp,
            udp,
            unix,
            listening: config.listening,
            all: config.all,
            ipv4_only: config.ipv4_only,
            ipv6_only: config.ipv6_only,
            style: if config.numeric {
                AddressStyle::Numeric
            } else {
                AddressStyle::Wildcard
            },
            processes: config.processes,
        }
    }

    /// How the decoder should render unspecified addresses.
    pub fn style(&self) -> AddressStyle {
        self.style
    }

    /// Whether records get a process name.
    pub fn wants_processes(&self) -> bool {
        self.processes
    }

    /// Check if the protocol is selected.
    pub fn selects(&self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::Tcp => self.tcp,
            Protocol::Udp => self.udp,
            Protocol::UnixStream | Protocol::UnixDgram => self.unix,
            Protocol::Unknown => false,
        }
    }

    /// Decide whether a record is shown.
    pub fn include(&self, record: &SocketRecord) -> bool {
        Gate::ALL.iter().all(|&gate| self.passes(gate, record))
    }

    /// Evaluate a single gate.
    ///
    /// Gates do not depend on each other, so they can be checked in any
    /// order.
    pub fn passes(&self, gate: Gate, record: &SocketRecord) -> bool {
        match gate {
            Gate::Protocol => self.selects(record.protocol),
            Gate::Listening => {
                if !self.listening {
                    return true;
                }
                match record.protocol {
                    Protocol::Tcp => record.state == TcpState::Listen,
                    Protocol::Udp => record.remote_port == 0,
                    _ => true,
                }
            }
            Gate::DefaultState => {
                if self.all || self.listening || record.protocol != Protocol::Tcp {
                    return true;
                }
                matches!(record.state, TcpState::Established | TcpState::Listen)
            }
            Gate::Family => match record.family {
                AddressFamily::Inet => !self.ipv6_only,
                AddressFamily::Inet6 => !self.ipv4_only,
                _ => true,
            },
        }
    }
}

impl From<&CallerConfig> for Filter {
    fn from(config: &CallerConfig) -> Self {
        Self::new(config)
    }
}
