//! Socket inventory for Darwin/XNU systems.
//!
//! This crate provides the discovery pipeline behind an `ss`-style tool on
//! macOS and iOS. There is no `NETLINK_SOCK_DIAG` on Darwin, so sockets are
//! found the way `lsof` finds them: walk every process, list its open
//! descriptors through `libproc`, and decode the `socket_fdinfo` buffer the
//! kernel hands back for each socket descriptor.
//!
//! # Pipeline
//!
//! - [`ProcessSource`] - the OS collaborator (PIDs, descriptors, buffers, names)
//! - [`decode()`] - turns one metadata buffer into a [`SocketRecord`]
//! - [`Filter`] - decides which records the caller asked for
//! - [`SocketSet`] - folds records from shared descriptors into one entry
//! - [`Summary`] - per-protocol and per-state counters
//!
//! [`Collector`] drives the whole thing.
//!
//! # Example
//!
//! ```ignore
//! use procsock::{CallerConfig, Collector, Libproc};
//!
//! let config = CallerConfig {
//!     tcp: true,
//!     listening: true,
//!     ..Default::default()
//! };
//!
//! let collector = Collector::new(Libproc::new()?, &config);
//! for sock in collector.collect()?.iter() {
//!     println!("{} {} {}", sock.protocol.netid(), sock.local_address, sock.remote_address);
//! }
//! ```
//!
//! # Layout drift
//!
//! The `socket_fdinfo` layout is versioned with the OS and only partly
//! documented. Offsets live in [`SocketLayout`], which can be loaded from a
//! JSON file, and the local port has a probe-based recovery path when the
//! structured read does not produce a plausible value.

pub mod collect;
pub mod decode;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod layout;
pub mod libproc;
pub mod portmap;
pub mod record;
pub mod source;
pub mod stats;
pub mod types;

pub use collect::Collector;
pub use decode::{DecodeError, decode};
pub use dedup::{IdentityKey, SocketSet};
pub use error::{Error, Result};
pub use filter::{CallerConfig, Filter, Gate};
pub use layout::{PortProbe, SocketLayout};
pub use libproc::Libproc;
pub use portmap::{PortMap, PortOwner};
pub use record::{AddressStyle, SocketRecord};
pub use source::{Descriptor, FdType, Pid, ProcessSource, socket_descriptors};
pub use stats::Summary;
pub use types::{AddressFamily, Protocol, TcpState};
