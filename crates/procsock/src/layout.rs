//! Byte layout of the `socket_fdinfo` buffer.
//!
//! `proc_pidfdinfo(PROC_PIDFDSOCKETINFO)` fills a `struct socket_fdinfo`
//! whose shape is versioned with the kernel and only partially documented.
//! Rather than casting the buffer to a `#[repr(C)]` mirror of the struct,
//! the decoder reads every field through the offsets in [`SocketLayout`].
//! A new OS release that moves fields around can then be handled with a
//! layout file instead of a rebuild.
//!
//! # Built-in layout
//!
//! [`SocketLayout::darwin()`] describes the 792-byte structure used by
//! current macOS and iOS (64-bit):
//!
//! ```text
//! 0    proc_fileinfo          24 bytes
//! 24   socket_info
//!      24   soi_stat          vinfo_stat, 136 bytes (vst_ino @ 32, vst_uid @ 40)
//!      160  soi_so, soi_pcb
//!      176  soi_type, soi_protocol, soi_family
//!      208  soi_rcv            sockbuf_info, sbi_cc first
//!      232  soi_snd
//!      256  soi_kind
//!      264  soi_proto          in_sockinfo / tcp_sockinfo / un_sockinfo
//! ```
//!
//! # Layout files
//!
//! ```json
//! { "in_lport": 270, "port_probes": [{ "offset": 268, "width": 2 }] }
//! ```
//!
//! Fields left out of the file keep their built-in value.
//!
//! # Port probes
//!
//! Each built-in layout only probes offsets that cannot hold another field
//! of the struct it describes. A probe that lands on, say, a generation
//! counter would turn every unbound socket into one with an invented port.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on the number of port probes a layout may carry.
///
/// Keeps the recovery path a constant amount of work per descriptor.
pub const MAX_PORT_PROBES: usize = 8;

/// One alternative location of the local port inside the raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortProbe {
    /// Byte offset from the start of the buffer.
    pub offset: usize,
    /// Field width in bytes: 2 for a bare big-endian port, 4 for an `int`
    /// carrying the port in network order (as `insi_lport` does).
    #[serde(default = "PortProbe::default_width")]
    pub width: usize,
}

impl PortProbe {
    /// Create a probe for a big-endian 16-bit port.
    pub const fn be16(offset: usize) -> Self {
        Self { offset, width: 2 }
    }

    fn default_width() -> usize {
        2
    }

    /// Read the candidate port, `None` if the buffer is too short or the
    /// width is not one this probe understands.
    pub fn extract(&self, buf: &[u8]) -> Option<u16> {
        match self.width {
            2 => read_be_u16(buf, self.offset),
            4 => read_port_int(buf, self.offset),
            _ => None,
        }
    }
}

/// Field offsets inside a `socket_fdinfo` buffer.
///
/// All offsets are absolute, counted from the first byte of the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketLayout {
    /// `soi_stat.vst_ino` (u64).
    pub stat_ino: usize,
    /// `soi_stat.vst_uid` (u32).
    pub stat_uid: usize,
    /// `soi_type` (i32).
    pub soi_type: usize,
    /// `soi_protocol` (i32).
    pub soi_protocol: usize,
    /// `soi_family` (i32).
    pub soi_family: usize,
    /// `soi_rcv.sbi_cc` (u32).
    pub rcv_cc: usize,
    /// `soi_snd.sbi_cc` (u32).
    pub snd_cc: usize,
    /// `soi_kind` (i32).
    pub soi_kind: usize,
    /// `in_sockinfo.insi_fport` (int, port in network order).
    pub in_fport: usize,
    /// `in_sockinfo.insi_lport` (int, port in network order).
    pub in_lport: usize,
    /// `in_sockinfo.insi_faddr` (16-byte `in_addr_4_6`).
    pub in_faddr: usize,
    /// `in_sockinfo.insi_laddr` (16-byte `in_addr_4_6`).
    pub in_laddr: usize,
    /// Offset of the IPv4 address inside an `in_addr_4_6`.
    pub in4_in_addr46: usize,
    /// `tcp_sockinfo.tcpsi_state` (i32).
    pub tcp_state: usize,
    /// `un_sockinfo.unsi_conn_so` (u64, non-zero when connected).
    pub un_conn_so: usize,
    /// `un_sockinfo.unsi_addr.ua_sun.sun_path`.
    pub un_path: usize,
    /// Capacity of `sun_path`.
    pub un_path_len: usize,
    /// Where to look for the local port when `in_lport` reads 0 or 65535,
    /// in order.
    pub port_probes: Vec<PortProbe>,
}

impl Default for SocketLayout {
    fn default() -> Self {
        Self::darwin()
    }
}

impl SocketLayout {
    /// Built-in layout for the 792-byte `socket_fdinfo` of current macOS/iOS.
    pub fn darwin() -> Self {
        Self {
            stat_ino: 32,
            stat_uid: 40,
            soi_type: 176,
            soi_protocol: 180,
            soi_family: 184,
            rcv_cc: 208,
            snd_cc: 232,
            soi_kind: 256,
            in_fport: 264,
            in_lport: 268,
            in_faddr: 296,
            in_laddr: 312,
            in4_in_addr46: 12,
            tcp_state: 344,
            un_conn_so: 264,
            un_path: 282,
            un_path_len: 104,
            // Upper half of the insi_lport int. Zero unless the port was
            // stored as a bare big-endian short at the end of the field.
            port_probes: vec![PortProbe::be16(0x10e)],
        }
    }

    /// Built-in layout for iOS 13 era kernels, where the structured
    /// `insi_lport` read is unreliable.
    ///
    /// Same offsets as [`darwin()`](Self::darwin) with the wider probe list
    /// observed on those releases. On current macOS `0x110` is
    /// `insi_gencnt`, so this layout must not be used there.
    pub fn ios13() -> Self {
        Self {
            port_probes: vec![
                PortProbe::be16(0x10a),
                PortProbe::be16(0x10e),
                PortProbe::be16(0x110),
                PortProbe::be16(0x108),
            ],
            ..Self::darwin()
        }
    }

    /// Look up a built-in layout by name (`darwin` or `ios13`).
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "darwin" => Some(Self::darwin()),
            "ios13" => Some(Self::ios13()),
            _ => None,
        }
    }

    /// Resolve a `--layout` argument: a built-in name, or else a JSON file.
    pub fn load(arg: impl AsRef<Path>) -> Result<Self> {
        let path = arg.as_ref();
        match path.to_str().and_then(Self::builtin) {
            Some(layout) => Ok(layout),
            None => Self::from_path(path),
        }
    }

    /// Size of the buffer this layout expects the kernel to fill.
    pub fn buffer_size(&self) -> usize {
        // sizeof(struct socket_fdinfo)
        792
    }

    /// Load a layout from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a layout from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let layout: Self = serde_json::from_str(text)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Check that the layout can be used for decoding.
    pub fn validate(&self) -> Result<()> {
        if self.port_probes.len() > MAX_PORT_PROBES {
            return Err(Error::Layout(format!(
                "{} port probes, at most {} allowed",
                self.port_probes.len(),
                MAX_PORT_PROBES
            )));
        }
        if let Some(probe) = self.port_probes.iter().find(|p| !matches!(p.width, 2 | 4)) {
            return Err(Error::Layout(format!(
                "port probe at offset {} has width {}, expected 2 or 4",
                probe.offset, probe.width
            )));
        }
        if self.in4_in_addr46 + 4 > 16 {
            return Err(Error::Layout(format!(
                "IPv4 offset {} does not fit in a 16-byte address",
                self.in4_in_addr46
            )));
        }
        if self.un_path_len == 0 {
            return Err(Error::Layout("sun_path capacity is zero".to_string()));
        }
        Ok(())
    }
}

/// Read `N` bytes at `offset`, `None` past the end of the buffer.
pub fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    buf.get(offset..offset.checked_add(N)?)?.try_into().ok()
}

/// Read a host-order i32.
pub fn read_i32(buf: &[u8], offset: usize) -> Option<i32> {
    read_array(buf, offset).map(i32::from_ne_bytes)
}

/// Read a host-order u32.
pub fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    read_array(buf, offset).map(u32::from_ne_bytes)
}

/// Read a host-order u64.
pub fn read_u64(buf: &[u8], offset: usize) -> Option<u64> {
    read_array(buf, offset).map(u64::from_ne_bytes)
}

/// Read a big-endian u16.
pub fn read_be_u16(buf: &[u8], offset: usize) -> Option<u16> {
    read_array(buf, offset).map(u16::from_be_bytes)
}

/// Read a port stored the way the kernel stores `insi_lport`/`insi_fport`:
/// a host-order `int` whose low 16 bits hold the port in network order.
pub fn read_port_int(buf: &[u8], offset: usize) -> Option<u16> {
    read_i32(buf, offset).map(|v| u16::from_be(v as u16))
}
