//! `libproc` backed [`ProcessSource`].
//!
//! Only Apple targets have `libproc`. Elsewhere [`Libproc::new`] returns
//! [`Error::NotSupported`] so callers fail with a clear message instead of a
//! link error.

use crate::error::{Error, Result};
use crate::layout::SocketLayout;
use crate::source::{Descriptor, Pid, ProcessSource};

/// [`ProcessSource`] over the Darwin `libproc` API.
#[derive(Debug, Clone)]
pub struct Libproc {
    #[cfg_attr(not(target_vendor = "apple"), allow(dead_code))]
    metadata_size: usize,
}

impl Libproc {
    /// Create a source using the built-in socket layout.
    pub fn new() -> Result<Self> {
        Self::with_layout(&SocketLayout::darwin())
    }

    /// Create a source whose metadata buffers fit `layout`.
    pub fn with_layout(layout: &SocketLayout) -> Result<Self> {
        if !cfg!(target_vendor = "apple") {
            return Err(Error::NotSupported(
                "libproc is only available on macOS and iOS".to_string(),
            ));
        }
        Ok(Self {
            metadata_size: layout.buffer_size(),
        })
    }
}

/// Process name from an executable path: everything after the last `/`.
pub fn name_from_path(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    (!name.is_empty()).then_some(name)
}

/// Bytes up to the first NUL, as text.
#[cfg_attr(not(target_vendor = "apple"), allow(dead_code))]
fn c_text(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(target_vendor = "apple")]
mod ffi {
    use libc::{c_int, c_void};

    pub const PROC_ALL_PIDS: u32 = 1;
    pub const PROC_PIDLISTFDS: c_int = 1;
    pub const PROC_PIDFDSOCKETINFO: c_int = 3;

    /// `PROC_PIDPATHINFO_MAXSIZE`.
    pub const PATH_MAX_SIZE: usize = 4 * 1024;
    /// Name buffer size for `proc_name`.
    pub const NAME_MAX_SIZE: usize = 256;
    /// How many times a PID list is regrown before giving up.
    pub const LIST_ATTEMPTS: usize = 4;

    #[link(name = "proc", kind = "dylib")]
    unsafe extern "C" {
        pub fn proc_listpids(
            type_: u32,
            typeinfo: u32,
            buffer: *mut c_void,
            buffersize: c_int,
        ) -> c_int;

        pub fn proc_pidinfo(
            pid: c_int,
            flavor: c_int,
            arg: u64,
            buffer: *mut c_void,
            buffersize: c_int,
        ) -> c_int;

        pub fn proc_pidfdinfo(
            pid: c_int,
            fd: c_int,
            flavor: c_int,
            buffer: *mut c_void,
            buffersize: c_int,
        ) -> c_int;

        pub fn proc_pidpath(pid: c_int, buffer: *mut c_void, buffersize: u32) -> c_int;

        pub fn proc_name(pid: c_int, buffer: *mut c_void, buffersize: u32) -> c_int;
    }
}

#[cfg(target_vendor = "apple")]
impl ProcessSource for Libproc {
    fn list_process_ids(&self) -> Result<Vec<Pid>> {
        use std::mem::size_of;

        // A null query reports the size currently needed.
        let needed =
            unsafe { ffi::proc_listpids(ffi::PROC_ALL_PIDS, 0, std::ptr::null_mut(), 0) };
        if needed <= 0 {
            return Err(Error::last_enumeration_error());
        }

        let mut capacity = needed as usize / size_of::<Pid>() + 64;
        for _ in 0..ffi::LIST_ATTEMPTS {
            let mut pids: Vec<Pid> = vec![0; capacity];
            let bytes = (capacity * size_of::<Pid>()) as libc::c_int;
            let ret = unsafe {
                ffi::proc_listpids(
                    ffi::PROC_ALL_PIDS,
                    0,
                    pids.as_mut_ptr().cast(),
                    bytes,
                )
            };
            if ret <= 0 {
                return Err(Error::last_enumeration_error());
            }

            let count = ret as usize / size_of::<Pid>();
            if count < capacity {
                pids.truncate(count);
                tracing::debug!(count, "listed processes");
                return Ok(pids);
            }
            // The table grew between calls.
            capacity *= 2;
        }

        Err(Error::enumeration_failed(libc::ENOMEM))
    }

    fn list_descriptors(&self, pid: Pid) -> Vec<Descriptor> {
        use crate::source::ProcFdInfo;

        let size =
            unsafe { ffi::proc_pidinfo(pid, ffi::PROC_PIDLISTFDS, 0, std::ptr::null_mut(), 0) };
        if size <= 0 {
            tracing::debug!(pid, "cannot list descriptors");
            return Vec::new();
        }

        // Leave room for descriptors opened since the size query.
        let mut buf = vec![0u8; size as usize + 16 * ProcFdInfo::SIZE];
        let ret = unsafe {
            ffi::proc_pidinfo(
                pid,
                ffi::PROC_PIDLISTFDS,
                0,
                buf.as_mut_ptr().cast(),
                buf.len() as libc::c_int,
            )
        };
        if ret <= 0 {
            tracing::debug!(pid, "process vanished while listing descriptors");
            return Vec::new();
        }

        buf.truncate(ret as usize);
        ProcFdInfo::parse_table(&buf)
    }

    fn socket_metadata(&self, pid: Pid, fd: i32) -> Option<Vec<u8>> {
        let mut buf = vec![0u8; self.metadata_size];
        let ret = unsafe {
            ffi::proc_pidfdinfo(
                pid,
                fd,
                ffi::PROC_PIDFDSOCKETINFO,
                buf.as_mut_ptr().cast(),
                buf.len() as libc::c_int,
            )
        };
        if ret <= 0 {
            tracing::trace!(pid, fd, "no socket info");
            return None;
        }

        buf.truncate(ret as usize);
        Some(buf)
    }

    fn process_name(&self, pid: Pid) -> String {
        let mut path = vec![0u8; ffi::PATH_MAX_SIZE];
        let ret =
            unsafe { ffi::proc_pidpath(pid, path.as_mut_ptr().cast(), path.len() as u32) };
        if ret > 0 {
            let path = c_text(&path);
            if let Some(name) = name_from_path(&path) {
                return name.to_string();
            }
        }

        let mut name = [0u8; ffi::NAME_MAX_SIZE];
        let ret = unsafe { ffi::proc_name(pid, name.as_mut_ptr().cast(), name.len() as u32) };
        if ret > 0 {
            let name = c_text(&name);
            if !name.is_empty() {
                return name;
            }
        }

        "?".to_string()
    }
}

#[cfg(not(target_vendor = "apple"))]
impl ProcessSource for Libproc {
    fn list_process_ids(&self) -> Result<Vec<Pid>> {
        Err(Error::NotSupported("libproc".to_string()))
    }

    fn list_descriptors(&self, _pid: Pid) -> Vec<Descriptor> {
        Vec::new()
    }

    fn socket_metadata(&self, _pid: Pid, _fd: i32) -> Option<Vec<u8>> {
        None
    }

    fn process_name(&self, _pid: Pid) -> String {
        "?".to_string()
    }
}
