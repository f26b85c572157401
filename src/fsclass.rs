//! Filesystem classification for the zero-copy fast path.
//!
//! kexec is only handed a file in place when it lives on a memory-backed
//! filesystem and nobody, including us, holds it open for writing.

use std::ffi::CString;
use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// `f_type` reported by statfs(2) for tmpfs.
pub const TMPFS_MAGIC: u32 = 0x0102_1994;
/// `f_type` reported by statfs(2) for ramfs.
pub const RAMFS_MAGIC: u32 = 0x8584_58f6;

/// Access mode of an open file description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    fn from_flags(flags: libc::c_int) -> Self {
        match flags & libc::O_ACCMODE {
            libc::O_WRONLY => AccessMode::WriteOnly,
            libc::O_RDWR => AccessMode::ReadWrite,
            _ => AccessMode::ReadOnly,
        }
    }

    pub fn includes_write(self) -> bool {
        !matches!(self, AccessMode::ReadOnly)
    }
}

/// Returns true if `fs_type` names tmpfs or ramfs.
pub fn is_memory_fs_type(fs_type: u32) -> bool {
    fs_type == TMPFS_MAGIC || fs_type == RAMFS_MAGIC
}

/// Returns true if `path` resides on tmpfs or ramfs.
pub fn is_memory_backed(path: &Path) -> io::Result<bool> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut buf = MaybeUninit::<libc::statfs>::uninit();

    // SAFETY: c_path is NUL-terminated and buf is valid for writes.
    let rc = unsafe { libc::statfs(c_path.as_ptr(), buf.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: statfs succeeded, so it initialized buf.
    let buf = unsafe { buf.assume_init() };

    // f_type width and signedness differ between targets; the magics fit in 32 bits.
    #[allow(clippy::unnecessary_cast)]
    let fs_type = buf.f_type as u32;
    Ok(is_memory_fs_type(fs_type))
}

/// Access mode of the open file description behind `fd`.
pub fn access_mode(fd: impl AsFd) -> io::Result<AccessMode> {
    let raw = fd.as_fd().as_raw_fd();
    // SAFETY: F_GETFL takes no argument and raw is a live descriptor.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(AccessMode::from_flags(flags))
}
