//! kexec syscall layer.
//!
//! Two strategies hand a materialized image to the running kernel:
//! - [`Strategy::DirectLoad`] - `kexec_load(2)`, segments built in userspace
//!   from a recognised kernel header, takes the full [`KexecOptions`]
//! - [`Strategy::FileLoad`] - `kexec_file_load(2)`, the kernel parses the
//!   image itself; only kernel, initrd and command line apply
//!
//! The caller picks one. There is no fallback between them.
//!
//! [`Kexec`] is the seam between image preparation and the syscalls, so the
//! real [`LinuxKexec`] backend can be swapped for a recording one in tests.

pub mod kernel;
pub mod segments;
mod syscall;

use std::fmt;
use std::fs::File;
use std::io;

use crate::source::{describe, SharedSource};

pub use kernel::{KernelFormat, KernelLayout};
pub use segments::{align_up, plan_segments, Placement, DEFAULT_LOAD_BASE, PAGE_SIZE};
pub use syscall::LinuxKexec;

/// `kexec_file_load` flag: no initrd descriptor is passed.
pub const KEXEC_FILE_NO_INITRAMFS: libc::c_ulong = 0x4;

/// Which syscall path a load takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    DirectLoad,
    FileLoad,
}

impl Strategy {
    pub fn from_load_syscall(load_syscall: bool) -> Self {
        if load_syscall {
            Strategy::DirectLoad
        } else {
            Strategy::FileLoad
        }
    }

    pub fn syscall_name(self) -> &'static str {
        match self {
            Strategy::DirectLoad => "kexec_load",
            Strategy::FileLoad => "kexec_file_load",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.syscall_name())
    }
}

/// Options for the direct-load path.
#[derive(Clone)]
pub struct KexecOptions {
    /// Device tree blob. Appended to the initrd before materialization.
    pub device_tree: Option<SharedSource>,
    /// Extra `KEXEC_*` flags passed to `kexec_load`.
    pub flags: u64,
    /// Physical address of the first segment.
    pub load_base: u64,
    /// Entry point; defaults to the one in the kernel header.
    pub entry: Option<u64>,
}

impl Default for KexecOptions {
    fn default() -> Self {
        Self {
            device_tree: None,
            flags: 0,
            load_base: DEFAULT_LOAD_BASE,
            entry: None,
        }
    }
}

impl fmt::Display for KexecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dtb = self
            .device_tree
            .as_ref()
            .map(|d| describe(d.as_ref()))
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "{{dtb: {}, flags: {:#x}, load_base: {:#x}, entry: ",
            dtb, self.flags, self.load_base
        )?;
        match self.entry {
            Some(entry) => write!(f, "{:#x}}}", entry),
            None => f.write_str("kernel}"),
        }
    }
}

impl fmt::Debug for KexecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The kexec syscalls.
pub trait Kexec {
    /// `kexec_load(2)` with the full option set.
    fn load(
        &self,
        kernel: &File,
        initrd: Option<&File>,
        cmdline: &str,
        opts: &KexecOptions,
    ) -> io::Result<()>;

    /// `kexec_file_load(2)`.
    fn file_load(&self, kernel: &File, initrd: Option<&File>, cmdline: &str) -> io::Result<()>;

    /// Jump into the loaded image. Does not return on success.
    fn execute(&self) -> io::Result<()>;
}
