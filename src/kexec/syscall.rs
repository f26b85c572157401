//! The real kexec backend.

use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

use memmap2::Mmap;

use super::kernel::KernelLayout;
use super::segments::{align_up, plan_segments};
use super::{Kexec, KexecOptions};

/// `struct kexec_segment` from `<linux/kexec.h>`.
#[repr(C)]
struct RawSegment {
    buf: *const libc::c_void,
    bufsz: libc::size_t,
    mem: libc::c_ulong,
    memsz: libc::size_t,
}

/// Issues the kexec syscalls against the running kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxKexec;

fn cmdline_cstring(cmdline: &str) -> io::Result<CString> {
    CString::new(cmdline).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

fn check(rc: libc::c_long) -> io::Result<()> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Map a materialized file read-only. Empty files have nothing to map.
fn map_file(file: &File) -> io::Result<Option<Mmap>> {
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    // SAFETY: materialized files are read-only and nothing holds them open
    // for writing, so the mapping cannot change underneath us.
    let map = unsafe { Mmap::map(file)? };
    Ok(Some(map))
}

impl Kexec for LinuxKexec {
    fn load(
        &self,
        kernel: &File,
        initrd: Option<&File>,
        cmdline: &str,
        opts: &KexecOptions,
    ) -> io::Result<()> {
        let kernel_map = map_file(kernel)?
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "kernel image is empty"))?;
        let layout = KernelLayout::parse(&kernel_map)?;
        layout.check_arch(std::env::consts::ARCH)?;

        let initrd_map = match initrd {
            Some(f) => map_file(f)?,
            None => None,
        };
        let cmdline = cmdline_cstring(cmdline)?;

        // `parse` guarantees `skip` is inside the image.
        let mut bufs: Vec<&[u8]> = vec![&kernel_map[layout.skip as usize..]];
        if let Some(map) = &initrd_map {
            bufs.push(&map[..]);
        }
        bufs.push(cmdline.as_bytes_with_nul());

        let mut sizes: Vec<u64> = bufs.iter().map(|b| b.len() as u64).collect();
        sizes[0] = sizes[0].max(layout.mem_size);
        let base = align_up(opts.load_base, layout.align)
            .and_then(|base| base.checked_add(layout.load_offset))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "load base overflows"))?;
        let plan = plan_segments(base, &sizes)?;

        let segments: Vec<RawSegment> = bufs
            .iter()
            .zip(&plan)
            .map(|(buf, placement)| RawSegment {
                buf: buf.as_ptr().cast(),
                bufsz: buf.len(),
                mem: placement.mem as libc::c_ulong,
                memsz: placement.memsz as libc::size_t,
            })
            .collect();

        let entry = match opts.entry {
            Some(entry) => entry,
            None => plan[0]
                .mem
                .checked_add(layout.entry)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "entry overflows"))?,
        };

        // SAFETY: every segment points into a mapping or CString that
        // outlives the call.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_kexec_load,
                entry as libc::c_ulong,
                segments.len() as libc::c_ulong,
                segments.as_ptr(),
                opts.flags as libc::c_ulong,
            )
        };
        check(rc)
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64"))]
    fn file_load(&self, kernel: &File, initrd: Option<&File>, cmdline: &str) -> io::Result<()> {
        let cmdline = cmdline_cstring(cmdline)?;
        let (initrd_fd, flags) = match initrd {
            Some(f) => (f.as_raw_fd(), 0),
            None => (-1, super::KEXEC_FILE_NO_INITRAMFS),
        };

        // SAFETY: descriptors are live for the duration of the call and the
        // length covers the trailing NUL.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_kexec_file_load,
                kernel.as_raw_fd(),
                initrd_fd,
                cmdline.as_bytes_with_nul().len() as libc::c_ulong,
                cmdline.as_ptr(),
                flags,
            )
        };
        check(rc)
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")))]
    fn file_load(&self, _kernel: &File, _initrd: Option<&File>, _cmdline: &str) -> io::Result<()> {
        Err(io::Error::from_raw_os_error(libc::ENOSYS))
    }

    fn execute(&self) -> io::Result<()> {
        // SAFETY: reboot(2) takes no pointers.
        let rc = unsafe { libc::reboot(libc::LINUX_REBOOT_CMD_KEXEC) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
