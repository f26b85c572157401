//! Kernel image formats the direct-load path can place in memory.
//!
//! `kexec_load` copies segments verbatim and jumps to an address, so the
//! image has to be recognised up front: where its loadable part starts,
//! how much memory it claims once running, and where it is entered.
//! Anything else is rejected before the syscall.

use std::io;

const BZIMAGE_SETUP_SECTS: usize = 0x1f1;
const BZIMAGE_BOOT_FLAG: usize = 0x1fe;
const BZIMAGE_HEADER: usize = 0x202;
const BZIMAGE_VERSION: usize = 0x206;
const BZIMAGE_KERNEL_ALIGNMENT: usize = 0x230;
const BZIMAGE_XLOADFLAGS: usize = 0x236;
const BZIMAGE_INIT_SIZE: usize = 0x260;

/// Boot protocol 2.12 introduced `xloadflags`.
const BZIMAGE_MIN_VERSION: u16 = 0x020c;
const XLF_KERNEL_64: u16 = 1 << 0;
/// `startup_64`, relative to the protected-mode kernel.
const BZIMAGE_ENTRY_64: u64 = 0x200;
const SECTOR_SIZE: u64 = 512;

const ARM64_TEXT_OFFSET: usize = 0x08;
const ARM64_IMAGE_SIZE: usize = 0x10;
const ARM64_MAGIC_OFFSET: usize = 0x38;
/// "ARM\x64", little endian.
const ARM64_MAGIC: u32 = 0x644d_5241;
const ARM64_ALIGN: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelFormat {
    /// x86 bzImage with a 64-bit entry point.
    BzImage,
    /// arm64 `Image`.
    Arm64Image,
}

impl KernelFormat {
    /// `std::env::consts::ARCH` of machines that boot this format.
    pub fn arch(self) -> &'static str {
        match self {
            KernelFormat::BzImage => "x86_64",
            KernelFormat::Arm64Image => "aarch64",
        }
    }
}

/// Where and how a kernel image is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelLayout {
    pub format: KernelFormat,
    /// Leading bytes of the file that are not loaded.
    pub skip: u64,
    /// Required alignment of the load address.
    pub align: u64,
    /// Distance of the image from the aligned load address.
    pub load_offset: u64,
    /// Memory the running image occupies, never less than the loaded bytes.
    pub mem_size: u64,
    /// Entry point relative to the loaded image.
    pub entry: u64,
}

fn bytes<const N: usize>(image: &[u8], offset: usize) -> Option<[u8; N]> {
    image.get(offset..offset + N)?.try_into().ok()
}

fn le_u16(image: &[u8], offset: usize) -> Option<u16> {
    bytes(image, offset).map(u16::from_le_bytes)
}

fn le_u32(image: &[u8], offset: usize) -> Option<u32> {
    bytes(image, offset).map(u32::from_le_bytes)
}

fn le_u64(image: &[u8], offset: usize) -> Option<u64> {
    bytes(image, offset).map(u64::from_le_bytes)
}

fn unbootable(reason: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason.into())
}

fn truncated() -> io::Error {
    unbootable("kernel image header is truncated")
}

impl KernelLayout {
    /// Recognise `image` from its header.
    pub fn parse(image: &[u8]) -> io::Result<Self> {
        if le_u16(image, BZIMAGE_BOOT_FLAG) == Some(0xaa55)
            && image.get(BZIMAGE_HEADER..BZIMAGE_HEADER + 4) == Some(&b"HdrS"[..])
        {
            return parse_bzimage(image);
        }
        if le_u32(image, ARM64_MAGIC_OFFSET) == Some(ARM64_MAGIC) {
            return parse_arm64(image);
        }
        Err(unbootable(
            "kernel is neither a bzImage nor an arm64 Image; kexec_load cannot boot it",
        ))
    }

    /// Reject an image built for a different machine.
    pub fn check_arch(&self, arch: &str) -> io::Result<()> {
        if self.format.arch() == arch {
            Ok(())
        } else {
            Err(unbootable(format!(
                "{:?} kernel cannot boot on {}",
                self.format, arch
            )))
        }
    }
}

fn parse_bzimage(image: &[u8]) -> io::Result<KernelLayout> {
    let version = le_u16(image, BZIMAGE_VERSION).ok_or_else(truncated)?;
    if version < BZIMAGE_MIN_VERSION {
        return Err(unbootable(format!(
            "bzImage boot protocol {}.{:02} is too old",
            version >> 8,
            version & 0xff
        )));
    }

    let xloadflags = le_u16(image, BZIMAGE_XLOADFLAGS).ok_or_else(truncated)?;
    if xloadflags & XLF_KERNEL_64 == 0 {
        return Err(unbootable("bzImage has no 64-bit entry point"));
    }

    let align = u64::from(le_u32(image, BZIMAGE_KERNEL_ALIGNMENT).ok_or_else(truncated)?);
    if !align.is_power_of_two() {
        return Err(unbootable(format!("bzImage kernel_alignment {:#x} is not a power of two", align)));
    }

    let setup_sects = match image[BZIMAGE_SETUP_SECTS] {
        0 => 4,
        n => u64::from(n),
    };
    let skip = (setup_sects + 1) * SECTOR_SIZE;
    let total = image.len() as u64;
    if skip >= total {
        return Err(truncated());
    }

    let init_size = u64::from(le_u32(image, BZIMAGE_INIT_SIZE).ok_or_else(truncated)?);
    Ok(KernelLayout {
        format: KernelFormat::BzImage,
        skip,
        align,
        load_offset: 0,
        mem_size: init_size.max(total - skip),
        entry: BZIMAGE_ENTRY_64,
    })
}

fn parse_arm64(image: &[u8]) -> io::Result<KernelLayout> {
    let text_offset = le_u64(image, ARM64_TEXT_OFFSET).ok_or_else(truncated)?;
    let image_size = le_u64(image, ARM64_IMAGE_SIZE).ok_or_else(truncated)?;
    if image_size == 0 {
        // Pre-3.17 kernels leave these fields unset.
        return Err(unbootable("arm64 Image does not declare its size"));
    }
    if text_offset % super::PAGE_SIZE != 0 {
        return Err(unbootable(format!("arm64 text_offset {:#x} is not page aligned", text_offset)));
    }

    Ok(KernelLayout {
        format: KernelFormat::Arm64Image,
        skip: 0,
        align: ARM64_ALIGN,
        load_offset: text_offset,
        mem_size: image_size.max(image.len() as u64),
        entry: 0,
    })
}
