//! Physical layout of `kexec_load` segments.

use std::io;

pub const PAGE_SIZE: u64 = 4096;

/// Default physical address of the first segment (16 MiB).
pub const DEFAULT_LOAD_BASE: u64 = 0x0100_0000;

/// Where one segment lands in physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub mem: u64,
    pub memsz: u64,
}

/// Round `value` up to a multiple of `align`, a power of two.
pub fn align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    Some(value.checked_add(align - 1)? & !(align - 1))
}

/// Lay out regions of the given memory sizes back to back from `base`.
///
/// Every segment starts on a page boundary and `memsz` is a whole number
/// of pages, as the kernel requires. Empty regions get `memsz == 0`.
pub fn plan_segments(base: u64, lens: &[u64]) -> io::Result<Vec<Placement>> {
    let overflow = || io::Error::new(io::ErrorKind::InvalidInput, "segments overflow the address space");

    let mut next = align_up(base, PAGE_SIZE).ok_or_else(overflow)?;
    let mut out = Vec::with_capacity(lens.len());
    for &len in lens {
        let memsz = align_up(len, PAGE_SIZE).ok_or_else(overflow)?;
        out.push(Placement { mem: next, memsz });
        next = next.checked_add(memsz).ok_or_else(overflow)?;
    }
    Ok(out)
}
