/*!
Decoding of single page table entries.

Directory and table entries share one generic shape, only the word width and the bit
layout differ between architectures and levels.
*/

use crate::architecture::Endianess;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::PhysicalMemory;
use crate::types::Address;

use std::fmt;

bitflags! {
    #[cfg_attr(feature = "serde", derive(::serde::Serialize))]
    pub struct PteFlags: u8 {
        const VALID = 0b0000_0001;
        const LARGE_PAGE = 0b0000_0010;
    }
}

/// Bit layout of one level of page table entries.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PteLayout {
    /// size of an entry in bytes.
    pub width: usize,
    /// bits that have to be set for the entry to be valid.
    pub valid_mask: u64,
    /// bits holding the page aligned frame address.
    pub frame_mask: u64,
    /// bit marking an entry that maps a large page directly, zero if the level has none.
    pub large_page_mask: u64,
    /// frame bits of a large page entry.
    pub large_frame_mask: u64,
}

impl PteLayout {
    /// Splits a raw entry word into its validity, large page flag and frame address.
    pub fn decode(&self, raw: u64) -> PageTableEntry {
        let mut flags = PteFlags::empty();
        flags.set(PteFlags::VALID, raw & self.valid_mask != 0);
        flags.set(
            PteFlags::LARGE_PAGE,
            self.large_page_mask != 0 && raw & self.large_page_mask != 0,
        );

        let frame_mask = if flags.contains(PteFlags::LARGE_PAGE) {
            self.large_frame_mask
        } else {
            self.frame_mask
        };

        PageTableEntry {
            raw,
            flags,
            frame: Address::from(raw & frame_mask),
        }
    }
}

/// A decoded page table entry.
///
/// The frame address can only be obtained from a valid entry.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct PageTableEntry {
    raw: u64,
    flags: PteFlags,
    frame: Address,
}

impl PageTableEntry {
    pub fn raw(&self) -> u64 {
        self.raw
    }

    pub fn flags(&self) -> PteFlags {
        self.flags
    }

    pub fn is_valid(&self) -> bool {
        self.flags.contains(PteFlags::VALID)
    }

    pub fn is_large_page(&self) -> bool {
        self.flags.contains(PteFlags::LARGE_PAGE)
    }

    /// Returns the physical frame the entry points to, `None` if the entry is not valid.
    pub fn frame(&self) -> Option<Address> {
        if self.is_valid() {
            Some(self.frame)
        } else {
            None
        }
    }
}

impl fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PageTableEntry: raw={:x} flags={:?} frame={:x}",
            self.raw, self.flags, self.frame
        )
    }
}

/// Reads and decodes the page table entry located at the physical address `pa`.
///
/// `scratch` has to hold at least `layout.width` bytes. Whether an invalid entry is fatal is
/// left to the caller.
pub fn read_entry<T: PhysicalMemory + ?Sized>(
    mem: &mut T,
    pa: Address,
    layout: &PteLayout,
    endianess: Endianess,
    scratch: &mut [u8],
) -> Result<PageTableEntry> {
    let scratch_len = scratch.len();
    let buf = scratch.get_mut(..layout.width).ok_or_else(|| {
        Error(ErrorOrigin::PageTable, ErrorKind::OutOfBounds).log_error(format_args!(
            "scratch buffer of {} bytes is too small for a {} byte entry",
            scratch_len, layout.width
        ))
    })?;
    mem.phys_read_raw_into(pa, buf)?;
    Ok(layout.decode(endianess.decode(buf)))
}
