use super::{Architecture, Bounds, Endianess, Translation};

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::{read_entry, PhysicalMemory, PteLayout};
use crate::types::Address;

use bumpalo::Bump;

/// The `ArchMmuSpec` structure defines how a real memory management unit translates virtual
/// memory addresses to physical ones.
///
/// Both supported MMUs use two levels of mapping: a first level structure (page directory on
/// x86, segment table on the 68030) whose entries point at page tables, and the page tables
/// whose entries point at physical frames. A virtual address gets split into a directory
/// index, a table index and a byte offset into the page. What differs between the
/// architectures is the width of those splits, the byte order and the bit layout of the
/// entries, all of which live inside this structure. The walk itself is shared.
#[derive(Debug)]
pub struct ArchMmuSpec {
    /// pointer width of the architecture in bits.
    pub bits: u8,
    /// byte order of header words and page table entries.
    pub endianess: Endianess,
    /// defines the way virtual addresses gets split (the last element
    /// being the final physical page offset, and thus treated a bit differently)
    pub virtual_address_splits: &'static [u8],
    /// native pointer size in bytes for the architecture.
    pub addr_size: u8,
    /// layout of the first level entries.
    pub directory: PteLayout,
    /// layout of the page table entries.
    pub table: PteLayout,
    /// size of the label region in front of the image header.
    pub label_size: usize,
    /// the architecture maps virtual addresses 1:1 while the page table root is unknown.
    pub bootstrap_identity: bool,
    /// the page table root has to lie inside a segment when the image is opened.
    pub eager_root_validation: bool,
    /// static address space split points.
    pub bounds: Bounds,
}

impl ArchMmuSpec {
    /// Returns the `(low, high)` bit range of the virtual address split at `step`, high
    /// being exclusive.
    fn virt_addr_bit_range(&self, step: usize) -> (u8, u8) {
        let max_index_bits = self.virtual_address_splits[step..].iter().sum::<u8>();
        let min_index_bits = max_index_bits - self.virtual_address_splits[step];
        (min_index_bits, max_index_bits)
    }

    /// Return the number of splits of virtual addresses
    ///
    /// The returned value will be one more than the number of page table levels
    pub fn split_count(&self) -> usize {
        self.virtual_address_splits.len()
    }

    pub fn page_size(&self) -> usize {
        let offset_bits = self.virt_addr_bit_range(self.split_count() - 1).1;
        1 << offset_bits
    }

    /// Size of the region mapped by a single first level entry.
    pub fn large_page_size(&self) -> usize {
        let (low, _) = self.virt_addr_bit_range(0);
        1 << low
    }

    pub fn page_offset(&self, va: Address) -> usize {
        va.page_offset(self.page_size())
    }

    /// Extracts the index into the structure walked at `step` from `va`.
    pub fn index(&self, va: Address, step: usize) -> u64 {
        let (low, high) = self.virt_addr_bit_range(step);
        (va.as_u64() >> low) & Address::bit_mask(0, high - low - 1).as_u64()
    }

    pub fn directory_index(&self, va: Address) -> u64 {
        self.index(va, 0)
    }

    pub fn table_index(&self, va: Address) -> u64 {
        self.index(va, 1)
    }

    /// Highest address the architecture can reference.
    fn phys_limit(&self) -> u64 {
        1u64.checked_shl(u32::from(self.bits)).unwrap_or(0).wrapping_sub(1)
    }

    /// Computes the physical address of the entry for `va` inside the structure at `base`.
    pub fn entry_addr(&self, base: Address, va: Address, step: usize) -> Result<Address> {
        let layout = if step == 0 {
            &self.directory
        } else {
            &self.table
        };

        self.index(va, step)
            .checked_mul(layout.width as u64)
            .and_then(|off| base.checked_add(off))
            .filter(|addr| addr.as_u64() <= self.phys_limit() - (layout.width as u64 - 1))
            .ok_or_else(|| {
                Error(ErrorOrigin::PageTable, ErrorKind::OutOfBounds).log_debug(format_args!(
                    "entry for {:x} at step {} overflows base {:x}",
                    va, step, base
                ))
            })
    }

    /// Rejects virtual addresses that do not fit the pointer width.
    pub fn check_virt_addr(&self, va: Address) -> Result<()> {
        if va.as_u64() > self.phys_limit() {
            Err(Error(ErrorOrigin::Architecture, ErrorKind::OutOfBounds)
                .log_debug(format_args!("{:x} exceeds the {} bit address space", va, self.bits)))
        } else {
            Ok(())
        }
    }

    /// Rejects physical addresses a translation can not produce on this architecture.
    pub fn check_phys_addr(&self, pa: Address) -> Result<()> {
        if pa.as_u64() > self.phys_limit() {
            Err(Error(ErrorOrigin::Architecture, ErrorKind::OutOfBounds)
                .log_debug(format_args!("{:x} exceeds the {} bit address space", pa, self.bits)))
        } else {
            Ok(())
        }
    }

    /// Performs a full two level walk for `va`, starting at the first level structure `root`.
    ///
    /// Invalid entries stop the walk immediately, the next level is never read.
    pub(crate) fn virt_to_phys<T: PhysicalMemory + ?Sized>(
        &self,
        mem: &mut T,
        root: Address,
        va: Address,
        arena: &Bump,
    ) -> Result<Translation> {
        vtop_trace!("virt_to_phys: root={:x} va={:x}", root, va);

        self.check_virt_addr(va)?;

        let scratch = arena.alloc_slice_fill_copy(self.directory.width.max(self.table.width), 0u8);

        let pde_addr = self.entry_addr(root, va, 0)?;
        let pde = read_entry(mem, pde_addr, &self.directory, self.endianess, scratch)?;
        vtop_trace!("pde_addr={:x} pde={:?}", pde_addr, pde);

        let table = pde.frame().ok_or_else(|| {
            Error(ErrorOrigin::PageTable, ErrorKind::InvalidDirectoryEntry).log_debug(
                format_args!("va={:x} pde_addr={:x} pde={:x}", va, pde_addr, pde.raw()),
            )
        })?;

        if pde.is_large_page() {
            let offset = va.as_u64() & (self.large_page_size() as u64 - 1);
            vtop_trace!("large page at {:x}", table);
            return Ok(Translation {
                pa: table | offset,
                run: self.large_page_size() - offset as usize,
            });
        }

        let pte_addr = self.entry_addr(table, va, 1)?;
        let pte = read_entry(mem, pte_addr, &self.table, self.endianess, scratch)?;
        vtop_trace!("pte_addr={:x} pte={:?}", pte_addr, pte);

        let frame = pte.frame().ok_or_else(|| {
            Error(ErrorOrigin::PageTable, ErrorKind::InvalidTableEntry).log_debug(format_args!(
                "va={:x} pte_addr={:x} pte={:x}",
                va,
                pte_addr,
                pte.raw()
            ))
        })?;

        let offset = self.page_offset(va);
        Ok(Translation {
            pa: frame | offset as u64,
            run: self.page_size() - offset,
        })
    }
}

impl Architecture for ArchMmuSpec {
    fn bits(&self) -> u8 {
        self.bits
    }

    fn endianess(&self) -> Endianess {
        self.endianess
    }

    fn page_size(&self) -> usize {
        ArchMmuSpec::page_size(self)
    }

    fn size_addr(&self) -> usize {
        self.addr_size.into()
    }
}
