/*!
This module covers all implementations and traits related to
reading/writing [physical](phys_mem/index.html) and [virtual](virt_mem/index.html) memory
of a captured image.

The [segment map](mem_map/index.html) turns physical addresses into image file offsets,
the [page table decoder](page_table/index.html) reads single translation entries through any
`PhysicalMemory` implementation.
*/

pub mod mem_map;
pub mod page_table;
pub mod phys_mem;
pub mod virt_mem;

#[doc(hidden)]
pub use mem_map::{Segment, SegmentMap, SegmentMapping};
#[doc(hidden)]
pub use page_table::{read_entry, PageTableEntry, PteFlags, PteLayout};
#[doc(hidden)]
pub use phys_mem::PhysicalMemory;
#[doc(hidden)]
pub use virt_mem::VirtualMemory;
