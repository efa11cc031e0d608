use super::super::{ArchMmuSpec, Architecture, Bounds, Endianess};

use crate::mem::PteLayout;
use crate::types::Address;

// segment table entries
pub const SG_V: u64 = 0x0000_0002;
pub const SG_FRAME: u64 = 0xffff_f000;
pub const SG_ISHIFT: u8 = 22;

// page table entries
pub const PG_V: u64 = 0x0000_0001;
pub const PG_FRAME: u64 = 0xffff_f000;

pub(crate) const ARCH_SPEC: ArchMmuSpec = ArchMmuSpec {
    bits: 32,
    endianess: Endianess::BigEndian,
    virtual_address_splits: &[32 - SG_ISHIFT, SG_ISHIFT - 12, 12],
    addr_size: 4,
    directory: PteLayout {
        width: 4,
        valid_mask: SG_V,
        frame_mask: SG_FRAME,
        large_page_mask: 0,
        large_frame_mask: 0,
    },
    table: PteLayout {
        width: 4,
        valid_mask: PG_V,
        frame_mask: PG_FRAME,
        large_page_mask: 0,
        large_frame_mask: 0,
    },
    label_size: 0,
    bootstrap_identity: false,
    eager_root_validation: false,
    bounds: Bounds {
        min_user: Address::new(0),
        max_user: Address::new(0xfff0_0000),
        kernel_base: Address::new(0),
    },
};

pub static ARCH: &dyn Architecture = &ARCH_SPEC;
