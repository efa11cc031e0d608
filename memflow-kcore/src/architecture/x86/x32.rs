use super::super::{ArchMmuSpec, Architecture, Bounds, Endianess};

use crate::mem::PteLayout;
use crate::types::Address;

pub const PG_V: u64 = 0x001;
pub const PG_PS: u64 = 0x080;
pub const PG_FRAME: u64 = 0xffff_f000;
pub const PG_LGFRAME: u64 = 0xffc0_0000;

pub(crate) const ARCH_SPEC: ArchMmuSpec = ArchMmuSpec {
    bits: 32,
    endianess: Endianess::LittleEndian,
    virtual_address_splits: &[10, 10, 12],
    addr_size: 4,
    directory: PteLayout {
        width: 4,
        valid_mask: PG_V,
        frame_mask: PG_FRAME,
        large_page_mask: PG_PS,
        large_frame_mask: PG_LGFRAME,
    },
    table: PteLayout {
        width: 4,
        valid_mask: PG_V,
        frame_mask: PG_FRAME,
        large_page_mask: 0,
        large_frame_mask: 0,
    },
    label_size: 0,
    bootstrap_identity: true,
    eager_root_validation: true,
    bounds: Bounds {
        min_user: Address::new(0),
        max_user: Address::new(0xbfc0_0000),
        kernel_base: Address::new(0xc000_0000),
    },
};

pub static ARCH: &dyn Architecture = &ARCH_SPEC;
