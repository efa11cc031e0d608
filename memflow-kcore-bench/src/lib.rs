pub mod vat;
pub mod virt;

use memflow_kcore::dummy::DummyImage;
use memflow_kcore::{size, Address, ArchitectureIdent, Segment, Session};

use std::io::Cursor;

/// Kernel virtual address all benchmark mappings start at.
pub const KERNEL_BASE: u64 = 0xc010_0000;

/// Builds a session on a synthetic image with `mapped` bytes of kernel memory mapped at
/// `KERNEL_BASE`.
pub fn dummy_session(ident: ArchitectureIdent, mapped: usize) -> Session<Cursor<Vec<u8>>> {
    // opening logs every segment, keep it out of the measurements
    log::set_max_level(log::LevelFilter::Error);

    let mut image = DummyImage::with_segments(
        ident,
        &[Segment::new(Address::NULL, size::mb(16) as u64)],
        0x5eed,
    );
    image.map_range(Address::from(KERNEL_BASE), mapped);
    image.into_session(false)
}
