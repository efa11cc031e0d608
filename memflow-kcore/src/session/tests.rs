use super::*;

use crate::architecture::m68k::KernelRelocation;
use crate::dummy::DummyImage;
use crate::error::{PartialError, PartialResultExt};
use crate::types::size;

use std::cell::Cell;
use std::io::{self, Cursor};
use std::rc::Rc;

/// Forwards to an inner handle and counts every i/o call.
struct CountingIo<T> {
    inner: T,
    ops: Rc<Cell<usize>>,
}

impl<T> CountingIo<T> {
    fn new(inner: T) -> (Self, Rc<Cell<usize>>) {
        let ops = Rc::new(Cell::new(0));
        (
            Self {
                inner,
                ops: ops.clone(),
            },
            ops,
        )
    }

    fn tick(&self) {
        self.ops.set(self.ops.get() + 1);
    }
}

impl<T: Read> Read for CountingIo<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.tick();
        self.inner.read(buf)
    }
}

impl<T: Write> Write for CountingIo<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tick();
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T: Seek> Seek for CountingIo<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.tick();
        self.inner.seek(pos)
    }
}

const KVA: u64 = 0xc010_0000;

fn kva(off: usize) -> Address {
    Address::from(KVA) + off
}

#[test]
fn translate_matches_reference() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    image.map_range(kva(0), size::kb(32));
    let expected = (0..8)
        .map(|i| image.vtop(kva(i * 0x1000 + 0x123)))
        .collect::<Vec<_>>();

    let mut session = image.into_session(false);
    for (i, pa) in expected.into_iter().enumerate() {
        let tr = session.translate(kva(i * 0x1000 + 0x123)).unwrap();
        assert_eq!(Some(tr.pa), pa);
        assert_eq!(tr.run, 0x1000 - 0x123);
    }
}

#[test]
fn translate_invalid_entries() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    image.map_range(kva(0), size::kb(8));
    image.set_table_entry(kva(0x1000), 0);
    image.set_directory_entry(kva(size::mb(4)), 0x0003_0000);

    let mut session = image.into_session(false);
    assert!(session.translate(kva(0)).is_ok());

    let err = session.translate(kva(0x1000)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTableEntry);
    assert!(err.is_not_resident());

    let err = session.translate(kva(size::mb(4))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDirectoryEntry);
}

#[test]
fn translate_frame_outside_image() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    // frame inside the hole between the two segments
    image.map_page(kva(0), Address::from(size::mb(3)));

    let mut session = image.into_session(false);
    assert_eq!(
        session.translate(kva(0)).map(|tr| tr.pa),
        Ok(Address::from(size::mb(3)))
    );
    assert_eq!(
        session.virt_read_raw(kva(0), 4).data(),
        Err(Error(ErrorOrigin::SegmentMap, ErrorKind::NotMapped))
    );
}

#[test]
fn bootstrap_identity() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    image.clear_root();

    let mut session = image.into_session(false);
    assert_eq!(
        session.translation_base(),
        Ok(TranslationBase::Bootstrapping)
    );
    for va in &[0x0u64, 0x123, 0x1fff, 0x40_0abc] {
        let va = Address::from(*va);
        assert_eq!(
            session.translate(va),
            Ok(Translation {
                pa: va,
                run: 0x1000 - va.page_offset(0x1000)
            })
        );
    }
}

#[test]
fn bootstrap_rejects_wide_addresses() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    image.clear_root();

    let mut session = image.into_session(false);
    assert_eq!(
        session.translate(Address::from(0x1_0000_0123u64)),
        Err(Error(ErrorOrigin::Architecture, ErrorKind::OutOfBounds))
    );
    assert_eq!(
        session.virt_read_raw(Address::from(0x1_0000_0000u64), 4).data(),
        Err(Error(ErrorOrigin::Architecture, ErrorKind::OutOfBounds))
    );
    assert!(session.translate(Address::from(0xffff_f123u64)).is_ok());
}

#[test]
fn set_page_table_root() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    image.map_range(kva(0), size::kb(4));
    let root = image.page_table_root();
    let expected = image.vtop(kva(0x10));
    image.clear_root();

    let mut session = image.into_session(false);
    assert_eq!(
        session.set_page_table_root(Address::from(size::mb(3))),
        Err(Error(ErrorOrigin::Session, ErrorKind::RootNotMapped))
    );
    session.set_page_table_root(root).unwrap();
    assert_eq!(session.translation_base(), Ok(TranslationBase::Ready(root)));
    assert_eq!(session.translate(kva(0x10)).map(|tr| tr.pa).ok(), expected);

    assert_eq!(
        session.set_page_table_root(root),
        Err(Error(ErrorOrigin::Session, ErrorKind::AlreadyReady))
    );
}

#[test]
fn live_target_never_walks() {
    let image = DummyImage::new(ArchitectureIdent::I386);
    let (io, ops) = CountingIo::new(image.into_cursor());

    let mut session = Session::open_live(io, ImageArgs::new(ArchitectureIdent::I386));
    assert_eq!(session.liveness(), Ok(Liveness::Live));
    assert_eq!(session.header().map(|h| h.is_none()), Ok(true));

    assert_eq!(
        session.translate(kva(0)),
        Err(Error(ErrorOrigin::Session, ErrorKind::UnsupportedOnLiveTarget))
    );
    assert_eq!(ops.get(), 0);
}

#[test]
fn live_args_open_live() {
    let bytes = DummyImage::new(ArchitectureIdent::I386).into_bytes();
    let args = ImageArgs::try_parse_str("i386,live").unwrap();
    let mut session = Session::open_with(Cursor::new(bytes.clone()), args).unwrap();
    assert_eq!(session.liveness(), Ok(Liveness::Live));

    // memory devices are addressed directly
    let mut buf = [0u8; 4];
    session.phys_read_raw_into(Address::from(0x10u64), &mut buf).unwrap();
    assert_eq!(&buf[..], &bytes[0x10..0x14]);
}

#[test]
fn chunked_read_spans_pages() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    let data = image.random_buffer(size::kb(16));
    image.map_buffer(kva(0), &data);

    let (io, ops) = CountingIo::new(image.into_cursor());
    let mut session = Session::open_with(io, ImageArgs::new(ArchitectureIdent::I386)).unwrap();

    let start = 0x800;
    let len = 2 * 0x1000 + 10;

    ops.set(0);
    let first = session.virt_read_raw(kva(start), len).unwrap();
    assert_eq!(&first[..], &data[start..start + len]);
    // three pages, each needs a directory read, a table read and a data read
    assert!(ops.get() >= 3 * 3 * 2);

    let second = session.virt_read_raw(kva(start), len).unwrap();
    assert_eq!(first, second);
}

#[test]
fn partial_read_reports_progress() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    let data = image.random_buffer(size::kb(8));
    image.map_buffer(kva(0), &data);

    let mut session = image.into_session(false);

    let mut out = vec![0u8; 0x1000];
    match session.virt_read_raw_into(kva(0x1800), &mut out) {
        Err(PartialError::PartialVirtualRead { data: done, error }) => {
            assert_eq!(done, 0x800);
            assert_eq!(error.kind(), ErrorKind::InvalidTableEntry);
            assert_eq!(&out[..0x800], &data[0x1800..]);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    match session.virt_read_raw(kva(0x1800), 0x1000) {
        Err(PartialError::PartialVirtualRead { data: buf, .. }) => {
            assert_eq!(buf.len(), 0x800);
            assert_eq!(&buf[..], &data[0x1800..]);
        }
        other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
    }

    assert_eq!(
        session.virt_read_raw_into(kva(0x2000), &mut out),
        Err(PartialError::Error(Error(
            ErrorOrigin::PageTable,
            ErrorKind::InvalidTableEntry
        )))
    );
}

#[test]
fn write_read_round_trip() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    image.map_range(kva(0), size::kb(12));

    let mut session = image.into_session(true);
    let payload = (0..0x1800).map(|i| (i % 251) as u8).collect::<Vec<_>>();
    assert_eq!(session.virt_write_raw(kva(0xa00), &payload), Ok(payload.len()));
    assert_eq!(
        session.virt_read_raw(kva(0xa00), payload.len()).unwrap(),
        payload
    );
}

#[test]
fn write_read_only_image() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    image.map_range(kva(0), size::kb(4));

    let (io, ops) = CountingIo::new(image.into_cursor());
    let mut session = Session::open_with(io, ImageArgs::new(ArchitectureIdent::I386)).unwrap();

    ops.set(0);
    assert_eq!(
        session.virt_write_raw(kva(0), &[1, 2, 3]),
        Err(PartialError::Error(Error(
            ErrorOrigin::Session,
            ErrorKind::ReadOnly
        )))
    );
    assert_eq!(ops.get(), 0);
}

#[test]
fn typed_reads() {
    let mut image = DummyImage::new(ArchitectureIdent::M68k);
    image.map_buffer(kva(0), &[0xde, 0xad, 0xbe, 0xef, 0x00, 0x00, 0x00, 0x2a]);

    let mut session = image.into_session(false);
    assert_eq!(session.virt_read_addr(kva(0)), Ok(Address::from(0xdead_beefu64)));
    assert_eq!(session.virt_read_addr(kva(4)), Ok(Address::from(0x2au64)));

    let raw: u16 = session.virt_read(kva(2)).unwrap();
    assert_eq!(raw, u16::from_ne_bytes([0xbe, 0xef]));
}

#[test]
fn m68k_relocated_kernel() {
    let mut image = DummyImage::new(ArchitectureIdent::M68k);
    let pa = Address::from(size::mb(4));
    image.write_phys(pa, b"netbsd");

    let reloc = KernelRelocation::new(Address::NULL, Address::from(size::mb(1)), pa);
    let args = image.args().relocation(reloc);
    let mut session = Session::open_with(image.into_cursor(), args).unwrap();

    assert_eq!(session.architecture(), Ok(ArchitectureIdent::M68k));
    assert_eq!(session.virt_read_raw(Address::NULL, 6).unwrap(), b"netbsd");
}

#[test]
fn large_page_read() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    let base = Address::from(size::mb(4));
    image.write_phys(base + 0x1234usize, &[7, 8, 9]);
    image.map_large_page(Address::from(0xc000_0000u64), base);

    let mut session = image.into_session(false);
    assert_eq!(
        session.virt_read_raw(Address::from(0xc000_1234u64), 3).unwrap(),
        vec![7, 8, 9]
    );
}

#[test]
fn header_shared_between_sessions() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    image.map_range(kva(0), size::kb(4));
    let bytes = image.into_bytes();

    let mut first = Session::open_with(
        Cursor::new(bytes.clone()),
        ImageArgs::new(ArchitectureIdent::I386),
    )
    .unwrap();
    let header = first.header().unwrap().unwrap().clone();

    let mut second = Session::open_shared(
        Cursor::new(bytes),
        header.clone(),
        ImageArgs::new(ArchitectureIdent::I386),
    );
    assert_eq!(first.translate(kva(0)), second.translate(kva(0)));
    assert_eq!(Arc::strong_count(&header), 3);
}

#[test]
fn close_is_idempotent() {
    let mut image = DummyImage::new(ArchitectureIdent::I386);
    image.map_range(kva(0), size::kb(4));

    let mut session = image.into_session(false);
    assert_eq!(session.bounds().map(|b| b.kernel_base), Ok(Address::from(0xc000_0000u64)));

    session.close();
    session.close();
    assert!(session.is_closed());
    assert_eq!(
        session.translate(kva(0)),
        Err(Error(ErrorOrigin::Session, ErrorKind::Closed))
    );
    assert_eq!(
        session.virt_read_raw(kva(0), 4).data(),
        Err(Error(ErrorOrigin::Session, ErrorKind::Closed))
    );
}

#[test]
fn open_rejects_malformed_images() {
    let image = DummyImage::new(ArchitectureIdent::I386);
    let mut bytes = image.into_bytes();
    bytes.truncate(bytes.len() - 0x1000);

    let err = Session::open_with(Cursor::new(bytes), ImageArgs::new(ArchitectureIdent::I386))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::SegmentsExceedImage);
    assert!(err.is_corrupt_image());
}

#[test]
fn open_missing_file() {
    assert_eq!(
        Session::open("/nonexistent/netbsd.0.core", ArchitectureIdent::I386).err(),
        Some(Error(ErrorOrigin::Session, ErrorKind::UnableToOpenFile))
    );
}

#[test]
fn open_rejects_oversized_label() {
    let bytes = DummyImage::new(ArchitectureIdent::I386).into_bytes();
    let args = ImageArgs::try_parse_str("i386,label=ffffffffffffffff").unwrap();
    assert_eq!(
        Session::open_with(Cursor::new(bytes), args).err(),
        Some(Error(ErrorOrigin::Image, ErrorKind::MalformedHeader))
    );
}
