/*!
Synthetic kernel core images for tests and benchmarks.

`DummyImage` lays out physical memory segments, fills them with random data and builds
page tables for the chosen architecture in randomly picked frames. The finished image can
be serialized into the on-disk format and opened like a real core image.
*/

use crate::architecture::{ArchMmuSpec, ArchitectureIdent};
use crate::connector::{ImageArgs, ImageHeader};
use crate::mem::Segment;
use crate::session::Session;
use crate::types::{size, Address};

use std::io::Cursor;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

/// An in-memory kernel core image under construction.
#[derive(Clone)]
pub struct DummyImage {
    ident: ArchitectureIdent,
    spec: &'static ArchMmuSpec,
    segments: Vec<Segment>,
    mem: Box<[u8]>,
    free_pages: Vec<Address>,
    root: Address,
    label_size: usize,
    rng: XorShiftRng,
}

impl DummyImage {
    /// Two 2 MiB segments with a 2 MiB hole in between.
    pub fn new(ident: ArchitectureIdent) -> Self {
        Self::with_seed(ident, 0x5eed)
    }

    pub fn with_seed(ident: ArchitectureIdent, seed: u64) -> Self {
        Self::with_segments(
            ident,
            &[
                Segment::new(Address::NULL, size::mb(2) as u64),
                Segment::new(Address::from(size::mb(4)), size::mb(2) as u64),
            ],
            seed,
        )
    }

    /// Creates an image covering `segments`, which have to be sorted and page aligned.
    pub fn with_segments(ident: ArchitectureIdent, segments: &[Segment], seed: u64) -> Self {
        let spec = ident.spec();
        let page_size = spec.page_size();
        let mut rng = XorShiftRng::seed_from_u64(seed);

        let phys_end = segments
            .iter()
            .map(|s| s.end().as_usize())
            .max()
            .unwrap_or(0);
        let mut mem = vec![0u8; phys_end].into_boxed_slice();
        rng.fill(&mut mem[..]);

        let mut free_pages = segments
            .iter()
            .flat_map(|s| {
                (0..s.size as usize / page_size).map(move |i| s.start + i * page_size)
            })
            .collect::<Vec<_>>();
        free_pages.shuffle(&mut rng);

        let mut image = Self {
            ident,
            spec,
            segments: segments.to_vec(),
            mem,
            free_pages,
            root: Address::NULL,
            label_size: spec.label_size,
            rng,
        };
        image.root = image.alloc_table();
        image
    }

    pub fn ident(&self) -> ArchitectureIdent {
        self.ident
    }

    pub fn page_table_root(&self) -> Address {
        self.root
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn page_size(&self) -> usize {
        self.spec.page_size()
    }

    /// Stores a zero page table root in the header, as captured before paging was set up.
    pub fn clear_root(&mut self) -> &mut Self {
        self.root = Address::NULL;
        self
    }

    pub fn set_label_size(&mut self, label_size: usize) -> &mut Self {
        self.label_size = label_size;
        self
    }

    /// Takes a random unused physical page.
    ///
    /// Panics once every page of the image is in use.
    pub fn alloc_page(&mut self) -> Address {
        self.free_pages.pop().expect("dummy image is out of pages")
    }

    fn alloc_table(&mut self) -> Address {
        let page = self.alloc_page();
        let page_size = self.page_size();
        self.mem[page.as_usize()..page.as_usize() + page_size]
            .iter_mut()
            .for_each(|b| *b = 0);
        page
    }

    pub fn write_phys(&mut self, pa: Address, data: &[u8]) {
        self.mem[pa.as_usize()..pa.as_usize() + data.len()].copy_from_slice(data);
    }

    pub fn read_phys(&self, pa: Address, len: usize) -> &[u8] {
        &self.mem[pa.as_usize()..pa.as_usize() + len]
    }

    fn write_word(&mut self, pa: Address, value: u64) {
        let width = self.spec.addr_size as usize;
        let endianess = self.spec.endianess;
        endianess.encode(value, &mut self.mem[pa.as_usize()..pa.as_usize() + width]);
    }

    fn read_word(&self, pa: Address) -> u64 {
        let width = self.spec.addr_size as usize;
        self.spec.endianess.decode(self.read_phys(pa, width))
    }

    fn directory_entry_addr(&self, va: Address) -> Address {
        self.root + self.spec.directory_index(va) * self.spec.directory.width as u64
    }

    /// Overwrites the raw first level entry covering `va`.
    pub fn set_directory_entry(&mut self, va: Address, raw: u64) -> &mut Self {
        let pde_addr = self.directory_entry_addr(va);
        self.write_word(pde_addr, raw);
        self
    }

    /// Overwrites the raw page table entry of `va`, the directory entry has to be valid.
    pub fn set_table_entry(&mut self, va: Address, raw: u64) -> &mut Self {
        let table = self.table_for(va);
        let pte_addr = table + self.spec.table_index(va) * self.spec.table.width as u64;
        self.write_word(pte_addr, raw);
        self
    }

    fn table_for(&mut self, va: Address) -> Address {
        let pde_addr = self.directory_entry_addr(va);
        let pde = self.spec.directory.decode(self.read_word(pde_addr));
        match pde.frame() {
            Some(table) if !pde.is_large_page() => table,
            _ => {
                let table = self.alloc_table();
                self.write_word(pde_addr, table.as_u64() | self.spec.directory.valid_mask);
                table
            }
        }
    }

    /// Maps the page containing `va` onto the physical page `pa`.
    pub fn map_page(&mut self, va: Address, pa: Address) -> &mut Self {
        let valid = self.spec.table.valid_mask;
        self.set_table_entry(va, pa.as_page_aligned(self.page_size()).as_u64() | valid)
    }

    /// Maps `len` bytes starting at `va` onto freshly allocated pages.
    pub fn map_range(&mut self, va: Address, len: usize) -> &mut Self {
        let page_size = self.page_size();
        let start = va.as_page_aligned(page_size);
        let end = (va + len).as_u64();
        let mut page = start;
        while page.as_u64() < end {
            let pa = self.alloc_page();
            self.map_page(page, pa);
            page += page_size;
        }
        self
    }

    /// Maps `data.len()` bytes at `va` and stores `data` there.
    pub fn map_buffer(&mut self, va: Address, data: &[u8]) -> &mut Self {
        self.map_range(va, data.len());
        for (i, b) in data.iter().enumerate() {
            let pa = self.vtop(va + i).expect("freshly mapped page");
            self.mem[pa.as_usize()] = *b;
        }
        self
    }

    /// Maps the large page containing `va` onto `pa` through a single directory entry.
    ///
    /// Only meaningful for architectures with large page support.
    pub fn map_large_page(&mut self, va: Address, pa: Address) -> &mut Self {
        let dir = self.spec.directory;
        let raw = (pa.as_u64() & dir.large_frame_mask) | dir.large_page_mask | dir.valid_mask;
        self.set_directory_entry(va, raw)
    }

    /// Generates random bytes.
    pub fn random_buffer(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.rng.fill(&mut buf[..]);
        buf
    }

    /// Reference translation computed straight from the image contents.
    pub fn vtop(&self, va: Address) -> Option<Address> {
        let pde = self
            .spec
            .directory
            .decode(self.read_word(self.directory_entry_addr(va)));
        let table = pde.frame()?;
        if pde.is_large_page() {
            return Some(table | (va.as_u64() & (self.spec.large_page_size() as u64 - 1)));
        }
        let pte_addr = table + self.spec.table_index(va) * self.spec.table.width as u64;
        let frame = self.spec.table.decode(self.read_word(pte_addr)).frame()?;
        Some(frame | self.spec.page_offset(va) as u64)
    }

    /// Serializes the image into the kernel core image file format.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = ImageHeader::encode(self.spec, self.label_size, self.root, &self.segments);
        for segment in self.segments.iter() {
            out.extend_from_slice(self.read_phys(segment.start, segment.size as usize));
        }
        out
    }

    pub fn into_cursor(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.into_bytes())
    }

    /// Arguments matching this image.
    pub fn args(&self) -> ImageArgs {
        ImageArgs::new(self.ident).label_size_override(self.label_size)
    }

    /// Serializes the image and opens a session on it.
    pub fn into_session(self, writable: bool) -> Session<Cursor<Vec<u8>>> {
        let args = self.args().writable(writable);
        Session::open_with(self.into_cursor(), args).expect("dummy image is well formed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::{ArchBackend, Backend, TranslationBase};
    use crate::mem::PhysicalMemory;

    #[test]
    fn dummy_vtop_matches_backend() {
        for ident in &[ArchitectureIdent::I386, ArchitectureIdent::M68k] {
            let mut image = DummyImage::new(*ident);
            let va = Address::from(0xc010_0000u64);
            image.map_range(va, size::kb(16));

            let root = image.page_table_root();
            let mut session = image.clone().into_session(false);
            let mut backend = Backend::new(*ident, None);
            for off in (0..size::kb(16)).step_by(0x800) {
                let tr = backend
                    .translate(&mut session, TranslationBase::Ready(root), va + off)
                    .unwrap();
                assert_eq!(Some(tr.pa), image.vtop(va + off));
            }
            backend.teardown();
        }
    }

    #[test]
    fn dummy_pages_stay_inside_segments() {
        let mut image = DummyImage::new(ArchitectureIdent::I386);
        for _ in 0..64 {
            let page = image.alloc_page();
            assert!(image.segments().iter().any(|s| s.contains(page)));
        }
    }

    #[test]
    fn dummy_phys_contents() {
        let mut image = DummyImage::new(ArchitectureIdent::I386);
        let pa = Address::from(size::mb(4) + 0x10);
        image.write_phys(pa, &[1, 2, 3, 4]);
        let mut session = image.into_session(false);
        assert_eq!(session.phys_read_raw(pa, 4).unwrap(), vec![1, 2, 3, 4]);
    }
}
