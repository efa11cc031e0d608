use super::ImageHeader;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::PhysicalMemory;
use crate::types::Address;

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Physical memory backed by a seekable kernel core image.
///
/// Physical addresses are resolved through the segment map of the image header, requests
/// that span several segments are split at the segment boundaries.
pub struct ImageMemory<T> {
    reader: T,
    header: Arc<ImageHeader>,
    writable: bool,
}

impl<T> ImageMemory<T> {
    pub fn with_header(reader: T, header: Arc<ImageHeader>, writable: bool) -> Self {
        Self {
            reader,
            header,
            writable,
        }
    }

    pub fn header(&self) -> &Arc<ImageHeader> {
        &self.header
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Returns the underlying image handle.
    pub fn into_inner(self) -> T {
        self.reader
    }
}

impl<T: Seek + Read + Write> ImageMemory<T> {

    /// Reads `buf.len()` bytes at the absolute file offset `offset`.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|err| Error(ErrorOrigin::Image, ErrorKind::UnableToSeekFile).log_error(err))?;
        self.reader
            .read_exact(buf)
            .map_err(|err| Error(ErrorOrigin::Image, ErrorKind::UnableToReadFile).log_error(err))
    }

    /// Writes `data` at the absolute file offset `offset`.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error(ErrorOrigin::Image, ErrorKind::ReadOnly));
        }
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|err| Error(ErrorOrigin::Image, ErrorKind::UnableToSeekFile).log_error(err))?;
        self.reader
            .write_all(data)
            .map_err(|err| Error(ErrorOrigin::Image, ErrorKind::UnableToWriteFile).log_error(err))
    }
}

impl<T: Seek + Read + Write> PhysicalMemory for ImageMemory<T> {
    fn phys_read_raw_into(&mut self, mut addr: Address, mut out: &mut [u8]) -> Result<()> {
        while !out.is_empty() {
            let (offset, left) = self.header.segments().locate_range(addr)?;
            let len = out.len().min(left.min(usize::MAX as u64) as usize);
            let (chunk, rest) = std::mem::take(&mut out).split_at_mut(len);
            self.read_at(offset, chunk)?;
            addr += len;
            out = rest;
        }
        Ok(())
    }

    fn phys_write_raw(&mut self, mut addr: Address, mut data: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error(ErrorOrigin::Image, ErrorKind::ReadOnly));
        }
        while !data.is_empty() {
            let (offset, left) = self.header.segments().locate_range(addr)?;
            let len = data.len().min(left.min(usize::MAX as u64) as usize);
            let (chunk, rest) = data.split_at(len);
            self.write_at(offset, chunk)?;
            addr += len;
            data = rest;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::ArchitectureIdent;
    use crate::mem::Segment;

    use std::io::Cursor;

    fn memory(writable: bool) -> ImageMemory<Cursor<Vec<u8>>> {
        let spec = ArchitectureIdent::I386.spec();
        let segments = [
            Segment::new(0x0.into(), 0x10),
            Segment::new(0x10.into(), 0x10),
            Segment::new(0x100.into(), 0x10),
        ];
        let mut buf = ImageHeader::encode(spec, 0, 0x0.into(), &segments);
        buf.extend((0..0x30u8).collect::<Vec<_>>());
        let mut cursor = Cursor::new(buf);
        let header = ImageHeader::parse(&mut cursor, spec, 0).unwrap();
        ImageMemory::with_header(cursor, Arc::new(header), writable)
    }

    #[test]
    fn read_across_segments() {
        let mut mem = memory(false);
        let mut out = [0u8; 8];
        mem.phys_read_raw_into(0xc.into(), &mut out).unwrap();
        assert_eq!(out, [0xc, 0xd, 0xe, 0xf, 0x10, 0x11, 0x12, 0x13]);

        assert_eq!(
            mem.phys_read_raw(0x104.into(), 2).unwrap(),
            vec![0x24, 0x25]
        );
    }

    #[test]
    fn read_into_gap() {
        let mut mem = memory(false);
        let mut out = [0u8; 8];
        assert_eq!(
            mem.phys_read_raw_into(0x1c.into(), &mut out),
            Err(Error(ErrorOrigin::SegmentMap, ErrorKind::NotMapped))
        );
    }

    #[test]
    fn write_read_only() {
        let mut mem = memory(false);
        assert_eq!(
            mem.phys_write_raw(0x0.into(), &[1, 2, 3]),
            Err(Error(ErrorOrigin::Image, ErrorKind::ReadOnly))
        );
    }

    #[test]
    fn write_across_segments() {
        let mut mem = memory(true);
        mem.phys_write_raw(0xe.into(), &[0xaa, 0xbb, 0xcc, 0xdd])
            .unwrap();
        assert_eq!(
            mem.phys_read_raw(0xd.into(), 6).unwrap(),
            vec![0xd, 0xaa, 0xbb, 0xcc, 0xdd, 0x12]
        );

        // both segments are stored back to back after the 0x20 byte header
        let image = mem.into_inner().into_inner();
        assert_eq!(&image[0x2e..0x32], &[0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(image[0x2d], 0xd);
        assert_eq!(image[0x32], 0x12);
    }

    #[test]
    fn header_accessors() {
        let mem = memory(false);
        let header = mem.header().clone();
        assert!(!mem.is_writable());
        assert_eq!(header.image_base_offset(), 0x20);
        assert_eq!(header.segments().len(), 3);

        // the accessors do not depend on the handle supporting i/o
        let detached = ImageMemory::with_header((), header, true);
        assert!(detached.is_writable());
        assert_eq!(detached.header().segments().len(), 3);
    }
}
