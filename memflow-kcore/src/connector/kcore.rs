/*!
Parser for kernel core image headers.

A kernel core image starts with an architecture defined label region, followed by the
header and the contents of every captured physical memory segment:

```text
+----------------------+ 0
| label                |
+----------------------+ label_size
| page_table_root      | one machine word
| segment_count        | one machine word
| start, size          | segment_count times
| ...                  |
+----------------------+ image_base_offset
| segment 0 contents   |
| segment 1 contents   |
| ...                  |
+----------------------+
```

All words are stored in the byte order of the captured machine.
*/

use crate::architecture::{ArchMmuSpec, TranslationBase};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::{Segment, SegmentMap};
use crate::types::Address;

use std::io::{Read, Seek, SeekFrom};

use itertools::Itertools;
use log::{info, warn};

/// The parsed and validated header of a kernel core image.
///
/// It is immutable once parsed and can be shared between sessions opened on the same image.
#[derive(Debug, Clone)]
pub struct ImageHeader {
    page_table_root: Address,
    segments: SegmentMap,
    label_size: usize,
}

impl ImageHeader {
    /// Reads and validates the header of the image behind `reader`.
    ///
    /// The header is checked against the file size before anything gets allocated for it,
    /// an image whose segments claim more bytes than the file holds is rejected.
    pub fn parse<R: Read + Seek>(
        reader: &mut R,
        spec: &ArchMmuSpec,
        label_size: usize,
    ) -> Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0)).map_err(|err| {
            Error(ErrorOrigin::Image, ErrorKind::UnableToSeekFile).log_error(err)
        })?;

        let word = spec.addr_size as u64;
        let header_start = label_size as u64;
        let fixed_end = header_start
            .checked_add(2 * word)
            .filter(|end| *end <= file_len)
            .ok_or_else(|| {
                Error(ErrorOrigin::Image, ErrorKind::MalformedHeader).log_error(format_args!(
                    "image of {:x} bytes is too small for a header at {:x}",
                    file_len, header_start
                ))
            })?;

        let mut fixed = [0u8; 16];
        let fixed = &mut fixed[..2 * word as usize];
        read_exact_at(reader, header_start, fixed)?;

        let (root, count) = fixed
            .chunks_exact(word as usize)
            .map(|w| spec.endianess.decode(w))
            .collect_tuple()
            .ok_or(Error(ErrorOrigin::Image, ErrorKind::MalformedHeader))?;

        let image_base_offset = count
            .checked_mul(2 * word)
            .and_then(|len| fixed_end.checked_add(len))
            .filter(|end| *end <= file_len)
            .ok_or_else(|| {
                Error(ErrorOrigin::Image, ErrorKind::MalformedHeader).log_error(format_args!(
                    "{:x} segments do not fit into an image of {:x} bytes",
                    count, file_len
                ))
            })?;

        let mut entries = vec![0u8; (image_base_offset - fixed_end) as usize];
        read_exact_at(reader, fixed_end, &mut entries)?;

        let mut segments = SegmentMap::new(image_base_offset);
        for (start, size) in entries
            .chunks_exact(word as usize)
            .map(|w| spec.endianess.decode(w))
            .tuples()
        {
            segments.push(start.into(), size)?;
        }

        let image_end = image_base_offset
            .checked_add(segments.image_size())
            .filter(|end| *end <= file_len)
            .ok_or_else(|| {
                Error(ErrorOrigin::Image, ErrorKind::SegmentsExceedImage).log_error(format_args!(
                    "segments need {:x} bytes at {:x}, the image has {:x}",
                    segments.image_size(),
                    image_base_offset,
                    file_len
                ))
            })?;
        if image_end < file_len {
            warn!(
                "ignoring {:x} trailing bytes after the last segment",
                file_len - image_end
            );
        }

        let header = Self {
            page_table_root: root.into(),
            segments,
            label_size,
        };
        header.validate_root(spec)?;

        info!(
            "kernel core image verified: {} segments, {:x} bytes, page_table_root={:x}",
            header.segments.len(),
            header.segments.image_size(),
            header.page_table_root
        );

        Ok(header)
    }

    fn validate_root(&self, spec: &ArchMmuSpec) -> Result<()> {
        match self.translation_base() {
            TranslationBase::Bootstrapping if !spec.bootstrap_identity => {
                Err(Error(ErrorOrigin::Image, ErrorKind::MalformedHeader)
                    .log_error("page table root is missing"))
            }
            TranslationBase::Ready(root)
                if spec.eager_root_validation && self.segments.find(root).is_none() =>
            {
                Err(Error(ErrorOrigin::Image, ErrorKind::RootNotMapped)
                    .log_error(format_args!("page_table_root={:x}", root)))
            }
            _ => Ok(()),
        }
    }

    /// Physical address of the top level page table as stored in the image.
    pub fn page_table_root(&self) -> Address {
        self.page_table_root
    }

    pub fn translation_base(&self) -> TranslationBase {
        TranslationBase::from_root(self.page_table_root)
    }

    pub fn segments(&self) -> &SegmentMap {
        &self.segments
    }

    pub fn label_size(&self) -> usize {
        self.label_size
    }

    /// File offset where the segment contents begin.
    pub fn image_base_offset(&self) -> u64 {
        self.segments.image_base_offset()
    }

    /// Serializes a header in the layout `parse` expects, including a zeroed label region.
    pub fn encode(
        spec: &ArchMmuSpec,
        label_size: usize,
        page_table_root: Address,
        segments: &[Segment],
    ) -> Vec<u8> {
        let word = spec.addr_size as usize;
        let mut out = vec![0u8; label_size + (2 + 2 * segments.len()) * word];

        let words = std::iter::once(page_table_root.as_u64())
            .chain(std::iter::once(segments.len() as u64))
            .chain(segments.iter().flat_map(|s| vec![s.start.as_u64(), s.size]));

        for (chunk, value) in out[label_size..].chunks_exact_mut(word).zip(words) {
            spec.endianess.encode(value, chunk);
        }
        out
    }
}

fn read_exact_at<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> Result<()> {
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(|err| Error(ErrorOrigin::Image, ErrorKind::UnableToSeekFile).log_error(err))?;
    reader
        .read_exact(buf)
        .map_err(|err| Error(ErrorOrigin::Image, ErrorKind::UnableToReadFile).log_error(err))
}
