use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::Address;

use std::cmp::Ordering;
use std::fmt;

use log::{debug, warn};

/// A contiguous run of captured physical memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct Segment {
    pub start: Address,
    pub size: u64,
}

impl Segment {
    pub fn new(start: Address, size: u64) -> Self {
        Self { start, size }
    }

    /// First address past the end of the segment.
    pub fn end(&self) -> Address {
        self.start + self.size
    }

    pub fn contains(&self, pa: Address) -> bool {
        self.start <= pa && pa < self.end()
    }
}

/// A segment together with the position of its contents in the image file.
#[derive(Copy, Clone)]
pub struct SegmentMapping {
    segment: Segment,
    file_offset: u64,
}

impl SegmentMapping {
    pub fn segment(&self) -> Segment {
        self.segment
    }

    pub fn start(&self) -> Address {
        self.segment.start
    }

    pub fn size(&self) -> u64 {
        self.segment.size
    }

    /// Absolute file offset of the first byte of this segment.
    pub fn file_offset(&self) -> u64 {
        self.file_offset
    }
}

/// The `SegmentMap` struct maps physical addresses of the captured machine to offsets in the
/// image file.
///
/// Segment contents are stored back to back starting at `image_base_offset`, in the same
/// order as the segments themselves. Segments are kept sorted and never overlap, so a
/// physical address is part of at most one segment.
///
/// Addresses that are not covered by any segment are reported as `ErrorKind::NotMapped`,
/// the map never falls back to an offset computed from a partial scan.
///
/// # Examples
///
/// ```
/// use memflow_kcore::mem::SegmentMap;
///
/// let mut map = SegmentMap::new(0x200);
/// map.push(0x0.into(), 0x1000).unwrap();
/// map.push(0x2000.into(), 0x1000).unwrap();
///
/// assert_eq!(map.locate(0x2500.into()).unwrap(), 0x1700);
/// assert!(map.locate(0x1800.into()).is_err());
/// ```
#[derive(Clone, Default)]
pub struct SegmentMap {
    mappings: Vec<SegmentMapping>,
    image_base_offset: u64,
    image_size: u64,
}

// below this many segments a linear scan beats the binary search
const MIN_BSEARCH_THRESH: usize = 32;

impl SegmentMap {
    /// Constructs an empty map whose segment contents start at `image_base_offset`.
    pub fn new(image_base_offset: u64) -> Self {
        Self {
            mappings: Vec::new(),
            image_base_offset,
            image_size: 0,
        }
    }

    /// File offset where the concatenated segment contents begin.
    pub fn image_base_offset(&self) -> u64 {
        self.image_base_offset
    }

    /// Total number of bytes of segment contents stored in the image.
    pub fn image_size(&self) -> u64 {
        self.image_size
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Iterator over memory mappings
    pub fn iter(&self) -> impl Iterator<Item = &SegmentMapping> {
        self.mappings.iter()
    }

    /// Appends a segment to the map.
    ///
    /// Segments have to be pushed in ascending order and must not overlap, since the order
    /// of the segments defines where their contents live in the file. Empty segments do not
    /// occupy any bytes and are skipped.
    pub fn push(&mut self, start: Address, size: u64) -> Result<&mut Self> {
        if size == 0 {
            warn!("skipping empty segment at {:x}", start);
            return Ok(self);
        }

        let end = start.checked_add(size).ok_or_else(|| {
            Error(ErrorOrigin::SegmentMap, ErrorKind::MalformedHeader)
                .log_error(format_args!("segment {:x}+{:x} overflows", start, size))
        })?;

        if let Some(last) = self.mappings.last() {
            if last.segment.end() > start {
                return Err(
                    Error(ErrorOrigin::SegmentMap, ErrorKind::UnsortedSegments).log_error(
                        format_args!(
                            "{:x}-{:x} follows {:x}-{:x}",
                            start,
                            end,
                            last.start(),
                            last.segment.end()
                        ),
                    ),
                );
            }
        }

        let file_offset = self
            .image_base_offset
            .checked_add(self.image_size)
            .ok_or_else(|| Error(ErrorOrigin::SegmentMap, ErrorKind::SegmentsExceedImage))?;
        self.image_size = self
            .image_size
            .checked_add(size)
            .ok_or_else(|| Error(ErrorOrigin::SegmentMap, ErrorKind::SegmentsExceedImage))?;

        debug!(
            "adding segment: start={:x} size={:x} file_offset={:x}",
            start, size, file_offset
        );

        self.mappings.push(SegmentMapping {
            segment: Segment::new(start, size),
            file_offset,
        });

        Ok(self)
    }

    /// Returns the segment containing `pa`, if any.
    pub fn find(&self, pa: Address) -> Option<&SegmentMapping> {
        if self.mappings.len() >= MIN_BSEARCH_THRESH {
            self.mappings
                .binary_search_by(|m| {
                    if m.start() > pa {
                        Ordering::Greater
                    } else if m.segment.end() <= pa {
                        Ordering::Less
                    } else {
                        Ordering::Equal
                    }
                })
                .ok()
                .map(|idx| &self.mappings[idx])
        } else {
            self.mappings.iter().find(|m| m.segment.contains(pa))
        }
    }

    /// Converts a physical address into an absolute file offset.
    pub fn locate(&self, pa: Address) -> Result<u64> {
        self.locate_range(pa).map(|(offset, _)| offset)
    }

    /// Converts a physical address into an absolute file offset and returns the number of
    /// bytes left in the containing segment, starting at `pa`.
    pub fn locate_range(&self, pa: Address) -> Result<(u64, u64)> {
        self.find(pa)
            .map(|m| {
                let delta = pa - m.start();
                (m.file_offset + delta, m.size() - delta)
            })
            .ok_or(Error(ErrorOrigin::SegmentMap, ErrorKind::NotMapped))
    }
}

impl fmt::Debug for SegmentMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, m) in self.mappings.iter().enumerate() {
            if i > 0 {
                write!(f, "\n{:?}", m)?;
            } else {
                write!(f, "{:?}", m)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SegmentMapping {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SegmentMapping: start={:x} size={:x} file_offset={:x}",
            self.segment.start, self.segment.size, self.file_offset
        )
    }
}
