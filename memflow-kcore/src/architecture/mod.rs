/*!
Module for handling the different MMU architectures a kernel image can come from.

Each architecture is described by a static `ArchMmuSpec` and wrapped in an
architecture specific backend. The backend of a session is picked once when the image
is opened and never changes afterwards, all calls are dispatched through the `Backend` enum.

Each architecture also has a `Endianess` assigned to it.
When decoding header words or page table entries it is necessary
that the translator knows the proper byte order of the captured machine.
*/

#[macro_use]
pub(crate) mod vtop_macros;

pub mod m68k;
pub mod x86;

mod mmu_spec;
pub use mmu_spec::ArchMmuSpec;

pub use bumpalo::Bump;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::PhysicalMemory;
use crate::types::Address;

use std::fmt;
use std::str::FromStr;

use log::warn;

/// Identifies the byte order of a architecture
///
/// See the [wikipedia article](https://en.wikipedia.org/wiki/Endianness) for more information on the subject.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum Endianess {
    /// Little Endianess
    LittleEndian,
    /// Big Endianess
    BigEndian,
}

impl Endianess {
    /// Decodes a word of up to 8 bytes stored in this byte order.
    ///
    /// # Examples
    ///
    /// ```
    /// use memflow_kcore::architecture::Endianess;
    ///
    /// assert_eq!(Endianess::LittleEndian.decode(&[0x01, 0x02, 0x03, 0x04]), 0x0403_0201);
    /// assert_eq!(Endianess::BigEndian.decode(&[0x01, 0x02, 0x03, 0x04]), 0x0102_0304);
    /// ```
    pub fn decode(self, bytes: &[u8]) -> u64 {
        let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
        match self {
            Endianess::LittleEndian => bytes.iter().rev().fold(0, fold),
            Endianess::BigEndian => bytes.iter().fold(0, fold),
        }
    }

    /// Stores the low `out.len()` bytes of `value` in this byte order.
    pub fn encode(self, value: u64, out: &mut [u8]) {
        let len = out.len();
        for (i, b) in out.iter_mut().enumerate() {
            let shift = match self {
                Endianess::LittleEndian => i * 8,
                Endianess::BigEndian => (len - 1 - i) * 8,
            };
            *b = value.checked_shr(shift as u32).unwrap_or(0) as u8;
        }
    }
}

pub trait Architecture: Send + Sync {
    /// Returns the number of bits of a pointers width on a `Architecture`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memflow_kcore::architecture::{x86, Architecture};
    ///
    /// assert_eq!(x86::x32::ARCH.bits(), 32);
    /// ```
    fn bits(&self) -> u8;

    /// Returns the byte order of an `Architecture`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memflow_kcore::architecture::{m68k, Architecture, Endianess};
    ///
    /// assert_eq!(m68k::mmu030::ARCH.endianess(), Endianess::BigEndian);
    /// ```
    fn endianess(&self) -> Endianess;

    /// Returns the smallest page size of an `Architecture`.
    fn page_size(&self) -> usize;

    /// Returns the `usize` of a pointers width on a `Architecture`.
    fn size_addr(&self) -> usize;
}

impl fmt::Debug for dyn Architecture {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Architecture")
            .field("bits", &self.bits())
            .field("endianess", &self.endianess())
            .field("page_size", &self.page_size())
            .field("size_addr", &self.size_addr())
            .finish()
    }
}

/// Names one of the supported architectures.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum ArchitectureIdent {
    /// 32-bit x86 with classic two level paging (no PAE).
    I386,
    /// Motorola 68030 style MMU with a segment table and page tables.
    M68k,
}

impl ArchitectureIdent {
    pub fn spec(self) -> &'static ArchMmuSpec {
        match self {
            ArchitectureIdent::I386 => &x86::x32::ARCH_SPEC,
            ArchitectureIdent::M68k => &m68k::mmu030::ARCH_SPEC,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArchitectureIdent::I386 => "i386",
            ArchitectureIdent::M68k => "m68k",
        }
    }
}

impl FromStr for ArchitectureIdent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "i386" | "x86" | "x86_32" => Ok(ArchitectureIdent::I386),
            "m68k" | "m68030" => Ok(ArchitectureIdent::M68k),
            _ => Err(Error(ErrorOrigin::Architecture, ErrorKind::InvalidArchitecture)
                .log_error(format_args!("unknown architecture '{}'", s))),
        }
    }
}

impl fmt::Display for ArchitectureIdent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static address space split points of an architecture.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct Bounds {
    /// lowest user space address.
    pub min_user: Address,
    /// first address above user space.
    pub max_user: Address,
    /// start of the kernel address space.
    pub kernel_base: Address,
}

/// Result of a successful translation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Translation {
    /// physical address the virtual address maps to.
    pub pa: Address,
    /// number of bytes starting at `pa` that are guaranteed to map linearly.
    pub run: usize,
}

/// Where translations of a session start from.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TranslationBase {
    /// The page table root was not yet known when the image was captured. Architectures
    /// that support it map every virtual address onto the identical physical address.
    Bootstrapping,
    /// Walks start at the top level page table at this physical address.
    Ready(Address),
}

impl TranslationBase {
    /// Maps the raw root word of an image header to a translation base.
    pub fn from_root(root: Address) -> Self {
        if root.is_null() {
            TranslationBase::Bootstrapping
        } else {
            TranslationBase::Ready(root)
        }
    }

    pub fn root(self) -> Option<Address> {
        match self {
            TranslationBase::Bootstrapping => None,
            TranslationBase::Ready(root) => Some(root),
        }
    }
}

/// The capability set every architecture backend provides.
pub trait ArchBackend {
    fn ident(&self) -> ArchitectureIdent;

    fn spec(&self) -> &'static ArchMmuSpec;

    /// Returns the user/kernel split points of the address space.
    fn init_bounds(&self) -> Bounds {
        self.spec().bounds
    }

    /// Walks the page tables rooted at `root` to translate `va`.
    fn translate_va<T: PhysicalMemory + ?Sized>(
        &mut self,
        mem: &mut T,
        root: Address,
        va: Address,
    ) -> Result<Translation>;

    /// Translates `va` while the page table root is unknown, `None` if the architecture
    /// has no way of doing so.
    fn translate_pa_bootstrap(&self, _va: Address) -> Option<Translation> {
        None
    }

    /// Releases auxiliary state. Calling it more than once is allowed.
    fn teardown(&mut self);
}

/// The backend of one session.
pub enum Backend {
    I386(x86::X86Backend),
    M68k(m68k::M68kBackend),
}

impl Backend {
    /// Creates the backend for `ident`.
    ///
    /// `reloc` describes the linearly relocated kernel image, it is only honored by
    /// architectures that support relocation windows.
    pub fn new(ident: ArchitectureIdent, reloc: Option<m68k::KernelRelocation>) -> Self {
        match ident {
            ArchitectureIdent::I386 => {
                if reloc.is_some() {
                    warn!("ignoring kernel relocation window on {}", ident);
                }
                Backend::I386(x86::X86Backend::new(ident.spec()))
            }
            ArchitectureIdent::M68k => Backend::M68k(m68k::M68kBackend::new(ident.spec(), reloc)),
        }
    }

    /// Translates `va` starting from the given translation base.
    pub fn translate<T: PhysicalMemory + ?Sized>(
        &mut self,
        mem: &mut T,
        base: TranslationBase,
        va: Address,
    ) -> Result<Translation> {
        self.spec().check_virt_addr(va)?;
        match base {
            TranslationBase::Ready(root) => self.translate_va(mem, root, va),
            TranslationBase::Bootstrapping => self.translate_pa_bootstrap(va).ok_or_else(|| {
                Error(ErrorOrigin::Architecture, ErrorKind::RootNotMapped).log_debug(format_args!(
                    "{} can not translate {:x} without a page table root",
                    self.ident(),
                    va
                ))
            }),
        }
    }
}

impl ArchBackend for Backend {
    fn ident(&self) -> ArchitectureIdent {
        match self {
            Backend::I386(b) => b.ident(),
            Backend::M68k(b) => b.ident(),
        }
    }

    fn spec(&self) -> &'static ArchMmuSpec {
        match self {
            Backend::I386(b) => b.spec(),
            Backend::M68k(b) => b.spec(),
        }
    }

    fn init_bounds(&self) -> Bounds {
        match self {
            Backend::I386(b) => b.init_bounds(),
            Backend::M68k(b) => b.init_bounds(),
        }
    }

    fn translate_va<T: PhysicalMemory + ?Sized>(
        &mut self,
        mem: &mut T,
        root: Address,
        va: Address,
    ) -> Result<Translation> {
        match self {
            Backend::I386(b) => b.translate_va(mem, root, va),
            Backend::M68k(b) => b.translate_va(mem, root, va),
        }
    }

    fn translate_pa_bootstrap(&self, va: Address) -> Option<Translation> {
        match self {
            Backend::I386(b) => b.translate_pa_bootstrap(va),
            Backend::M68k(b) => b.translate_pa_bootstrap(va),
        }
    }

    fn teardown(&mut self) {
        match self {
            Backend::I386(b) => b.teardown(),
            Backend::M68k(b) => b.teardown(),
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Backend({})", self.ident())
    }
}
