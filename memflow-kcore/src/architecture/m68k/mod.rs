pub mod mmu030;

use super::{ArchBackend, ArchMmuSpec, ArchitectureIdent, Bump, Translation};

use crate::error::Result;
use crate::mem::PhysicalMemory;
use crate::types::Address;

use log::debug;

/// The window of kernel virtual memory that is mapped linearly onto physical memory.
///
/// Addresses in `kernbase..end` translate to `va - kernbase + reloc` without touching the
/// page tables.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct KernelRelocation {
    pub kernbase: Address,
    pub end: Address,
    pub reloc: Address,
}

impl KernelRelocation {
    pub fn new(kernbase: Address, end: Address, reloc: Address) -> Self {
        Self {
            kernbase,
            end,
            reloc,
        }
    }

    pub fn contains(&self, va: Address) -> bool {
        self.kernbase <= va && va < self.end
    }

    /// Translates `va` if it lies inside the window. The run never crosses a page boundary
    /// nor the end of the window.
    pub fn translate(&self, va: Address, page_size: usize) -> Option<Translation> {
        if !self.contains(va) {
            return None;
        }
        let pa = self.reloc.checked_add(va - self.kernbase)?;
        let page_left = (page_size - va.page_offset(page_size)) as u64;
        let window_left = self.end - va;
        Some(Translation {
            pa,
            run: page_left.min(window_left) as usize,
        })
    }
}

/// Backend for 68030 style MMUs.
pub struct M68kBackend {
    spec: &'static ArchMmuSpec,
    reloc: Option<KernelRelocation>,
    arena: Bump,
}

impl M68kBackend {
    pub fn new(spec: &'static ArchMmuSpec, reloc: Option<KernelRelocation>) -> Self {
        if let Some(reloc) = reloc {
            debug!(
                "kernel relocation window {:x}-{:x} -> {:x}",
                reloc.kernbase, reloc.end, reloc.reloc
            );
        }
        Self {
            spec,
            reloc,
            arena: Bump::new(),
        }
    }

    pub fn relocation(&self) -> Option<KernelRelocation> {
        self.reloc
    }
}

impl ArchBackend for M68kBackend {
    fn ident(&self) -> ArchitectureIdent {
        ArchitectureIdent::M68k
    }

    fn spec(&self) -> &'static ArchMmuSpec {
        self.spec
    }

    fn translate_va<T: PhysicalMemory + ?Sized>(
        &mut self,
        mem: &mut T,
        root: Address,
        va: Address,
    ) -> Result<Translation> {
        self.spec.check_virt_addr(va)?;

        if let Some(tr) = self
            .reloc
            .and_then(|r| r.translate(va, self.spec.page_size()))
        {
            vtop_trace!("relocated {:x} -> {:x}", va, tr.pa);
            self.spec.check_phys_addr(tr.pa)?;
            return Ok(tr);
        }

        self.arena.reset();
        self.spec.virt_to_phys(mem, root, va, &self.arena)
    }

    fn teardown(&mut self) {
        self.arena = Bump::new();
    }
}
