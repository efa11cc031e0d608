pub mod x32;

use super::{ArchBackend, ArchMmuSpec, ArchitectureIdent, Bump, Translation};

use crate::error::Result;
use crate::mem::PhysicalMemory;
use crate::types::Address;

/// Backend for 32-bit x86 kernels.
pub struct X86Backend {
    spec: &'static ArchMmuSpec,
    arena: Bump,
}

impl X86Backend {
    pub fn new(spec: &'static ArchMmuSpec) -> Self {
        Self {
            spec,
            arena: Bump::new(),
        }
    }
}

impl ArchBackend for X86Backend {
    fn ident(&self) -> ArchitectureIdent {
        ArchitectureIdent::I386
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
        self.arena.reset();
        self.spec.virt_to_phys(mem, root, va, &self.arena)
    }

    // before the kernel switched paging on, virtual and physical addresses are the same
    fn translate_pa_bootstrap(&self, va: Address) -> Option<Translation> {
        if !self.spec.bootstrap_identity {
            return None;
        }
        let page_size = self.spec.page_size();
        Some(Translation {
            pa: va,
            run: page_size - va.page_offset(page_size),
        })
    }

    fn teardown(&mut self) {
        self.arena = Bump::new();
    }
}
