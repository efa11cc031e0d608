use crate::types::Address;
use crate::Result;

use dataview::Pod;

/// The `PhysicalMemory` trait is implemented by memory backends
/// and provides a generic way to read and write from/to the physical memory of the
/// captured machine.
///
/// The page table walkers only ever read through this trait, which keeps them independent of
/// how the image is stored.
///
/// # Examples
///
/// Implementing `PhysicalMemory` for a memory backend:
/// ```
/// use memflow_kcore::mem::PhysicalMemory;
/// use memflow_kcore::types::Address;
/// use memflow_kcore::error::Result;
///
/// pub struct MemoryBackend {
///     mem: Box<[u8]>,
/// }
///
/// impl PhysicalMemory for MemoryBackend {
///     fn phys_read_raw_into(&mut self, addr: Address, out: &mut [u8]) -> Result<()> {
///         out.copy_from_slice(&self.mem[addr.as_usize()..(addr.as_usize() + out.len())]);
///         Ok(())
///     }
///
///     fn phys_write_raw(&mut self, addr: Address, data: &[u8]) -> Result<()> {
///         self.mem[addr.as_usize()..(addr.as_usize() + data.len())].copy_from_slice(data);
///         Ok(())
///     }
/// }
/// ```
pub trait PhysicalMemory {
    fn phys_read_raw_into(&mut self, addr: Address, out: &mut [u8]) -> Result<()>;
    fn phys_write_raw(&mut self, addr: Address, data: &[u8]) -> Result<()>;

    // read helpers
    fn phys_read_into<T: Pod + ?Sized>(&mut self, addr: Address, out: &mut T) -> Result<()>
    where
        Self: Sized,
    {
        self.phys_read_raw_into(addr, out.as_bytes_mut())
    }

    fn phys_read_raw(&mut self, addr: Address, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.phys_read_raw_into(addr, &mut *buf)?;
        Ok(buf)
    }

    // write helpers
    fn phys_write<T: Pod + ?Sized>(&mut self, addr: Address, data: &T) -> Result<()>
    where
        Self: Sized,
    {
        self.phys_write_raw(addr, data.as_bytes())
    }
}

// forward impls
impl<T: PhysicalMemory + ?Sized, P: std::ops::DerefMut<Target = T>> PhysicalMemory for P {
    fn phys_read_raw_into(&mut self, addr: Address, out: &mut [u8]) -> Result<()> {
        (**self).phys_read_raw_into(addr, out)
    }

    fn phys_write_raw(&mut self, addr: Address, data: &[u8]) -> Result<()> {
        (**self).phys_write_raw(addr, data)
    }
}
