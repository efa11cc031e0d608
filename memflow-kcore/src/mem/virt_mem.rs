use crate::error::{PartialError, PartialResult, PartialResultExt, Result};
use crate::types::Address;

use std::mem::MaybeUninit;

use dataview::Pod;

/**
The `VirtualMemory` trait implements access to the kernel virtual address space stored in a
captured image and provides a generic way to read and write from/to it.

Requests of arbitrary length are split into chunks that never cross a page (or segment)
boundary, every chunk is translated and transferred on its own. A transfer that fails half
way is not rolled back: the partial error reports how many bytes made it.

There are 2 methods which are required to be implemented by the provider of this trait.

# Examples

Reading from `VirtualMemory`:
```
use memflow_kcore::types::Address;
use memflow_kcore::mem::VirtualMemory;

fn read<T: VirtualMemory>(virt_mem: &mut T) {
    let mut addr = 0u32;
    virt_mem.virt_read_into(Address::from(0xc010_0000u64), &mut addr).unwrap();
    println!("addr: {:x}", addr);
}
```
*/
pub trait VirtualMemory {
    /// Fills `out` with the bytes stored at the virtual address `addr`.
    ///
    /// On success the whole buffer was filled and its length is returned. A
    /// `PartialVirtualRead` error carries the number of leading bytes of `out` that are valid.
    fn virt_read_raw_into(&mut self, addr: Address, out: &mut [u8]) -> PartialResult<usize>;

    /// Writes `data` to the virtual address `addr`, returning the number of bytes written.
    fn virt_write_raw(&mut self, addr: Address, data: &[u8]) -> PartialResult<usize>;

    // read helpers
    fn virt_read_into<T: Pod + ?Sized>(&mut self, addr: Address, out: &mut T) -> Result<()>
    where
        Self: Sized,
    {
        self.virt_read_raw_into(addr, out.as_bytes_mut())
            .data()
            .map(|_| ())
    }

    fn virt_read_raw(&mut self, addr: Address, len: usize) -> PartialResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        match self.virt_read_raw_into(addr, &mut *buf) {
            Ok(_) => Ok(buf),
            Err(PartialError::PartialVirtualRead { data, error }) => {
                buf.truncate(data);
                Err(PartialError::PartialVirtualRead { data: buf, error })
            }
            Err(PartialError::PartialVirtualWrite { written, error }) => {
                Err(PartialError::PartialVirtualWrite { written, error })
            }
            Err(PartialError::Error(err)) => Err(PartialError::Error(err)),
        }
    }

    fn virt_read<T: Pod + Sized>(&mut self, addr: Address) -> Result<T>
    where
        Self: Sized,
    {
        // Pod types are valid for any bit pattern
        let mut obj: T = unsafe { MaybeUninit::zeroed().assume_init() };
        self.virt_read_into(addr, &mut obj)?;
        Ok(obj)
    }

    // write helpers
    fn virt_write<T: Pod + ?Sized>(&mut self, addr: Address, data: &T) -> PartialResult<usize>
    where
        Self: Sized,
    {
        self.virt_write_raw(addr, data.as_bytes())
    }
}

// forward impls
impl<T: VirtualMemory + ?Sized, P: std::ops::DerefMut<Target = T>> VirtualMemory for P {
    fn virt_read_raw_into(&mut self, addr: Address, out: &mut [u8]) -> PartialResult<usize> {
        (**self).virt_read_raw_into(addr, out)
    }

    fn virt_write_raw(&mut self, addr: Address, data: &[u8]) -> PartialResult<usize> {
        (**self).virt_write_raw(addr, data)
    }
}
