use super::{live_read, live_write, Session, Target};

use crate::architecture::{Backend, TranslationBase};
use crate::connector::ImageMemory;
use crate::error::{Error, ErrorKind, ErrorOrigin, PartialError, PartialResult, Result};
use crate::mem::VirtualMemory;
use crate::types::Address;

use std::io::{Read, Seek, Write};

/// Resolves the next run of bytes starting at `va`.
///
/// Returns the file offset of `va` and the number of bytes that can be transferred from
/// there in one go, bounded by the translated run, the containing segment and `remaining`.
fn next_chunk<T: Read + Seek + Write>(
    backend: &mut Backend,
    mem: &mut ImageMemory<T>,
    base: TranslationBase,
    va: Address,
    remaining: usize,
) -> Result<(u64, usize)> {
    let tr = backend.translate(mem, base, va)?;
    let (offset, segment_left) = mem.header().segments().locate_range(tr.pa)?;
    let len = remaining
        .min(tr.run)
        .min(segment_left.min(usize::MAX as u64) as usize);
    vtop_trace!(
        "chunk va={:x} pa={:x} offset={:x} len={:x}",
        va,
        tr.pa,
        offset,
        len
    );
    Ok((offset, len))
}

fn partial_read(done: usize, error: Error) -> PartialError<usize> {
    if done == 0 {
        PartialError::Error(error)
    } else {
        PartialError::PartialVirtualRead { data: done, error }
    }
}

fn partial_write(done: usize, error: Error) -> PartialError<usize> {
    if done == 0 {
        PartialError::Error(error)
    } else {
        PartialError::PartialVirtualWrite {
            written: done,
            error,
        }
    }
}

impl<T: Read + Seek + Write> VirtualMemory for Session<T> {
    fn virt_read_raw_into(&mut self, addr: Address, out: &mut [u8]) -> PartialResult<usize> {
        let inner = self.inner_mut()?;
        let total = out.len();

        let mem = match &mut inner.target {
            Target::Live(handle) => {
                live_read(handle, addr, out)?;
                return Ok(total);
            }
            Target::Dead(mem) => mem,
        };

        let mut done = 0;
        while done < total {
            let step = next_chunk(&mut inner.backend, mem, inner.base, addr + done, total - done)
                .and_then(|(offset, len)| {
                    mem.read_at(offset, &mut out[done..done + len])?;
                    Ok(len)
                });
            match step {
                Ok(len) => done += len,
                Err(error) => return Err(partial_read(done, error)),
            }
        }
        Ok(done)
    }

    fn virt_write_raw(&mut self, addr: Address, data: &[u8]) -> PartialResult<usize> {
        let inner = self.inner_mut()?;
        if !inner.writable {
            return Err(Error(ErrorOrigin::Session, ErrorKind::ReadOnly).into());
        }
        let total = data.len();

        let mem = match &mut inner.target {
            Target::Live(handle) => {
                live_write(handle, addr, data)?;
                return Ok(total);
            }
            Target::Dead(mem) => mem,
        };

        let mut done = 0;
        while done < total {
            let step = next_chunk(&mut inner.backend, mem, inner.base, addr + done, total - done)
                .and_then(|(offset, len)| {
                    mem.write_at(offset, &data[done..done + len])?;
                    Ok(len)
                });
            match step {
                Ok(len) => done += len,
                Err(error) => return Err(partial_write(done, error)),
            }
        }
        Ok(done)
    }
}
