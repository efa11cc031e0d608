/*!
The translation session ties an opened image, its header and the architecture backend
together. It is the single entry point for translating and accessing kernel memory.

A session is either `Dead`, bound to a static core image whose page tables are walked, or
`Live`, bound to a memory device of a running system. Live sessions never walk page tables,
requests are handed to the device unchanged.
*/

mod chunked;

#[cfg(test)]
mod tests;

use crate::architecture::{
    ArchBackend, ArchitectureIdent, Backend, Bounds, Translation, TranslationBase,
};
use crate::connector::{ImageArgs, ImageHeader, ImageMemory};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::mem::{PhysicalMemory, VirtualMemory};
use crate::types::Address;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};

/// Memory devices that expose a running system instead of a captured image.
const LIVE_DEVICES: &[&str] = &["/dev/mem", "/dev/kmem"];

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum Liveness {
    /// A static captured image, translations walk its page tables.
    Dead,
    /// A running system, translations are not available.
    Live,
}

/// The storage a session reads from.
pub enum Target<T> {
    Dead(ImageMemory<T>),
    Live(T),
}

impl<T> Target<T> {
    pub fn liveness(&self) -> Liveness {
        match self {
            Target::Dead(_) => Liveness::Dead,
            Target::Live(_) => Liveness::Live,
        }
    }
}

struct SessionInner<T> {
    target: Target<T>,
    backend: Backend,
    base: TranslationBase,
    writable: bool,
}

/// A translation session bound to one image.
///
/// The architecture backend is chosen when the session is opened and stays fixed for its
/// whole lifetime. A session is not internally synchronized, concurrent use has to be
/// serialized by the caller.
///
/// # Examples
///
/// ```no_run
/// use memflow_kcore::{ArchitectureIdent, Session, VirtualMemory};
///
/// let mut session = Session::open("/var/crash/netbsd.0.core", ArchitectureIdent::I386).unwrap();
/// let tr = session.translate(0xc010_0000u64.into()).unwrap();
/// println!("{:x} maps to {:x}", 0xc010_0000u64, tr.pa);
///
/// let mut word = 0u32;
/// session.virt_read_into(0xc010_0000u64.into(), &mut word).unwrap();
/// session.close();
/// ```
pub struct Session<T = File> {
    inner: Option<SessionInner<T>>,
}

impl Session<File> {
    /// Opens the image at `path` read-only.
    pub fn open<P: AsRef<Path>>(path: P, arch: ArchitectureIdent) -> Result<Self> {
        Self::open_args(path, ImageArgs::new(arch))
    }

    /// Opens the image at `path` as described by `args`.
    ///
    /// Memory devices such as `/dev/mem` are always opened as live targets.
    pub fn open_args<P: AsRef<Path>>(path: P, args: ImageArgs) -> Result<Self> {
        let path = path.as_ref();
        let live = args.is_live() || LIVE_DEVICES.iter().any(|dev| path == Path::new(dev));

        let file = OpenOptions::new()
            .read(true)
            .write(args.is_writable())
            .open(path)
            .map_err(|err| {
                Error(ErrorOrigin::Session, ErrorKind::UnableToOpenFile)
                    .log_error(format_args!("{}: {}", path.display(), err))
            })?;

        Self::open_with(file, args.live(live))
    }
}

impl<T: Read + Seek + Write> Session<T> {
    /// Opens a session on an already opened image handle.
    pub fn open_with(mut handle: T, args: ImageArgs) -> Result<Self> {
        if args.is_live() {
            return Ok(Self::open_live(handle, args));
        }

        let spec = args.arch().spec();
        let label_size = args.label_size().unwrap_or(spec.label_size);
        let header = ImageHeader::parse(&mut handle, spec, label_size)?;

        Ok(Self::open_shared(handle, Arc::new(header), args))
    }

    /// Opens a session reusing a header that was already parsed for the same image.
    pub fn open_shared(handle: T, header: Arc<ImageHeader>, args: ImageArgs) -> Self {
        let backend = Backend::new(args.arch(), args.reloc());
        let base = header.translation_base();

        info!(
            "opened {} image: base={:?} segments={} writable={}",
            args.arch(),
            base,
            header.segments().len(),
            args.is_writable()
        );

        Self {
            inner: Some(SessionInner {
                target: Target::Dead(ImageMemory::with_header(
                    handle,
                    header,
                    args.is_writable(),
                )),
                backend,
                base,
                writable: args.is_writable(),
            }),
        }
    }

    /// Opens a session on a memory device of a running system.
    pub fn open_live(handle: T, args: ImageArgs) -> Self {
        warn!("opened live {} target, page table walks are disabled", args.arch());

        Self {
            inner: Some(SessionInner {
                target: Target::Live(handle),
                backend: Backend::new(args.arch(), args.reloc()),
                base: TranslationBase::Bootstrapping,
                writable: args.is_writable(),
            }),
        }
    }
}

impl<T> Session<T> {
    fn inner(&self) -> Result<&SessionInner<T>> {
        self.inner
            .as_ref()
            .ok_or(Error(ErrorOrigin::Session, ErrorKind::Closed))
    }

    fn inner_mut(&mut self) -> Result<&mut SessionInner<T>> {
        self.inner
            .as_mut()
            .ok_or(Error(ErrorOrigin::Session, ErrorKind::Closed))
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn architecture(&self) -> Result<ArchitectureIdent> {
        self.inner().map(|inner| inner.backend.ident())
    }

    pub fn liveness(&self) -> Result<Liveness> {
        self.inner().map(|inner| inner.target.liveness())
    }

    pub fn is_writable(&self) -> Result<bool> {
        self.inner().map(|inner| inner.writable)
    }

    /// The image header, `None` for live sessions.
    pub fn header(&self) -> Result<Option<&Arc<ImageHeader>>> {
        self.inner().map(|inner| match &inner.target {
            Target::Dead(mem) => Some(mem.header()),
            Target::Live(_) => None,
        })
    }

    pub fn translation_base(&self) -> Result<TranslationBase> {
        self.inner().map(|inner| inner.base)
    }

    /// Returns the user/kernel split points of the session's architecture.
    pub fn bounds(&self) -> Result<Bounds> {
        self.inner().map(|inner| inner.backend.init_bounds())
    }

    /// Releases the backend state and the image handle.
    ///
    /// Closing an already closed session does nothing.
    pub fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.backend.teardown();
            debug!("closed {} session", inner.backend.ident());
        }
    }
}

impl<T: Read + Seek + Write> Session<T> {
    /// Translates the kernel virtual address `va` into a physical address.
    ///
    /// Fails with `UnsupportedOnLiveTarget` on live sessions without touching the target.
    pub fn translate(&mut self, va: Address) -> Result<Translation> {
        let inner = self.inner_mut()?;
        match &mut inner.target {
            Target::Live(_) => Err(
                Error(ErrorOrigin::Session, ErrorKind::UnsupportedOnLiveTarget)
                    .log_warn(format_args!("translate({:x})", va)),
            ),
            Target::Dead(mem) => inner.backend.translate(mem, inner.base, va),
        }
    }

    /// Installs the page table root of a session that was captured before the root was
    /// known.
    pub fn set_page_table_root(&mut self, root: Address) -> Result<()> {
        let inner = self.inner_mut()?;

        let mem = match &inner.target {
            Target::Dead(mem) => mem,
            Target::Live(_) => {
                return Err(Error(ErrorOrigin::Session, ErrorKind::UnsupportedOnLiveTarget))
            }
        };

        if let TranslationBase::Ready(current) = inner.base {
            return Err(Error(ErrorOrigin::Session, ErrorKind::AlreadyReady)
                .log_warn(format_args!("page_table_root={:x}", current)));
        }

        if root.is_null()
            || (inner.backend.spec().eager_root_validation
                && mem.header().segments().find(root).is_none())
        {
            return Err(Error(ErrorOrigin::Session, ErrorKind::RootNotMapped)
                .log_error(format_args!("page_table_root={:x}", root)));
        }

        info!("page table root set to {:x}", root);
        inner.base = TranslationBase::Ready(root);
        Ok(())
    }

    /// Reads a pointer sized word in the byte order of the captured machine.
    pub fn virt_read_addr(&mut self, va: Address) -> Result<Address> {
        let spec = self.inner()?.backend.spec();
        let mut buf = [0u8; 8];
        let buf = &mut buf[..spec.addr_size as usize];
        self.virt_read_raw_into(va, buf).map_err(|err| err.error())?;
        Ok(spec.endianess.decode(buf).into())
    }
}

impl<T: Read + Seek + Write> PhysicalMemory for Session<T> {
    fn phys_read_raw_into(&mut self, addr: Address, out: &mut [u8]) -> Result<()> {
        match &mut self.inner_mut()?.target {
            Target::Dead(mem) => mem.phys_read_raw_into(addr, out),
            Target::Live(handle) => live_read(handle, addr, out),
        }
    }

    fn phys_write_raw(&mut self, addr: Address, data: &[u8]) -> Result<()> {
        let inner = self.inner_mut()?;
        if !inner.writable {
            return Err(Error(ErrorOrigin::Session, ErrorKind::ReadOnly));
        }
        match &mut inner.target {
            Target::Dead(mem) => mem.phys_write_raw(addr, data),
            Target::Live(handle) => live_write(handle, addr, data),
        }
    }
}

// memory devices are addressed by the address itself
fn live_read<T: Read + Seek>(handle: &mut T, addr: Address, out: &mut [u8]) -> Result<()> {
    handle
        .seek(SeekFrom::Start(addr.as_u64()))
        .map_err(|err| Error(ErrorOrigin::Session, ErrorKind::UnableToSeekFile).log_error(err))?;
    handle
        .read_exact(out)
        .map_err(|err| Error(ErrorOrigin::Session, ErrorKind::UnableToReadFile).log_error(err))
}

fn live_write<T: Write + Seek>(handle: &mut T, addr: Address, data: &[u8]) -> Result<()> {
    handle
        .seek(SeekFrom::Start(addr.as_u64()))
        .map_err(|err| Error(ErrorOrigin::Session, ErrorKind::UnableToSeekFile).log_error(err))?;
    handle
        .write_all(data)
        .map_err(|err| Error(ErrorOrigin::Session, ErrorKind::UnableToWriteFile).log_error(err))
}
