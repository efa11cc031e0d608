/*!
This crate translates kernel virtual addresses inside captured kernel core images.

A core image is a flat file holding a small header followed by the contents of every
physical memory segment of the crashed machine. Resolving a kernel virtual address means
walking the page tables stored *inside* the image and then locating the resulting physical
address in the file.

It contains abstractions over [memory addresses](types/index.html),
[the supported MMU architectures](architecture/index.html),
[physical and virtual memory access](mem/index.html),
[image i/o](connector/index.html) and the [translation session](session/index.html)
that ties them together.

# Examples

```no_run
use memflow_kcore::*;

let mut session = Session::open("/var/crash/netbsd.0.core", ArchitectureIdent::I386).unwrap();
let bytes = session.virt_read_raw(Address::from(0xc010_0000u64), 16).unwrap();
println!("{:x?}", bytes);
session.close();
```
*/

#[macro_use]
extern crate bitflags;

pub mod error;
#[doc(hidden)]
pub use error::*;

pub mod types;
#[doc(hidden)]
pub use types::*;

#[macro_use]
pub mod architecture;
#[doc(hidden)]
pub use architecture::*;

pub mod mem;
#[doc(hidden)]
pub use mem::*;

pub mod connector;
#[doc(hidden)]
pub use connector::*;

pub mod session;
#[doc(hidden)]
pub use session::*;

#[cfg(any(test, feature = "dummy_mem"))]
pub mod dummy;
