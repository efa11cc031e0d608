use crate::architecture::m68k::KernelRelocation;
use crate::architecture::ArchitectureIdent;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::Address;

use std::convert::TryFrom;
use std::str::FromStr;

/// Describes how a kernel core image should be opened.
///
/// Arguments are given as a comma separated list. The first entry without a `=` names the
/// architecture, `writable` and `live` are plain flags.
///
/// | key      | value                                    |
/// |----------|------------------------------------------|
/// | `arch`   | architecture, same as the default entry  |
/// | `label`  | size of the label region (hex)           |
/// | `reloc`  | `kernbase:end:phys` relocation window    |
///
/// # Examples
///
/// Construct from a string:
/// ```
/// use memflow_kcore::connector::ImageArgs;
/// use memflow_kcore::architecture::ArchitectureIdent;
/// use std::convert::TryFrom;
///
/// let args = ImageArgs::try_from("m68k,label=0x200,writable").unwrap();
/// assert_eq!(args.arch(), ArchitectureIdent::M68k);
/// assert_eq!(args.label_size(), Some(0x200));
/// assert!(args.is_writable());
/// ```
///
/// Construct as builder:
/// ```
/// use memflow_kcore::connector::ImageArgs;
/// use memflow_kcore::architecture::ArchitectureIdent;
///
/// let args = ImageArgs::new(ArchitectureIdent::I386)
///     .label_size_override(0x200)
///     .writable(true);
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ImageArgs {
    arch: ArchitectureIdent,
    label_size: Option<usize>,
    writable: bool,
    live: bool,
    reloc: Option<KernelRelocation>,
}

impl ImageArgs {
    pub fn new(arch: ArchitectureIdent) -> Self {
        Self {
            arch,
            label_size: None,
            writable: false,
            live: false,
            reloc: None,
        }
    }

    pub fn try_parse_str(args: &str) -> Result<Self> {
        let mut arch = None;
        let mut label_size = None;
        let mut writable = false;
        let mut live = false;
        let mut reloc = None;

        for (i, kv) in args.split(',').map(str::trim).enumerate() {
            if kv.is_empty() {
                continue;
            }

            match kv.split_once('=') {
                Some(("arch", value)) => arch = Some(value.parse()?),
                Some(("label", value)) => label_size = Some(parse_label(value)?),
                Some(("reloc", value)) => reloc = Some(parse_reloc(value)?),
                Some(("writable", value)) => writable = parse_bool(value)?,
                Some(("live", value)) => live = parse_bool(value)?,
                Some((key, _)) => {
                    return Err(Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
                        .log_error(format_args!("unknown argument '{}'", key)))
                }
                None if kv == "writable" => writable = true,
                None if kv == "live" => live = true,
                None if i == 0 => arch = Some(kv.parse()?),
                None => {
                    return Err(Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
                        .log_error(format_args!("unexpected argument '{}'", kv)))
                }
            }
        }

        let arch = arch.ok_or_else(|| {
            Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
                .log_error("no architecture was specified")
        })?;

        Ok(Self {
            arch,
            label_size,
            writable,
            live,
            reloc,
        })
    }

    pub fn label_size_override(mut self, label_size: usize) -> Self {
        self.label_size = Some(label_size);
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    pub fn relocation(mut self, reloc: KernelRelocation) -> Self {
        self.reloc = Some(reloc);
        self
    }

    pub fn arch(&self) -> ArchitectureIdent {
        self.arch
    }

    /// Label size given explicitly, `None` if the architecture default applies.
    pub fn label_size(&self) -> Option<usize> {
        self.label_size
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn reloc(&self) -> Option<KernelRelocation> {
        self.reloc
    }
}

impl From<ArchitectureIdent> for ImageArgs {
    fn from(arch: ArchitectureIdent) -> Self {
        ImageArgs::new(arch)
    }
}

impl TryFrom<&str> for ImageArgs {
    type Error = Error;

    fn try_from(args: &str) -> Result<Self> {
        ImageArgs::try_parse_str(args)
    }
}

impl FromStr for ImageArgs {
    type Err = Error;

    fn from_str(args: &str) -> Result<Self> {
        ImageArgs::try_parse_str(args)
    }
}

fn parse_hex(value: &str) -> Result<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16).map_err(|err| {
        Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
            .log_error(format_args!("'{}' is not a hex number: {}", value, err))
    })
}

fn parse_label(value: &str) -> Result<usize> {
    usize::try_from(parse_hex(value)?).map_err(|_| {
        Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
            .log_error(format_args!("label size '{}' does not fit the host", value))
    })
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
            .log_error(format_args!("'{}' is not a boolean", value))),
    }
}

fn parse_reloc(value: &str) -> Result<KernelRelocation> {
    let parts = value
        .split(':')
        .map(parse_hex)
        .collect::<Result<Vec<_>>>()?;

    match parts.as_slice() {
        [kernbase, end, reloc] if kernbase <= end => Ok(KernelRelocation::new(
            Address::from(*kernbase),
            Address::from(*end),
            Address::from(*reloc),
        )),
        _ => Err(Error(ErrorOrigin::Args, ErrorKind::ArgValidation).log_error(format_args!(
            "'{}' is not a kernbase:end:phys relocation window",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn from_str_default() {
        let args = ImageArgs::try_from("i386").unwrap();
        assert_eq!(args.arch(), ArchitectureIdent::I386);
        assert_eq!(args.label_size(), None);
        assert!(!args.is_writable());
        assert!(!args.is_live());
        assert_eq!(args.reloc(), None);
    }

    #[test]
    pub fn from_str_full() {
        let argstr = "m68k,label=200,writable,reloc=0x0:0x2a0000:0x800000";
        let args = ImageArgs::try_from(argstr).unwrap();
        assert_eq!(args.arch(), ArchitectureIdent::M68k);
        assert_eq!(args.label_size(), Some(0x200));
        assert!(args.is_writable());
        assert_eq!(
            args.reloc(),
            Some(KernelRelocation::new(
                0x0.into(),
                0x2a_0000.into(),
                0x80_0000.into()
            ))
        );
    }

    #[test]
    pub fn from_str_arch_key() {
        let args: ImageArgs = "live=true,arch=x86_32".parse().unwrap();
        assert_eq!(args.arch(), ArchitectureIdent::I386);
        assert!(args.is_live());
    }

    #[test]
    pub fn from_str_errors() {
        let err = Err(Error(ErrorOrigin::Args, ErrorKind::ArgValidation));
        assert_eq!(ImageArgs::try_from("label=0x200"), err);
        assert_eq!(ImageArgs::try_from("i386,label=zz"), err);
        assert_eq!(ImageArgs::try_from("i386,colour=blue"), err);
        assert_eq!(ImageArgs::try_from("i386,m68k"), err);
        assert_eq!(ImageArgs::try_from("m68k,reloc=0x10:0x0:0x0"), err);
        assert_eq!(
            ImageArgs::try_from("sparc64"),
            Err(Error(ErrorOrigin::Architecture, ErrorKind::InvalidArchitecture))
        );
    }

    #[test]
    pub fn builder() {
        let args = ImageArgs::new(ArchitectureIdent::I386)
            .label_size_override(0x10)
            .writable(true)
            .live(true);
        assert_eq!(args.label_size(), Some(0x10));
        assert!(args.is_writable());
        assert!(args.is_live());
    }
}
