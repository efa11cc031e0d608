/*!
Specialized `Error` and `Result` types for memflow-kcore.
*/

use std::{error, fmt, result};

use log::{debug, error, info, trace, warn};

/// Error type for every fallible operation in this crate.
///
/// The first element names the component the error originated in, the second one describes
/// what went wrong. Use [`ErrorKind::class`] to tell apart header problems, translation
/// failures and raw i/o failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Error(pub ErrorOrigin, pub ErrorKind);

impl Error {
    /// Returns a static string representing the type of error.
    pub fn as_str(&self) -> &'static str {
        self.1.to_str()
    }

    /// Returns a static string representing the type of error.
    pub fn into_str(self) -> &'static str {
        self.as_str()
    }

    pub fn origin(&self) -> ErrorOrigin {
        self.0
    }

    pub fn kind(&self) -> ErrorKind {
        self.1
    }

    pub fn class(&self) -> ErrorClass {
        self.1.class()
    }

    /// The requested address was never resident in the captured image.
    pub fn is_not_resident(&self) -> bool {
        matches!(
            self.1,
            ErrorKind::InvalidDirectoryEntry | ErrorKind::InvalidTableEntry | ErrorKind::NotMapped
        )
    }

    /// The image itself (or the storage below it) is unusable.
    pub fn is_corrupt_image(&self) -> bool {
        matches!(self.class(), ErrorClass::Open | ErrorClass::Io)
    }

    pub fn log_error(self, err: impl fmt::Display) -> Self {
        error!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_warn(self, err: impl fmt::Display) -> Self {
        warn!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_info(self, err: impl fmt::Display) -> Self {
        info!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_debug(self, err: impl fmt::Display) -> Self {
        debug!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_trace(self, err: impl fmt::Display) -> Self {
        trace!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.0.to_str(), self.1.to_str())
    }
}

impl error::Error for Error {}

/// Convert from PartialError
impl<T> From<PartialError<T>> for Error {
    fn from(err: PartialError<T>) -> Self {
        err.error()
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorOrigin {
    Image,
    SegmentMap,
    PageTable,
    Architecture,
    Session,
    VirtualMemory,
    Args,
    Other,
}

impl ErrorOrigin {
    /// Returns a static string representing the type of error.
    pub fn to_str(self) -> &'static str {
        match self {
            ErrorOrigin::Image => "image",
            ErrorOrigin::SegmentMap => "segment map",
            ErrorOrigin::PageTable => "page table",
            ErrorOrigin::Architecture => "architecture",
            ErrorOrigin::Session => "session",
            ErrorOrigin::VirtualMemory => "virtual memory",
            ErrorOrigin::Args => "args",
            ErrorOrigin::Other => "other",
        }
    }
}

/// Coarse grouping of [`ErrorKind`]s as seen by tools consuming translated memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorClass {
    /// The image could not be opened (malformed header, bad arguments).
    Open,
    /// The address could not be translated.
    Translation,
    /// The underlying storage failed.
    Io,
    /// The session was used in a state that does not allow the operation.
    Lifecycle,
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    MalformedHeader,
    SegmentsExceedImage,
    UnsortedSegments,
    RootNotMapped,
    InvalidArchitecture,
    UnableToOpenFile,
    ArgValidation,

    InvalidDirectoryEntry,
    InvalidTableEntry,
    NotMapped,
    UnsupportedOnLiveTarget,
    OutOfBounds,

    UnableToReadFile,
    UnableToWriteFile,
    UnableToSeekFile,
    ReadOnly,

    Closed,
    AlreadyReady,
}

impl ErrorKind {
    /// Returns a static string representing the type of error.
    pub fn to_str(self) -> &'static str {
        match self {
            ErrorKind::MalformedHeader => "malformed image header",
            ErrorKind::SegmentsExceedImage => "segment list exceeds the image size",
            ErrorKind::UnsortedSegments => "segments overlap or are not in ascending order",
            ErrorKind::RootNotMapped => "page table root is outside of every segment",
            ErrorKind::InvalidArchitecture => "invalid architecture",
            ErrorKind::UnableToOpenFile => "unable to open file",
            ErrorKind::ArgValidation => "the argument could not be validated",

            ErrorKind::InvalidDirectoryEntry => "invalid translation (invalid directory entry)",
            ErrorKind::InvalidTableEntry => "invalid translation (invalid table entry)",
            ErrorKind::NotMapped => "physical address is not part of the image",
            ErrorKind::UnsupportedOnLiveTarget => "page table walk requested on a live target",
            ErrorKind::OutOfBounds => "out of bounds",

            ErrorKind::UnableToReadFile => "unable to read file",
            ErrorKind::UnableToWriteFile => "unable to write file",
            ErrorKind::UnableToSeekFile => "unable to seek file",
            ErrorKind::ReadOnly => "trying to write to a read only image",

            ErrorKind::Closed => "session is closed",
            ErrorKind::AlreadyReady => "page table root is already known",
        }
    }

    pub fn class(self) -> ErrorClass {
        match self {
            ErrorKind::MalformedHeader
            | ErrorKind::SegmentsExceedImage
            | ErrorKind::UnsortedSegments
            | ErrorKind::RootNotMapped
            | ErrorKind::InvalidArchitecture
            | ErrorKind::UnableToOpenFile
            | ErrorKind::ArgValidation => ErrorClass::Open,

            ErrorKind::InvalidDirectoryEntry
            | ErrorKind::InvalidTableEntry
            | ErrorKind::NotMapped
            | ErrorKind::UnsupportedOnLiveTarget
            | ErrorKind::OutOfBounds => ErrorClass::Translation,

            ErrorKind::UnableToReadFile
            | ErrorKind::UnableToWriteFile
            | ErrorKind::UnableToSeekFile
            | ErrorKind::ReadOnly => ErrorClass::Io,

            ErrorKind::Closed | ErrorKind::AlreadyReady => ErrorClass::Lifecycle,
        }
    }
}

/// Specialized `PartialError` type for virtual memory transfers that stopped half way.
///
/// Chunked transfers are not transactional: bytes that were transferred before the failure
/// stay transferred, and the error reports how far the request got.
#[derive(Clone, Eq, PartialEq, Hash)]
pub enum PartialError<T> {
    /// Hard Error
    ///
    /// Nothing was transferred.
    Error(Error),
    /// Partial Virtual Read Error
    ///
    /// `data` holds every byte that was read before `error` stopped the request.
    PartialVirtualRead { data: T, error: Error },
    /// Partial Virtual Write Error
    ///
    /// `written` bytes reached the image before `error` stopped the request.
    PartialVirtualWrite { written: usize, error: Error },
}

/// Convert from Error
impl<T> From<Error> for PartialError<T> {
    fn from(err: Error) -> Self {
        PartialError::Error(err)
    }
}

impl<T> PartialError<T> {
    /// Returns the error that stopped the transfer.
    pub fn error(&self) -> Error {
        match self {
            PartialError::Error(e) => *e,
            PartialError::PartialVirtualRead { error, .. } => *error,
            PartialError::PartialVirtualWrite { error, .. } => *error,
        }
    }

    /// Returns a static string representing the type of error.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartialError::Error(e) => e.as_str(),
            PartialError::PartialVirtualRead { .. } => "partial virtual read",
            PartialError::PartialVirtualWrite { .. } => "partial virtual write",
        }
    }
}

/// Custom fmt::Debug impl for the specialized `PartialError` type.
/// This is required due to our generic type T.
impl<T> fmt::Debug for PartialError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string())
    }
}

impl<T> fmt::Display for PartialError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PartialError::Error(e) => write!(f, "{}", e),
            PartialError::PartialVirtualRead { error, .. }
            | PartialError::PartialVirtualWrite { error, .. } => {
                write!(f, "{} ({})", self.as_str(), error)
            }
        }
    }
}

impl<T> error::Error for PartialError<T> {}

/// Specialized `Result` type for memflow-kcore results.
pub type Result<T> = result::Result<T, Error>;

/// Specialized `PartialResult` type for results of chunked transfers.
pub type PartialResult<T> = result::Result<T, PartialError<T>>;

/// Specialized `PartialResult` extension for results.
pub trait PartialResultExt<T> {
    /// Tries to extract the data from the `Result`.
    /// This will return a full error even if a partial error happened.
    fn data(self) -> Result<T>;

    /// Tries to extract the data or partial data from the `Result`.
    /// This will return a full error only if a hard error happened.
    /// A partial read will be converted to an `Ok(T)`.
    fn data_part(self) -> Result<T>;

    /// Maps the data contained in the partial result to another result.
    /// This is especially useful if you want to return a different result type
    /// but want to keep the partial result information.
    fn map_data<U, F: FnOnce(T) -> U>(self, func: F) -> PartialResult<U>;
}

impl<T> PartialResultExt<T> for PartialResult<T> {
    fn data(self) -> Result<T> {
        self.map_err(|err| err.error())
    }

    fn data_part(self) -> Result<T> {
        match self {
            Ok(data) => Ok(data),
            Err(PartialError::PartialVirtualRead { data, .. }) => Ok(data),
            Err(err) => Err(err.error()),
        }
    }

    fn map_data<U, F: FnOnce(T) -> U>(self, func: F) -> PartialResult<U> {
        match self {
            Ok(data) => Ok(func(data)),
            Err(PartialError::Error(e)) => Err(PartialError::Error(e)),
            Err(PartialError::PartialVirtualRead { data, error }) => {
                Err(PartialError::PartialVirtualRead {
                    data: func(data),
                    error,
                })
            }
            Err(PartialError::PartialVirtualWrite { written, error }) => {
                Err(PartialError::PartialVirtualWrite { written, error })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify() {
        let err = Error(ErrorOrigin::PageTable, ErrorKind::InvalidTableEntry);
        assert_eq!(err.class(), ErrorClass::Translation);
        assert!(err.is_not_resident());
        assert!(!err.is_corrupt_image());

        let err = Error(ErrorOrigin::Image, ErrorKind::UnableToReadFile);
        assert!(err.is_corrupt_image());
        assert!(!err.is_not_resident());

        let err = Error(ErrorOrigin::Session, ErrorKind::UnsupportedOnLiveTarget);
        assert!(!err.is_corrupt_image());
        assert!(!err.is_not_resident());
    }

    #[test]
    fn display() {
        let err = Error(ErrorOrigin::SegmentMap, ErrorKind::NotMapped);
        assert_eq!(
            err.to_string(),
            "segment map: physical address is not part of the image"
        );
    }

    #[test]
    fn partial_data() {
        let error = Error(ErrorOrigin::PageTable, ErrorKind::InvalidTableEntry);
        let res: PartialResult<Vec<u8>> = Err(PartialError::PartialVirtualRead {
            data: vec![1, 2, 3],
            error,
        });
        assert_eq!(res.clone().data(), Err(error));
        assert_eq!(res.clone().map_data(|d| d.len()).data_part(), Ok(3));
        assert_eq!(res.data_part(), Ok(vec![1, 2, 3]));

        let res: PartialResult<()> = Err(PartialError::PartialVirtualWrite { written: 8, error });
        assert_eq!(res.data_part(), Err(error));
    }
}
