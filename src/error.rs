//! Error types for ziparchive

use std::io;
use thiserror::Error;

/// Result type for ziparchive operations
pub type Result<T> = std::result::Result<T, ZipError>;

/// Broad classification of a [`ZipError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The archive bytes are malformed or use a feature this codec does not read
    Format,
    /// A name, comment, extra-field block or entry exceeds a format or memory limit
    Capacity,
    /// The operation is not legal in the current archive mode or entry state
    State,
    /// A value was rejected at the API boundary
    Argument,
    /// I/O error from the backing stream
    Io,
}

/// Error types that can occur during ZIP operations
#[derive(Debug, Error)]
pub enum ZipError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid ZIP format or structure
    #[error("Invalid ZIP format: {0}")]
    InvalidFormat(String),

    /// Local file header missing or inconsistent with the central directory
    #[error("Local file header is corrupt: {0}")]
    LocalHeaderCorrupt(String),

    /// Unsupported compression method
    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// Archive spans more than one disk
    #[error("Split or spanned archives are not supported")]
    SplitArchive,

    /// Entry data does not match the stored CRC-32
    #[error("CRC mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch { expected: u32, computed: u32 },

    /// Entry name encodes to more bytes than a header can hold
    #[error("Entry name is {0} bytes long, the limit is 65535")]
    EntryNameTooLong(usize),

    /// Comment encodes to more bytes than a header can hold
    #[error("Comment is {0} bytes long, the limit is 65535")]
    CommentTooLong(usize),

    /// Entry is too large to be buffered in memory
    #[error("Entry {name} is too large to open in update mode ({size} bytes)")]
    EntryTooLarge { name: String, size: u64 },

    /// Data written to an entry whose name marks it as a directory
    #[error("Directory entry {0} cannot contain data")]
    DirectoryWithData(String),

    /// Operation not legal in the current archive mode or entry state
    #[error("Invalid operation: {0}")]
    InvalidState(String),

    /// Entry handle refers to an entry that was deleted
    #[error("Entry has been deleted from the archive")]
    EntryDeleted,

    /// Entry not found in ZIP archive
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Timestamp outside the range a DOS date-time can hold
    #[error("Date-time out of range: {0}")]
    DateTimeOutOfRange(String),

    /// Value rejected at the API boundary
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ZipError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ZipError::Io(_) => ErrorKind::Io,
            ZipError::InvalidFormat(_)
            | ZipError::LocalHeaderCorrupt(_)
            | ZipError::UnsupportedCompression(_)
            | ZipError::SplitArchive
            | ZipError::CrcMismatch { .. } => ErrorKind::Format,
            ZipError::EntryNameTooLong(_)
            | ZipError::CommentTooLong(_)
            | ZipError::EntryTooLarge { .. } => ErrorKind::Capacity,
            ZipError::DirectoryWithData(_)
            | ZipError::InvalidState(_)
            | ZipError::EntryDeleted
            | ZipError::EntryNotFound(_) => ErrorKind::State,
            ZipError::DateTimeOutOfRange(_) | ZipError::InvalidArgument(_) => ErrorKind::Argument,
        }
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        ZipError::InvalidState(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        ZipError::InvalidFormat(msg.into())
    }

    /// Recover a codec error that travelled through an `io::Error`
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<ZipError>()) {
            return ZipError::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<ZipError>()) {
            Some(Ok(zip)) => *zip,
            Some(Err(inner)) => ZipError::Io(io::Error::new(kind, inner)),
            None => ZipError::Io(io::Error::from(kind)),
        }
    }
}

impl From<ZipError> for io::Error {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(e) => e,
            other => {
                let kind = match other.kind() {
                    ErrorKind::Format => io::ErrorKind::InvalidData,
                    _ => io::ErrorKind::InvalidInput,
                };
                io::Error::new(kind, other)
            }
        }
    }
}
