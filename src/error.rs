//! Error taxonomy shared by every layer of the virtual file system.

use std::fmt;

/// Errors produced by the VFS core.
///
/// Logical absence (a path that simply doesn't exist) is not represented here — those operations
/// return `Option`/`bool` instead, matching the distinction the design draws between errors and
/// non-error absence.
#[derive(Debug)]
pub enum VfsError {
    /// Underlying host I/O failed.
    Io(std::io::Error),
    /// A precondition was violated (e.g. a directory path passed where a file path was required).
    Precondition(String),
    /// The operation is not supported by this stream/device (e.g. writing to a read-only wrapper).
    Unsupported(&'static str),
    /// The bytes did not match the expected archive format.
    FormatMismatch(&'static str),
    /// The bytes matched the format's magic but were structurally invalid afterwards.
    Corrupt(String),
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VfsError::Io(e) => write!(f, "i/o error: {e}"),
            VfsError::Precondition(msg) => write!(f, "precondition violated: {msg}"),
            VfsError::Unsupported(op) => write!(f, "unsupported operation: {op}"),
            VfsError::FormatMismatch(fmt_name) => write!(f, "format mismatch: not a {fmt_name}"),
            VfsError::Corrupt(msg) => write!(f, "corrupt archive: {msg}"),
        }
    }
}

impl std::error::Error for VfsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VfsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VfsError {
    fn from(e: std::io::Error) -> Self {
        VfsError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, VfsError>;
