//! Error types and status-code mapping for the projected filesystem.
//!
//! Every operation outcome is a `ProjResult`. `Ok` is success; each
//! `ProjFsError` variant maps to exactly one POSIX errno, which is what the
//! driver receives (negated) at the dispatch boundary.

use thiserror::Error;

/// Outcome of a provider or session operation.
pub type ProjResult<T = ()> = std::result::Result<T, ProjFsError>;

/// Failures that can cross the provider/driver boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ProjFsError {
    /// Session construction or native start failed.
    #[error("Invalid virtualization session")]
    Invalid,

    /// Caller supplied invalid arguments.
    #[error("Invalid arguments")]
    InvalidArgs,

    /// Driver supplied a path that is not NUL-terminated UTF-8.
    #[error("Event path is not valid UTF-8")]
    InvalidPath,

    /// No session is live on this instance.
    #[error("Virtualization not started")]
    NotStarted,

    /// Operation is not supported by the session.
    #[error("Operation not supported")]
    NotSupported,

    /// Allocation failed.
    #[error("Out of memory")]
    OutOfMemory,

    /// File does not exist.
    #[error("File not found")]
    FileNotFound,

    /// Path component does not exist.
    #[error("Path not found")]
    PathNotFound,

    /// Operation not permitted. Vetoes permission-gated events.
    #[error("Access denied")]
    AccessDenied,

    /// File descriptor or handle is invalid.
    #[error("Invalid handle")]
    InvalidHandle,

    /// Write primitive or storage failed.
    #[error("IO error")]
    IoError,

    /// Directory still has entries.
    #[error("Directory not empty")]
    DirectoryNotEmpty,

    /// Operation exists in the API but has no implementation yet.
    #[error("Not yet implemented")]
    NotYetImplemented,

    /// Native status code with no named counterpart.
    ///
    /// Either sign is accepted. A zero payload still means failure and is
    /// reported as `EIO`.
    #[error("OS error {0}")]
    Errno(i32),
}

impl ProjFsError {
    /// POSIX errno for this error (always positive).
    pub fn errno(&self) -> i32 {
        match self {
            ProjFsError::Invalid | ProjFsError::InvalidArgs => libc::EINVAL,
            ProjFsError::InvalidPath => libc::EILSEQ,
            ProjFsError::NotStarted => libc::ENODEV,
            ProjFsError::NotSupported => libc::EOPNOTSUPP,
            ProjFsError::OutOfMemory => libc::ENOMEM,
            ProjFsError::FileNotFound | ProjFsError::PathNotFound => libc::ENOENT,
            ProjFsError::AccessDenied => libc::EPERM,
            ProjFsError::InvalidHandle => libc::EBADF,
            ProjFsError::IoError => libc::EIO,
            ProjFsError::DirectoryNotEmpty => libc::ENOTEMPTY,
            ProjFsError::NotYetImplemented => libc::ENOSYS,
            ProjFsError::Errno(code) => match code.saturating_abs() {
                0 => libc::EIO,
                code => code,
            },
        }
    }

    /// Translate a native status code into a result.
    ///
    /// Accepts both positive errnos and negated driver codes. Zero is success.
    ///
    /// # Arguments
    /// * `code` - Status code reported by a native session
    pub fn from_errno(code: i32) -> ProjResult {
        let code: i32 = code.saturating_abs();
        let err = match code {
            0 => return Ok(()),
            libc::EINVAL => ProjFsError::InvalidArgs,
            libc::EILSEQ => ProjFsError::InvalidPath,
            libc::ENODEV => ProjFsError::NotStarted,
            libc::EOPNOTSUPP => ProjFsError::NotSupported,
            libc::ENOMEM => ProjFsError::OutOfMemory,
            libc::ENOENT => ProjFsError::FileNotFound,
            libc::EPERM => ProjFsError::AccessDenied,
            libc::EBADF => ProjFsError::InvalidHandle,
            libc::EIO => ProjFsError::IoError,
            libc::ENOTEMPTY => ProjFsError::DirectoryNotEmpty,
            libc::ENOSYS => ProjFsError::NotYetImplemented,
            other => ProjFsError::Errno(other),
        };
        Err(err)
    }
}

/// Status code returned to the driver for an outcome.
///
/// Zero on success, negated errno otherwise.
pub fn status_code(result: &ProjResult) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => -e.errno(),
    }
}

/// Reason an update-style operation could not proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateFailureCause {
    /// No failure (or the operation did not get far enough to fail).
    #[default]
    NoFailure,
    /// Placeholder metadata was modified locally.
    DirtyMetadata,
    /// Placeholder content was modified locally.
    DirtyData,
    /// File is fully materialized.
    FullFile,
    /// File is read-only.
    ReadOnly,
}

/// Result of an update-style operation together with its failure cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Operation outcome.
    pub result: ProjResult,
    /// Why the update failed, if it did.
    pub failure_cause: UpdateFailureCause,
}

impl UpdateOutcome {
    /// Outcome with no failure cause attached.
    pub fn new(result: ProjResult) -> Self {
        Self {
            result,
            failure_cause: UpdateFailureCause::NoFailure,
        }
    }

    /// Whether the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
