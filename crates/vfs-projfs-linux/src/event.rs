//! Driver event records and their classification.

use std::ffi::CStr;
use std::os::fd::RawFd;

use bitflags::bitflags;

use crate::error::{ProjFsError, ProjResult};

/// Correlation id passed to content callbacks.
pub type CommandId = u64;

/// The only command id issued today. There is no per-dispatch correlation yet.
pub const TRIVIAL_COMMAND_ID: CommandId = 0;

/// Permission-gated reply that lets the triggering operation proceed.
pub const PERM_ALLOW: i32 = 0x01;

/// Permission-gated reply that blocks the triggering operation.
pub const PERM_DENY: i32 = 0x02;

bitflags! {
    /// Event flags set by the driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u64 {
        /// Entry was deleted (or is about to be, for permission events).
        const DELETE_SELF = 0x0000_0400;
        /// Entry was moved.
        const MOVE_SELF = 0x0000_0800;
        /// Event concerns a directory.
        const ON_DIR = 0x4000_0000;
        /// Entry was created.
        const CREATE_SELF = 0x0001_0000_0000;

        // Driver bits this crate doesn't interpret.
        const _ = !0;
    }
}

/// Kind of notification delivered to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    /// Entry is about to be deleted. The provider may veto.
    PreDelete,
    /// File contents changed.
    FileModified,
    /// Entry was created.
    NewFileCreated,
    /// Entry was renamed.
    FileRenamed,
    /// Hard link was created.
    HardLinkCreated,
}

impl NotificationType {
    /// Classify a notification mask.
    ///
    /// Delete wins over move, move over create. Masks carrying none of those
    /// bits are not notifications the provider handles.
    pub fn classify(mask: EventMask) -> Option<Self> {
        if mask.contains(EventMask::DELETE_SELF) {
            Some(NotificationType::PreDelete)
        } else if mask.contains(EventMask::MOVE_SELF) {
            Some(NotificationType::FileRenamed)
        } else if mask.contains(EventMask::CREATE_SELF) {
            Some(NotificationType::NewFileCreated)
        } else {
            None
        }
    }
}

/// One event delivered by the driver.
///
/// Borrowed for the duration of a single dispatch call.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// Event flags.
    pub mask: EventMask,
    /// Process that triggered the event.
    pub pid: i32,
    /// NUL-terminated path relative to the virtualization root.
    pub path: &'a [u8],
    /// Descriptor to write projected content into (content events only).
    pub fd: RawFd,
}

impl<'a> Event<'a> {
    /// Create an event without a target descriptor.
    ///
    /// # Arguments
    /// * `mask` - Raw driver flags
    /// * `pid` - Triggering process id
    /// * `path` - NUL-terminated path bytes
    pub fn new(mask: u64, pid: i32, path: &'a [u8]) -> Self {
        Self {
            mask: EventMask::from_bits_retain(mask),
            pid,
            path,
            fd: -1,
        }
    }

    /// Attach the descriptor a content event should be written to.
    pub fn with_fd(mut self, fd: RawFd) -> Self {
        self.fd = fd;
        self
    }

    /// Whether the event concerns a directory.
    pub fn is_dir(&self) -> bool {
        self.mask.contains(EventMask::ON_DIR)
    }

    /// Decode the path into text.
    ///
    /// The path ends at the first NUL. A missing terminator or invalid UTF-8
    /// yields `InvalidPath`.
    pub fn path_str(&self) -> ProjResult<&'a str> {
        let path: &'a [u8] = self.path;
        CStr::from_bytes_until_nul(path)
            .map_err(|_| ProjFsError::InvalidPath)?
            .to_str()
            .map_err(|_| ProjFsError::InvalidPath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_priority() {
        let all = EventMask::DELETE_SELF | EventMask::MOVE_SELF | EventMask::CREATE_SELF;
        assert_eq!(
            NotificationType::classify(all),
            Some(NotificationType::PreDelete)
        );
        assert_eq!(
            NotificationType::classify(EventMask::MOVE_SELF | EventMask::CREATE_SELF),
            Some(NotificationType::FileRenamed)
        );
        assert_eq!(
            NotificationType::classify(EventMask::CREATE_SELF | EventMask::ON_DIR),
            Some(NotificationType::NewFileCreated)
        );
    }

    #[test]
    fn test_classify_unknown_bits() {
        assert_eq!(NotificationType::classify(EventMask::empty()), None);
        assert_eq!(NotificationType::classify(EventMask::ON_DIR), None);
        assert_eq!(
            NotificationType::classify(EventMask::from_bits_retain(0x0000_0008)),
            None
        );
    }

    #[test]
    fn test_event_retains_unknown_bits() {
        let event = Event::new(0x4000_0008, 1, b"a\0");
        assert!(event.is_dir());
        assert_eq!(event.mask.bits(), 0x4000_0008);
    }

    #[test]
    fn test_path_str() {
        assert_eq!(Event::new(0, 1, b"docs/a.txt\0").path_str(), Ok("docs/a.txt"));
        assert_eq!(Event::new(0, 1, b"\0").path_str(), Ok(""));
        // Stops at the first NUL.
        assert_eq!(Event::new(0, 1, b"a\0b\0").path_str(), Ok("a"));
    }

    #[test]
    fn test_path_str_invalid() {
        assert_eq!(
            Event::new(0, 1, b"no-terminator").path_str(),
            Err(ProjFsError::InvalidPath)
        );
        assert_eq!(
            Event::new(0, 1, b"\xff\xfe\0").path_str(),
            Err(ProjFsError::InvalidPath)
        );
    }
}
