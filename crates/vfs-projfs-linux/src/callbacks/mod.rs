//! Provider callback registrations.
//!
//! A provider fills every slot of [`ProviderCallbacks`] before starting the
//! instance. Once started, the slots are frozen into a [`RegisteredCallbacks`]
//! shared by all dispatch threads.

mod stats;

use std::fmt;
use std::os::fd::RawFd;
use std::sync::Arc;

use crate::error::ProjResult;
use crate::event::CommandId;
use crate::placeholder::PlaceholderId;

pub use stats::{DispatchStats, DispatchStatsSnapshot};

/// Directory listing request.
#[derive(Debug, Clone, Copy)]
pub struct EnumerationRequest<'a> {
    /// Command correlation id (always 0 today).
    pub command_id: CommandId,
    /// Directory path relative to the virtualization root.
    pub relative_path: &'a str,
    /// Process that triggered the listing.
    pub triggering_process_id: i32,
    /// Invocation name of that process, or empty.
    pub triggering_process_name: &'a str,
}

/// File content request.
#[derive(Debug, Clone, Copy)]
pub struct FileStreamRequest<'a> {
    /// Command correlation id (always 0 today).
    pub command_id: CommandId,
    /// File path relative to the virtualization root.
    pub relative_path: &'a str,
    /// Provider id stored with the placeholder.
    pub provider_id: &'a PlaceholderId,
    /// Content id stored with the placeholder.
    pub content_id: &'a PlaceholderId,
    /// Process that triggered the read.
    pub triggering_process_id: i32,
    /// Invocation name of that process, or empty.
    pub triggering_process_name: &'a str,
    /// Descriptor the content must be written into.
    pub fd: RawFd,
}

/// Lists a directory. Must create its placeholders before returning.
pub type EnumerateDirectoryCallback =
    dyn Fn(&EnumerationRequest<'_>) -> ProjResult + Send + Sync;
/// Hydrates a file by writing its content into the request's descriptor.
pub type GetFileStreamCallback =
    dyn Fn(&FileStreamRequest<'_>) -> ProjResult + Send + Sync;
/// Observes a modified file.
pub type FileModifiedCallback = dyn Fn(&str) + Send + Sync;
/// Vetoes a delete by returning `AccessDenied`. Arguments are path and is-directory.
pub type PreDeleteCallback = dyn Fn(&str, bool) -> ProjResult + Send + Sync;
/// Observes a created file or directory. Arguments are path and is-directory.
pub type NewFileCreatedCallback = dyn Fn(&str, bool) + Send + Sync;
/// Observes a renamed file or directory. Arguments are path and is-directory.
pub type FileRenamedCallback = dyn Fn(&str, bool) + Send + Sync;
/// Observes a new hard link.
pub type HardLinkCreatedCallback = dyn Fn(&str) + Send + Sync;

/// Callback slots a provider registers before starting.
#[derive(Default, Clone)]
pub struct ProviderCallbacks {
    enumerate_directory: Option<Arc<EnumerateDirectoryCallback>>,
    get_file_stream: Option<Arc<GetFileStreamCallback>>,
    file_modified: Option<Arc<FileModifiedCallback>>,
    pre_delete: Option<Arc<PreDeleteCallback>>,
    new_file_created: Option<Arc<NewFileCreatedCallback>>,
    file_renamed: Option<Arc<FileRenamedCallback>>,
    hard_link_created: Option<Arc<HardLinkCreatedCallback>>,
}

impl ProviderCallbacks {
    /// Empty registration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle directory listing requests.
    pub fn set_enumerate_directory<F>(&mut self, f: F)
    where
        F: Fn(&EnumerationRequest<'_>) -> ProjResult + Send + Sync + 'static,
    {
        self.enumerate_directory = Some(Arc::new(f));
    }

    /// Handle file content requests.
    pub fn set_get_file_stream<F>(&mut self, f: F)
    where
        F: Fn(&FileStreamRequest<'_>) -> ProjResult + Send + Sync + 'static,
    {
        self.get_file_stream = Some(Arc::new(f));
    }

    /// Observe file modifications.
    pub fn set_file_modified<F>(&mut self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.file_modified = Some(Arc::new(f));
    }

    /// Approve or veto deletions. Returning `AccessDenied` blocks the delete.
    pub fn set_pre_delete<F>(&mut self, f: F)
    where
        F: Fn(&str, bool) -> ProjResult + Send + Sync + 'static,
    {
        self.pre_delete = Some(Arc::new(f));
    }

    /// Observe new files and directories.
    pub fn set_new_file_created<F>(&mut self, f: F)
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.new_file_created = Some(Arc::new(f));
    }

    /// Observe renames.
    pub fn set_file_renamed<F>(&mut self, f: F)
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.file_renamed = Some(Arc::new(f));
    }

    /// Observe hard link creation.
    pub fn set_hard_link_created<F>(&mut self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hard_link_created = Some(Arc::new(f));
    }

    /// Name of the first unregistered slot, if any.
    pub fn missing(&self) -> Option<&'static str> {
        if self.enumerate_directory.is_none() {
            Some("enumerate_directory")
        } else if self.get_file_stream.is_none() {
            Some("get_file_stream")
        } else if self.file_modified.is_none() {
            Some("file_modified")
        } else if self.pre_delete.is_none() {
            Some("pre_delete")
        } else if self.new_file_created.is_none() {
            Some("new_file_created")
        } else if self.file_renamed.is_none() {
            Some("file_renamed")
        } else if self.hard_link_created.is_none() {
            Some("hard_link_created")
        } else {
            None
        }
    }

    /// Freeze the registration.
    ///
    /// # Returns
    /// The complete set of callbacks, or the name of the first missing slot.
    pub fn register(&self) -> Result<RegisteredCallbacks, &'static str> {
        let missing = |name: &'static str| move || name;
        Ok(RegisteredCallbacks {
            enumerate_directory: self
                .enumerate_directory
                .clone()
                .ok_or_else(missing("enumerate_directory"))?,
            get_file_stream: self
                .get_file_stream
                .clone()
                .ok_or_else(missing("get_file_stream"))?,
            file_modified: self
                .file_modified
                .clone()
                .ok_or_else(missing("file_modified"))?,
            pre_delete: self.pre_delete.clone().ok_or_else(missing("pre_delete"))?,
            new_file_created: self
                .new_file_created
                .clone()
                .ok_or_else(missing("new_file_created"))?,
            file_renamed: self
                .file_renamed
                .clone()
                .ok_or_else(missing("file_renamed"))?,
            hard_link_created: self
                .hard_link_created
                .clone()
                .ok_or_else(missing("hard_link_created"))?,
        })
    }
}

impl fmt::Debug for ProviderCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCallbacks")
            .field("missing", &self.missing())
            .finish()
    }
}

/// Complete, immutable callback set used during dispatch.
#[derive(Clone)]
pub struct RegisteredCallbacks {
    pub(crate) enumerate_directory: Arc<EnumerateDirectoryCallback>,
    pub(crate) get_file_stream: Arc<GetFileStreamCallback>,
    pub(crate) file_modified: Arc<FileModifiedCallback>,
    pub(crate) pre_delete: Arc<PreDeleteCallback>,
    pub(crate) new_file_created: Arc<NewFileCreatedCallback>,
    pub(crate) file_renamed: Arc<FileRenamedCallback>,
    pub(crate) hard_link_created: Arc<HardLinkCreatedCallback>,
}

impl fmt::Debug for RegisteredCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCallbacks").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> ProviderCallbacks {
        let mut callbacks = ProviderCallbacks::new();
        callbacks.set_enumerate_directory(|_| Ok(()));
        callbacks.set_get_file_stream(|_| Ok(()));
        callbacks.set_file_modified(|_| {});
        callbacks.set_pre_delete(|_, _| Ok(()));
        callbacks.set_new_file_created(|_, _| {});
        callbacks.set_file_renamed(|_, _| {});
        callbacks.set_hard_link_created(|_| {});
        callbacks
    }

    #[test]
    fn test_empty_registration_is_incomplete() {
        let callbacks = ProviderCallbacks::new();
        assert_eq!(callbacks.missing(), Some("enumerate_directory"));
        assert_eq!(callbacks.register().unwrap_err(), "enumerate_directory");
    }

    #[test]
    fn test_full_registration() {
        let callbacks = full();
        assert_eq!(callbacks.missing(), None);
        assert!(callbacks.register().is_ok());
    }

    #[test]
    fn test_reports_missing_slot() {
        let mut callbacks = full();
        callbacks.hard_link_created = None;
        assert_eq!(callbacks.missing(), Some("hard_link_created"));
        assert_eq!(callbacks.register().unwrap_err(), "hard_link_created");
    }
}
