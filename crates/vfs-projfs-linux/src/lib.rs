//! Provider-side event dispatch for a Linux projected filesystem.
//!
//! A native session (for example a libprojfs mount) intercepts filesystem
//! activity under a virtualization root and raises events. This crate turns
//! those events into typed provider callbacks and turns the provider's results
//! back into the status codes the driver expects, including the allow/deny
//! reply for permission-gated events.
//!
//! # Architecture
//!
//! ```text
//! driver thread ─► EventDispatcher ─► ProviderCallbacks ─► ProjResult ─► status code
//! provider      ─► VirtualizationInstance ─► Session
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rusty_attachments_vfs_projfs_linux::{ProjFsError, VirtualizationInstance};
//!
//! let mut instance = VirtualizationInstance::new(Arc::new(MyLibprojfsConnector));
//! let callbacks = instance.callbacks_mut();
//! callbacks.set_enumerate_directory(|req| provider.list(req.relative_path));
//! callbacks.set_get_file_stream(|req| provider.hydrate(req));
//! callbacks.set_pre_delete(|path, _is_dir| {
//!     if provider.is_pinned(path) { Err(ProjFsError::AccessDenied) } else { Ok(()) }
//! });
//! // ...remaining notification callbacks...
//! instance.start("/var/lib/lower", "/mnt/projected", 4)?;
//! ```

mod callbacks;
mod error;
mod event;
mod options;
mod placeholder;
mod session;
mod util;
mod virtualizer;

pub use callbacks::{
    DispatchStats, DispatchStatsSnapshot, EnumerateDirectoryCallback, EnumerationRequest,
    FileModifiedCallback, FileRenamedCallback, FileStreamRequest, GetFileStreamCallback,
    HardLinkCreatedCallback, NewFileCreatedCallback, PreDeleteCallback, ProviderCallbacks,
    RegisteredCallbacks,
};
pub use error::{status_code, ProjFsError, ProjResult, UpdateFailureCause, UpdateOutcome};
pub use event::{
    CommandId, Event, EventMask, NotificationType, PERM_ALLOW, PERM_DENY, TRIVIAL_COMMAND_ID,
};
pub use options::ProjFsOptions;
pub use placeholder::{
    PlaceholderId, PlaceholderIdentity, UpdateType, PLACEHOLDER_DIR_MODE, PLACEHOLDER_ID_LENGTH,
};
pub use session::{Session, SessionConnector};
pub use util::{write_all, LibcWrite, ProcCmdline, ProcessInfo, RawWrite};
pub use virtualizer::{EventDispatcher, VirtualizationInstance};

/// Check if projected filesystems can be served on this system.
///
/// # Returns
/// True on Linux, where libprojfs-style drivers exist.
#[cfg(target_os = "linux")]
pub fn projfs_available() -> bool {
    true
}

/// Check if projected filesystems can be served on this system.
///
/// # Returns
/// Always false on non-Linux platforms.
#[cfg(not(target_os = "linux"))]
pub fn projfs_available() -> bool {
    false
}
