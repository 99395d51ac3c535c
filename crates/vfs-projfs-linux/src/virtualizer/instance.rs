//! Virtualization instance: session lifecycle and the provider-facing API.

use std::os::fd::RawFd;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::callbacks::{DispatchStats, DispatchStatsSnapshot, ProviderCallbacks, RegisteredCallbacks};
use crate::error::{ProjFsError, ProjResult, UpdateOutcome};
use crate::event::CommandId;
use crate::options::ProjFsOptions;
use crate::placeholder::{require_id, PlaceholderId, UpdateType, PLACEHOLDER_DIR_MODE};
use crate::session::{SessionConnector, SessionHandle, SessionSlot};
use crate::util::{write_all, LibcWrite, ProcCmdline, ProcessInfo, RawWrite};
use crate::virtualizer::EventDispatcher;

/// A provider's handle on one virtualization root.
///
/// Owns at most one native session. Register every provider callback, then
/// call [`start`](Self::start). Events are dispatched on the session's worker
/// threads until [`stop`](Self::stop) or drop.
pub struct VirtualizationInstance {
    /// Creates native sessions.
    connector: Arc<dyn SessionConnector>,
    /// Provider callback registrations.
    callbacks: ProviderCallbacks,
    /// Live session, shared with the dispatcher.
    session: Arc<SessionSlot>,
    /// Triggering-process lookup.
    process_info: Arc<dyn ProcessInfo>,
    /// Write primitive for streamed content.
    writer: Arc<dyn RawWrite>,
    /// Dispatch counters.
    stats: Arc<DispatchStats>,
    /// Serializes start and stop.
    lifecycle: Mutex<()>,
}

impl VirtualizationInstance {
    /// Create a stopped instance.
    ///
    /// # Arguments
    /// * `connector` - Factory for native sessions
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            callbacks: ProviderCallbacks::new(),
            session: Arc::new(SessionSlot::new()),
            process_info: Arc::new(ProcCmdline::new()),
            writer: Arc::new(LibcWrite),
            stats: Arc::new(DispatchStats::new()),
            lifecycle: Mutex::new(()),
        }
    }

    /// Replace the process-name lookup.
    pub fn with_process_info(mut self, process_info: Arc<dyn ProcessInfo>) -> Self {
        self.process_info = process_info;
        self
    }

    /// Replace the write primitive used by [`write_file_contents`](Self::write_file_contents).
    pub fn with_raw_writer(mut self, writer: Arc<dyn RawWrite>) -> Self {
        self.writer = writer;
        self
    }

    /// Replace all callback registrations.
    pub fn set_callbacks(&mut self, callbacks: ProviderCallbacks) {
        self.callbacks = callbacks;
    }

    /// Callback registrations, for setting individual slots.
    ///
    /// Changes take effect at the next start.
    pub fn callbacks_mut(&mut self) -> &mut ProviderCallbacks {
        &mut self.callbacks
    }

    /// Start virtualizing.
    ///
    /// # Arguments
    /// * `storage_root` - Backing storage directory
    /// * `virtualization_root` - Directory to virtualize
    /// * `pool_thread_count` - Driver worker threads
    ///
    /// # Panics
    /// If the instance is already started.
    pub fn start(
        &self,
        storage_root: impl Into<PathBuf>,
        virtualization_root: impl Into<PathBuf>,
        pool_thread_count: u32,
    ) -> ProjResult {
        self.start_with_options(
            ProjFsOptions::new(storage_root, virtualization_root)
                .with_pool_thread_count(pool_thread_count),
        )
    }

    /// Start virtualizing with prepared options.
    ///
    /// # Returns
    /// `Invalid` if a callback is unregistered, the session can't be created,
    /// or the native start fails. Nothing is retained on failure.
    ///
    /// # Panics
    /// If the instance is already started.
    pub fn start_with_options(&self, options: ProjFsOptions) -> ProjResult {
        let _lifecycle = self.lifecycle.lock();
        assert!(
            !self.session.is_live(),
            "virtualization instance is already started"
        );

        let callbacks: RegisteredCallbacks = self.callbacks.register().map_err(|missing| {
            tracing::error!("Cannot start: no {} callback registered", missing);
            ProjFsError::Invalid
        })?;

        let dispatcher = EventDispatcher::new(
            callbacks,
            self.session.clone(),
            self.process_info.clone(),
            self.stats.clone(),
        );

        let session: Arc<SessionHandle> = match self.connector.connect(&options, dispatcher) {
            Ok(session) => Arc::new(SessionHandle::new(session)),
            Err(e) => {
                tracing::error!(
                    "Failed to create session for {:?} over {:?}: {}",
                    options.virtualization_root,
                    options.storage_root,
                    e
                );
                return Err(ProjFsError::Invalid);
            }
        };

        // Installed first so events delivered during native start find it.
        self.session.install(session.clone());

        if let Err(e) = session.start() {
            tracing::error!(
                "Failed to start virtualization at {:?}: {}",
                options.virtualization_root,
                e
            );
            // Dropping the last handle stops the native session.
            self.session.take();
            drop(session);
            return Err(ProjFsError::Invalid);
        }

        tracing::info!(
            "ProjFS virtualization started at {:?} ({} pool threads)",
            options.virtualization_root,
            options.pool_thread_count
        );
        Ok(())
    }

    /// Stop virtualizing. Does nothing if not started.
    ///
    /// New events no longer reach the session. The native session is stopped
    /// once every dispatch already running has returned, which may be after
    /// this call.
    pub fn stop(&self) {
        let _lifecycle = self.lifecycle.lock();
        let Some(session) = self.session.take() else {
            return;
        };

        let in_flight: usize = Arc::strong_count(&session) - 1;
        if in_flight > 0 {
            tracing::info!(
                "ProjFS virtualization stopping after {} in-flight dispatch(es)",
                in_flight
            );
        } else {
            tracing::info!("ProjFS virtualization stopped");
        }
    }

    /// Check if virtualization is started.
    pub fn is_started(&self) -> bool {
        self.session.is_live()
    }

    /// Dispatch counters since creation.
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Write file content into a descriptor from a get-file-stream callback.
    ///
    /// # Arguments
    /// * `fd` - Descriptor from the [`FileStreamRequest`](crate::FileStreamRequest)
    /// * `bytes` - Content to write
    ///
    /// # Returns
    /// Ok once every byte is written, `IoError` otherwise.
    pub fn write_file_contents(&self, fd: RawFd, bytes: &[u8]) -> ProjResult {
        write_all(self.writer.as_ref(), fd, bytes)
    }

    /// Create a placeholder directory.
    ///
    /// # Arguments
    /// * `relative_path` - Path relative to the virtualization root
    pub fn write_placeholder_directory(&self, relative_path: &str) -> ProjResult {
        self.live_session()?
            .create_proj_dir(relative_path, PLACEHOLDER_DIR_MODE)
    }

    /// Create a placeholder file.
    ///
    /// # Arguments
    /// * `relative_path` - Path relative to the virtualization root
    /// * `provider_id` - Provider id, exactly 128 bytes
    /// * `content_id` - Content id, exactly 128 bytes
    /// * `file_size` - Size reported before hydration
    /// * `file_mode` - Permission bits
    ///
    /// # Panics
    /// If either id is not exactly 128 bytes. Nothing reaches the session.
    pub fn write_placeholder_file(
        &self,
        relative_path: &str,
        provider_id: &[u8],
        content_id: &[u8],
        file_size: u64,
        file_mode: u32,
    ) -> ProjResult {
        let provider_id: PlaceholderId = require_id(provider_id, "providerId");
        let content_id: PlaceholderId = require_id(content_id, "contentId");

        self.live_session()?.create_proj_file(
            relative_path,
            file_size,
            file_mode,
            &provider_id,
            &content_id,
        )
    }

    /// Create a symlink placeholder.
    ///
    /// # Arguments
    /// * `relative_path` - Path relative to the virtualization root
    /// * `symlink_target` - Link target, stored verbatim
    pub fn write_symlink(&self, relative_path: &str, symlink_target: &str) -> ProjResult {
        self.live_session()?
            .create_proj_symlink(relative_path, symlink_target)
    }

    /// Delete a placeholder. Not implemented by the session yet.
    pub fn delete_file(&self, relative_path: &str, update_flags: UpdateType) -> UpdateOutcome {
        tracing::debug!("DeleteFile: {} flags={:?}", relative_path, update_flags);
        UpdateOutcome::new(Err(ProjFsError::NotYetImplemented))
    }

    /// Update a placeholder's identity and size. Not implemented by the
    /// session yet.
    ///
    /// # Panics
    /// If either id is not exactly 128 bytes.
    pub fn update_placeholder_if_needed(
        &self,
        relative_path: &str,
        provider_id: &[u8],
        content_id: &[u8],
        file_size: u64,
        file_mode: u32,
        update_flags: UpdateType,
    ) -> UpdateOutcome {
        require_id(provider_id, "providerId");
        require_id(content_id, "contentId");
        tracing::debug!(
            "UpdatePlaceholderIfNeeded: {} size={} mode={:o} flags={:?}",
            relative_path,
            file_size,
            file_mode,
            update_flags
        );
        UpdateOutcome::new(Err(ProjFsError::NotYetImplemented))
    }

    /// Replace a file placeholder with a symlink. Not implemented by the
    /// session yet.
    pub fn replace_placeholder_file_with_symlink(
        &self,
        relative_path: &str,
        symlink_target: &str,
        update_flags: UpdateType,
    ) -> UpdateOutcome {
        tracing::debug!(
            "ReplacePlaceholderFileWithSymLink: {} -> {} flags={:?}",
            relative_path,
            symlink_target,
            update_flags
        );
        UpdateOutcome::new(Err(ProjFsError::NotYetImplemented))
    }

    /// Complete a pending command.
    ///
    /// Every dispatch uses command id 0, so there is nothing to correlate a
    /// completion with.
    ///
    /// # Panics
    /// Always. Command completion is not implemented.
    pub fn complete_command(&self, command_id: CommandId, result: ProjResult) -> ProjResult {
        tracing::error!("CompleteCommand({}, {:?}) called", command_id, result);
        panic!("CompleteCommand is not implemented (command {command_id})");
    }

    /// Convert a regular directory into a placeholder.
    ///
    /// # Panics
    /// Always. Directory conversion is not implemented.
    pub fn convert_directory_to_placeholder(&self, relative_directory_path: &str) -> ProjResult {
        tracing::error!(
            "ConvertDirectoryToPlaceholder({}) called",
            relative_directory_path
        );
        panic!("ConvertDirectoryToPlaceholder is not implemented ({relative_directory_path})");
    }

    fn live_session(&self) -> ProjResult<Arc<SessionHandle>> {
        self.session.current().ok_or(ProjFsError::NotStarted)
    }
}

impl Drop for VirtualizationInstance {
    fn drop(&mut self) {
        if self.is_started() {
            self.stop();
        }
    }
}
