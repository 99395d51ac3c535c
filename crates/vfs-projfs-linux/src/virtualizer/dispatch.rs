//! Driver event dispatch.
//!
//! Runs on the driver's worker threads. Each handler classifies one event,
//! calls the matching provider callback and answers the driver with a status
//! code: zero for success, a negated errno for failure, or a permission
//! sentinel for permission-gated events.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::callbacks::{
    DispatchStats, EnumerationRequest, FileStreamRequest, RegisteredCallbacks,
};
use crate::error::{status_code, ProjFsError, ProjResult};
use crate::event::{Event, NotificationType, PERM_ALLOW, PERM_DENY, TRIVIAL_COMMAND_ID};
use crate::placeholder::PlaceholderIdentity;
use crate::session::{SessionHandle, SessionSlot};
use crate::util::ProcessInfo;

/// Event handlers handed to a native session.
///
/// Cheap to clone; all clones share the same callbacks and session slot.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<DispatchContext>,
}

struct DispatchContext {
    callbacks: RegisteredCallbacks,
    session: Arc<SessionSlot>,
    process_info: Arc<dyn ProcessInfo>,
    stats: Arc<DispatchStats>,
}

impl EventDispatcher {
    pub(crate) fn new(
        callbacks: RegisteredCallbacks,
        session: Arc<SessionSlot>,
        process_info: Arc<dyn ProcessInfo>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatchContext {
                callbacks,
                session,
                process_info,
                stats,
            }),
        }
    }

    /// Handle a content-generation event (directory listing or file read).
    ///
    /// # Returns
    /// Zero on success, negated errno on failure.
    pub fn handle_proj_event(&self, event: &Event<'_>) -> i32 {
        let result: ProjResult = guard("projection", || self.project(event));
        if let Err(e) = result {
            self.inner.stats.record_failed();
            tracing::debug!("Projection event failed: {}", e);
        }
        status_code(&result)
    }

    /// Handle a notification event.
    ///
    /// # Returns
    /// Zero on success or for unhandled masks, negated errno on failure.
    pub fn handle_notify_event(&self, event: &Event<'_>) -> i32 {
        self.handle_non_proj_event(event, false)
    }

    /// Handle a permission-gated notification event.
    ///
    /// # Returns
    /// [`PERM_ALLOW`] if the provider accepted, [`PERM_DENY`] if it answered
    /// `AccessDenied`, otherwise the negated errno of its failure. Masks with
    /// no handled notification type answer zero.
    pub fn handle_perm_event(&self, event: &Event<'_>) -> i32 {
        self.handle_non_proj_event(event, true)
    }

    /// Dispatch statistics shared with the owning instance.
    pub fn stats(&self) -> &DispatchStats {
        &self.inner.stats
    }

    fn project(&self, event: &Event<'_>) -> ProjResult {
        let ctx: &DispatchContext = &self.inner;
        // Held until the provider returns so a concurrent stop can't tear
        // the session down under this dispatch.
        let session: Option<Arc<SessionHandle>> = ctx.session.current();
        let process_name: String = ctx.process_info.process_name(event.pid);
        let relative_path: &str = decode_path(event)?;

        if event.is_dir() {
            tracing::debug!(
                "EnumerateDirectory: {} pid={} ({})",
                relative_path,
                event.pid,
                process_name
            );
            ctx.stats.record_enumeration();
            return (ctx.callbacks.enumerate_directory)(&EnumerationRequest {
                command_id: TRIVIAL_COMMAND_ID,
                relative_path,
                triggering_process_id: event.pid,
                triggering_process_name: &process_name,
            });
        }

        let identity: PlaceholderIdentity =
            placeholder_identity(session.as_deref(), relative_path)?;

        tracing::debug!(
            "GetFileStream: {} fd={} pid={} ({})",
            relative_path,
            event.fd,
            event.pid,
            process_name
        );
        ctx.stats.record_file_stream();
        (ctx.callbacks.get_file_stream)(&FileStreamRequest {
            command_id: TRIVIAL_COMMAND_ID,
            relative_path,
            provider_id: &identity.provider_id,
            content_id: &identity.content_id,
            triggering_process_id: event.pid,
            triggering_process_name: &process_name,
            fd: event.fd,
        })
    }

    fn handle_non_proj_event(&self, event: &Event<'_>, perm: bool) -> i32 {
        let Some(kind) = NotificationType::classify(event.mask) else {
            self.inner.stats.record_ignored();
            return 0;
        };

        let result: ProjResult = guard("notification", || self.notify(event, kind, perm));
        let code: i32 = status_code(&result);

        if perm {
            if code == 0 {
                return PERM_ALLOW;
            }
            if code == -libc::EPERM {
                self.inner.stats.record_denied();
                tracing::debug!("{:?} denied by provider", kind);
                return PERM_DENY;
            }
        }

        if let Err(e) = result {
            self.inner.stats.record_failed();
            tracing::debug!("{:?} notification failed: {}", kind, e);
        }
        code
    }

    fn notify(&self, event: &Event<'_>, kind: NotificationType, perm: bool) -> ProjResult {
        let ctx: &DispatchContext = &self.inner;
        let session: Option<Arc<SessionHandle>> = ctx.session.current();
        let is_directory: bool = event.is_dir();
        let process_name: String = ctx.process_info.process_name(event.pid);
        let relative_path: &str = decode_path(event)?;

        // Only file placeholders carry an identity.
        if !is_directory {
            placeholder_identity(session.as_deref(), relative_path)?;
        }

        tracing::debug!(
            "{:?}: {} dir={} perm={} pid={} ({})",
            kind,
            relative_path,
            is_directory,
            perm,
            event.pid,
            process_name
        );
        ctx.stats.record_notification(perm);

        let callbacks: &RegisteredCallbacks = &ctx.callbacks;
        match kind {
            NotificationType::PreDelete => (callbacks.pre_delete)(relative_path, is_directory),
            NotificationType::FileModified => {
                (callbacks.file_modified)(relative_path);
                Ok(())
            }
            NotificationType::NewFileCreated => {
                (callbacks.new_file_created)(relative_path, is_directory);
                Ok(())
            }
            NotificationType::FileRenamed => {
                (callbacks.file_renamed)(relative_path, is_directory);
                Ok(())
            }
            NotificationType::HardLinkCreated => {
                (callbacks.hard_link_created)(relative_path);
                Ok(())
            }
        }
    }
}

fn placeholder_identity(
    session: Option<&SessionHandle>,
    relative_path: &str,
) -> ProjResult<PlaceholderIdentity> {
    let session: &SessionHandle = session.ok_or_else(|| {
        tracing::warn!("Event for {} arrived with no live session", relative_path);
        ProjFsError::NotStarted
    })?;

    session.get_proj_attrs(relative_path).map_err(|e| {
        tracing::debug!("No placeholder identity for {}: {}", relative_path, e);
        e
    })
}

fn decode_path<'a>(event: &Event<'a>) -> ProjResult<&'a str> {
    event.path_str().map_err(|e| {
        tracing::error!(
            "Undecodable event path {:?} from pid {}",
            String::from_utf8_lossy(event.path),
            event.pid
        );
        e
    })
}

/// Run a handler, converting a provider panic into `IoError` so it never
/// unwinds into the driver.
fn guard<F>(what: &str, f: F) -> ProjResult
where
    F: FnOnce() -> ProjResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Provider panicked while handling {} event", what);
            Err(ProjFsError::IoError)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::ProviderCallbacks;
    use crate::event::EventMask;
    use crate::placeholder::PlaceholderId;
    use crate::session::Session;

    struct NoProcesses;

    impl ProcessInfo for NoProcesses {
        fn process_name(&self, _pid: i32) -> String {
            String::new()
        }
    }

    struct AttrSession;

    impl Session for AttrSession {
        fn start(&self) -> ProjResult {
            Ok(())
        }

        fn stop(&self) {}

        fn create_proj_dir(&self, _path: &str, _mode: u32) -> ProjResult {
            Ok(())
        }

        fn create_proj_file(
            &self,
            _path: &str,
            _size: u64,
            _mode: u32,
            _provider_id: &PlaceholderId,
            _content_id: &PlaceholderId,
        ) -> ProjResult {
            Ok(())
        }

        fn create_proj_symlink(&self, _path: &str, _target: &str) -> ProjResult {
            Ok(())
        }

        fn get_proj_attrs(&self, _path: &str) -> ProjResult<PlaceholderIdentity> {
            Ok(PlaceholderIdentity::default())
        }
    }

    fn dispatcher(pre_delete: ProjResult, with_session: bool) -> EventDispatcher {
        let mut callbacks = ProviderCallbacks::new();
        callbacks.set_enumerate_directory(|_| Ok(()));
        callbacks.set_get_file_stream(|_| panic!("stream exploded"));
        callbacks.set_file_modified(|_| {});
        callbacks.set_pre_delete(move |_, _| pre_delete);
        callbacks.set_new_file_created(|_, _| {});
        callbacks.set_file_renamed(|_, _| {});
        callbacks.set_hard_link_created(|_| {});

        let slot = Arc::new(SessionSlot::new());
        if with_session {
            slot.install(Arc::new(SessionHandle::new(Box::new(AttrSession))));
        }

        EventDispatcher::new(
            callbacks.register().unwrap(),
            slot,
            Arc::new(NoProcesses),
            Arc::new(DispatchStats::new()),
        )
    }

    #[test]
    fn test_file_event_without_session() {
        let d = dispatcher(Ok(()), false);
        let code = d.handle_proj_event(&Event::new(0, 1, b"f\0"));
        assert_eq!(code, -libc::ENODEV);
        assert_eq!(d.stats().snapshot().failed, 1);
        assert_eq!(d.stats().snapshot().file_streams, 0);
    }

    #[test]
    fn test_panicking_provider_reports_io_error() {
        let d = dispatcher(Ok(()), true);
        let code = d.handle_proj_event(&Event::new(0, 1, b"f\0").with_fd(7));
        assert_eq!(code, -libc::EIO);
    }

    #[test]
    fn test_perm_codes() {
        let mask = (EventMask::DELETE_SELF | EventMask::ON_DIR).bits();
        let event = Event::new(mask, 1, b"d\0");

        assert_eq!(dispatcher(Ok(()), false).handle_perm_event(&event), PERM_ALLOW);
        assert_eq!(
            dispatcher(Err(ProjFsError::AccessDenied), false).handle_perm_event(&event),
            PERM_DENY
        );
        assert_eq!(
            dispatcher(Err(ProjFsError::NotSupported), false).handle_perm_event(&event),
            -libc::EOPNOTSUPP
        );
        assert_eq!(
            dispatcher(Err(ProjFsError::Errno(libc::EPERM)), false).handle_perm_event(&event),
            PERM_DENY
        );
        assert_eq!(
            dispatcher(Err(ProjFsError::Errno(-libc::EPERM)), false).handle_perm_event(&event),
            PERM_DENY
        );
        assert_eq!(
            dispatcher(Err(ProjFsError::Errno(0)), false).handle_perm_event(&event),
            -libc::EIO
        );
        assert_eq!(
            dispatcher(Err(ProjFsError::Errno(-libc::ENOENT)), false).handle_perm_event(&event),
            -libc::ENOENT
        );
    }

    #[test]
    fn test_notify_counts() {
        let d = dispatcher(Ok(()), true);
        let move_file = Event::new(EventMask::MOVE_SELF.bits(), 1, b"a\0");
        let modify = Event::new(0x2, 1, b"a\0");

        assert_eq!(d.handle_notify_event(&move_file), 0);
        assert_eq!(d.handle_perm_event(&move_file), PERM_ALLOW);
        assert_eq!(d.handle_notify_event(&modify), 0);

        let stats = d.stats().snapshot();
        assert_eq!(stats.notifications, 1);
        assert_eq!(stats.permission_checks, 1);
        assert_eq!(stats.ignored_events, 1);
    }
}
