//! Native session interface.
//!
//! The session is the binding between a storage root and a mounted
//! virtualization root. It generates events and stores placeholders; this
//! crate only drives it through the traits below.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ProjResult;
use crate::options::ProjFsOptions;
use crate::placeholder::{PlaceholderId, PlaceholderIdentity};
use crate::virtualizer::EventDispatcher;

/// A live native projected-filesystem session.
///
/// Placeholder calls may arrive from any thread, including from inside a
/// dispatch that the session itself is running.
pub trait Session: Send + Sync {
    /// Start delivering events.
    fn start(&self) -> ProjResult;

    /// Stop delivering events and unmount.
    ///
    /// Called once, when the last handle on the session is released. That
    /// may be on a dispatch thread if an event was still in flight at stop.
    fn stop(&self);

    /// Create a placeholder directory.
    fn create_proj_dir(&self, path: &str, mode: u32) -> ProjResult;

    /// Create a placeholder file carrying its identity.
    fn create_proj_file(
        &self,
        path: &str,
        size: u64,
        mode: u32,
        provider_id: &PlaceholderId,
        content_id: &PlaceholderId,
    ) -> ProjResult;

    /// Create a symlink placeholder.
    fn create_proj_symlink(&self, path: &str, target: &str) -> ProjResult;

    /// Read the identity stored with a file placeholder.
    fn get_proj_attrs(&self, path: &str) -> ProjResult<PlaceholderIdentity>;
}

/// Constructs sessions bound to a dispatcher.
pub trait SessionConnector: Send + Sync {
    /// Bind a new, not yet started session.
    ///
    /// The session must route projection events to
    /// [`EventDispatcher::handle_proj_event`], notifications to
    /// [`EventDispatcher::handle_notify_event`] and permission checks to
    /// [`EventDispatcher::handle_perm_event`].
    ///
    /// # Arguments
    /// * `options` - Roots and pool size for the session
    /// * `dispatcher` - Event handlers for the session's worker threads
    fn connect(
        &self,
        options: &ProjFsOptions,
        dispatcher: EventDispatcher,
    ) -> ProjResult<Box<dyn Session>>;
}

/// Owning handle on a started native session.
///
/// The native session is stopped when the handle drops, so a dispatch that
/// still holds a clone never sees it torn down.
pub(crate) struct SessionHandle {
    session: Box<dyn Session>,
}

impl SessionHandle {
    pub fn new(session: Box<dyn Session>) -> Self {
        Self { session }
    }
}

impl Deref for SessionHandle {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.session.stop();
        tracing::debug!("Native session stopped");
    }
}

/// Shared slot holding the live session, if any.
///
/// Readers clone the `Arc` and drop the lock straight away, so a session
/// removed by `take` stays alive and running until every in-flight user
/// releases it.
#[derive(Default)]
pub(crate) struct SessionSlot {
    session: RwLock<Option<Arc<SessionHandle>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session.
    pub fn current(&self) -> Option<Arc<SessionHandle>> {
        self.session.read().clone()
    }

    pub fn is_live(&self) -> bool {
        self.session.read().is_some()
    }

    /// Install a session. Returns false if one was already live.
    pub fn install(&self, session: Arc<SessionHandle>) -> bool {
        let mut slot = self.session.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(session);
        true
    }

    /// Remove the live session.
    pub fn take(&self) -> Option<Arc<SessionHandle>> {
        self.session.write().take()
    }
}
