//! Virtualization lifecycle and event dispatch.
//!
//! `VirtualizationInstance` owns the session and the provider API;
//! `EventDispatcher` is what the session calls back into.

mod dispatch;
mod instance;

pub use dispatch::EventDispatcher;
pub use instance::VirtualizationInstance;
