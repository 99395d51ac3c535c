//! Linux collaborators used by dispatch: process lookup and raw writes.

pub mod proc;
pub mod write;

pub use proc::{ProcCmdline, ProcessInfo};
pub use write::{write_all, LibcWrite, RawWrite};
