//! Configuration options for a virtualization instance.

use std::path::{Path, PathBuf};

/// Configuration for starting a virtualization session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjFsOptions {
    /// Directory holding the backing (lower) storage.
    pub storage_root: PathBuf,

    /// Mount point the driver virtualizes.
    pub virtualization_root: PathBuf,

    /// Driver worker threads delivering events (0 = let the driver decide).
    pub pool_thread_count: u32,
}

impl ProjFsOptions {
    /// Create options for a pair of roots.
    ///
    /// # Arguments
    /// * `storage_root` - Backing storage directory
    /// * `virtualization_root` - Directory to virtualize
    pub fn new(storage_root: impl Into<PathBuf>, virtualization_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            virtualization_root: virtualization_root.into(),
            pool_thread_count: 0,
        }
    }

    /// Set the driver pool thread count.
    ///
    /// # Arguments
    /// * `count` - Number of worker threads
    pub fn with_pool_thread_count(mut self, count: u32) -> Self {
        self.pool_thread_count = count;
        self
    }

    /// Storage root.
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Virtualization root.
    pub fn virtualization_root(&self) -> &Path {
        &self.virtualization_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = ProjFsOptions::new("/var/lower", "/mnt/proj").with_pool_thread_count(8);
        assert_eq!(options.storage_root(), Path::new("/var/lower"));
        assert_eq!(options.virtualization_root(), Path::new("/mnt/proj"));
        assert_eq!(options.pool_thread_count, 8);
    }

    #[test]
    fn test_default_pool_size() {
        let options = ProjFsOptions::new("a", "b");
        assert_eq!(options.pool_thread_count, 0);
    }
}
