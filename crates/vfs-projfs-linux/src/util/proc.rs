//! Triggering-process lookup.

use std::path::PathBuf;

/// Resolves a process id to a display name.
pub trait ProcessInfo: Send + Sync {
    /// Invocation name of `pid`, or an empty string if it can't be read.
    fn process_name(&self, pid: i32) -> String;
}

/// Reads the first argument of `/proc/<pid>/cmdline`.
#[derive(Debug, Clone)]
pub struct ProcCmdline {
    proc_root: PathBuf,
}

impl ProcCmdline {
    /// Read from `/proc`.
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
        }
    }

    /// Read from a different procfs mount.
    ///
    /// # Arguments
    /// * `proc_root` - Directory laid out like `/proc`
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

impl Default for ProcCmdline {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInfo for ProcCmdline {
    fn process_name(&self, pid: i32) -> String {
        let path: PathBuf = self.proc_root.join(pid.to_string()).join("cmdline");
        match std::fs::read(&path) {
            Ok(cmdline) => first_arg(&cmdline),
            Err(e) => {
                tracing::trace!("No cmdline for pid {}: {}", pid, e);
                String::new()
            }
        }
    }
}

/// First NUL-delimited token of a command line.
fn first_arg(cmdline: &[u8]) -> String {
    let arg: &[u8] = cmdline.split(|b| *b == 0).next().unwrap_or_default();
    String::from_utf8_lossy(arg).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_arg() {
        assert_eq!(first_arg(b"/usr/bin/git\0status\0--short\0"), "/usr/bin/git");
        assert_eq!(first_arg(b"cat"), "cat");
        assert_eq!(first_arg(b""), "");
        assert_eq!(first_arg(b"\0"), "");
    }

    #[test]
    fn test_reads_fake_procfs() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("123")).unwrap();
        std::fs::write(root.path().join("123/cmdline"), b"ls\0-la\0").unwrap();

        let info = ProcCmdline::with_proc_root(root.path());
        assert_eq!(info.process_name(123), "ls");
        assert_eq!(info.process_name(456), "");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_reads_own_cmdline() {
        let pid = std::process::id() as i32;
        assert!(!ProcCmdline::new().process_name(pid).is_empty());
    }
}
