//! Streaming projected content into driver-supplied descriptors.

use std::io;
use std::os::fd::RawFd;

use crate::error::{ProjFsError, ProjResult};

/// Byte-stream write primitive.
pub trait RawWrite: Send + Sync {
    /// Write some prefix of `buf` to `fd`.
    ///
    /// # Returns
    /// Number of bytes accepted, which may be fewer than `buf.len()`.
    fn write(&self, fd: RawFd, buf: &[u8]) -> io::Result<usize>;
}

/// `write(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibcWrite;

impl RawWrite for LibcWrite {
    fn write(&self, fd: RawFd, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: buf is a valid slice for buf.len() bytes. The kernel
        // validates fd.
        let res: isize = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(res as usize)
    }
}

/// Write all of `bytes` to `fd`, resubmitting the remainder after short writes.
///
/// # Arguments
/// * `writer` - Write primitive
/// * `fd` - Target descriptor
/// * `bytes` - Content to write
///
/// # Returns
/// Ok once every byte is accepted, `IoError` on the first failed write.
pub fn write_all(writer: &dyn RawWrite, fd: RawFd, bytes: &[u8]) -> ProjResult {
    let mut remaining: &[u8] = bytes;

    while !remaining.is_empty() {
        match writer.write(fd, remaining) {
            Ok(0) => {
                tracing::error!("Write to fd {} accepted no bytes", fd);
                return Err(ProjFsError::IoError);
            }
            Ok(written) => {
                remaining = &remaining[written.min(remaining.len())..];
            }
            Err(e) => {
                tracing::error!(
                    "Write to fd {} failed with {} bytes left: {}",
                    fd,
                    remaining.len(),
                    e
                );
                return Err(ProjFsError::IoError);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};
    use std::os::fd::AsRawFd;
    use std::sync::Mutex;

    /// Accepts at most `chunk` bytes per call and records what it received.
    struct ChunkedWriter {
        chunk: usize,
        fail_on_call: Option<usize>,
        calls: Mutex<Vec<usize>>,
        received: Mutex<Vec<u8>>,
    }

    impl ChunkedWriter {
        fn new(chunk: usize) -> Self {
            Self {
                chunk,
                fail_on_call: None,
                calls: Mutex::new(Vec::new()),
                received: Mutex::new(Vec::new()),
            }
        }
    }

    impl RawWrite for ChunkedWriter {
        fn write(&self, _fd: RawFd, buf: &[u8]) -> io::Result<usize> {
            let mut calls = self.calls.lock().unwrap();
            if self.fail_on_call == Some(calls.len()) {
                calls.push(0);
                return Err(io::Error::from_raw_os_error(libc::EIO));
            }
            let n = buf.len().min(self.chunk);
            calls.push(n);
            self.received.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        }
    }

    #[test]
    fn test_full_write_is_one_call() {
        let writer = ChunkedWriter::new(usize::MAX);
        assert_eq!(write_all(&writer, 3, b"hello world"), Ok(()));
        assert_eq!(*writer.calls.lock().unwrap(), vec![11]);
        assert_eq!(*writer.received.lock().unwrap(), b"hello world");
    }

    #[test]
    fn test_partial_writes_sum_to_length() {
        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let writer = ChunkedWriter::new(64);

        assert_eq!(write_all(&writer, 3, &data), Ok(()));

        let calls = writer.calls.lock().unwrap();
        assert_eq!(calls.iter().sum::<usize>(), data.len());
        assert_eq!(calls.len(), 16);
        assert_eq!(*writer.received.lock().unwrap(), data);
    }

    #[test]
    fn test_failure_stops_immediately() {
        let mut writer = ChunkedWriter::new(4);
        writer.fail_on_call = Some(1);

        assert_eq!(write_all(&writer, 3, b"0123456789"), Err(ProjFsError::IoError));
        assert_eq!(writer.calls.lock().unwrap().len(), 2);
        assert_eq!(*writer.received.lock().unwrap(), b"0123");
    }

    #[test]
    fn test_zero_length_write_fails() {
        let writer = ChunkedWriter::new(0);
        assert_eq!(write_all(&writer, 3, b"x"), Err(ProjFsError::IoError));
        assert_eq!(writer.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_buffer_never_writes() {
        let writer = ChunkedWriter::new(1);
        assert_eq!(write_all(&writer, 3, b""), Ok(()));
        assert!(writer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_libc_write_to_file() {
        let mut file = tempfile::tempfile().unwrap();
        assert_eq!(write_all(&LibcWrite, file.as_raw_fd(), b"projected"), Ok(()));

        file.seek(SeekFrom::Start(0)).unwrap();
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "projected");
    }

    #[test]
    fn test_libc_write_bad_fd() {
        assert_eq!(write_all(&LibcWrite, -1, b"x"), Err(ProjFsError::IoError));
    }
}
