mod result_queue_tests;

use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// In-memory read source that starts failing after a set number of bytes
/// have been read. A budget of `u64::MAX` never fails.
pub(crate) struct TestSource {
    inner: Cursor<Vec<u8>>,
    fail_after: u64,
    read_bytes: u64,
}

impl TestSource {
    pub(crate) fn healthy(data: Vec<u8>) -> Self {
        Self::failing_after(data, u64::MAX)
    }

    pub(crate) fn failing_after(data: Vec<u8>, fail_after: u64) -> Self {
        Self {
            inner: Cursor::new(data),
            fail_after,
            read_bytes: 0,
        }
    }
}

impl Read for TestSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.read_bytes >= self.fail_after {
            return Err(io::Error::other("injected read failure"));
        }
        let n = self.inner.read(buf)?;
        self.read_bytes += n as u64;
        Ok(n)
    }
}

impl Seek for TestSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
