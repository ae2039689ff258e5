//! Transparent wrapper that forbids writes on its base stream.

use crate::error::{Result, VfsError};
use crate::stream::Stream;
use std::io::SeekFrom;

#[derive(Debug)]
pub struct ReadOnlyStream<S: Stream> {
    inner: S,
}

impl<S: Stream> ReadOnlyStream<S> {
    pub fn new(inner: S) -> Self {
        ReadOnlyStream { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Stream> Stream for ReadOnlyStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(VfsError::Unsupported("write on read-only stream"))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.inner.seek(pos)
    }

    fn size(&mut self) -> Result<u64> {
        self.inner.size()
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.inner.read_at(buf, offset)
    }

    fn write_at(&mut self, _buf: &[u8], _offset: u64) -> Result<usize> {
        Err(VfsError::Unsupported("write on read-only stream"))
    }

    fn can_write(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;

    #[test]
    fn write_calls_return_unsupported() {
        let mut s = ReadOnlyStream::new(MemoryStream::from_vec(vec![1, 2, 3]));
        assert!(s.write(b"x").is_err());
        assert!(s.write_at(b"x", 0).is_err());
        assert!(!s.can_write());

        let mut buf = [0u8; 3];
        s.read(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }
}
