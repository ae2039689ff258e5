//! Bounded, rebased view over another stream.

use crate::error::{Result, VfsError};
use crate::stream::{SharedStream, Stream};
use std::io::SeekFrom;

/// A view over `[offset, offset+size)` of a shared base stream.
///
/// Reads/writes are rebased onto the base stream's coordinate space; `seek` is clamped to
/// `[0, size]`. Construction fails if the requested range does not fit inside the base.
#[derive(Debug, Clone)]
pub struct SubStream {
    base: SharedStream,
    offset: u64,
    size: u64,
    pos: u64,
    writable: bool,
}

impl SubStream {
    pub fn new(base: SharedStream, offset: u64, size: u64) -> Result<Self> {
        let base_size = base.lock().expect("stream mutex poisoned").size()?;
        if offset.checked_add(size).map(|end| end > base_size).unwrap_or(true) {
            return Err(VfsError::Precondition(format!(
                "sub-stream range [{offset}, {offset}+{size}) exceeds base stream size {base_size}"
            )));
        }
        let writable = base.lock().expect("stream mutex poisoned").can_write();
        Ok(SubStream { base, offset, size, pos: 0, writable })
    }

    pub fn read_only(base: SharedStream, offset: u64, size: u64) -> Result<Self> {
        let mut s = Self::new(base, offset, size)?;
        s.writable = false;
        Ok(s)
    }

    pub fn base_offset(&self) -> u64 {
        self.offset
    }
}

impl Stream for SubStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.size.saturating_sub(self.pos);
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }
        let mut base = self.base.lock().expect("stream mutex poisoned");
        let n = base.read_at(&mut buf[..want], self.offset + self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(VfsError::Unsupported("write on read-only sub-stream"));
        }
        let remaining = self.size.saturating_sub(self.pos);
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }
        let mut base = self.base.lock().expect("stream mutex poisoned");
        let n = base.write_at(&buf[..want], self.offset + self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(d) => self.pos as i64 + d,
            SeekFrom::End(d) => self.size as i64 + d,
        };
        let clamped = new_pos.clamp(0, self.size as i64);
        self.pos = clamped as u64;
        Ok(self.pos)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.size)
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let remaining = self.size.saturating_sub(offset);
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }
        let mut base = self.base.lock().expect("stream mutex poisoned");
        base.read_at(&mut buf[..want], self.offset + offset)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        if !self.writable {
            return Err(VfsError::Unsupported("write on read-only sub-stream"));
        }
        let remaining = self.size.saturating_sub(offset);
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }
        let mut base = self.base.lock().expect("stream mutex poisoned");
        base.write_at(&buf[..want], self.offset + offset)
    }

    fn can_write(&self) -> bool {
        self.writable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{shared, MemoryStream};

    #[test]
    fn size_and_clamped_seek() {
        let base = shared(MemoryStream::from_vec(vec![0u8; 100]));
        let mut sub = SubStream::new(base, 10, 20).unwrap();
        assert_eq!(sub.size().unwrap(), 20);
        sub.seek(SeekFrom::End(100)).unwrap();
        assert_eq!(sub.tell().unwrap(), 20);
        sub.seek(SeekFrom::Start(0)).unwrap();
        sub.seek(SeekFrom::Current(-100)).unwrap();
        assert_eq!(sub.tell().unwrap(), 0);
    }

    #[test]
    fn rejects_out_of_range_construction() {
        let base = shared(MemoryStream::from_vec(vec![0u8; 10]));
        assert!(SubStream::new(base, 5, 10).is_err());
    }

    #[test]
    fn reads_are_rebased() {
        let base = shared(MemoryStream::from_vec(b"0123456789".to_vec()));
        let mut sub = SubStream::new(base, 3, 4).unwrap();
        let mut buf = [0u8; 4];
        sub.read(&mut buf).unwrap();
        assert_eq!(&buf, b"3456");
    }
}
