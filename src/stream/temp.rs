//! Spill-to-disk buffer: starts in memory, promotes to a temp file once it grows past a
//! threshold.

use crate::error::Result;
use crate::stream::{MemoryStream, NativeFileStream, Stream};
use std::io::SeekFrom;
use tempfile::NamedTempFile;

/// Default switchover point: 32 MiB, matching the configuration default (see `crate::config`).
pub const DEFAULT_THRESHOLD_BYTES: u64 = 32 * 1024 * 1024;

enum Backing {
    Memory(MemoryStream),
    File(NativeFileStream, #[allow(dead_code)] NamedTempFile),
}

impl std::fmt::Debug for Backing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backing::Memory(_) => write!(f, "Backing::Memory"),
            Backing::File(_, _) => write!(f, "Backing::File"),
        }
    }
}

/// A stream that transparently promotes itself from an in-memory buffer to a temp file once its
/// size would exceed `threshold`.
#[derive(Debug)]
pub struct TempStream {
    backing: Backing,
    threshold: u64,
}

impl TempStream {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD_BYTES)
    }

    pub fn with_threshold(threshold: u64) -> Self {
        TempStream { backing: Backing::Memory(MemoryStream::new()), threshold }
    }

    pub fn is_using_temp_file(&self) -> bool {
        matches!(self.backing, Backing::File(_, _))
    }

    fn promote_if_needed(&mut self, prospective_size: u64) -> Result<()> {
        if prospective_size <= self.threshold {
            return Ok(());
        }
        if let Backing::Memory(mem) = &self.backing {
            let pos = {
                let mut mem_clone = mem.clone();
                mem_clone.tell()?
            };
            let named = NamedTempFile::new()?;
            let file = named.reopen()?;
            let mut file_stream = NativeFileStream::from_file(file, true);
            let data = mem.as_slice().to_vec();
            file_stream.write(&data)?;
            file_stream.seek(SeekFrom::Start(pos))?;
            self.backing = Backing::File(file_stream, named);
        }
        Ok(())
    }
}

impl Default for TempStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for TempStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.backing {
            Backing::Memory(m) => m.read(buf),
            Backing::File(f, _) => f.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let current_size = self.size()?;
        let pos = self.tell()?;
        self.promote_if_needed(pos + buf.len() as u64)?;
        let _ = current_size;
        match &mut self.backing {
            Backing::Memory(m) => m.write(buf),
            Backing::File(f, _) => f.write(buf),
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match &mut self.backing {
            Backing::Memory(m) => m.seek(pos),
            Backing::File(f, _) => f.seek(pos),
        }
    }

    fn size(&mut self) -> Result<u64> {
        match &mut self.backing {
            Backing::Memory(m) => m.size(),
            Backing::File(f, _) => f.size(),
        }
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        match &mut self.backing {
            Backing::Memory(m) => m.read_at(buf, offset),
            Backing::File(f, _) => f.read_at(buf, offset),
        }
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.promote_if_needed(offset + buf.len() as u64)?;
        match &mut self.backing {
            Backing::Memory(m) => m.write_at(buf, offset),
            Backing::File(f, _) => f.write_at(buf, offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_as_memory() {
        let s = TempStream::new();
        assert!(!s.is_using_temp_file());
    }

    #[test]
    fn promotes_past_threshold_preserving_content() {
        let mut s = TempStream::with_threshold(8);
        s.write(b"hello").unwrap();
        assert!(!s.is_using_temp_file());

        s.write(b"world!!!").unwrap();
        assert!(s.is_using_temp_file());

        s.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = vec![0u8; s.size().unwrap() as usize];
        s.read(&mut buf).unwrap();
        assert_eq!(&buf, b"helloworld!!!");
    }
}
