//! Host-filesystem-backed stream.

use crate::error::Result;
use crate::stream::Stream;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::FileExt;
use std::path::Path;

#[derive(Debug)]
pub struct NativeFileStream {
    file: File,
    writable: bool,
}

impl NativeFileStream {
    /// Opens `path` for read+write, creating it if absent.
    pub fn open_read_write(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        Ok(NativeFileStream { file, writable: true })
    }

    /// Opens `path` for reading only.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(NativeFileStream { file, writable: false })
    }

    pub fn from_file(file: File, writable: bool) -> Self {
        NativeFileStream { file, writable }
    }
}

impl Stream for NativeFileStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(Read::read(&mut self.file, buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(crate::error::VfsError::Unsupported("write on read-only native file"));
        }
        Ok(Write::write(&mut self.file, buf)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(Seek::seek(&mut self.file, pos)?)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        Ok(FileExt::read_at(&self.file, buf, offset)?)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        if !self.writable {
            return Err(crate::error::VfsError::Unsupported("write on read-only native file"));
        }
        Ok(FileExt::write_at(&self.file, buf, offset)?)
    }

    fn can_write(&self) -> bool {
        self.writable
    }
}
