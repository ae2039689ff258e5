//! Random-access byte stream abstraction and its composable variants.
//!
//! Every stream exposes the same capability set: `Read`, `Write`, `Size`, `Tell`, `Seek`, plus
//! positional `read_at`/`write_at` that must never perturb `tell`. Wrappers that cannot support
//! writes (e.g. [`read_only::ReadOnly`]) fail write calls with [`crate::error::VfsError::Unsupported`]
//! rather than panicking.

mod memory;
mod native_file;
mod primitives;
mod read_only;
mod sub_stream;
mod temp;

pub use memory::MemoryStream;
pub use native_file::NativeFileStream;
pub use primitives::{ReadPrimitives, WritePrimitives};
pub use read_only::ReadOnlyStream;
pub use sub_stream::SubStream;
pub use temp::{TempStream, DEFAULT_THRESHOLD_BYTES};

use crate::error::{Result, VfsError};
use std::io::SeekFrom;
use std::sync::{Arc, Mutex};

/// A seekable byte channel.
///
/// Implementations are not required to be `Sync`-safe for concurrent use from multiple threads;
/// the concurrency model (see module-level docs in `assembly`) is a single consumer per stream at
/// a time, with `Arc<Mutex<_>>` used only to let sub-streams share a base stream's lifetime.
pub trait Stream: std::fmt::Debug + Send {
    /// Reads into `buf`, advancing `tell`. Returns the number of bytes actually read (may be
    /// less than `buf.len()` at EOF).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes from `buf`, advancing `tell`. Returns the number of bytes written.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Repositions `tell`.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Total addressable size of the stream.
    fn size(&mut self) -> Result<u64>;

    /// Current position.
    fn tell(&mut self) -> Result<u64> {
        self.seek(SeekFrom::Current(0))
    }

    /// Reads `buf.len()` bytes starting at `offset`, without perturbing `tell`.
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let saved = self.tell()?;
        self.seek(SeekFrom::Start(offset))?;
        let n = self.read(buf);
        self.seek(SeekFrom::Start(saved))?;
        n
    }

    /// Writes `buf` starting at `offset`, without perturbing `tell`.
    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        let saved = self.tell()?;
        self.seek(SeekFrom::Start(offset))?;
        let n = self.write(buf);
        self.seek(SeekFrom::Start(saved))?;
        n
    }

    /// Whether this stream accepts writes at all.
    fn can_write(&self) -> bool {
        true
    }
}

/// Shared handle to a stream, used whenever a stream is the base of one or more sub-streams.
pub type SharedStream = Arc<Mutex<dyn Stream>>;

/// Wraps any owned stream value in the shared handle type.
pub fn shared<S: Stream + 'static>(stream: S) -> SharedStream {
    Arc::new(Mutex::new(stream))
}

/// Copies the remainder of `src` (from its current position) onto the end of `dest`, in
/// fixed-size chunks.
pub fn copy_to(src: &mut dyn Stream, dest: &mut dyn Stream) -> Result<u64> {
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let mut written = 0;
        while written < n {
            let w = dest.write(&buf[written..n])?;
            if w == 0 {
                return Err(VfsError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "copy_to: destination stream accepted zero bytes",
                )));
            }
            written += w;
        }
        total += n as u64;
    }
    Ok(total)
}
