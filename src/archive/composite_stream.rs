//! A stream stitched together from several non-contiguous ranges of other streams.
//!
//! Some shader bytecode is split across the primary/secondary regions of a [`super::trunk`]
//! archive (or across unrelated archive entries entirely); callers need one contiguous logical
//! stream over the pieces. `CompositeStream` presents `N` `(stream, offset, len)` segments as a
//! single addressable range `[0, sum(len))`, with reads split across segment boundaries as
//! needed. It is read-only: the source's composite stream has no corresponding writer either.

use crate::error::{Result, VfsError};
use crate::stream::{SharedStream, Stream};
use std::io::SeekFrom;

struct Segment {
    stream: SharedStream,
    offset: u64,
    len: u64,
}

#[derive(Debug)]
pub struct CompositeStream {
    segments: Vec<Segment>,
    total_len: u64,
    pos: u64,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment").field("offset", &self.offset).field("len", &self.len).finish()
    }
}

impl CompositeStream {
    /// Builds a composite stream from `(stream, offset, len)` segments, in order. Errors if any
    /// segment's range exceeds its underlying stream's size.
    pub fn new(parts: Vec<(SharedStream, u64, u64)>) -> Result<Self> {
        let mut segments = Vec::with_capacity(parts.len());
        let mut total_len = 0u64;
        for (stream, offset, len) in parts {
            let stream_len = stream.lock().expect("stream mutex poisoned").size()?;
            if offset.saturating_add(len) > stream_len {
                return Err(VfsError::Precondition(format!(
                    "composite segment range [{offset}, {offset}+{len}) exceeds its stream's size {stream_len}"
                )));
            }
            total_len += len;
            segments.push(Segment { stream, offset, len });
        }
        Ok(CompositeStream { segments, total_len, pos: 0 })
    }

    fn read_at_impl(&self, buf: &mut [u8], mut at: u64) -> Result<usize> {
        let mut written = 0;
        let mut segment_start = 0u64;
        for segment in &self.segments {
            let segment_end = segment_start + segment.len;
            if at < segment_end && written < buf.len() {
                let local_offset = at.saturating_sub(segment_start);
                let available = segment.len - local_offset;
                let want = ((buf.len() - written) as u64).min(available) as usize;
                if want > 0 {
                    let mut base = segment.stream.lock().expect("stream mutex poisoned");
                    let n = base.read_at(
                        &mut buf[written..written + want],
                        segment.offset + local_offset,
                    )?;
                    written += n;
                    at += n as u64;
                    if n < want {
                        break;
                    }
                }
            }
            segment_start = segment_end;
            if written >= buf.len() {
                break;
            }
        }
        Ok(written)
    }
}

impl Stream for CompositeStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.total_len.saturating_sub(self.pos);
        let want = (buf.len() as u64).min(remaining) as usize;
        let n = self.read_at_impl(&mut buf[..want], self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(VfsError::Unsupported("write on read-only composite stream"))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(d) => self.pos as i64 + d,
            SeekFrom::End(d) => self.total_len as i64 + d,
        };
        self.pos = new_pos.clamp(0, self.total_len as i64) as u64;
        Ok(self.pos)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.total_len)
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let remaining = self.total_len.saturating_sub(offset);
        let want = (buf.len() as u64).min(remaining) as usize;
        self.read_at_impl(&mut buf[..want], offset)
    }

    fn can_write(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{shared, MemoryStream};

    #[test]
    fn reads_span_segment_boundaries() {
        let a = shared(MemoryStream::from_vec(b"0123456789".to_vec()));
        let b = shared(MemoryStream::from_vec(b"abcdefghij".to_vec()));
        let mut composite = CompositeStream::new(vec![(a, 2, 4), (b, 5, 3)]).unwrap();

        assert_eq!(composite.size().unwrap(), 7);
        let mut buf = [0u8; 7];
        composite.read(&mut buf).unwrap();
        assert_eq!(&buf, b"2345fgh");
    }

    #[test]
    fn rejects_out_of_range_segment() {
        let a = shared(MemoryStream::from_vec(vec![0u8; 4]));
        assert!(CompositeStream::new(vec![(a, 0, 10)]).is_err());
    }

    #[test]
    fn write_is_unsupported() {
        let a = shared(MemoryStream::from_vec(vec![0u8; 4]));
        let mut composite = CompositeStream::new(vec![(a, 0, 4)]).unwrap();
        assert!(composite.write(b"x").is_err());
    }
}
