//! Parsers and devices for the game's proprietary archive formats.
//!
//! Each submodule owns one binary format. Most also implement [`crate::device::Device`], since
//! opening e.g. a WAD yields not just a [`crate::file::File`] but a namespace of entries that can
//! themselves be opened, recursively, through the same [`crate::catalog::FileTypeCatalog`].

pub mod attribute_tree;
pub mod composite_stream;
pub mod container;
pub mod raw;
pub mod shader_programs;
pub mod trunk;
pub mod wad;

use crate::error::Result;
use crate::stream::SharedStream;
use byteorder::{ByteOrder, LE};

/// Reads the stream's total size without disturbing its position.
pub(crate) fn stream_len(stream: &SharedStream) -> Result<u64> {
    stream.lock().expect("stream mutex poisoned").size()
}

/// Peeks at the first 4 bytes of `stream` as a little-endian `u32`, without disturbing its
/// position. `Ok(None)` when the stream is shorter than 4 bytes.
pub(crate) fn peek_magic_u32(stream: &SharedStream) -> Result<Option<u32>> {
    peek_u32_at(stream, 0)
}

/// Peeks at 4 bytes at `offset` as a little-endian `u32`, without disturbing `tell`.
pub(crate) fn peek_u32_at(stream: &SharedStream, offset: u64) -> Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let n = stream.lock().expect("stream mutex poisoned").read_at(&mut buf, offset)?;
    if n < 4 {
        return Ok(None);
    }
    Ok(Some(LE::read_u32(&buf)))
}
