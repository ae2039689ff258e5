//! The Container archive format: entries keyed by hash, with a trailer-located entry table
//!.
//!
//! Unlike WAD, the entry table isn't at a fixed offset — it sits wherever the packer left it, and
//! is located by a 4-byte trailer at the very end of the file giving its distance back from EOF.
//! Each entry is five `u32` fields: a name hash followed by four packed fields (`f1..f4`) from
//! which offset and size are derived:
//!
//! - `offset = f1 << 4`
//! - `size = f4` if `f4 != 0`, else `(f2 & 0x7FFFFFFF) + (f3 & 0x7FFFFFFF)`
//!
//! the same two-case size derivation the source's container reader uses (packed entries omit an
//! explicit size and reconstruct it from the two region lengths instead).

use crate::catalog::{FileTypeCatalog, FileTypeDescriptor};
use crate::device::{Device, Visitor};
use crate::error::{Result, VfsError};
use crate::file::{File, FileKind};
use crate::path::Path;
use crate::stream::{shared, ReadOnlyStream, ReadPrimitives, SharedStream, SubStream};
use crate::vfs::Vfs;
use std::io::SeekFrom;
use std::sync::Mutex;

pub const MAGIC: u32 = 3;

const TRAILER_LEN: u64 = 4;
const ENTRY_LEN: u64 = 20;

struct ContainerEntry {
    offset: u64,
    size: u64,
}

pub struct ContainerDevice {
    archive: SharedStream,
    entries: Vec<ContainerEntry>,
    tree: Mutex<Vfs>,
}

impl ContainerDevice {
    fn header_offset(archive: &SharedStream) -> Result<Option<u64>> {
        let archive_len = super::stream_len(archive)?;
        if archive_len < TRAILER_LEN {
            return Ok(None);
        }
        let mut buf = [0u8; 4];
        let n = archive
            .lock()
            .expect("stream mutex poisoned")
            .read_at(&mut buf, archive_len - TRAILER_LEN)?;
        if n < 4 {
            return Ok(None);
        }
        let trailer = u32::from_le_bytes(buf) as u64;
        let Some(header_offset) = archive_len.checked_sub(trailer) else {
            return Ok(None);
        };
        Ok(Some(header_offset))
    }

    fn parse(archive: SharedStream) -> Result<Self> {
        let archive_len = super::stream_len(&archive)?;
        let Some(header_offset) = Self::header_offset(&archive)? else {
            return Err(VfsError::FormatMismatch("container: trailer out of range"));
        };

        let mut guard = archive.lock().expect("stream mutex poisoned");
        guard.seek(SeekFrom::Start(header_offset))?;
        let magic = guard.read_u32_le()?;
        if magic != MAGIC {
            return Err(VfsError::FormatMismatch("container: bad magic"));
        }
        let entry_count = guard.read_u32_le()? as u64;

        let table_start = header_offset + 8;
        let table_end = table_start
            .checked_add(entry_count.saturating_mul(ENTRY_LEN))
            .ok_or_else(|| VfsError::Corrupt("container: entry count overflow".into()))?;
        if table_end > archive_len {
            return Err(VfsError::Corrupt("container: entry table exceeds archive length".into()));
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut tree = Vfs::new();
        for i in 0..entry_count {
            guard.seek(SeekFrom::Start(table_start + i * ENTRY_LEN))?;
            let hash = guard.read_u32_le()?;
            let f1 = guard.read_u32_le()?;
            let f2 = guard.read_u32_le()?;
            let f3 = guard.read_u32_le()?;
            let f4 = guard.read_u32_le()?;

            let offset = (f1 as u64) << 4;
            let size = if f4 != 0 {
                f4 as u64
            } else {
                ((f2 & 0x7FFF_FFFF) as u64) + ((f3 & 0x7FFF_FFFF) as u64)
            };
            if offset.saturating_add(size) > archive_len {
                return Err(VfsError::Corrupt(format!(
                    "container: entry {i} range [{offset}, {offset}+{size}) exceeds archive length"
                )));
            }

            let label = crate::hash_oracle::lowercase_folded().try_get_string(hash);
            let path = Path::new(format!("/{label}"));
            tree.register_existing_file(&path, entries.len() as u64);
            entries.push(ContainerEntry { offset, size });
        }
        drop(guard);

        Ok(ContainerDevice { archive, entries, tree: Mutex::new(tree) })
    }

    fn entry_stream(&self, index: usize) -> Result<SharedStream> {
        let entry = &self.entries[index];
        let sub = SubStream::read_only(self.archive.clone(), entry.offset, entry.size)?;
        Ok(shared(ReadOnlyStream::new(sub)))
    }
}

impl Device for ContainerDevice {
    fn exists(&self, path: &Path) -> bool {
        self.tree.lock().expect("vfs mutex poisoned").exists(path)
    }

    fn open(&self, path: &Path, catalog: &FileTypeCatalog) -> Result<Option<File>> {
        let info = self.tree.lock().expect("vfs mutex poisoned").get_file_info(path);
        let Some(index) = info else { return Ok(None) };
        let stream = self.entry_stream(index as usize)?;
        Ok(Some(catalog.open(stream, path.clone())?))
    }

    fn create(&self, _path: &Path, _type_id: u32) -> Result<Option<File>> {
        Ok(None)
    }

    fn delete(&self, _path: &Path) -> bool {
        false
    }

    fn visit(&self, path: &Path, recursive: bool, visitor: &mut Visitor<'_>) -> Result<()> {
        self.tree.lock().expect("vfs mutex poisoned").visit(path, recursive, visitor)
    }

    fn open_stream(&self, path: &Path) -> Result<SharedStream> {
        let index = self
            .tree
            .lock()
            .expect("vfs mutex poisoned")
            .get_file_info(path)
            .ok_or_else(|| VfsError::Precondition(format!("'{path}' is not a container entry")))?;
        self.entry_stream(index as usize)
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }
}

pub fn descriptor() -> FileTypeDescriptor {
    FileTypeDescriptor { name: "container", priority: 90, validate: validate, open: open }
}

fn validate(stream: &SharedStream) -> Result<bool> {
    let Some(header_offset) = ContainerDevice::header_offset(stream)? else { return Ok(false) };
    match super::peek_u32_at(stream, header_offset)? {
        Some(magic) => Ok(magic == MAGIC),
        None => Ok(false),
    }
}

fn open(stream: SharedStream, path: Path) -> Result<File> {
    let device = ContainerDevice::parse(stream.clone())?;
    Ok(File::new(path, stream, FileKind::Container(std::sync::Arc::new(device))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;
    use byteorder::{WriteBytesExt, LE};
    use std::io::Write;

    fn build_container(entries: &[(u32, &[u8])]) -> Vec<u8> {
        let mut data_blob = Vec::new();
        // offsets must be 16-byte aligned since offset = f1 << 4
        let mut offset = 0usize;
        let mut table = Vec::new();
        let mut placements = Vec::new();
        for (_, bytes) in entries {
            placements.push(offset);
            data_blob.extend_from_slice(bytes);
            while data_blob.len() % 16 != 0 {
                data_blob.push(0);
            }
            offset = data_blob.len();
        }
        for (i, (hash, bytes)) in entries.iter().enumerate() {
            table.write_u32::<LE>(*hash).unwrap();
            table.write_u32::<LE>((placements[i] as u32) >> 4).unwrap();
            table.write_u32::<LE>(0).unwrap();
            table.write_u32::<LE>(0).unwrap();
            table.write_u32::<LE>(bytes.len() as u32).unwrap();
        }

        let header_offset = data_blob.len();
        let mut out = data_blob;
        out.write_u32::<LE>(MAGIC).unwrap();
        out.write_u32::<LE>(entries.len() as u32).unwrap();
        out.extend_from_slice(&table);

        // The trailer is the offset-from-end of the *true* EOF, i.e. including the trailer's own
        // 4 bytes, not the length just before it's appended.
        let archive_len = out.len() as u32 + TRAILER_LEN as u32;
        let trailer = archive_len - (header_offset as u32);
        out.write_u32::<LE>(trailer).unwrap();
        out
    }

    #[test]
    fn parses_entries_and_reads_back_bytes() {
        let hash = crate::hash::crc32_lowercase(b"model.mdl");
        let bytes = build_container(&[(hash, b"container payload")]);
        let archive = shared(MemoryStream::from_vec(bytes));
        let device = ContainerDevice::parse(archive).unwrap();

        let path = Path::new("/model.mdl");
        assert!(Device::exists(&device, &path));
        let catalog = FileTypeCatalog::with_builtins();
        let file = Device::open(&device, &path, &catalog).unwrap().unwrap();
        let mut buf = vec![0u8; "container payload".len()];
        use crate::stream::Stream;
        file.raw.lock().unwrap().read(&mut buf).unwrap();
        assert_eq!(&buf, b"container payload");
    }

    #[test]
    fn rejects_missing_trailer() {
        let archive = shared(MemoryStream::from_vec(vec![0u8; 2]));
        assert!(ContainerDevice::parse(archive).is_err());
    }

    /// Regression test for a trailer off-by-`TRAILER_LEN` bug: the trailer must be the
    /// offset-from-end measured against the *true* end of file (after the trailer's own 4
    /// bytes), matching `entriesPos = streamSize - entriesOffset` in the real game tooling, not
    /// against the length of the file before the trailer is appended.
    #[test]
    fn trailer_is_measured_from_true_eof() {
        let hash = crate::hash::crc32_lowercase(b"real_tool.dat");
        let payload = b"payload bytes!!!"; // 16 bytes, already aligned
        assert_eq!(payload.len() % 16, 0);

        let mut out = Vec::new();
        out.extend_from_slice(payload);
        let header_offset = out.len();

        out.write_u32::<LE>(MAGIC).unwrap();
        out.write_u32::<LE>(1).unwrap(); // entry count
        out.write_u32::<LE>(hash).unwrap();
        out.write_u32::<LE>(0).unwrap(); // f1: offset 0 >> 4
        out.write_u32::<LE>(0).unwrap(); // f2
        out.write_u32::<LE>(0).unwrap(); // f3
        out.write_u32::<LE>(payload.len() as u32).unwrap(); // f4: size

        // True archive length once the trailer itself is appended.
        let archive_len = out.len() as u32 + TRAILER_LEN as u32;
        let trailer = archive_len - (header_offset as u32);
        out.write_u32::<LE>(trailer).unwrap();

        let archive = shared(MemoryStream::from_vec(out));
        let device = ContainerDevice::parse(archive).unwrap();
        let path = Path::new("/real_tool.dat");
        let catalog = FileTypeCatalog::with_builtins();
        let file = Device::open(&device, &path, &catalog).unwrap().unwrap();
        let mut buf = vec![0u8; payload.len()];
        use crate::stream::Stream;
        file.raw.lock().unwrap().read(&mut buf).unwrap();
        assert_eq!(&buf, payload);
    }
}
