//! The WAD archive format: a flat entry table with a trailing UTF-8 path table.
//!
//! Layout: an 8-byte header (`magic`, `entryCount`), followed immediately by `entryCount` 12-byte
//! entries (`pathHash`, `offset`, `size`). Unlike Container/Trunk, WAD stores the *actual* path
//! strings on disk — they live in a second table placed right after the last entry's data
//! (`lastEntry.offset + lastEntry.size`): `entryCount` records of `{u16 length, length bytes of
//! UTF-8 path}`, in the same order as the entry table. Each path may itself contain `/`, which the
//! backing [`crate::vfs::Vfs`] splits into nested directories the same way the source's
//! `WAD::Root()` builds its tree.

use crate::catalog::{FileTypeCatalog, FileTypeDescriptor};
use crate::device::{Device, VisitControl, Visitor};
use crate::error::{Result, VfsError};
use crate::file::{File, FileKind};
use crate::path::Path;
use crate::stream::{shared, ReadOnlyStream, ReadPrimitives, SharedStream, SubStream};
use crate::vfs::Vfs;
use std::io::SeekFrom;
use std::sync::Mutex;

pub const MAGIC: u32 = 0x0144_4157;

const HEADER_LEN: u64 = 8;
const ENTRY_LEN: u64 = 12;

struct WadEntry {
    offset: u32,
    size: u32,
}

/// An opened WAD archive, addressable as its own [`Device`] namespace.
pub struct WadDevice {
    archive: SharedStream,
    entries: Vec<WadEntry>,
    tree: Mutex<Vfs>,
}

impl WadDevice {
    fn parse(archive: SharedStream) -> Result<Self> {
        let mut guard = archive.lock().expect("stream mutex poisoned");
        guard.seek(SeekFrom::Start(0))?;
        let magic = guard.read_u32_le()?;
        if magic != MAGIC {
            return Err(VfsError::FormatMismatch("wad: bad magic"));
        }
        let entry_count = guard.read_u32_le()? as u64;

        let archive_len = guard.size()?;
        let table_end = HEADER_LEN
            .checked_add(entry_count.saturating_mul(ENTRY_LEN))
            .ok_or_else(|| VfsError::Corrupt("wad: entry count overflow".into()))?;
        if table_end > archive_len {
            return Err(VfsError::Corrupt("wad: entry table exceeds archive length".into()));
        }

        let mut raw_entries = Vec::with_capacity(entry_count as usize);
        for i in 0..entry_count {
            guard.seek(SeekFrom::Start(HEADER_LEN + i * ENTRY_LEN))?;
            let path_hash = guard.read_u32_le()?;
            let offset = guard.read_u32_le()?;
            let size = guard.read_u32_le()?;
            if (offset as u64).saturating_add(size as u64) > archive_len {
                return Err(VfsError::Corrupt(format!(
                    "wad: entry {i} range [{offset}, {offset}+{size}) exceeds archive length"
                )));
            }
            raw_entries.push((path_hash, WadEntry { offset, size }));
        }

        // The path table sits right after the last entry's data. With zero entries there is no
        // "last entry", so the table (also empty) starts right where the header ends.
        let path_table_start = match raw_entries.last() {
            Some((_, last)) => (last.offset as u64).saturating_add(last.size as u64),
            None => table_end,
        };
        if path_table_start > archive_len {
            return Err(VfsError::Corrupt("wad: path table start exceeds archive length".into()));
        }

        guard.seek(SeekFrom::Start(path_table_start))?;
        let mut tree = Vfs::new();
        let mut entries = Vec::with_capacity(raw_entries.len());
        for (i, (path_hash, entry)) in raw_entries.into_iter().enumerate() {
            let path_len = guard.read_u16_le()? as usize;
            let mut buf = vec![0u8; path_len];
            guard.read_exact_buf(&mut buf)?;
            let name = String::from_utf8(buf).map_err(|_| {
                VfsError::Corrupt(format!("wad: entry {i} path is not valid UTF-8"))
            })?;
            let _ = path_hash; // on-disk path string is authoritative; the hash is not re-derived.
            let path = Path::new(format!("/{name}"));
            tree.register_existing_file(&path, entries.len() as u64);
            entries.push(entry);
        }
        drop(guard);

        Ok(WadDevice { archive, entries, tree: Mutex::new(tree) })
    }

    fn entry_stream(&self, index: usize) -> Result<SharedStream> {
        let entry = &self.entries[index];
        let sub = SubStream::read_only(
            self.archive.clone(),
            entry.offset as u64,
            entry.size as u64,
        )?;
        Ok(shared(ReadOnlyStream::new(sub)))
    }
}

impl Device for WadDevice {
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
            .ok_or_else(|| VfsError::Precondition(format!("'{path}' is not a WAD entry")))?;
        self.entry_stream(index as usize)
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }
}

pub fn descriptor() -> FileTypeDescriptor {
    FileTypeDescriptor { name: "wad", priority: 100, validate: validate, open: open }
}

fn validate(stream: &SharedStream) -> Result<bool> {
    Ok(super::peek_magic_u32(stream)? == Some(MAGIC))
}

fn open(stream: SharedStream, path: Path) -> Result<File> {
    let device = WadDevice::parse(stream.clone())?;
    Ok(File::new(path, stream, FileKind::Wad(std::sync::Arc::new(device))))
}
