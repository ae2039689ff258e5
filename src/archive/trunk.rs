//! The Trunk archive format ("trM#"): a two-region archive keyed by hash, with one pair of
//! special sections unpacking into an embedded texture pack.
//!
//! A 20-byte header (`magic`, `reserved`, `primaryPlusHeaderSize`, `secondaryDataSize`,
//! `runtimePtr`) is followed immediately by `u32 sectionCount` and the section table
//! (`sectionCount × {nameHash, size, offset}`) — the table itself lives inside the primary-data
//! region, which starts right after the 20-byte header, not after the table. Its size is
//! `primaryPlusHeaderSize` minus the 20-byte fixed header. The secondary-data region starts at
//! `primaryPos + primarySize` and runs for `secondaryDataSize` bytes.
//!
//! Each section's raw `offset` field carries its region in its low bit: `offset & 1` steers
//! between an absolute primary-region position (bit clear: `offset` used as-is) and a
//! secondary-region-relative one (bit set: `secondaryDataPos + (offset & !1)`). Section `size` is
//! taken verbatim — there is no further decoding of it.
//!
//! `"uniquetexturemain"` and `"uniquetexturevram"` are ordinary sections by this same table, but
//! together they also describe an embedded texture pack: the main section is a small per-texture
//! descriptor list, the vram section is the concatenated bulk payload. Each texture's size is
//! derived from the gap to the next texture's offset (or to the end of the vram section for the
//! last one), so the descriptor list must be ascending in offset.

use crate::catalog::{FileTypeCatalog, FileTypeDescriptor};
use crate::device::{Device, Visitor};
use crate::error::{Result, VfsError};
use crate::file::{File, FileKind};
use crate::path::Path;
use crate::stream::{shared, ReadOnlyStream, ReadPrimitives, SharedStream, SubStream};
use crate::vfs::Vfs;
use std::io::SeekFrom;
use std::sync::Mutex;

pub const MAGIC: u32 = 0x234D_7274; // "trM#" read little-endian

const HEADER_LEN: u64 = 20;
const SECTION_LEN: u64 = 12;

fn main_section_hash() -> u32 {
    crate::hash::crc32_lowercase(b"uniquetexturemain")
}

fn vram_section_hash() -> u32 {
    crate::hash::crc32_lowercase(b"uniquetexturevram")
}

struct TrunkEntry {
    offset: u64,
    size: u64,
}

/// An opened Trunk archive, addressable as its own [`Device`] namespace.
pub struct TrunkDevice {
    archive: SharedStream,
    entries: Vec<TrunkEntry>,
    tree: Mutex<Vfs>,
}

/// Resolves a raw section `offset` field to an absolute byte position, per the low-bit rule.
fn decode_offset(raw_offset: u32, secondary_pos: u64) -> u64 {
    if raw_offset & 1 != 0 {
        secondary_pos + (raw_offset & !1) as u64
    } else {
        raw_offset as u64
    }
}

impl TrunkDevice {
    fn parse(archive: SharedStream) -> Result<Self> {
        let archive_len = super::stream_len(&archive)?;
        let mut guard = archive.lock().expect("stream mutex poisoned");
        guard.seek(SeekFrom::Start(0))?;
        let magic = guard.read_u32_le()?;
        if magic != MAGIC {
            return Err(VfsError::FormatMismatch("trunk: bad magic"));
        }
        let _reserved = guard.read_u32_le()?;
        let primary_plus_header_size = guard.read_u32_le()? as u64;
        let secondary_size = guard.read_u32_le()? as u64;
        let _runtime_ptr = guard.read_u32_le()?;

        let section_count = guard.read_u32_le()? as u64;
        let table_start = HEADER_LEN + 4;
        let table_end = table_start
            .checked_add(section_count.saturating_mul(SECTION_LEN))
            .ok_or_else(|| VfsError::Corrupt("trunk: section count overflow".into()))?;
        if table_end > archive_len {
            return Err(VfsError::Corrupt("trunk: section table exceeds archive length".into()));
        }

        let primary_pos = HEADER_LEN;
        let primary_size = primary_plus_header_size.saturating_sub(HEADER_LEN);
        let secondary_pos = primary_pos + primary_size;
        let archive_end = secondary_pos
            .checked_add(secondary_size)
            .ok_or_else(|| VfsError::Corrupt("trunk: secondary region overflow".into()))?;
        if archive_end > archive_len {
            return Err(VfsError::Corrupt("trunk: regions exceed archive length".into()));
        }

        let mut sections = Vec::with_capacity(section_count as usize);
        for i in 0..section_count {
            guard.seek(SeekFrom::Start(table_start + i * SECTION_LEN))?;
            let name_hash = guard.read_u32_le()?;
            let size = guard.read_u32_le()? as u64;
            let raw_offset = guard.read_u32_le()?;
            let offset = decode_offset(raw_offset, secondary_pos);
            if offset.saturating_add(size) > archive_len {
                return Err(VfsError::Corrupt(format!(
                    "trunk: section {i} range [{offset}, {offset}+{size}) exceeds archive length"
                )));
            }
            sections.push((name_hash, TrunkEntry { offset, size }));
        }

        let mut tree = Vfs::new();
        let mut entries = Vec::with_capacity(sections.len());
        let mut main_vram: Option<(u64, u64)> = None; // (main index, vram index)
        for (name_hash, entry) in sections {
            let label = crate::hash_oracle::lowercase_folded().try_get_string(name_hash);
            let path = Path::new(format!("/{label}"));
            let index = entries.len() as u64;
            if name_hash == main_section_hash() {
                main_vram = Some((index, main_vram.map(|(_, v)| v).unwrap_or(u64::MAX)));
            } else if name_hash == vram_section_hash() {
                main_vram = Some((main_vram.map(|(m, _)| m).unwrap_or(u64::MAX), index));
            }
            tree.register_existing_file(&path, index);
            entries.push(entry);
        }
        drop(guard);

        if let Some((main_idx, vram_idx)) = main_vram {
            if main_idx != u64::MAX && vram_idx != u64::MAX {
                Self::register_textures(
                    &archive,
                    &entries[main_idx as usize],
                    &entries[vram_idx as usize],
                    &mut tree,
                    &mut entries,
                )?;
            }
        }

        Ok(TrunkDevice { archive, entries, tree: Mutex::new(tree) })
    }

    /// Parses the embedded texture descriptor list inside the `uniquetexturemain` section and
    /// registers each texture as a synthetic file backed by a slice of the `uniquetexturevram`
    /// section.
    fn register_textures(
        archive: &SharedStream,
        main: &TrunkEntry,
        vram: &TrunkEntry,
        tree: &mut Vfs,
        entries: &mut Vec<TrunkEntry>,
    ) -> Result<()> {
        let mut guard = archive.lock().expect("stream mutex poisoned");
        guard.seek(SeekFrom::Start(main.offset))?;
        let runtime_scratch = guard.read_u32_le()?;
        if runtime_scratch != 0 {
            return Err(VfsError::Corrupt(
                "trunk: uniquetexturemain runtime scratch must be zero on disk".into(),
            ));
        }
        let texture_count = guard.read_u32_le()? as usize;

        let mut descriptors = Vec::with_capacity(texture_count);
        for i in 0..texture_count {
            let tex_offset = guard.read_u32_le()? as u64;
            let _zero = guard.read_u32_le()?;
            let name_hash = guard.read_u32_le()?;
            if let Some((_, prev_offset)) = descriptors.last() {
                if tex_offset <= *prev_offset {
                    return Err(VfsError::Corrupt(format!(
                        "trunk: texture {i} offset is not ascending"
                    )));
                }
            }
            descriptors.push((name_hash, tex_offset));
        }
        drop(guard);

        for (i, (name_hash, tex_offset)) in descriptors.iter().enumerate() {
            let size = if i + 1 < descriptors.len() {
                descriptors[i + 1].1 - tex_offset
            } else {
                vram.size.saturating_sub(*tex_offset)
            };
            let abs_offset = vram.offset + tex_offset;
            if abs_offset + size > vram.offset + vram.size {
                return Err(VfsError::Corrupt(format!(
                    "trunk: texture {i} range exceeds the vram section"
                )));
            }
            let label = crate::hash_oracle::lowercase_folded().try_get_string(*name_hash);
            let path = Path::new(format!("/textures/{label}"));
            tree.register_existing_file(&path, entries.len() as u64);
            entries.push(TrunkEntry { offset: abs_offset, size });
        }
        Ok(())
    }

    fn entry_stream(&self, index: usize) -> Result<SharedStream> {
        let entry = &self.entries[index];
        let sub = SubStream::read_only(self.archive.clone(), entry.offset, entry.size)?;
        Ok(shared(ReadOnlyStream::new(sub)))
    }
}

impl Device for TrunkDevice {
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
            .ok_or_else(|| VfsError::Precondition(format!("'{path}' is not a trunk entry")))?;
        self.entry_stream(index as usize)
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }
}

pub fn descriptor() -> FileTypeDescriptor {
    FileTypeDescriptor { name: "trunk", priority: 90, validate: validate, open: open }
}

fn validate(stream: &SharedStream) -> Result<bool> {
    Ok(super::peek_magic_u32(stream)? == Some(MAGIC))
}

fn open(stream: SharedStream, path: Path) -> Result<File> {
    let device = TrunkDevice::parse(stream.clone())?;
    Ok(File::new(path, stream, FileKind::Trunk(std::sync::Arc::new(device))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;
    use byteorder::{WriteBytesExt, LE};

    enum Region {
        Primary,
        Secondary,
    }

    struct Builder {
        // (name_hash, size, region, offset relative to the start of that region's own buffer)
        sections: Vec<(u32, u64, Region, u32)>,
        primary: Vec<u8>,
        secondary: Vec<u8>,
    }

    impl Builder {
        fn new() -> Self {
            Builder { sections: Vec::new(), primary: Vec::new(), secondary: Vec::new() }
        }

        fn push_primary(&mut self, name: &str, bytes: &[u8]) -> &mut Self {
            assert_eq!(self.primary.len() % 2, 0, "test data must stay offset-parity-aligned");
            let off = self.primary.len() as u32;
            self.primary.extend_from_slice(bytes);
            let hash = crate::hash::crc32_lowercase(name.as_bytes());
            self.sections.push((hash, bytes.len() as u64, Region::Primary, off));
            self
        }

        fn push_secondary(&mut self, name: &str, bytes: &[u8]) -> &mut Self {
            assert_eq!(self.secondary.len() % 2, 0, "test data must stay offset-parity-aligned");
            let off = self.secondary.len() as u32;
            self.secondary.extend_from_slice(bytes);
            let hash = crate::hash::crc32_lowercase(name.as_bytes());
            self.sections.push((hash, bytes.len() as u64, Region::Secondary, off));
            self
        }

        /// Lays out `header | section table | primary payload | secondary payload`, exactly as
        /// `TrunkDevice::parse` expects: the primary-data region starts right after the fixed
        /// 20-byte header and so encompasses the section table itself, not just the payload bytes
        /// that follow it.
        fn build(&self) -> Vec<u8> {
            let header_len = HEADER_LEN as usize;
            let table_len = 4 + self.sections.len() * SECTION_LEN as usize;
            // primary_pos == header_len, so the region's size is the table plus the payload bytes.
            let primary_size = table_len + self.primary.len();
            let primary_plus_header = header_len + primary_size;

            let mut out = Vec::new();
            out.write_u32::<LE>(MAGIC).unwrap();
            out.write_u32::<LE>(0).unwrap(); // reserved
            out.write_u32::<LE>(primary_plus_header as u32).unwrap();
            out.write_u32::<LE>(self.secondary.len() as u32).unwrap();
            out.write_u32::<LE>(0).unwrap(); // runtime ptr
            out.write_u32::<LE>(self.sections.len() as u32).unwrap();
            for (hash, size, region, relative_offset) in &self.sections {
                let raw_offset = match region {
                    // Absolute file position: header + table + this section's place in `primary`.
                    Region::Primary => (header_len + table_len) as u32 + relative_offset,
                    // Secondary offsets are relative to secondary_pos, tagged with the low bit.
                    Region::Secondary => relative_offset | 1,
                };
                out.write_u32::<LE>(*hash).unwrap();
                out.write_u32::<LE>(*size as u32).unwrap();
                out.write_u32::<LE>(raw_offset).unwrap();
            }
            assert_eq!(out.len(), header_len + table_len);
            out.extend_from_slice(&self.primary);
            out.extend_from_slice(&self.secondary);
            out
        }
    }

    #[test]
    fn reads_from_both_regions() {
        let mut b = Builder::new();
        b.push_primary("header_blob", b"header").push_secondary("vram_blob", b"bulk vram bytes");
        let archive = shared(MemoryStream::from_vec(b.build()));
        let device = TrunkDevice::parse(archive).unwrap();

        let catalog = FileTypeCatalog::with_builtins();
        use crate::stream::Stream;

        let main = Device::open(&device, &Path::new("/header_blob"), &catalog).unwrap().unwrap();
        let mut buf = [0u8; 6];
        main.raw.lock().unwrap().read(&mut buf).unwrap();
        assert_eq!(&buf, b"header");

        let vram = Device::open(&device, &Path::new("/vram_blob"), &catalog).unwrap().unwrap();
        let mut buf = vec![0u8; "bulk vram bytes".len()];
        vram.raw.lock().unwrap().read(&mut buf).unwrap();
        assert_eq!(&buf, b"bulk vram bytes");
    }

    #[test]
    fn rejects_bad_magic() {
        let archive = shared(MemoryStream::from_vec(vec![0u8; 20]));
        assert!(TrunkDevice::parse(archive).is_err());
    }

    #[test]
    fn unpacks_embedded_texture_pack() {
        let mut main_blob = Vec::new();
        main_blob.write_u32::<LE>(0).unwrap(); // runtime scratch, zero on disk
        main_blob.write_u32::<LE>(2).unwrap(); // texture count
        let hash_a = crate::hash::crc32_lowercase(b"diffuse");
        let hash_b = crate::hash::crc32_lowercase(b"normal");
        main_blob.write_u32::<LE>(0).unwrap(); // texture 0 offset
        main_blob.write_u32::<LE>(0).unwrap();
        main_blob.write_u32::<LE>(hash_a).unwrap();
        main_blob.write_u32::<LE>(4).unwrap(); // texture 1 offset
        main_blob.write_u32::<LE>(0).unwrap();
        main_blob.write_u32::<LE>(hash_b).unwrap();

        let vram_blob = b"AAAABBBB".to_vec(); // texture 0: "AAAA", texture 1: "BBBB"

        let mut b = Builder::new();
        b.push_primary("uniquetexturemain", &main_blob);
        b.push_secondary("uniquetexturevram", &vram_blob);
        let archive = shared(MemoryStream::from_vec(b.build()));
        let device = TrunkDevice::parse(archive).unwrap();

        let catalog = FileTypeCatalog::with_builtins();
        use crate::stream::Stream;

        let tex0 =
            Device::open(&device, &Path::new("/textures/diffuse"), &catalog).unwrap().unwrap();
        let mut buf = [0u8; 4];
        tex0.raw.lock().unwrap().read(&mut buf).unwrap();
        assert_eq!(&buf, b"AAAA");

        let tex1 =
            Device::open(&device, &Path::new("/textures/normal"), &catalog).unwrap().unwrap();
        let mut buf = [0u8; 4];
        tex1.raw.lock().unwrap().read(&mut buf).unwrap();
        assert_eq!(&buf, b"BBBB");
    }
}
