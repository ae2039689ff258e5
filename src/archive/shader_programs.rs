//! Compiled shader-program blobs.
//!
//! Layout: `{u32 entryCount, u32 rawDataSize, entryCount × u32 nameHash, entryCount ×
//! {u32 vsOffset, u32 pad, u32 psOffset, u32 pad}}`. Both offsets are relative to the byte right
//! after this header (`end_of_header = 8 + 20*entryCount`); at each resolved offset lies a `u32
//! sizeInBytes` followed by that many bytes of DXBC bytecode (which must itself start with the
//! `DXBC` magic, `0x4342_5844`). A program's vertex and pixel halves are not contiguous in the
//! archive, so each is exposed as one logical stream stitched together with
//! [`super::composite_stream::CompositeStream`] — this is also a [`Device`], one path per
//! `nameHash`-addressed program, the way WAD/Container/Trunk expose their own entries.

use crate::catalog::{FileTypeCatalog, FileTypeDescriptor};
use crate::device::{Device, Visitor};
use crate::error::{Result, VfsError};
use crate::file::{File, FileKind};
use crate::path::Path;
use crate::stream::{ReadPrimitives, SharedStream};
use crate::vfs::Vfs;
use std::io::SeekFrom;
use std::sync::Mutex;

use super::composite_stream::CompositeStream;

pub const DXBC_MAGIC: u32 = 0x4342_5844;

const HEADER_PREFIX_LEN: u64 = 8;
const NAME_HASH_LEN: u64 = 4;
const OFFSET_RECORD_LEN: u64 = 16;

struct ProgramEntry {
    vs_content_offset: u64,
    vs_size: u64,
    ps_content_offset: u64,
    ps_size: u64,
}

/// A parsed shader-programs blob, addressable as its own [`Device`] namespace keyed by name hash.
pub struct ShaderProgramsDevice {
    archive: SharedStream,
    entries: Vec<ProgramEntry>,
    tree: Mutex<Vfs>,
}

/// Reads the `u32 sizeInBytes` prefix at `offset`, checks the DXBC magic right after it, and
/// returns `(content_offset, content_size)` for the bytecode that follows the size prefix.
fn read_dxbc_chunk(
    guard: &mut dyn crate::stream::Stream,
    offset: u64,
    archive_len: u64,
) -> Result<(u64, u64)> {
    if offset.saturating_add(4) > archive_len {
        return Err(VfsError::Corrupt("shader_programs: chunk offset exceeds archive".into()));
    }
    guard.seek(SeekFrom::Start(offset))?;
    let size = guard.read_u32_le()? as u64;
    let content_offset = offset + 4;
    if content_offset.saturating_add(size) > archive_len {
        return Err(VfsError::Corrupt("shader_programs: chunk exceeds archive length".into()));
    }
    if size < 4 {
        return Err(VfsError::FormatMismatch("shader_programs: chunk too small for DXBC magic"));
    }
    let mut magic_buf = [0u8; 4];
    guard.seek(SeekFrom::Start(content_offset))?;
    guard.read_exact_buf(&mut magic_buf)?;
    if u32::from_le_bytes(magic_buf) != DXBC_MAGIC {
        return Err(VfsError::FormatMismatch("shader_programs: missing DXBC magic"));
    }
    Ok((content_offset, size))
}

impl ShaderProgramsDevice {
    fn parse(archive: SharedStream) -> Result<Self> {
        let archive_len = super::stream_len(&archive)?;
        let mut guard = archive.lock().expect("stream mutex poisoned");
        if archive_len < HEADER_PREFIX_LEN {
            return Err(VfsError::FormatMismatch("shader_programs: too short for header"));
        }
        guard.seek(SeekFrom::Start(0))?;
        let entry_count = guard.read_u32_le()? as u64;
        let _raw_data_size = guard.read_u32_le()?;

        let name_table_start = HEADER_PREFIX_LEN;
        let offset_table_start = name_table_start
            .checked_add(entry_count.saturating_mul(NAME_HASH_LEN))
            .ok_or_else(|| VfsError::Corrupt("shader_programs: entry count overflow".into()))?;
        let end_of_header = offset_table_start
            .checked_add(entry_count.saturating_mul(OFFSET_RECORD_LEN))
            .ok_or_else(|| VfsError::Corrupt("shader_programs: entry count overflow".into()))?;
        if end_of_header > archive_len {
            return Err(VfsError::FormatMismatch("shader_programs: header exceeds archive"));
        }
        if entry_count == 0 {
            return Err(VfsError::FormatMismatch("shader_programs: no entries"));
        }

        let mut name_hashes = Vec::with_capacity(entry_count as usize);
        for i in 0..entry_count {
            guard.seek(SeekFrom::Start(name_table_start + i * NAME_HASH_LEN))?;
            name_hashes.push(guard.read_u32_le()?);
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut tree = Vfs::new();
        for i in 0..entry_count {
            guard.seek(SeekFrom::Start(offset_table_start + i * OFFSET_RECORD_LEN))?;
            let vs_offset = guard.read_u32_le()? as u64;
            let _pad0 = guard.read_u32_le()?;
            let ps_offset = guard.read_u32_le()? as u64;
            let _pad1 = guard.read_u32_le()?;

            let (vs_content_offset, vs_size) =
                read_dxbc_chunk(&mut *guard, end_of_header + vs_offset, archive_len)?;
            let (ps_content_offset, ps_size) =
                read_dxbc_chunk(&mut *guard, end_of_header + ps_offset, archive_len)?;

            let label = crate::hash_oracle::lowercase_folded().try_get_string(name_hashes[i as usize]);
            let path = Path::new(format!("/{label}"));
            tree.register_existing_file(&path, entries.len() as u64);
            entries.push(ProgramEntry { vs_content_offset, vs_size, ps_content_offset, ps_size });
        }
        drop(guard);

        Ok(ShaderProgramsDevice { archive, entries, tree: Mutex::new(tree) })
    }

    fn entry_stream(&self, index: usize) -> Result<SharedStream> {
        let entry = &self.entries[index];
        let composite = CompositeStream::new(vec![
            (self.archive.clone(), entry.vs_content_offset, entry.vs_size),
            (self.archive.clone(), entry.ps_content_offset, entry.ps_size),
        ])?;
        Ok(crate::stream::shared(composite))
    }
}

impl Device for ShaderProgramsDevice {
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
            .ok_or_else(|| VfsError::Precondition(format!("'{path}' is not a shader program")))?;
        self.entry_stream(index as usize)
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }
}

pub fn descriptor() -> FileTypeDescriptor {
    FileTypeDescriptor { name: "shader_programs", priority: 10, validate: validate, open: open }
}

fn validate(stream: &SharedStream) -> Result<bool> {
    match ShaderProgramsDevice::parse(stream.clone()) {
        Ok(_) => Ok(true),
        Err(VfsError::FormatMismatch(_)) | Err(VfsError::Corrupt(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

fn open(stream: SharedStream, path: Path) -> Result<File> {
    let device = ShaderProgramsDevice::parse(stream.clone())?;
    Ok(File::new(path, stream, FileKind::ShaderPrograms(std::sync::Arc::new(device))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{shared, MemoryStream, Stream};
    use byteorder::{WriteBytesExt, LE};

    fn dxbc_chunk(bytecode: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut content = Vec::new();
        content.write_u32::<LE>(DXBC_MAGIC).unwrap();
        content.extend_from_slice(bytecode);
        out.write_u32::<LE>(content.len() as u32).unwrap();
        out.extend_from_slice(&content);
        out
    }

    fn build(programs: &[(u32, &[u8], &[u8])]) -> Vec<u8> {
        let entry_count = programs.len() as u32;
        let mut names = Vec::new();
        for (hash, _, _) in programs {
            names.write_u32::<LE>(*hash).unwrap();
        }

        let mut data = Vec::new();
        let mut offset_records = Vec::new();
        for (_, vs, ps) in programs {
            let vs_off = data.len() as u32;
            data.extend_from_slice(&dxbc_chunk(vs));
            let ps_off = data.len() as u32;
            data.extend_from_slice(&dxbc_chunk(ps));
            offset_records.write_u32::<LE>(vs_off).unwrap();
            offset_records.write_u32::<LE>(0).unwrap();
            offset_records.write_u32::<LE>(ps_off).unwrap();
            offset_records.write_u32::<LE>(0).unwrap();
        }

        let mut out = Vec::new();
        out.write_u32::<LE>(entry_count).unwrap();
        out.write_u32::<LE>(data.len() as u32).unwrap();
        out.extend_from_slice(&names);
        out.extend_from_slice(&offset_records);
        out.extend_from_slice(&data);
        out
    }

    #[test]
    fn stitches_vertex_and_pixel_halves() {
        let hash = crate::hash::crc32_lowercase(b"basic_lit");
        let bytes = build(&[(hash, b"VERTEXCODE", b"PIXELCODE!")]);
        let archive = shared(MemoryStream::from_vec(bytes));
        let device = ShaderProgramsDevice::parse(archive).unwrap();

        let path = Path::new("/basic_lit");
        assert!(Device::exists(&device, &path));
        let catalog = FileTypeCatalog::with_builtins();
        let file = Device::open(&device, &path, &catalog).unwrap().unwrap();
        let mut buf = vec![0u8; "VERTEXCODEPIXELCODE!".len()];
        file.raw.lock().unwrap().read(&mut buf).unwrap();
        assert_eq!(&buf, b"VERTEXCODEPIXELCODE!");
    }

    #[test]
    fn rejects_missing_dxbc_magic() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LE>(1).unwrap();
        bytes.write_u32::<LE>(0).unwrap();
        bytes.write_u32::<LE>(0xDEAD_BEEF).unwrap(); // name hash
        bytes.write_u32::<LE>(0).unwrap(); // vs offset
        bytes.write_u32::<LE>(0).unwrap();
        bytes.write_u32::<LE>(0).unwrap(); // ps offset
        bytes.write_u32::<LE>(0).unwrap();
        bytes.extend_from_slice(&[0u8; 16]); // garbage, not a DXBC chunk
        let archive = shared(MemoryStream::from_vec(bytes));
        assert!(!validate(&archive).unwrap());
    }

    #[test]
    fn rejects_empty_blob() {
        let archive = shared(MemoryStream::from_vec(vec![0u8; 4]));
        assert!(!validate(&archive).unwrap());
    }
}
