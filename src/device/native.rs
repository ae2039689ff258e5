//! Maps a device namespace onto a host directory.

use crate::catalog::FileTypeCatalog;
use crate::device::{Device, EntryKind, VisitControl, VisitEntry, Visitor};
use crate::error::{Result, VfsError};
use crate::file::File;
use crate::path::Path;
use crate::stream::{shared, NativeFileStream, ReadOnlyStream, SharedStream};
use moka::sync::Cache;
use std::path::PathBuf;

/// A device backed by one absolute host directory.
///
/// Paths inside the device are joined onto that root with the leading `/` stripped.
///
/// Every `open` probes the path against the catalog's validators in priority order, which for a
/// directory tree with thousands of raw assets means re-reading a magic number from disk on every
/// single open just to confirm, again, that the file is still raw. `probe_cache` remembers which
/// descriptor matched a path last time and hands that name to [`FileTypeCatalog::open_with_hint`]
/// as a first guess, mirroring the source's `LocalDevice::mCachedFiles`.
pub struct NativeDevice {
    root: PathBuf,
    probe_cache: Cache<String, &'static str>,
}

impl NativeDevice {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(VfsError::Precondition(format!(
                "native device root '{}' is not a directory",
                root.display()
            )));
        }
        Ok(NativeDevice {
            root: root.canonicalize().unwrap_or(root),
            probe_cache: Cache::new(10_000),
        })
    }

    pub fn root_path(&self) -> &std::path::Path {
        &self.root
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        let relative = path.as_str().strip_prefix('/').unwrap_or(path.as_str());
        self.root.join(relative)
    }

    fn visit_dir(
        &self,
        dir: &std::path::Path,
        recursive: bool,
        visitor: &mut Visitor<'_>,
    ) -> Result<VisitControl> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let metadata = entry.metadata()?;
            let host_path = entry.path();
            let relative = host_path.strip_prefix(&self.root).map_err(|_| {
                VfsError::Precondition("visited entry escaped device root".into())
            })?;
            let mut vfs_path = Path::new(format!("/{}", relative.to_string_lossy())).as_directory();
            if !metadata.is_dir() {
                vfs_path = vfs_path.as_file();
            }

            let kind = if metadata.is_dir() { EntryKind::Directory } else { EntryKind::File };
            if visitor(VisitEntry { path: vfs_path, kind }) == VisitControl::Stop {
                return Ok(VisitControl::Stop);
            }

            if metadata.is_dir() && recursive {
                if self.visit_dir(&host_path, recursive, visitor)? == VisitControl::Stop {
                    return Ok(VisitControl::Stop);
                }
            }
        }
        Ok(VisitControl::Continue)
    }
}

impl Device for NativeDevice {
    fn exists(&self, path: &Path) -> bool {
        self.full_path(path).exists()
    }

    fn open(&self, path: &Path, catalog: &FileTypeCatalog) -> Result<Option<File>> {
        if !path.is_file() || !path.is_absolute() {
            return Err(VfsError::Precondition(format!(
                "NativeDevice::open requires an absolute file path, got '{path}'"
            )));
        }
        let full = self.full_path(path);
        if !full.exists() {
            return Ok(None);
        }
        let stream = shared(NativeFileStream::open_read_write(&full)?);
        let hint = self.probe_cache.get(path.as_str());
        let file = catalog.open_with_hint(stream, path.clone(), hint.as_deref())?;
        self.probe_cache.insert(path.as_str().to_string(), file.type_name());
        Ok(Some(file))
    }

    fn create(&self, path: &Path, _type_id: u32) -> Result<Option<File>> {
        if !path.is_file() || !path.is_absolute() {
            return Err(VfsError::Precondition(format!(
                "NativeDevice::create requires an absolute file path, got '{path}'"
            )));
        }
        Ok(None)
    }

    fn delete(&self, path: &Path) -> bool {
        std::fs::remove_file(self.full_path(path)).is_ok()
    }

    fn visit(&self, path: &Path, recursive: bool, visitor: &mut Visitor<'_>) -> Result<()> {
        if !path.is_directory() || !path.is_absolute() {
            return Err(VfsError::Precondition(format!(
                "NativeDevice::visit requires an absolute directory path, got '{path}'"
            )));
        }
        self.visit_dir(&self.full_path(path), recursive, visitor)?;
        Ok(())
    }

    fn open_stream(&self, path: &Path) -> Result<SharedStream> {
        if !path.is_file() || !path.is_absolute() {
            return Err(VfsError::Precondition(format!(
                "NativeDevice::open_stream requires an absolute file path, got '{path}'"
            )));
        }
        let inner = NativeFileStream::open_read_only(self.full_path(path))?;
        Ok(shared(ReadOnlyStream::new(inner)))
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }
}
