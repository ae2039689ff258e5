//! Routes paths to the longest matching mount.

use crate::catalog::FileTypeCatalog;
use crate::device::{Device, VisitControl, VisitEntry, Visitor};
use crate::error::{Result, VfsError};
use crate::file::File;
use crate::path::Path;
use crate::stream::SharedStream;
use std::sync::Arc;

struct Mount {
    path: Path,
    device: Arc<dyn Device>,
}

/// An ordered list of `{mountPath, device}` pairs. Longer mount paths are tried first so that a
/// nested mount (e.g. an archive mounted inside another archive's directory) wins over its
/// parent.
#[derive(Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new() -> Self {
        MountTable { mounts: Vec::new() }
    }

    /// How many devices are currently mounted, including the native root.
    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    /// Mounts `device` at `path`. Rejects an exact-duplicate mount path.
    pub fn mount(&mut self, path: Path, device: Arc<dyn Device>) -> Result<()> {
        if self.mounts.iter().any(|m| m.path == path) {
            return Err(VfsError::Precondition(format!("'{path}' is already mounted")));
        }
        self.mounts.push(Mount { path, device });
        self.mounts.sort_by(|a, b| b.path.as_str().len().cmp(&a.path.as_str().len()));
        Ok(())
    }

    /// Finds the device whose mount path is the longest prefix of `path`, along with the
    /// relative path to hand to it and the mount point itself.
    fn resolve(&self, path: &Path) -> Option<(&Arc<dyn Device>, Path, &Path)> {
        for m in &self.mounts {
            if path.as_str().starts_with(m.path.as_str()) {
                // preserve the leading '/': strip (mountPath.len() - 1) characters.
                let strip = m.path.as_str().len().saturating_sub(1);
                let relative = Path::new(format!("/{}", &path.as_str()[strip.min(path.as_str().len())..].trim_start_matches('/')));
                let relative = if path.as_str().ends_with('/') || relative.as_str() == "/" {
                    relative.as_directory()
                } else {
                    relative
                };
                return Some((&m.device, relative, &m.path));
            }
        }
        None
    }
}

impl Device for MountTable {
    fn exists(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Some((device, relative, _)) => device.exists(&relative),
            None => false,
        }
    }

    fn open(&self, path: &Path, catalog: &FileTypeCatalog) -> Result<Option<File>> {
        match self.resolve(path) {
            Some((device, relative, _)) => device.open(&relative, catalog),
            None => Ok(None),
        }
    }

    fn create(&self, path: &Path, type_id: u32) -> Result<Option<File>> {
        match self.resolve(path) {
            Some((device, relative, _)) => device.create(&relative, type_id),
            None => Ok(None),
        }
    }

    fn delete(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Some((device, relative, _)) => device.delete(&relative),
            None => false,
        }
    }

    fn visit(&self, path: &Path, recursive: bool, visitor: &mut Visitor<'_>) -> Result<()> {
        let Some((device, relative, mount_path)) = self.resolve(path) else {
            return Ok(());
        };
        let mount_path = mount_path.clone();
        device.visit(&relative, recursive, &mut |entry: VisitEntry| {
            let rebased = rebase(&mount_path, &entry.path);
            visitor(VisitEntry { path: rebased, kind: entry.kind })
        })
    }

    fn open_stream(&self, path: &Path) -> Result<SharedStream> {
        match self.resolve(path) {
            Some((device, relative, _)) => device.open_stream(&relative),
            None => Err(VfsError::Precondition(format!("'{path}' is not mounted"))),
        }
    }

    fn commit(&self) -> Result<()> {
        // Iteration order is mount-registration order, not longest-prefix order.
        for m in self.mounts.iter() {
            m.device.commit()?;
        }
        Ok(())
    }
}

/// Prepends `mount_path` onto a child-device-relative path, the way `MultiDevice::Visit` rebases
/// emitted child paths in the original source.
pub(crate) fn rebase(mount_path: &Path, child_path: &Path) -> Path {
    let child_relative = child_path.as_str().trim_start_matches('/');
    let mut base = mount_path.as_str().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    base.push_str(child_relative);
    Path::new(base)
}
