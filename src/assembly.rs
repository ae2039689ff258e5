//! Filesystem assembly: the recursive scan that turns a bare native directory into a complete
//! mounted namespace.
//!
//! On startup a client mounts a native device at `/`, then — if auto-scanning is enabled — walks
//! every regular file in the tree, probes it against the catalog, and mounts any match as its own
//! device at its own path. Freshly mounted devices are queued for the same treatment, so an
//! archive nested inside another archive is discovered without extra plumbing. The scan itself is
//! synchronous and blocking; [`AssemblyHandle::spawn`] is what keeps it off the caller's task by
//! running it on a `tokio` blocking-pool thread and signaling start/completion through a
//! [`Notify`] pair, matching the "no blocking call completes synchronously on the scan thread"
//! contract.

use crate::catalog::FileTypeCatalog;
use crate::device::{rebase, Device, EntryKind, MountTable, NativeDevice, VisitControl};
use crate::error::Result;
use crate::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Builds a [`MountTable`] rooted at `root`, auto-mounting nested archives when `enable_auto_scan`
/// is set. This is the synchronous core [`AssemblyHandle::spawn`] dispatches to a worker thread;
/// it's exposed directly so callers and tests that don't need the Tokio wrapper can drive it
/// in-place.
pub fn scan(root: PathBuf, enable_auto_scan: bool, catalog: &FileTypeCatalog) -> Result<MountTable> {
    let mut table = MountTable::new();
    let native: Arc<dyn Device> = Arc::new(NativeDevice::new(root)?);
    table.mount(Path::new("/"), native.clone())?;

    if enable_auto_scan {
        let mut pending: Vec<(Path, Arc<dyn Device>)> = vec![(Path::new("/"), native)];
        while let Some((mount_path, device)) = pending.pop() {
            for archive in probe_device(&*device, catalog)? {
                // Mount paths are always directory-typed: an archive at "/x.wad" owns a
                // namespace addressed as "/x.wad/<entry>", not "/x.wad<entry>".
                let mount_point = rebase(&mount_path, &archive.path).as_directory();
                info!(path = %mount_point, kind = archive.kind, "auto-mounting archive");
                table.mount(mount_point.clone(), archive.device.clone())?;
                pending.push((mount_point, archive.device));
            }
        }
    }

    Ok(table)
}

struct DiscoveredArchive {
    path: Path,
    kind: &'static str,
    device: Arc<dyn Device>,
}

/// Walks every file under `device`'s own root and opens each one through the catalog, collecting
/// those that turn out to expose a [`Device`] capability of their own.
fn probe_device(device: &dyn Device, catalog: &FileTypeCatalog) -> Result<Vec<DiscoveredArchive>> {
    let mut file_paths = Vec::new();
    device.visit(&Path::new("/"), true, &mut |entry| {
        if entry.kind == EntryKind::File {
            file_paths.push(entry.path);
        }
        VisitControl::Continue
    })?;

    let mut discovered = Vec::new();
    for path in file_paths {
        let file = match device.open(&path, catalog) {
            Ok(Some(file)) => file,
            Ok(None) => continue,
            Err(e) => {
                debug!(path = %path, error = %e, "skipping file during assembly scan");
                continue;
            }
        };
        if let Some(archive_device) = file.as_device() {
            discovered.push(DiscoveredArchive {
                path,
                kind: file.type_name(),
                device: archive_device,
            });
        }
    }
    Ok(discovered)
}

/// A pair of start/completion signals for an in-flight [`scan`] dispatched by
/// [`AssemblyHandle::spawn`].
pub struct AssemblyHandle {
    pub started: Arc<Notify>,
    pub completed: Arc<Notify>,
}

impl AssemblyHandle {
    /// Dispatches [`scan`] on a `spawn_blocking` worker thread. The returned `JoinHandle` resolves
    /// to the assembled table; `started`/`completed` let a caller (e.g. a GUI) observe scan
    /// progress without polling or blocking its own task.
    pub fn spawn(
        root: PathBuf,
        enable_auto_scan: bool,
        catalog: Arc<FileTypeCatalog>,
    ) -> (Self, tokio::task::JoinHandle<Result<MountTable>>) {
        let started = Arc::new(Notify::new());
        let completed = Arc::new(Notify::new());
        let started_signal = started.clone();
        let completed_signal = completed.clone();

        let join = tokio::task::spawn_blocking(move || {
            let begin = Instant::now();
            started_signal.notify_one();
            info!(root = %root.display(), "filesystem assembly scan starting");

            let result = scan(root, enable_auto_scan, &catalog);

            match &result {
                Ok(table) => info!(
                    elapsed = ?begin.elapsed(),
                    mounts = table.mount_count(),
                    "filesystem assembly scan complete"
                ),
                Err(e) => warn!(error = %e, "filesystem assembly scan failed"),
            }
            completed_signal.notify_one();
            result
        });

        (AssemblyHandle { started, completed }, join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Stream;
    use byteorder::{WriteBytesExt, LE};

    fn wad_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        const HEADER_LEN: usize = 8;
        const ENTRY_LEN: usize = 12;
        let table_len = entries.len() * ENTRY_LEN;
        let mut offset = HEADER_LEN + table_len;
        let mut table = Vec::new();
        let mut data = Vec::new();
        for (name, bytes) in entries {
            let hash = crate::hash::crc32_lowercase(name.as_bytes());
            table.write_u32::<LE>(hash).unwrap();
            table.write_u32::<LE>(offset as u32).unwrap();
            table.write_u32::<LE>(bytes.len() as u32).unwrap();
            data.extend_from_slice(bytes);
            offset += bytes.len();
        }
        let mut path_table = Vec::new();
        for (name, _) in entries {
            path_table.write_u16::<LE>(name.len() as u16).unwrap();
            path_table.extend_from_slice(name.as_bytes());
        }
        let mut out = Vec::new();
        out.write_u32::<LE>(crate::archive::wad::MAGIC).unwrap();
        out.write_u32::<LE>(entries.len() as u32).unwrap();
        out.extend_from_slice(&table);
        out.extend_from_slice(&data);
        out.extend_from_slice(&path_table);
        out
    }

    #[test]
    fn scan_mounts_plain_files_as_raw_and_archives_as_devices() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("assets.wad"), wad_bytes(&[("tex/a.dds", b"ddsdata")]))
            .unwrap();

        let catalog = FileTypeCatalog::with_builtins();
        let table = scan(dir.path().to_path_buf(), true, &catalog).unwrap();

        assert!(table.exists(&Path::new("/readme.txt")));
        assert!(table.exists(&Path::new("/assets.wad/tex/a.dds")));

        let file = table.open(&Path::new("/assets.wad/tex/a.dds"), &catalog).unwrap().unwrap();
        let mut buf = vec![0u8; 7];
        file.raw.lock().unwrap().read(&mut buf).unwrap();
        assert_eq!(&buf, b"ddsdata");
    }

    #[test]
    fn disabled_auto_scan_leaves_archives_unmounted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("assets.wad"), wad_bytes(&[("a.dat", b"x")])).unwrap();

        let catalog = FileTypeCatalog::with_builtins();
        let table = scan(dir.path().to_path_buf(), false, &catalog).unwrap();

        assert!(table.exists(&Path::new("/assets.wad")));
        assert!(!table.exists(&Path::new("/assets.wad/a.dat")));
    }

    #[tokio::test]
    async fn spawned_scan_signals_start_and_completion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();

        let catalog = Arc::new(FileTypeCatalog::with_builtins());
        let (handle, join) = AssemblyHandle::spawn(dir.path().to_path_buf(), true, catalog);

        handle.started.notified().await;
        let table = join.await.unwrap().unwrap();
        handle.completed.notified().await;

        assert!(table.exists(&Path::new("/a.txt")));
    }
}
