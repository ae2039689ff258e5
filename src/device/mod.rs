//! The abstract filesystem backend and its two core implementations: a device anchored
//! on the host filesystem ([`native`]) and a router that stitches several devices into one
//! namespace by mount point ([`mount_table`]).
//!
//! Archive formats (`crate::archive::*`) are devices too — each exposes its entries as paths
//! under its own namespace, the same way a [`native::NativeDevice`] exposes host files.

mod mount_table;
mod native;

pub use mount_table::MountTable;
pub use native::NativeDevice;
pub(crate) use mount_table::rebase;

use crate::catalog::FileTypeCatalog;
use crate::error::Result;
use crate::file::File;
use crate::path::Path;
use crate::stream::SharedStream;

/// What kind of entry a [`VisitEntry`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One entry emitted by [`Device::visit`].
#[derive(Debug, Clone)]
pub struct VisitEntry {
    pub path: Path,
    pub kind: EntryKind,
}

/// Whether a [`Visitor`] wants to keep receiving entries.
///
/// The source's `Visit` takes two separate callbacks (one for directories, one for files) and
/// lets them short-circuit the walk by throwing. Since this crate's visitors are plain closures
/// rather than exception-capable callables, the two callbacks collapse into one callback over a
/// discriminated [`VisitEntry`] that returns this enum to signal early exit — checked between
/// entries, never mid-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl {
    Continue,
    Stop,
}

pub type Visitor<'a> = dyn FnMut(VisitEntry) -> VisitControl + 'a;

/// The abstract filesystem node providing `{Exists, Open, Create, Delete, Visit, OpenStream,
/// Commit}` over a [`Path`] namespace.
pub trait Device: Send + Sync {
    /// Never fails; a resolution miss is simply `false`.
    fn exists(&self, path: &Path) -> bool;

    /// `Ok(None)` on logical absence; `Err` only on a fatal mid-probe I/O failure.
    fn open(&self, path: &Path, catalog: &FileTypeCatalog) -> Result<Option<File>>;

    /// `Ok(None)` when creation is unimplemented for this device.
    fn create(&self, path: &Path, type_id: u32) -> Result<Option<File>>;

    /// Returns whether the file existed (and was deleted).
    fn delete(&self, path: &Path) -> bool;

    fn visit(&self, path: &Path, recursive: bool, visitor: &mut Visitor<'_>) -> Result<()>;

    /// Always a read-only stream, regardless of whether the device supports writes.
    fn open_stream(&self, path: &Path) -> Result<SharedStream>;

    /// Persists pending writes transitively. A no-op for devices with nothing to flush.
    fn commit(&self) -> Result<()>;
}
