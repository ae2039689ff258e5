//! The open-file handle returned by [`crate::device::Device::open`].
//!
//! The source gives every archive format its own `File`-derived class and lets callers downcast
//! (or use built-in RTTI) to reach format-specific operations — most importantly, many archive
//! formats (WAD, Container, Trunk) are *also* devices: you can `Open` a path that is itself a
//! directory full of other files. Rust has no implicit downcasting, so [`File`] is a concrete
//! struct wrapping a [`FileKind`] enum, and format-specific behavior comes from matching on it;
//! the device capability is recovered through [`File::as_device`].

use crate::device::Device;
use crate::path::Path;
use crate::stream::SharedStream;
use std::sync::Arc;

/// What kind of file this handle represents, and the format-specific payload each kind carries.
pub enum FileKind {
    /// An uninterpreted byte blob (the priority-0 fallback registered by every catalog).
    Raw,
    /// A WAD archive; also a [`Device`] over its own entries.
    Wad(Arc<crate::archive::wad::WadDevice>),
    /// A Container archive; also a [`Device`] over its own entries.
    Container(Arc<crate::archive::container::ContainerDevice>),
    /// A Trunk archive; also a [`Device`] over its own entries.
    Trunk(Arc<crate::archive::trunk::TrunkDevice>),
    /// A compiled shader-programs blob; also a [`Device`] over its named programs.
    ShaderPrograms(Arc<crate::archive::shader_programs::ShaderProgramsDevice>),
    /// A parsed attribute tree (leaf format, not a device).
    AttributeTree(Box<crate::archive::attribute_tree::AttributeTree>),
}

/// An open file: its path, its underlying byte stream, and whatever the catalog's validator
/// recognized it as.
pub struct File {
    pub path: Path,
    pub raw: SharedStream,
    pub kind: FileKind,
}

impl File {
    pub fn new(path: Path, raw: SharedStream, kind: FileKind) -> Self {
        File { path, raw, kind }
    }

    /// Recovers the `Device` capability when this file's format is itself a container, mirroring
    /// the source's `File`-and-`Device` multiple inheritance.
    pub fn as_device(&self) -> Option<Arc<dyn Device>> {
        match &self.kind {
            FileKind::Wad(d) => Some(d.clone() as Arc<dyn Device>),
            FileKind::Container(d) => Some(d.clone() as Arc<dyn Device>),
            FileKind::Trunk(d) => Some(d.clone() as Arc<dyn Device>),
            FileKind::ShaderPrograms(d) => Some(d.clone() as Arc<dyn Device>),
            FileKind::Raw | FileKind::AttributeTree(_) => None,
        }
    }

    /// The name of the catalog descriptor that recognized this file, used by
    /// [`crate::device::native::NativeDevice`]'s per-path probe cache to skip re-trying every
    /// validator on repeat opens of the same path.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            FileKind::Raw => "raw",
            FileKind::Wad(_) => "wad",
            FileKind::Container(_) => "container",
            FileKind::Trunk(_) => "trunk",
            FileKind::ShaderPrograms(_) => "shader_programs",
            FileKind::AttributeTree(_) => "attribute_tree",
        }
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File").field("path", &self.path).finish_non_exhaustive()
    }
}
