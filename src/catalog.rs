//! The process-wide registry of recognized archive/file formats.
//!
//! The source keeps one global catalog populated by static constructors scattered across
//! translation units — a classic static-initialization-order hazard. This crate builds the
//! catalog explicitly via [`FileTypeCatalog::with_builtins`], called once at
//! startup, so registration order (and therefore probe order) is a visible, deterministic fact
//! about the program rather than an accident of link order.

use crate::error::Result;
use crate::file::File;
use crate::path::Path;
use crate::stream::SharedStream;

/// One registered format: a validator that peeks at a stream's content, and a factory that turns
/// a validated stream into an opened [`File`].
///
/// Validators are tried in descending `priority` order; the first to return `true` wins. Every
/// catalog built via [`FileTypeCatalog::with_builtins`] carries a priority-0 raw fallback that
/// always matches, so probing always terminates.
pub struct FileTypeDescriptor {
    pub name: &'static str,
    pub priority: i32,
    pub validate: fn(&SharedStream) -> Result<bool>,
    pub open: fn(SharedStream, Path) -> Result<File>,
}

/// An ordered list of [`FileTypeDescriptor`]s, probed highest-priority-first.
pub struct FileTypeCatalog {
    descriptors: Vec<FileTypeDescriptor>,
}

impl FileTypeCatalog {
    /// An empty catalog with no registered formats, not even the raw fallback. Mostly useful for
    /// tests that want to register a single format in isolation.
    pub fn empty() -> Self {
        FileTypeCatalog { descriptors: Vec::new() }
    }

    /// The catalog used throughout the rest of this crate: every built-in archive format, plus
    /// the mandatory raw fallback.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::empty();
        catalog.register(crate::archive::wad::descriptor());
        catalog.register(crate::archive::container::descriptor());
        catalog.register(crate::archive::trunk::descriptor());
        catalog.register(crate::archive::shader_programs::descriptor());
        catalog.register(crate::archive::attribute_tree::descriptor());
        catalog.register(crate::archive::raw::descriptor());
        catalog
    }

    /// Registers `descriptor`, re-sorting so higher-priority formats are probed first. Formats
    /// registered with equal priority keep their relative registration order (a stable sort).
    pub fn register(&mut self, descriptor: FileTypeDescriptor) {
        self.descriptors.push(descriptor);
        self.descriptors.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Probes `stream` against every registered validator in priority order and opens it as the
    /// first match.
    ///
    /// Errors from an individual validator propagate immediately rather than being treated as
    /// "doesn't match" — a validator that can't even peek at the stream signals a real I/O
    /// problem, not an unrecognized format.
    pub fn open(&self, stream: SharedStream, path: Path) -> Result<File> {
        self.open_with_hint(stream, path, None)
    }

    /// Finds a registered descriptor by the name it was registered under.
    pub fn find(&self, name: &str) -> Option<&FileTypeDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Like [`Self::open`], but tries `hint` (a descriptor name a previous probe of this same
    /// path resolved to) before falling back to the full priority-ordered scan.
    ///
    /// This is the fast path [`crate::device::native::NativeDevice`]'s per-path probe cache uses:
    /// most files don't change format between opens, so re-validating every higher-priority
    /// descriptor ahead of the one that already matched is pure waste.
    pub fn open_with_hint(
        &self,
        stream: SharedStream,
        path: Path,
        hint: Option<&str>,
    ) -> Result<File> {
        if let Some(name) = hint {
            if let Some(descriptor) = self.find(name) {
                if (descriptor.validate)(&stream)? {
                    return (descriptor.open)(stream, path);
                }
            }
        }
        for descriptor in &self.descriptors {
            if hint == Some(descriptor.name) {
                continue; // already tried above
            }
            if (descriptor.validate)(&stream)? {
                return (descriptor.open)(stream, path);
            }
        }
        // with_builtins() always registers raw with priority 0 and an always-true validator;
        // reaching here means the catalog was built without it.
        Err(crate::error::VfsError::Unsupported(
            "no file type matched and no raw fallback is registered",
        ))
    }
}
