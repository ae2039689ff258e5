//! The priority-0 fallback format: an uninterpreted byte blob.
//!
//! Every [`crate::catalog::FileTypeCatalog::with_builtins`] registers this last, with a validator
//! that always returns `true`, so probing a stream against the catalog always terminates.

use crate::catalog::FileTypeDescriptor;
use crate::error::Result;
use crate::file::{File, FileKind};
use crate::path::Path;
use crate::stream::SharedStream;

pub fn descriptor() -> FileTypeDescriptor {
    FileTypeDescriptor { name: "raw", priority: 0, validate: validate, open: open }
}

fn validate(_stream: &SharedStream) -> Result<bool> {
    Ok(true)
}

fn open(stream: SharedStream, path: Path) -> Result<File> {
    Ok(File::new(path, stream, FileKind::Raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{shared, MemoryStream};

    #[test]
    fn always_validates() {
        let stream = shared(MemoryStream::from_vec(vec![]));
        assert!(validate(&stream).unwrap());
    }

    #[test]
    fn opens_as_raw() {
        let stream = shared(MemoryStream::from_vec(b"data".to_vec()));
        let file = open(stream, Path::new("/x.bin")).unwrap();
        assert!(matches!(file.kind, FileKind::Raw));
    }
}
