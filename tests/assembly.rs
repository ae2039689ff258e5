//! End-to-end: a native directory containing a WAD archive, scanned and mounted as one namespace.

use byteorder::{WriteBytesExt, LE};
use noire_vfs::archive::wad;
use noire_vfs::catalog::FileTypeCatalog;
use noire_vfs::config::Config;
use noire_vfs::device::Device;
use noire_vfs::hash::crc32_lowercase;
use noire_vfs::path::Path;
use noire_vfs::stream::Stream;
use std::io::Write;

fn build_wad(entries: &[(&str, &[u8])]) -> Vec<u8> {
    const HEADER_LEN: usize = 8;
    const ENTRY_LEN: usize = 12;
    let mut offset = HEADER_LEN + entries.len() * ENTRY_LEN;
    let mut table = Vec::new();
    let mut data = Vec::new();
    for (name, bytes) in entries {
        table.write_u32::<LE>(crc32_lowercase(name.as_bytes())).unwrap();
        table.write_u32::<LE>(offset as u32).unwrap();
        table.write_u32::<LE>(bytes.len() as u32).unwrap();
        data.write_all(bytes).unwrap();
        offset += bytes.len();
    }
    let mut path_table = Vec::new();
    for (name, _) in entries {
        path_table.write_u16::<LE>(name.len() as u16).unwrap();
        path_table.extend_from_slice(name.as_bytes());
    }
    let mut out = Vec::new();
    out.write_u32::<LE>(wad::MAGIC).unwrap();
    out.write_u32::<LE>(entries.len() as u32).unwrap();
    out.extend_from_slice(&table);
    out.extend_from_slice(&data);
    out.extend_from_slice(&path_table);
    out
}

#[tokio::test]
async fn wad_under_a_native_root_mounts_and_opens_through_one_namespace() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("plain.txt"), b"not an archive").unwrap();
    std::fs::write(
        dir.path().join("level1.wad"),
        build_wad(&[("maps/level1/heightfield.dat", b"terrain bytes")]),
    )
    .unwrap();

    let config = Config {
        root_path: dir.path().to_path_buf(),
        temp_stream_threshold_bytes: noire_vfs::stream::DEFAULT_THRESHOLD_BYTES,
        enable_auto_scan: true,
    };

    let catalog = std::sync::Arc::new(FileTypeCatalog::with_builtins());
    let (_handle, join) = noire_vfs::assembly::AssemblyHandle::spawn(
        config.root_path.clone(),
        config.enable_auto_scan,
        catalog.clone(),
    );
    let table = join.await.unwrap().unwrap();

    assert!(table.exists(&Path::new("/plain.txt")));
    assert!(table.exists(&Path::new("/level1.wad/maps/level1/heightfield.dat")));

    let stream = table.open_stream(&Path::new("/level1.wad/maps/level1/heightfield.dat")).unwrap();
    let mut buf = vec![0u8; "terrain bytes".len()];
    stream.lock().unwrap().read(&mut buf).unwrap();
    assert_eq!(&buf, b"terrain bytes");

    // The WAD itself, opened directly through the mount table, still resolves to the archive
    // file rather than the directory it also behaves as.
    let wad_file = table.open(&Path::new("/level1.wad"), &catalog).unwrap().unwrap();
    assert_eq!(wad_file.type_name(), "wad");
}
