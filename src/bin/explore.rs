//! `noire-explore` — mounts a directory tree (and every archive nested inside it) and lists the
//! resulting namespace.

use clap::Parser;
use noire_vfs::assembly::AssemblyHandle;
use noire_vfs::catalog::FileTypeCatalog;
use noire_vfs::config::Config;
use noire_vfs::device::{Device, EntryKind, VisitControl};
use noire_vfs::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

/// List every file in a directory tree, auto-mounting any recognized archive along the way.
#[derive(Parser, Debug)]
struct Args {
    /// Host directory to mount at `/`.
    root: PathBuf,

    /// TOML config file overriding the defaults (root_path from here takes precedence over
    /// `root` when both are given).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable auto-mounting of nested WAD/Container/Trunk/ShaderPrograms archives.
    #[arg(long)]
    no_auto_scan: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Config::from_toml_str(&text)?
        }
        None => Config {
            root_path: args.root.clone(),
            temp_stream_threshold_bytes: noire_vfs::stream::DEFAULT_THRESHOLD_BYTES,
            enable_auto_scan: !args.no_auto_scan,
        },
    };

    let catalog = Arc::new(FileTypeCatalog::with_builtins());
    let (handle, join) =
        AssemblyHandle::spawn(config.root_path.clone(), config.enable_auto_scan, catalog);

    handle.started.notified().await;
    println!("scanning {}...", config.root_path.display());
    let table = join.await.expect("assembly scan task panicked")?;
    handle.completed.notified().await;

    let mut count = 0usize;
    table.visit(&Path::new("/"), true, &mut |entry| {
        let marker = if entry.kind == EntryKind::Directory { "/" } else { "" };
        println!("{}{marker}", entry.path);
        if entry.kind == EntryKind::File {
            count += 1;
        }
        VisitControl::Continue
    })?;
    println!("{count} files");

    Ok(())
}
