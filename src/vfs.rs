//! Per-device namespace tree.
//!
//! Every container-like device (native folders aside) is backed by one of these: a tree of
//! directory and file nodes, addressable by path, with each file node carrying an opaque `Info`
//! payload the hosting device interprets (an entry index, a name hash, whatever makes sense for
//! that format).
//!
//! The source represents this tree with `unique_ptr`-owned nodes and raw parent pointers. This
//! crate uses an arena instead: nodes live in a `Vec`, parent/child links are indices, which
//! makes the structure trivially `Send`/`Sync` and removes the aliasing raw pointers would
//! otherwise require.

use crate::device::{EntryKind, VisitControl, VisitEntry, Visitor};
use crate::path::Path;
use std::collections::HashMap;

type NodeIndex = usize;

enum NodeKind {
    Directory { children: Vec<NodeIndex> },
    File { info: u64 },
}

struct Node {
    name: String,
    parent: Option<NodeIndex>,
    kind: NodeKind,
}

/// A directory/file tree keyed by absolute path, plus a hash index for O(1) lookup.
pub struct Vfs {
    nodes: Vec<Node>,
    root: NodeIndex,
    by_path: HashMap<u64, NodeIndex>,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs {
    pub fn new() -> Self {
        let root = Node { name: String::new(), parent: None, kind: NodeKind::Directory { children: Vec::new() } };
        let mut by_path = HashMap::new();
        by_path.insert(path_key(&Path::new("/")), 0);
        Vfs { nodes: vec![root], root: 0, by_path }
    }

    /// Registers a file at `path` with the given `info`, auto-creating any missing parent
    /// directories.
    pub fn register_existing_file(&mut self, path: &Path, info: u64) {
        let parent = self.get_or_create_directory(&path.parent());
        let name = path.name().to_string();

        if let NodeKind::Directory { children } = &self.nodes[parent].kind {
            if let Some(&existing) = children.iter().find(|&&c| self.nodes[c].name == name) {
                if let NodeKind::File { info: slot } = &mut self.nodes[existing].kind {
                    *slot = info;
                    return;
                }
            }
        }

        let index = self.nodes.len();
        self.nodes.push(Node { name, parent: Some(parent), kind: NodeKind::File { info } });
        if let NodeKind::Directory { children } = &mut self.nodes[parent].kind {
            children.push(index);
        }
        self.by_path.insert(path_key(path), index);
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    /// Deletes the file at `path`. Directories cannot be deleted. Returns whether it existed.
    pub fn delete(&mut self, path: &Path) -> bool {
        let Some(index) = self.find(path) else { return false };
        if !matches!(self.nodes[index].kind, NodeKind::File { .. }) {
            return false;
        }
        let Some(parent) = self.nodes[index].parent else { return false };
        if let NodeKind::Directory { children } = &mut self.nodes[parent].kind {
            children.retain(|&c| c != index);
        }
        self.by_path.remove(&path_key(path));
        true
    }

    pub fn get_file_info(&self, path: &Path) -> Option<u64> {
        let index = self.find(path)?;
        match self.nodes[index].kind {
            NodeKind::File { info } => Some(info),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Visits every entry under `dir`, in registration order, recursing into subdirectories
    /// iff `recursive`.
    pub fn visit(&self, dir: &Path, recursive: bool, visitor: &mut Visitor<'_>) -> crate::error::Result<()> {
        let Some(index) = self.find(dir) else { return Ok(()) };
        self.visit_node(index, dir, recursive, visitor);
        Ok(())
    }

    fn visit_node(&self, index: NodeIndex, prefix: &Path, recursive: bool, visitor: &mut Visitor<'_>) -> VisitControl {
        let NodeKind::Directory { children } = &self.nodes[index].kind else {
            return VisitControl::Continue;
        };
        for &child in children {
            let child_path = prefix.append(&Path::new(self.nodes[child].name.clone())).expect("relative name");
            match &self.nodes[child].kind {
                NodeKind::Directory { .. } => {
                    let dir_path = child_path.as_directory();
                    if visitor(VisitEntry { path: dir_path.clone(), kind: EntryKind::Directory })
                        == VisitControl::Stop
                    {
                        return VisitControl::Stop;
                    }
                    if recursive && self.visit_node(child, &dir_path, recursive, visitor) == VisitControl::Stop {
                        return VisitControl::Stop;
                    }
                }
                NodeKind::File { .. } => {
                    if visitor(VisitEntry { path: child_path.as_file(), kind: EntryKind::File })
                        == VisitControl::Stop
                    {
                        return VisitControl::Stop;
                    }
                }
            }
        }
        VisitControl::Continue
    }

    /// Calls `cb(path, info)` for every file under `dir`, in registration order.
    pub fn for_each_file(&self, dir: &Path, recursive: bool, mut cb: impl FnMut(&Path, u64)) {
        let _ = self.visit(dir, recursive, &mut |entry| {
            if entry.kind == EntryKind::File {
                if let Some(info) = self.get_file_info(&entry.path) {
                    cb(&entry.path, info);
                }
            }
            VisitControl::Continue
        });
    }

    fn find(&self, path: &Path) -> Option<NodeIndex> {
        self.by_path.get(&path_key(path)).copied()
    }

    fn get_or_create_directory(&mut self, path: &Path) -> NodeIndex {
        if path.is_root() || path.is_empty() {
            return self.root;
        }
        if let Some(index) = self.find(path) {
            return index;
        }

        let parent = self.get_or_create_directory(&path.parent());
        let name = path.name().to_string();
        let index = self.nodes.len();
        self.nodes.push(Node { name, parent: Some(parent), kind: NodeKind::Directory { children: Vec::new() } });
        if let NodeKind::Directory { children } = &mut self.nodes[parent].kind {
            children.push(index);
        }
        self.by_path.insert(path_key(path), index);
        index
    }
}

fn path_key(path: &Path) -> u64 {
    crate::hash::crc32(path.as_str().as_bytes()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_iterate_in_order() {
        let mut vfs = Vfs::new();
        vfs.register_existing_file(&Path::new("/a"), 1);
        vfs.register_existing_file(&Path::new("/b"), 2);
        vfs.register_existing_file(&Path::new("/c"), 3);

        let mut seen = Vec::new();
        vfs.for_each_file(&Path::new("/"), true, |_, info| seen.push(info));
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn delete_then_exists_and_iterate() {
        let mut vfs = Vfs::new();
        vfs.register_existing_file(&Path::new("/a"), 1);
        vfs.register_existing_file(&Path::new("/b"), 2);
        vfs.register_existing_file(&Path::new("/c"), 3);

        assert!(vfs.delete(&Path::new("/b")));
        assert!(!vfs.exists(&Path::new("/b")));

        let mut seen = Vec::new();
        vfs.for_each_file(&Path::new("/"), true, |_, info| seen.push(info));
        assert_eq!(seen, vec![1, 3]);
    }

    #[test]
    fn nested_directories_auto_created() {
        let mut vfs = Vfs::new();
        vfs.register_existing_file(&Path::new("/dir/sub/file.txt"), 42);
        assert!(vfs.exists(&Path::new("/dir/sub/file.txt")));
        assert_eq!(vfs.get_file_info(&Path::new("/dir/sub/file.txt")), Some(42));

        let mut dirs_seen = Vec::new();
        vfs.visit(&Path::new("/"), true, &mut |entry| {
            if entry.kind == EntryKind::Directory {
                dirs_seen.push(entry.path.as_str().to_string());
            }
            VisitControl::Continue
        })
        .unwrap();
        assert_eq!(dirs_seen, vec!["/dir/", "/dir/sub/"]);
    }
}
