//! Inode ↔ path translation (spec.md §1: "the kernel upcall glue ...
//! is out of scope" — `core` speaks in absolute paths; the kernel
//! speaks in inode numbers, so this bidirectional table is the glue).
//!
//! Grounded on `RemoteFS`'s `inode_to_path`/`path_to_inode` maps in the
//! teacher's `client/src/fs/mod.rs`.

use std::collections::HashMap;

pub const ROOT_INODE: u64 = 1;

pub struct InodeTable {
    path_of: HashMap<u64, String>,
    inode_of: HashMap<String, u64>,
    next: u64,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut table = InodeTable {
            path_of: HashMap::new(),
            inode_of: HashMap::new(),
            next: ROOT_INODE + 1,
        };
        table.path_of.insert(ROOT_INODE, "/".to_string());
        table.inode_of.insert("/".to_string(), ROOT_INODE);
        table
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        self.path_of.get(&ino).map(String::as_str)
    }

    /// Returns the inode for `path`, allocating a new one if unseen.
    pub fn ensure(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.inode_of.get(path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.path_of.insert(ino, path.to_string());
        self.inode_of.insert(path.to_string(), ino);
        ino
    }

    pub fn parent_of(&self, path: &str) -> u64 {
        let (dir, _) = remotefs_core::time::split_path(path);
        if dir == "/" {
            ROOT_INODE
        } else {
            *self.inode_of.get(&dir).unwrap_or(&ROOT_INODE)
        }
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_preseeded() {
        let table = InodeTable::new();
        assert_eq!(table.path(ROOT_INODE), Some("/"));
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut table = InodeTable::new();
        let a = table.ensure("/x");
        let b = table.ensure("/x");
        assert_eq!(a, b);
        assert_ne!(a, ROOT_INODE);
    }

    #[test]
    fn distinct_paths_get_distinct_inodes() {
        let mut table = InodeTable::new();
        let a = table.ensure("/x");
        let b = table.ensure("/y");
        assert_ne!(a, b);
    }
}
