//! Per-directory B-tree mapping entry names to inode numbers.
//!
//! Order is `MAX_KEYS + 1`. Insertion splits full nodes on the way down, so a
//! node is never revisited after it has been passed. Deletion is not
//! supported, hence there is no minimum fill and no rebalancing.
//!
//! Nodes own their children directly. Nothing walks the tree upwards, so no
//! parent link is kept.

use alloc::{string::String, vec::Vec};
use core::mem;

use crate::{InodeNumber, MAX_KEYS};

/// One name to inode mapping inside a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode: InodeNumber,
}

impl DirEntry {
    pub fn new(name: &str, inode: InodeNumber) -> Self {
        Self {
            name: String::from(name),
            inode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BTreeNode {
    pub is_leaf: bool,
    /// Sorted by name.
    pub keys: Vec<DirEntry>,
    /// Empty for leaves, `keys.len() + 1` entries otherwise.
    pub children: Vec<BTreeNode>,
}

impl BTreeNode {
    pub fn leaf() -> Self {
        Self {
            is_leaf: true,
            keys: Vec::with_capacity(MAX_KEYS),
            children: Vec::new(),
        }
    }

    fn internal() -> Self {
        Self {
            is_leaf: false,
            keys: Vec::with_capacity(MAX_KEYS),
            children: Vec::with_capacity(MAX_KEYS + 1),
        }
    }

    fn is_full(&self) -> bool {
        self.keys.len() >= MAX_KEYS
    }

    /// Split the full child at `index`, moving its median key up here.
    ///
    /// The left half keeps `MAX_KEYS / 2` keys, the right half gets the rest
    /// minus the median.
    fn split_child(&mut self, index: usize) {
        let mid = MAX_KEYS / 2;
        let child = &mut self.children[index];

        let right_keys = child.keys.split_off(mid + 1);
        let right_children = if child.is_leaf {
            Vec::new()
        } else {
            child.children.split_off(mid + 1)
        };
        let median = match child.keys.pop() {
            Some(k) => k,
            None => return,
        };
        let right = BTreeNode {
            is_leaf: child.is_leaf,
            keys: right_keys,
            children: right_children,
        };

        self.keys.insert(index, median);
        self.children.insert(index + 1, right);
    }

    fn insert_non_full(&mut self, entry: DirEntry) {
        // Equal names go after existing ones.
        let mut i = self
            .keys
            .partition_point(|k| k.name.as_str() <= entry.name.as_str());

        if self.is_leaf {
            self.keys.insert(i, entry);
            return;
        }

        if self.children[i].is_full() {
            self.split_child(i);
            if entry.name > self.keys[i].name {
                i += 1;
            }
        }
        self.children[i].insert_non_full(entry);
    }

    fn walk<'a, F: FnMut(&'a DirEntry)>(&'a self, f: &mut F) {
        for (i, key) in self.keys.iter().enumerate() {
            if let Some(child) = self.children.get(i) {
                child.walk(f);
            }
            f(key);
        }
        if !self.is_leaf {
            if let Some(last) = self.children.get(self.keys.len()) {
                last.walk(f);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BTree {
    pub root: BTreeNode,
}

impl Default for BTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BTree {
    pub fn new() -> Self {
        Self {
            root: BTreeNode::leaf(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.keys.is_empty()
    }

    /// Number of entries in the whole tree.
    pub fn len(&self) -> usize {
        let mut n = 0;
        self.root.walk(&mut |_| n += 1);
        n
    }

    /// Levels from root to leaf, 1 for a lone leaf.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = &self.root;
        while let Some(first) = node.children.first() {
            height += 1;
            node = first;
        }
        height
    }

    /// Insert an entry. Duplicate names are not rejected.
    pub fn insert(&mut self, entry: DirEntry) {
        if self.root.is_full() {
            let old_root = mem::replace(&mut self.root, BTreeNode::internal());
            self.root.children.push(old_root);
            self.root.split_child(0);
        }
        self.root.insert_non_full(entry);
    }

    /// Find the inode for `name`, descending through children as needed.
    pub fn search(&self, name: &str) -> Option<InodeNumber> {
        let mut node = &self.root;
        loop {
            match node.keys.binary_search_by(|k| k.name.as_str().cmp(name)) {
                Ok(i) => return Some(node.keys[i].inode),
                Err(_) if node.is_leaf => return None,
                Err(i) => node = node.children.get(i)?,
            }
        }
    }

    /// Visit every entry in key order.
    pub fn for_each<'a, F: FnMut(&'a DirEntry)>(&'a self, mut f: F) {
        self.root.walk(&mut f);
    }

    /// All entries in key order.
    pub fn entries(&self) -> Vec<DirEntry> {
        let mut out = Vec::new();
        self.for_each(|e| out.push(e.clone()));
        out
    }
}
