//! Block encoding of a directory's B-tree.
//!
//! ```text
//! header : magic u16 | version u8
//! node   : flags u8 | key_count u16 | key_count * (name_len u16 | name | inode u64)
//!          | child_count u16 | child_count * node
//! ```
//!
//! All integers are big endian. Each node states its leaf flag and both counts,
//! so a record's extent is known without looking at its neighbours.

use alloc::{string::String, vec::Vec};

use bitflags::bitflags;

use crate::{
    btree::{BTree, BTreeNode, DirEntry},
    error::{FsError, FsResult},
    MAX_KEYS,
};

pub const MAGIC: u16 = 0xB7D1;
pub const VERSION: u8 = 1;

/// Deeper than any tree that fits in one block.
const MAX_DEPTH: usize = 32;

bitflags! {
    pub struct NodeFlags: u8 {
        const LEAF = 0b0000_0001;
    }
}

pub fn encode(tree: &BTree) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.push(VERSION);
    encode_node(&tree.root, &mut out);
    out
}

fn encode_node(node: &BTreeNode, out: &mut Vec<u8>) {
    let flags = if node.is_leaf {
        NodeFlags::LEAF
    } else {
        NodeFlags::empty()
    };
    out.push(flags.bits());

    out.extend_from_slice(&(node.keys.len() as u16).to_be_bytes());
    for key in &node.keys {
        out.extend_from_slice(&(key.name.len() as u16).to_be_bytes());
        out.extend_from_slice(key.name.as_bytes());
        out.extend_from_slice(&(key.inode as u64).to_be_bytes());
    }

    out.extend_from_slice(&(node.children.len() as u16).to_be_bytes());
    for child in &node.children {
        encode_node(child, out);
    }
}

/// Decode a block back into a tree, rejecting anything malformed.
pub fn decode(data: &[u8]) -> FsResult<BTree> {
    let mut r = Reader { data, pos: 0 };
    if r.u16()? != MAGIC {
        return Err(FsError::CorruptDirectoryIndex("bad magic"));
    }
    if r.u8()? != VERSION {
        return Err(FsError::CorruptDirectoryIndex("unsupported version"));
    }

    let mut leaf_depth = None;
    let root = decode_node(&mut r, 0, &mut leaf_depth, None, None)?;
    if r.pos != data.len() {
        return Err(FsError::CorruptDirectoryIndex("trailing bytes"));
    }
    Ok(BTree { root })
}

/// `lower` and `upper` are the parent separators around this node. Equal
/// names may sit on either side of a separator.
fn decode_node(
    r: &mut Reader<'_>,
    depth: usize,
    leaf_depth: &mut Option<usize>,
    lower: Option<&str>,
    upper: Option<&str>,
) -> FsResult<BTreeNode> {
    if depth >= MAX_DEPTH {
        return Err(FsError::CorruptDirectoryIndex("tree too deep"));
    }

    let flags = NodeFlags::from_bits(r.u8()?)
        .ok_or(FsError::CorruptDirectoryIndex("unknown node flags"))?;
    let is_leaf = flags.contains(NodeFlags::LEAF);

    let key_count = r.u16()? as usize;
    if key_count > MAX_KEYS {
        return Err(FsError::CorruptDirectoryIndex("too many keys"));
    }
    let mut keys: Vec<DirEntry> = Vec::with_capacity(key_count);
    for _ in 0..key_count {
        let len = r.u16()? as usize;
        let name = String::from_utf8(r.bytes(len)?.to_vec())
            .map_err(|_| FsError::CorruptDirectoryIndex("name is not utf-8"))?;
        let inode = r.u64()? as usize;
        if keys.last().map_or(false, |prev| prev.name > name) {
            return Err(FsError::CorruptDirectoryIndex("keys out of order"));
        }
        if lower.map_or(false, |lo| name.as_str() < lo)
            || upper.map_or(false, |hi| name.as_str() > hi)
        {
            return Err(FsError::CorruptDirectoryIndex("key outside parent range"));
        }
        keys.push(DirEntry { name, inode });
    }

    let child_count = r.u16()? as usize;
    if is_leaf {
        if child_count != 0 {
            return Err(FsError::CorruptDirectoryIndex("leaf with children"));
        }
        match *leaf_depth {
            None => *leaf_depth = Some(depth),
            Some(d) if d != depth => {
                return Err(FsError::CorruptDirectoryIndex("unbalanced tree"))
            }
            Some(_) => {}
        }
    } else if key_count == 0 || child_count != key_count + 1 {
        return Err(FsError::CorruptDirectoryIndex("bad child count"));
    }

    let mut children = Vec::with_capacity(child_count);
    for i in 0..child_count {
        let lo = if i == 0 { lower } else { Some(keys[i - 1].name.as_str()) };
        let hi = if i == key_count { upper } else { Some(keys[i].name.as_str()) };
        children.push(decode_node(r, depth + 1, leaf_depth, lo, hi)?);
    }

    Ok(BTreeNode {
        is_leaf,
        keys,
        children,
    })
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn bytes(&mut self, n: usize) -> FsResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or(FsError::CorruptDirectoryIndex("truncated record"))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> FsResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> FsResult<u16> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.bytes(2)?);
        Ok(u16::from_be_bytes(buf))
    }

    fn u64(&mut self) -> FsResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.bytes(8)?);
        Ok(u64::from_be_bytes(buf))
    }
}
