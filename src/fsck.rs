//! Fail-fast consistency checker.
//!
//! Passes run in a fixed order and the first broken rule is returned; later
//! rules are not evaluated once one fails.

use alloc::{collections::BTreeSet, format, vec::Vec};

use crate::{
    btree::BTree,
    error::{FsResult, Violation, ViolationKind},
    fs::{FileSystem, Superblock},
    InodeNumber,
};

impl FileSystem {
    pub fn check_consistency(&self) -> FsResult<()> {
        check(&self.sb).map_err(|v| {
            log::warn!("consistency check failed: {}", v);
            v.into()
        })
    }
}

/// Validate the inode table, directory indexes and block allocation.
pub fn check(sb: &Superblock) -> Result<(), Violation> {
    check_inode_numbers(sb)?;
    let indexes = check_directory_indexes(sb)?;
    check_parent_links(sb, &indexes)?;
    let used = check_block_references(sb)?;
    check_free_list(sb, &used)?;
    Ok(())
}

fn check_inode_numbers(sb: &Superblock) -> Result<(), Violation> {
    for (slot, inode) in sb.inodes.iter().enumerate() {
        if inode.number != slot {
            return Err(Violation::new(
                ViolationKind::InodeNumberMismatch,
                format!("inode in slot {} claims number {}", slot, inode.number),
            ));
        }
    }
    Ok(())
}

fn check_directory_indexes(sb: &Superblock) -> Result<Vec<(InodeNumber, BTree)>, Violation> {
    let mut indexes = Vec::new();
    for inode in sb.inodes.iter().filter(|i| i.is_dir) {
        if inode.block >= sb.blocks.total_blocks() {
            return Err(Violation::new(
                ViolationKind::BlockOutOfRange,
                format!("directory {} points at block {}", inode.number, inode.block),
            ));
        }
        let tree = inode.load_index(&sb.blocks).map_err(|e| {
            Violation::new(
                ViolationKind::CorruptDirectory,
                format!("directory {} (block {}): {}", inode.number, inode.block, e),
            )
        })?;
        indexes.push((inode.number, tree));
    }
    Ok(indexes)
}

fn check_parent_links(sb: &Superblock, indexes: &[(InodeNumber, BTree)]) -> Result<(), Violation> {
    for (dir, tree) in indexes {
        for entry in tree.entries() {
            let child = sb.inodes.lookup(entry.inode).map_err(|_| {
                Violation::new(
                    ViolationKind::DanglingEntry,
                    format!("directory {} entry {} -> inode {}", dir, entry.name, entry.inode),
                )
            })?;
            if child.parent != Some(*dir) {
                return Err(Violation::new(
                    ViolationKind::ParentMismatch,
                    format!(
                        "inode {} is listed in directory {} but its parent is {:?}",
                        child.number, dir, child.parent
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_block_references(sb: &Superblock) -> Result<BTreeSet<usize>, Violation> {
    let mut used = BTreeSet::new();
    for inode in sb.inodes.iter() {
        if inode.block >= sb.blocks.total_blocks() {
            return Err(Violation::new(
                ViolationKind::BlockOutOfRange,
                format!("inode {} points at block {}", inode.number, inode.block),
            ));
        }
        if !used.insert(inode.block) {
            return Err(Violation::new(
                ViolationKind::DuplicateBlock,
                format!("block {} is referenced again by inode {}", inode.block, inode.number),
            ));
        }
    }
    Ok(used)
}

fn check_free_list(sb: &Superblock, used: &BTreeSet<usize>) -> Result<(), Violation> {
    let mut free = BTreeSet::new();
    for block in sb.blocks.free_blocks() {
        if block >= sb.blocks.total_blocks() {
            return Err(Violation::new(
                ViolationKind::FreeBlockOutOfRange,
                format!("free list holds block {}", block),
            ));
        }
        if used.contains(&block) {
            return Err(Violation::new(
                ViolationKind::FreeBlockInUse,
                format!("block {} is free but referenced by an inode", block),
            ));
        }
        if !free.insert(block) {
            return Err(Violation::new(
                ViolationKind::DuplicateFreeBlock,
                format!("block {} is on the free list twice", block),
            ));
        }
    }
    Ok(())
}
