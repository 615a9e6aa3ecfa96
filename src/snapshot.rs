//! Point-in-time copies of the whole filesystem or of one directory subtree.
//!
//! Every capture clones the inode records and block buffers it keeps, so later
//! writes to live state, in place or not, cannot reach a snapshot.

use alloc::{
    collections::BTreeSet,
    string::String,
    vec::Vec,
};

use crate::{
    block::BlockStore,
    btree::BTree,
    codec,
    error::{FsError, FsResult},
    fs::FileSystem,
    inode::{Inode, InodeTable},
    path,
};

/// Whole-filesystem capture, allocator state included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub inodes: InodeTable,
    pub blocks: BlockStore,
}

/// Capture of one directory and everything reachable below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySnapshot {
    pub root: Inode,
    /// The directory itself first, then descendants in pre-order.
    pub inodes: Vec<Inode>,
    /// Content of every block at capture time. The free list is not kept.
    pub blocks: Vec<Vec<u8>>,
}

/// How much of the block store a directory restore rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreScope {
    /// Every block goes back to its captured content.
    #[default]
    WholeStore,
    /// Only blocks owned by the captured inodes are rewritten.
    Subtree,
}

impl FileSystem {
    pub fn create_snapshot(&mut self) {
        self.snapshots.push(Snapshot {
            inodes: self.sb.inodes.clone(),
            blocks: self.sb.blocks.clone(),
        });
        log::info!(
            "filesystem snapshot {} taken ({} inodes)",
            self.snapshots.len(),
            self.sb.inodes.len()
        );
    }

    /// Roll back to the most recent filesystem snapshot.
    ///
    /// The snapshot stays in the list, so restoring twice yields the same
    /// state both times.
    pub fn restore_snapshot(&mut self) -> FsResult<()> {
        let snapshot = self.snapshots.last().ok_or(FsError::NoSnapshotAvailable)?;
        self.sb.inodes = snapshot.inodes.clone();
        self.sb.blocks = snapshot.blocks.clone();
        log::info!(
            "filesystem snapshot {} restored ({} inodes)",
            self.snapshots.len(),
            self.sb.inodes.len()
        );
        Ok(())
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Capture the directory at `path` and its whole subtree.
    ///
    /// A later capture of the same path replaces the earlier one.
    pub fn create_directory_snapshot(&mut self, path: &str) -> FsResult<()> {
        let key = path::canonical_path(path)?;
        let root = path::resolve_dir(&self.sb.inodes, &self.sb.blocks, path)?.clone();

        let mut inodes = Vec::new();
        let mut seen = BTreeSet::new();
        self.collect_subtree(&root, &mut inodes, &mut seen)?;

        log::info!("directory snapshot of {} taken ({} inodes)", key, inodes.len());
        self.dir_snapshots.insert(
            key,
            DirectorySnapshot {
                root,
                inodes,
                blocks: self.sb.blocks.contents(),
            },
        );
        Ok(())
    }

    fn collect_subtree(
        &self,
        inode: &Inode,
        out: &mut Vec<Inode>,
        seen: &mut BTreeSet<usize>,
    ) -> FsResult<()> {
        if !seen.insert(inode.number) {
            return Ok(());
        }
        out.push(inode.clone());
        if inode.is_dir {
            for entry in inode.load_index(&self.sb.blocks)?.entries() {
                let child = self.sb.inodes.lookup(entry.inode)?;
                self.collect_subtree(child, out, seen)?;
            }
        }
        Ok(())
    }

    /// Restore a directory snapshot, reverting the entire block store.
    pub fn restore_directory_snapshot(&mut self, path: &str) -> FsResult<()> {
        self.restore_directory_snapshot_scoped(path, RestoreScope::WholeStore)
    }

    /// Restore a directory snapshot with an explicit block scope.
    ///
    /// Captured inodes are written back by number. Inodes created after the
    /// capture stay in the table, and the allocator is left as is.
    pub fn restore_directory_snapshot_scoped(
        &mut self,
        path: &str,
        scope: RestoreScope,
    ) -> FsResult<()> {
        let key = path::canonical_path(path)?;
        let snapshot = self
            .dir_snapshots
            .get(&key)
            .ok_or_else(|| FsError::NoDirectorySnapshot(key.clone()))?;

        // Check everything first so a failed restore changes nothing.
        for inode in &snapshot.inodes {
            self.sb.inodes.lookup(inode.number)?;
            if inode.block >= snapshot.blocks.len() {
                return Err(FsError::InvalidBlockReference(inode.block));
            }
        }
        if snapshot.blocks.len() != self.sb.blocks.total_blocks() {
            return Err(FsError::InvalidBlockReference(snapshot.blocks.len()));
        }

        match scope {
            RestoreScope::WholeStore => {
                self.sb.blocks.replace_contents(snapshot.blocks.clone());
            }
            RestoreScope::Subtree => {
                for inode in &snapshot.inodes {
                    self.sb
                        .blocks
                        .write(inode.block, snapshot.blocks[inode.block].clone())?;
                }
            }
        }
        for inode in &snapshot.inodes {
            self.sb.inodes.put(inode.clone())?;
        }
        let restored_inodes = snapshot.inodes.len();
        self.resync_directories()?;

        log::info!(
            "directory snapshot of {} restored ({} inodes, {:?})",
            key,
            restored_inodes,
            scope
        );
        Ok(())
    }

    /// Bring every live directory in line with its block after a restore.
    ///
    /// Directories created after the capture had an empty block at capture
    /// time and get a fresh empty index. Every directory's size is then set
    /// from the index its block now holds.
    fn resync_directories(&mut self) -> FsResult<()> {
        let dirs: Vec<(usize, usize)> = self
            .sb
            .inodes
            .iter()
            .filter(|i| i.is_dir)
            .map(|i| (i.number, i.block))
            .collect();

        for (number, block) in dirs {
            if self.sb.blocks.read(block)?.is_empty() {
                log::debug!("directory {} postdates the capture, emptying its index", number);
                self.sb.blocks.write(block, codec::encode(&BTree::new()))?;
            }
            let size = self.sb.blocks.read(block)?.len();
            self.sb.inodes.lookup_mut(number)?.size = size;
        }
        Ok(())
    }

    pub fn has_directory_snapshot(&self, path: &str) -> bool {
        path::canonical_path(path)
            .map(|key| self.dir_snapshots.contains_key(&key))
            .unwrap_or(false)
    }

    /// Paths with a stored directory snapshot, sorted.
    pub fn directory_snapshot_paths(&self) -> Vec<String> {
        self.dir_snapshots.keys().cloned().collect()
    }
}
