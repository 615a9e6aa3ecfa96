//! Simulated block device: a fixed pool of byte buffers plus a FIFO free list.

use alloc::{collections::VecDeque, vec::Vec};

use crate::{
    error::{FsError, FsResult},
    BlockIndex, BLOCK_SIZE,
};

/// Owns every block buffer and the allocator state.
///
/// Cloning produces an independent deep copy, which is what snapshots rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStore {
    blocks: Vec<Vec<u8>>,
    free: VecDeque<BlockIndex>,
}

impl BlockStore {
    /// Create a store of `total` empty blocks, all of them free.
    pub fn new(total: usize) -> Self {
        Self {
            blocks: (0..total).map(|_| Vec::new()).collect(),
            free: (0..total).collect(),
        }
    }

    pub fn total_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Free block indices in allocation order.
    pub fn free_blocks(&self) -> impl Iterator<Item = BlockIndex> + '_ {
        self.free.iter().copied()
    }

    /// Take the head of the free list. Blocks are never returned.
    pub fn allocate(&mut self) -> FsResult<BlockIndex> {
        let block = self.free.pop_front().ok_or(FsError::BlockExhausted)?;
        log::trace!("allocated block {}", block);
        Ok(block)
    }

    pub fn read(&self, index: BlockIndex) -> FsResult<&[u8]> {
        self.blocks
            .get(index)
            .map(|b| b.as_slice())
            .ok_or(FsError::InvalidBlockReference(index))
    }

    /// Replace the whole content of a block.
    pub fn write(&mut self, index: BlockIndex, data: Vec<u8>) -> FsResult<()> {
        if data.len() > BLOCK_SIZE {
            return Err(FsError::BlockOverflow(index, data.len()));
        }
        let slot = self
            .blocks
            .get_mut(index)
            .ok_or(FsError::InvalidBlockReference(index))?;
        *slot = data;
        Ok(())
    }

    /// Mutable view of a block's bytes, for in-place edits.
    #[cfg(test)]
    pub(crate) fn block_mut(&mut self, index: BlockIndex) -> FsResult<&mut Vec<u8>> {
        self.blocks
            .get_mut(index)
            .ok_or(FsError::InvalidBlockReference(index))
    }

    /// Copy of every block's content, leaving the allocator out.
    pub(crate) fn contents(&self) -> Vec<Vec<u8>> {
        self.blocks.clone()
    }

    /// Overwrite every block's content without touching the free list.
    pub(crate) fn replace_contents(&mut self, contents: Vec<Vec<u8>>) {
        self.blocks = contents;
    }

    #[cfg(test)]
    pub(crate) fn free_list_mut(&mut self) -> &mut VecDeque<BlockIndex> {
        &mut self.free
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_allocate_is_fifo() {
        let mut store = BlockStore::new(4);
        assert_eq!(store.allocate(), Ok(0));
        assert_eq!(store.allocate(), Ok(1));
        assert_eq!(store.free_count(), 2);
        assert_eq!(store.free_blocks().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_exhaustion() {
        let mut store = BlockStore::new(2);
        store.allocate().unwrap();
        store.allocate().unwrap();
        assert_eq!(store.allocate(), Err(FsError::BlockExhausted));
        assert_eq!(store.allocate(), Err(FsError::BlockExhausted));
    }

    #[test]
    fn test_write_bounds() {
        let mut store = BlockStore::new(2);
        store.write(1, vec![1, 2, 3]).unwrap();
        assert_eq!(store.read(1).unwrap(), &[1, 2, 3]);

        assert_eq!(
            store.write(5, vec![0]),
            Err(FsError::InvalidBlockReference(5))
        );
        assert_eq!(
            store.write(0, vec![0; BLOCK_SIZE + 1]),
            Err(FsError::BlockOverflow(0, BLOCK_SIZE + 1))
        );
        assert!(store.read(0).unwrap().is_empty());
    }

    #[test]
    fn test_clone_is_deep() {
        let mut store = BlockStore::new(2);
        store.write(0, vec![9; 8]).unwrap();
        let copy = store.clone();

        store.block_mut(0).unwrap()[0] = 1;
        store.allocate().unwrap();

        assert_eq!(copy.read(0).unwrap(), &[9; 8]);
        assert_eq!(copy.free_count(), 2);
    }
}
