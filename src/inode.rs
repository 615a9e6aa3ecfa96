//! Inode records and the append-only inode table.

use alloc::{string::String, vec::Vec};

use crate::{
    block::BlockStore,
    btree::BTree,
    codec,
    error::{FsError, FsResult},
    BlockIndex, InodeNumber,
};

/// Metadata for one file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    /// Slot in the inode table, assigned once.
    pub number: InodeNumber,
    pub name: String,
    pub is_dir: bool,
    /// Directories: byte length of the encoded index. Files: always 0.
    pub size: usize,
    pub block: BlockIndex,
    /// Containing directory, `None` for the root.
    pub parent: Option<InodeNumber>,
}

impl Inode {
    /// Decode this directory's index from its block.
    pub fn load_index(&self, blocks: &BlockStore) -> FsResult<BTree> {
        if !self.is_dir {
            return Err(FsError::NotADirectory(self.name.clone()));
        }
        codec::decode(blocks.read(self.block)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InodeTable {
    inodes: Vec<Inode>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self { inodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Inode> {
        self.inodes.iter()
    }

    /// Number the next created inode will receive.
    pub fn next_number(&self) -> InodeNumber {
        self.inodes.len()
    }

    /// Append a new inode, reserving one block for it.
    ///
    /// Directories get an empty index written into their block. Nothing is
    /// appended if the block cannot be allocated.
    pub fn create(
        &mut self,
        blocks: &mut BlockStore,
        name: &str,
        is_dir: bool,
        parent: Option<InodeNumber>,
    ) -> FsResult<&Inode> {
        let block = blocks.allocate()?;
        let mut size = 0;
        if is_dir {
            let data = codec::encode(&BTree::new());
            size = data.len();
            blocks.write(block, data)?;
        }

        let number = self.next_number();
        self.inodes.push(Inode {
            number,
            name: String::from(name),
            is_dir,
            size,
            block,
            parent,
        });
        log::debug!(
            "created inode {} ({}, dir={}) in block {}",
            number,
            name,
            is_dir,
            block
        );
        self.lookup(number)
    }

    pub fn lookup(&self, number: InodeNumber) -> FsResult<&Inode> {
        self.inodes
            .get(number)
            .ok_or(FsError::InvalidInodeReference(number))
    }

    pub fn lookup_mut(&mut self, number: InodeNumber) -> FsResult<&mut Inode> {
        self.inodes
            .get_mut(number)
            .ok_or(FsError::InvalidInodeReference(number))
    }

    /// Write a captured record back into the slot named by its number.
    pub(crate) fn put(&mut self, inode: Inode) -> FsResult<()> {
        let slot = self.lookup_mut(inode.number)?;
        *slot = inode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TOTAL_BLOCKS;

    #[test]
    fn test_create_assigns_sequential_numbers() {
        let mut blocks = BlockStore::new(TOTAL_BLOCKS);
        let mut table = InodeTable::new();

        let root = table.create(&mut blocks, "root", true, None).unwrap().clone();
        let file = table
            .create(&mut blocks, "a.txt", false, Some(root.number))
            .unwrap()
            .clone();

        assert_eq!(root.number, 0);
        assert_eq!(file.number, 1);
        assert_eq!(file.parent, Some(0));
        assert_ne!(root.block, file.block);
        assert_eq!(file.size, 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_directory_block_holds_empty_index() {
        let mut blocks = BlockStore::new(4);
        let mut table = InodeTable::new();
        let dir = table.create(&mut blocks, "root", true, None).unwrap().clone();

        let tree = dir.load_index(&blocks).unwrap();
        assert!(tree.is_empty());
        assert_eq!(dir.size, blocks.read(dir.block).unwrap().len());
    }

    #[test]
    fn test_create_fails_without_blocks() {
        let mut blocks = BlockStore::new(1);
        let mut table = InodeTable::new();
        table.create(&mut blocks, "root", true, None).unwrap();

        let err = table.create(&mut blocks, "x", false, Some(0)).unwrap_err();
        assert_eq!(err, FsError::BlockExhausted);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_file_has_no_index() {
        let mut blocks = BlockStore::new(4);
        let mut table = InodeTable::new();
        let file = table.create(&mut blocks, "f", false, None).unwrap().clone();
        assert!(matches!(
            file.load_index(&blocks),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_lookup_bounds() {
        let mut blocks = BlockStore::new(4);
        let mut table = InodeTable::new();
        table.create(&mut blocks, "root", true, None).unwrap();

        assert_eq!(table.lookup(0).unwrap().name, "root");
        assert_eq!(table.lookup(1), Err(FsError::InvalidInodeReference(1)));
    }
}
