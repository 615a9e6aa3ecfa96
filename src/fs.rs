//! The filesystem context: superblock state, journal and snapshot collections.

use alloc::{
    collections::BTreeMap,
    string::String,
    sync::Arc,
    vec::Vec,
};

use crate::{
    block::BlockStore,
    btree::DirEntry,
    codec,
    error::{FsError, FsResult},
    inode::{Inode, InodeTable},
    journal::{Journal, JournalStorage},
    operation::JournalOp,
    path,
    snapshot::{DirectorySnapshot, Snapshot},
    InodeNumber, BLOCK_SIZE, MAX_NAME_LEN, ROOT_INODE, ROOT_NAME, TOTAL_BLOCKS,
};

/// Filesystem-wide bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub total_blocks: usize,
    pub inodes: InodeTable,
    pub blocks: BlockStore,
}

impl Superblock {
    /// Fresh state holding only the root directory.
    fn format() -> FsResult<Self> {
        let mut blocks = BlockStore::new(TOTAL_BLOCKS);
        let mut inodes = InodeTable::new();
        inodes.create(&mut blocks, ROOT_NAME, true, None)?;
        Ok(Self {
            total_blocks: TOTAL_BLOCKS,
            inodes,
            blocks,
        })
    }

    pub fn total_inodes(&self) -> usize {
        self.inodes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub block_size: usize,
    pub total_blocks: usize,
    pub free_blocks: usize,
    pub total_inodes: usize,
    pub journal_entries: usize,
    pub name_max: usize,
}

/// One independent in-memory filesystem instance.
#[derive(Debug)]
pub struct FileSystem {
    pub(crate) sb: Superblock,
    pub(crate) journal: Journal,
    pub(crate) snapshots: Vec<Snapshot>,
    pub(crate) dir_snapshots: BTreeMap<String, DirectorySnapshot>,
}

impl FileSystem {
    /// A freshly initialized filesystem with a transient journal.
    pub fn new() -> FsResult<Self> {
        Ok(Self {
            sb: Superblock::format()?,
            journal: Journal::new(),
            snapshots: Vec::new(),
            dir_snapshots: BTreeMap::new(),
        })
    }

    /// Start up over a durable journal and replay what it holds.
    pub fn open(storage: Arc<dyn JournalStorage>) -> FsResult<Self> {
        let mut fs = Self::new()?;
        fs.journal.set_storage(storage);
        fs.journal.recover()?;
        fs.replay()?;
        Ok(fs)
    }

    /// Reset everything to a fresh filesystem with only the root directory.
    ///
    /// Also empties the journal, including any attached storage, and drops
    /// all snapshots.
    pub fn initialize(&mut self) -> FsResult<()> {
        self.sb = Superblock::format()?;
        self.journal.clear()?;
        self.snapshots.clear();
        self.dir_snapshots.clear();
        log::info!("filesystem initialized");
        Ok(())
    }

    /// Re-run every journaled operation, oldest first, without recording it
    /// again. Entries that fail are logged and skipped.
    pub fn replay(&mut self) -> FsResult<usize> {
        let ops: Vec<JournalOp> = self.journal.entries().map(|e| e.op.clone()).collect();
        log::info!("replaying {} journaled operations", ops.len());

        let mut applied = 0;
        for op in ops {
            match op.apply(self) {
                Ok(_) => applied += 1,
                Err(e) => log::warn!("replay of {} {} failed: {}", op.kind(), op.target_path(), e),
            }
        }
        Ok(applied)
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn mkdir(&mut self, parent_path: &str, name: &str) -> FsResult<InodeNumber> {
        self.journal.record(JournalOp::mkdir(parent_path, name))?;
        self.create_entry(parent_path, name, true)
    }

    pub fn touch(&mut self, dir_path: &str, name: &str) -> FsResult<InodeNumber> {
        self.journal.record(JournalOp::touch(dir_path, name))?;
        self.create_entry(dir_path, name, false)
    }

    /// Create a file or directory inode and link it into its parent.
    ///
    /// The parent's new index is encoded and size-checked before anything is
    /// allocated, so a failure leaves the filesystem untouched.
    pub(crate) fn create_entry(
        &mut self,
        dir_path: &str,
        name: &str,
        is_dir: bool,
    ) -> FsResult<InodeNumber> {
        path::validate_name(name)?;
        let parent = path::resolve_dir(&self.sb.inodes, &self.sb.blocks, dir_path)?;
        let (parent_number, parent_block) = (parent.number, parent.block);

        let mut index = parent.load_index(&self.sb.blocks)?;
        let number = self.sb.inodes.next_number();
        index.insert(DirEntry::new(name, number));
        let data = codec::encode(&index);
        if data.len() > BLOCK_SIZE {
            return Err(FsError::BlockOverflow(parent_block, data.len()));
        }

        let created = self
            .sb
            .inodes
            .create(&mut self.sb.blocks, name, is_dir, Some(parent_number))?
            .number;
        let size = data.len();
        self.sb.blocks.write(parent_block, data)?;
        self.sb.inodes.lookup_mut(parent_number)?.size = size;

        log::debug!(
            "{} {} -> inode {}",
            if is_dir { "mkdir" } else { "touch" },
            path::join(dir_path, name),
            created
        );
        Ok(created)
    }

    pub fn resolve(&self, path: &str) -> FsResult<&Inode> {
        path::resolve(&self.sb.inodes, &self.sb.blocks, path)
    }

    /// Entries of a directory in key order.
    pub fn read_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let dir = path::resolve_dir(&self.sb.inodes, &self.sb.blocks, path)?;
        Ok(dir.load_index(&self.sb.blocks)?.entries())
    }

    /// Entry names of a directory in key order.
    pub fn ls(&self, path: &str) -> FsResult<Vec<String>> {
        Ok(self.read_dir(path)?.into_iter().map(|e| e.name).collect())
    }

    pub fn statfs(&self) -> FsStat {
        FsStat {
            block_size: BLOCK_SIZE,
            total_blocks: self.sb.total_blocks,
            free_blocks: self.sb.blocks.free_count(),
            total_inodes: self.sb.total_inodes(),
            journal_entries: self.journal.len(),
            name_max: MAX_NAME_LEN,
        }
    }

    pub fn root(&self) -> FsResult<&Inode> {
        self.sb.inodes.lookup(ROOT_INODE)
    }

    /// Path of an inode, rebuilt from its parent links.
    pub fn path_of(&self, number: InodeNumber) -> FsResult<String> {
        let mut names = Vec::new();
        let mut current = self.sb.inodes.lookup(number)?;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            if names.len() > self.sb.inodes.len() {
                return Err(FsError::InvalidInodeReference(parent));
            }
            current = self.sb.inodes.lookup(parent)?;
        }

        let mut out = String::from("/");
        out.push_str(ROOT_NAME);
        for name in names.iter().rev() {
            out.push('/');
            out.push_str(name);
        }
        Ok(out)
    }
}

impl core::fmt::Display for FsStat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} inodes, {}/{} blocks free ({} bytes each), {} journal entries",
            self.total_inodes,
            self.free_blocks,
            self.total_blocks,
            self.block_size,
            self.journal_entries
        )
    }
}

impl FsStat {
    pub fn used_blocks(&self) -> usize {
        self.total_blocks - self.free_blocks
    }
}

impl FileSystem {
    /// Render the whole tree, one entry per line, for diagnostics.
    pub fn dump(&self) -> FsResult<String> {
        let mut out = String::new();
        self.dump_dir(self.root()?, 0, &mut out)?;
        Ok(out)
    }

    fn dump_dir(&self, dir: &Inode, depth: usize, out: &mut String) -> FsResult<()> {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&dir.name);
        if dir.is_dir {
            out.push('/');
        }
        out.push('\n');
        if depth > self.sb.inodes.len() {
            return Err(FsError::InvalidInodeReference(dir.number));
        }
        if dir.is_dir {
            for entry in dir.load_index(&self.sb.blocks)?.entries() {
                let child = self.sb.inodes.lookup(entry.inode)?;
                self.dump_dir(child, depth + 1, out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{format, vec};

    #[test]
    fn test_new_has_root_only() {
        let fs = FileSystem::new().unwrap();
        let root = fs.resolve("/root").unwrap();
        assert_eq!(root.number, ROOT_INODE);
        assert!(root.is_dir);
        assert_eq!(root.parent, None);
        assert!(fs.ls("/root").unwrap().is_empty());
        assert_eq!(fs.statfs().total_inodes, 1);
        assert_eq!(fs.statfs().used_blocks(), 1);
    }

    #[test]
    fn test_mkdir_touch_ls() {
        let mut fs = FileSystem::new().unwrap();
        let dir1 = fs.mkdir("/root", "dir1").unwrap();
        let file1 = fs.touch("/root/dir1", "file1").unwrap();

        assert_eq!(fs.resolve("/root/dir1").unwrap().number, dir1);
        assert_eq!(fs.resolve("/root/dir1/file1").unwrap().number, file1);
        assert_eq!(fs.ls("/root").unwrap(), vec!["dir1"]);
        assert_eq!(fs.ls("/root/dir1").unwrap(), vec!["file1"]);
        assert_eq!(fs.journal().len(), 2);
    }

    #[test]
    fn test_directory_size_tracks_index() {
        let mut fs = FileSystem::new().unwrap();
        let before = fs.root().unwrap().size;
        fs.touch("/root", "a").unwrap();
        let root = fs.root().unwrap();
        assert!(root.size > before);
        assert_eq!(root.size, fs.superblock().blocks.read(root.block).unwrap().len());
    }

    #[test]
    fn test_errors_leave_state_alone() {
        let mut fs = FileSystem::new().unwrap();
        fs.touch("/root", "file").unwrap();
        let stat = fs.statfs();

        assert!(matches!(fs.mkdir("/root/nope", "x"), Err(FsError::PathNotFound(_))));
        assert!(matches!(fs.touch("/root/file", "x"), Err(FsError::NotADirectory(_))));
        assert!(matches!(fs.mkdir("/root", "a/b"), Err(FsError::InvalidName(_))));
        assert!(matches!(fs.ls("/root/file"), Err(FsError::NotADirectory(_))));

        assert_eq!(fs.statfs().total_inodes, stat.total_inodes);
        assert_eq!(fs.statfs().free_blocks, stat.free_blocks);
    }

    #[test]
    fn test_directory_full() {
        let mut fs = FileSystem::new().unwrap();
        let long = |i: usize| format!("{:0>200}", i);
        let mut created = 0;
        let err = loop {
            match fs.touch("/root", &long(created)) {
                Ok(_) => created += 1,
                Err(e) => break e,
            }
        };
        assert!(matches!(err, FsError::BlockOverflow(_, _)));
        assert!(created > 0);
        assert_eq!(fs.ls("/root").unwrap().len(), created);
        assert_eq!(fs.statfs().total_inodes, created + 1);
    }

    #[test]
    fn test_block_exhaustion() {
        let mut fs = FileSystem::new().unwrap();
        for i in 0..16 {
            fs.mkdir("/root", &format!("s{}", i)).unwrap();
        }
        let mut files = 0;
        let err = loop {
            match fs.touch(&format!("/root/s{}", files % 16), &format!("f{}", files)) {
                Ok(_) => files += 1,
                Err(e) => break e,
            }
        };
        assert_eq!(err, FsError::BlockExhausted);
        assert_eq!(fs.statfs().free_blocks, 0);
        assert_eq!(fs.statfs().total_inodes, TOTAL_BLOCKS);
        assert_eq!(files, TOTAL_BLOCKS - 17);
    }

    #[test]
    fn test_path_of() {
        let mut fs = FileSystem::new().unwrap();
        fs.mkdir("/root", "a").unwrap();
        fs.mkdir("/root/a", "b").unwrap();
        let f = fs.touch("/root/a/b", "c").unwrap();
        assert_eq!(fs.path_of(f).unwrap(), "/root/a/b/c");
        assert_eq!(fs.path_of(ROOT_INODE).unwrap(), "/root");
    }

    #[test]
    fn test_dump() {
        let mut fs = FileSystem::new().unwrap();
        fs.mkdir("/root", "a").unwrap();
        fs.touch("/root/a", "f").unwrap();
        assert_eq!(fs.dump().unwrap(), "root/\n  a/\n    f\n");
    }
}
