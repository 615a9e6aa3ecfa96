//! snapfs: an in-memory filesystem metadata engine.
//!
//! A simulated block device, an append-only inode table, one B-tree index per
//! directory stored in that directory's block, a bounded write-ahead journal
//! with replay, whole-filesystem and per-directory snapshots, and a fail-fast
//! consistency checker. All state lives in a [`FileSystem`] value.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod block;
pub mod btree;
pub mod codec;
pub mod error;
pub mod fs;
pub mod fsck;
pub mod inode;
pub mod journal;
pub mod operation;
pub mod path;
pub mod snapshot;
pub mod storage;


pub use block::BlockStore;
pub use btree::{BTree, DirEntry};
pub use error::{FsError, FsResult, Violation, ViolationKind};
pub use fs::{FileSystem, FsStat, Superblock};
pub use inode::{Inode, InodeTable};
pub use journal::{Journal, JournalEntry, JournalStorage};
pub use operation::JournalOp;
pub use snapshot::{DirectorySnapshot, RestoreScope, Snapshot};
pub use storage::MemJournalStorage;

#[cfg(any(test, feature = "std"))]
pub use storage::FileJournalStorage;

pub type InodeNumber = usize;
pub type BlockIndex = usize;

#[cfg(feature = "blk512")]
pub const BLOCK_SIZE: usize = 512;

#[cfg(all(feature = "blk1k", not(feature = "blk512")))]
pub const BLOCK_SIZE: usize = 1024;

#[cfg(not(any(feature = "blk512", feature = "blk1k")))]
pub const BLOCK_SIZE: usize = 4096;

pub const TOTAL_BLOCKS: usize = 1024;

/// Keys per B-tree node; the tree order is one more.
pub const MAX_KEYS: usize = 3;

pub const JOURNAL_MAX: usize = 100;

pub const MAX_NAME_LEN: usize = 255;

pub const ROOT_NAME: &str = "root";
pub const ROOT_INODE: InodeNumber = 0;
