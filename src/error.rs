//! Error types shared by every snapfs component.

use alloc::string::String;
use core::fmt;

use crate::{BlockIndex, InodeNumber};

pub type FsResult<T> = Result<T, FsError>;

#[derive(Debug, Clone, PartialEq, Eq, onlyerror::Error)]
pub enum FsError {
    #[error("no free blocks left")]
    BlockExhausted,
    #[error("block {0} is outside the block store")]
    InvalidBlockReference(BlockIndex),
    #[error("block {0} cannot hold {1} bytes")]
    BlockOverflow(BlockIndex, usize),
    #[error("inode {0} is not in the inode table")]
    InvalidInodeReference(InodeNumber),
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("invalid entry name: '{0}'")]
    InvalidName(String),
    #[error("corrupt directory index: {0}")]
    CorruptDirectoryIndex(&'static str),
    #[error("no filesystem snapshot available")]
    NoSnapshotAvailable,
    #[error("no snapshot available for directory {0}")]
    NoDirectorySnapshot(String),
    #[error("journal storage error: {0}")]
    JournalIo(String),
    #[error("consistency violation: {0}")]
    ConsistencyViolation(Violation),
}

/// Rule broken by the filesystem state, as reported by the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// An inode's number differs from its slot in the table.
    InodeNumberMismatch,
    /// A directory block does not decode to a valid tree.
    CorruptDirectory,
    /// A directory entry names an inode outside the table.
    DanglingEntry,
    /// An entry's inode does not point back at the directory holding it.
    ParentMismatch,
    BlockOutOfRange,
    DuplicateBlock,
    FreeBlockInUse,
    FreeBlockOutOfRange,
    DuplicateFreeBlock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub detail: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, detail: String) -> Self {
        Self { kind, detail }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

impl From<Violation> for FsError {
    fn from(v: Violation) -> Self {
        FsError::ConsistencyViolation(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = FsError::PathNotFound("/root/missing".to_string());
        assert_eq!(err.to_string(), "path not found: /root/missing");

        let err = FsError::BlockOverflow(7, 5000);
        assert_eq!(err.to_string(), "block 7 cannot hold 5000 bytes");
    }

    #[test]
    fn test_violation_conversion() {
        let v = Violation::new(ViolationKind::DuplicateBlock, "block 3".to_string());
        let err: FsError = v.clone().into();
        assert_eq!(err, FsError::ConsistencyViolation(v));
        assert!(err.to_string().contains("DuplicateBlock: block 3"));
    }
}
