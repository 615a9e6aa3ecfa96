//! Journaled operations and their replay.

use alloc::string::String;
use serde::{Deserialize, Serialize};

use crate::{error::FsResult, fs::FileSystem, path, InodeNumber};

/// A mutating request as it is written to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalOp {
    Mkdir { parent_path: String, name: String },
    Touch { dir_path: String, name: String },
}

impl JournalOp {
    pub fn mkdir(parent_path: &str, name: &str) -> Self {
        JournalOp::Mkdir {
            parent_path: String::from(parent_path),
            name: String::from(name),
        }
    }

    pub fn touch(dir_path: &str, name: &str) -> Self {
        JournalOp::Touch {
            dir_path: String::from(dir_path),
            name: String::from(name),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JournalOp::Mkdir { .. } => "mkdir",
            JournalOp::Touch { .. } => "touch",
        }
    }

    /// Path of the entry the operation creates.
    pub fn target_path(&self) -> String {
        match self {
            JournalOp::Mkdir { parent_path, name } => path::join(parent_path, name),
            JournalOp::Touch { dir_path, name } => path::join(dir_path, name),
        }
    }

    /// Run the operation without journaling it again.
    pub(crate) fn apply(&self, fs: &mut FileSystem) -> FsResult<InodeNumber> {
        match self {
            JournalOp::Mkdir { parent_path, name } => fs.create_entry(parent_path, name, true),
            JournalOp::Touch { dir_path, name } => fs.create_entry(dir_path, name, false),
        }
    }
}
