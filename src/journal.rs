//! Bounded write-ahead journal of mutating operations.
//!
//! Entries are framed on the attached storage as `[len: u32 LE][json]`. The
//! persisted log always mirrors the in-memory ring: appends add one frame,
//! evictions rewrite the log from the surviving entries.

use alloc::{
    collections::VecDeque,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{FsError, FsResult},
    operation::JournalOp,
    JOURNAL_MAX,
};

/// Frames above this size are treated as garbage during recovery.
const MAX_FRAME: u32 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub path: String,
    pub op: JournalOp,
}

/// Byte-addressed backing store for the journal.
pub trait JournalStorage: Send + Sync {
    fn write(&self, offset: u64, data: &[u8]) -> FsResult<()>;
    fn read(&self, offset: u64, buf: &mut [u8]) -> FsResult<()>;
    fn size(&self) -> FsResult<u64>;
    fn truncate(&self, length: u64) -> FsResult<()>;
    fn flush(&self) -> FsResult<()>;
}

pub struct Journal {
    entries: VecDeque<JournalEntry>,
    storage: Option<Arc<dyn JournalStorage>>,
    next_offset: u64,
    next_seq: u64,
    capacity: usize,
}

impl core::fmt::Debug for Journal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Journal")
            .field("entries", &self.entries.len())
            .field("persistent", &self.storage.is_some())
            .field("next_offset", &self.next_offset)
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

impl Journal {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(JOURNAL_MAX),
            storage: None,
            next_offset: 0,
            next_seq: 1,
            capacity: JOURNAL_MAX,
        }
    }

    pub fn set_storage(&mut self, storage: Arc<dyn JournalStorage>) {
        self.storage = Some(storage);
    }

    pub fn is_persistent(&self) -> bool {
        self.storage.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    /// Append an operation, evicting the oldest entry once over capacity.
    ///
    /// When storage is attached the entry is durable before this returns.
    pub fn record(&mut self, op: JournalOp) -> FsResult<()> {
        let entry = JournalEntry {
            seq: self.next_seq,
            path: op.target_path(),
            op,
        };

        let evicts = self.entries.len() >= self.capacity;
        if let Some(storage) = self.storage.clone() {
            if evicts {
                let survivors = self.entries.iter().skip(1).chain(core::iter::once(&entry));
                self.next_offset = write_frames(storage.as_ref(), survivors)?;
            } else {
                let frame = encode_frame(&entry)?;
                storage.write(self.next_offset, &frame)?;
                self.next_offset += frame.len() as u64;
            }
            storage.flush()?;
        }

        if evicts {
            if let Some(old) = self.entries.pop_front() {
                log::debug!("journal full, evicted entry {}", old.seq);
            }
        }
        log::debug!("journal {} {} #{}", entry.op.kind(), entry.path, entry.seq);
        self.next_seq += 1;
        self.entries.push_back(entry);
        Ok(())
    }

    /// Load the entries persisted on the attached storage.
    ///
    /// Stops at the first torn or undecodable frame and cuts the storage back
    /// to the last good one. Returns the number of entries loaded.
    pub fn recover(&mut self) -> FsResult<usize> {
        let storage = match self.storage.clone() {
            Some(s) => s,
            None => return Ok(0),
        };

        let end = storage.size()?;
        let mut offset = 0u64;
        let mut recovered = VecDeque::new();
        while offset + 4 <= end {
            let mut size_buf = [0u8; 4];
            storage.read(offset, &mut size_buf)?;
            let size = u32::from_le_bytes(size_buf);
            if size == 0 || size > MAX_FRAME || offset + 4 + size as u64 > end {
                log::warn!("journal: torn frame at offset {}", offset);
                break;
            }

            let mut data = alloc::vec![0u8; size as usize];
            storage.read(offset + 4, &mut data)?;
            match serde_json::from_slice::<JournalEntry>(&data) {
                Ok(entry) => recovered.push_back(entry),
                Err(e) => {
                    log::warn!("journal: undecodable frame at offset {}: {}", offset, e);
                    break;
                }
            }
            offset += 4 + size as u64;
        }

        if offset != end {
            storage.truncate(offset)?;
            storage.flush()?;
        }

        while recovered.len() > self.capacity {
            recovered.pop_front();
        }
        self.next_seq = recovered.back().map_or(1, |e| e.seq + 1);
        self.next_offset = offset;
        self.entries = recovered;
        log::info!("journal: recovered {} entries", self.entries.len());
        Ok(self.entries.len())
    }

    /// Drop every entry, in memory and on storage.
    pub fn clear(&mut self) -> FsResult<()> {
        if let Some(ref storage) = self.storage {
            storage.truncate(0)?;
            storage.flush()?;
        }
        self.entries.clear();
        self.next_offset = 0;
        self.next_seq = 1;
        Ok(())
    }
}

fn encode_frame(entry: &JournalEntry) -> FsResult<Vec<u8>> {
    let data = serde_json::to_vec(entry).map_err(|e| FsError::JournalIo(e.to_string()))?;
    let mut frame = Vec::with_capacity(4 + data.len());
    frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
    frame.extend_from_slice(&data);
    Ok(frame)
}

/// Replace the storage content with `entries`, returning the new end offset.
///
/// The frames overwrite the log in place before the old tail is cut, so an
/// interrupted rewrite still leaves a decodable prefix.
fn write_frames<'a>(
    storage: &dyn JournalStorage,
    entries: impl Iterator<Item = &'a JournalEntry>,
) -> FsResult<u64> {
    let mut buf = Vec::new();
    for entry in entries {
        buf.extend_from_slice(&encode_frame(entry)?);
    }
    storage.write(0, &buf)?;
    storage.truncate(buf.len() as u64)?;
    Ok(buf.len() as u64)
}
