//! Journal storage backends.

use alloc::vec::Vec;
use spin::Mutex;

use crate::{
    error::{FsError, FsResult},
    journal::JournalStorage,
};

/// Journal storage kept in memory.
///
/// Outlives the filesystem that writes to it when shared through an `Arc`,
/// which is enough to model a restart.
#[derive(Debug, Default)]
pub struct MemJournalStorage {
    data: Mutex<Vec<u8>>,
}

impl MemJournalStorage {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Vec::new()),
        }
    }

    /// Copy of the raw log bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl JournalStorage for MemJournalStorage {
    fn write(&self, offset: u64, data: &[u8]) -> FsResult<()> {
        let mut storage = self.data.lock();
        let start = offset as usize;
        let end = start + data.len();
        if end > storage.len() {
            storage.resize(end, 0);
        }
        storage[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        let storage = self.data.lock();
        let start = offset as usize;
        let end = start + buf.len();
        if end > storage.len() {
            return Err(FsError::JournalIo(alloc::format!(
                "read of {} bytes at {} past end {}",
                buf.len(),
                offset,
                storage.len()
            )));
        }
        buf.copy_from_slice(&storage[start..end]);
        Ok(())
    }

    fn size(&self) -> FsResult<u64> {
        Ok(self.data.lock().len() as u64)
    }

    fn truncate(&self, length: u64) -> FsResult<()> {
        self.data.lock().truncate(length as usize);
        Ok(())
    }

    fn flush(&self) -> FsResult<()> {
        Ok(())
    }
}

#[cfg(any(test, feature = "std"))]
pub use file::FileJournalStorage;

#[cfg(any(test, feature = "std"))]
mod file {
    use std::{
        fs::{File, OpenOptions},
        io::{Read, Seek, SeekFrom, Write},
        path::Path,
        string::ToString,
    };

    use spin::Mutex;

    use crate::{
        error::{FsError, FsResult},
        journal::JournalStorage,
    };

    fn io_err(e: std::io::Error) -> FsError {
        FsError::JournalIo(e.to_string())
    }

    /// Journal storage backed by a regular file.
    #[derive(Debug)]
    pub struct FileJournalStorage {
        file: Mutex<File>,
    }

    impl FileJournalStorage {
        /// Open or create the journal file at `path`.
        pub fn open<P: AsRef<Path>>(path: P) -> FsResult<Self> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(io_err)?;
            Ok(Self {
                file: Mutex::new(file),
            })
        }
    }

    impl JournalStorage for FileJournalStorage {
        fn write(&self, offset: u64, data: &[u8]) -> FsResult<()> {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
            file.write_all(data).map_err(io_err)
        }

        fn read(&self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
            file.read_exact(buf).map_err(io_err)
        }

        fn size(&self) -> FsResult<u64> {
            let file = self.file.lock();
            Ok(file.metadata().map_err(io_err)?.len())
        }

        fn truncate(&self, length: u64) -> FsResult<()> {
            self.file.lock().set_len(length).map_err(io_err)
        }

        fn flush(&self) -> FsResult<()> {
            self.file.lock().sync_data().map_err(io_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_storage_grows_and_reads() {
        let storage = MemJournalStorage::new();
        storage.write(2, b"abc").unwrap();
        assert_eq!(storage.bytes(), b"\0\0abc");

        let mut buf = [0u8; 3];
        storage.read(2, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        assert!(storage.read(4, &mut buf).is_err());

        storage.truncate(1).unwrap();
        assert_eq!(storage.size().unwrap(), 1);
    }

    #[test]
    fn test_file_storage() {
        let path = std::env::temp_dir().join(std::format!(
            "snapfs-journal-{}.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let storage = FileJournalStorage::open(&path).unwrap();
            storage.write(0, b"hello").unwrap();
            storage.flush().unwrap();
        }
        let storage = FileJournalStorage::open(&path).unwrap();
        assert_eq!(storage.size().unwrap(), 5);
        let mut buf = [0u8; 5];
        storage.read(0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        storage.truncate(0).unwrap();
        assert_eq!(storage.size().unwrap(), 0);

        let _ = std::fs::remove_file(&path);
    }
}
