// snapfs scripted session
//
// Runs a fixed sequence of operations against a journaled filesystem and
// prints each listing. Set RUST_LOG=debug to see journal traffic.

use std::sync::Arc;

use snapfs::{FileSystem, FsError, MemJournalStorage};

fn ls(fs: &FileSystem, path: &str) -> Result<(), FsError> {
    println!("{}: {:?}", path, fs.ls(path)?);
    Ok(())
}

fn main() -> Result<(), FsError> {
    env_logger::init();

    let storage = Arc::new(MemJournalStorage::new());
    let mut fs = FileSystem::open(storage.clone())?;
    fs.initialize()?;
    fs.replay()?;

    fs.mkdir("/root", "dir1")?;
    fs.touch("/root/dir1", "file1")?;

    fs.create_snapshot();

    fs.mkdir("/root", "dir2")?;
    fs.touch("/root/dir2", "file2")?;
    ls(&fs, "/root")?;

    fs.restore_snapshot()?;
    ls(&fs, "/root")?;

    fs.create_directory_snapshot("/root/dir1")?;
    fs.touch("/root/dir1", "file2")?;
    ls(&fs, "/root/dir1")?;

    fs.restore_directory_snapshot("/root/dir1")?;
    ls(&fs, "/root/dir1")?;

    match fs.check_consistency() {
        Ok(()) => println!("consistency check passed"),
        Err(e) => println!("consistency check failed: {}", e),
    }
    println!("{}", fs.statfs());

    // The journal outlives the instance; reopening rebuilds the tree from it.
    drop(fs);
    let reopened = FileSystem::open(storage)?;
    println!("after restart:\n{}", reopened.dump()?);
    Ok(())
}
