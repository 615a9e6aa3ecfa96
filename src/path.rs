//! Path parsing and resolution from the root inode.

use alloc::{string::String, vec::Vec};

use crate::{
    block::BlockStore,
    error::{FsError, FsResult},
    inode::{Inode, InodeTable},
    MAX_NAME_LEN, ROOT_INODE, ROOT_NAME,
};

/// Split a path into its segments after the root one.
///
/// The leading `/` is optional and empty segments are skipped; the first
/// segment has to be the root name.
pub fn components(path: &str) -> FsResult<Vec<&str>> {
    let mut parts = path.split('/').filter(|p| !p.is_empty());
    match parts.next() {
        Some(ROOT_NAME) => Ok(parts.collect()),
        _ => Err(FsError::PathNotFound(String::from(path))),
    }
}

/// Render a path as `/root/a/b`.
pub fn canonical_path(path: &str) -> FsResult<String> {
    let mut out = String::from("/");
    out.push_str(ROOT_NAME);
    for part in components(path)? {
        out.push('/');
        out.push_str(part);
    }
    Ok(out)
}

/// Join a directory path and an entry name.
pub fn join(dir: &str, name: &str) -> String {
    let mut out = String::from(dir.trim_end_matches('/'));
    out.push('/');
    out.push_str(name);
    out
}

pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains('/') {
        return Err(FsError::InvalidName(String::from(name)));
    }
    Ok(())
}

/// Walk the directory indexes from the root down to `path`.
pub fn resolve<'a>(
    inodes: &'a InodeTable,
    blocks: &BlockStore,
    path: &str,
) -> FsResult<&'a Inode> {
    let mut current = inodes.lookup(ROOT_INODE)?;
    for part in components(path)? {
        if !current.is_dir {
            return Err(FsError::NotADirectory(String::from(path)));
        }
        let index = current.load_index(blocks)?;
        let number = index
            .search(part)
            .ok_or_else(|| FsError::PathNotFound(String::from(path)))?;
        current = inodes.lookup(number)?;
    }
    Ok(current)
}

/// Resolve `path` and insist that it names a directory.
pub fn resolve_dir<'a>(
    inodes: &'a InodeTable,
    blocks: &BlockStore,
    path: &str,
) -> FsResult<&'a Inode> {
    let inode = resolve(inodes, blocks, path)?;
    if !inode.is_dir {
        return Err(FsError::NotADirectory(String::from(path)));
    }
    Ok(inode)
}
