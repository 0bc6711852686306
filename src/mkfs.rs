use crate::fs::{BitmapAllocator, FileSystem};
use anyhow::Context;
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

/// Writes a new master file table holding only the root directory.
pub fn make<P>(path: P) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let fs = FileSystem::with_root(BitmapAllocator::new(1))?;
    let file = create_file(path.as_ref())
        .with_context(|| format!("cannot create {}", path.as_ref().display()))?;
    let mut buf = BufWriter::new(file);

    fs.encode(&mut buf)?;
    buf.flush()?;

    log::info!("created master file table {}", path.as_ref().display());
    Ok(())
}

fn create_file<P: AsRef<Path>>(name: P) -> anyhow::Result<File> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(name)?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_has_only_root() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("table");
        make(&path)?;

        let fs = FileSystem::load(&path, BitmapAllocator::new(8))?;
        let root = fs.root().unwrap();
        assert_eq!(root, 0);
        assert_eq!(fs.len(), 1);
        assert_eq!(fs.next_inode_id(), 1);
        assert_eq!(fs.inode(root).unwrap().name(), "/");

        Ok(())
    }

    #[test]
    fn refuses_to_overwrite() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("table");
        std::fs::write(&path, b"keep")?;

        assert!(make(&path).is_err());
        assert_eq!(std::fs::read(&path)?, b"keep");
        Ok(())
    }
}
