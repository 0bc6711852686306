//! The master file table format.
//!
//! One record per node, written depth-first in pre-order. All integers are
//! little-endian; `int32` fields take 4 bytes and `size_t` fields 8.
//!
//! ```text
//! record(node):
//!   int32  id
//!   int32  name_len               name length including a trailing NUL
//!   bytes  name[name_len]
//!   byte   is_directory           0 = file, 1 = directory
//!   directory:
//!     int32  num_children
//!     size_t child_id[num_children]
//!     record(child)...            same order as child_id
//!   file:
//!     int32  filesize
//!     int32  num_blocks
//!     size_t block_id[num_blocks]
//! ```
//!
//! The `child_id` table is never used to rebuild the tree; only the records
//! that follow it are.

use super::{
    alloc::BlockAllocator,
    error::{FsError, Result},
    tree::FileSystem,
    types::{BlockId, Inode, InodeId},
    util, ROOT_NAME,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

const FILE_TAG: u8 = 0;
const DIRECTORY_TAG: u8 = 1;

// Bounds the name buffer of a single record, terminator included.
const MAX_RECORD_NAME_LEN: usize = 64 * 1024;

#[derive(Serialize, Deserialize, Debug)]
struct RecordHead {
    id: u32,
    name_len: i32,
}

#[derive(Serialize, Deserialize, Debug)]
struct FileTail {
    filesize: i32,
    num_blocks: i32,
}

struct Record {
    inode: Inode,
    num_children: u32,
    child_table: Vec<u64>,
}

// A directory whose child records are still being read.
struct Frame {
    id: InodeId,
    remaining: u32,
    child_table: Vec<u64>,
    names: HashSet<String>,
}

impl<A: BlockAllocator> FileSystem<A> {
    /// Writes the master file table to `path`, replacing any previous content.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if self.root.is_none() {
            return Err(FsError::InvalidParent);
        }

        let to_save_error = |source| FsError::Save {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(to_save_error)?;
        let mut buf = BufWriter::new(file);
        let count = self.encode(&mut buf).map_err(|err| match err {
            FsError::Io(source) => to_save_error(source),
            other => other,
        })?;
        buf.flush().map_err(to_save_error)?;

        log::info!("saved {} inodes to {}", count, path.display());
        Ok(())
    }

    /// Writes every node in pre-order and returns how many were written.
    pub fn encode<W: Write>(&self, mut w: W) -> Result<usize> {
        let root = self.root.ok_or(FsError::InvalidParent)?;
        let mut stack = vec![root];
        let mut written = 0;

        while let Some(id) = stack.pop() {
            let inode = self
                .inodes
                .get(&id)
                .ok_or_else(|| FsError::Corrupt(format!("dangling child id {}", id)))?;
            write_record(&mut w, inode)?;
            stack.extend(inode.children().iter().rev().copied());
            written += 1;
        }

        Ok(written)
    }

    /// Restores a session from the table at `path`. Every block recorded in
    /// the table is reserved in `allocator`, and new ids continue past the
    /// highest loaded one.
    pub fn load<P: AsRef<Path>>(path: P, allocator: A) -> Result<Self> {
        let path = path.as_ref();
        let to_load_error = |source| FsError::Load {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(to_load_error)?;
        let fs = Self::decode(BufReader::new(file), allocator).map_err(|err| match err {
            FsError::Io(source) => to_load_error(source),
            other => other,
        })?;

        log::info!("loaded {} inodes from {}", fs.len(), path.display());
        Ok(fs)
    }

    pub fn decode<R: Read>(mut r: R, allocator: A) -> Result<Self> {
        let mut fs = Self::new(allocator);
        let mut max_id = 0;

        let root = read_record(&mut r)?;
        if !root.inode.is_directory() || root.inode.name != ROOT_NAME {
            return Err(FsError::Corrupt(format!(
                "root must be a directory named {:?}, found {:?}",
                ROOT_NAME, root.inode.name
            )));
        }
        let root_id = root.inode.id;
        fs.root = Some(root_id);
        let mut stack = Vec::new();
        push_frame(&mut stack, root_id, root.num_children, root.child_table);
        fs.adopt(root.inode, &mut max_id)?;

        while let Some(frame) = stack.last_mut() {
            if frame.remaining == 0 {
                if let Some(done) = stack.pop() {
                    fs.check_child_table(&done);
                }
                continue;
            }
            frame.remaining -= 1;
            let parent = frame.id;

            let child = read_record(&mut r)?;
            if !frame.names.insert(child.inode.name.clone()) {
                return Err(FsError::Corrupt(format!(
                    "directory {} holds {:?} twice",
                    parent, child.inode.name
                )));
            }

            let child_id = child.inode.id;
            push_frame(&mut stack, child_id, child.num_children, child.child_table);
            fs.adopt(child.inode, &mut max_id)?;
            fs.attach(parent, child_id);
        }

        let mut trailing = [0u8; 1];
        if r.read(&mut trailing)? != 0 {
            return Err(FsError::Corrupt("trailing bytes after the root record".into()));
        }

        fs.next_id = max_id as u64 + 1;
        Ok(fs)
    }

    fn adopt(&mut self, inode: Inode, max_id: &mut InodeId) -> Result<()> {
        if self.inodes.contains_key(&inode.id) {
            return Err(FsError::Corrupt(format!("inode id {} is used twice", inode.id)));
        }
        for &block in inode.blocks() {
            self.allocator.reserve_block(block)?;
        }

        *max_id = (*max_id).max(inode.id);
        self.inodes.insert(inode.id, inode);
        Ok(())
    }

    fn check_child_table(&self, frame: &Frame) {
        let children = self
            .inodes
            .get(&frame.id)
            .map(|inode| inode.children())
            .unwrap_or(&[]);
        let matches = children.len() == frame.child_table.len()
            && children
                .iter()
                .zip(&frame.child_table)
                .all(|(&child, &listed)| child as u64 == listed);
        if !matches {
            log::warn!(
                "child id table of directory {} does not match its records",
                frame.id
            );
        }
    }
}

fn push_frame(stack: &mut Vec<Frame>, id: InodeId, remaining: u32, child_table: Vec<u64>) {
    if remaining > 0 {
        stack.push(Frame {
            id,
            remaining,
            child_table,
            names: HashSet::with_capacity(remaining.min(1024) as usize),
        });
    }
}

fn write_record<W: Write>(w: &mut W, inode: &Inode) -> Result<()> {
    let mut name = Vec::with_capacity(inode.name.len() + 1);
    name.extend_from_slice(inode.name.as_bytes());
    name.push(0);

    let head = RecordHead {
        id: inode.id,
        name_len: name.len() as i32,
    };
    bincode::serialize_into(&mut *w, &head)?;
    w.write_all(&name)?;

    if inode.is_directory() {
        let children = inode.children();
        bincode::serialize_into(&mut *w, &DIRECTORY_TAG)?;
        bincode::serialize_into(&mut *w, &(children.len() as i32))?;
        for &child in children {
            bincode::serialize_into(&mut *w, &(child as u64))?;
        }
    } else {
        let blocks = inode.blocks();
        let tail = FileTail {
            filesize: inode.filesize() as i32,
            num_blocks: blocks.len() as i32,
        };
        bincode::serialize_into(&mut *w, &FILE_TAG)?;
        bincode::serialize_into(&mut *w, &tail)?;
        for &block in blocks {
            bincode::serialize_into(&mut *w, &block)?;
        }
    }

    Ok(())
}

fn read_record<R: Read>(r: &mut R) -> Result<Record> {
    let head: RecordHead = bincode::deserialize_from(&mut *r)?;
    if head.name_len < 2 || head.name_len as usize > MAX_RECORD_NAME_LEN {
        return Err(FsError::Corrupt(format!(
            "inode {} has a name length of {}",
            head.id, head.name_len
        )));
    }

    let mut name = vec![0u8; head.name_len as usize];
    read_exact(r, &mut name)?;
    if name.pop() != Some(0) || name.contains(&0) {
        return Err(FsError::Corrupt(format!(
            "name of inode {} is not NUL terminated",
            head.id
        )));
    }
    let name = String::from_utf8(name)
        .map_err(|_| FsError::Corrupt(format!("name of inode {} is not UTF-8", head.id)))?;

    let tag: u8 = bincode::deserialize_from(&mut *r)?;
    match tag {
        DIRECTORY_TAG => {
            let num_children: i32 = bincode::deserialize_from(&mut *r)?;
            let num_children = non_negative(num_children, "child count", head.id)?;
            let mut child_table = Vec::with_capacity(num_children.min(1024) as usize);
            for _ in 0..num_children {
                child_table.push(bincode::deserialize_from(&mut *r)?);
            }

            Ok(Record {
                inode: Inode::directory(head.id, &name),
                num_children,
                child_table,
            })
        }
        FILE_TAG => {
            let tail: FileTail = bincode::deserialize_from(&mut *r)?;
            let filesize = non_negative(tail.filesize, "file size", head.id)?;
            let num_blocks = non_negative(tail.num_blocks, "block count", head.id)?;
            if num_blocks as usize != util::blocks_needed(filesize) {
                return Err(FsError::Corrupt(format!(
                    "inode {} has {} blocks for {} bytes",
                    head.id, num_blocks, filesize
                )));
            }

            let mut blocks: Vec<BlockId> = Vec::with_capacity(num_blocks as usize);
            for _ in 0..num_blocks {
                blocks.push(bincode::deserialize_from(&mut *r)?);
            }

            Ok(Record {
                inode: Inode::file(head.id, &name, filesize, blocks),
                num_children: 0,
                child_table: Vec::new(),
            })
        }
        other => Err(FsError::Corrupt(format!(
            "inode {} has unknown kind {}",
            head.id, other
        ))),
    }
}

fn non_negative(value: i32, what: &str, id: InodeId) -> Result<u32> {
    if value < 0 {
        return Err(FsError::Corrupt(format!(
            "inode {} has a negative {} ({})",
            id, what, value
        )));
    }

    Ok(value as u32)
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => FsError::Corrupt("unexpected end of table".into()),
        _ => FsError::Io(err),
    })
}
