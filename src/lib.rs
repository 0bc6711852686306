//! An in-memory tree of directory and file inodes on a simulated block
//! device, persisted to a binary master file table.

pub mod fs;
pub mod mkfs;

pub use crate::fs::{
    BitmapAllocator, BlockAllocator, BlockId, FileSystem, FsError, Inode, InodeId, InodeKind,
    Result, BLOCK_SIZE,
};
