pub mod alloc;
pub mod codec;
pub mod debug;
pub mod error;
pub mod tree;
pub mod types;
pub mod util;

pub use alloc::{BitmapAllocator, BlockAllocator};
pub use error::{FsError, Result};
pub use tree::FileSystem;
pub use types::{BlockId, Inode, InodeId, InodeKind};

pub const BLOCK_SIZE: u32 = 4096;
pub const ROOT_NAME: &str = "/";
pub const MAX_NAME_LEN: usize = 255;
