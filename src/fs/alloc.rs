use super::{
    error::{FsError, Result},
    types::BlockId,
    BLOCK_SIZE,
};
use bitvec::{order::Lsb0, vec::BitVec};

/// Hands out and takes back identifiers of the simulated block device.
pub trait BlockAllocator {
    fn allocate_block(&mut self) -> Result<BlockId>;

    fn free_block(&mut self, block: BlockId);

    /// Marks a block recorded in a loaded table as in use.
    fn reserve_block(&mut self, block: BlockId) -> Result<()>;

    fn used_blocks(&self) -> u64;

    fn free_blocks(&self) -> u64;
}

/// One bit per block, lowest free block first.
#[derive(Debug, Clone)]
pub struct BitmapAllocator {
    bitmap: BitVec<u8, Lsb0>,
}

impl BitmapAllocator {
    pub fn new(block_count: usize) -> Self {
        Self {
            bitmap: BitVec::repeat(false, block_count),
        }
    }

    /// Enough blocks to cover `bytes`, at least one.
    pub fn with_disk_size(bytes: u64) -> Self {
        let count = (bytes / BLOCK_SIZE as u64).max(1);
        Self::new(count as usize)
    }

    pub fn block_count(&self) -> usize {
        self.bitmap.len()
    }

    pub fn is_used(&self, block: BlockId) -> bool {
        self.bitmap
            .get(block as usize)
            .map(|bit| *bit)
            .unwrap_or(false)
    }
}

impl BlockAllocator for BitmapAllocator {
    fn allocate_block(&mut self) -> Result<BlockId> {
        let block = self.bitmap.first_zero().ok_or_else(|| {
            FsError::AllocationFailure(format!(
                "all {} blocks are in use",
                self.bitmap.len()
            ))
        })?;
        self.bitmap.set(block, true);

        Ok(block as BlockId)
    }

    fn free_block(&mut self, block: BlockId) {
        if (block as usize) < self.bitmap.len() {
            self.bitmap.set(block as usize, false);
        } else {
            log::warn!("ignoring free of unknown block {}", block);
        }
    }

    fn reserve_block(&mut self, block: BlockId) -> Result<()> {
        if block as usize >= self.bitmap.len() {
            return Err(FsError::Corrupt(format!(
                "block {} is outside the {} block device",
                block,
                self.bitmap.len()
            )));
        }
        if self.is_used(block) {
            return Err(FsError::Corrupt(format!(
                "block {} is owned by more than one file",
                block
            )));
        }
        self.bitmap.set(block as usize, true);

        Ok(())
    }

    fn used_blocks(&self) -> u64 {
        self.bitmap.count_ones() as u64
    }

    fn free_blocks(&self) -> u64 {
        self.bitmap.count_zeros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_free_block() -> anyhow::Result<()> {
        let mut alloc = BitmapAllocator::new(8);
        assert_eq!(alloc.allocate_block()?, 0);
        assert_eq!(alloc.allocate_block()?, 1);
        assert_eq!(alloc.allocate_block()?, 2);

        alloc.free_block(1);
        assert!(!alloc.is_used(1));
        assert_eq!(alloc.allocate_block()?, 1);
        assert_eq!(alloc.used_blocks(), 3);
        assert_eq!(alloc.free_blocks(), 5);

        Ok(())
    }

    #[test]
    fn exhausted_pool() -> anyhow::Result<()> {
        let mut alloc = BitmapAllocator::new(2);
        alloc.allocate_block()?;
        alloc.allocate_block()?;

        assert!(matches!(
            alloc.allocate_block(),
            Err(FsError::AllocationFailure(_))
        ));
        assert_eq!(alloc.free_blocks(), 0);

        Ok(())
    }

    #[test]
    fn reserve_rejects_shared_and_foreign_blocks() -> anyhow::Result<()> {
        let mut alloc = BitmapAllocator::new(4);
        alloc.reserve_block(2)?;
        assert!(alloc.is_used(2));

        assert!(matches!(alloc.reserve_block(2), Err(FsError::Corrupt(_))));
        assert!(matches!(alloc.reserve_block(4), Err(FsError::Corrupt(_))));
        assert_eq!(alloc.allocate_block()?, 0);

        Ok(())
    }

    #[test]
    fn disk_size_rounds_down_to_whole_blocks() {
        assert_eq!(BitmapAllocator::with_disk_size(16 * 1024 * 1024).block_count(), 4096);
        assert_eq!(BitmapAllocator::with_disk_size(4096 + 100).block_count(), 1);
        assert_eq!(BitmapAllocator::with_disk_size(0).block_count(), 1);
    }
}
