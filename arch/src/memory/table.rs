use std::sync::Mutex;

pub const BLOCK_LENGTH_WORDS: usize = 1024;
pub const BLOCK_TABLE_LENGTH: usize = 1024;
/// Bytes one table can address.
pub const TABLE_CAPACITY_BYTES: u64 = (BLOCK_LENGTH_WORDS * BLOCK_TABLE_LENGTH * 4) as u64;

/// Sparse word store: a table of blocks allocated on first write.
#[derive(Debug)]
pub struct BlockTable<T> {
    blocks: Mutex<Vec<Option<Box<[T]>>>>,
}

impl<T: Clone + Default> Default for BlockTable<T> {
    fn default() -> Self {
        Self::new(BLOCK_TABLE_LENGTH)
    }
}

impl<T: Clone + Default> BlockTable<T> {
    pub fn new(blocks: usize) -> Self {
        Self {
            blocks: Mutex::new(vec![None; blocks]),
        }
    }

    /// Word at `index`; never-written words read as the default value.
    pub fn fetch(&self, index: usize) -> T {
        let (block, offset) = Self::split(index);
        let blocks = self.lock();
        blocks
            .get(block)
            .and_then(|b| b.as_ref())
            .map(|b| b[offset].clone())
            .unwrap_or_default()
    }

    /// Stores `value` and returns the previous word.
    pub fn store(&self, index: usize, value: T) -> T {
        let (block, offset) = Self::split(index);
        let mut blocks = self.lock();
        let Some(slot) = blocks.get_mut(block) else {
            return T::default();
        };
        let block = slot.get_or_insert_with(|| vec![T::default(); BLOCK_LENGTH_WORDS].into_boxed_slice());
        std::mem::replace(&mut block[offset], value)
    }

    pub fn allocated_blocks(&self) -> usize {
        self.lock().iter().filter(|b| b.is_some()).count()
    }

    pub fn clear(&self) {
        self.lock().iter_mut().for_each(|b| *b = None);
    }

    fn split(index: usize) -> (usize, usize) {
        (index / BLOCK_LENGTH_WORDS, index % BLOCK_LENGTH_WORDS)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Option<Box<[T]>>>> {
        self.blocks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_blocks() {
        let table: BlockTable<i32> = BlockTable::default();
        assert_eq!(table.fetch(5000), 0);
        assert_eq!(table.allocated_blocks(), 0);
        assert_eq!(table.store(5000, 7), 0);
        assert_eq!(table.store(5000, 8), 7);
        assert_eq!(table.fetch(5000), 8);
        assert_eq!(table.allocated_blocks(), 1);
        table.clear();
        assert_eq!(table.fetch(5000), 0);
    }

    #[test]
    fn out_of_table_is_ignored() {
        let table: BlockTable<i32> = BlockTable::new(1);
        table.store(BLOCK_LENGTH_WORDS, 1);
        assert_eq!(table.fetch(BLOCK_LENGTH_WORDS), 0);
    }
}
