//! Segmented, sparsely allocated 32-bit address space.

pub mod config;
pub mod observer;
pub mod table;

use std::ops::RangeInclusive;
use std::sync::Arc;

use strum::Display;

use crate::error::SimError;
use crate::statement::ProgramStatement;
pub use config::{Layout, MemoryConfiguration};
pub use observer::{AccessKind, Callback, MemoryAccessNotice, ObserverId};
use observer::Observers;
use table::{BlockTable, TABLE_CAPACITY_BYTES};

const MMIO_BLOCKS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Segment {
    Text,
    Data,
    Stack,
    KernelText,
    KernelData,
    Mmio,
}

impl Segment {
    pub fn is_text(self) -> bool {
        matches!(self, Segment::Text | Segment::KernelText)
    }
}

/// Address window `[low, high)` mapped onto a block table.
#[derive(Debug, Clone, Copy)]
struct Region {
    segment: Segment,
    low: u32,
    high: u64,
    /// Word-aligned origin; the stack indexes downward from it.
    origin: u32,
    downward: bool,
}

impl Region {
    fn upward(segment: Segment, base: u32, limit: u32, capacity: u64) -> Self {
        let high = (limit as u64).min(base as u64 + capacity).max(base as u64);
        Self {
            segment,
            low: base,
            high,
            origin: base,
            downward: false,
        }
    }

    fn downward(segment: Segment, base: u32, limit: u32) -> Self {
        let floor = (base as u64).saturating_sub(TABLE_CAPACITY_BYTES).max(limit as u64);
        Self {
            segment,
            low: ((floor + 4) & !3).min(u32::MAX as u64) as u32,
            high: base as u64 + 4,
            origin: base & !3,
            downward: true,
        }
    }

    fn contains(&self, addr: u32) -> bool {
        addr >= self.low && (addr as u64) < self.high
    }

    fn index(&self, addr: u32) -> usize {
        let word = addr & !3;
        let offset = if self.downward {
            self.origin.wrapping_sub(word)
        } else {
            word.wrapping_sub(self.origin)
        };
        (offset / 4) as usize
    }
}

pub struct Memory {
    config: MemoryConfiguration,
    pub big_endian: bool,
    pub self_modifying_code: bool,
    regions: Vec<Region>,
    data: BlockTable<i32>,
    stack: BlockTable<i32>,
    kernel_data: BlockTable<i32>,
    mmio: BlockTable<i32>,
    text: BlockTable<Option<Arc<ProgramStatement>>>,
    kernel_text: BlockTable<Option<Arc<ProgramStatement>>>,
    heap: u32,
    observers: Observers,
}

impl Memory {
    pub fn new(config: MemoryConfiguration) -> Self {
        let c = &config;
        // Probe order decides which table owns addresses where two
        // configured windows overlap.
        let regions = vec![
            Region::upward(Segment::Data, c.data_segment_base, c.data_segment_limit, TABLE_CAPACITY_BYTES),
            Region::downward(Segment::Stack, c.stack_base, c.stack_limit),
            Region::upward(Segment::Text, c.text_base, c.text_limit, TABLE_CAPACITY_BYTES),
            Region::upward(Segment::Mmio, c.mmio_base, c.mmio_limit, (MMIO_BLOCKS * 4096) as u64),
            Region::upward(Segment::KernelData, c.kernel_data_base, c.kernel_data_limit, TABLE_CAPACITY_BYTES),
            Region::upward(Segment::KernelText, c.kernel_text_base, c.kernel_text_limit, TABLE_CAPACITY_BYTES),
        ];
        let heap = c.heap_base;
        Self {
            config,
            big_endian: false,
            self_modifying_code: false,
            regions,
            data: BlockTable::default(),
            stack: BlockTable::default(),
            kernel_data: BlockTable::default(),
            mmio: BlockTable::new(MMIO_BLOCKS),
            text: BlockTable::default(),
            kernel_text: BlockTable::default(),
            heap,
            observers: Observers::default(),
        }
    }

    pub fn config(&self) -> &MemoryConfiguration {
        &self.config
    }

    /// Drops every stored word and statement and resets the heap.
    pub fn clear(&mut self) {
        for table in [&self.data, &self.stack, &self.kernel_data, &self.mmio] {
            table.clear();
        }
        self.text.clear();
        self.kernel_text.clear();
        self.heap = self.config.heap_base;
    }

    fn region(&self, addr: u32) -> Option<Region> {
        self.regions.iter().find(|r| r.contains(addr)).copied()
    }

    pub fn segment(&self, addr: u32) -> Option<Segment> {
        self.region(addr).map(|r| r.segment)
    }

    pub fn in_text_segment(&self, addr: u32) -> bool {
        self.segment(addr) == Some(Segment::Text)
    }

    pub fn in_kernel_text_segment(&self, addr: u32) -> bool {
        self.segment(addr) == Some(Segment::KernelText)
    }

    pub fn in_data_segment(&self, addr: u32) -> bool {
        matches!(self.segment(addr), Some(Segment::Data | Segment::Stack))
    }

    pub fn in_kernel_data_segment(&self, addr: u32) -> bool {
        self.segment(addr) == Some(Segment::KernelData)
    }

    pub fn in_mmio_segment(&self, addr: u32) -> bool {
        self.segment(addr) == Some(Segment::Mmio)
    }

    /// First address past the user data table.
    pub fn data_segment_limit(&self) -> u64 {
        self.regions[0].high
    }

    fn words(&self, segment: Segment) -> Option<&BlockTable<i32>> {
        match segment {
            Segment::Data => Some(&self.data),
            Segment::Stack => Some(&self.stack),
            Segment::KernelData => Some(&self.kernel_data),
            Segment::Mmio => Some(&self.mmio),
            Segment::Text | Segment::KernelText => None,
        }
    }

    fn statements(&self, segment: Segment) -> Option<&BlockTable<Option<Arc<ProgramStatement>>>> {
        match segment {
            Segment::Text => Some(&self.text),
            Segment::KernelText => Some(&self.kernel_text),
            _ => None,
        }
    }

    /// Bit position of the `length`-byte item at `addr` inside its word.
    fn shift(&self, addr: u32, length: u32) -> u32 {
        let offset = addr & 3;
        if self.big_endian {
            8 * (4 - length - offset)
        } else {
            8 * offset
        }
    }

    fn item_mask(length: u32) -> u32 {
        match length {
            4 => u32::MAX,
            n => (1u32 << (8 * n)) - 1,
        }
    }

    fn fetch_word(&self, region: Region, addr: u32, load_error: fn(u32) -> SimError) -> Result<i32, SimError> {
        if let Some(table) = self.words(region.segment) {
            return Ok(table.fetch(region.index(addr)));
        }
        if !self.self_modifying_code {
            return Err(load_error(addr));
        }
        let table = self.statements(region.segment).ok_or(load_error(addr))?;
        Ok(table.fetch(region.index(addr)).map(|s| s.binary as i32).unwrap_or(0))
    }

    fn read(&self, addr: u32, length: u32, notify: bool) -> Result<i32, SimError> {
        if addr % length != 0 {
            return Err(SimError::AddressLoad(addr));
        }
        let region = self.region(addr).ok_or(SimError::AddressLoad(addr))?;
        let word = self.fetch_word(region, addr, SimError::AddressLoad)?;
        let value = if length == 4 {
            word
        } else {
            ((word as u32 >> self.shift(addr, length)) & Self::item_mask(length)) as i32
        };
        if notify {
            self.observers.notify(MemoryAccessNotice {
                kind: AccessKind::Read,
                address: addr,
                length,
                value,
            });
        }
        Ok(value)
    }

    fn write(&self, addr: u32, value: i32, length: u32, notify: bool) -> Result<i32, SimError> {
        if addr % length != 0 {
            return Err(SimError::AddressStore(addr));
        }
        let region = self.region(addr).ok_or(SimError::AddressStore(addr))?;
        let old_word = self.fetch_word(region, addr, SimError::TextWrite)?;
        let (word, old) = if length == 4 {
            (value, old_word)
        } else {
            let shift = self.shift(addr, length);
            let mask = Self::item_mask(length) << shift;
            let merged = (old_word as u32 & !mask) | ((value as u32) << shift & mask);
            (merged as i32, ((old_word as u32 & mask) >> shift) as i32)
        };
        match self.words(region.segment) {
            Some(table) => {
                table.store(region.index(addr), word);
            }
            None => {
                let statement = ProgramStatement::from_binary(word as u32, addr & !3).map(Arc::new);
                if let Some(table) = self.statements(region.segment) {
                    table.store(region.index(addr), statement);
                }
            }
        }
        if notify {
            self.observers.notify(MemoryAccessNotice {
                kind: AccessKind::Write,
                address: addr,
                length,
                value,
            });
        }
        Ok(old)
    }

    pub fn get_word(&self, addr: u32) -> Result<i32, SimError> {
        self.read(addr, 4, true)
    }

    /// Zero-extended halfword.
    pub fn get_half(&self, addr: u32) -> Result<i32, SimError> {
        self.read(addr, 2, true)
    }

    /// Zero-extended byte.
    pub fn get_byte(&self, addr: u32) -> Result<i32, SimError> {
        self.read(addr, 1, true)
    }

    /// Reads without telling observers, for displays and dumps.
    pub fn get_word_no_notify(&self, addr: u32) -> Result<i32, SimError> {
        self.read(addr, 4, false)
    }

    pub fn get_byte_no_notify(&self, addr: u32) -> Result<i32, SimError> {
        self.read(addr, 1, false)
    }

    pub fn set_word(&self, addr: u32, value: i32) -> Result<i32, SimError> {
        self.write(addr, value, 4, true)
    }

    pub fn set_half(&self, addr: u32, value: i32) -> Result<i32, SimError> {
        self.write(addr, value, 2, true)
    }

    pub fn set_byte(&self, addr: u32, value: i32) -> Result<i32, SimError> {
        self.write(addr, value, 1, true)
    }

    /// Stores without telling observers; devices use this for their own
    /// registers.
    pub fn set_word_no_notify(&self, addr: u32, value: i32) -> Result<i32, SimError> {
        self.write(addr, value, 4, false)
    }

    /// Low word first, at `addr`.
    pub fn set_double(&self, addr: u32, value: f64) -> Result<(), SimError> {
        let (high, low) = crate::bits::double_to_words(value);
        self.set_word(addr.wrapping_add(4), high)?;
        self.set_word(addr, low)?;
        Ok(())
    }

    pub fn get_double(&self, addr: u32) -> Result<f64, SimError> {
        let low = self.get_word(addr)?;
        let high = self.get_word(addr.wrapping_add(4))?;
        Ok(crate::bits::words_to_double(high, low))
    }

    fn text_slot(&self, addr: u32, error: fn(u32) -> SimError) -> Result<(Region, &BlockTable<Option<Arc<ProgramStatement>>>), SimError> {
        if addr % 4 != 0 {
            return Err(error(addr));
        }
        let region = self.region(addr).ok_or(error(addr))?;
        let table = self.statements(region.segment).ok_or(error(addr))?;
        Ok((region, table))
    }

    /// Instruction fetch. `Ok(None)` means nothing was assembled there.
    pub fn get_statement(&self, addr: u32) -> Result<Option<Arc<ProgramStatement>>, SimError> {
        let statement = self.get_statement_no_notify(addr)?;
        self.observers.notify(MemoryAccessNotice {
            kind: AccessKind::Read,
            address: addr,
            length: 4,
            value: statement.as_ref().map(|s| s.binary as i32).unwrap_or(0),
        });
        Ok(statement)
    }

    pub fn get_statement_no_notify(&self, addr: u32) -> Result<Option<Arc<ProgramStatement>>, SimError> {
        let (region, table) = self.text_slot(addr, SimError::AddressFetch)?;
        Ok(table.fetch(region.index(addr)))
    }

    /// Places assembled code. Only text segments hold statements.
    pub fn set_statement(&self, addr: u32, statement: ProgramStatement) -> Result<(), SimError> {
        let (region, table) = self.text_slot(addr, SimError::AddressStore)?;
        table.store(region.index(addr), Some(Arc::new(statement)));
        Ok(())
    }

    /// Bump allocation for `sbrk`. Returns the start of the new block.
    pub fn allocate_bytes_from_heap(&mut self, bytes: i32) -> Result<u32, SimError> {
        if bytes < 0 {
            return Err(SimError::Syscall(format!("request ({bytes}) is negative heap amount")));
        }
        let start = self.heap;
        let end = (start as u64 + bytes as u64 + 3) & !3;
        if end >= self.data_segment_limit() {
            return Err(SimError::Syscall(format!("request ({bytes}) exceeds available heap storage")));
        }
        self.heap = end as u32;
        Ok(start)
    }

    pub fn heap_address(&self) -> u32 {
        self.heap
    }

    pub fn add_observer(&self, range: RangeInclusive<u32>, callback: Callback) -> ObserverId {
        self.observers.add(range, callback)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    pub fn clear_observers(&self) {
        self.observers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn memory() -> Memory {
        Memory::new(MemoryConfiguration::default())
    }

    #[test]
    fn word_half_byte() {
        let mem = memory();
        mem.set_word(0x1001_0000, 0x1234_5678).unwrap();
        assert_eq!(mem.get_byte(0x1001_0000).unwrap(), 0x78);
        assert_eq!(mem.get_byte(0x1001_0003).unwrap(), 0x12);
        assert_eq!(mem.get_half(0x1001_0002).unwrap(), 0x1234);
        mem.set_byte(0x1001_0001, 0xAB).unwrap();
        assert_eq!(mem.get_word(0x1001_0000).unwrap(), 0x1234_AB78);
    }

    #[test]
    fn big_endian_bytes() {
        let mut mem = memory();
        mem.big_endian = true;
        mem.set_word(0x1001_0000, 0x1234_5678).unwrap();
        assert_eq!(mem.get_byte(0x1001_0000).unwrap(), 0x12);
        assert_eq!(mem.get_half(0x1001_0002).unwrap(), 0x5678);
    }

    #[test]
    fn bounds_and_alignment() {
        let mem = memory();
        let limit = mem.data_segment_limit() as u32;
        assert_eq!(limit, 0x1040_0000);
        assert!(mem.set_byte(limit - 1, 1).is_ok());
        assert_eq!(mem.get_byte(limit), Err(SimError::AddressLoad(limit)));
        assert_eq!(mem.set_byte(limit, 1), Err(SimError::AddressStore(limit)));
        assert_eq!(mem.get_word(0x1001_0002), Err(SimError::AddressLoad(0x1001_0002)));
        assert_eq!(mem.set_half(0x1001_0001, 0), Err(SimError::AddressStore(0x1001_0001)));
    }

    #[test]
    fn stack_grows_down() {
        let mem = memory();
        let sp = mem.config().stack_pointer;
        mem.set_word(sp, -5).unwrap();
        mem.set_word(sp - 4, 9).unwrap();
        assert_eq!(mem.get_word(sp).unwrap(), -5);
        assert_eq!(mem.get_word(sp - 4).unwrap(), 9);
        assert_eq!(mem.segment(sp), Some(Segment::Stack));
        assert_eq!(mem.get_byte(0x7FFF_FFFF).unwrap(), 0);
    }

    #[test]
    fn text_is_read_only() {
        let mem = memory();
        assert_eq!(mem.set_word(0x0040_0000, 0), Err(SimError::TextWrite(0x0040_0000)));
        assert_eq!(mem.get_word(0x0040_0000), Err(SimError::AddressLoad(0x0040_0000)));
    }

    #[test]
    fn self_modifying_code_decodes() {
        let mut mem = memory();
        mem.self_modifying_code = true;
        // addi $t0,$zero,5
        mem.set_word(0x0040_0000, 0x2008_0005).unwrap();
        let statement = mem.get_statement(0x0040_0000).unwrap().unwrap();
        assert_eq!(statement.instruction.mnemonic, "addi");
        assert_eq!(mem.get_word(0x0040_0000).unwrap(), 0x2008_0005);
        assert!(mem.get_statement(0x0040_0004).unwrap().is_none());
        assert_eq!(mem.get_statement(0x1001_0000), Err(SimError::AddressFetch(0x1001_0000)));
    }

    #[test]
    fn heap_allocation_word_aligns() {
        let mut mem = memory();
        let first = mem.allocate_bytes_from_heap(5).unwrap();
        let second = mem.allocate_bytes_from_heap(4).unwrap();
        assert_eq!(first, 0x1004_0000);
        assert_eq!(second, 0x1004_0008);
        assert!(mem.allocate_bytes_from_heap(-1).is_err());
        assert!(mem.allocate_bytes_from_heap(0x0100_0000).is_err());
    }

    #[test]
    fn observers_see_accesses() {
        let mem = memory();
        let seen = Arc::new(Mutex::new(vec![]));
        let log = seen.clone();
        let id = mem.add_observer(
            0xFFFF_0000..=0xFFFF_000F,
            Arc::new(move |n: &MemoryAccessNotice| log.lock().unwrap().push((n.kind, n.address, n.value))),
        );
        mem.set_word(0xFFFF_000C, 65).unwrap();
        mem.get_word(0xFFFF_000C).unwrap();
        mem.get_word_no_notify(0xFFFF_000C).unwrap();
        mem.set_word(0x1001_0000, 1).unwrap();
        assert!(mem.remove_observer(id));
        mem.set_word(0xFFFF_000C, 66).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(AccessKind::Write, 0xFFFF_000C, 65), (AccessKind::Read, 0xFFFF_000C, 65)]
        );
    }

    #[test]
    fn kernel_segments() {
        let mem = memory();
        assert_eq!(mem.segment(0x8000_0180), Some(Segment::KernelText));
        assert_eq!(mem.segment(0x9000_0000), Some(Segment::KernelData));
        assert_eq!(mem.segment(0xFFFF_0004), Some(Segment::Mmio));
        assert_eq!(mem.segment(0x0000_0000), None);
    }
}
