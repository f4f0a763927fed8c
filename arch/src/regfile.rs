use crate::bits;
use crate::error::SimError;
use crate::reg::{cop0, Reg};

/// General purpose registers plus HI, LO and the program counter.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    regs: [i32; 32],
    hi: i32,
    lo: i32,
    pc: u32,
    initial_pc: u32,
}

impl RegisterFile {
    pub fn new(text_base: u32, stack_pointer: u32, global_pointer: u32) -> Self {
        let mut file = Self {
            regs: [0; 32],
            hi: 0,
            lo: 0,
            pc: text_base,
            initial_pc: text_base,
        };
        file.regs[Reg::SP.num()] = stack_pointer as i32;
        file.regs[Reg::GP.num()] = global_pointer as i32;
        file
    }

    pub fn get(&self, reg: impl Into<usize>) -> i32 {
        self.regs[reg.into() & 0x1F]
    }

    /// Writes to `$zero` are dropped.
    pub fn set(&mut self, reg: impl Into<usize>, value: i32) -> i32 {
        let n = reg.into() & 0x1F;
        let old = self.regs[n];
        if n != 0 {
            self.regs[n] = value;
        }
        old
    }

    pub fn hi(&self) -> i32 {
        self.hi
    }

    pub fn lo(&self) -> i32 {
        self.lo
    }

    pub fn set_hi(&mut self, value: i32) {
        self.hi = value;
    }

    pub fn set_lo(&mut self, value: i32) {
        self.lo = value;
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, value: u32) -> u32 {
        std::mem::replace(&mut self.pc, value)
    }

    pub fn initial_pc(&self) -> u32 {
        self.initial_pc
    }

    /// Moves the entry point, e.g. to a global `main`.
    pub fn set_initial_pc(&mut self, value: u32) {
        self.initial_pc = value;
        self.pc = value;
    }

    pub fn increment_pc(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    pub fn snapshot(&self) -> [i32; 32] {
        self.regs
    }
}

impl From<Reg> for usize {
    fn from(reg: Reg) -> usize {
        reg.num()
    }
}

/// System control coprocessor: only the registers exceptions use.
#[derive(Debug, Clone)]
pub struct Coprocessor0 {
    regs: [i32; 32],
}

impl Default for Coprocessor0 {
    fn default() -> Self {
        let mut regs = [0; 32];
        regs[cop0::STATUS] = cop0::STATUS_DEFAULT;
        Self { regs }
    }
}

impl Coprocessor0 {
    pub fn get(&self, n: usize) -> i32 {
        self.regs[n & 0x1F]
    }

    pub fn set(&mut self, n: usize, value: i32) {
        self.regs[n & 0x1F] = value;
    }

    pub fn exception_level(&self) -> bool {
        bits::bit(self.regs[cop0::STATUS], cop0::STATUS_EXL)
    }

    pub fn interrupts_enabled(&self) -> bool {
        bits::bit(self.regs[cop0::STATUS], cop0::STATUS_IE)
    }
}

/// Floating point coprocessor: 32 single registers, paired for doubles, plus
/// eight condition flags.
#[derive(Debug, Clone, Default)]
pub struct Coprocessor1 {
    regs: [i32; 32],
    flags: u8,
}

impl Coprocessor1 {
    pub fn get_bits(&self, n: usize) -> i32 {
        self.regs[n & 0x1F]
    }

    pub fn set_bits(&mut self, n: usize, value: i32) {
        self.regs[n & 0x1F] = value;
    }

    pub fn get_float(&self, n: usize) -> f32 {
        f32::from_bits(self.get_bits(n) as u32)
    }

    pub fn set_float(&mut self, n: usize, value: f32) {
        self.set_bits(n, value.to_bits() as i32);
    }

    /// Doubles live in an even/odd pair; the odd register holds the high word.
    pub fn get_double(&self, n: usize) -> Result<f64, SimError> {
        Self::check_even(n)?;
        Ok(bits::words_to_double(self.regs[n + 1], self.regs[n]))
    }

    pub fn set_double(&mut self, n: usize, value: f64) -> Result<(), SimError> {
        Self::check_even(n)?;
        let (high, low) = bits::double_to_words(value);
        self.regs[n] = low;
        self.regs[n + 1] = high;
        Ok(())
    }

    pub fn flag(&self, cc: usize) -> bool {
        self.flags & (1 << (cc & 7)) != 0
    }

    pub fn set_flag(&mut self, cc: usize, value: bool) {
        if value {
            self.flags |= 1 << (cc & 7);
        } else {
            self.flags &= !(1 << (cc & 7));
        }
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    fn check_even(n: usize) -> Result<(), SimError> {
        if n % 2 != 0 || n >= 32 {
            return Err(SimError::InvalidRegister(format!(
                "$f{n}: double precision operands must be even-numbered registers"
            )));
        }
        Ok(())
    }
}
