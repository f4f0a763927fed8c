use tracing::debug;

use crate::bits;
use crate::error::{cause, SimError};
use crate::memory::Memory;
use crate::reg::cop0;
use crate::regfile::{Coprocessor0, Coprocessor1, RegisterFile};
use crate::syscall::{Console, NullConsole, SyscallTable};

/// Branch target bookkeeping for delayed branching. A branch registers its
/// target, the next fetch triggers it, and the fetch after that takes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DelayedBranch {
    #[default]
    Cleared,
    Registered(u32),
    Triggered(u32),
}

impl DelayedBranch {
    pub fn register(&mut self, target: u32) {
        *self = match *self {
            DelayedBranch::Cleared => DelayedBranch::Registered(target),
            // A branch in a delay slot keeps the first target.
            other => other,
        };
    }

    /// Advances one fetch cycle, returning the target when it must be taken.
    pub fn advance(&mut self) -> Option<u32> {
        match *self {
            DelayedBranch::Cleared => None,
            DelayedBranch::Registered(target) => {
                *self = DelayedBranch::Triggered(target);
                None
            }
            DelayedBranch::Triggered(target) => {
                *self = DelayedBranch::Cleared;
                Some(target)
            }
        }
    }

    pub fn clear(&mut self) {
        *self = DelayedBranch::Cleared;
    }
}

/// Complete state of one simulated MIPS machine.
pub struct Machine {
    pub regs: RegisterFile,
    pub cop0: Coprocessor0,
    pub cop1: Coprocessor1,
    pub memory: Memory,
    pub syscalls: SyscallTable,
    pub console: Box<dyn Console>,
    pub delayed_branching: bool,
    pub branch: DelayedBranch,
    /// Cause register IP bits of interrupts not yet taken.
    pending_interrupts: u32,
}

impl Machine {
    pub fn new(memory: Memory) -> Self {
        let config = memory.config();
        let regs = RegisterFile::new(config.text_base, config.stack_pointer, config.global_pointer);
        Self {
            regs,
            cop0: Coprocessor0::default(),
            cop1: Coprocessor1::default(),
            memory,
            syscalls: SyscallTable::default(),
            console: Box::new(NullConsole),
            delayed_branching: false,
            branch: DelayedBranch::Cleared,
            pending_interrupts: 0,
        }
    }

    pub fn gpr(&self, operand: i32) -> i32 {
        self.regs.get(operand as usize)
    }

    pub fn set_gpr(&mut self, operand: i32, value: i32) {
        self.regs.set(operand as usize, value);
    }

    /// `displacement` is in words, relative to the already incremented PC.
    pub fn process_branch(&mut self, displacement: i32) {
        let target = self.regs.pc().wrapping_add((displacement << 2) as u32);
        self.process_jump(target);
    }

    pub fn process_jump(&mut self, target: u32) {
        if self.delayed_branching {
            self.branch.register(target);
        } else {
            self.regs.set_pc(target);
        }
    }

    /// Links past the delay slot when delayed branching is on.
    pub fn process_return_address(&mut self, reg: i32) {
        let link = if self.delayed_branching {
            self.regs.pc().wrapping_add(4)
        } else {
            self.regs.pc()
        };
        self.set_gpr(reg, link as i32);
    }

    /// Runs the service named by `$v0`.
    pub fn syscall(&mut self) -> Result<(), SimError> {
        let number = self.regs.get(crate::reg::Reg::V0);
        let Some(service) = self.syscalls.get(number) else {
            return Err(SimError::UnknownSyscall(number));
        };
        debug!("syscall {} ({})", number, service.name());
        service.call(self)
    }

    /// Records an exception in Coprocessor 0. `pc` is the faulting
    /// instruction's address.
    pub fn record_exception(&mut self, err: &SimError, pc: u32) {
        let Some(code) = err.cause() else {
            return;
        };
        self.set_exception_registers(code, pc);
        if let Some(addr) = err.bad_address() {
            self.cop0.set(cop0::VADDR, addr as i32);
        }
    }

    fn set_exception_registers(&mut self, code: u32, epc: u32) {
        let status = self.cop0.get(cop0::STATUS);
        self.cop0.set(cop0::STATUS, bits::set_bit(status, cop0::STATUS_EXL));
        let cause_reg = self.cop0.get(cop0::CAUSE);
        self.cop0.set(cop0::CAUSE, (cause_reg & !0x7C) | ((code as i32) << 2));
        self.cop0.set(cop0::EPC, epc as i32);
    }

    /// Queues an external interrupt. `bits` are Cause IP bits, e.g. `0x100`.
    pub fn post_interrupt(&mut self, bits: u32) {
        self.pending_interrupts |= bits;
    }

    pub fn has_pending_interrupt(&self) -> bool {
        self.pending_interrupts != 0
    }

    /// Delivers pending interrupts when Status allows it; `pc` is the
    /// address of the next instruction, which becomes EPC.
    pub fn take_interrupt(&mut self, pc: u32) -> bool {
        if self.pending_interrupts == 0 || !self.cop0.interrupts_enabled() || self.cop0.exception_level() {
            return false;
        }
        self.set_exception_registers(cause::INTERRUPT, pc);
        let cause_reg = self.cop0.get(cop0::CAUSE);
        self.cop0.set(cop0::CAUSE, cause_reg | self.pending_interrupts as i32);
        self.pending_interrupts = 0;
        true
    }

    /// Returns from the kernel handler.
    pub fn eret(&mut self) {
        let status = self.cop0.get(cop0::STATUS);
        self.cop0.set(cop0::STATUS, bits::clear_bit(status, cop0::STATUS_EXL));
        self.regs.set_pc(self.cop0.get(cop0::EPC) as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConfiguration;

    fn machine() -> Machine {
        Machine::new(Memory::new(MemoryConfiguration::default()))
    }

    #[test]
    fn delayed_branch_states() {
        let mut branch = DelayedBranch::default();
        branch.register(0x40);
        branch.register(0x80);
        assert_eq!(branch, DelayedBranch::Registered(0x40));
        assert_eq!(branch.advance(), None);
        assert_eq!(branch.advance(), Some(0x40));
        assert_eq!(branch, DelayedBranch::Cleared);
    }

    #[test]
    fn branch_is_relative_to_next_instruction() {
        let mut m = machine();
        m.regs.set_pc(0x0040_0004);
        m.process_branch(-1);
        assert_eq!(m.regs.pc(), 0x0040_0000);

        m.delayed_branching = true;
        m.process_branch(3);
        assert_eq!(m.regs.pc(), 0x0040_0000);
        assert_eq!(m.branch, DelayedBranch::Registered(0x0040_000C));
    }

    #[test]
    fn link_skips_delay_slot() {
        let mut m = machine();
        m.regs.set_pc(0x0040_0008);
        m.process_return_address(31);
        assert_eq!(m.gpr(31), 0x0040_0008);
        m.delayed_branching = true;
        m.process_return_address(31);
        assert_eq!(m.gpr(31), 0x0040_000C);
    }

    #[test]
    fn exception_registers() {
        let mut m = machine();
        m.record_exception(&SimError::AddressLoad(0x1040_0001), 0x0040_0010);
        assert_eq!(m.cop0.get(cop0::EPC), 0x0040_0010);
        assert_eq!(m.cop0.get(cop0::CAUSE), 4 << 2);
        assert_eq!(m.cop0.get(cop0::VADDR), 0x1040_0001);
        assert!(m.cop0.exception_level());
        m.eret();
        assert!(!m.cop0.exception_level());
        assert_eq!(m.regs.pc(), 0x0040_0010);
    }

    #[test]
    fn interrupts_wait_for_enable() {
        let mut m = machine();
        m.post_interrupt(0x100);
        m.cop0.set(cop0::STATUS, 0);
        assert!(!m.take_interrupt(0x0040_0000));
        m.cop0.set(cop0::STATUS, 1);
        assert!(m.take_interrupt(0x0040_0000));
        assert_eq!(m.cop0.get(cop0::CAUSE) & 0x100, 0x100);
        assert!(!m.has_pending_interrupt());
    }

    #[test]
    fn unknown_syscall() {
        let mut m = machine();
        m.regs.set(crate::reg::Reg::V0, 99);
        assert_eq!(m.syscall(), Err(SimError::UnknownSyscall(99)));
    }
}
