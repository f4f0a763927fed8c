use arch::machine::Machine;

pub mod dump;
pub mod intr;
pub mod mmio;

/// Side effects run around the fetch/execute loop.
pub trait Hook: Send {
    /// Called once when the hook is attached.
    fn init(&mut self, machine: &mut Machine);
    /// Called after each executed instruction. `addr` and `code` are the
    /// instruction's address and word.
    fn exec(&mut self, time: u64, addr: u32, code: u32, machine: &mut Machine);
}
