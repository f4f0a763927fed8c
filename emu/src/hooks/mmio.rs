//! Memory-mapped keyboard and display.
//!
//! | offset | register            |
//! |--------|---------------------|
//! | `+0`   | receiver control    |
//! | `+4`   | receiver data       |
//! | `+8`   | transmitter control |
//! | `+12`  | transmitter data    |
//!
//! Control bit 0 is "ready", bit 1 enables the device interrupt.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use arch::error::SimError;
use arch::machine::Machine;
use arch::memory::{AccessKind, MemoryAccessNotice, ObserverId};
use tracing::warn;

use super::Hook;

const RECEIVER_CONTROL: u32 = 0;
const RECEIVER_DATA: u32 = 4;
const TRANSMITTER_CONTROL: u32 = 8;
const TRANSMITTER_DATA: u32 = 12;

const READY: i32 = 1;
const INTERRUPT_ENABLE: i32 = 2;

pub const KEYBOARD_INTERRUPT: u32 = 0x100;
pub const DISPLAY_INTERRUPT: u32 = 0x200;

/// Instructions the display stays busy after accepting a character.
const TRANSMIT_DELAY: u32 = 5;

#[derive(Debug, Default)]
pub struct Mmio {
    base: u32,
    keyboard: VecDeque<u8>,
    written: Arc<Mutex<Vec<u8>>>,
    received: Arc<AtomicBool>,
    transmitting: VecDeque<u8>,
    countdown: u32,
    observer: Option<ObserverId>,
}

impl Mmio {
    /// `keyboard` is typed into the receiver one character at a time.
    pub fn new(keyboard: &str) -> Self {
        Self {
            keyboard: keyboard.bytes().collect(),
            ..Self::default()
        }
    }

    fn set_ready(&self, machine: &Machine, offset: u32, ready: bool) -> Result<i32, SimError> {
        let addr = self.base + offset;
        let control = machine.memory.get_word_no_notify(addr)?;
        let control = if ready { control | READY } else { control & !READY };
        machine.memory.set_word_no_notify(addr, control)?;
        Ok(control)
    }

    fn is_ready(&self, machine: &Machine, offset: u32) -> Result<bool, SimError> {
        Ok(machine.memory.get_word_no_notify(self.base + offset)? & READY != 0)
    }

    fn update(&mut self, machine: &mut Machine) -> Result<(), SimError> {
        if self.received.swap(false, Ordering::Relaxed) {
            self.set_ready(machine, RECEIVER_CONTROL, false)?;
        }
        if !self.is_ready(machine, RECEIVER_CONTROL)? {
            if let Some(byte) = self.keyboard.pop_front() {
                machine.memory.set_word_no_notify(self.base + RECEIVER_DATA, byte as i32)?;
                if self.set_ready(machine, RECEIVER_CONTROL, true)? & INTERRUPT_ENABLE != 0 {
                    machine.post_interrupt(KEYBOARD_INTERRUPT);
                }
            }
        }

        if let Ok(mut written) = self.written.lock() {
            self.transmitting.extend(written.drain(..));
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            if self.countdown == 0 {
                if let Some(byte) = self.transmitting.pop_front() {
                    machine.console.print(&(byte as char).to_string());
                }
                if self.set_ready(machine, TRANSMITTER_CONTROL, true)? & INTERRUPT_ENABLE != 0 {
                    machine.post_interrupt(DISPLAY_INTERRUPT);
                }
            }
        } else if !self.transmitting.is_empty() {
            self.countdown = TRANSMIT_DELAY;
            self.set_ready(machine, TRANSMITTER_CONTROL, false)?;
        } else {
            // The program may have rewritten the whole control word.
            self.set_ready(machine, TRANSMITTER_CONTROL, true)?;
        }
        Ok(())
    }
}

impl Hook for Mmio {
    fn init(&mut self, machine: &mut Machine) {
        self.base = machine.memory.config().mmio_base;
        let written = self.written.clone();
        let received = self.received.clone();
        let data = self.base + RECEIVER_DATA;
        let transmit = self.base + TRANSMITTER_DATA;
        let callback = Arc::new(move |notice: &MemoryAccessNotice| match notice.kind {
            AccessKind::Read if notice.address == data => received.store(true, Ordering::Relaxed),
            AccessKind::Write if notice.address == transmit => {
                if let Ok(mut written) = written.lock() {
                    written.push(notice.value as u8);
                }
            }
            _ => {}
        });
        if let Some(id) = self.observer.take() {
            machine.memory.remove_observer(id);
        }
        self.observer = Some(machine.memory.add_observer(self.base..=self.base + 15, callback));
        if let Err(e) = self.set_ready(machine, TRANSMITTER_CONTROL, true) {
            warn!("mmio: {e}");
        }
    }

    fn exec(&mut self, _time: u64, _addr: u32, _code: u32, machine: &mut Machine) {
        if let Err(e) = self.update(machine) {
            warn!("mmio: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ScriptedConsole;
    use arch::memory::{Memory, MemoryConfiguration};

    const BASE: u32 = 0xFFFF_0000;

    fn machine() -> (Machine, ScriptedConsole) {
        let mut machine = Machine::new(Memory::new(MemoryConfiguration::default()));
        let console = ScriptedConsole::new("");
        machine.console = Box::new(console.clone());
        (machine, console)
    }

    #[test]
    fn display_prints_after_delay() {
        let (mut machine, console) = machine();
        let mut mmio = Mmio::new("");
        mmio.init(&mut machine);
        assert_eq!(machine.memory.get_word(BASE + 8).unwrap(), READY);

        machine.memory.set_word(BASE + 8, INTERRUPT_ENABLE).unwrap();
        machine.memory.set_word(BASE + 12, 'x' as i32).unwrap();
        mmio.exec(0, 0, 0, &mut machine);
        assert_eq!(machine.memory.get_word(BASE + 8).unwrap() & READY, 0);
        for time in 1..=TRANSMIT_DELAY {
            mmio.exec(time as u64, 0, 0, &mut machine);
        }
        assert_eq!(console.output(), "x");
        assert_eq!(machine.memory.get_word(BASE + 8).unwrap(), INTERRUPT_ENABLE | READY);
        assert!(machine.has_pending_interrupt());
    }

    #[test]
    fn keyboard_feeds_one_char_per_read() {
        let (mut machine, _) = machine();
        let mut mmio = Mmio::new("ab");
        mmio.init(&mut machine);
        mmio.exec(0, 0, 0, &mut machine);
        assert_eq!(machine.memory.get_word(BASE).unwrap() & READY, READY);
        assert_eq!(machine.memory.get_word(BASE + 4).unwrap(), 'a' as i32);

        mmio.exec(1, 0, 0, &mut machine);
        assert_eq!(machine.memory.get_word_no_notify(BASE + 4).unwrap(), 'b' as i32);
        assert!(!machine.has_pending_interrupt());

        mmio.exec(2, 0, 0, &mut machine);
        assert_eq!(machine.memory.get_word(BASE).unwrap() & READY, READY);
        assert_eq!(machine.memory.get_word(BASE + 4).unwrap(), 'b' as i32);
        mmio.exec(3, 0, 0, &mut machine);
        assert_eq!(machine.memory.get_word(BASE).unwrap() & READY, 0);
    }
}
