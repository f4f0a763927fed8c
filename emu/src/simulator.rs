//! Fetch/decode/execute loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arch::bits::to_hex_string;
use arch::error::SimError;
use arch::machine::Machine;
use arch::reg::Reg;
use arch::statement::SourceLine;
use arch::syscall::Console;
use mipsasm::AssembledProgram;
use tracing::{debug, trace};

use crate::console::StdConsole;
use crate::error::RuntimeError;
use crate::hooks::Hook;
use crate::settings::Settings;
use crate::syscalls;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An exit service ran, or execution fell off the end of the program.
    Exited(i32),
    /// The stop handle was triggered.
    Stopped,
    StepLimit,
    Fault(RuntimeError),
}

/// Asks a running simulation to stop before its next instruction. The
/// request stays set until `reset`.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Lets a stopped simulator run again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

pub struct Simulator {
    pub machine: Machine,
    stop: StopHandle,
    delay: Option<Duration>,
    hooks: Vec<Box<dyn Hook>>,
    steps: u64,
}

impl Simulator {
    pub fn new(program: AssembledProgram, settings: &Settings) -> Result<Self, SimError> {
        let main = program.global_symbols.address("main");
        let mut machine = Machine::new(program.memory);
        machine.syscalls = syscalls::default_table();
        machine.console = Box::new(StdConsole);
        machine.delayed_branching = settings.delayed_branching;
        if settings.start_at_main {
            if let Some(main) = main {
                machine.regs.set_initial_pc(main);
            }
        }
        if !settings.program_arguments.is_empty() {
            store_program_arguments(&mut machine, &settings.program_arguments)?;
        }
        let delay = settings
            .instructions_per_second
            .filter(|&ips| ips > 0)
            .map(|ips| Duration::from_secs_f64(1.0 / ips as f64));
        Ok(Self {
            machine,
            stop: StopHandle::default(),
            delay,
            hooks: vec![],
            steps: 0,
        })
    }

    pub fn with_console(mut self, console: impl Console + 'static) -> Self {
        self.machine.console = Box::new(console);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn add_hook(&mut self, mut hook: Box<dyn Hook>) {
        hook.init(&mut self.machine);
        self.hooks.push(hook);
    }

    /// Instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs from the current PC until the program ends, faults, is stopped
    /// or has executed `max_steps` instructions.
    pub fn simulate(&mut self, max_steps: Option<u64>) -> Outcome {
        trace!("simulate from {}", to_hex_string(self.machine.regs.pc() as i32));
        let mut executed = 0;
        loop {
            if self.stop.is_stopped() {
                debug!("stopped after {} steps", executed);
                return Outcome::Stopped;
            }
            if max_steps.is_some_and(|max| executed >= max) {
                return Outcome::StepLimit;
            }
            if let Some(outcome) = self.step() {
                trace!("simulation ended: {:?}", outcome);
                return outcome;
            }
            executed += 1;
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
        }
    }

    /// Executes one instruction. `Some` means the run is over.
    pub fn step(&mut self) -> Option<Outcome> {
        let handler = self.machine.memory.config().exception_handler;
        if self.machine.has_pending_interrupt() && self.handler_installed() {
            let pc = self.machine.regs.pc();
            if self.machine.take_interrupt(pc) {
                debug!("interrupt taken, EPC = {}", to_hex_string(pc as i32));
                self.machine.branch.clear();
                self.machine.regs.set_pc(handler);
            }
        }

        let pc = self.machine.regs.pc();
        let statement = match self.machine.memory.get_statement(pc) {
            Ok(Some(statement)) => statement,
            Ok(None) => {
                debug!("no instruction at {}, program finished", to_hex_string(pc as i32));
                return Some(Outcome::Exited(0));
            }
            Err(err) => return self.exception(err, pc, None),
        };

        self.machine.regs.increment_pc();
        if let Err(err) = (statement.instruction.action)(&mut self.machine, &statement.operands) {
            return match err {
                SimError::Exit(code) => Some(Outcome::Exited(code)),
                err => self.exception(err, pc, statement.source.clone()),
            };
        }
        if self.machine.delayed_branching {
            if let Some(target) = self.machine.branch.advance() {
                self.machine.regs.set_pc(target);
            }
        }

        for hook in &mut self.hooks {
            hook.exec(self.steps, pc, statement.binary, &mut self.machine);
        }
        self.steps += 1;
        None
    }

    fn handler_installed(&self) -> bool {
        let handler = self.machine.memory.config().exception_handler;
        matches!(self.machine.memory.get_statement_no_notify(handler), Ok(Some(_)))
    }

    /// Enters the kernel handler if one is installed, otherwise ends the run.
    fn exception(&mut self, error: SimError, pc: u32, source: Option<SourceLine>) -> Option<Outcome> {
        self.machine.branch.clear();
        if error.cause().is_some() && self.handler_installed() {
            debug!("{} at {}, entering handler", error, to_hex_string(pc as i32));
            self.machine.record_exception(&error, pc);
            let handler = self.machine.memory.config().exception_handler;
            self.machine.regs.set_pc(handler);
            return None;
        }
        Some(Outcome::Fault(RuntimeError { error, pc, source }))
    }
}

/// Copies `args` to the top of the stack and sets `$a0`/`$a1` to argc/argv.
fn store_program_arguments(machine: &mut Machine, args: &[String]) -> Result<(), SimError> {
    let config = machine.memory.config();
    let (stack_base, stack_pointer) = (config.stack_base, config.stack_pointer);

    let mut high = stack_base;
    let mut starts = Vec::with_capacity(args.len());
    for arg in args {
        high -= arg.len() as u32 + 1;
        for (i, byte) in arg.bytes().enumerate() {
            machine.memory.set_byte(high + i as u32, byte as i32)?;
        }
        machine.memory.set_byte(high + arg.len() as u32, 0)?;
        starts.push(high);
    }

    let mut address = stack_pointer;
    if high < stack_pointer {
        address = high - (high % 4) - 4;
    }
    machine.memory.set_word(address, 0)?;
    address -= 4;
    for start in starts.iter().rev() {
        machine.memory.set_word(address, *start as i32)?;
        address -= 4;
    }
    machine.memory.set_word(address, args.len() as i32)?;
    address -= 4;

    machine.regs.set(Reg::SP, address.wrapping_add(4) as i32);
    machine.regs.set(Reg::A0, args.len() as i32);
    machine.regs.set(Reg::A1, address.wrapping_add(8) as i32);
    Ok(())
}
