use arch::machine::Machine;
use arch::reg::Reg;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

use crate::error::EmuError;

use super::Hook;

/// Prints machine state when execution reaches configured addresses.
#[derive(Debug)]
pub struct Dump {
    file: Option<String>,
    all: bool,
    list: List,
}

/// Instruction address to what to show after it runs.
#[derive(Debug, Default, Serialize, Deserialize)]
struct List(HashMap<u32, Config>);

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Config {
    /// Words shown upward from `$sp`.
    stack: usize,
    words: Vec<u32>,
}

const RULE: &str = " +----------------+----------------+----------------+----------------+";

impl Dump {
    pub fn arg(file: Option<String>, all: bool) -> Result<Self, EmuError> {
        let list = match &file {
            Some(fname) => {
                let reader = File::open(fname).map_err(|e| EmuError::Io(fname.clone(), e))?;
                serde_yaml::from_reader(BufReader::new(reader)).map_err(|e| EmuError::Settings(fname.clone(), e))?
            }
            None => List::default(),
        };
        Ok(Self { file, all, list })
    }

    #[cfg(test)]
    fn from_yaml(text: &str, all: bool) -> Result<Self, serde_yaml::Error> {
        Ok(Self {
            file: None,
            all,
            list: serde_yaml::from_str(text)?,
        })
    }

    /// Lines to print after the instruction at `addr`.
    fn report(&self, addr: u32, machine: &Machine) -> Vec<String> {
        match self.list.0.get(&addr) {
            Some(cfg) => {
                let mut lines = registers(machine);
                if cfg.stack > 0 {
                    let sp = machine.regs.get(Reg::SP) as u32;
                    let addrs: Vec<u32> = (0..cfg.stack as u32).map(|i| sp.wrapping_add(4 * i)).collect();
                    lines.extend(words(machine, &addrs));
                }
                lines.extend(words(machine, &cfg.words));
                lines
            }
            None if self.all => registers(machine),
            None => vec![],
        }
    }
}

impl Hook for Dump {
    fn init(&mut self, _machine: &mut Machine) {
        if self.all {
            println!(" * Dump all");
        }
        if let Some(fname) = &self.file {
            println!(" * Dump[{}] {:?}", self.list.0.len(), fname);
        }
    }

    fn exec(&mut self, _time: u64, addr: u32, _code: u32, machine: &mut Machine) {
        for line in self.report(addr, machine) {
            println!("{}", line);
        }
    }
}

fn cell(name: &str, value: i32) -> String {
    format!(" {:>4}: {:08X} ", name, value)
}

/// All 32 registers in four columns, then PC, HI and LO.
fn registers(machine: &Machine) -> Vec<String> {
    let mut lines = vec![RULE.to_string()];
    for row in 0..8u8 {
        let cells: Vec<String> = (0..4u8)
            .map(|col| {
                let reg = Reg::from(col * 8 + row);
                cell(&reg.to_string(), machine.regs.get(reg))
            })
            .collect();
        lines.push(format!(" |{}|", cells.join("|")));
    }
    let special = [
        cell("pc", machine.regs.pc() as i32),
        cell("hi", machine.regs.hi()),
        cell("lo", machine.regs.lo()),
        " ".repeat(16),
    ];
    lines.push(format!(" |{}|", special.join("|")));
    lines.push(RULE.to_string());
    lines
}

fn words(machine: &Machine, addrs: &[u32]) -> Vec<String> {
    if addrs.is_empty() {
        return vec![];
    }
    let mut lines: Vec<String> = addrs
        .iter()
        .map(|addr| {
            let value = match machine.memory.get_word_no_notify(*addr) {
                Ok(value) => format!("{:08X}", value),
                Err(e) => e.to_string(),
            };
            format!(" | {:<66}|", format!("{:08X} : {}", addr, value))
        })
        .collect();
    lines.push(RULE.to_string());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch::memory::{Memory, MemoryConfiguration};

    #[test]
    fn reports_configured_addresses() {
        let mut machine = Machine::new(Memory::new(MemoryConfiguration::default()));
        machine.regs.set(Reg::T0, 0x2A);
        machine.memory.set_word(0x1001_0000, 7).unwrap();
        let sp = machine.regs.get(Reg::SP) as u32;
        machine.memory.set_word(sp, -1).unwrap();

        let dump = Dump::from_yaml("0x00400004:\n  stack: 1\n  words: [0x10010000]\n", false).unwrap();
        assert!(dump.report(0x0040_0000, &machine).is_empty());

        let lines = dump.report(0x0040_0004, &machine);
        assert_eq!(lines.len(), 11 + 2 + 2);
        assert_eq!(lines[1], " | zero: 00000000 |   t0: 0000002A |   s0: 00000000 |   t8: 00000000 |");
        assert!(lines[9].starts_with(" |   pc: 00400000 |"));
        assert!(lines[11].contains(&format!("{:08X} : FFFFFFFF", sp)));
        assert!(lines[13].starts_with(" | 10010000 : 00000007"));
        assert!(lines.iter().all(|l| l.len() == RULE.len()));

        let all = Dump::from_yaml("{}", true).unwrap();
        assert_eq!(all.report(0x0040_0000, &machine).len(), 11);
    }
}
