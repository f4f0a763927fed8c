use arch::machine::Machine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use tracing::debug;

use crate::error::EmuError;

use super::Hook;

/// Posts external interrupts on a fixed schedule.
#[derive(Debug)]
pub struct Intr {
    file: Option<String>,
    list: List,
}

/// Step number to Cause IP bits, e.g. `0x400`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct List(HashMap<u64, u32>);

impl Intr {
    pub fn arg(file: Option<String>) -> Result<Self, EmuError> {
        let list = match &file {
            Some(fname) => {
                let reader = File::open(fname).map_err(|e| EmuError::Io(fname.clone(), e))?;
                serde_yaml::from_reader(BufReader::new(reader)).map_err(|e| EmuError::Settings(fname.clone(), e))?
            }
            None => List::default(),
        };
        Ok(Self { file, list })
    }

    pub fn from_list(list: List) -> Self {
        Self { file: None, list }
    }

    fn get(&self, time: u64) -> Option<u32> {
        self.list.0.get(&time).copied()
    }
}

impl List {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

impl Hook for Intr {
    fn init(&mut self, _machine: &mut Machine) {
        if let Some(fname) = &self.file {
            println!(" * Intr[{}] {:?}", self.list.0.len(), fname);
        }
    }

    fn exec(&mut self, time: u64, _: u32, _: u32, machine: &mut Machine) {
        if let Some(bits) = self.get(time) {
            debug!("interrupt {:#x} posted at step {}", bits, time);
            machine.post_interrupt(bits);
        }
    }
}

#[test]
fn test() {
    use arch::memory::{Memory, MemoryConfiguration};

    let mut machine = Machine::new(Memory::new(MemoryConfiguration::default()));
    let mut intr = Intr::from_list(List::from_yaml("3: 0x400\n").unwrap());
    intr.exec(2, 0, 0, &mut machine);
    assert!(!machine.has_pending_interrupt());
    intr.exec(3, 0, 0, &mut machine);
    assert!(machine.has_pending_interrupt());
}
