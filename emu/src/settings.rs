//! Run settings, loadable from YAML. Missing keys take their defaults.

use std::fs::File;
use std::io::BufReader;

use arch::memory::MemoryConfiguration;
use mipsasm::error::DEFAULT_ERROR_LIMIT;
use mipsasm::AssemblerOptions;
use serde::{Deserialize, Serialize};

use crate::error::EmuError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extended_assembler: bool,
    pub warnings_are_errors: bool,
    pub delayed_branching: bool,
    pub self_modifying_code: bool,
    pub bare_machine: bool,
    pub start_at_main: bool,
    pub memory_configuration: MemoryConfiguration,
    pub big_endian: bool,
    pub error_limit: usize,
    /// Steps before the run is cut off; unlimited when absent.
    pub max_steps: Option<u64>,
    /// Timed mode; full speed when absent.
    pub instructions_per_second: Option<u32>,
    pub program_arguments: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extended_assembler: true,
            warnings_are_errors: false,
            delayed_branching: false,
            self_modifying_code: false,
            bare_machine: false,
            start_at_main: false,
            memory_configuration: MemoryConfiguration::default(),
            big_endian: false,
            error_limit: DEFAULT_ERROR_LIMIT,
            max_steps: None,
            instructions_per_second: None,
            program_arguments: vec![],
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, EmuError> {
        let file = File::open(path).map_err(|e| EmuError::Io(path.to_string(), e))?;
        serde_yaml::from_reader(BufReader::new(file)).map_err(|e| EmuError::Settings(path.to_string(), e))
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn assembler_options(&self) -> AssemblerOptions {
        AssemblerOptions {
            extended: self.extended_assembler,
            warnings_are_errors: self.warnings_are_errors,
            delayed_branching: self.delayed_branching,
            bare_machine: self.bare_machine,
            big_endian: self.big_endian,
            self_modifying_code: self.self_modifying_code,
            error_limit: self.error_limit,
            memory_configuration: self.memory_configuration.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch::memory::Layout;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml("delayed_branching: true\nmax_steps: 500\nprogram_arguments: [a, bc]\n").unwrap();
        assert!(settings.delayed_branching);
        assert!(settings.extended_assembler);
        assert_eq!(settings.max_steps, Some(500));
        assert_eq!(settings.program_arguments, vec!["a", "bc"]);
        assert_eq!(settings.memory_configuration, MemoryConfiguration::default());
    }

    #[test]
    fn custom_memory_layout() {
        let yaml = "memory_configuration:\n  name: Custom\n  text_base: 0x3000\n";
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.memory_configuration.name, "Custom");
        assert_eq!(settings.memory_configuration.text_base, 0x3000);
        assert_eq!(settings.assembler_options().memory_configuration.data_base, 0x1001_0000);

        let compact = MemoryConfiguration::layout(Layout::CompactTextAtZero);
        let yaml = serde_yaml::to_string(&Settings {
            memory_configuration: compact.clone(),
            ..Settings::default()
        })
        .unwrap();
        assert_eq!(Settings::from_yaml(&yaml).unwrap().memory_configuration, compact);
    }
}
