//! Writing memory ranges out to files.

use std::io::Write;

use arch::error::SimError;
use arch::memory::Memory;
use clap::ValueEnum;

use crate::error::EmuError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    /// Raw little-endian words.
    Binary,
    /// One `%08x` word per line.
    #[value(name = "hextext")]
    HexText,
    /// One 32-digit binary word per line.
    #[value(name = "binarytext")]
    BinaryText,
    /// Printable bytes, others as `.`, one word per line.
    #[value(name = "asciitext")]
    AsciiText,
}

/// Inclusive-exclusive word range `first..last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpRange {
    pub first: u32,
    pub last: u32,
}

impl DumpRange {
    /// `.text`, `.data`, or an explicit `0xSTART-0xEND` range.
    pub fn parse(segment: &str, memory: &Memory) -> Result<Self, EmuError> {
        let config = memory.config();
        match segment {
            ".text" => Ok(trimmed(memory, config.text_base, config.text_limit)),
            ".data" => Ok(trimmed(memory, config.data_base, config.data_segment_limit)),
            ".ktext" => Ok(trimmed(memory, config.kernel_text_base, config.kernel_text_limit)),
            ".kdata" => Ok(trimmed(memory, config.kernel_data_base, config.kernel_data_limit)),
            range => {
                let (first, last) = range
                    .split_once('-')
                    .and_then(|(a, b)| Some((parse_address(a)?, parse_address(b)?)))
                    .ok_or_else(|| EmuError::DumpRange(range.to_string()))?;
                if first % 4 != 0 || last < first {
                    return Err(EmuError::DumpRange(range.to_string()));
                }
                Ok(DumpRange { first, last: last & !3 })
            }
        }
    }

    fn addresses(&self) -> impl Iterator<Item = u32> {
        (self.first..self.last).step_by(4)
    }
}

fn parse_address(s: &str) -> Option<u32> {
    arch::bits::parse_int(s.trim()).map(|v| v as u32)
}

/// Word at `addr`, read from statements in text segments.
pub fn word_at(memory: &Memory, addr: u32) -> Result<i32, SimError> {
    if memory.in_text_segment(addr) || memory.in_kernel_text_segment(addr) {
        return Ok(memory
            .get_statement_no_notify(addr)?
            .map(|s| s.binary as i32)
            .unwrap_or(0));
    }
    memory.get_word_no_notify(addr)
}

/// `base..limit` cut back to just past the last non-zero word.
fn trimmed(memory: &Memory, base: u32, limit: u32) -> DumpRange {
    let mut last = base;
    let mut addr = base;
    while addr < limit {
        match word_at(memory, addr) {
            Ok(0) => {}
            Ok(_) => last = addr + 4,
            Err(_) => break,
        }
        // Past a run of untouched blocks nothing more was written.
        if addr - last > 0x10000 {
            break;
        }
        addr = addr.wrapping_add(4);
    }
    DumpRange { first: base, last }
}

pub fn write(memory: &Memory, range: DumpRange, format: DumpFormat, out: &mut impl Write) -> Result<(), EmuError> {
    let io = |e| EmuError::Io("dump output".to_string(), e);
    for addr in range.addresses() {
        let word = word_at(memory, addr)?;
        match format {
            DumpFormat::Binary => out.write_all(&word.to_le_bytes()).map_err(io)?,
            DumpFormat::HexText => writeln!(out, "{:08x}", word).map_err(io)?,
            DumpFormat::BinaryText => writeln!(out, "{:032b}", word).map_err(io)?,
            DumpFormat::AsciiText => {
                let text: String = word
                    .to_be_bytes()
                    .iter()
                    .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                    .collect();
                writeln!(out, "{}", text).map_err(io)?
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mipsasm::{Assembler, AssemblerOptions};

    macro_rules! format_cases {
        ($($name:ident: $format:expr => $expect:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let program = Assembler::new(AssemblerOptions::default())
                        .assemble_str(".data\n.word 0x41424344, 5\n")
                        .unwrap();
                    let range = DumpRange::parse(".data", &program.memory).unwrap();
                    let mut out = vec![];
                    write(&program.memory, range, $format, &mut out).unwrap();
                    assert_eq!(out, $expect);
                }
            )*
        }
    }

    format_cases! {
        binary: DumpFormat::Binary => vec![0x44, 0x43, 0x42, 0x41, 5, 0, 0, 0],
        hex_text: DumpFormat::HexText => b"41424344\n00000005\n".to_vec(),
        binary_text: DumpFormat::BinaryText =>
            b"01000001010000100100001101000100\n00000000000000000000000000000101\n".to_vec(),
        ascii_text: DumpFormat::AsciiText => b"ABCD\n....\n".to_vec(),
    }

    #[test]
    fn text_and_explicit_ranges() {
        let program = Assembler::new(AssemblerOptions::default())
            .assemble_str("nop\naddi $t0, $zero, 1\n")
            .unwrap();
        let range = DumpRange::parse(".text", &program.memory).unwrap();
        assert_eq!(range, DumpRange { first: 0x0040_0000, last: 0x0040_0008 });

        let range = DumpRange::parse("0x00400004-0x00400008", &program.memory).unwrap();
        let mut out = vec![];
        write(&program.memory, range, DumpFormat::HexText, &mut out).unwrap();
        assert_eq!(out, b"20080001\n");

        assert!(DumpRange::parse("0x10-0x4", &program.memory).is_err());
        assert!(DumpRange::parse("somewhere", &program.memory).is_err());
    }
}
