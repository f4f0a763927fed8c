use std::sync::Arc;

use crate::inst::set::INSTRUCTION_SET;
use crate::inst::BasicInstruction;

/// The source line a statement was assembled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub file: Arc<str>,
    pub line: usize,
    pub text: String,
}

/// One basic instruction placed in a text segment: the machine-level view
/// (address, word, decoded operands) together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramStatement {
    pub instruction: &'static BasicInstruction,
    pub address: u32,
    pub binary: u32,
    /// Raw field values, as the action receives them.
    pub operands: Vec<i32>,
    pub source: Option<SourceLine>,
    /// Source-level text of this basic instruction, e.g. after pseudo
    /// expansion: `addiu $8,$0,5`.
    pub basic: String,
}

impl ProgramStatement {
    /// Encodes `operands` (already resolved to field values) at `address`.
    pub fn new(
        instruction: &'static BasicInstruction,
        address: u32,
        operands: &[i32],
        source: Option<SourceLine>,
        basic: String,
    ) -> Self {
        let binary = instruction.pattern.encode(operands);
        Self {
            instruction,
            address,
            binary,
            operands: instruction.pattern.decode(binary),
            source,
            basic,
        }
    }

    /// Decodes a machine word, e.g. one written by self-modifying code.
    pub fn from_binary(binary: u32, address: u32) -> Option<Self> {
        let instruction = INSTRUCTION_SET.find_by_binary(binary)?;
        let operands = instruction.pattern.decode(binary);
        let basic = instruction.disassemble(&operands, address);
        Some(Self {
            instruction,
            address,
            binary,
            operands,
            source: None,
            basic,
        })
    }

    pub fn mnemonic(&self) -> &str {
        &self.instruction.mnemonic
    }

    /// Disassembly of the stored word.
    pub fn disassemble(&self) -> String {
        self.instruction.disassemble(&self.operands, self.address)
    }

    pub fn source_line(&self) -> Option<usize> {
        self.source.as_ref().map(|s| s.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let addiu = INSTRUCTION_SET.basic("addiu $t1,$t2,-100").unwrap();
        let stmt = ProgramStatement::new(addiu, 0x0040_0000, &[8, 0, 5], None, "addiu $8,$0,5".into());
        assert_eq!(stmt.binary, 0x2408_0005);
        let back = ProgramStatement::from_binary(stmt.binary, stmt.address).unwrap();
        assert_eq!(back.mnemonic(), "addiu");
        assert_eq!(back.operands, vec![8, 0, 5]);
        assert_eq!(back.basic, "addiu $8,$0,5");
    }

    #[test]
    fn negative_immediates_disassemble_signed() {
        let stmt = ProgramStatement::from_binary(0x8D49_FF9C, 0x0040_0000).unwrap();
        assert_eq!(stmt.disassemble(), "lw $9,-100($10)");
    }

    #[test]
    fn undecodable_word() {
        assert!(ProgramStatement::from_binary(0xFC00_0000, 0x0040_0000).is_none());
    }
}
