//! Instruction catalog: basic instructions (encodable, executable) and
//! extended pseudo instructions (expanded by the assembler).

mod basic;
mod fpu;
pub mod pattern;
pub mod pseudo;
pub mod set;

use std::fmt::Write;

use color_print::cformat;

use crate::error::SimError;
use crate::machine::Machine;
use crate::token::{self, TokenKind};
use pattern::Pattern;

/// Simulates one basic instruction. Operands are the raw field values
/// extracted from the machine word, in operand order.
pub type Action = fn(&mut Machine, &[i32]) -> Result<(), SimError>;

/// How label operands of a basic instruction turn into field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    R,
    I,
    /// Last operand is a word displacement from the following instruction.
    IBranch,
    /// Operand is a 26-bit word address inside the current 256MB region.
    J,
}

/// Raw catalog entry, before the example syntax is tokenized.
pub(crate) struct BasicDef {
    pub example: &'static str,
    pub description: &'static str,
    pub format: Format,
    pub encoding: &'static str,
    pub action: Action,
}

macro_rules! basic_def {
    ($example:expr, $description:expr, $format:ident, $encoding:expr, $action:expr $(,)?) => {
        $crate::inst::BasicDef {
            example: $example,
            description: $description,
            format: $crate::inst::Format::$format,
            encoding: $encoding,
            action: $action,
        }
    };
}
pub(crate) use basic_def;

#[derive(PartialEq)]
pub struct BasicInstruction {
    pub mnemonic: String,
    pub example: &'static str,
    pub description: &'static str,
    pub format: Format,
    pub pattern: Pattern,
    /// Token kinds of the example syntax; index 0 is the operator.
    pub tokens: Vec<TokenKind>,
    pub action: Action,
}

impl std::fmt::Debug for BasicInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicInstruction")
            .field("example", &self.example)
            .field("mask", &format_args!("{:08x}", self.pattern.mask))
            .field("matches", &format_args!("{:08x}", self.pattern.matches))
            .finish()
    }
}

#[derive(Debug)]
pub struct ExtendedInstruction {
    pub mnemonic: String,
    pub example: String,
    pub description: String,
    pub tokens: Vec<TokenKind>,
    pub templates: Vec<String>,
    /// Alternate expansion for memory layouts that fit in 16 bits.
    pub compact: Option<Vec<String>>,
}

impl ExtendedInstruction {
    /// Templates to use for the current memory layout.
    pub fn templates_for(&self, compact_memory: bool) -> &[String] {
        match (&self.compact, compact_memory) {
            (Some(compact), true) => compact,
            _ => &self.templates,
        }
    }

    /// Bytes of code the expansion occupies. A `DBNOP` line only counts when
    /// delayed branching is on.
    pub fn length(&self, compact_memory: bool, delayed_branching: bool) -> u32 {
        let count = self
            .templates_for(compact_memory)
            .iter()
            .filter(|t| delayed_branching || !t.contains(pseudo::DBNOP))
            .count();
        4 * count as u32
    }
}

#[derive(Debug)]
pub enum Instruction {
    Basic(BasicInstruction),
    Extended(ExtendedInstruction),
}

impl Instruction {
    pub fn mnemonic(&self) -> &str {
        match self {
            Instruction::Basic(b) => &b.mnemonic,
            Instruction::Extended(e) => &e.mnemonic,
        }
    }

    pub fn example(&self) -> &str {
        match self {
            Instruction::Basic(b) => b.example,
            Instruction::Extended(e) => &e.example,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Instruction::Basic(b) => b.description,
            Instruction::Extended(e) => &e.description,
        }
    }

    pub fn tokens(&self) -> &[TokenKind] {
        match self {
            Instruction::Basic(b) => &b.tokens,
            Instruction::Extended(e) => &e.tokens,
        }
    }

    pub fn as_basic(&self) -> Option<&BasicInstruction> {
        match self {
            Instruction::Basic(b) => Some(b),
            Instruction::Extended(_) => None,
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, Instruction::Extended(_))
    }

    /// Help line: example syntax, then description.
    pub fn cformat(&self) -> String {
        let kind = if self.is_extended() { "pseudo" } else { "basic" };
        cformat!("<b>{:<28}</> <dim>{:<6}</> {}", self.example(), kind, self.description())
    }
}

/// Splits example syntax such as `lw $t1,-100($t2)` into token kinds.
pub(crate) fn example_tokens(example: &str) -> Vec<TokenKind> {
    let mut kinds = vec![];
    let mut current = String::new();
    let flush = |current: &mut String, kinds: &mut Vec<TokenKind>| {
        if !current.is_empty() {
            let kind = if kinds.is_empty() {
                TokenKind::Operator
            } else {
                token::classify(current)
            };
            kinds.push(kind);
            current.clear();
        }
    };
    for c in example.chars() {
        match c {
            ' ' | '\t' | ',' => flush(&mut current, &mut kinds),
            '(' | ')' => {
                flush(&mut current, &mut kinds);
                kinds.push(token::classify(&c.to_string()));
            }
            '+' | '-' if !current.is_empty() => {
                // `label+100000`: binary plus or minus after an identifier.
                flush(&mut current, &mut kinds);
                kinds.push(token::classify(&c.to_string()));
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut kinds);
    kinds
}

impl BasicInstruction {
    /// Disassembly such as `addiu $8,$0,5` for a word at `address`.
    pub fn disassemble(&self, operands: &[i32], address: u32) -> String {
        let mut out = self.mnemonic.clone();
        let mut operand = 0;
        let mut sep = " ";
        for kind in &self.tokens[1..] {
            match kind {
                TokenKind::LeftParen => {
                    out.push('(');
                    sep = "";
                }
                TokenKind::RightParen => out.push(')'),
                TokenKind::Plus | TokenKind::Minus => {}
                _ => {
                    let value = operands.get(operand).copied().unwrap_or(0);
                    let width = self.pattern.width(operand);
                    operand += 1;
                    out.push_str(sep);
                    sep = ",";
                    let _ = match kind {
                        TokenKind::RegisterName | TokenKind::RegisterNumber => write!(out, "${}", value),
                        TokenKind::FpRegisterName => write!(out, "$f{}", value),
                        TokenKind::Identifier => self.write_target(&mut out, value, width, address),
                        TokenKind::Integer16 | TokenKind::Integer32 if width > 0 && width < 32 && !self.zero_extends() => {
                            write!(out, "{}", crate::bits::sign_extend(value as u32, width))
                        }
                        _ => write!(out, "{}", value),
                    };
                }
            }
        }
        out
    }

    /// Logical immediates are zero-extended.
    fn zero_extends(&self) -> bool {
        matches!(self.mnemonic.as_str(), "andi" | "ori" | "xori")
    }

    fn write_target(&self, out: &mut String, value: i32, width: u32, address: u32) -> std::fmt::Result {
        match self.format {
            Format::J => {
                let target = (address.wrapping_add(4) & 0xF000_0000) | ((value as u32) << 2);
                write!(out, "0x{:08x}", target)
            }
            _ => write!(out, "{}", crate::bits::sign_extend(value as u32, width)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_token_kinds() {
        use TokenKind::*;
        assert_eq!(
            example_tokens("lw $t1,-100($t2)"),
            vec![Operator, RegisterName, Integer16, LeftParen, RegisterName, RightParen]
        );
        assert_eq!(
            example_tokens("lw $t1,label+100000"),
            vec![Operator, RegisterName, Identifier, Plus, Integer32]
        );
        assert_eq!(example_tokens("c.eq.s 1,$f0,$f1"), vec![Operator, Integer5, FpRegisterName, FpRegisterName]);
        assert_eq!(example_tokens("syscall"), vec![Operator]);
    }

    #[test]
    fn catalog_entry_macro() {
        let def = basic_def!("nop", "Null operation", R, "000000 00000 00000 00000 00000 000000", |_, _| Ok(()));
        assert_eq!(def.format, Format::R);
        assert_eq!(def.example, "nop");
        assert_eq!(basic::catalog().len() + fpu::catalog().len(), 91 + 64);
    }
}
