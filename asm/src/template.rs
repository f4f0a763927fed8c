//! Pseudo instruction expansion: fills the substitution codes of an
//! extended instruction's templates from the statement's operand tokens.

use arch::inst::pseudo::{pieces, Code, Piece, DBNOP};
use arch::token::{Token, TokenKind};

use crate::error::ErrorMessage;

/// Operand values for one statement.
pub struct Operands<'a> {
    tokens: &'a [Token],
    resolve: &'a dyn Fn(&str) -> Option<u32>,
}

impl<'a> Operands<'a> {
    pub fn new(tokens: &'a [Token], resolve: &'a dyn Fn(&str) -> Option<u32>) -> Self {
        Self { tokens, resolve }
    }

    fn token(&self, n: usize) -> Result<&'a Token, ErrorMessage> {
        self.tokens.get(n).ok_or_else(|| {
            ErrorMessage::at(&self.tokens[0], format!("missing operand {} for {}", n, self.tokens[0].value))
        })
    }

    /// Numeric value of operand `n`: a label's address or an integer,
    /// plus a trailing `+imm` or `-imm`.
    fn value(&self, n: usize) -> Result<i32, ErrorMessage> {
        let tok = self.token(n)?;
        let base = if tok.kind.is_label_like() {
            (self.resolve)(&tok.value)
                .map(|a| a as i32)
                .ok_or_else(|| ErrorMessage::at(tok, format!("Symbol \"{}\" not found in symbol table.", tok.value)))?
        } else {
            tok.int_value()
                .ok_or_else(|| ErrorMessage::at(tok, format!("\"{}\" is not a numeric operand", tok.value)))?
        };
        let offset = match (self.tokens.get(n + 1).map(|t| t.kind), self.tokens.get(n + 2)) {
            (Some(TokenKind::Plus), Some(imm)) => imm.int_value().unwrap_or(0),
            (Some(TokenKind::Minus), Some(imm)) => imm.int_value().unwrap_or(0).wrapping_neg(),
            _ => 0,
        };
        Ok(base.wrapping_add(offset))
    }

    fn next_register(&self, n: usize) -> Result<String, ErrorMessage> {
        let tok = self.token(n)?;
        let next = tok.register().map(|r| r + 1).filter(|r| *r < 32);
        match (next, tok.kind) {
            (Some(r), TokenKind::FpRegisterName) => Ok(format!("$f{}", r)),
            (Some(r), _) => Ok(format!("${}", r)),
            (None, _) => Err(ErrorMessage::at(tok, format!("no register follows {}", tok.value))),
        }
    }

    fn code(&self, code: Code, n: usize) -> Result<String, ErrorMessage> {
        let text = match code {
            Code::Register | Code::Operand => self.token(n)?.value.clone(),
            Code::NextRegister => self.next_register(n)?,
            Code::High => (((self.value(n)? as u32) >> 16) & 0xFFFF).to_string(),
            Code::HighAdjusted => (((self.value(n)? as u32).wrapping_add(0x8000) >> 16) & 0xFFFF).to_string(),
            Code::Low => (self.value(n)? & 0xFFFF).to_string(),
            Code::LowSigned => (self.value(n)? as i16).to_string(),
            Code::Negated => self.value(n)?.wrapping_neg().to_string(),
            Code::ThirtyTwoMinus => (32 - self.value(n)?).to_string(),
            Code::BranchOffset => {
                return Err(ErrorMessage::at(&self.tokens[0], "misplaced branch offset in template"));
            }
        };
        Ok(text)
    }
}

/// Basic instruction lines for `templates`. A `DBNOP` line becomes `nop`
/// with delayed branching and disappears otherwise.
pub fn expand(templates: &[String], operands: &Operands, delayed_branching: bool) -> Result<Vec<String>, ErrorMessage> {
    let mut lines = vec![];
    for template in templates {
        if template.contains(DBNOP) {
            if delayed_branching {
                lines.push("nop".to_string());
            }
            continue;
        }
        let mut line = String::new();
        for piece in pieces(template) {
            match piece {
                Piece::Text(text) => line.push_str(text),
                Piece::Code(code, n) => line.push_str(&operands.code(code, n)?),
                Piece::BranchOffset(normal, delayed) => {
                    let offset = if delayed_branching { delayed } else { normal };
                    line.push_str(&offset.to_string());
                }
            }
        }
        lines.push(line);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch::inst::set::INSTRUCTION_SET;
    use arch::inst::Instruction;
    use arch::token::classify;
    use std::sync::Arc;

    fn tokens(parts: &[&str]) -> Vec<Token> {
        parts
            .iter()
            .enumerate()
            .map(|(i, s)| Token::new(classify(s), *s, Arc::from("t.s"), 1, i + 1))
            .collect()
    }

    fn templates(example: &str) -> &'static [String] {
        INSTRUCTION_SET
            .instructions()
            .iter()
            .find_map(|i| match i {
                Instruction::Extended(e) if e.example == example => Some(e.templates.as_slice()),
                _ => None,
            })
            .unwrap()
    }

    fn resolve(name: &str) -> Option<u32> {
        (name == "data").then_some(0x1001_8004)
    }

    #[test]
    fn li_word() {
        let toks = tokens(&["li", "$t0", "0x12345678"]);
        let ops = Operands::new(&toks, &resolve);
        let lines = expand(templates("li $t1,100000"), &ops, false).unwrap();
        assert_eq!(lines, vec!["lui $1,4660", "ori $t0,$1,22136"]);
    }

    #[test]
    fn load_from_label_adjusts_high_half() {
        let toks = tokens(&["lw", "$t0", "data"]);
        let ops = Operands::new(&toks, &resolve);
        let lines = expand(templates("lw $t1,label"), &ops, false).unwrap();
        assert_eq!(lines, vec!["lui $1,4098", "lw $t0,-32764($1)"]);

        let toks = tokens(&["la", "$t0", "data", "+", "4"]);
        let ops = Operands::new(&toks, &resolve);
        let lines = expand(templates("la $t1,label+100000"), &ops, false).unwrap();
        assert_eq!(lines, vec!["lui $1,4097", "ori $t0,$1,32776"]);
    }

    #[test]
    fn delay_slot_filler() {
        let toks = tokens(&["div", "$t0", "$t1", "$t2"]);
        let ops = Operands::new(&toks, &resolve);
        let plain = expand(templates("div $t1,$t2,$t3"), &ops, false).unwrap();
        let delayed = expand(templates("div $t1,$t2,$t3"), &ops, true).unwrap();
        assert_eq!(plain.len(), 4);
        assert_eq!(delayed.len(), 5);
        assert!(plain[0].starts_with("bne $t2,$0,"));
        assert_ne!(plain[0], delayed[0]);
    }

    #[test]
    fn next_register_and_missing_symbol() {
        let toks = tokens(&["mfc1.d", "$t0", "$f2"]);
        let ops = Operands::new(&toks, &resolve);
        let lines = expand(templates("mfc1.d $t1,$f2"), &ops, false).unwrap();
        assert_eq!(lines, vec!["mfc1 $t0,$f2", "mfc1 $9,$f3"]);

        let toks = tokens(&["la", "$t0", "nowhere"]);
        let ops = Operands::new(&toks, &resolve);
        let err = expand(templates("la $t1,label"), &ops, false).unwrap_err();
        assert!(err.message.contains("nowhere"));
    }
}
