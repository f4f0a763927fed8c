//! Operand type checking against instruction example syntax.

use arch::inst::Instruction;
use arch::token::{Token, TokenKind};

/// Checks one operand token against the kind the syntax expects.
fn compatible(spec: TokenKind, tok: &Token, bare_machine: bool) -> Result<(), &'static str> {
    use TokenKind::*;
    const USE_NUMBER: &str = "Use register number instead of name.  See Settings.";
    const OUT_OF_RANGE: &str = "operand is out of range";

    if bare_machine && tok.kind == RegisterName && spec.is_register() {
        return Err(USE_NUMBER);
    }
    if spec == tok.kind {
        return Ok(());
    }
    let fits = |low: i32, high: i32| tok.int_value().is_some_and(|v| (low..=high).contains(&v));
    match (spec, tok.kind) {
        (Identifier, Operator) => Ok(()),
        // Raw branch displacement or jump address.
        (Identifier, t) if t.is_integer() => Ok(()),
        (RegisterName, RegisterNumber) | (RegisterNumber, RegisterName) => Ok(()),
        (Integer16, Integer16U) if fits(-0x8000, 0x7FFF) => Ok(()),
        (Integer16U, Integer16) if fits(0, 0xFFFF) => Ok(()),
        (Integer16 | Integer16U | Integer32, Integer5) => Ok(()),
        (Integer32, Integer16 | Integer16U) => Ok(()),
        (s, t) if s.is_integer() && t.is_integer() => Err(OUT_OF_RANGE),
        _ => Err("operand is of incorrect type"),
    }
}

/// Compares `tokens` (operator first) with the syntax of `inst`. On
/// mismatch returns the offending token and a message.
pub fn check<'t>(tokens: &'t [Token], inst: &Instruction, bare_machine: bool) -> Result<(), (&'t Token, String)> {
    let spec = inst.tokens();
    let operator = &tokens[0];
    if tokens.len() != spec.len() {
        let which = if tokens.len() < spec.len() { "few" } else { "many" };
        return Err((
            operator,
            format!(
                "Too {} or incorrectly formatted operands. Expected: {}",
                which,
                inst.example()
            ),
        ));
    }
    for (kind, tok) in spec.iter().zip(tokens).skip(1) {
        if let Err(message) = compatible(*kind, tok, bare_machine) {
            return Err((tok, format!("\"{}\": {}", tok.value, message)));
        }
    }
    Ok(())
}

/// The first candidate whose operands fit, else the first candidate so
/// that checking it yields the diagnostic.
pub fn best_match<'i>(tokens: &[Token], candidates: &[&'i Instruction], bare_machine: bool) -> Option<&'i Instruction> {
    candidates
        .iter()
        .find(|inst| check(tokens, inst, bare_machine).is_ok())
        .or_else(|| candidates.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch::inst::set::INSTRUCTION_SET;
    use arch::token::classify;
    use std::sync::Arc;

    fn tokens(text: &str) -> Vec<Token> {
        text.split([' ', ','])
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, s)| Token::new(classify(s), s, Arc::from("t.s"), 1, i + 1))
            .collect()
    }

    fn pick(text: &str) -> &'static str {
        let toks = tokens(text);
        let candidates = INSTRUCTION_SET.matching(&toks[0].value);
        best_match(&toks, &candidates, false).map(|i| i.example()).unwrap_or("")
    }

    macro_rules! match_cases {
        ($($name:ident: $text:expr => $example:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(pick($text), $example);
                }
            )*
        }
    }

    match_cases! {
        li_small: "li $t0 5" => "li $t1,-100",
        li_unsigned: "li $t0 40000" => "li $t1,100",
        li_word: "li $t0 100000" => "li $t1,100000",
        addi_basic: "addi $t0 $t0 1" => "addi $t1,$t2,-100",
        addi_wide: "addi $t0 $t0 100000" => "addi $t1,$t2,100000",
        register_number: "add $8 $9 $10" => "add $t1,$t2,$t3",
        operator_as_label: "j b" => "j target",
        branch_displacement: "bne $t0 $0 1" => "bne $t1,$t2,label",
    }

    #[test]
    fn diagnostics() {
        let add = INSTRUCTION_SET.matching("add")[0];
        let (_, message) = check(&tokens("add $t0 $t1"), add, false).unwrap_err();
        assert!(message.starts_with("Too few"));
        let binding = tokens("add $t0 $t1 $f2");
        let (tok, message) = check(&binding, add, false).unwrap_err();
        assert_eq!(tok.value, "$f2");
        assert!(message.ends_with("operand is of incorrect type"));

        let sll = INSTRUCTION_SET.matching("sll")[0];
        let (_, message) = check(&tokens("sll $t0 $t1 40"), sll, false).unwrap_err();
        assert!(message.ends_with("operand is out of range"));

        let (_, message) = check(&tokens("add $t0 $t1 $t2"), add, true).unwrap_err();
        assert!(message.contains("register number"));
        assert!(check(&tokens("add $8 $9 $10"), add, true).is_ok());
    }
}
