//! Pseudo instruction table and the substitution codes its templates use.

use super::{example_tokens, ExtendedInstruction};

static TABLE: &str = include_str!("pseudo_ops.txt");

/// Separates the normal expansion from the one used with compact memory.
pub const COMPACT: &str = "COMPACT";
/// Expands to `nop` with delayed branching and to nothing otherwise.
pub const DBNOP: &str = "DBNOP";

/// Substitution codes, longest first so that `VLS2` is never read as `VL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    /// Branch offset: first digit normally, second with delayed branching.
    BranchOffset,
    /// High half adjusted for the sign of the low half.
    HighAdjusted,
    LowSigned,
    High,
    Low,
    Negated,
    Register,
    NextRegister,
    Operand,
    ThirtyTwoMinus,
}

const CODES: [(&str, Code); 10] = [
    ("BROFF", Code::BranchOffset),
    ("VHP", Code::HighAdjusted),
    ("VLS", Code::LowSigned),
    ("VH", Code::High),
    ("VL", Code::Low),
    ("VN", Code::Negated),
    ("RG", Code::Register),
    ("NR", Code::NextRegister),
    ("OP", Code::Operand),
    ("S32", Code::ThirtyTwoMinus),
];

/// One piece of a template line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece<'a> {
    Text(&'a str),
    /// A code and its token index.
    Code(Code, usize),
    /// Offsets without and with delayed branching.
    BranchOffset(i32, i32),
}

/// Splits a template line such as `lw RG1,VLS2($1)` into text and codes.
pub fn pieces(template: &str) -> Vec<Piece<'_>> {
    let mut out = vec![];
    let mut text_start = 0;
    let mut i = 0;
    let bytes = template.as_bytes();
    while i < bytes.len() {
        let rest = &template[i..];
        let found = CODES.iter().find_map(|(name, code)| {
            let after = rest.strip_prefix(name)?;
            let digits: Vec<u32> = after.chars().take(2).map_while(|c| c.to_digit(10)).collect();
            match code {
                Code::BranchOffset if digits.len() == 2 => Some((
                    name.len() + 2,
                    Piece::BranchOffset(digits[0] as i32, digits[1] as i32),
                )),
                Code::BranchOffset => None,
                _ => digits.first().map(|d| (name.len() + 1, Piece::Code(*code, *d as usize))),
            }
        });
        match found {
            Some((len, piece)) => {
                if text_start < i {
                    out.push(Piece::Text(&template[text_start..i]));
                }
                out.push(piece);
                i += len;
                text_start = i;
            }
            None => i += rest.chars().next().map(char::len_utf8).unwrap_or(1),
        }
    }
    if text_start < template.len() {
        out.push(Piece::Text(&template[text_start..]));
    }
    out
}

fn parse_line(line: &str) -> Option<ExtendedInstruction> {
    let (body, description) = match line.split_once('#') {
        Some((body, description)) => (body, description.trim()),
        None => (line, ""),
    };
    let mut fields = body.split('|').map(str::trim).filter(|f| !f.is_empty());
    let example = fields.next()?;
    let mut templates = vec![];
    let mut compact: Option<Vec<String>> = None;
    for field in fields {
        if field == COMPACT {
            compact = Some(vec![]);
        } else if let Some(list) = compact.as_mut() {
            list.push(field.to_string());
        } else {
            templates.push(field.to_string());
        }
    }
    let mnemonic = example.split_whitespace().next()?.to_string();
    Some(ExtendedInstruction {
        mnemonic,
        example: example.to_string(),
        description: description.to_string(),
        tokens: example_tokens(example),
        templates,
        compact,
    })
}

/// Mnemonics defined by the table, without building the instructions.
pub(crate) fn mnemonics() -> impl Iterator<Item = &'static str> {
    TABLE
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_whitespace().next())
}

pub(crate) fn catalog() -> Vec<ExtendedInstruction> {
    TABLE
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(parse_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_pieces() {
        assert_eq!(
            pieces("lw RG1,VLS2($1)"),
            vec![
                Piece::Text("lw "),
                Piece::Code(Code::Register, 1),
                Piece::Text(","),
                Piece::Code(Code::LowSigned, 2),
                Piece::Text("($1)"),
            ]
        );
        assert_eq!(
            pieces("bne RG3,$0,BROFF12"),
            vec![
                Piece::Text("bne "),
                Piece::Code(Code::Register, 3),
                Piece::Text(",$0,"),
                Piece::BranchOffset(1, 2),
            ]
        );
        assert_eq!(pieces("srl $1,RG2,S323")[3], Piece::Code(Code::ThirtyTwoMinus, 3));
        assert_eq!(pieces("break"), vec![Piece::Text("break")]);
    }

    #[test]
    fn table_parses() {
        let catalog = catalog();
        let la = catalog
            .iter()
            .find(|e| e.example == "la $t1,label")
            .unwrap();
        assert_eq!(la.templates, vec!["lui $1,VH2", "ori RG1,$1,VL2"]);
        assert_eq!(la.compact.as_deref(), Some(&["addi RG1,$0,VLS2".to_string()][..]));
        assert!(la.description.starts_with("Load Address"));

        let div = catalog
            .iter()
            .find(|e| e.example == "div $t1,$t2,$t3")
            .unwrap();
        assert_eq!(div.length(false, false), 16);
        assert_eq!(div.length(false, true), 20);
        assert_eq!(mnemonics().count(), catalog.len());
    }
}
