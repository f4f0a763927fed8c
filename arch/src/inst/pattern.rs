use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PatternError {
    #[error("encoding `{0}` is not 32 bits long")]
    Length(String),

    #[error("encoding `{0}` has an unknown symbol `{1}`")]
    Symbol(String, char),

    #[error("encoding `{0}` splits operand `{1}` into pieces")]
    Split(String, char),
}

/// One operand's bit field inside the instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub shift: u32,
    pub width: u32,
}

impl Field {
    fn mask(self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            ((1u32 << self.width) - 1) << self.shift
        }
    }
}

/// Bit template such as `000000 sssss ttttt fffff 00000 100000`. Digits are
/// fixed bits; `f`, `s` and `t` mark the first, second and third operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub mask: u32,
    pub matches: u32,
    pub fields: Vec<Field>,
}

const OPERAND_SYMBOLS: [char; 3] = ['f', 's', 't'];

impl Pattern {
    pub fn parse(encoding: &str) -> Result<Self, PatternError> {
        let bits: Vec<char> = encoding.chars().filter(|c| !c.is_whitespace()).collect();
        if bits.len() != 32 {
            return Err(PatternError::Length(encoding.to_string()));
        }
        let mut mask = 0u32;
        let mut matches = 0u32;
        let mut spans: [Option<(u32, u32)>; 3] = [None; 3];
        for (i, c) in bits.iter().enumerate() {
            let pos = 31 - i as u32;
            match c {
                '0' => mask |= 1 << pos,
                '1' => {
                    mask |= 1 << pos;
                    matches |= 1 << pos;
                }
                _ => {
                    let Some(n) = OPERAND_SYMBOLS.iter().position(|s| s == c) else {
                        return Err(PatternError::Symbol(encoding.to_string(), *c));
                    };
                    spans[n] = match spans[n] {
                        None => Some((pos, pos)),
                        Some((high, low)) if low == pos + 1 => Some((high, pos)),
                        Some(_) => return Err(PatternError::Split(encoding.to_string(), *c)),
                    };
                }
            }
        }
        let fields = spans
            .iter()
            .map_while(|span| span.map(|(high, low)| Field { shift: low, width: high - low + 1 }))
            .collect();
        Ok(Self { mask, matches, fields })
    }

    pub fn is_match(&self, word: u32) -> bool {
        word & self.mask == self.matches
    }

    /// Places operand values into their fields, truncating to field width.
    pub fn encode(&self, operands: &[i32]) -> u32 {
        self.fields
            .iter()
            .zip(operands)
            .fold(self.matches, |word, (field, value)| {
                word | (((*value as u32) << field.shift) & field.mask())
            })
    }

    /// Extracts the raw unsigned field values.
    pub fn decode(&self, word: u32) -> Vec<i32> {
        self.fields
            .iter()
            .map(|field| ((word & field.mask()) >> field.shift) as i32)
            .collect()
    }

    pub fn width(&self, operand: usize) -> u32 {
        self.fields.get(operand).map(|f| f.width).unwrap_or(0)
    }

    /// Number of fixed bits; more fixed bits means a more specific decode.
    pub fn specificity(&self) -> u32 {
        self.mask.count_ones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_pattern() {
        let p = Pattern::parse("000000 sssss ttttt fffff 00000 100000").unwrap();
        assert_eq!(p.mask, 0xFC00_07FF);
        assert_eq!(p.matches, 0x0000_0020);
        // add $t1,$t2,$t3
        let word = p.encode(&[9, 10, 11]);
        assert_eq!(word, 0x014B_4820);
        assert!(p.is_match(word));
        assert_eq!(p.decode(word), vec![9, 10, 11]);
    }

    #[test]
    fn negative_immediate_truncates() {
        let p = Pattern::parse("001000 sssss fffff tttttttttttttttt").unwrap();
        let word = p.encode(&[8, 0, -1]);
        assert_eq!(word & 0xFFFF, 0xFFFF);
        assert_eq!(p.decode(word)[2], 0xFFFF);
    }

    #[test]
    fn bad_patterns() {
        assert!(matches!(Pattern::parse("0101"), Err(PatternError::Length(_))));
        assert!(matches!(
            Pattern::parse("000000 sssss fffff ssssssssssssssss"),
            Err(PatternError::Split(_, 's'))
        ));
        assert!(matches!(
            Pattern::parse("000000 xxxxx fffff ssssssssssssssss"),
            Err(PatternError::Symbol(_, 'x'))
        ));
    }
}
