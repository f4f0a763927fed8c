use std::sync::Arc;

use strum::Display;

use crate::bits;
use crate::directive::Directive;
use crate::inst::set::is_mnemonic;
use crate::reg::{self, Reg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Comment,
    Directive,
    Operator,
    Identifier,
    RegisterName,
    RegisterNumber,
    FpRegisterName,
    Integer5,
    Integer16,
    Integer16U,
    Integer32,
    Float,
    Double,
    QuotedString,
    Colon,
    Comma,
    LeftParen,
    RightParen,
    Plus,
    Minus,
    MacroParameter,
    Error,
}

impl TokenKind {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            TokenKind::Integer5 | TokenKind::Integer16 | TokenKind::Integer16U | TokenKind::Integer32
        )
    }

    pub fn is_real(self) -> bool {
        matches!(self, TokenKind::Float | TokenKind::Double)
    }

    pub fn is_register(self) -> bool {
        matches!(self, TokenKind::RegisterName | TokenKind::RegisterNumber)
    }

    /// Kinds usable as a label name.
    pub fn is_label_like(self) -> bool {
        matches!(self, TokenKind::Identifier | TokenKind::Operator)
    }
}

/// Where a token was written before `.include` splicing moved it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file: Arc<str>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub file: Arc<str>,
    pub line: usize,
    pub column: usize,
    pub origin: Origin,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, file: Arc<str>, line: usize, column: usize) -> Self {
        let origin = Origin {
            file: file.clone(),
            line,
        };
        Self {
            kind,
            value: value.into(),
            file,
            line,
            column,
            origin,
        }
    }

    /// Token that does not come from any source file.
    pub fn synthetic(value: &str) -> Self {
        Self::new(classify(value), value, Arc::from(""), 0, 0)
    }

    pub fn int_value(&self) -> Option<i32> {
        if self.kind.is_integer() {
            bits::parse_int(&self.value)
        } else {
            None
        }
    }

    pub fn register(&self) -> Option<usize> {
        match self.kind {
            TokenKind::RegisterName | TokenKind::RegisterNumber => Reg::parse(&self.value).map(Reg::num),
            TokenKind::FpRegisterName => reg::parse_fp_register(&self.value).map(usize::from),
            _ => None,
        }
    }
}

/// Classifies one lexeme. The order of the checks matters: a directive or
/// register name is never an identifier, and a small integer is the
/// narrowest integer kind it fits.
pub fn classify(value: &str) -> TokenKind {
    let Some(first) = value.chars().next() else {
        return TokenKind::Error;
    };
    if first == '\'' {
        return TokenKind::Error;
    }
    if first == '#' {
        return TokenKind::Comment;
    }
    if value.len() == 1 {
        match first {
            '(' => return TokenKind::LeftParen,
            ')' => return TokenKind::RightParen,
            ':' => return TokenKind::Colon,
            ',' => return TokenKind::Comma,
            '+' => return TokenKind::Plus,
            '-' => return TokenKind::Minus,
            _ => {}
        }
    }
    if first == '"' {
        return TokenKind::QuotedString;
    }
    if first == '$' {
        if Reg::parse_name(value).is_some() {
            return TokenKind::RegisterName;
        }
        if Reg::parse_number(value).is_some() {
            return TokenKind::RegisterNumber;
        }
        if reg::parse_fp_register(value).is_some() {
            return TokenKind::FpRegisterName;
        }
    }
    if is_macro_parameter(value) {
        return TokenKind::MacroParameter;
    }
    if is_mnemonic(value) {
        return TokenKind::Operator;
    }
    if first == '.' && value.parse::<Directive>().is_ok() {
        return TokenKind::Directive;
    }
    if let Some(n) = bits::parse_int(value) {
        return classify_integer(n);
    }
    if let Some(kind) = classify_real(value) {
        return kind;
    }
    if is_identifier(value) {
        return TokenKind::Identifier;
    }
    TokenKind::Error
}

pub fn classify_integer(n: i32) -> TokenKind {
    match n {
        0..=31 => TokenKind::Integer5,
        0..=0xFFFF => TokenKind::Integer16U,
        -0x8000..=0x7FFF => TokenKind::Integer16,
        _ => TokenKind::Integer32,
    }
}

fn classify_real(value: &str) -> Option<TokenKind> {
    let body = value.strip_prefix(['-', '+']).unwrap_or(value);
    let starts_numeric = body.starts_with(|c: char| c.is_ascii_digit() || c == '.');
    if !starts_numeric || !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let parsed = value.parse::<f64>().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    if parsed.abs() <= f32::MAX as f64 {
        Some(TokenKind::Float)
    } else {
        Some(TokenKind::Double)
    }
}

/// `%name`, or `$name` when it is not a register.
pub fn is_macro_parameter(value: &str) -> bool {
    let rest = match value.strip_prefix('%').or_else(|| value.strip_prefix('$')) {
        Some(rest) => rest,
        None => return false,
    };
    if value.starts_with('$') && (Reg::parse(value).is_some() || reg::parse_fp_register(value).is_some()) {
        return false;
    }
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
}
