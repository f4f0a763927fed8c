//! Line scanner and the `.include` / `.eqv` pre-passes.

use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::Arc;

use arch::directive::Directive;
use arch::token::{classify, is_identifier, Origin, Token, TokenKind};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{AsmError, ErrorList, ErrorMessage};

/// Where source text comes from. Paths given to `.include` are resolved
/// against the including file's directory.
pub trait SourceLoader {
    fn load(&self, path: &str) -> io::Result<String>;

    fn resolve(&self, includer: &str, name: &str) -> String {
        match Path::new(includer).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(name).to_string_lossy().into_owned(),
            _ => name.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FileLoader;

impl SourceLoader for FileLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// In-memory sources keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: IndexMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, source: &str) -> Self {
        self.files.insert(path.to_string(), source.to_string());
        self
    }

    pub fn insert(&mut self, path: &str, source: &str) {
        self.files.insert(path.to_string(), source.to_string());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

/// One source line after the pre-passes.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedLine {
    pub file: Arc<str>,
    pub line: usize,
    pub text: String,
    pub tokens: Vec<Token>,
}

impl TokenizedLine {
    /// Tokens with comments removed.
    pub fn code(&self) -> Vec<Token> {
        self.tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Comment)
            .cloned()
            .collect()
    }

    pub fn origin(&self) -> Origin {
        match self.tokens.first() {
            Some(t) => t.origin.clone(),
            None => Origin {
                file: self.file.clone(),
                line: self.line,
            },
        }
    }
}

/// Scans one line into tokens. Invalid lexemes become `Error` tokens and
/// are recorded in `errors`; scanning carries on past them.
pub fn tokenize_line(text: &str, file: &Arc<str>, line: usize, errors: &mut ErrorList) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens: Vec<Token> = vec![];
    let mut current = String::new();
    let mut start = 0;

    let flush = |current: &mut String, start: usize, tokens: &mut Vec<Token>, errors: &mut ErrorList| {
        if current.is_empty() {
            return;
        }
        let kind = classify(current);
        let tok = Token::new(kind, current.as_str(), file.clone(), line, start + 1);
        if kind == TokenKind::Error {
            errors.add(ErrorMessage::at(&tok, format!("Invalid language element: {}", current)));
        }
        tokens.push(tok);
        current.clear();
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '#' => {
                flush(&mut current, start, &mut tokens, errors);
                let rest: String = chars[i..].iter().collect();
                tokens.push(Token::new(TokenKind::Comment, rest, file.clone(), line, i + 1));
                break;
            }
            ' ' | '\t' | ',' => flush(&mut current, start, &mut tokens, errors),
            '"' if current.is_empty() => {
                let end = string_end(&chars, i);
                let raw: String = chars[i..end.unwrap_or(chars.len())].iter().collect();
                match end {
                    Some(end) => {
                        let raw: String = chars[i..end].iter().collect();
                        tokens.push(Token::new(TokenKind::QuotedString, raw, file.clone(), line, i + 1));
                        i = end;
                        continue;
                    }
                    None => {
                        let tok = Token::new(TokenKind::Error, raw, file.clone(), line, i + 1);
                        errors.add(ErrorMessage::at(&tok, "String is not terminated"));
                        tokens.push(tok);
                        break;
                    }
                }
            }
            '\'' if current.is_empty() => match char_literal(&chars, i) {
                Some((value, end)) => {
                    let value = value.to_string();
                    tokens.push(Token::new(classify(&value), value, file.clone(), line, i + 1));
                    i = end;
                    continue;
                }
                None => {
                    let raw: String = chars[i..].iter().take_while(|c| !c.is_whitespace()).collect();
                    let tok = Token::new(TokenKind::Error, raw.as_str(), file.clone(), line, i + 1);
                    errors.add(ErrorMessage::at(&tok, format!("Invalid character literal: {}", raw)));
                    i += raw.chars().count().max(1);
                    tokens.push(tok);
                    continue;
                }
            },
            '(' | ')' | ':' => {
                flush(&mut current, start, &mut tokens, errors);
                let s = c.to_string();
                tokens.push(Token::new(classify(&s), s, file.clone(), line, i + 1));
            }
            '+' | '-' => {
                if is_exponent(&current) {
                    current.push(c);
                } else {
                    flush(&mut current, start, &mut tokens, errors);
                    let next_is_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                    let after_identifier = tokens.last().is_some_and(|t| t.kind == TokenKind::Identifier);
                    if next_is_digit && !after_identifier {
                        start = i;
                        current.push(c);
                    } else {
                        let s = c.to_string();
                        tokens.push(Token::new(classify(&s), s, file.clone(), line, i + 1));
                    }
                }
            }
            _ => {
                if current.is_empty() {
                    start = i;
                }
                current.push(c);
            }
        }
        i += 1;
    }
    flush(&mut current, start, &mut tokens, errors);
    tokens
}

/// `1.5e` waiting for its exponent sign.
fn is_exponent(current: &str) -> bool {
    let body = current.trim_start_matches(['-', '+']);
    body.starts_with(|c: char| c.is_ascii_digit())
        && !body.starts_with("0x")
        && !body.starts_with("0X")
        && (body.ends_with('e') || body.ends_with('E'))
}

/// Index just past the closing quote of the string opening at `open`.
fn string_end(chars: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// `'a'` or `'\n'`, returning the code and the index past the literal.
fn char_literal(chars: &[char], open: usize) -> Option<(u32, usize)> {
    let first = *chars.get(open + 1)?;
    if first == '\\' {
        let rest: String = chars[open + 1..].iter().take(4).collect();
        let (value, used) = escape(&rest[1..])?;
        let close = open + 2 + used;
        (chars.get(close) == Some(&'\'')).then_some((value, close + 1))
    } else if first != '\'' {
        (chars.get(open + 2) == Some(&'\'')).then_some((first as u32, open + 3))
    } else {
        None
    }
}

/// Decodes the escape following a backslash. Returns the code and the
/// number of characters consumed.
fn escape(after: &str) -> Option<(u32, usize)> {
    let octal: String = after.chars().take(3).collect();
    if octal.len() == 3 && octal.chars().all(|c| ('0'..='7').contains(&c)) {
        return u32::from_str_radix(&octal, 8).ok().map(|v| (v & 0xFF, 3));
    }
    let value = match after.chars().next()? {
        'n' => '\n' as u32,
        't' => '\t' as u32,
        'r' => '\r' as u32,
        'b' => 0x08,
        'f' => 0x0C,
        '0' => 0,
        '\\' => '\\' as u32,
        '\'' => '\'' as u32,
        '"' => '"' as u32,
        _ => return None,
    };
    Some((value, 1))
}

/// Bytes of a quoted string token, escapes decoded.
pub fn unescape(raw: &str) -> Result<Vec<u8>, String> {
    let body = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| format!("{} is not a quoted string", raw))?;
    let mut out = vec![];
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            let mut buf = [0; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let (value, used) = escape(&body[i + 1..]).ok_or_else(|| format!("Illegal escape sequence in {}", raw))?;
        out.push(value as u8);
        for _ in 0..used {
            chars.next();
        }
    }
    Ok(out)
}

/// Replaces `(column, length)` character spans of `text`, leftmost first.
pub(crate) fn splice(text: &str, edits: &[(usize, usize, String)]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut at = 0;
    for (column, length, replacement) in edits {
        let from = (column - 1).clamp(at, chars.len());
        out.extend(&chars[at..from]);
        out.push_str(replacement);
        at = (from + length).min(chars.len());
    }
    out.extend(&chars[at..]);
    out
}

/// Runs the pre-passes over whole files: splices `.include`d files in
/// place and applies `.eqv` substitutions.
pub struct Tokenizer<'a> {
    loader: &'a dyn SourceLoader,
    errors: &'a mut ErrorList,
    equivalents: IndexMap<String, String>,
    include_stack: Vec<String>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(loader: &'a dyn SourceLoader, errors: &'a mut ErrorList) -> Self {
        Self {
            loader,
            errors,
            equivalents: IndexMap::new(),
            include_stack: vec![],
        }
    }

    /// Tokenizes a top-level source file.
    pub fn tokenize_file(&mut self, path: &str) -> Result<Vec<TokenizedLine>, AsmError> {
        trace!("tokenizing {}", path);
        let source = self.loader.load(path).map_err(|e| AsmError::Io(path.to_string(), e))?;
        self.equivalents.clear();
        self.include_stack = vec![path.to_string()];
        let lines = self.tokenize_source(path, &source);
        debug!("{}: {} lines, {} .eqv symbols", path, lines.len(), self.equivalents.len());
        Ok(lines)
    }

    fn tokenize_source(&mut self, path: &str, source: &str) -> Vec<TokenizedLine> {
        let file: Arc<str> = Arc::from(path);
        let mut out = vec![];
        for (index, text) in source.lines().enumerate() {
            let line = index + 1;
            let tokens = tokenize_line(text, &file, line, self.errors);
            if let Some(spliced) = self.include(&tokens, &file, line) {
                out.extend(spliced);
                continue;
            }
            let (text, tokens) = self.substitute(text, tokens, &file, line);
            out.push(TokenizedLine {
                file: file.clone(),
                line,
                text,
                tokens,
            });
        }
        out
    }

    /// Lines of the file named by an `.include` line, repositioned at the
    /// including line. `None` when the line is not an include.
    fn include(&mut self, tokens: &[Token], file: &Arc<str>, line: usize) -> Option<Vec<TokenizedLine>> {
        let first = tokens.iter().position(|t| t.kind == TokenKind::Directive)?;
        if first > 0 && !(first == 2 && tokens[1].kind == TokenKind::Colon) {
            return None;
        }
        if tokens[first].value.parse::<Directive>().ok()? != Directive::Include {
            return None;
        }
        let Some(name) = tokens.get(first + 1).filter(|t| t.kind == TokenKind::QuotedString) else {
            self.errors
                .add(ErrorMessage::at(&tokens[first], ".include requires a quoted file name"));
            return Some(vec![]);
        };
        let name = name.value.trim_matches('"');
        let path = self.loader.resolve(file, name);
        if self.include_stack.contains(&path) {
            self.errors.add(ErrorMessage::at(
                &tokens[first],
                format!("Recursive include of file {}", path),
            ));
            return Some(vec![]);
        }
        let source = match self.loader.load(&path) {
            Ok(source) => source,
            Err(e) => {
                self.errors.add(ErrorMessage::at(
                    &tokens[first],
                    format!("Error reading include file {}: {}", path, e),
                ));
                return Some(vec![]);
            }
        };
        trace!("including {} into {}:{}", path, file, line);
        self.include_stack.push(path.clone());
        let mut lines = self.tokenize_source(&path, &source);
        self.include_stack.pop();
        if first == 2 {
            lines.insert(
                0,
                TokenizedLine {
                    file: file.clone(),
                    line,
                    text: format!("{}:", tokens[0].value),
                    tokens: tokens[..2].to_vec(),
                },
            );
        }
        for spliced in lines.iter_mut() {
            spliced.file = file.clone();
            spliced.line = line;
            for tok in spliced.tokens.iter_mut() {
                tok.file = file.clone();
                tok.line = line;
            }
        }
        Some(lines)
    }

    /// Records an `.eqv` definition or rewrites uses of earlier ones.
    fn substitute(&mut self, text: &str, tokens: Vec<Token>, file: &Arc<str>, line: usize) -> (String, Vec<Token>) {
        let code: Vec<&Token> = tokens.iter().filter(|t| t.kind != TokenKind::Comment).collect();
        let is_eqv = code
            .first()
            .is_some_and(|t| t.kind == TokenKind::Directive && t.value.parse::<Directive>().ok() == Some(Directive::Eqv));
        if is_eqv {
            let protected = code.get(1).map(|t| t.column);
            let (text, tokens) = self.replace(text, tokens, protected, file, line);
            self.define(&text, &tokens);
            return (text, tokens);
        }
        self.replace(text, tokens, None, file, line)
    }

    fn define(&mut self, text: &str, tokens: &[Token]) {
        let code: Vec<&Token> = tokens.iter().filter(|t| t.kind != TokenKind::Comment).collect();
        if code.len() < 3 {
            if let Some(t) = code.first() {
                self.errors.add(ErrorMessage::at(t, "Too few operands for .eqv directive"));
            }
            return;
        }
        let name = code[1];
        if !is_identifier(&name.value) || name.kind == TokenKind::Directive {
            self.errors.add(ErrorMessage::at(
                name,
                format!("Malformed .eqv directive: {} is not a valid symbol", name.value),
            ));
            return;
        }
        // Body is the source text up to any comment, so literals keep their spelling.
        let chars: Vec<char> = text.chars().collect();
        let to = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Comment)
            .map_or(chars.len(), |t| t.column - 1);
        let from = (code[2].column - 1).min(to);
        let body: String = chars[from..to].iter().collect::<String>().trim().to_string();
        if code[2..].iter().any(|t| t.value == name.value) {
            self.errors.add(ErrorMessage::at(
                name,
                format!("Cannot substitute {} for itself in .eqv", name.value),
            ));
            return;
        }
        if let Some(previous) = self.equivalents.get(&name.value) {
            if *previous != body {
                self.errors.add(ErrorMessage::at(
                    name,
                    format!("{} is already defined as {}", name.value, previous),
                ));
            }
            return;
        }
        self.equivalents.insert(name.value.clone(), body);
    }

    /// Substitutes every identifier naming an `.eqv` symbol and rescans the
    /// rewritten text. Substituted text is not rescanned for symbols again.
    fn replace(
        &mut self,
        text: &str,
        tokens: Vec<Token>,
        protected: Option<usize>,
        file: &Arc<str>,
        line: usize,
    ) -> (String, Vec<Token>) {
        if self.equivalents.is_empty() {
            return (text.to_string(), tokens);
        }
        let mut seen = HashSet::new();
        let hits: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Identifier && Some(t.column) != protected)
            .filter(|t| self.equivalents.contains_key(&t.value))
            .collect();
        if hits.is_empty() {
            return (text.to_string(), tokens);
        }
        let mut edits = vec![];
        for hit in hits {
            if let Some(body) = self.equivalents.get(&hit.value) {
                edits.push((hit.column, hit.value.chars().count(), body.clone()));
                seen.insert(hit.value.clone());
            }
        }
        let out = splice(text, &edits);
        debug!("{}:{}: .eqv substituted {:?}", file, line, seen);
        // The raw line was already checked; only the rewritten tokens are kept.
        let rescanned = tokenize_line(&out, file, line, &mut ErrorList::default());
        (out, rescanned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> Vec<(TokenKind, String)> {
        let mut errors = ErrorList::default();
        tokenize_line(text, &Arc::from("t.s"), 1, &mut errors)
            .into_iter()
            .map(|t| (t.kind, t.value))
            .collect()
    }

    fn kinds(text: &str) -> Vec<TokenKind> {
        scan(text).into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn instruction_line() {
        use TokenKind::*;
        assert_eq!(
            kinds("main: lw $t1, -100($t2) # load"),
            vec![Identifier, Colon, Operator, RegisterName, Integer16, LeftParen, RegisterName, RightParen, Comment]
        );
    }

    #[test]
    fn plus_minus() {
        use TokenKind::*;
        assert_eq!(kinds("la $t0, label+4"), vec![Operator, RegisterName, Identifier, Plus, Integer5]);
        assert_eq!(kinds("la $t0, label - 4"), vec![Operator, RegisterName, Identifier, Minus, Integer5]);
        assert_eq!(kinds("addi $t0,$t0,-1"), vec![Operator, RegisterName, RegisterName, Integer16]);
        assert_eq!(scan(".word 1, -2")[2], (Integer16, "-2".to_string()));
        assert_eq!(scan(".float 1.2e-5")[1], (Float, "1.2e-5".to_string()));
    }

    #[test]
    fn strings_and_chars() {
        let toks = scan(r#"msg: .asciiz "say \"hi\"\n" # c"#);
        assert_eq!(toks[3], (TokenKind::QuotedString, r#""say \"hi\"\n""#.to_string()));
        assert_eq!(toks[4].0, TokenKind::Comment);
        assert_eq!(scan("li $a0, 'A'")[2], (TokenKind::Integer16U, "65".to_string()));
        assert_eq!(scan(r"li $a0, '\n'")[2], (TokenKind::Integer5, "10".to_string()));
        assert_eq!(unescape(r#""a\tb\101\0""#).unwrap(), b"a\tbA\0".to_vec());
    }

    #[test]
    fn errors_recorded_not_thrown() {
        let mut errors = ErrorList::default();
        let toks = tokenize_line("add 12ab, \"open", &Arc::from("t.s"), 3, &mut errors);
        assert_eq!(toks.len(), 3);
        assert_eq!(errors.error_count(), 2);
        assert_eq!(errors.messages()[0].column, 5);
    }

    #[test]
    fn include_and_eqv() {
        let loader = MemoryLoader::new()
            .with("dir/main.s", ".eqv SIZE 40\n.include \"defs.s\"\nli $t0, SIZE\n")
            .with("dir/defs.s", "x: .word SIZE\n");
        let mut errors = ErrorList::default();
        let lines = Tokenizer::new(&loader, &mut errors).tokenize_file("dir/main.s").unwrap();
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].text, "x: .word 40");
        assert_eq!(&*lines[1].file, "dir/main.s");
        assert_eq!(lines[1].line, 2);
        assert_eq!(&*lines[1].tokens[0].origin.file, "dir/defs.s");
        assert_eq!(lines[2].tokens[2].value, "40");
    }

    #[test]
    fn recursive_include() {
        let loader = MemoryLoader::new()
            .with("a.s", ".include \"b.s\"\n")
            .with("b.s", ".include \"a.s\"\n");
        let mut errors = ErrorList::default();
        Tokenizer::new(&loader, &mut errors).tokenize_file("a.s").unwrap();
        assert_eq!(errors.error_count(), 1);
        assert!(errors.messages()[0].message.starts_with("Recursive include"));
    }

    #[test]
    fn eqv_character_literals() {
        let loader = MemoryLoader::new().with("m.s", ".eqv C 'A' # letter\n.eqv NL '\\n'\nli $a0, C\nli $a1, NL\n");
        let mut errors = ErrorList::default();
        let lines = Tokenizer::new(&loader, &mut errors).tokenize_file("m.s").unwrap();
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(lines[2].text, "li $a0, 'A'");
        assert_eq!(lines[2].tokens[2].value, "65");
        assert_eq!(lines[3].text, r"li $a1, '\n'");
        assert_eq!(lines[3].tokens[2].value, "10");
    }

    #[test]
    fn substituted_line_reports_once() {
        let loader = MemoryLoader::new().with("m.s", ".eqv N 4\nadd 12ab, N\n");
        let mut errors = ErrorList::default();
        let lines = Tokenizer::new(&loader, &mut errors).tokenize_file("m.s").unwrap();
        assert_eq!(errors.error_count(), 1);
        assert_eq!(lines[1].text, "add 12ab, 4");
        assert!(lines[1].tokens.iter().all(|t| t.origin.line == 2 && &*t.origin.file == "m.s"));
    }

    #[test]
    fn labeled_include_keeps_label() {
        let loader = MemoryLoader::new()
            .with("main.s", "lab: .include \"f.s\"\n")
            .with("f.s", "nop\n");
        let mut errors = ErrorList::default();
        let lines = Tokenizer::new(&loader, &mut errors).tokenize_file("main.s").unwrap();
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "lab:");
        assert_eq!(lines[0].code()[0].value, "lab");
        assert_eq!(lines[1].text, "nop");
        assert_eq!(lines[1].line, 1);
    }

    #[test]
    fn eqv_redefinition() {
        let loader = MemoryLoader::new().with("m.s", ".eqv N 1\n.eqv N 2\n.eqv M M\n");
        let mut errors = ErrorList::default();
        Tokenizer::new(&loader, &mut errors).tokenize_file("m.s").unwrap();
        assert_eq!(errors.error_count(), 2);
    }
}
