//! Macro definitions of one program and their textual expansion.

use std::sync::Arc;

use arch::token::{is_macro_parameter, Origin, Token, TokenKind};
use tracing::trace;

use crate::error::{ErrorList, ErrorMessage};
use crate::lexer::{splice, tokenize_line, TokenizedLine};

#[derive(Debug, Clone)]
pub struct Macro {
    pub name: String,
    pub params: Vec<String>,
    pub file: Arc<str>,
    /// Lines of `.macro` and `.end_macro`.
    pub from_line: usize,
    pub to_line: usize,
    pub body: Vec<TokenizedLine>,
    /// Labels defined in the body, renamed on every expansion.
    pub labels: Vec<String>,
}

impl Macro {
    /// Body lines with `args` substituted for the parameters and body
    /// labels suffixed with `_M<counter>`, each line rescanned.
    pub fn expand(&self, args: &[Token], counter: usize, errors: &mut ErrorList) -> Vec<TokenizedLine> {
        self.body
            .iter()
            .map(|line| {
                let edits: Vec<(usize, usize, String)> = line
                    .tokens
                    .iter()
                    .filter_map(|tok| {
                        let replacement = self.substitute(tok, args, counter)?;
                        Some((tok.column, tok.value.chars().count(), replacement))
                    })
                    .collect();
                let text = splice(&line.text, &edits);
                let origin = line.origin();
                let mut tokens = tokenize_line(&text, &line.file, line.line, errors);
                for tok in tokens.iter_mut() {
                    tok.origin = origin.clone();
                }
                TokenizedLine {
                    file: line.file.clone(),
                    line: line.line,
                    text,
                    tokens,
                }
            })
            .collect()
    }

    fn substitute(&self, tok: &Token, args: &[Token], counter: usize) -> Option<String> {
        match tok.kind {
            TokenKind::MacroParameter => {
                let index = self.params.iter().position(|p| *p == tok.value)?;
                args.get(index).map(|a| a.value.clone())
            }
            kind if kind.is_label_like() && self.labels.contains(&tok.value) => {
                Some(format!("{}_M{}", tok.value, counter))
            }
            _ => None,
        }
    }
}

/// Macros of one program, the definition in progress and the expansion
/// call stack.
#[derive(Debug, Default)]
pub struct MacroPool {
    macros: Vec<Macro>,
    current: Option<Macro>,
    counter: usize,
    /// Source lines of the calls being expanded.
    call_stack: Vec<Origin>,
}

impl MacroPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_definition(&self) -> bool {
        self.current.is_some()
    }

    /// Starts a definition from the tokens of a `.macro` line.
    pub fn begin_macro(&mut self, tokens: &[Token], errors: &mut ErrorList) {
        let directive = &tokens[0];
        if self.current.is_some() {
            errors.add(ErrorMessage::at(directive, "Nested macro definitions are not allowed"));
            return;
        }
        let Some(name) = tokens.get(1).filter(|t| t.kind.is_label_like()) else {
            errors.add(ErrorMessage::at(directive, "Macro name is missing or invalid"));
            return;
        };
        let mut params = vec![];
        for tok in &tokens[2..] {
            match tok.kind {
                TokenKind::LeftParen | TokenKind::RightParen => {}
                _ if is_macro_parameter(&tok.value) => params.push(tok.value.clone()),
                _ => errors.add(ErrorMessage::at(
                    tok,
                    format!("Invalid macro parameter: {}", tok.value),
                )),
            }
        }
        self.current = Some(Macro {
            name: name.value.clone(),
            params,
            file: directive.origin.file.clone(),
            from_line: directive.origin.line,
            to_line: 0,
            body: vec![],
            labels: vec![],
        });
    }

    /// Appends a body line, noting any label it defines.
    pub fn add_line(&mut self, line: TokenizedLine) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let code = line.code();
        if code.len() >= 2 && code[0].kind.is_label_like() && code[1].kind == TokenKind::Colon {
            current.labels.push(code[0].value.clone());
        }
        current.body.push(line);
    }

    /// Finishes the definition at `.end_macro`. Redefining a name with the
    /// same arity in one program is an error.
    pub fn commit(&mut self, end: &Token, errors: &mut ErrorList) {
        let Some(mut finished) = self.current.take() else {
            errors.add(ErrorMessage::at(end, "invalid .end_macro without matching .macro"));
            return;
        };
        finished.to_line = end.origin.line;
        let duplicate = self
            .macros
            .iter()
            .any(|m| m.name == finished.name && m.params.len() == finished.params.len() && m.file == finished.file);
        if duplicate {
            errors.add(ErrorMessage::at(
                end,
                format!("Duplicate macro definition: {} ({} params)", finished.name, finished.params.len()),
            ));
            return;
        }
        trace!("macro {}/{} defined", finished.name, finished.params.len());
        self.macros.push(finished);
    }

    /// Abandons an unterminated definition, returning it.
    pub fn abandon(&mut self) -> Option<Macro> {
        self.current.take()
    }

    /// The latest macro named by `tokens[0]` taking the remaining tokens as
    /// arguments.
    pub fn find_match(&self, tokens: &[Token]) -> Option<&Macro> {
        let name = tokens.first()?;
        let arity = tokens.len() - 1;
        self.macros
            .iter()
            .rev()
            .find(|m| m.name == name.value && m.params.len() == arity)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.macros.iter().any(|m| m.name == name)
    }

    /// Enters an expansion called from `line`. False when that line is
    /// already being expanded.
    pub fn push_call(&mut self, line: Origin) -> bool {
        if self.call_stack.contains(&line) {
            return false;
        }
        self.call_stack.push(line);
        true
    }

    pub fn pop_call(&mut self) {
        self.call_stack.pop();
    }

    pub fn next_counter(&mut self) -> usize {
        self.counter += 1;
        self.counter
    }
}

/// `name (a, b)` call syntax, reduced to `name a b`.
pub fn strip_call_parens(tokens: &[Token]) -> Vec<Token> {
    let wrapped = tokens.len() >= 3
        && tokens[1].kind == TokenKind::LeftParen
        && tokens[tokens.len() - 1].kind == TokenKind::RightParen;
    if wrapped {
        let mut out = vec![tokens[0].clone()];
        out.extend_from_slice(&tokens[2..tokens.len() - 1]);
        out
    } else {
        tokens.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, text: &str, errors: &mut ErrorList) -> TokenizedLine {
        let file: Arc<str> = Arc::from("m.s");
        TokenizedLine {
            file: file.clone(),
            line: n,
            text: text.to_string(),
            tokens: tokenize_line(text, &file, n, errors),
        }
    }

    #[test]
    fn define_and_expand() {
        let mut errors = ErrorList::default();
        let mut pool = MacroPool::new();
        let head = line(1, ".macro swap (%a, %b)", &mut errors);
        pool.begin_macro(&head.code(), &mut errors);
        pool.add_line(line(2, "loop: move $at, %a", &mut errors));
        pool.add_line(line(3, "move %a, %b", &mut errors));
        pool.add_line(line(4, "b loop", &mut errors));
        let end = line(5, ".end_macro", &mut errors);
        pool.commit(&end.code()[0], &mut errors);
        assert!(errors.is_empty(), "{:?}", errors);

        let call = strip_call_parens(&line(9, "swap ($t0, $t1)", &mut errors).code());
        assert_eq!(call.len(), 3);
        let found = pool.find_match(&call).unwrap().clone();
        assert_eq!(found.labels, vec!["loop"]);
        let n = pool.next_counter();
        let lines = found.expand(&call[1..], n, &mut errors);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["loop_M1: move $at, $t0", "move $t0, $t1", "b loop_M1"]);
        assert_eq!(lines[1].tokens[1].kind, TokenKind::RegisterName);
        assert!(pool.find_match(&call[..2]).is_none());
    }

    #[test]
    fn latest_definition_wins() {
        let mut errors = ErrorList::default();
        let mut pool = MacroPool::new();
        for (n, body) in [(1, "nop"), (10, "syscall"), (20, "break")] {
            let mut head = line(n, ".macro m", &mut errors).code();
            if n == 10 {
                // Same name and arity from an included file.
                head[0].origin.file = Arc::from("inc.s");
            }
            pool.begin_macro(&head, &mut errors);
            pool.add_line(line(n + 1, body, &mut errors));
            let end = line(n + 2, ".end_macro", &mut errors).code();
            pool.commit(&end[0], &mut errors);
        }
        assert_eq!(errors.error_count(), 1);
        let call = line(30, "m", &mut errors).code();
        assert_eq!(pool.find_match(&call).unwrap().body[0].text, "syscall");
    }

    #[test]
    fn nesting_and_stray_end() {
        let mut errors = ErrorList::default();
        let mut pool = MacroPool::new();
        pool.begin_macro(&line(1, ".macro a", &mut errors).code(), &mut errors);
        pool.begin_macro(&line(2, ".macro b", &mut errors).code(), &mut errors);
        let end = line(3, ".end_macro", &mut errors).code();
        pool.commit(&end[0], &mut errors);
        pool.commit(&end[0], &mut errors);
        assert_eq!(errors.error_count(), 2);
    }

    #[test]
    fn call_stack_detects_loops() {
        let mut pool = MacroPool::new();
        let at = |line| Origin {
            file: Arc::from("m.s"),
            line,
        };
        assert!(pool.push_call(at(3)));
        assert!(pool.push_call(at(7)));
        assert!(!pool.push_call(at(7)));
        pool.pop_call();
        assert!(pool.push_call(at(7)));
    }
}
