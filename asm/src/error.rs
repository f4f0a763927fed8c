use std::fmt;
use std::sync::Arc;

use arch::token::Token;
use color_print::{cformat, cprintln};
use indexmap::IndexMap;
use thiserror::Error;

pub const DEFAULT_ERROR_LIMIT: usize = 200;

/// One error or warning, positioned where the offending text was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub file: Arc<str>,
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub warning: bool,
    /// Source lines of the macro calls that produced the line, outermost
    /// first, e.g. `12->5`.
    pub macro_expansion_history: Vec<usize>,
}

impl ErrorMessage {
    pub fn new(file: Arc<str>, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            file,
            line,
            column,
            message: message.into(),
            warning: false,
            macro_expansion_history: vec![],
        }
    }

    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        Self::new(token.origin.file.clone(), token.origin.line, token.column, message)
    }

    pub fn warning(mut self) -> Self {
        self.warning = true;
        self
    }

    pub fn history(mut self, lines: &[usize]) -> Self {
        self.macro_expansion_history = lines.to_vec();
        self
    }

    fn location(&self) -> String {
        let mut out = format!("{}:{}:{}", self.file, self.line, self.column);
        if !self.macro_expansion_history.is_empty() {
            let chain: Vec<String> = self.macro_expansion_history.iter().map(usize::to_string).collect();
            out.push_str(&format!(" (macro expansion {}->{})", chain.join("->"), self.line));
        }
        out
    }

    /// Prints the message with the offending source line underneath.
    pub fn print_diag(&self, files: &IndexMap<String, Vec<String>>) {
        if self.warning {
            cprintln!("<yellow,bold>warning</>: {}", self.message);
        } else {
            cprintln!("<red,bold>error</>: {}", self.message);
        }
        cprintln!("     <blue>--></> <underline>{}</>", self.location());
        cprintln!("      <blue>|</>");
        let content = files
            .get(self.file.as_ref())
            .and_then(|lines| lines.get(self.line.wrapping_sub(1)))
            .map(|s| s.as_str())
            .unwrap_or("");
        cprintln!(" <blue>{:>4} |</> {}", self.line, content);
        if self.column > 0 {
            cprintln!("      <blue>|</> {}<red>^</>", " ".repeat(self.column - 1));
        } else {
            cprintln!("      <blue>|</>");
        }
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.warning { "Warning" } else { "Error" };
        write!(f, "{} in {}: {}", kind, self.location(), self.message)
    }
}

/// Errors and warnings in the order they were found. Once more than
/// `limit` errors are recorded the list refuses further entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorList {
    messages: Vec<ErrorMessage>,
    errors: usize,
    warnings: usize,
    limit: usize,
}

impl Default for ErrorList {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LIMIT)
    }
}

impl ErrorList {
    pub fn new(limit: usize) -> Self {
        Self {
            messages: vec![],
            errors: 0,
            warnings: 0,
            limit,
        }
    }

    pub fn add(&mut self, message: ErrorMessage) {
        if self.limit_exceeded() {
            return;
        }
        if message.warning {
            self.warnings += 1;
        } else {
            self.errors += 1;
        }
        self.messages.push(message);
        if self.limit_exceeded() {
            let last = &self.messages[self.messages.len() - 1];
            let note = ErrorMessage::new(
                last.file.clone(),
                last.line,
                0,
                format!("Error Limit of {} exceeded.", self.limit),
            );
            self.messages.push(note);
        }
    }

    pub fn limit_exceeded(&self) -> bool {
        self.errors > self.limit
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn errors_occurred(&self) -> bool {
        self.errors > 0
    }

    pub fn warnings_occurred(&self) -> bool {
        self.warnings > 0
    }

    pub fn messages(&self) -> &[ErrorMessage] {
        &self.messages
    }

    pub fn errors(&self) -> impl Iterator<Item = &ErrorMessage> {
        self.messages.iter().filter(|m| !m.warning)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ErrorMessage> {
        self.messages.iter().filter(|m| m.warning)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Every error, then a summary line.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for m in self.errors() {
            out.push_str(&m.to_string());
            out.push('\n');
        }
        out.push_str(&format!("{} error(s), {} warning(s)", self.errors, self.warnings));
        out
    }

    pub fn print_diag(&self, files: &IndexMap<String, Vec<String>>) {
        for m in &self.messages {
            m.print_diag(files);
        }
        let summary = cformat!("<bold>{} error(s), {} warning(s)</>", self.errors, self.warnings);
        println!("{}", summary);
    }
}

#[derive(Error, Debug)]
pub enum AsmError {
    #[error("assembly failed with {} error(s)", .0.error_count())]
    Failed(ErrorList),

    #[error("failed to read {0}")]
    Io(String, #[source] std::io::Error),

    #[error("failed to write {0}")]
    Write(String, #[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(line: usize) -> ErrorMessage {
        ErrorMessage::new(Arc::from("main.s"), line, 3, "bad")
    }

    #[test]
    fn limit_stops_collection() {
        let mut list = ErrorList::new(2);
        for line in 1..=5 {
            list.add(message(line));
        }
        assert!(list.limit_exceeded());
        assert_eq!(list.error_count(), 3);
        assert_eq!(list.messages().last().map(|m| m.message.as_str()), Some("Error Limit of 2 exceeded."));
    }

    #[test]
    fn warnings_counted_apart() {
        let mut list = ErrorList::default();
        list.add(message(1).warning());
        assert!(!list.errors_occurred());
        assert!(list.warnings_occurred());
        assert_eq!(list.warnings().count(), 1);
    }

    #[test]
    fn display_with_history() {
        let m = message(5).history(&[12]);
        assert_eq!(m.to_string(), "Error in main.s:5:3 (macro expansion 12->5): bad");
    }
}
