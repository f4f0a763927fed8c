//! Two-pass assembler.
//!
//! Pass 1 walks every file's lines, recording labels, running directives
//! (data is written to memory immediately) and matching instructions to
//! learn their length. After all files, `.globl` symbols and pending data
//! references are resolved. Pass 2 expands pseudo instructions into basic
//! ones and resolves label operands; code generation places every
//! statement in memory and sorts them by address.

use std::cell::RefCell;
use std::io;
use std::sync::Arc;

use arch::bits::to_hex_string;
use arch::directive::Directive;
use arch::inst::set::INSTRUCTION_SET;
use arch::inst::{BasicInstruction, Format, Instruction};
use arch::memory::{Memory, MemoryConfiguration};
use arch::statement::{ProgramStatement, SourceLine};
use arch::token::{Token, TokenKind};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::error::{AsmError, ErrorList, ErrorMessage, DEFAULT_ERROR_LIMIT};
use crate::lexer::{tokenize_line, FileLoader, MemoryLoader, SourceLoader, TokenizedLine, Tokenizer};
use crate::macros::{strip_call_parens, Macro, MacroPool};
use crate::matcher::{best_match, check};
use crate::symbols::{local_or_global, Symbol, SymbolTable};
use crate::template::{expand, Operands};

#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    /// Accept pseudo instructions.
    pub extended: bool,
    pub warnings_are_errors: bool,
    pub delayed_branching: bool,
    /// Require register numbers.
    pub bare_machine: bool,
    pub big_endian: bool,
    pub self_modifying_code: bool,
    pub error_limit: usize,
    pub memory_configuration: MemoryConfiguration,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            extended: true,
            warnings_are_errors: false,
            delayed_branching: false,
            bare_machine: false,
            big_endian: false,
            self_modifying_code: false,
            error_limit: DEFAULT_ERROR_LIMIT,
            memory_configuration: MemoryConfiguration::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment {
    Text,
    Data,
    KernelText,
    KernelData,
}

impl Segment {
    pub(crate) fn is_data(self) -> bool {
        matches!(self, Segment::Data | Segment::KernelData)
    }
}

/// An instruction as matched in pass 1.
#[derive(Debug, Clone)]
pub(crate) struct PendingStatement {
    instruction: &'static Instruction,
    tokens: Vec<Token>,
    source: SourceLine,
    address: u32,
    history: Vec<usize>,
}

/// A data item naming a label not yet defined.
#[derive(Debug, Clone)]
pub(crate) struct ForwardRef {
    pub(crate) address: u32,
    pub(crate) length: u32,
    pub(crate) token: Token,
    pub(crate) history: Vec<usize>,
}

/// Pass 1 state of one source file.
pub(crate) struct FileState {
    pub(crate) path: Arc<str>,
    pub(crate) local: SymbolTable,
    pub(crate) macros: MacroPool,
    pub(crate) globals: Vec<Token>,
    /// Data directive that bare value lines continue.
    pub(crate) data_directive: Option<Directive>,
    pub(crate) statements: Vec<PendingStatement>,
    pub(crate) forward_refs: Vec<ForwardRef>,
}

impl FileState {
    fn new(path: &str) -> Self {
        Self {
            path: Arc::from(path),
            local: SymbolTable::new(path),
            macros: MacroPool::new(),
            globals: vec![],
            data_directive: None,
            statements: vec![],
            forward_refs: vec![],
        }
    }
}

/// Keeps the raw lines of every file read, for diagnostics and listings.
struct RecordingLoader<'a> {
    inner: &'a dyn SourceLoader,
    sources: RefCell<IndexMap<String, Vec<String>>>,
}

impl SourceLoader for RecordingLoader<'_> {
    fn load(&self, path: &str) -> io::Result<String> {
        let text = self.inner.load(path)?;
        self.sources
            .borrow_mut()
            .insert(path.to_string(), text.lines().map(str::to_string).collect());
        Ok(text)
    }

    fn resolve(&self, includer: &str, name: &str) -> String {
        self.inner.resolve(includer, name)
    }
}

/// Result of a successful assembly.
pub struct AssembledProgram {
    /// Memory holding the data and text segments.
    pub memory: Memory,
    /// Basic statements sorted by address.
    pub statements: Vec<ProgramStatement>,
    pub global_symbols: SymbolTable,
    pub local_symbols: Vec<SymbolTable>,
    pub warnings: ErrorList,
    /// Raw lines of every file read, keyed by path.
    pub sources: IndexMap<String, Vec<String>>,
}

impl AssembledProgram {
    /// Address of a global label, or of the first file's local one.
    pub fn symbol(&self, name: &str) -> Option<u32> {
        self.global_symbols
            .address(name)
            .or_else(|| self.local_symbols.iter().find_map(|t| t.address(name)))
    }

    pub fn statement_at(&self, address: u32) -> Option<&ProgramStatement> {
        self.statements
            .binary_search_by_key(&address, |s| s.address)
            .ok()
            .map(|i| &self.statements[i])
    }
}

pub struct Assembler {
    pub(crate) options: AssemblerOptions,
    pub(crate) memory: Memory,
    pub(crate) errors: ErrorList,
    pub(crate) global: SymbolTable,
    pub(crate) segment: Segment,
    pub(crate) text_address: u32,
    pub(crate) data_address: u32,
    pub(crate) kernel_text_address: u32,
    pub(crate) kernel_data_address: u32,
    pub(crate) extern_address: u32,
    pub(crate) auto_align: bool,
    sources: IndexMap<String, Vec<String>>,
}

impl Assembler {
    pub fn new(options: AssemblerOptions) -> Self {
        let config = options.memory_configuration.clone();
        let mut memory = Memory::new(config.clone());
        memory.big_endian = options.big_endian;
        memory.self_modifying_code = options.self_modifying_code;
        Self {
            errors: ErrorList::new(options.error_limit),
            global: SymbolTable::new("(global)"),
            segment: Segment::Text,
            text_address: config.text_base,
            data_address: config.data_base,
            kernel_text_address: config.kernel_text_base,
            kernel_data_address: config.kernel_data_base,
            extern_address: config.extern_base,
            auto_align: true,
            sources: IndexMap::new(),
            memory,
            options,
        }
    }

    /// Raw lines of the files read so far, for printing diagnostics.
    pub fn sources(&self) -> &IndexMap<String, Vec<String>> {
        &self.sources
    }

    pub fn assemble_files(&mut self, paths: &[String]) -> Result<AssembledProgram, AsmError> {
        self.assemble(&FileLoader, paths)
    }

    /// Assembles a single in-memory file named `main.s`.
    pub fn assemble_str(&mut self, source: &str) -> Result<AssembledProgram, AsmError> {
        let loader = MemoryLoader::new().with("main.s", source);
        self.assemble(&loader, &["main.s".to_string()])
    }

    pub fn assemble(&mut self, loader: &dyn SourceLoader, paths: &[String]) -> Result<AssembledProgram, AsmError> {
        let recording = RecordingLoader {
            inner: loader,
            sources: RefCell::new(IndexMap::new()),
        };
        trace!("starting pass 1");
        let mut files = vec![];
        for path in paths {
            let lines = Tokenizer::new(&recording, &mut self.errors).tokenize_file(path);
            self.sources.extend(recording.sources.borrow_mut().drain(..));
            let file = self.pass1_file(path, &lines?);
            files.push(file);
            if self.errors.limit_exceeded() {
                return Err(AsmError::Failed(self.errors.clone()));
            }
        }

        trace!("resolving forward references");
        let pending: Vec<ForwardRef> = files.iter_mut().flat_map(|f| std::mem::take(&mut f.forward_refs)).collect();
        for fref in pending {
            match self.global.address(&fref.token.value) {
                Some(address) => self.write_forward(&fref, address),
                None => self.error(
                    &fref.token,
                    format!("Symbol \"{}\" not found in symbol table.", fref.token.value),
                    &fref.history,
                ),
            }
        }
        debug!("global symbols: {}", self.global.len());

        trace!("starting pass 2");
        let mut statements = vec![];
        for file in &files {
            for pending in &file.statements {
                if self.errors.limit_exceeded() {
                    break;
                }
                self.pass2_statement(pending, &file.local, &mut statements);
            }
        }

        trace!("generating code");
        self.generate(&mut statements);

        let failed = self.errors.errors_occurred()
            || (self.options.warnings_are_errors && self.errors.warnings_occurred());
        if failed {
            return Err(AsmError::Failed(self.errors.clone()));
        }
        let config = self.options.memory_configuration.clone();
        Ok(AssembledProgram {
            memory: std::mem::replace(&mut self.memory, Memory::new(config)),
            statements,
            global_symbols: self.global.clone(),
            local_symbols: files.into_iter().map(|f| f.local).collect(),
            warnings: self.errors.clone(),
            sources: self.sources.clone(),
        })
    }

    pub(crate) fn error(&mut self, tok: &Token, message: impl Into<String>, history: &[usize]) {
        self.errors.add(ErrorMessage::at(tok, message).history(history));
    }

    pub(crate) fn warning(&mut self, tok: &Token, message: impl Into<String>, history: &[usize]) {
        let message = message.into();
        warn!("{}:{}: {}", tok.origin.file, tok.origin.line, message);
        self.errors.add(ErrorMessage::at(tok, message).warning().history(history));
    }

    fn compact(&self) -> bool {
        self.memory.config().is_compact()
    }

    pub(crate) fn text_cursor(&mut self) -> &mut u32 {
        match self.segment {
            Segment::KernelText => &mut self.kernel_text_address,
            _ => &mut self.text_address,
        }
    }

    pub(crate) fn data_cursor(&mut self) -> &mut u32 {
        match self.segment {
            Segment::KernelData => &mut self.kernel_data_address,
            _ => &mut self.data_address,
        }
    }

    // ------------------------------------------------------------------------
    // Pass 1

    fn pass1_file(&mut self, path: &str, lines: &[TokenizedLine]) -> FileState {
        let mut file = FileState::new(path);
        self.segment = Segment::Text;
        self.auto_align = true;
        for line in lines {
            if self.errors.limit_exceeded() {
                break;
            }
            self.parse_line(&mut file, line, &[]);
        }
        if let Some(unterminated) = file.macros.abandon() {
            self.errors.add(ErrorMessage::new(
                unterminated.file.clone(),
                unterminated.from_line,
                0,
                format!("Macro \"{}\" is missing .end_macro", unterminated.name),
            ));
        }

        let refs = std::mem::take(&mut file.forward_refs);
        for fref in refs {
            match file.local.address(&fref.token.value) {
                Some(address) => self.write_forward(&fref, address),
                None => file.forward_refs.push(fref),
            }
        }
        self.transfer_globals(&mut file);
        debug!(
            "{}: {} local symbols, {} statements, {} unresolved data references",
            path,
            file.local.len(),
            file.statements.len(),
            file.forward_refs.len()
        );
        file
    }

    fn parse_line(&mut self, file: &mut FileState, line: &TokenizedLine, history: &[usize]) {
        let mut tokens = line.code();
        if tokens.is_empty() || tokens.iter().any(|t| t.kind == TokenKind::Error) {
            return;
        }
        if file.macros.in_definition() {
            match directive_of(&tokens[0]) {
                Some(Directive::EndMacro) => file.macros.commit(&tokens[0], &mut self.errors),
                Some(Directive::Macro) => file.macros.begin_macro(&tokens, &mut self.errors),
                _ => file.macros.add_line(line.clone()),
            }
            return;
        }

        if tokens.len() >= 2 && tokens[0].kind.is_label_like() && tokens[1].kind == TokenKind::Colon {
            let mut label = tokens[0].clone();
            label.kind = TokenKind::Identifier;
            self.define_label(file, &label, history);
            tokens.drain(..2);
            if tokens.is_empty() {
                return;
            }
        }

        let first = &tokens[0];
        if first.kind == TokenKind::Directive {
            self.directive(file, &tokens, history);
            return;
        }
        if first.kind == TokenKind::Identifier && first.value.starts_with('.') {
            let message = format!("Unrecognized directive {} ignored", first.value);
            self.warning(&tokens[0], message, history);
            return;
        }
        let continues_data = first.kind.is_integer() || first.kind.is_real() || first.kind == TokenKind::Identifier;
        if self.segment.is_data() && continues_data {
            if let Some(directive) = file.data_directive {
                self.store_data(file, directive, &tokens, history);
                return;
            }
        }

        let call = strip_call_parens(&tokens);
        if let Some(found) = file.macros.find_match(&call).cloned() {
            self.expand_macro(file, &found, &call, line, history);
            return;
        }
        self.instruction(file, tokens, line, history);
    }

    fn define_label(&mut self, file: &mut FileState, label: &Token, history: &[usize]) {
        let (address, data) = match self.segment {
            Segment::Text => (self.text_address, false),
            Segment::KernelText => (self.kernel_text_address, false),
            Segment::Data => (self.data_address, true),
            Segment::KernelData => (self.kernel_data_address, true),
        };
        let symbol = Symbol {
            name: label.value.clone(),
            address,
            data,
            file: file.path.clone(),
        };
        if file.local.add(symbol).is_err() {
            self.error(label, format!("label \"{}\" already defined", label.value), history);
        }
    }

    fn expand_macro(&mut self, file: &mut FileState, found: &Macro, call: &[Token], line: &TokenizedLine, history: &[usize]) {
        let origin = line.origin();
        if !file.macros.push_call(origin.clone()) {
            self.error(
                &call[0],
                "Detected a macro expansion loop (recursive reference).",
                history,
            );
            return;
        }
        let counter = file.macros.next_counter();
        trace!("expanding {} at {}:{} as #{}", found.name, origin.file, origin.line, counter);
        let expanded = found.expand(&call[1..], counter, &mut self.errors);
        let mut nested = history.to_vec();
        nested.push(origin.line);
        for body in &expanded {
            if self.errors.limit_exceeded() {
                break;
            }
            self.parse_line(file, body, &nested);
        }
        file.macros.pop_call();
    }

    fn instruction(&mut self, file: &mut FileState, tokens: Vec<Token>, line: &TokenizedLine, history: &[usize]) {
        let op = &tokens[0];
        if op.kind != TokenKind::Operator {
            let message = if file.macros.has_name(&op.value) {
                format!("no macro \"{}\" takes {} argument(s)", op.value, tokens.len() - 1)
            } else {
                format!("\"{}\" is not a recognized operator", op.value)
            };
            self.error(op, message, history);
            return;
        }
        if self.segment.is_data() {
            self.error(op, format!("\"{}\" can only be used in the text segment", op.value), history);
            return;
        }
        let bare = self.options.bare_machine;
        let candidates = INSTRUCTION_SET.matching(&op.value);
        let Some(inst) = best_match(&tokens, &candidates, bare) else {
            self.error(op, format!("\"{}\" is not a recognized operator", op.value), history);
            return;
        };
        if let Err((tok, message)) = check(&tokens, inst, bare) {
            let tok = tok.clone();
            self.error(&tok, message, history);
            return;
        }
        let length = match inst {
            Instruction::Basic(_) => 4,
            Instruction::Extended(e) => {
                if !self.options.extended {
                    self.error(op, "Extended (pseudo) instruction or format not permitted.  See Settings.", history);
                    return;
                }
                e.length(self.compact(), self.options.delayed_branching)
            }
        };
        let origin = line.origin();
        let address = *self.text_cursor();
        file.statements.push(PendingStatement {
            instruction: inst,
            source: SourceLine {
                file: origin.file,
                line: origin.line,
                text: line.text.trim().to_string(),
            },
            tokens,
            address,
            history: history.to_vec(),
        });
        file.data_directive = None;
        let cursor = self.text_cursor();
        *cursor = cursor.wrapping_add(length);
    }

    /// Moves `.globl` labels from the file's table to the global one.
    fn transfer_globals(&mut self, file: &mut FileState) {
        let mut seen = vec![];
        for tok in std::mem::take(&mut file.globals) {
            if seen.contains(&tok.value) {
                continue;
            }
            seen.push(tok.value.clone());
            let Some(symbol) = file.local.remove(&tok.value) else {
                self.error(&tok, format!("Undefined symbol \"{}\" declared global", tok.value), &[]);
                continue;
            };
            if let Err(existing) = self.global.add(symbol) {
                let message = format!("label \"{}\" already defined as global in {}", tok.value, existing.file);
                self.error(&tok, message, &[]);
            }
        }
    }

    pub(crate) fn write_forward(&mut self, fref: &ForwardRef, address: u32) {
        if let Err(e) = self.write_value(fref.address, address as i32, fref.length) {
            self.error(&fref.token, e.to_string(), &fref.history);
        }
    }

    /// Stores a `length`-byte value, bytewise when it is not aligned.
    pub(crate) fn write_value(&self, addr: u32, value: i32, length: u32) -> Result<(), arch::error::SimError> {
        if addr % length == 0 {
            match length {
                1 => self.memory.set_byte(addr, value)?,
                2 => self.memory.set_half(addr, value)?,
                _ => self.memory.set_word(addr, value)?,
            };
            return Ok(());
        }
        for i in 0..length {
            let shift = if self.memory.big_endian { 8 * (length - 1 - i) } else { 8 * i };
            self.memory.set_byte(addr.wrapping_add(i), (value as u32 >> shift) as i32 & 0xFF)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Pass 2

    fn pass2_statement(&mut self, pending: &PendingStatement, local: &SymbolTable, out: &mut Vec<ProgramStatement>) {
        let extended = match pending.instruction {
            Instruction::Basic(basic) => {
                let stmt = self.build_basic(basic, &pending.tokens, pending.address, &pending.source, local, &pending.history);
                out.extend(stmt);
                return;
            }
            Instruction::Extended(e) => e,
        };
        let lines = {
            let global = &self.global;
            let resolve = |name: &str| local_or_global(local, global, name);
            let operands = Operands::new(&pending.tokens, &resolve);
            expand(
                extended.templates_for(self.memory.config().is_compact()),
                &operands,
                self.options.delayed_branching,
            )
        };
        let lines = match lines {
            Ok(lines) => lines,
            Err(message) => {
                self.errors.add(message.history(&pending.history));
                return;
            }
        };

        let operator = &pending.tokens[0];
        let mut address = pending.address;
        for text in lines {
            let mut tokens = tokenize_line(&text, &pending.source.file, pending.source.line, &mut self.errors);
            for tok in tokens.iter_mut() {
                tok.origin = operator.origin.clone();
                tok.column = operator.column;
            }
            let candidates: Vec<&'static Instruction> = tokens
                .first()
                .map(|t| INSTRUCTION_SET.matching(&t.value))
                .unwrap_or_default()
                .into_iter()
                .filter(|i| !i.is_extended())
                .collect();
            let basic = best_match(&tokens, &candidates, false)
                .filter(|i| check(&tokens, i, false).is_ok())
                .and_then(Instruction::as_basic);
            let Some(basic) = basic else {
                self.error(
                    operator,
                    format!("expansion of \"{}\" produced invalid instruction \"{}\"", extended.example, text),
                    &pending.history,
                );
                return;
            };
            let stmt = self.build_basic(basic, &tokens, address, &pending.source, local, &pending.history);
            out.extend(stmt);
            address = address.wrapping_add(4);
        }
    }

    fn build_basic(
        &mut self,
        inst: &'static BasicInstruction,
        tokens: &[Token],
        address: u32,
        source: &SourceLine,
        local: &SymbolTable,
        history: &[usize],
    ) -> Option<ProgramStatement> {
        let mut operands = vec![];
        for (kind, tok) in inst.tokens.iter().zip(tokens).skip(1) {
            let value = match kind {
                TokenKind::LeftParen | TokenKind::RightParen | TokenKind::Plus | TokenKind::Minus => continue,
                _ if tok.register().is_some() => tok.register().map(|r| r as i32),
                TokenKind::Identifier => self.target(inst, tok, address, local, history),
                _ => tok.int_value(),
            };
            match value {
                Some(value) => operands.push(value),
                None => {
                    if *kind != TokenKind::Identifier {
                        self.error(tok, format!("\"{}\": operand is of incorrect type", tok.value), history);
                    }
                    return None;
                }
            }
        }
        let mut stmt = ProgramStatement::new(inst, address, &operands, Some(source.clone()), String::new());
        stmt.basic = stmt.disassemble();
        Some(stmt)
    }

    /// Field value of a label operand: a word displacement for branches,
    /// a 26-bit word address for jumps, the plain address otherwise.
    fn target(
        &mut self,
        inst: &BasicInstruction,
        tok: &Token,
        address: u32,
        local: &SymbolTable,
        history: &[usize],
    ) -> Option<i32> {
        let target = match tok.int_value() {
            Some(raw) if inst.format == Format::IBranch => return Some(raw),
            Some(raw) => raw as u32,
            None => match local_or_global(local, &self.global, &tok.value) {
                Some(target) => target,
                None => {
                    let message = format!("Symbol \"{}\" not found in symbol table.", tok.value);
                    self.error(tok, message, history);
                    return None;
                }
            },
        };
        let next = address.wrapping_add(4);
        match inst.format {
            Format::IBranch => {
                let displacement = (target as i64 - next as i64) >> 2;
                if !(-0x8000..=0x7FFF).contains(&displacement) {
                    self.error(tok, format!("Branch target word address beyond 16-bit range: {}", tok.value), history);
                    return None;
                }
                Some(displacement as i32)
            }
            Format::J => {
                if target & 0xF000_0000 != next & 0xF000_0000 {
                    self.error(tok, format!("Jump target word address beyond 26-bit range: {}", tok.value), history);
                    return None;
                }
                Some(((target >> 2) & 0x03FF_FFFF) as i32)
            }
            _ => Some(target as i32),
        }
    }

    // ------------------------------------------------------------------------
    // Code generation

    fn generate(&mut self, statements: &mut Vec<ProgramStatement>) {
        for stmt in statements.iter() {
            if let Err(e) = self.memory.set_statement(stmt.address, stmt.clone()) {
                let message = ErrorMessage::new(
                    source_file(stmt),
                    stmt.source_line().unwrap_or(0),
                    0,
                    format!("Instruction address {} is outside the text segment: {}", to_hex_string(stmt.address as i32), e),
                );
                self.errors.add(message);
            }
        }
        statements.sort_by_key(|s| s.address);
        for pair in statements.windows(2) {
            if pair[0].address != pair[1].address {
                continue;
            }
            let message = format!(
                "Duplicate text segment address: {} already occupied by {} line {} (caused by use of .text operand)",
                to_hex_string(pair[1].address as i32),
                source_file(&pair[0]),
                pair[0].source_line().unwrap_or(0),
            );
            self.errors.add(ErrorMessage::new(
                source_file(&pair[1]),
                pair[1].source_line().unwrap_or(0),
                0,
                message,
            ));
        }
        debug!("{} statements generated", statements.len());
    }
}

fn source_file(stmt: &ProgramStatement) -> Arc<str> {
    stmt.source
        .as_ref()
        .map(|s| s.file.clone())
        .unwrap_or_else(|| Arc::from(""))
}

pub(crate) fn directive_of(tok: &Token) -> Option<Directive> {
    if tok.kind != TokenKind::Directive {
        return None;
    }
    tok.value.parse().ok()
}
