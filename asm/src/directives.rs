//! Directive handlers run during pass 1.

use arch::bits::{double_to_words, to_hex_string};
use arch::directive::Directive;
use arch::token::{Token, TokenKind};

use crate::assembler::{directive_of, Assembler, FileState, ForwardRef, Segment};
use crate::lexer::unescape;
use crate::symbols::Symbol;

impl Assembler {
    pub(crate) fn directive(&mut self, file: &mut FileState, tokens: &[Token], history: &[usize]) {
        let head = &tokens[0];
        let Some(directive) = directive_of(head) else {
            self.warning(head, format!("Unrecognized directive {} ignored", head.value), history);
            return;
        };
        let args = &tokens[1..];
        match directive {
            Directive::Text => self.segment_directive(file, Segment::Text, head, args, history),
            Directive::Data => self.segment_directive(file, Segment::Data, head, args, history),
            Directive::Ktext => self.segment_directive(file, Segment::KernelText, head, args, history),
            Directive::Kdata => self.segment_directive(file, Segment::KernelData, head, args, history),
            Directive::Word | Directive::Half | Directive::Byte | Directive::Float | Directive::Double => {
                if !self.segment.is_data() {
                    self.error(head, format!("\"{}\" directive cannot appear in text segment", head.value), history);
                    return;
                }
                if args.is_empty() {
                    self.error(head, format!("\"{}\" directive requires at least one value", head.value), history);
                    return;
                }
                file.data_directive = Some(directive);
                self.store_data(file, directive, args, history);
            }
            Directive::Ascii | Directive::Asciiz => {
                file.data_directive = None;
                self.store_strings(head, args, directive == Directive::Asciiz, history);
            }
            Directive::Align => self.align_directive(file, head, args, history),
            Directive::Space => {
                file.data_directive = None;
                if !self.segment.is_data() {
                    self.error(head, "\".space\" directive cannot appear in text segment", history);
                    return;
                }
                match args.first().and_then(Token::int_value).filter(|n| *n >= 0) {
                    Some(n) if args.len() == 1 => {
                        let cursor = self.data_cursor();
                        *cursor = cursor.wrapping_add(n as u32);
                    }
                    _ => self.error(head, "\".space\" requires one non-negative integer", history),
                }
            }
            Directive::Extern => self.extern_directive(file, head, args, history),
            Directive::Globl => {
                if args.is_empty() {
                    self.error(head, "\".globl\" requires at least one label", history);
                }
                for tok in args {
                    if tok.kind.is_label_like() {
                        file.globals.push(tok.clone());
                    } else {
                        self.error(tok, format!("\"{}\" is not a valid label for .globl", tok.value), history);
                    }
                }
            }
            Directive::Set => {
                self.warning(head, "The .set directive is ignored", history);
            }
            // Consumed while tokenizing.
            Directive::Eqv | Directive::Include => {}
            Directive::Macro => file.macros.begin_macro(tokens, &mut self.errors),
            Directive::EndMacro => file.macros.commit(head, &mut self.errors),
        }
    }

    fn segment_directive(&mut self, file: &mut FileState, segment: Segment, head: &Token, args: &[Token], history: &[usize]) {
        self.segment = segment;
        file.data_directive = None;
        let Some(arg) = args.first() else {
            return;
        };
        let Some(address) = arg.int_value().map(|a| a as u32).filter(|_| args.len() == 1) else {
            self.error(arg, format!("\"{}\" takes at most one address operand", head.value), history);
            return;
        };
        let valid = match segment {
            Segment::Text => self.memory.in_text_segment(address),
            Segment::Data => self.memory.in_data_segment(address),
            Segment::KernelText => self.memory.in_kernel_text_segment(address),
            Segment::KernelData => self.memory.in_kernel_data_segment(address),
        };
        if !valid {
            let message = format!("address {} is not valid for {}", to_hex_string(address as i32), head.value);
            self.error(arg, message, history);
            return;
        }
        match segment {
            Segment::Text | Segment::KernelText => *self.text_cursor() = address,
            Segment::Data | Segment::KernelData => *self.data_cursor() = address,
        }
    }

    /// Stores the values of a `.word`-style line: `v`, `v : count` and
    /// labels, which resolve now or are patched once defined.
    pub(crate) fn store_data(&mut self, file: &mut FileState, directive: Directive, values: &[Token], history: &[usize]) {
        let Some(size) = directive.data_size() else {
            return;
        };
        let mut i = 0;
        while i < values.len() {
            let tok = &values[i];
            let repeat = match (values.get(i + 1), values.get(i + 2)) {
                (Some(colon), Some(count)) if colon.kind == TokenKind::Colon => {
                    i += 3;
                    match count.int_value().filter(|n| *n > 0) {
                        Some(n) => n as u32,
                        None => {
                            self.error(count, format!("repetition count \"{}\" must be a positive integer", count.value), history);
                            return;
                        }
                    }
                }
                _ => {
                    i += 1;
                    1
                }
            };
            for _ in 0..repeat {
                if !self.store_value(file, directive, size, tok, history) {
                    return;
                }
            }
        }
    }

    fn store_value(&mut self, file: &mut FileState, directive: Directive, size: u32, tok: &Token, history: &[usize]) -> bool {
        if self.auto_align {
            self.align_data(file, size);
        }
        let address = *self.data_cursor();
        let stored = if directive.is_integer() {
            self.store_integer(file, directive, size, address, tok, history)
        } else {
            self.store_real(directive, address, tok, history)
        };
        if stored {
            let cursor = self.data_cursor();
            *cursor = cursor.wrapping_add(size);
        }
        stored
    }

    fn store_integer(&mut self, file: &mut FileState, directive: Directive, size: u32, address: u32, tok: &Token, history: &[usize]) -> bool {
        let value = if let Some(value) = tok.int_value() {
            let (low, high) = match directive {
                Directive::Byte => (-0x80, 0xFF),
                Directive::Half => (-0x8000, 0xFFFF),
                _ => (i32::MIN, i32::MAX),
            };
            if value < low || value > high {
                let mask = (1u32 << (8 * size)) - 1;
                let truncated = value as u32 & mask;
                let message = format!(
                    "value {} is out-of-range and truncated to {}",
                    to_hex_string(value),
                    to_hex_string(truncated as i32)
                );
                self.warning(tok, message, history);
            }
            value
        } else if tok.kind.is_label_like() {
            match file.local.address(&tok.value).or_else(|| self.global.address(&tok.value)) {
                Some(target) => target as i32,
                None => {
                    file.forward_refs.push(ForwardRef {
                        address,
                        length: size,
                        token: tok.clone(),
                        history: history.to_vec(),
                    });
                    0
                }
            }
        } else {
            self.error(tok, format!("\"{}\" is not a valid integer value for {}", tok.value, directive), history);
            return false;
        };
        match self.write_value(address, value, size) {
            Ok(()) => true,
            Err(e) => {
                self.error(tok, e.to_string(), history);
                false
            }
        }
    }

    fn store_real(&mut self, directive: Directive, address: u32, tok: &Token, history: &[usize]) -> bool {
        let value = match tok.int_value() {
            Some(n) => Some(n as f64),
            None if tok.kind.is_real() => tok.value.parse::<f64>().ok(),
            None => None,
        };
        let Some(value) = value else {
            self.error(tok, format!("\"{}\" is not a valid real value for {}", tok.value, directive), history);
            return false;
        };
        let written = if directive == Directive::Float {
            if value.is_finite() && value.abs() > f32::MAX as f64 {
                self.error(tok, format!("\"{}\" is out-of-range for .float", tok.value), history);
                return false;
            }
            self.write_value(address, (value as f32).to_bits() as i32, 4)
        } else {
            let (high, low) = double_to_words(value);
            self.write_value(address, low, 4)
                .and_then(|_| self.write_value(address.wrapping_add(4), high, 4))
        };
        match written {
            Ok(()) => true,
            Err(e) => {
                self.error(tok, e.to_string(), history);
                false
            }
        }
    }

    fn store_strings(&mut self, head: &Token, args: &[Token], terminate: bool, history: &[usize]) {
        if !self.segment.is_data() {
            self.error(head, format!("\"{}\" directive cannot appear in text segment", head.value), history);
            return;
        }
        if args.is_empty() {
            self.error(head, format!("\"{}\" requires a quoted string", head.value), history);
        }
        for tok in args {
            if tok.kind != TokenKind::QuotedString {
                self.error(tok, format!("\"{}\" is not a quoted string", tok.value), history);
                return;
            }
            let mut bytes = match unescape(&tok.value) {
                Ok(bytes) => bytes,
                Err(message) => {
                    self.error(tok, message, history);
                    return;
                }
            };
            if terminate {
                bytes.push(0);
            }
            for byte in bytes {
                let address = *self.data_cursor();
                if let Err(e) = self.memory.set_byte(address, byte as i32) {
                    self.error(tok, e.to_string(), history);
                    return;
                }
                *self.data_cursor() = address.wrapping_add(1);
            }
        }
    }

    fn align_directive(&mut self, file: &mut FileState, head: &Token, args: &[Token], history: &[usize]) {
        let Some(n) = args.first().and_then(Token::int_value).filter(|n| (0..=3).contains(n) && args.len() == 1) else {
            self.error(head, "\".align\" requires one value from 0 to 3", history);
            return;
        };
        if n == 0 {
            self.auto_align = false;
            return;
        }
        self.auto_align = true;
        if self.segment.is_data() {
            self.align_data(file, 1 << n);
        }
    }

    /// Pads the data cursor to `boundary` and slides labels that named the
    /// unpadded address.
    fn align_data(&mut self, file: &mut FileState, boundary: u32) {
        let old = *self.data_cursor();
        let new = old.wrapping_add(boundary - 1) & !(boundary - 1);
        if new != old {
            *self.data_cursor() = new;
            file.local.fix_address(old, new);
        }
    }

    fn extern_directive(&mut self, file: &mut FileState, head: &Token, args: &[Token], history: &[usize]) {
        let (Some(name), Some(size)) = (args.first(), args.get(1).and_then(Token::int_value)) else {
            self.error(head, "\".extern\" requires a label and a byte size", history);
            return;
        };
        if !name.kind.is_label_like() || size < 0 || args.len() != 2 {
            self.error(head, "\".extern\" requires a label and a byte size", history);
            return;
        }
        if self.global.get(&name.value).is_some() {
            return;
        }
        let symbol = Symbol {
            name: name.value.clone(),
            address: self.extern_address,
            data: true,
            file: file.path.clone(),
        };
        if self.global.add(symbol).is_ok() {
            self.extern_address = self.extern_address.wrapping_add(size as u32);
        }
    }
}
