use std::collections::VecDeque;
use std::io::{self, BufRead, Read, Write};
use std::sync::{Arc, Mutex};

use arch::syscall::Console;

/// The terminal.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn print(&mut self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn read_char(&mut self) -> io::Result<Option<char>> {
        let mut buf = [0u8; 1];
        match io::stdin().lock().read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0] as char)),
        }
    }
}

/// Canned input and captured output, for tests and batch runs.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConsole {
    input: Arc<Mutex<VecDeque<char>>>,
    output: Arc<Mutex<String>>,
}

impl ScriptedConsole {
    pub fn new(input: &str) -> Self {
        Self {
            input: Arc::new(Mutex::new(input.chars().collect())),
            output: Arc::default(),
        }
    }

    /// Everything printed so far. Clones share the buffer, so a clone kept
    /// outside the machine sees its output.
    pub fn output(&self) -> String {
        self.output.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Console for ScriptedConsole {
    fn print(&mut self, text: &str) {
        if let Ok(mut out) = self.output.lock() {
            out.push_str(text);
        }
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut input = self.input.lock().map_err(|_| io::Error::other("console input poisoned"))?;
        let mut line = String::new();
        while let Some(c) = input.pop_front() {
            if c == '\n' {
                break;
            }
            line.push(c);
        }
        Ok(line)
    }

    fn read_char(&mut self) -> io::Result<Option<char>> {
        let mut input = self.input.lock().map_err(|_| io::Error::other("console input poisoned"))?;
        Ok(input.pop_front())
    }
}

#[test]
fn test() {
    let console = ScriptedConsole::new("12\nab");
    let mut boxed: Box<dyn Console> = Box::new(console.clone());
    assert_eq!(boxed.read_line().unwrap(), "12");
    assert_eq!(boxed.read_char().unwrap(), Some('a'));
    assert_eq!(boxed.read_line().unwrap(), "b");
    assert_eq!(boxed.read_line().unwrap(), "");
    boxed.print("hi");
    assert_eq!(console.output(), "hi");
}
