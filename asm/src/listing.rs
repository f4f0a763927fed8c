use color_print::cformat;

use crate::assembler::AssembledProgram;

const RULE: &str = "-------------------+-----------------------------------------------------";

/// Listing of the text segments: address, machine word, source line and
/// basic statement, grouped by source file.
pub fn render(program: &AssembledProgram, color: bool) -> Vec<String> {
    let mut out = vec![];
    let mut current_file: Option<&str> = None;
    let mut last_line = None;
    for stmt in &program.statements {
        let (file, line) = match &stmt.source {
            Some(source) => (&*source.file, source.line),
            None => ("", 0),
        };
        if current_file != Some(file) {
            let fill = 45usize.saturating_sub(file.len());
            out.push(format!("{}+------[{}]{}", "-".repeat(19), file, "-".repeat(fill)));
            current_file = Some(file);
            last_line = None;
        }
        let text = if last_line == Some(line) {
            ""
        } else {
            program
                .sources
                .get(file)
                .and_then(|lines| lines.get(line.wrapping_sub(1)))
                .map(|s| s.trim())
                .unwrap_or("")
        };
        last_line = Some(line);
        let bin = stmt.binary;
        let word = format!(
            "{:02X} {:02X} {:02X} {:02X}",
            (bin >> 24) & 0xFF,
            (bin >> 16) & 0xFF,
            (bin >> 8) & 0xFF,
            bin & 0xFF
        );
        let row = if color {
            cformat!(
                "<blue>{:08X}</> {} | {:>4}: <bold>{:<24}</> {}",
                stmt.address,
                word,
                line,
                stmt.basic,
                text
            )
        } else {
            format!("{:08X} {} | {:>4}: {:<24} {}", stmt.address, word, line, stmt.basic, text)
        };
        out.push(row.trim_end().to_string());
    }
    out.push(RULE.to_string());
    out
}

pub fn print_dump(program: &AssembledProgram) {
    for line in render(program, true) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{Assembler, AssemblerOptions};

    #[test]
    fn pseudo_source_shown_once() {
        let program = Assembler::new(AssemblerOptions::default())
            .assemble_str("li $t0, 100000 # big\nnop\n")
            .unwrap();
        let lines = render(&program, false);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("-------------------+------[main.s]"));
        let first = format!("00400000 3C 01 00 01 |    1: {:<24} {}", "lui $1,1", "li $t0, 100000 # big");
        assert_eq!(lines[1], first);
        assert_eq!(lines[2], "00400004 34 28 86 A0 |    1: ori $8,$1,34464");
        assert!(lines[3].ends_with("nop"));
        assert_eq!(lines[4], RULE);
    }
}
