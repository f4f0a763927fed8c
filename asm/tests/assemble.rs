use arch::statement::ProgramStatement;
use mipsasm::lexer::MemoryLoader;
use mipsasm::{AsmError, AssembledProgram, Assembler, AssemblerOptions};

fn assemble_files(files: &[(&str, &str)]) -> Result<AssembledProgram, AsmError> {
    let mut loader = MemoryLoader::new();
    for (path, source) in files {
        loader.insert(path, source);
    }
    let paths: Vec<String> = files.iter().map(|(p, _)| p.to_string()).collect();
    Assembler::new(AssemblerOptions::default()).assemble(&loader, &paths)
}

fn errors(files: &[(&str, &str)]) -> Vec<String> {
    match assemble_files(files) {
        Err(AsmError::Failed(list)) => {
            for m in list.messages() {
                println!("{}", m);
            }
            list.errors().map(|m| m.message.clone()).collect()
        }
        Err(e) => vec![e.to_string()],
        Ok(_) => vec![],
    }
}

fn basics(program: &AssembledProgram) -> Vec<&str> {
    program.statements.iter().map(|s| s.basic.as_str()).collect()
}

macro_rules! error_case {
    ($name:ident, $source:expr, $expected:expr) => {
        #[test]
        fn $name() {
            let found = errors(&[("main.s", $source)]);
            assert!(
                found.iter().any(|m| m.contains($expected)),
                "expected {:?} in {:?}",
                $expected,
                found
            );
        }
    };
}

error_case!(duplicate_label, "a: nop\na: nop\n", "label \"a\" already defined");
error_case!(unknown_operator, "frob $t0\n", "\"frob\" is not a recognized operator");
error_case!(too_few_operands, "add $t0, $t1\n", "Too few or incorrectly formatted operands");
error_case!(wrong_operand_type, "jr 5\n", "\"5\": operand is of incorrect type");
error_case!(undefined_branch_target, "beq $t0, $t1, nowhere\n", "Symbol \"nowhere\" not found");
error_case!(undefined_global, ".globl nothere\nnop\n", "Undefined symbol \"nothere\" declared global");
error_case!(instruction_in_data, ".data\nadd $t0, $t1, $t2\n", "can only be used in the text segment");
error_case!(recursive_macro, ".macro r\nr\n.end_macro\nr\n", "Detected a macro expansion loop");
error_case!(missing_end_macro, ".macro open\nnop\n", "missing .end_macro");
error_case!(data_past_segment, ".data 0x7FFFFFFC\n.word 1, 2\n", "0x80000000");
error_case!(
    duplicate_text_address,
    "nop\nnop\n.text 0x00400004\nnop\n",
    "Duplicate text segment address: 0x00400004"
);

#[test]
fn globals_across_files() {
    let main = "\
.globl main
.data
fp: .word helper
.text
main: la $t0, value
      lw $t1, value
      jal helper
";
    let lib = "\
.globl helper
.globl value
.data
value: .word 42
.text
helper: jr $ra
";
    let program = assemble_files(&[("main.s", main), ("lib.s", lib)]).unwrap();
    assert_eq!(program.global_symbols.address("main"), Some(0x0040_0000));
    assert_eq!(program.global_symbols.address("helper"), Some(0x0040_0014));
    assert_eq!(program.global_symbols.address("value"), Some(0x1001_0004));
    assert_eq!(program.memory.get_word(0x1001_0000).unwrap(), 0x0040_0014);
    assert_eq!(program.memory.get_word(0x1001_0004).unwrap(), 42);
    assert_eq!(program.statements[4].binary, 0x0C10_0005);
    assert_eq!(program.statements[5].basic, "jr $31");
    assert_eq!(program.local_symbols[0].address("fp"), Some(0x1001_0000));
}

#[test]
fn global_defined_twice() {
    let file = ".globl x\n.data\nx: .word 1\n";
    let found = errors(&[("a.s", file), ("b.s", file)]);
    assert_eq!(found, vec!["label \"x\" already defined as global in a.s"]);
}

#[test]
fn local_labels_shadow_globals() {
    let a = ".globl shared\n.data\nshared: .word 1\n.text\nla $t0, shared\n";
    let b = ".data\nshared: .word 2\n.text\nla $t1, shared\n";
    let program = assemble_files(&[("a.s", a), ("b.s", b)]).unwrap();
    assert_eq!(basics(&program), vec!["lui $1,4097", "ori $8,$1,0", "lui $1,4097", "ori $9,$1,4"]);
}

#[test]
fn macros_expand_with_arguments() {
    let source = "\
.macro inc (%r)
addi %r, %r, 1
.end_macro
.macro inc (%r, %n)
addi %r, %r, %n
.end_macro
inc ($t0)
inc $t1
inc ($t2, 7)
";
    let program = assemble_files(&[("main.s", source)]).unwrap();
    assert_eq!(basics(&program), vec!["addi $8,$8,1", "addi $9,$9,1", "addi $10,$10,7"]);
    assert_eq!(program.statements[2].source.as_ref().map(|s| s.line), Some(5));
}

#[test]
fn macro_labels_are_unique_per_expansion() {
    let source = "\
.macro spin
top: addi $t0, $t0, -1
bne $t0, $zero, top
.end_macro
spin
spin
";
    let program = assemble_files(&[("main.s", source)]).unwrap();
    let words: Vec<u32> = program.statements.iter().map(|s| s.binary & 0xFFFF).collect();
    assert_eq!(words, vec![0xFFFF, 0xFFFE, 0xFFFF, 0xFFFE]);
    assert_eq!(program.local_symbols[0].address("top_M1"), Some(0x0040_0000));
    assert_eq!(program.local_symbols[0].address("top_M2"), Some(0x0040_0008));
}

#[test]
fn eqv_and_include() {
    let main = ".eqv LIMIT 12\n.include \"defs.s\"\nli $t0, LIMIT\nli $v0, EXIT\nsyscall\n";
    let defs = ".eqv EXIT 10\n";
    let program = assemble_files(&[("main.s", main), ("defs.s", defs)]).unwrap();
    assert_eq!(basics(&program)[..2], ["addiu $8,$0,12", "addiu $2,$0,10"]);
}

#[test]
fn align_fixes_preceding_label() {
    let source = ".data\n.byte 1\n.align 0\nodd: .half 2\n.align 2\nw: .word 3\n";
    let program = assemble_files(&[("main.s", source)]).unwrap();
    assert_eq!(program.symbol("odd"), Some(0x1001_0001));
    assert_eq!(program.symbol("w"), Some(0x1001_0004));
    assert_eq!(program.memory.get_byte(0x1001_0001).unwrap(), 2);
}

#[test]
fn kernel_segments() {
    let source = ".kdata\nmsg: .asciiz \"trap\"\n.ktext 0x80000180\nmfc0 $k0, $13\neret\n.text\nnop\n";
    let program = assemble_files(&[("main.s", source)]).unwrap();
    assert_eq!(program.symbol("msg"), Some(0x9000_0000));
    assert_eq!(program.statements[0].address, 0x0040_0000);
    assert_eq!(program.statements[1].address, 0x8000_0180);
    assert_eq!(program.statements[2].basic, "eret");
}

#[test]
fn delayed_branching_fills_pseudo_delay_slots() {
    let source = "div $t0, $t1, $t2\n";
    let program = Assembler::new(AssemblerOptions::default()).assemble_str(source).unwrap();
    assert_eq!(basics(&program), vec!["bne $10,$0,1", "break", "div $9,$10", "mflo $8"]);

    let options = AssemblerOptions {
        delayed_branching: true,
        ..AssemblerOptions::default()
    };
    let program = Assembler::new(options).assemble_str(source).unwrap();
    assert_eq!(basics(&program), vec!["bne $10,$0,2", "nop", "break", "div $9,$10", "mflo $8"]);
}

#[test]
fn warnings_as_errors() {
    let options = AssemblerOptions {
        warnings_are_errors: true,
        ..AssemblerOptions::default()
    };
    let Err(AsmError::Failed(list)) = Assembler::new(options).assemble_str(".set noreorder\nnop\n") else {
        panic!("warning did not fail assembly");
    };
    assert_eq!(list.error_count(), 0);
    assert_eq!(list.warning_count(), 1);
}

#[test]
fn words_decode_to_same_statement() {
    let source = "\
main: addu $t0, $t1, $t2
      sw $t0, -8($sp)
      sll $t3, $t0, 4
      beq $t0, $zero, main
      j main
      mul $t4, $t5, $t6
      add.s $f0, $f1, $f2
";
    let program = assemble_files(&[("main.s", source)]).unwrap();
    for stmt in &program.statements {
        let decoded = ProgramStatement::from_binary(stmt.binary, stmt.address).unwrap();
        assert_eq!(decoded.basic, stmt.basic);
    }
}
