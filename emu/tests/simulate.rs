use std::time::Duration;

use arch::error::SimError;
use arch::reg::Reg;
use mipsasm::{Assembler, AssemblerOptions};
use mipsemu::console::ScriptedConsole;
use mipsemu::{Outcome, Settings, Simulator};

fn simulator_with(source: &str, settings: &Settings, input: &str) -> (Simulator, ScriptedConsole) {
    let program = Assembler::new(settings.assembler_options()).assemble_str(source).unwrap();
    let console = ScriptedConsole::new(input);
    let sim = Simulator::new(program, settings).unwrap().with_console(console.clone());
    (sim, console)
}

fn run(source: &str, input: &str) -> (Simulator, ScriptedConsole, Outcome) {
    let (mut sim, console) = simulator_with(source, &Settings::default(), input);
    let outcome = sim.simulate(Some(100_000));
    (sim, console, outcome)
}

#[test]
fn li_then_addi() {
    let (sim, _, outcome) = run("main: li $t0, 5\n addi $t0,$t0,1\n", "");
    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(sim.machine.regs.get(Reg::T0), 6);
    assert_eq!(sim.steps(), 2);
}

#[test]
fn load_from_data_label() {
    let source = ".data\n x: .word 10, 20, 30\n.text\n lw $t1, x($zero)\n lw $t2, x+8($zero)\n";
    let (sim, _, outcome) = run(source, "");
    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(sim.machine.regs.get(Reg::T1), 10);
    assert_eq!(sim.machine.regs.get(Reg::T2), 30);
}

#[test]
fn console_services() {
    let source = "\
.data
prompt: .asciiz \"n? \"
.text
      li $v0, 4
      la $a0, prompt
      syscall
      li $v0, 5
      syscall
      move $t0, $v0
loop: li $v0, 1
      move $a0, $t0
      syscall
      li $v0, 11
      li $a0, ' '
      syscall
      addi $t0, $t0, -1
      bgtz $t0, loop
      li $v0, 10
      syscall
      li $t9, 99
";
    let (sim, console, outcome) = run(source, "3\n");
    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(console.output(), "n? 3 2 1 ");
    assert_eq!(sim.machine.regs.get(Reg::T9), 0);
}

#[test]
fn exit_with_code() {
    let (_, _, outcome) = run("li $a0, 7\nli $v0, 17\nsyscall\n", "");
    assert_eq!(outcome, Outcome::Exited(7));
}

#[test]
fn unknown_syscall_is_fatal() {
    let (_, _, outcome) = run("li $v0, 99\nsyscall\n", "");
    let Outcome::Fault(fault) = outcome else {
        panic!("expected a fault, got {:?}", outcome);
    };
    assert_eq!(fault.error, SimError::UnknownSyscall(99));
}

#[test]
fn address_error_reports_source() {
    let source = "nop\nlw $t0, 1($gp)\n";
    let (_, _, outcome) = run(source, "");
    let Outcome::Fault(fault) = outcome else {
        panic!("expected a fault, got {:?}", outcome);
    };
    assert_eq!(fault.pc, 0x0040_0004);
    assert!(matches!(fault.error, SimError::AddressLoad(_)));
    assert_eq!(fault.source.map(|s| s.line), Some(2));
}

#[test]
fn overflow_enters_kernel_handler() {
    let source = "\
.text
      li $t0, 0x7FFFFFFF
      add $t1, $t0, $t0
      li $t2, 1
.ktext 0x80000180
      mfc0 $k0, $14
      addi $k0, $k0, 4
      mtc0 $k0, $14
      mfc0 $k1, $13
      eret
";
    let (sim, _, outcome) = run(source, "");
    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(sim.machine.regs.get(Reg::T1), 0);
    assert_eq!(sim.machine.regs.get(Reg::T2), 1);
    assert_eq!((sim.machine.regs.get(Reg::K1) >> 2) & 0x1F, 12);
}

#[test]
fn scheduled_interrupt_runs_handler() {
    use mipsemu::hooks::intr::{Intr, List};

    let source = "\
.text
      mfc0 $t0, $12
      ori $t0, $t0, 1
      mtc0 $t0, $12
      li $s0, 0
loop: addi $s1, $s1, 1
      beq $s0, $zero, loop
      li $v0, 10
      syscall
.ktext 0x80000180
      li $s0, 1
      eret
";
    let (mut sim, _) = simulator_with(source, &Settings::default(), "");
    sim.add_hook(Box::new(Intr::from_list(List::from_yaml("10: 0x400\n").unwrap())));
    assert_eq!(sim.simulate(Some(1000)), Outcome::Exited(0));
    assert_eq!(sim.machine.regs.get(Reg::S0), 1);
}

#[test]
fn step_limit() {
    let (mut sim, _) = simulator_with("loop: j loop\n", &Settings::default(), "");
    assert_eq!(sim.simulate(Some(25)), Outcome::StepLimit);
    assert_eq!(sim.steps(), 25);
}

#[test]
fn stop_from_another_thread() {
    let (mut sim, _) = simulator_with("loop: j loop\n", &Settings::default(), "");
    let stop = sim.stop_handle();
    let worker = std::thread::spawn(move || sim.simulate(None));
    std::thread::sleep(Duration::from_millis(20));
    stop.stop();
    assert_eq!(worker.join().unwrap(), Outcome::Stopped);
}

#[test]
fn program_arguments() {
    let source = "\
      lw $t0, 0($a1)
      lb $t1, 0($t0)
      lw $t2, 4($a1)
      lb $t3, 1($t2)
";
    let settings = Settings {
        program_arguments: vec!["x".to_string(), "yz".to_string()],
        ..Settings::default()
    };
    let (mut sim, _) = simulator_with(source, &settings, "");
    assert_eq!(sim.simulate(None), Outcome::Exited(0));
    assert_eq!(sim.machine.regs.get(Reg::A0), 2);
    assert_eq!(sim.machine.regs.get(Reg::T1), 'x' as i32);
    assert_eq!(sim.machine.regs.get(Reg::T3), 'z' as i32);
}

#[test]
fn start_at_main() {
    let source = ".globl main\nli $t0, 1\nmain: li $t1, 2\n";
    let settings = Settings {
        start_at_main: true,
        ..Settings::default()
    };
    let (mut sim, _) = simulator_with(source, &settings, "");
    assert_eq!(sim.simulate(None), Outcome::Exited(0));
    assert_eq!(sim.machine.regs.get(Reg::T0), 0);
    assert_eq!(sim.machine.regs.get(Reg::T1), 2);
}

#[test]
fn delayed_branching_runs_delay_slot() {
    let source = "\
      j skip
      li $t0, 1
      li $t1, 1
skip: li $t2, 1
";
    let settings = Settings {
        delayed_branching: true,
        ..Settings::default()
    };
    let (mut sim, _) = simulator_with(source, &settings, "");
    assert_eq!(sim.simulate(None), Outcome::Exited(0));
    assert_eq!(sim.machine.regs.get(Reg::T0), 1);
    assert_eq!(sim.machine.regs.get(Reg::T1), 0);
    assert_eq!(sim.machine.regs.get(Reg::T2), 1);

    let (sim, _, _) = run(source, "");
    assert_eq!(sim.machine.regs.get(Reg::T0), 0);
}

#[test]
fn jal_and_return() {
    let source = "\
      jal double
      li $v0, 10
      syscall
double:
      sll $s0, $ra, 1
      jr $ra
";
    let (sim, _, outcome) = run(source, "");
    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(sim.machine.regs.get(Reg::S0), 0x0040_0004 << 1);
}

#[test]
fn heap_and_memory_words() {
    let source = "\
      li $a0, 8
      li $v0, 9
      syscall
      li $t0, -2
      sw $t0, 4($v0)
      lh $t1, 4($v0)
      lhu $t2, 4($v0)
";
    let (sim, _, outcome) = run(source, "");
    assert_eq!(outcome, Outcome::Exited(0));
    let heap = sim.machine.regs.get(Reg::V0) as u32;
    assert_eq!(heap, sim.machine.memory.config().heap_base);
    assert_eq!(sim.machine.regs.get(Reg::T1), -2);
    assert_eq!(sim.machine.regs.get(Reg::T2), 0xFFFE);
}

#[test]
fn seeded_random_is_repeatable() {
    let source = "\
      li $a0, 0
      li $a1, 1234
      li $v0, 40
      syscall
      li $a1, 100
      li $v0, 42
      syscall
      move $s0, $a0
      li $a0, 0
      li $a1, 1234
      li $v0, 40
      syscall
      li $a1, 100
      li $v0, 42
      syscall
      move $s1, $a0
";
    let (sim, _, outcome) = run(source, "");
    assert_eq!(outcome, Outcome::Exited(0));
    let first = sim.machine.regs.get(Reg::S0);
    assert!((0..100).contains(&first));
    assert_eq!(sim.machine.regs.get(Reg::S1), first);
}

#[test]
fn floating_point_services() {
    let source = "\
.data
half: .float 0.5
.text
      li $v0, 6
      syscall
      l.s $f1, half
      add.s $f12, $f0, $f1
      li $v0, 2
      syscall
";
    let (_, console, outcome) = run(source, "1.25\n");
    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(console.output(), "1.75");
}
