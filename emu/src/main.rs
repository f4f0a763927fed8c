use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use arch::memory::{Layout, MemoryConfiguration};
use clap::{Parser, ValueEnum};
use color_print::cprintln;
use mipsasm::{AsmError, Assembler};
use mipsemu::hooks::{dump::Dump, intr::Intr, mmio::Mmio};
use mipsemu::memdump::{self, DumpFormat, DumpRange};
use mipsemu::{EmuError, Outcome, Settings, Simulator};
use tracing::{info, Level};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Parser, Debug)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Source files; the first holds the entry point
    #[clap(default_value = "main.s")]
    input: Vec<String>,

    /// YAML run settings
    #[clap(short, long)]
    settings: Option<String>,

    /// Stop after this many instructions
    #[clap(short = 't', long)]
    max_steps: Option<u64>,

    /// Instructions per second (timed mode)
    #[clap(long)]
    ips: Option<u32>,

    /// YAML map of addresses to register dumps
    #[clap(short, long)]
    dump_cfg: Option<String>,

    /// Dump registers after every instruction
    #[clap(short = 'a', long)]
    dump_all: bool,

    /// YAML map of steps to interrupt bits
    #[clap(short, long)]
    intr_cfg: Option<String>,

    /// Attach the memory-mapped keyboard and display
    #[clap(long)]
    mmio: bool,

    /// Keystrokes for the memory-mapped keyboard
    #[clap(long)]
    keyboard: Option<String>,

    /// Write memory to a file after the run: SEGMENT FORMAT FILE
    #[clap(long, num_args = 3, action = clap::ArgAction::Append, value_names = ["SEGMENT", "FORMAT", "FILE"])]
    dump: Vec<String>,

    /// Start at the global label `main`
    #[clap(long)]
    start_at_main: bool,

    #[clap(long)]
    delayed_branching: bool,

    /// Reject pseudo instructions
    #[clap(long)]
    no_pseudo: bool,

    /// Require register numbers instead of names
    #[clap(long)]
    bare: bool,

    #[clap(long)]
    self_modifying_code: bool,

    #[clap(long)]
    layout: Option<Layout>,

    #[clap(long)]
    warnings_are_errors: bool,

    /// Program arguments, stored on the stack
    #[clap(long = "pa", num_args = 1.., allow_hyphen_values = true)]
    program_args: Vec<String>,

    #[clap(long, default_value_t = Level::WARN)]
    log_level: Level,
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .init();
    match main_real(&args) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn settings(args: &Args) -> Result<Settings, EmuError> {
    let mut settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.start_at_main |= args.start_at_main;
    settings.delayed_branching |= args.delayed_branching;
    settings.extended_assembler &= !args.no_pseudo;
    settings.bare_machine |= args.bare;
    settings.self_modifying_code |= args.self_modifying_code;
    settings.warnings_are_errors |= args.warnings_are_errors;
    if let Some(layout) = args.layout {
        settings.memory_configuration = MemoryConfiguration::layout(layout);
    }
    if args.max_steps.is_some() {
        settings.max_steps = args.max_steps;
    }
    if args.ips.is_some() {
        settings.instructions_per_second = args.ips;
    }
    if !args.program_args.is_empty() {
        settings.program_arguments = args.program_args.clone();
    }
    Ok(settings)
}

fn main_real(args: &Args) -> Result<i32, EmuError> {
    let settings = settings(args)?;

    println!("+-----------------------------------------------+");
    println!("| Simulate: {:<35} |", args.input.join(" "));
    println!("|  - Memory: {:<34} |", settings.memory_configuration.name);
    if let Some(fname) = &args.dump_cfg {
        println!("|  - Dump: {:<36} |", fname);
    }
    if args.dump_all {
        println!("|  - Dump: {:<36} |", "All");
    }
    if let Some(fname) = &args.intr_cfg {
        println!("|  - Interrupt: {:<31} |", fname);
    }
    println!("+-----------------------------------------------+");

    // ------------------------------------------------------------------------
    // Assemble
    let mut assembler = Assembler::new(settings.assembler_options());
    let program = match assembler.assemble_files(&args.input) {
        Ok(program) => program,
        Err(AsmError::Failed(errors)) => {
            errors.print_diag(assembler.sources());
            return Err(AsmError::Failed(errors).into());
        }
        Err(e) => return Err(e.into()),
    };
    if program.warnings.warnings_occurred() {
        program.warnings.print_diag(&program.sources);
    }

    // ------------------------------------------------------------------------
    // Initialize simulator and hooks
    let mut sim = Simulator::new(program, &settings)?;
    sim.add_hook(Box::new(Dump::arg(args.dump_cfg.clone(), args.dump_all)?));
    sim.add_hook(Box::new(Intr::arg(args.intr_cfg.clone())?));
    if args.mmio || args.keyboard.is_some() {
        sim.add_hook(Box::new(Mmio::new(args.keyboard.as_deref().unwrap_or_default())));
    }

    // ------------------------------------------------------------------------
    // Main loop
    let outcome = sim.simulate(settings.max_steps);
    println!();
    println!("=================================================");

    for chunk in args.dump.chunks(3) {
        let [segment, format, file] = chunk else {
            continue;
        };
        let format = DumpFormat::from_str(format, true).map_err(EmuError::DumpRange)?;
        let range = DumpRange::parse(segment, &sim.machine.memory)?;
        info!("dumping {} to {}", segment, file);
        let mut out = BufWriter::new(File::create(file).map_err(|e| EmuError::Io(file.clone(), e))?);
        memdump::write(&sim.machine.memory, range, format, &mut out)?;
        out.flush().map_err(|e| EmuError::Io(file.clone(), e))?;
    }

    match outcome {
        Outcome::Exited(code) => {
            cprintln!("<green,bold>-- program is finished running ({}) --</>", code);
            Ok(code)
        }
        Outcome::Stopped => {
            cprintln!("<yellow,bold>-- program stopped after {} steps --</>", sim.steps());
            Ok(0)
        }
        Outcome::StepLimit => {
            cprintln!("<yellow,bold>-- step limit reached after {} steps --</>", sim.steps());
            Ok(0)
        }
        Outcome::Fault(fault) => Err(fault.into()),
    }
}
