use std::io::{self, Write};
use std::process::ExitCode;

use arch::directive::Directive;
use arch::inst::set::INSTRUCTION_SET;
use arch::memory::{Layout, MemoryConfiguration};
use clap::Parser;
use color_print::cprintln;
use mipsasm::listing::print_dump;
use mipsasm::{AsmError, Assembler, AssemblerOptions};
use tracing::{info, Level};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input files
    #[clap(default_value = "main.s")]
    input: Vec<String>,

    /// Write the text segment words to this file
    #[clap(short, long)]
    output: Option<String>,

    /// Dump assembled code
    #[clap(short, long)]
    dump: bool,

    /// Reject pseudo instructions
    #[clap(long)]
    no_pseudo: bool,

    /// Require register numbers instead of names
    #[clap(long)]
    bare: bool,

    /// Fill branch delay slots
    #[clap(long)]
    delayed_branching: bool,

    #[clap(long)]
    warnings_are_errors: bool,

    /// Emit big-endian words
    #[clap(long)]
    big_endian: bool,

    #[clap(long, default_value_t = Layout::Default)]
    layout: Layout,

    #[clap(long, default_value_t = mipsasm::error::DEFAULT_ERROR_LIMIT)]
    error_limit: usize,

    /// List instructions and directives starting with this prefix, then exit
    #[clap(long, value_name = "PREFIX")]
    help_inst: Option<String>,

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
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn print_help_inst(prefix: &str) {
    for directive in Directive::prefix_matches(prefix) {
        cprintln!("<b>{:<28}</> <dim>{:<6}</> {}", directive.to_string(), "dir", directive.description());
    }
    for inst in INSTRUCTION_SET.prefix_matches(prefix) {
        println!("{}", inst.cformat());
    }
}

fn main_real(args: &Args) -> Result<(), AsmError> {
    if let Some(prefix) = &args.help_inst {
        print_help_inst(prefix);
        return Ok(());
    }
    let options = AssemblerOptions {
        extended: !args.no_pseudo,
        warnings_are_errors: args.warnings_are_errors,
        delayed_branching: args.delayed_branching,
        bare_machine: args.bare,
        big_endian: args.big_endian,
        self_modifying_code: false,
        error_limit: args.error_limit,
        memory_configuration: MemoryConfiguration::layout(args.layout),
    };
    let mut assembler = Assembler::new(options);
    let program = match assembler.assemble_files(&args.input) {
        Ok(program) => program,
        Err(AsmError::Failed(errors)) => {
            errors.print_diag(assembler.sources());
            return Err(AsmError::Failed(errors));
        }
        Err(e) => return Err(e),
    };
    if program.warnings.warnings_occurred() {
        program.warnings.print_diag(&program.sources);
    }
    cprintln!(
        "<green,bold>assembled</> {} statement(s) from {} file(s)",
        program.statements.len(),
        args.input.len()
    );

    if let Some(path) = &args.output {
        info!("writing {}", path);
        let write = |path: &str| -> io::Result<()> {
            let mut file = io::BufWriter::new(std::fs::File::create(path)?);
            for stmt in &program.statements {
                let bytes = if args.big_endian {
                    stmt.binary.to_be_bytes()
                } else {
                    stmt.binary.to_le_bytes()
                };
                file.write_all(&bytes)?;
            }
            file.flush()
        };
        write(path).map_err(|e| AsmError::Write(path.clone(), e))?;
    }

    if args.dump {
        print_dump(&program);
    }
    Ok(())
}
