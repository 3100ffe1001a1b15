use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};

use okto::{assemble, format_dump, format_listing, report, Assembly, DumpRange, RunState};

/// Okto is a compact assembler & interpreter toolchain for the OKTO-8 educational 8-bit CPU.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.okto` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble and run a `.okto` file, printing the final machine state
    Run {
        /// `.okto` file to run
        name: PathBuf,
        /// Also dump a memory range after the run, like `10H-2FH`
        #[arg(short, long)]
        dump: Option<String>,
        /// Write the assembly listing to a file
        #[arg(short, long)]
        listing: Option<PathBuf>,
    },
    /// Check a `.okto` file without running it
    Check {
        /// File to check
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    let args = Args::parse();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(okto::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                dump,
                listing,
            } => run(&name, dump.as_deref(), listing.as_deref()),
            Command::Check { name } => {
                file_message("Checking", &name);
                let _ = assemble_file(&name)?;
                message("Success", "no errors found!");
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        run(&path, None, None)
    } else {
        println!("\n~ okto v{VERSION} ~");
        println!("{SHORT_INFO}");
        std::process::exit(0);
    }
}

fn file_message(left: &str, right: &std::path::Path) {
    let right = format!("target {}", right.display());
    message(left, &right);
}

fn message<S>(left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    let left = left.green();
    println!("{left:>12} {right}");
}

fn run(name: &PathBuf, dump: Option<&str>, listing: Option<&std::path::Path>) -> Result<()> {
    // Reject a bad range before spending time on assembly
    let dump = dump.map(DumpRange::parse).transpose()?;

    file_message("Assembling", name);
    let assembly = assemble_file(name)?;

    if let Some(dest) = listing {
        let mut file = File::create(dest).into_diagnostic()?;
        writeln!(file, "{}", format_listing(&assembly.listing)).into_diagnostic()?;
        file_message("Listing", dest);
    }

    message("Running", "assembled image");
    let mut state = RunState::new(&assembly);
    state.run()?;

    println!("{}", report(&state));
    if let Some(range) = dump {
        println!("{}", format_dump(&state, range));
    }

    file_message("Completed", name);
    Ok(())
}

fn assemble_file(name: &PathBuf) -> Result<Assembly> {
    let contents = fs::read_to_string(name).into_diagnostic()?;
    assemble(&contents)
}

const SHORT_INFO: &str = r"
Welcome to okto, an assembler and interpreter for the OKTO-8 educational
8-bit CPU. Please use `-h` or `--help` to access the usage instructions.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
