//! Carbide Compiler front-end
//!
//! Type-checks a Carbide module graph and reports diagnostics. Code
//! generation consumes the annotated tree this stage produces and lives
//! outside this crate.

mod frontend;
mod types;
mod utils;

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};

use frontend::module::ModuleLoader;

/// Carbide front-end driver
#[derive(Parser, Debug)]
#[command(name = "carbc")]
#[command(version = "0.1.0")]
#[command(about = "Carbide front-end - type checker for a small systems language")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file (.cb)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Emit diagnostics as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a module graph for errors
    Check {
        /// Entry source file
        input: PathBuf,

        /// Emit diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print version information
    Version,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Check { input, json }) => check_file(&input, json),
        Some(Commands::Version) => {
            println!("carbc 0.1.0");
            println!("Carbide front-end");
            println!("License: Apache-2.0");
            Ok(())
        }
        None => match cli.input {
            Some(input) => {
                let json = cli.json;
                check_file(&input, json)
            }
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: carbc <FILE> or carbc check <FILE>");
                process::exit(1);
            }
        },
    }
}

/// Load and analyze the module graph rooted at `input`, then report
/// every diagnostic the analyzer collected
fn check_file(input: &PathBuf, json: bool) -> anyhow::Result<()> {
    let mut loader = ModuleLoader::new();
    loader
        .load(input)
        .with_context(|| format!("failed to load {}", input.display()))?;

    let diagnostics = loader.diagnostics();
    if json {
        println!("{}", serde_json::to_string_pretty(diagnostics)?);
    } else {
        for diagnostic in diagnostics {
            eprintln!("{}", diagnostic);
        }
    }

    if diagnostics.is_empty() {
        println!("✅ No errors found");
        Ok(())
    } else {
        eprintln!("{} error(s) found", diagnostics.len());
        process::exit(1);
    }
}
