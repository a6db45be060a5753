use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};

use mdmath::cli::{self, CliArgs};
use mdmath::{Engine, EngineConfig};

fn main() -> ExitCode {
    let args = cli::parse_args();

    // RUST_LOG, when set, overrides the -v level.
    env_logger::Builder::new()
        .filter_level(cli::log_filter(args.verbose))
        .parse_default_env()
        .init();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<ExitCode> {
    let path = &args.file;
    if !path.exists() {
        eprintln!("Error: File not found: {}", path.display());
        return Ok(ExitCode::FAILURE);
    }
    if !cli::has_markdown_extension(path) {
        eprintln!("Warning: File does not have .md extension: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;

    // Fresh engine per run: the store starts empty.
    let mut engine = Engine::with_config(EngineConfig { precision: args.precision });
    let result = engine.process(&content);
    log::info!("{} stored name(s) after processing", engine.store().len());

    if args.stdout {
        print!("{result}");
        return Ok(ExitCode::SUCCESS);
    }

    let out = cli::resolve_output(args);
    fs::write(&out, result).with_context(|| format!("cannot write {}", out.display()))?;
    println!("Output written to {}", out.display());
    Ok(ExitCode::SUCCESS)
}
