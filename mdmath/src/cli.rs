//! Command-line argument parsing.
//!
//! Usage:
//!   mdmath [-o <out>] [--stdout] [--precision <n>] [-v…] <file>

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use log::LevelFilter;

use crate::format::DEFAULT_PRECISION;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "mdmath",
    version,
    about = "Process Python code embedded in LaTeX math blocks in Markdown files."
)]
pub struct CliArgs {
    /// Path to the Markdown file to process.
    pub file: PathBuf,

    /// Output file path (default: <input>.output.md).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write the result to stdout instead of a file.
    #[arg(long)]
    pub stdout: bool,

    /// Fractional digits kept when numbers are formatted.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PRECISION)]
    pub precision: usize,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()`; exits with usage on error, `--help`, or
/// `--version`.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Parse a slice of argument strings, program name excluded (exposed for
/// testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let full = std::iter::once("mdmath").chain(argv.iter().map(String::as_str));
    CliArgs::try_parse_from(full).map_err(|e| e.to_string())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Where the processed document goes: `-o` if given, otherwise the input
/// path with its extension replaced by `.output.md`.
pub fn resolve_output(args: &CliArgs) -> PathBuf {
    match &args.output {
        Some(out) => out.clone(),
        None => args.file.with_extension("output.md"),
    }
}

/// `true` if `path` ends in `.md` (case-sensitive).
pub fn has_markdown_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

/// Log level for a `-v` count.
pub fn log_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn parse(v: &[&str]) -> CliArgs {
        parse_argv(&args(v)).expect("parse failed")
    }

    #[test]
    fn file_only() {
        let a = parse(&["notes.md"]);
        assert_eq!(a.file, PathBuf::from("notes.md"));
        assert!(a.output.is_none());
        assert!(!a.stdout);
        assert_eq!(a.precision, DEFAULT_PRECISION);
        assert_eq!(a.verbose, 0);
    }

    #[test]
    fn output_flag() {
        assert_eq!(parse(&["a.md", "-o", "b.md"]).output, Some(PathBuf::from("b.md")));
        assert_eq!(parse(&["--output", "b.md", "a.md"]).output, Some(PathBuf::from("b.md")));
    }

    #[test]
    fn verbose_counts() {
        assert_eq!(parse(&["-vv", "a.md"]).verbose, 2);
        assert_eq!(parse(&["-v", "a.md", "--verbose"]).verbose, 2);
    }

    #[test]
    fn precision_and_stdout() {
        let a = parse(&["--precision", "3", "--stdout", "a.md"]);
        assert_eq!(a.precision, 3);
        assert!(a.stdout);
    }

    #[test]
    fn missing_file_is_error() {
        assert!(parse_argv(&args(&[])).is_err());
    }

    #[test]
    fn bad_precision_is_error() {
        assert!(parse_argv(&args(&["--precision", "lots", "a.md"])).is_err());
    }

    #[test]
    fn default_output_path() {
        assert_eq!(resolve_output(&parse(&["doc.md"])), PathBuf::from("doc.output.md"));
        assert_eq!(resolve_output(&parse(&["dir/a.b.md"])), PathBuf::from("dir/a.b.output.md"));
        assert_eq!(resolve_output(&parse(&["notes"])), PathBuf::from("notes.output.md"));
    }

    #[test]
    fn explicit_output_path() {
        assert_eq!(resolve_output(&parse(&["doc.md", "-o", "x.txt"])), PathBuf::from("x.txt"));
    }

    #[test]
    fn markdown_extension() {
        assert!(has_markdown_extension(Path::new("a.md")));
        assert!(!has_markdown_extension(Path::new("a.txt")));
        assert!(!has_markdown_extension(Path::new("a.MD")));
        assert!(!has_markdown_extension(Path::new("md")));
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(log_filter(0), LevelFilter::Warn);
        assert_eq!(log_filter(1), LevelFilter::Info);
        assert_eq!(log_filter(2), LevelFilter::Debug);
        assert_eq!(log_filter(9), LevelFilter::Trace);
    }
}
