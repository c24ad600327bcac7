//! CLI - argument parsing and console output
//!
//! Verbose, colored output for a terminal; a single bare n-gram line when
//! stdout is redirected.

use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use colored::Colorize;

use crate::config::{Preferences, TraceConfig};
use crate::seq::TraceUnit;
use crate::session::SessionReport;

/// seqtrace: instruction n-grams from a traced 32-bit executable
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target executable to trace
    pub filename: PathBuf,

    /// Breakpoint address (decimal or 0x-prefixed hex)
    #[arg(value_parser = parse_u32)]
    pub address: u32,

    /// Number of instructions to capture
    #[arg(value_parser = parse_u32)]
    pub length: u32,

    /// N-gram order (1-3)
    #[arg(value_parser = parse_order)]
    pub n: u32,

    /// Unit of symbolization
    #[arg(value_enum)]
    pub unit: TraceUnit,

    /// Seconds to wait for the target to map its image (0 waits forever)
    #[arg(long, default_value_t = 30)]
    pub load_timeout: u64,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn into_config(self) -> TraceConfig {
        TraceConfig {
            path: self.filename,
            address: self.address,
            length: self.length as usize,
            order: self.n as usize,
            unit: self.unit,
            load_timeout: (self.load_timeout != 0).then(|| Duration::from_secs(self.load_timeout)),
        }
    }

    /// Log filter matching the `-v` count
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Parse a number string (supports 0x prefix and decimal)
pub fn parse_number(s: &str) -> Result<u64, std::num::ParseIntError> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let value = parse_number(s).map_err(|e| format!("'{}' is not a number: {}", s, e))?;
    u32::try_from(value).map_err(|_| format!("'{}' does not fit in 32 bits", s))
}

fn parse_order(s: &str) -> Result<u32, String> {
    match parse_u32(s)? {
        n @ 1..=3 => Ok(n),
        n => Err(format!("n should be 1-3, got {}", n)),
    }
}

/// Whether a parse failure is really a request for usage text
pub fn is_usage_request(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            | ErrorKind::MissingRequiredArgument
            | ErrorKind::UnknownArgument
    )
}

/// Echo the inputs before tracing starts
pub fn print_inputs(prefs: &Preferences, config: &TraceConfig) {
    if prefs.is_redirected() {
        return;
    }
    println!("{}", "===== INPUTS =====".bold().cyan());
    println!("filename: {}", config.path.display());
    println!("address: {:#x}", config.address);
    println!("length: {}", config.length);
    println!("n: {}", config.order);
    println!("unit: {}", config.unit);
    println!("{}", "==================".bold().cyan());
}

/// Print the outcome of a successful run
pub fn print_report(prefs: &Preferences, report: &SessionReport) {
    if prefs.is_redirected() {
        println!("{}", report.ngram);
        return;
    }
    println!("[*] baseaddress: {:#x}", report.base_address);
    println!("[*] set_address: {:#x}", report.hook_address);
    let ending = if report.summary.exited {
        "process exited"
    } else {
        "budget reached"
    };
    println!("[*] captured {} instructions ({})", report.summary.steps, ending);
    println!("{} {}", "NGram =".bold().green(), report.ngram);
}

/// Single diagnostic line for a failed run
pub fn print_error(prefs: &Preferences, err: &anyhow::Error) {
    let line = diagnostic_line(err);
    if prefs.is_redirected() {
        eprintln!("{}", line);
    } else {
        eprintln!("{} {}", "[!]".red(), line);
    }
}

/// Context plus the tracer error; the tracer error already spells out the OS
/// failure beneath it
pub fn diagnostic_line(err: &anyhow::Error) -> String {
    match err.chain().nth(1) {
        Some(cause) => format!("{}: {}", err, cause),
        None => err.to_string(),
    }
}
