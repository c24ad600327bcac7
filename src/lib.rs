//! seqtrace - instruction-level execution tracer
//!
//! Launches a 32-bit target under the Win32 debugger, traps at a chosen
//! address and single-steps from there, feeding each instruction's registers
//! into an n-gram collector.

pub mod config;
pub mod core;
pub mod debug;
pub mod error;
pub mod seq;
pub mod session;
pub mod ui;

pub use error::{OsError, TraceError};
