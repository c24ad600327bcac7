//! UI module - Command Line Interface
//!
//! Argument parsing and console output for the tracer binary.

pub mod cli;
