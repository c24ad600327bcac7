//! Sequence collection - turns the traced register stream into n-grams.
//!
//! The tracer only sees the [`SequenceCollector`] trait; [`NGramCollector`] is
//! the implementation the CLI uses.

pub mod ngram;

use std::fmt;

use thiserror::Error;

use crate::debug::types::RegisterSnapshot;

pub use ngram::{CodeReader, NGramCollector};

/// Unit of symbolization for one traced instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TraceUnit {
    /// Op-code form of the instruction (e.g. `8B /r`)
    #[default]
    Opcode,
    /// Instruction mnemonic (e.g. `mov`)
    Mnemonic,
    /// Raw encoded instruction bytes
    Original,
}

impl fmt::Display for TraceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Opcode => "opcode",
            Self::Mnemonic => "mnemonic",
            Self::Original => "original",
        })
    }
}

/// Collector errors
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("failed to read code at {address:#x}: {reason}")]
    Read { address: u32, reason: String },

    #[error("invalid instruction at {address:#x}")]
    Decode { address: u32 },
}

/// Receiver of the traced instruction stream
///
/// Construction plays the role of initialization and `Drop` of
/// deinitialization.
pub trait SequenceCollector {
    /// Append one executed instruction
    fn add_instruction(&mut self, regs: RegisterSnapshot) -> Result<(), CollectorError>;

    /// Render the collected stream as an n-gram of `order` 1, 2 or 3
    fn ngram(&self, order: usize) -> Option<String>;
}
