//! N-gram collector over decoded 32-bit instructions.

use std::collections::BTreeMap;

use iced_x86::{Decoder, DecoderOptions, Instruction};

use super::{CollectorError, SequenceCollector, TraceUnit};
use crate::debug::types::RegisterSnapshot;

/// Longest legal x86 instruction
const MAX_INSTRUCTION_LEN: usize = 15;

/// Source of instruction bytes in the traced process
pub trait CodeReader {
    /// Fill as much of `buf` as is readable at `address`, returning the count
    fn read_code(&self, address: u32, buf: &mut [u8]) -> Result<usize, CollectorError>;
}

/// Accumulates one symbol per executed instruction
pub struct NGramCollector<R: CodeReader> {
    reader: R,
    unit: TraceUnit,
    symbols: Vec<String>,
}

impl<R: CodeReader> NGramCollector<R> {
    pub fn new(reader: R, unit: TraceUnit) -> Self {
        Self {
            reader,
            unit,
            symbols: Vec::new(),
        }
    }

    pub fn unit(&self) -> TraceUnit {
        self.unit
    }

    /// Symbols collected so far, in execution order
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn symbolize(&self, instruction: &Instruction, bytes: &[u8]) -> String {
        match self.unit {
            TraceUnit::Opcode => instruction.op_code().op_code_string().to_string(),
            TraceUnit::Mnemonic => format!("{:?}", instruction.mnemonic()).to_lowercase(),
            TraceUnit::Original => hex::encode(&bytes[..instruction.len()]),
        }
    }
}

impl<R: CodeReader> SequenceCollector for NGramCollector<R> {
    fn add_instruction(&mut self, regs: RegisterSnapshot) -> Result<(), CollectorError> {
        let mut buf = [0u8; MAX_INSTRUCTION_LEN];
        let len = self.reader.read_code(regs.eip, &mut buf)?;
        let bytes = &buf[..len];

        let mut decoder = Decoder::with_ip(32, bytes, regs.eip as u64, DecoderOptions::NONE);
        let instruction = decoder.decode();
        if instruction.is_invalid() {
            return Err(CollectorError::Decode { address: regs.eip });
        }

        let symbol = self.symbolize(&instruction, bytes);
        log::trace!("{:#010x}: {}", regs.eip, symbol);
        self.symbols.push(symbol);
        Ok(())
    }

    fn ngram(&self, order: usize) -> Option<String> {
        if !(1..=3).contains(&order) {
            return None;
        }

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for window in self.symbols.windows(order) {
            *counts.entry(window.join(" ")).or_default() += 1;
        }
        serde_json::to_string(&counts).ok()
    }
}
