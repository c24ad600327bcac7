//! Session - one launch-trace-report run over a target executable.

use crate::config::TraceConfig;
use crate::core::TraceSummary;
use crate::error::TraceError;

/// Rendered when the collector has no n-gram for the requested order
pub const EMPTY_NGRAM: &str = "{}";

/// Everything a run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub process_id: u32,
    pub base_address: u32,
    pub hook_address: u32,
    pub summary: TraceSummary,
    pub ngram: String,
}

/// Launch the validated target, trace it and extract the n-gram.
///
/// The debuggee is unpatched and terminated before this returns, on success
/// and on error alike.
#[cfg(target_os = "windows")]
pub fn run(config: &TraceConfig) -> Result<SessionReport, TraceError> {
    use crate::core::{wait_for_image_base, Tracer};
    use crate::debug::types::DebugTarget;
    use crate::debug::windows::{DebuggeeProcess, ProcessMemory, WindowsDebugApi};
    use crate::seq::NGramCollector;

    let process = DebuggeeProcess::spawn(&config.path)?;
    let target_ids = (process.process_id(), process.thread_id());
    let mut api = WindowsDebugApi::new(process);

    let launched = wait_for_image_base(&mut api, target_ids.0, config.load_timeout)?;
    let target = DebugTarget {
        process_id: target_ids.0,
        thread_id: target_ids.1,
        base_address: launched.base_address,
    };
    log::info!("Base address: {:#x}", target.base_address);

    let collector = NGramCollector::new(ProcessMemory::open(target.process_id)?, config.unit);
    let mut tracer = Tracer::new(api, target, launched.pending, collector);

    let hook_address = tracer.install(config.address)?;
    let summary = tracer.run(config.length)?;
    let ngram = tracer
        .ngram(config.order)
        .unwrap_or_else(|| EMPTY_NGRAM.to_string());

    Ok(SessionReport {
        process_id: target.process_id,
        base_address: target.base_address,
        hook_address,
        summary,
        ngram,
    })
}

#[cfg(not(target_os = "windows"))]
pub fn run(config: &TraceConfig) -> Result<SessionReport, TraceError> {
    Err(TraceError::Validation(format!(
        "cannot trace {}: debugging requires a Windows host",
        config.path.display()
    )))
}
