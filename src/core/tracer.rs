//! Tracer - the debug-event state machine
//!
//! Runs the debuggee up to the managed breakpoint, then single-steps the
//! thread that hit it, forwarding one register snapshot per instruction.

use super::breakpoint::HookTable;
use super::capture::capture_and_arm;
use super::launcher::PendingEvent;
use crate::debug::types::{ContinueStatus, DebugEvent, DebugTarget, EventKind};
use crate::debug::DebugApi;
use crate::error::TraceError;
use crate::seq::SequenceCollector;

/// Trace loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceState {
    /// Debuggee running, no trap installed
    #[default]
    Running,
    /// Debuggee running toward an installed trap
    BreakpointArmed,
    /// Trap flag set on `thread_id`; one event per instruction
    SingleStepping { thread_id: u32 },
    /// Budget exhausted or process gone
    Done { exited: bool },
}

/// Result of one [`Tracer::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceSummary {
    /// Snapshots forwarded to the collector
    pub steps: usize,
    /// Whether the loop ended on process exit
    pub exited: bool,
}

/// One tracing session over a launched debuggee
///
/// Dropping the tracer restores every trap still in memory before the
/// debugging backend (and with it the debuggee) is torn down.
pub struct Tracer<A: DebugApi, C: SequenceCollector> {
    api: A,
    collector: C,
    target: DebugTarget,
    hooks: HookTable,
    pending: Option<PendingEvent>,
    state: TraceState,
}

impl<A: DebugApi, C: SequenceCollector> Tracer<A, C> {
    pub fn new(api: A, target: DebugTarget, pending: Option<PendingEvent>, collector: C) -> Self {
        Self {
            api,
            collector,
            target,
            hooks: HookTable::new(),
            pending,
            state: TraceState::Running,
        }
    }

    /// Install the trap at a caller-relative address
    pub fn install(&mut self, virtual_address: u32) -> Result<u32, TraceError> {
        self.hooks
            .install(&mut self.api, self.target.base_address, virtual_address)
    }

    /// Trace until `length` snapshots were forwarded or the process exits
    pub fn run(&mut self, length: usize) -> Result<TraceSummary, TraceError> {
        if let Some(pending) = self.pending.take() {
            self.api
                .continue_event(pending.process_id, pending.thread_id, pending.status)?;
        }

        self.state = if self.hooks.any_armed() {
            TraceState::BreakpointArmed
        } else {
            TraceState::Running
        };
        log::info!(
            "Tracing process {} for up to {} steps",
            self.target.process_id,
            length
        );

        let mut steps = 0;
        let mut exited = false;
        while steps < length {
            let Some(event) = self.api.wait_event(None)? else {
                continue;
            };
            log::trace!("[{:?}] {:?}", self.state, event);

            match self.dispatch(&event)? {
                Dispatch::Exit => {
                    exited = true;
                    break;
                }
                Dispatch::Captured => steps += 1,
                Dispatch::Ignored => {}
            }
        }

        self.state = TraceState::Done { exited };
        log::info!("Trace finished after {} steps (exited: {})", steps, exited);
        Ok(TraceSummary { steps, exited })
    }

    fn dispatch(&mut self, event: &DebugEvent) -> Result<Dispatch, TraceError> {
        let DebugEvent {
            process_id,
            thread_id,
            ..
        } = *event;

        let (status, outcome) = match event.kind {
            EventKind::ProcessExited { exit_code } if process_id == self.target.process_id => {
                log::info!("Process {} exited with code {:#x}", process_id, exit_code);
                (ContinueStatus::Handled, Dispatch::Exit)
            }
            EventKind::Breakpoint { address } if self.hooks.is_armed_at(address as u32) => {
                let address = address as u32;
                self.hooks.restore(&mut self.api, address)?;
                log::info!("Breakpoint hit at {:#x} on thread {}", address, thread_id);
                self.forward(thread_id, Some(address))?;
                (ContinueStatus::Handled, Dispatch::Captured)
            }
            EventKind::SingleStep { .. } if self.is_stepping(thread_id) => {
                self.forward(thread_id, None)?;
                (ContinueStatus::Handled, Dispatch::Captured)
            }
            EventKind::Breakpoint { address } | EventKind::SingleStep { address } => {
                log::debug!(
                    "Foreign exception at {:#x} on thread {}, passing on",
                    address,
                    thread_id
                );
                (ContinueStatus::NotHandled, Dispatch::Ignored)
            }
            _ => (event.default_status(), Dispatch::Ignored),
        };

        self.api.continue_event(process_id, thread_id, status)?;
        Ok(outcome)
    }

    fn is_stepping(&self, thread_id: u32) -> bool {
        matches!(self.state, TraceState::SingleStepping { thread_id: t } if t == thread_id)
    }

    /// Capture, re-arm single-step and hand the snapshot to the collector
    fn forward(&mut self, thread_id: u32, trap_address: Option<u32>) -> Result<(), TraceError> {
        let regs = capture_and_arm(&mut self.api, thread_id, trap_address)?;
        self.state = TraceState::SingleStepping { thread_id };
        self.collector.add_instruction(regs)?;
        Ok(())
    }

    /// N-gram of the collected stream; `None` for an unsupported order
    pub fn ngram(&self, order: usize) -> Option<String> {
        self.collector.ngram(order)
    }

    pub fn state(&self) -> TraceState {
        self.state
    }

    pub fn target(&self) -> &DebugTarget {
        &self.target
    }

    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

impl<A: DebugApi, C: SequenceCollector> Drop for Tracer<A, C> {
    fn drop(&mut self) {
        if let Err(e) = self.hooks.restore_all(&mut self.api) {
            log::error!("Debuggee left patched: {}", e);
        }
    }
}

enum Dispatch {
    Exit,
    Captured,
    Ignored,
}
