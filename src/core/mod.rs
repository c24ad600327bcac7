//! Core module - the tracer proper
//!
//! Base discovery, breakpoint bookkeeping, register capture and the
//! debug-event loop, all written against [`crate::debug::DebugApi`].

pub mod breakpoint;
pub mod capture;
pub mod launcher;
pub mod tracer;


pub use breakpoint::{normalize_address, Hook, HookTable};
pub use launcher::{wait_for_image_base, Launched, PendingEvent};
pub use tracer::{TraceState, TraceSummary, Tracer};
