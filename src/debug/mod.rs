//! Debug module - the OS debugging interface consumed by the tracer.
//!
//! Provides:
//! - Debug event wait/continue
//! - Byte-granular process memory access
//! - Thread context read/write
//! - Image base discovery

pub mod types;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(test)]
pub mod fake;

use std::time::Duration;

use crate::error::TraceError;
use types::{ContinueStatus, DebugEvent, X86Context};

/// Platform debugging seam
///
/// All operations are only valid while the debuggee is stopped at a debug
/// event, except [`DebugApi::wait_event`].
pub trait DebugApi {
    /// Open handle to a debuggee thread
    type Thread;

    /// Block for the next debug event. `None` waits forever; `Ok(None)` means
    /// the timeout elapsed without an event.
    fn wait_event(&mut self, timeout: Option<Duration>) -> Result<Option<DebugEvent>, TraceError>;

    /// Resume the debuggee after an event
    fn continue_event(
        &mut self,
        process_id: u32,
        thread_id: u32,
        status: ContinueStatus,
    ) -> Result<(), TraceError>;

    /// Read one byte of debuggee memory
    fn read_byte(&self, address: u32) -> Result<u8, TraceError>;

    /// Write one byte of debuggee memory
    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), TraceError>;

    fn open_thread(&self, thread_id: u32) -> Result<Self::Thread, TraceError>;

    fn get_context(&self, thread: &Self::Thread) -> Result<X86Context, TraceError>;

    fn set_context(&mut self, thread: &Self::Thread, context: &X86Context) -> Result<(), TraceError>;

    /// Load address of the main image, once the loader has mapped it
    fn image_base(&self) -> Option<u64>;
}
