//! Error - OS failure translation and the tracer error taxonomy
//!
//! Every OS call failure is captured as an [`OsError`] at the call site, so the
//! diagnostic names both the Win32 code and the line that raised it.

use std::fmt;
use std::panic::Location;
use std::time::Duration;

use thiserror::Error;

use crate::seq::CollectorError;

/// HRESULT facility carrying a plain Win32 error code
const FACILITY_WIN32_MASK: u32 = 0xFFFF_0000;
const FACILITY_WIN32_PREFIX: u32 = 0x8007_0000;

/// A failed OS call, attributed to the place that made it
#[derive(Debug, Clone)]
pub struct OsError {
    /// Win32 error code (or raw status when not in the Win32 facility)
    pub code: u32,
    /// System-provided description, if the OS had one
    pub message: Option<String>,
    /// Source location of the failing call
    pub location: &'static Location<'static>,
}

impl OsError {
    /// Record a failure with `code` at the caller's location
    #[track_caller]
    pub fn new(code: u32) -> Self {
        Self {
            code,
            message: None,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn with_message(code: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = message.trim();
        Self {
            code,
            message: (!message.is_empty()).then(|| message.to_string()),
            location: Location::caller(),
        }
    }

    /// Unwrap an HRESULT into its Win32 code when it belongs to that facility
    pub fn code_from_hresult(hresult: u32) -> u32 {
        if hresult & FACILITY_WIN32_MASK == FACILITY_WIN32_PREFIX {
            hresult & 0xFFFF
        } else {
            hresult
        }
    }

    /// Translate a `windows` crate error raised at the caller's location
    #[cfg(target_os = "windows")]
    #[track_caller]
    pub fn from_win(err: &windows::core::Error) -> Self {
        let code = Self::code_from_hresult(err.code().0 as u32);
        Self::with_message(code, err.message().to_string())
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "error 0x{:08X}: {}", self.code, message)?,
            None => write!(f, "unknown error 0x{:08X}", self.code)?,
        }
        write!(
            f,
            " (at {}:{}:{})",
            self.location.file(),
            self.location.line(),
            self.location.column()
        )
    }
}

impl std::error::Error for OsError {}

/// Tracer errors
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("failed to launch target: {0}")]
    Launch(#[source] OsError),

    #[error("debug event wait failed: {0}")]
    OsWait(#[source] OsError),

    #[error("memory access at {address:#x} failed: {source}")]
    MemoryAccess {
        address: u32,
        #[source]
        source: OsError,
    },

    #[error("thread {thread_id} context access failed: {source}")]
    ContextAccess {
        thread_id: u32,
        #[source]
        source: OsError,
    },

    #[error("sequence collector failed: {0}")]
    Collector(#[from] CollectorError),

    #[error("process {process_id} loaded no module within {waited:?}")]
    LoadTimeout { process_id: u32, waited: Duration },

    #[error("target exited with code {exit_code} before its image was mapped")]
    TargetExited { exit_code: u32 },
}

impl TraceError {
    /// The OS failure underlying this error, if any
    pub fn os_error(&self) -> Option<&OsError> {
        match self {
            Self::Launch(source) | Self::OsWait(source) => Some(source),
            Self::MemoryAccess { source, .. } | Self::ContextAccess { source, .. } => Some(source),
            _ => None,
        }
    }
}
