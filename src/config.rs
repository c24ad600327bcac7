//! Configuration - run parameters and output preferences.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::breakpoint::IMAGE_BASE_OFFSET;
use crate::error::TraceError;
use crate::seq::TraceUnit;

/// Parameters of one tracing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    /// Target executable
    pub path: PathBuf,
    /// Breakpoint address, relative to the image or in its preferred layout
    pub address: u32,
    /// Maximum number of instructions to capture
    pub length: usize,
    /// N-gram order reported at the end
    pub order: usize,
    pub unit: TraceUnit,
    /// Bound on waiting for the main image to load; `None` waits forever
    pub load_timeout: Option<Duration>,
}

/// Header facts about the target image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub preferred_base: u64,
    pub entry_point: u64,
}

impl TraceConfig {
    /// Check the target and make its path absolute
    pub fn validate(&mut self) -> Result<ImageInfo, TraceError> {
        if self.path.is_dir() {
            return Err(TraceError::Validation(format!(
                "{} is a directory",
                self.path.display()
            )));
        }
        if !self.path.exists() {
            return Err(TraceError::Validation(format!(
                "{} does not exist",
                self.path.display()
            )));
        }

        self.path = std::path::absolute(&self.path).map_err(|e| {
            TraceError::Validation(format!("cannot resolve {}: {}", self.path.display(), e))
        })?;

        let info = inspect_image(&self.path)?;
        if info.preferred_base != IMAGE_BASE_OFFSET as u64 {
            log::warn!(
                "{} prefers base {:#x}; addresses at or above {:#x} are still rebased from {:#x}",
                self.path.display(),
                info.preferred_base,
                IMAGE_BASE_OFFSET,
                IMAGE_BASE_OFFSET
            );
        }
        Ok(info)
    }
}

/// Parse the PE headers and require a 32-bit image
fn inspect_image(path: &Path) -> Result<ImageInfo, TraceError> {
    let bytes = std::fs::read(path).map_err(|e| {
        TraceError::Validation(format!("cannot read {}: {}", path.display(), e))
    })?;
    let pe = goblin::pe::PE::parse(&bytes).map_err(|e| {
        TraceError::Validation(format!("{} is not a PE image: {}", path.display(), e))
    })?;
    if pe.is_64 {
        return Err(TraceError::Validation(format!(
            "{} is a 64-bit image; only 32-bit targets can be traced",
            path.display()
        )));
    }

    let info = ImageInfo {
        preferred_base: pe.image_base as u64,
        entry_point: pe.entry as u64,
    };
    log::debug!(
        "Image base {:#x}, entry point RVA {:#x}",
        info.preferred_base,
        info.entry_point
    );
    Ok(info)
}

/// Output preferences, resolved once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preferences {
    redirected: bool,
}

impl Preferences {
    pub fn new(redirected: bool) -> Self {
        Self { redirected }
    }

    /// Treat stdout as redirected when it is not a terminal
    pub fn detect() -> Self {
        Self::new(!std::io::stdout().is_terminal())
    }

    pub fn is_redirected(&self) -> bool {
        self.redirected
    }
}
