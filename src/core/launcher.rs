//! Launcher - waits for a fresh debuggee to map its main image.

use std::time::{Duration, Instant};

use crate::debug::types::{ContinueStatus, DebugEvent, EventKind};
use crate::debug::DebugApi;
use crate::error::TraceError;

/// A debug event that has been received but not yet continued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEvent {
    pub process_id: u32,
    pub thread_id: u32,
    pub status: ContinueStatus,
}

impl PendingEvent {
    fn of(event: &DebugEvent) -> Self {
        Self {
            process_id: event.process_id,
            thread_id: event.thread_id,
            status: event.default_status(),
        }
    }
}

/// Outcome of base discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Launched {
    /// Main image base, truncated to 32 bits
    pub base_address: u32,
    /// The event the debuggee is stopped at, if any
    pub pending: Option<PendingEvent>,
}

/// Service debug events until the main image base is known.
///
/// The debuggee is left stopped at the event where the base appeared, so the
/// caller can patch memory before it runs on. `timeout` of `None` waits forever.
pub fn wait_for_image_base<A: DebugApi>(
    api: &mut A,
    process_id: u32,
    timeout: Option<Duration>,
) -> Result<Launched, TraceError> {
    if let Some(base) = api.image_base() {
        return Ok(Launched {
            base_address: truncate(base),
            pending: None,
        });
    }

    let started = Instant::now();
    let deadline = timeout.map(|t| started + t);

    loop {
        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        if remaining == Some(Duration::ZERO) {
            return Err(TraceError::LoadTimeout {
                process_id,
                waited: started.elapsed(),
            });
        }

        let Some(event) = api.wait_event(remaining)? else {
            continue;
        };
        log::trace!("Launch event: {:?}", event);

        let pending = PendingEvent::of(&event);

        if let EventKind::ProcessExited { exit_code } = event.kind {
            if event.process_id == process_id {
                api.continue_event(pending.process_id, pending.thread_id, pending.status)?;
                return Err(TraceError::TargetExited { exit_code });
            }
        }

        if let Some(base) = api.image_base() {
            log::debug!(
                "Image base {:#x} known after {:?}",
                base,
                started.elapsed()
            );
            return Ok(Launched {
                base_address: truncate(base),
                pending: Some(pending),
            });
        }

        api.continue_event(pending.process_id, pending.thread_id, pending.status)?;
    }
}

fn truncate(base: u64) -> u32 {
    (base & 0xFFFF_FFFF) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::fake::FakeDebuggee;

    const PID: u32 = 100;
    const TID: u32 = 200;

    #[test]
    fn test_base_known_immediately() {
        let mut api = FakeDebuggee::new().with_base(0, 0x0040_0000);
        let launched = wait_for_image_base(&mut api, PID, None).unwrap();
        assert_eq!(launched.base_address, 0x0040_0000);
        assert!(launched.pending.is_none());
        assert!(api.continued.is_empty());
    }

    #[test]
    fn test_interim_events_are_continued_by_kind() {
        let mut api = FakeDebuggee::new().with_base(3, 0x7FF6_0013_0000);
        api.push(PID, TID, EventKind::ProcessCreated);
        api.push(PID, TID, EventKind::Breakpoint { address: 0x7710_0000 });
        api.push(PID, TID, EventKind::DllLoaded { base_address: 0x7700_0000 });

        let launched = wait_for_image_base(&mut api, PID, None).unwrap();
        assert_eq!(launched.base_address, 0x0013_0000);
        assert_eq!(
            api.continued,
            vec![
                (PID, TID, ContinueStatus::Handled),
                (PID, TID, ContinueStatus::NotHandled),
            ]
        );
        // The event that revealed the base is held for the trace loop
        assert_eq!(
            launched.pending,
            Some(PendingEvent {
                process_id: PID,
                thread_id: TID,
                status: ContinueStatus::Handled,
            })
        );
    }

    #[test]
    fn test_exit_before_load() {
        let mut api = FakeDebuggee::new();
        api.push(PID, TID, EventKind::ProcessCreated);
        api.push(PID, TID, EventKind::ProcessExited { exit_code: 0xC000_0135 });

        assert!(matches!(
            wait_for_image_base(&mut api, PID, None),
            Err(TraceError::TargetExited { exit_code: 0xC000_0135 })
        ));
        assert_eq!(api.continued.len(), 2);
    }

    #[test]
    fn test_discovery_times_out() {
        let mut api = FakeDebuggee::new();
        api.push(PID, TID, EventKind::ProcessCreated);

        let err = wait_for_image_base(&mut api, PID, Some(Duration::from_millis(20))).unwrap_err();
        assert!(matches!(err, TraceError::LoadTimeout { process_id: PID, .. }));
    }

    #[test]
    fn test_wait_failure_propagates() {
        let mut api = FakeDebuggee::new();
        api.fail_wait = true;
        assert!(matches!(
            wait_for_image_base(&mut api, PID, None),
            Err(TraceError::OsWait(_))
        ));
    }
}
