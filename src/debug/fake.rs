//! In-memory debuggee used by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use super::types::{ContinueStatus, DebugEvent, EventKind, X86Context};
use super::DebugApi;
use crate::error::{OsError, TraceError};

const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_HANDLE: u32 = 6;
const ERROR_PARTIAL_COPY: u32 = 299;

/// Memory shared with the test so it can be inspected after the tracer drops
pub type SharedMemory = Rc<RefCell<HashMap<u32, u8>>>;

#[derive(Default)]
pub struct FakeDebuggee {
    pub memory: SharedMemory,
    pub events: VecDeque<DebugEvent>,
    pub continued: Vec<(u32, u32, ContinueStatus)>,
    pub contexts: HashMap<u32, X86Context>,
    /// Image base reported once this many events have been delivered
    pub base: Option<(usize, u64)>,
    pub delivered: usize,
    pub read_only: HashSet<u32>,
    pub fail_wait: bool,
    pub fail_set_context: bool,
}

pub struct FakeThread(pub u32);

impl FakeDebuggee {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(self, address: u32, bytes: &[u8]) -> Self {
        {
            let mut memory = self.memory.borrow_mut();
            for (offset, byte) in bytes.iter().enumerate() {
                memory.insert(address + offset as u32, *byte);
            }
        }
        self
    }

    pub fn with_base(mut self, after_events: usize, base: u64) -> Self {
        self.base = Some((after_events, base));
        self
    }

    pub fn with_thread(mut self, thread_id: u32) -> Self {
        self.contexts.insert(
            thread_id,
            X86Context {
                eflags: 0x202,
                seg_cs: 0x23,
                seg_ss: 0x2B,
                seg_ds: 0x2B,
                seg_es: 0x2B,
                seg_fs: 0x53,
                seg_gs: 0x2B,
                ..Default::default()
            },
        );
        self
    }

    pub fn push(&mut self, process_id: u32, thread_id: u32, kind: EventKind) {
        self.events.push_back(DebugEvent::new(process_id, thread_id, kind));
    }

    pub fn byte_at(&self, address: u32) -> Option<u8> {
        self.memory.borrow().get(&address).copied()
    }
}

impl DebugApi for FakeDebuggee {
    type Thread = FakeThread;

    fn wait_event(&mut self, _timeout: Option<Duration>) -> Result<Option<DebugEvent>, TraceError> {
        if self.fail_wait {
            return Err(TraceError::OsWait(OsError::new(ERROR_INVALID_HANDLE)));
        }
        let Some(event) = self.events.pop_front() else {
            return Ok(None);
        };
        self.delivered += 1;

        // Mirror what the CPU leaves in the context for each exception
        if let Some(ctx) = self.contexts.get_mut(&event.thread_id) {
            match event.kind {
                EventKind::Breakpoint { address } => ctx.eip = address as u32 + 1,
                EventKind::SingleStep { address } => {
                    ctx.eip = address as u32;
                    ctx.eflags &= !super::types::TRAP_FLAG;
                }
                _ => {}
            }
        }
        Ok(Some(event))
    }

    fn continue_event(
        &mut self,
        process_id: u32,
        thread_id: u32,
        status: ContinueStatus,
    ) -> Result<(), TraceError> {
        self.continued.push((process_id, thread_id, status));
        Ok(())
    }

    fn read_byte(&self, address: u32) -> Result<u8, TraceError> {
        self.byte_at(address).ok_or(TraceError::MemoryAccess {
            address,
            source: OsError::new(ERROR_PARTIAL_COPY),
        })
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), TraceError> {
        if self.read_only.contains(&address) {
            return Err(TraceError::MemoryAccess {
                address,
                source: OsError::new(ERROR_ACCESS_DENIED),
            });
        }
        self.memory.borrow_mut().insert(address, value);
        Ok(())
    }

    fn open_thread(&self, thread_id: u32) -> Result<FakeThread, TraceError> {
        if self.contexts.contains_key(&thread_id) {
            Ok(FakeThread(thread_id))
        } else {
            Err(TraceError::ContextAccess {
                thread_id,
                source: OsError::new(ERROR_INVALID_HANDLE),
            })
        }
    }

    fn get_context(&self, thread: &FakeThread) -> Result<X86Context, TraceError> {
        self.contexts.get(&thread.0).copied().ok_or(TraceError::ContextAccess {
            thread_id: thread.0,
            source: OsError::new(ERROR_INVALID_HANDLE),
        })
    }

    fn set_context(&mut self, thread: &FakeThread, context: &X86Context) -> Result<(), TraceError> {
        if self.fail_set_context {
            return Err(TraceError::ContextAccess {
                thread_id: thread.0,
                source: OsError::new(ERROR_ACCESS_DENIED),
            });
        }
        self.contexts.insert(thread.0, *context);
        Ok(())
    }

    fn image_base(&self) -> Option<u64> {
        self.base
            .filter(|(after, _)| self.delivered >= *after)
            .map(|(_, base)| base)
    }
}
