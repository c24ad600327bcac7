//! Windows-specific debugging backend using the Win32 Debug API.
//!
//! Targets are 32-bit images running under WOW64, so thread state goes
//! through the `Wow64*ThreadContext` calls.

mod memory;
mod process;

pub use memory::ProcessMemory;
pub use process::{main_module_base, DebuggeeProcess};

use std::time::Duration;

use super::types::{ContinueStatus, DebugEvent, EventKind, X86Context};
use super::DebugApi;
use crate::error::{OsError, TraceError};

use windows::Win32::Foundation::{CloseHandle, HANDLE, NTSTATUS};
use windows::Win32::System::Diagnostics::Debug::{
    ContinueDebugEvent, FlushInstructionCache, ReadProcessMemory, WaitForDebugEvent,
    Wow64GetThreadContext, Wow64SetThreadContext, WriteProcessMemory, CREATE_PROCESS_DEBUG_EVENT,
    CREATE_THREAD_DEBUG_EVENT, DEBUG_EVENT, EXCEPTION_DEBUG_EVENT, EXIT_PROCESS_DEBUG_EVENT,
    EXIT_THREAD_DEBUG_EVENT, LOAD_DLL_DEBUG_EVENT, OUTPUT_DEBUG_STRING_EVENT, RIP_EVENT,
    UNLOAD_DLL_DEBUG_EVENT, WOW64_CONTEXT, WOW64_CONTEXT_CONTROL, WOW64_CONTEXT_INTEGER,
    WOW64_CONTEXT_SEGMENTS,
};
use windows::Win32::System::Threading::{OpenThread, INFINITE, THREAD_ALL_ACCESS};

const DBG_CONTINUE: NTSTATUS = NTSTATUS(0x00010002i32);
const DBG_EXCEPTION_NOT_HANDLED: NTSTATUS = NTSTATUS(0x80010001u32 as i32);
const EXCEPTION_BREAKPOINT_CODE: u32 = 0x80000003;
const EXCEPTION_SINGLE_STEP_CODE: u32 = 0x80000004;
const STATUS_WX86_BREAKPOINT: u32 = 0x4000001F;
const STATUS_WX86_SINGLE_STEP: u32 = 0x4000001E;
const ERROR_SEM_TIMEOUT: u32 = 121;

/// Open thread handle, closed on drop
pub struct ThreadHandle {
    thread_id: u32,
    handle: HANDLE,
}

impl Drop for ThreadHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

/// Windows debugger backend over one launched debuggee
pub struct WindowsDebugApi {
    process: DebuggeeProcess,
}

impl WindowsDebugApi {
    pub fn new(process: DebuggeeProcess) -> Self {
        Self { process }
    }

    pub fn process(&self) -> &DebuggeeProcess {
        &self.process
    }
}

impl DebugApi for WindowsDebugApi {
    type Thread = ThreadHandle;

    fn wait_event(&mut self, timeout: Option<Duration>) -> Result<Option<DebugEvent>, TraceError> {
        let millis = timeout.map_or(INFINITE, |t| t.as_millis().min((INFINITE - 1) as u128) as u32);
        let mut debug_event = DEBUG_EVENT::default();

        if let Err(e) = unsafe { WaitForDebugEvent(&mut debug_event, millis) } {
            let code = OsError::code_from_hresult(e.code().0 as u32);
            if timeout.is_some() && code == ERROR_SEM_TIMEOUT {
                return Ok(None);
            }
            return Err(TraceError::OsWait(OsError::from_win(&e)));
        }

        Ok(Some(translate_event(&debug_event)))
    }

    fn continue_event(
        &mut self,
        process_id: u32,
        thread_id: u32,
        status: ContinueStatus,
    ) -> Result<(), TraceError> {
        let status = match status {
            ContinueStatus::Handled => DBG_CONTINUE,
            ContinueStatus::NotHandled => DBG_EXCEPTION_NOT_HANDLED,
        };
        unsafe {
            ContinueDebugEvent(process_id, thread_id, status)
                .map_err(|e| TraceError::OsWait(OsError::from_win(&e)))
        }
    }

    fn read_byte(&self, address: u32) -> Result<u8, TraceError> {
        let mut byte = 0u8;
        unsafe {
            ReadProcessMemory(
                self.process.handle(),
                address as usize as *const std::ffi::c_void,
                &mut byte as *mut u8 as *mut std::ffi::c_void,
                1,
                None,
            )
            .map_err(|e| TraceError::MemoryAccess {
                address,
                source: OsError::from_win(&e),
            })?;
        }
        Ok(byte)
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), TraceError> {
        let target = address as usize as *const std::ffi::c_void;
        unsafe {
            WriteProcessMemory(
                self.process.handle(),
                target,
                &value as *const u8 as *const std::ffi::c_void,
                1,
                None,
            )
            .map_err(|e| TraceError::MemoryAccess {
                address,
                source: OsError::from_win(&e),
            })?;
            let _ = FlushInstructionCache(self.process.handle(), Some(target), 1);
        }
        Ok(())
    }

    fn open_thread(&self, thread_id: u32) -> Result<ThreadHandle, TraceError> {
        let handle = unsafe {
            OpenThread(THREAD_ALL_ACCESS, false, thread_id).map_err(|e| {
                TraceError::ContextAccess {
                    thread_id,
                    source: OsError::from_win(&e),
                }
            })?
        };
        Ok(ThreadHandle { thread_id, handle })
    }

    fn get_context(&self, thread: &ThreadHandle) -> Result<X86Context, TraceError> {
        let mut context = WOW64_CONTEXT {
            ContextFlags: WOW64_CONTEXT_SEGMENTS | WOW64_CONTEXT_INTEGER | WOW64_CONTEXT_CONTROL,
            ..Default::default()
        };
        unsafe {
            Wow64GetThreadContext(thread.handle, &mut context).map_err(|e| {
                TraceError::ContextAccess {
                    thread_id: thread.thread_id,
                    source: OsError::from_win(&e),
                }
            })?;
        }
        Ok(from_wow64(&context))
    }

    fn set_context(&mut self, thread: &ThreadHandle, context: &X86Context) -> Result<(), TraceError> {
        let context = to_wow64(context);
        unsafe {
            Wow64SetThreadContext(thread.handle, &context).map_err(|e| {
                TraceError::ContextAccess {
                    thread_id: thread.thread_id,
                    source: OsError::from_win(&e),
                }
            })
        }
    }

    fn image_base(&self) -> Option<u64> {
        main_module_base(self.process.handle())
    }
}

/// Convert a raw DEBUG_EVENT, closing the file handles it hands us
fn translate_event(debug_event: &DEBUG_EVENT) -> DebugEvent {
    let process_id = debug_event.dwProcessId;
    let thread_id = debug_event.dwThreadId;

    let kind = match debug_event.dwDebugEventCode {
        EXCEPTION_DEBUG_EVENT => unsafe {
            let info = debug_event.u.Exception;
            let record = info.ExceptionRecord;
            let address = record.ExceptionAddress as u64;
            match record.ExceptionCode.0 as u32 {
                EXCEPTION_BREAKPOINT_CODE | STATUS_WX86_BREAKPOINT => EventKind::Breakpoint { address },
                EXCEPTION_SINGLE_STEP_CODE | STATUS_WX86_SINGLE_STEP => EventKind::SingleStep { address },
                code => EventKind::Exception {
                    code,
                    address,
                    first_chance: info.dwFirstChance != 0,
                },
            }
        },
        CREATE_PROCESS_DEBUG_EVENT => {
            close_if_valid(unsafe { debug_event.u.CreateProcessInfo.hFile });
            EventKind::ProcessCreated
        }
        EXIT_PROCESS_DEBUG_EVENT => EventKind::ProcessExited {
            exit_code: unsafe { debug_event.u.ExitProcess.dwExitCode },
        },
        CREATE_THREAD_DEBUG_EVENT => EventKind::ThreadCreated,
        EXIT_THREAD_DEBUG_EVENT => EventKind::ThreadExited,
        LOAD_DLL_DEBUG_EVENT => {
            let info = unsafe { debug_event.u.LoadDll };
            close_if_valid(info.hFile);
            EventKind::DllLoaded {
                base_address: info.lpBaseOfDll as u64,
            }
        }
        UNLOAD_DLL_DEBUG_EVENT => EventKind::DllUnloaded,
        OUTPUT_DEBUG_STRING_EVENT => EventKind::OutputString,
        RIP_EVENT => EventKind::Rip,
        other => {
            log::warn!("Unknown debug event code {}", other.0);
            EventKind::Rip
        }
    };

    DebugEvent::new(process_id, thread_id, kind)
}

fn close_if_valid(handle: HANDLE) {
    if !handle.is_invalid() {
        unsafe {
            let _ = CloseHandle(handle);
        }
    }
}

fn from_wow64(context: &WOW64_CONTEXT) -> X86Context {
    X86Context {
        eax: context.Eax,
        ebx: context.Ebx,
        ecx: context.Ecx,
        edx: context.Edx,
        esi: context.Esi,
        edi: context.Edi,
        ebp: context.Ebp,
        esp: context.Esp,
        eip: context.Eip,
        eflags: context.EFlags,
        seg_cs: context.SegCs,
        seg_ds: context.SegDs,
        seg_es: context.SegEs,
        seg_fs: context.SegFs,
        seg_gs: context.SegGs,
        seg_ss: context.SegSs,
    }
}

fn to_wow64(context: &X86Context) -> WOW64_CONTEXT {
    WOW64_CONTEXT {
        ContextFlags: WOW64_CONTEXT_SEGMENTS | WOW64_CONTEXT_INTEGER | WOW64_CONTEXT_CONTROL,
        Eax: context.eax,
        Ebx: context.ebx,
        Ecx: context.ecx,
        Edx: context.edx,
        Esi: context.esi,
        Edi: context.edi,
        Ebp: context.ebp,
        Esp: context.esp,
        Eip: context.eip,
        EFlags: context.eflags,
        SegCs: context.seg_cs,
        SegDs: context.seg_ds,
        SegEs: context.seg_es,
        SegFs: context.seg_fs,
        SegGs: context.seg_gs,
        SegSs: context.seg_ss,
        ..Default::default()
    }
}
