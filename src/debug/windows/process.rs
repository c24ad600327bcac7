//! Debuggee process launch and main module lookup.

use std::path::Path;

use windows::core::{HSTRING, PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, HANDLE, HMODULE};
use windows::Win32::System::ProcessStatus::EnumProcessModules;
use windows::Win32::System::Threading::{
    CreateProcessW, TerminateProcess, WaitForSingleObject, CREATE_NEW_CONSOLE, DEBUG_PROCESS,
    PROCESS_INFORMATION, STARTUPINFOW,
};

use crate::error::{OsError, TraceError};

/// How long teardown waits for the killed debuggee to go away
const TERMINATE_WAIT_MS: u32 = 1000;

/// A process created under our debugger
///
/// Dropping it kills the process and releases its handles.
pub struct DebuggeeProcess {
    process_id: u32,
    thread_id: u32,
    process: HANDLE,
    thread: HANDLE,
}

impl DebuggeeProcess {
    /// Start `path` as a debuggee in its own console
    pub fn spawn(path: &Path) -> Result<Self, TraceError> {
        let application = HSTRING::from(path.as_os_str());
        let startup = STARTUPINFOW {
            cb: std::mem::size_of::<STARTUPINFOW>() as u32,
            ..Default::default()
        };
        let mut info = PROCESS_INFORMATION::default();

        unsafe {
            CreateProcessW(
                &application,
                PWSTR::null(),
                None,
                None,
                false,
                DEBUG_PROCESS | CREATE_NEW_CONSOLE,
                None,
                PCWSTR::null(),
                &startup,
                &mut info,
            )
            .map_err(|e| TraceError::Launch(OsError::from_win(&e)))?;
        }

        log::info!(
            "Launched {} as process {} (thread {})",
            path.display(),
            info.dwProcessId,
            info.dwThreadId
        );

        Ok(Self {
            process_id: info.dwProcessId,
            thread_id: info.dwThreadId,
            process: info.hProcess,
            thread: info.hThread,
        })
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    pub fn handle(&self) -> HANDLE {
        self.process
    }
}

impl Drop for DebuggeeProcess {
    fn drop(&mut self) {
        unsafe {
            let _ = TerminateProcess(self.process, 0);
            let _ = WaitForSingleObject(self.process, TERMINATE_WAIT_MS);
            let _ = CloseHandle(self.thread);
            let _ = CloseHandle(self.process);
        }
        log::debug!("Process {} terminated", self.process_id);
    }
}

/// Base of the first module in the process, once the loader has listed it
pub fn main_module_base(process: HANDLE) -> Option<u64> {
    let mut modules = [HMODULE::default(); 1];
    let mut needed = 0u32;

    unsafe {
        EnumProcessModules(
            process,
            modules.as_mut_ptr(),
            std::mem::size_of_val(&modules) as u32,
            &mut needed,
        )
        .ok()?;
    }

    let base = modules[0].0 as u64;
    (base != 0).then_some(base)
}
