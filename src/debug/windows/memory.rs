//! Read-only view of the debuggee's code for the sequence collector.

use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ};

use crate::error::{OsError, TraceError};
use crate::seq::{CodeReader, CollectorError};

const PAGE_SIZE: u32 = 0x1000;

/// Separate read handle on the traced process, opened by process id
pub struct ProcessMemory {
    handle: HANDLE,
}

impl ProcessMemory {
    pub fn open(process_id: u32) -> Result<Self, TraceError> {
        let handle = unsafe {
            OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, process_id)
                .map_err(|e| TraceError::Launch(OsError::from_win(&e)))?
        };
        Ok(Self { handle })
    }

    fn read(&self, address: u32, buf: &mut [u8]) -> windows::core::Result<usize> {
        let mut bytes_read = 0usize;
        unsafe {
            ReadProcessMemory(
                self.handle,
                address as usize as *const std::ffi::c_void,
                buf.as_mut_ptr() as *mut std::ffi::c_void,
                buf.len(),
                Some(&mut bytes_read),
            )?;
        }
        Ok(bytes_read)
    }
}

impl CodeReader for ProcessMemory {
    fn read_code(&self, address: u32, buf: &mut [u8]) -> Result<usize, CollectorError> {
        match self.read(address, buf) {
            Ok(n) => Ok(n),
            // The full window may run into an unmapped page; retry up to the
            // end of the current one
            Err(_) => {
                let to_page_end = (PAGE_SIZE - (address % PAGE_SIZE)) as usize;
                let len = to_page_end.min(buf.len());
                self.read(address, &mut buf[..len])
                    .map_err(|e| CollectorError::Read {
                        address,
                        reason: OsError::from_win(&e).to_string(),
                    })
            }
        }
    }
}

impl Drop for ProcessMemory {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}
