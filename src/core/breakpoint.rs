//! Breakpoint - software trap bookkeeping
//!
//! Each hook remembers the byte it displaced so the debuggee can always be
//! returned to its original image.

use std::collections::HashMap;

use crate::debug::DebugApi;
use crate::error::TraceError;

/// INT3
pub const TRAP_OPCODE: u8 = 0xCC;

/// Default image base of a 32-bit PE; caller addresses at or above it are
/// taken as absolute in the preferred layout
pub const IMAGE_BASE_OFFSET: u32 = 0x0040_0000;

/// Software breakpoint record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hook {
    /// Whether the trap byte is currently in memory
    pub is_replaced: bool,
    /// Byte overwritten by the trap
    pub original_byte: u8,
}

/// Rebase a caller-supplied address onto the actual load address
pub fn normalize_address(virtual_address: u32, base_address: u32) -> u32 {
    let address = virtual_address.wrapping_add(base_address);
    if virtual_address >= IMAGE_BASE_OFFSET {
        address.wrapping_sub(IMAGE_BASE_OFFSET)
    } else {
        address
    }
}

/// Hooks keyed by absolute debuggee address
#[derive(Debug, Default)]
pub struct HookTable {
    hooks: HashMap<u32, Hook>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch a trap at `virtual_address`, returning the absolute address.
    /// An address that is already hooked is left untouched.
    pub fn install<A: DebugApi>(
        &mut self,
        api: &mut A,
        base_address: u32,
        virtual_address: u32,
    ) -> Result<u32, TraceError> {
        let address = normalize_address(virtual_address, base_address);
        if self.hooks.contains_key(&address) {
            log::debug!("Breakpoint already set at {:#x}", address);
            return Ok(address);
        }

        let original_byte = api.read_byte(address)?;
        api.write_byte(address, TRAP_OPCODE)?;
        self.hooks.insert(
            address,
            Hook {
                is_replaced: true,
                original_byte,
            },
        );

        log::info!(
            "Breakpoint set at {:#x} (original byte {:#04x})",
            address,
            original_byte
        );
        Ok(address)
    }

    /// Put the original byte back. Returns `false` when no trap was in place.
    pub fn restore<A: DebugApi>(&mut self, api: &mut A, address: u32) -> Result<bool, TraceError> {
        let Some(hook) = self.hooks.get_mut(&address) else {
            return Ok(false);
        };
        if !hook.is_replaced {
            return Ok(false);
        }

        api.write_byte(address, hook.original_byte)?;
        hook.is_replaced = false;
        log::debug!("Breakpoint restored at {:#x}", address);
        Ok(true)
    }

    /// Restore every hook still patched. Keeps going past failures and
    /// reports the first one.
    pub fn restore_all<A: DebugApi>(&mut self, api: &mut A) -> Result<(), TraceError> {
        let mut first_error = None;
        for (address, hook) in self.hooks.iter_mut().filter(|(_, hook)| hook.is_replaced) {
            match api.write_byte(*address, hook.original_byte) {
                Ok(()) => hook.is_replaced = false,
                Err(e) => {
                    log::warn!("Failed to restore breakpoint at {:#x}: {}", address, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn get(&self, address: u32) -> Option<&Hook> {
        self.hooks.get(&address)
    }

    /// Whether a trap installed by us sits at `address`
    pub fn is_armed_at(&self, address: u32) -> bool {
        self.get(address).is_some_and(|hook| hook.is_replaced)
    }

    /// Whether any trap is still in memory
    pub fn any_armed(&self) -> bool {
        self.hooks.values().any(|hook| hook.is_replaced)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Hook)> {
        self.hooks.iter().map(|(address, hook)| (*address, hook))
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
