//! Common types for debugging functionality.

/// Trap flag bit in EFLAGS
pub const TRAP_FLAG: u32 = 0x0000_0100;

/// A launched debuggee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugTarget {
    /// Process ID
    pub process_id: u32,
    /// Primary thread ID
    pub thread_id: u32,
    /// Load address of the main image, truncated to 32 bits
    pub base_address: u32,
}

/// How a debug event is acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueStatus {
    /// DBG_CONTINUE
    Handled,
    /// DBG_EXCEPTION_NOT_HANDLED
    NotHandled,
}

/// Debug event received from the debuggee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEvent {
    pub process_id: u32,
    pub thread_id: u32,
    pub kind: EventKind,
}

impl DebugEvent {
    pub fn new(process_id: u32, thread_id: u32, kind: EventKind) -> Self {
        Self {
            process_id,
            thread_id,
            kind,
        }
    }

    /// Default acknowledgment: exceptions are left to the debuggee's handlers
    pub fn default_status(&self) -> ContinueStatus {
        match self.kind {
            EventKind::Breakpoint { .. }
            | EventKind::SingleStep { .. }
            | EventKind::Exception { .. } => ContinueStatus::NotHandled,
            _ => ContinueStatus::Handled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Process created
    ProcessCreated,
    /// Process exited
    ProcessExited { exit_code: u32 },
    /// Thread created
    ThreadCreated,
    /// Thread exited
    ThreadExited,
    /// DLL loaded
    DllLoaded { base_address: u64 },
    /// DLL unloaded
    DllUnloaded,
    /// OutputDebugString
    OutputString,
    /// RIP event
    Rip,
    /// Breakpoint-class exception
    Breakpoint { address: u64 },
    /// Single-step exception
    SingleStep { address: u64 },
    /// Any other exception
    Exception { code: u32, address: u64, first_chance: bool },
}

/// Thread context restricted to the control, integer and segment groups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct X86Context {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub eip: u32,
    pub eflags: u32,
    pub seg_cs: u32,
    pub seg_ds: u32,
    pub seg_es: u32,
    pub seg_fs: u32,
    pub seg_gs: u32,
    pub seg_ss: u32,
}

impl X86Context {
    pub fn set_trap_flag(&mut self) {
        self.eflags |= TRAP_FLAG;
    }

    pub fn trap_flag(&self) -> bool {
        self.eflags & TRAP_FLAG != 0
    }
}

/// CPU register state (x86) at one traced instruction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebp: u32,
    pub esp: u32,
    pub esi: u32,
    pub edi: u32,
    pub eip: u32,
    pub ds: u16,
    pub es: u16,
    pub cs: u16,
    pub ss: u16,
    pub fs: u16,
    pub gs: u16,
}

impl From<&X86Context> for RegisterSnapshot {
    fn from(ctx: &X86Context) -> Self {
        Self {
            eax: ctx.eax,
            ebx: ctx.ebx,
            ecx: ctx.ecx,
            edx: ctx.edx,
            ebp: ctx.ebp,
            esp: ctx.esp,
            esi: ctx.esi,
            edi: ctx.edi,
            eip: ctx.eip,
            ds: ctx.seg_ds as u16,
            es: ctx.seg_es as u16,
            cs: ctx.seg_cs as u16,
            ss: ctx.seg_ss as u16,
            fs: ctx.seg_fs as u16,
            gs: ctx.seg_gs as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_truncates_selectors() {
        let ctx = X86Context {
            eax: 1,
            ebx: 2,
            ecx: 3,
            edx: 4,
            esi: 5,
            edi: 6,
            ebp: 7,
            esp: 8,
            eip: 0x0040_1000,
            eflags: 0x246,
            seg_cs: 0xDEAD_0023,
            seg_ds: 0x2B,
            seg_es: 0x2B,
            seg_fs: 0x53,
            seg_gs: 0x2B,
            seg_ss: 0x2B,
        };
        let regs = RegisterSnapshot::from(&ctx);
        assert_eq!(regs.cs, 0x0023);
        assert_eq!(regs.fs, 0x53);
        assert_eq!((regs.eax, regs.esi, regs.edi), (1, 5, 6));
        assert_eq!((regs.ebp, regs.esp, regs.eip), (7, 8, 0x0040_1000));
    }

    #[test]
    fn test_default_status() {
        let bp = DebugEvent::new(1, 2, EventKind::Breakpoint { address: 0 });
        let dll = DebugEvent::new(1, 2, EventKind::DllLoaded { base_address: 0 });
        assert_eq!(bp.default_status(), ContinueStatus::NotHandled);
        assert_eq!(dll.default_status(), ContinueStatus::Handled);
    }

    #[test]
    fn test_trap_flag() {
        let mut ctx = X86Context { eflags: 0x202, ..Default::default() };
        assert!(!ctx.trap_flag());
        ctx.set_trap_flag();
        assert_eq!(ctx.eflags, 0x302);
    }
}
