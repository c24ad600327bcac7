//! Register snapshot capture and single-step arming.

use crate::debug::types::RegisterSnapshot;
use crate::debug::DebugApi;
use crate::error::TraceError;

/// Snapshot the registers of `thread_id` and set its trap flag so the next
/// instruction raises a single-step exception.
///
/// When `trap_address` is given the thread just executed our INT3 there, and
/// EIP is moved back onto the restored instruction before anything else.
pub fn capture_and_arm<A: DebugApi>(
    api: &mut A,
    thread_id: u32,
    trap_address: Option<u32>,
) -> Result<RegisterSnapshot, TraceError> {
    let thread = api.open_thread(thread_id)?;
    let mut context = api.get_context(&thread)?;

    if let Some(address) = trap_address {
        if context.eip == address.wrapping_add(1) {
            context.eip = address;
        }
    }

    let regs = RegisterSnapshot::from(&context);

    context.set_trap_flag();
    api.set_context(&thread, &context)?;

    Ok(regs)
}
