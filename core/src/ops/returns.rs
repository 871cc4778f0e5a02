//! Return opcodes (0x0e-0x11).
//!
//! Returns set the finished flag and park the returned value (if any) in
//! the last-result slot, where the calling frame's `move-result` finds it.

use crate::interp::Interp;
use crate::value::Value;

/// return-void (10x)
pub(crate) fn return_void(it: &mut Interp<'_>) {
    it.finished = true;
    it.last_result = Value::Null;
    it.pc += 2;
}

fn return_value(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = it.regs.get(reg);
    if !it.silent {
        log::debug!(
            "<- {}: {}",
            it.method,
            crate::format::format_value(&val)
        );
    }
    it.last_result = val;
    it.finished = true;
    it.pc += 2;
}

/// return vAA (11x)
pub(crate) fn return_(it: &mut Interp<'_>) {
    return_value(it);
}

/// return-wide vAA (11x)
pub(crate) fn return_wide(it: &mut Interp<'_>) {
    return_value(it);
}

/// return-object vAA (11x)
pub(crate) fn return_object(it: &mut Interp<'_>) {
    return_value(it);
}
