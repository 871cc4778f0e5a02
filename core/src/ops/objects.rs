//! Object opcodes (0x1d-0x20, 0x22, 0x27).

use crate::interp::Interp;
use crate::value::{HeapObject, Value};

/// monitor-enter vAA (11x), no-op under single-threaded emulation
pub(crate) fn monitor_enter(it: &mut Interp<'_>) {
    it.pc += 2;
}

/// monitor-exit vAA (11x)
pub(crate) fn monitor_exit(it: &mut Interp<'_>) {
    it.pc += 2;
}

/// check-cast vAA, type@BBBB (21c), no-op
pub(crate) fn check_cast(it: &mut Interp<'_>) {
    it.pc += 4;
}

/// instance-of vA, vB, type@CCCC (22c)
///
/// Always true. Obfuscated dispatch usually guards the path that was
/// actually taken, so optimistic answers keep execution on it.
pub(crate) fn instance_of(it: &mut Interp<'_>) {
    let b = it.byte(it.pc + 1);
    let dst = (b & 0xF) as usize;
    it.regs.set(dst, Value::Int(1));
    it.pc += 4;
}

/// new-instance vAA, type@BBBB (21c)
pub(crate) fn new_instance(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let type_idx = it.u16_at(it.pc + 2) as usize;

    let class = it
        .ctx
        .program
        .dexes
        .get(it.code.dex_index)
        .and_then(|dex| dex.get_type(type_idx))
        .map(|t| t.into_owned())
        .unwrap_or_else(|| format!("<type_{type_idx}>"));

    it.regs.set(reg, Value::object(HeapObject::new(class)));
    it.pc += 4;
}

/// throw vAA (11x)
///
/// Halts the frame without unwinding; catch handlers are never entered.
pub(crate) fn throw(it: &mut Interp<'_>) {
    it.finished = true;
    it.pc += 2;
}
