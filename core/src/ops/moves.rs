//! Register moves and result moves (0x01-0x0d).

use crate::interp::Interp;
use crate::value::Value;

/// move vA, vB / move-object vA, vB (12x)
pub(crate) fn move_(it: &mut Interp<'_>) {
    let b = it.byte(it.pc + 1);
    let dst = (b & 0xF) as usize;
    let src = (b >> 4) as usize;
    let val = it.regs.get(src);
    it.regs.set(dst, val);
    it.pc += 2;
}

/// move/from16 vAA, vBBBB (22x)
pub(crate) fn move_from16(it: &mut Interp<'_>) {
    let dst = it.byte(it.pc + 1) as usize;
    let src = it.u16_at(it.pc + 2) as usize;
    let val = it.regs.get(src);
    it.regs.set(dst, val);
    it.pc += 4;
}

/// move/16 vAAAA, vBBBB (32x)
pub(crate) fn move_16(it: &mut Interp<'_>) {
    let dst = it.u16_at(it.pc + 2) as usize;
    let src = it.u16_at(it.pc + 4) as usize;
    let val = it.regs.get(src);
    it.regs.set(dst, val);
    it.pc += 6;
}

fn move_pair(it: &mut Interp<'_>, dst: usize, src: usize) {
    let low = it.regs.get(src);
    let high = it.regs.get(src + 1);
    it.regs.set(dst, low);
    it.regs.set(dst + 1, high);
}

/// move-wide vA, vB (12x)
pub(crate) fn move_wide(it: &mut Interp<'_>) {
    let b = it.byte(it.pc + 1);
    move_pair(it, (b & 0xF) as usize, (b >> 4) as usize);
    it.pc += 2;
}

/// move-wide/from16 vAA, vBBBB (22x)
pub(crate) fn move_wide_from16(it: &mut Interp<'_>) {
    let dst = it.byte(it.pc + 1) as usize;
    let src = it.u16_at(it.pc + 2) as usize;
    move_pair(it, dst, src);
    it.pc += 4;
}

/// move-wide/16 vAAAA, vBBBB (32x)
pub(crate) fn move_wide_16(it: &mut Interp<'_>) {
    let dst = it.u16_at(it.pc + 2) as usize;
    let src = it.u16_at(it.pc + 4) as usize;
    move_pair(it, dst, src);
    it.pc += 6;
}

/// move-result vAA (11x)
pub(crate) fn move_result(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = it.last_result.clone();
    it.regs.set(reg, val);
    it.pc += 2;
}

/// move-result-wide vAA (11x)
pub(crate) fn move_result_wide(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = it.last_result.clone();
    it.regs.set(reg, val);
    it.regs.set(reg + 1, Value::WideHigh);
    it.pc += 2;
}

/// move-result-object vAA (11x)
pub(crate) fn move_result_object(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = it.last_result.clone();
    it.regs.set(reg, val);
    it.pc += 2;
}

/// move-exception vAA (11x)
///
/// No exception ever propagates, so the loaded value is null.
pub(crate) fn move_exception(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    it.regs.set(reg, Value::Null);
    it.pc += 2;
}
