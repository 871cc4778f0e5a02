//! Constant loads (0x12-0x1c).

use std::cell::RefCell;
use std::rc::Rc;

use crate::interp::Interp;
use crate::value::{HeapObject, Internal, MockKind, Value};

/// const/4 vA, #+B (11n)
pub(crate) fn const_4(it: &mut Interp<'_>) {
    let b = it.byte(it.pc + 1);
    let reg = (b & 0xF) as usize;
    // sign-extend the nibble: 0xF is -1, not 15
    let val = ((b as i8) >> 4) as i32;
    it.regs.set(reg, Value::Int(val));
    it.pc += 2;
}

/// const/16 vAA, #+BBBB (21s)
pub(crate) fn const_16(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = it.i16_at(it.pc + 2) as i32;
    it.regs.set(reg, Value::Int(val));
    it.pc += 4;
}

/// const vAA, #+BBBBBBBB (31i)
pub(crate) fn const_(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = it.i32_at(it.pc + 2);
    it.regs.set(reg, Value::Int(val));
    it.pc += 6;
}

/// const/high16 vAA, #+BBBB0000 (21h)
pub(crate) fn const_high16(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = (it.i16_at(it.pc + 2) as i32) << 16;
    it.regs.set(reg, Value::Int(val));
    it.pc += 4;
}

/// const-wide/16 vAA, #+BBBB (21s)
pub(crate) fn const_wide_16(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = it.i16_at(it.pc + 2) as i64;
    it.regs.set(reg, Value::Long(val));
    it.regs.set(reg + 1, Value::WideHigh);
    it.pc += 4;
}

/// const-wide/32 vAA, #+BBBBBBBB (31i)
pub(crate) fn const_wide_32(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = it.i32_at(it.pc + 2) as i64;
    it.regs.set(reg, Value::Long(val));
    it.regs.set(reg + 1, Value::WideHigh);
    it.pc += 6;
}

/// const-wide vAA, #+BBBBBBBBBBBBBBBB (51l)
pub(crate) fn const_wide(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = it.i64_at(it.pc + 2);
    it.regs.set(reg, Value::Long(val));
    it.regs.set(reg + 1, Value::WideHigh);
    it.pc += 10;
}

/// const-wide/high16 vAA, #+BBBB000000000000 (21h)
pub(crate) fn const_wide_high16(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let val = (it.i16_at(it.pc + 2) as i64) << 48;
    it.regs.set(reg, Value::Long(val));
    it.regs.set(reg + 1, Value::WideHigh);
    it.pc += 4;
}

fn load_string(it: &mut Interp<'_>, reg: usize, idx: u32) {
    let text = it
        .ctx
        .program
        .dexes
        .get(it.code.dex_index)
        .and_then(|dex| dex.get_string(idx as usize))
        .map(|s| s.into_owned())
        .unwrap_or_else(|| format!("<string_{idx}>"));
    it.regs.set(reg, Value::string(text));
}

/// const-string vAA, string@BBBB (21c)
pub(crate) fn const_string(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let idx = it.u16_at(it.pc + 2) as u32;
    load_string(it, reg, idx);
    it.pc += 4;
}

/// const-string/jumbo vAA, string@BBBBBBBB (31c)
pub(crate) fn const_string_jumbo(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let idx = it.u32_at(it.pc + 2);
    load_string(it, reg, idx);
    it.pc += 6;
}

/// const-class vAA, type@BBBB (21c)
pub(crate) fn const_class(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let idx = it.u16_at(it.pc + 2) as usize;

    let name = it
        .ctx
        .program
        .dexes
        .get(it.code.dex_index)
        .and_then(|dex| dex.get_type(idx))
        .map(|t| t.into_owned())
        .unwrap_or_else(|| format!("<type_{idx}>"));

    let mut obj = HeapObject::new("Ljava/lang/Class;");
    obj.mock = Some(MockKind::Class);
    obj.internal = Some(Internal::Name(name));
    it.regs.set(reg, Value::Object(Rc::new(RefCell::new(obj))));
    it.pc += 4;
}
