//! Array opcodes (0x21-0x26, 0x44-0x51).

use crate::interp::Interp;
use crate::value::{DvArray, Value};

/// array-length vA, vB (12x)
pub(crate) fn array_length(it: &mut Interp<'_>) {
    let b = it.byte(it.pc + 1);
    let dst = (b & 0xF) as usize;
    let src = (b >> 4) as usize;

    let len = it
        .regs
        .get(src)
        .as_array()
        .map(|arr| arr.borrow().size() as i32)
        .unwrap_or(0);

    it.regs.set(dst, Value::Int(len));
    it.pc += 2;
}

fn type_ref(it: &Interp<'_>, type_idx: usize) -> String {
    it.ctx
        .program
        .dexes
        .get(it.code.dex_index)
        .and_then(|dex| dex.get_type(type_idx))
        .map(|t| t.into_owned())
        .unwrap_or_else(|| format!("<type_{type_idx}>"))
}

/// new-array vA, vB, type@CCCC (22c)
pub(crate) fn new_array(it: &mut Interp<'_>) {
    let b = it.byte(it.pc + 1);
    let dst = (b & 0xF) as usize;
    let size_reg = (b >> 4) as usize;
    let type_idx = it.u16_at(it.pc + 2) as usize;

    let elem_type = type_ref(it, type_idx);
    let size = it.regs.get_int(size_reg).max(0) as usize;
    it.regs.set(dst, Value::array(DvArray::new(elem_type, size)));
    it.pc += 4;
}

/// filled-new-array {vC..vG}, type@BBBB (35c)
///
/// The built array lands in the last-result slot for a following
/// move-result-object.
pub(crate) fn filled_new_array(it: &mut Interp<'_>) {
    let b = it.byte(it.pc + 1);
    let count = ((b >> 4) & 0xF) as usize;
    let g = (b & 0xF) as usize;
    let type_idx = it.u16_at(it.pc + 2) as usize;
    let dc = it.byte(it.pc + 4);
    let fe = it.byte(it.pc + 5);

    let regs = [
        (dc & 0xF) as usize,
        (dc >> 4) as usize,
        (fe & 0xF) as usize,
        (fe >> 4) as usize,
        g,
    ];

    let data: Vec<Value> = regs
        .iter()
        .take(count.min(5))
        .map(|&reg| it.regs.get(reg))
        .collect();

    it.last_result = Value::array(DvArray::from_values(type_ref(it, type_idx), data));
    it.pc += 6;
}

/// filled-new-array/range {vCCCC..vNNNN}, type@BBBB (3rc)
pub(crate) fn filled_new_array_range(it: &mut Interp<'_>) {
    let count = it.byte(it.pc + 1) as usize;
    let type_idx = it.u16_at(it.pc + 2) as usize;
    let start = it.u16_at(it.pc + 4) as usize;

    let data: Vec<Value> = (start..start + count).map(|reg| it.regs.get(reg)).collect();

    it.last_result = Value::array(DvArray::from_values(type_ref(it, type_idx), data));
    it.pc += 6;
}

/// fill-array-data vAA, +BBBBBBBB (31t)
///
/// Payload ident `0x0300`: element width, element count, raw
/// little-endian element bytes.
pub(crate) fn fill_array_data(it: &mut Interp<'_>) {
    let reg = it.byte(it.pc + 1) as usize;
    let offset = it.i32_at(it.pc + 2);

    let Some(arr) = it.regs.get(reg).as_array() else {
        it.pc += 6;
        return;
    };

    let payload = (it.pc as i64 + offset as i64 * 2).max(0) as usize;
    if payload + 8 > it.code.bytecode.len() || it.u16_at(payload) != 0x0300 {
        it.pc += 6;
        return;
    }

    let width = it.u16_at(payload + 2) as usize;
    let count = it.u32_at(payload + 4) as usize;
    let data_start = payload + 8;

    let mut arr = arr.borrow_mut();
    let limit = count.min(arr.size());
    for i in 0..limit {
        let off = data_start + i * width;
        let val = match width {
            1 => Value::Int(it.byte(off) as i32),
            2 => Value::Int(it.u16_at(off) as i32),
            4 => Value::Int(it.i32_at(off)),
            8 => Value::Long(it.i64_at(off)),
            _ => Value::Int(0),
        };
        arr.data[i] = val;
    }

    it.pc += 6;
}

fn array_read(it: &mut Interp<'_>, wide: bool) {
    let dst = it.byte(it.pc + 1) as usize;
    let arr_reg = it.byte(it.pc + 2) as usize;
    let idx_reg = it.byte(it.pc + 3) as usize;

    let idx = it.regs.get_int(idx_reg);
    let mut val = Value::Int(0);

    if let Some(arr) = it.regs.get(arr_reg).as_array() {
        let arr = arr.borrow();
        if idx >= 0 && (idx as usize) < arr.size() {
            val = arr.data[idx as usize].clone();
        } else {
            it.warn(format_args!(
                "array index out of bounds: {idx} (size {})",
                arr.size()
            ));
        }
    }

    it.regs.set(dst, val);
    if wide {
        it.regs.set(dst + 1, Value::WideHigh);
    }
    it.pc += 4;
}

/// aget family (23x): every width and the object flavor read the stored
/// element; out-of-range indices warn and yield zero.
pub(crate) fn aget(it: &mut Interp<'_>) {
    array_read(it, false);
}

pub(crate) fn aget_wide(it: &mut Interp<'_>) {
    array_read(it, true);
}

fn array_write(it: &mut Interp<'_>, val: Value) {
    let arr_reg = it.byte(it.pc + 2) as usize;
    let idx_reg = it.byte(it.pc + 3) as usize;
    let idx = it.regs.get_int(idx_reg);

    if let Some(arr) = it.regs.get(arr_reg).as_array() {
        let mut arr = arr.borrow_mut();
        if idx >= 0 && (idx as usize) < arr.size() {
            arr.data[idx as usize] = val;
        } else {
            it.warn(format_args!(
                "array index out of bounds: {idx} (size {})",
                arr.size()
            ));
        }
    }

    it.pc += 4;
}

/// aput family (23x), narrow widths
pub(crate) fn aput(it: &mut Interp<'_>) {
    let src = it.byte(it.pc + 1) as usize;
    let val = Value::Int(it.regs.get_int(src));
    array_write(it, val);
}

/// aput-wide vAA, vBB, vCC (23x)
pub(crate) fn aput_wide(it: &mut Interp<'_>) {
    let src = it.byte(it.pc + 1) as usize;
    let val = Value::Long(it.regs.get_long(src));
    array_write(it, val);
}

/// aput-object vAA, vBB, vCC (23x): stores the reference itself
pub(crate) fn aput_object(it: &mut Interp<'_>) {
    let src = it.byte(it.pc + 1) as usize;
    let val = it.regs.get(src);
    array_write(it, val);
}
