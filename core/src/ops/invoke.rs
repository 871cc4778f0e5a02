//! Invoke opcodes (0x6e-0x72, 0x74-0x78) and the built-in call emulation.
//!
//! Dispatch order for every invoke kind: user hooks, framework hook
//! tables, built-in emulation of the common `java.lang`/`java.util`
//! surface, then cross-method execution through the class loader. When
//! nothing matches, the last-result slot is null.

use crate::interp::Interp;
use crate::loader;
use crate::mocks::dispatch::{framework_static_hook, framework_virtual_hook, HookResult};
use crate::value::{DvArray, HeapObject, Internal, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Virtual,
    Direct,
    Static,
}

/// Decode 35c arguments: A|G op BBBB F|E|D|C.
///
/// Operand reads past the end of the bytecode yield zero, so a truncated
/// fifth-argument nibble is register 0.
fn decode_35c(it: &Interp<'_>) -> (u32, Vec<Value>) {
    let b = it.byte(it.pc + 1);
    let count = ((b >> 4) & 0xF) as usize;
    let g = (b & 0xF) as usize;
    let method_idx = it.u16_at(it.pc + 2) as u32;
    let dc = it.byte(it.pc + 4);
    let fe = it.byte(it.pc + 5);

    let regs = [
        (dc & 0xF) as usize,
        (dc >> 4) as usize,
        (fe & 0xF) as usize,
        (fe >> 4) as usize,
        g,
    ];

    let args = regs
        .iter()
        .take(count.min(5))
        .map(|&reg| it.regs.get(reg))
        .collect();

    (method_idx, args)
}

/// Decode 3rc arguments: AA op BBBB CCCC, a consecutive register span.
fn decode_3rc(it: &Interp<'_>) -> (u32, Vec<Value>) {
    let count = it.byte(it.pc + 1) as usize;
    let method_idx = it.u16_at(it.pc + 2) as u32;
    let start = it.u16_at(it.pc + 4) as usize;

    let args = (start..start + count).map(|reg| it.regs.get(reg)).collect();

    (method_idx, args)
}

fn invoke_common(it: &mut Interp<'_>, kind: Kind, range: bool) {
    let (method_idx, args) = if range {
        decode_3rc(it)
    } else {
        decode_35c(it)
    };
    let trace = it.line();

    it.last_result = dispatch_call(it, kind, method_idx, &args, &trace);
    it.pc += 6;
}

fn apply(it: &mut Interp<'_>, hook: crate::mocks::MockHookFn, args: &[Value], trace: &str) -> Value {
    match hook(it, args, trace) {
        HookResult::Value(val) => val,
        HookResult::Void => Value::Null,
    }
}

fn dispatch_call(
    it: &mut Interp<'_>,
    kind: Kind,
    method_idx: u32,
    args: &[Value],
    trace: &str,
) -> Value {
    // user hooks take precedence over everything
    if let Some(hook) = it.ctx.hooks.find(trace) {
        return apply(it, hook, args, trace);
    }

    // framework hook tables
    let framework = match kind {
        Kind::Static => framework_static_hook(trace),
        _ => framework_virtual_hook(trace),
    };
    if let Some(hook) = framework {
        return apply(it, hook, args, trace);
    }

    // built-in emulation of the common library surface
    let builtin = match kind {
        Kind::Static => builtin_static(args, trace),
        Kind::Direct => builtin_direct(args, trace),
        Kind::Virtual => builtin_virtual(it, args, trace),
    };
    if let Some(result) = builtin {
        return match result {
            HookResult::Value(val) => val,
            HookResult::Void => Value::Null,
        };
    }

    // cross-method execution; hooked library classes never reach the loader
    let hooked_elsewhere = ["Ljava/lang/StringBuilder;", "Ljava/io/PrintStream;", "Ljava/lang/System;"]
        .iter()
        .any(|pattern| trace.contains(pattern));

    if !hooked_elsewhere && trace.contains("->") {
        let on_slice = it
            .slice
            .as_ref()
            .map(|pcs| pcs.contains(&it.pc))
            .unwrap_or(true);
        return loader::resolve_and_execute(
            it.ctx,
            it.code.dex_index,
            method_idx,
            args,
            trace,
            on_slice,
            it.depth,
        );
    }

    Value::Null
}

pub(crate) fn invoke_virtual(it: &mut Interp<'_>) {
    invoke_common(it, Kind::Virtual, false);
}

/// invoke-super behaves like virtual under best-effort emulation
pub(crate) fn invoke_super(it: &mut Interp<'_>) {
    invoke_common(it, Kind::Virtual, false);
}

pub(crate) fn invoke_direct(it: &mut Interp<'_>) {
    invoke_common(it, Kind::Direct, false);
}

pub(crate) fn invoke_static(it: &mut Interp<'_>) {
    invoke_common(it, Kind::Static, false);
}

pub(crate) fn invoke_interface(it: &mut Interp<'_>) {
    invoke_common(it, Kind::Virtual, false);
}

pub(crate) fn invoke_virtual_range(it: &mut Interp<'_>) {
    invoke_common(it, Kind::Virtual, true);
}

pub(crate) fn invoke_direct_range(it: &mut Interp<'_>) {
    invoke_common(it, Kind::Direct, true);
}

pub(crate) fn invoke_static_range(it: &mut Interp<'_>) {
    invoke_common(it, Kind::Static, true);
}

// ---------------------------------------------------------------------------
// built-in constructors

/// `String.<init>` and `StringBuilder.<init>`; anything else falls
/// through to the class loader so application constructors execute.
fn builtin_direct(args: &[Value], trace: &str) -> Option<HookResult> {
    if trace.contains("Ljava/lang/String;-><init>") {
        if let Some(obj) = args.first().and_then(Value::as_object) {
            let text = match args.get(1) {
                Some(Value::Array(arr)) => Some(chars_of(&arr.borrow())),
                Some(other) => other.text().or(Some(String::new())),
                None => Some(String::new()),
            };
            if let Some(text) = text {
                obj.borrow_mut().internal = Some(Internal::Text(text));
            }
        }
        return Some(HookResult::Void);
    }

    if trace.contains("Ljava/lang/StringBuilder;-><init>") {
        if let Some(obj) = args.first().and_then(Value::as_object) {
            let seed = args.get(1).and_then(Value::text).unwrap_or_default();
            obj.borrow_mut().internal = Some(Internal::Text(seed));
        }
        return Some(HookResult::Void);
    }

    None
}

// ---------------------------------------------------------------------------
// built-in virtual methods

fn chars_of(arr: &DvArray) -> String {
    arr.data
        .iter()
        .filter_map(|v| char::from_u32(v.as_int() as u32))
        .collect()
}

fn builtin_virtual(it: &mut Interp<'_>, args: &[Value], trace: &str) -> Option<HookResult> {
    if trace.contains("append") && trace.contains("Ljava/lang/StringBuilder;") {
        let sb = args.first()?.as_object()?;
        let appended = match args.get(1) {
            // integer appends are character appends: chars are plain ints
            // in the register model
            Some(Value::Int(v)) => char::from_u32(*v as u32).map(String::from),
            Some(Value::Null) | None => None,
            Some(other) => Some(
                other
                    .text()
                    .unwrap_or_else(|| crate::format::plain_text(other)),
            ),
        };
        if let Some(text) = appended {
            let mut obj = sb.borrow_mut();
            match &mut obj.internal {
                Some(Internal::Text(buf)) => buf.push_str(&text),
                slot => *slot = Some(Internal::Text(text)),
            }
        }
        return Some(HookResult::Value(args[0].clone()));
    }

    if trace.contains("toString") {
        let obj = args.first()?.as_object()?;
        let text = {
            let obj = obj.borrow();
            match &obj.internal {
                Some(Internal::Text(s)) => Some(s.clone()),
                Some(Internal::Boxed(v)) => Some(v.to_string()),
                Some(Internal::Name(s)) => Some(s.clone()),
                _ => None,
            }
        };
        // a fresh string object sharing the buffer contents
        return text.map(|t| HookResult::Value(Value::string(t)));
    }

    if trace.contains("println") && trace.contains("Ljava/io/PrintStream;") {
        if !it.silent {
            if let Some(arg) = args.get(1) {
                println!("STDOUT: {}", crate::format::plain_text(arg));
            }
        }
        return Some(HookResult::Void);
    }

    if trace.contains("Ljava/lang/String;") {
        if trace.contains("length") {
            let len = args.first()?.text()?.chars().count() as i32;
            return Some(HookResult::Value(Value::Int(len)));
        }

        if trace.contains("charAt") {
            let text = args.first()?.text()?;
            let idx = args.get(1).map(Value::as_int).unwrap_or(0);
            let ch = if idx >= 0 {
                text.chars().nth(idx as usize).map(|c| c as i32).unwrap_or(0)
            } else {
                0
            };
            return Some(HookResult::Value(Value::Int(ch)));
        }

        if trace.contains("toCharArray") {
            let text = args.first()?.text()?;
            let data = text.chars().map(|c| Value::Int(c as i32)).collect();
            return Some(HookResult::Value(Value::array(DvArray::from_values(
                "C", data,
            ))));
        }

        if trace.contains("getBytes") {
            // little-endian 16-bit code units, surrogate pairs included
            let text = args.first()?.text()?;
            let mut data = Vec::new();
            for unit in text.encode_utf16() {
                let [lo, hi] = unit.to_le_bytes();
                data.push(Value::Int(lo as i32));
                data.push(Value::Int(hi as i32));
            }
            return Some(HookResult::Value(Value::array(DvArray::from_values(
                "B", data,
            ))));
        }

        if trace.contains("intern") {
            return Some(HookResult::Value(args.first()?.clone()));
        }
    }

    if trace.contains("clone") {
        if let Some(arr) = args.first().and_then(Value::as_array) {
            let arr = arr.borrow();
            let copy = DvArray::from_values(arr.elem_type.clone(), arr.data.clone());
            return Some(HookResult::Value(Value::array(copy)));
        }
    }

    if trace.contains("booleanValue") && trace.contains("Boolean") {
        let val = unbox(args.first()).unwrap_or(0);
        return Some(HookResult::Value(Value::Int((val != 0) as i32)));
    }

    if trace.contains("intValue") && trace.contains("Integer") {
        let val = unbox(args.first()).unwrap_or(0);
        return Some(HookResult::Value(Value::Int(val as i32)));
    }

    if trace.contains("Ljava/util/List;") || trace.contains("Ljava/util/ArrayList;") {
        if trace.contains("iterator") {
            let items = seq_items(args.first());
            let mut iter = HeapObject::new("Ljava/util/Iterator;");
            iter.mock = Some(crate::value::MockKind::Iterator);
            iter.internal = Some(Internal::Seq { items, cursor: 0 });
            return Some(HookResult::Value(Value::object(iter)));
        }

        if trace.contains("size") {
            let len = seq_items(args.first()).len() as i32;
            return Some(HookResult::Value(Value::Int(len)));
        }

        if trace.contains("get") {
            let items = seq_items(args.first());
            let idx = args.get(1).map(Value::as_int).unwrap_or(0);
            let val = items.get(idx.max(0) as usize).cloned().unwrap_or(Value::Null);
            return Some(HookResult::Value(val));
        }
    }

    if trace.contains("Ljava/util/Iterator;") {
        let obj = args.first()?.as_object()?;
        if trace.contains("hasNext") {
            let has = match &obj.borrow().internal {
                Some(Internal::Seq { items, cursor }) => *cursor < items.len(),
                _ => false,
            };
            return Some(HookResult::Value(Value::Int(has as i32)));
        }

        if trace.contains("next") {
            let mut obj = obj.borrow_mut();
            let val = match &mut obj.internal {
                Some(Internal::Seq { items, cursor }) => {
                    let val = items.get(*cursor).cloned().unwrap_or(Value::Null);
                    *cursor += 1;
                    val
                }
                _ => Value::Null,
            };
            return Some(HookResult::Value(val));
        }
    }

    None
}

fn unbox(value: Option<&Value>) -> Option<i64> {
    let obj = value?.as_object()?;
    let obj = obj.borrow();
    match &obj.internal {
        Some(Internal::Boxed(v)) => Some(*v),
        _ => None,
    }
}

/// The backing sequence of a list stand-in or a plain array.
fn seq_items(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Object(obj)) => match &obj.borrow().internal {
            Some(Internal::Seq { items, .. }) => items.clone(),
            _ => Vec::new(),
        },
        Some(Value::Array(arr)) => arr.borrow().data.clone(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// built-in static methods

fn boxed(class: &str, val: i64) -> Value {
    let mut obj = HeapObject::new(class);
    obj.internal = Some(Internal::Boxed(val));
    Value::object(obj)
}

fn parse_integer(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Int(v)) => *v as i64,
        Some(Value::Long(v)) => *v,
        Some(other) => other
            .text()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(0),
        None => 0,
    }
}

fn builtin_static(args: &[Value], trace: &str) -> Option<HookResult> {
    if trace.contains("String;->valueOf") {
        let text = match args.first() {
            Some(Value::Array(arr)) => {
                let arr = arr.borrow();
                if arr.elem_type == "C" || arr.elem_type == "[C" {
                    chars_of(&arr)
                } else {
                    crate::format::plain_text(&args[0])
                }
            }
            Some(other) => crate::format::plain_text(other),
            None => "null".to_string(),
        };
        return Some(HookResult::Value(Value::string(text)));
    }

    if trace.contains("String;->format") {
        return Some(HookResult::Value(Value::string(format_string(args))));
    }

    if trace.contains("Integer;->parseInt") {
        return Some(HookResult::Value(Value::Int(
            parse_integer(args.first()) as i32
        )));
    }

    if trace.contains("Long;->parseLong") {
        return Some(HookResult::Value(Value::Long(parse_integer(args.first()))));
    }

    if trace.contains("Math;->abs") {
        let val = match args.first() {
            Some(Value::Int(v)) => Value::Int(v.wrapping_abs()),
            Some(Value::Long(v)) => Value::Long(v.wrapping_abs()),
            Some(Value::Float(v)) => Value::Float(v.abs()),
            Some(Value::Double(v)) => Value::Double(v.abs()),
            _ => Value::Int(0),
        };
        return Some(HookResult::Value(val));
    }

    if trace.contains("Math;->max") || trace.contains("Math;->min") {
        let want_max = trace.contains("Math;->max");
        let a = args.first().cloned().unwrap_or(Value::Int(0));
        let b = args.get(1).cloned().unwrap_or(Value::Int(0));
        let val = match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => {
                Value::Int(if want_max { *x.max(y) } else { *x.min(y) })
            }
            (Value::Float(_) | Value::Double(_), _) | (_, Value::Float(_) | Value::Double(_)) => {
                let (x, y) = (a.as_double(), b.as_double());
                Value::Double(if want_max { x.max(y) } else { x.min(y) })
            }
            _ => {
                let (x, y) = (a.as_long(), b.as_long());
                Value::Long(if want_max { x.max(y) } else { x.min(y) })
            }
        };
        return Some(HookResult::Value(val));
    }

    if trace.contains("Arrays;->copyOf") {
        let src = args.first().and_then(Value::as_array)?;
        let new_len = args.get(1).map(Value::as_int).unwrap_or(0).max(0) as usize;
        let src = src.borrow();
        let mut data = src.data.clone();
        data.resize(new_len, Value::Int(0));
        return Some(HookResult::Value(Value::array(DvArray::from_values(
            src.elem_type.clone(),
            data,
        ))));
    }

    if trace.contains("TextUtils;->isEmpty") {
        let empty = match args.first() {
            None | Some(Value::Null) => true,
            Some(other) => other.text().map(|s| s.is_empty()).unwrap_or(true),
        };
        return Some(HookResult::Value(Value::Int(empty as i32)));
    }

    if trace.contains("Boolean;->valueOf") {
        let val = match args.first() {
            Some(Value::Int(v)) => (*v != 0) as i64,
            Some(other) => (other.test_zero() != 0) as i64,
            None => 0,
        };
        return Some(HookResult::Value(boxed("Ljava/lang/Boolean;", val)));
    }

    if trace.contains("Integer;->valueOf") {
        let val = parse_integer(args.first());
        return Some(HookResult::Value(boxed("Ljava/lang/Integer;", val)));
    }

    if trace.contains("System;->arraycopy") {
        if args.len() >= 5 {
            let src = args[0].as_array();
            let src_pos = args[1].as_int().max(0) as usize;
            let dst = args[2].as_array();
            let dst_pos = args[3].as_int().max(0) as usize;
            let length = args[4].as_int().max(0) as usize;

            if let (Some(src), Some(dst)) = (src, dst) {
                // self-copies alias the same RefCell
                if std::rc::Rc::ptr_eq(&src, &dst) {
                    let mut arr = src.borrow_mut();
                    for i in 0..length {
                        if src_pos + i < arr.data.len() && dst_pos + i < arr.data.len() {
                            arr.data[dst_pos + i] = arr.data[src_pos + i].clone();
                        }
                    }
                } else {
                    let src = src.borrow();
                    let mut dst = dst.borrow_mut();
                    for i in 0..length {
                        if src_pos + i < src.data.len() && dst_pos + i < dst.data.len() {
                            dst.data[dst_pos + i] = src.data[src_pos + i].clone();
                        }
                    }
                }
            }
        }
        return Some(HookResult::Void);
    }

    None
}

/// Minimal `%s` / `%d` substitution over a varargs `Object[]`.
fn format_string(args: &[Value]) -> String {
    let Some(fmt) = args.first().and_then(Value::text) else {
        return String::new();
    };
    let varargs = seq_items(args.get(1));

    let mut out = String::new();
    let mut next = 0usize;
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') | Some('d') => {
                let arg = varargs.get(next).cloned().unwrap_or(Value::Null);
                out.push_str(&crate::format::plain_text(&arg));
                next += 1;
            }
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }

    out
}
