//! Trace maps: per-method decoded instruction text.
//!
//! The trace map is the canonical instruction view shared by the slicer,
//! the textual method resolution, and the mock-hook dispatch: for every
//! program counter it holds the rendered instruction line and the byte
//! length. Reference operands (strings, types, fields, methods) are
//! resolved against the owning container's tables, so a trace line
//! carries the full method signature even across container boundaries.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::ops::Bound;

use dexemu_dex::Dex;

#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub text: String,
    pub len: usize,
}

/// PC → (mnemonic line, instruction byte length), ordered by PC.
#[derive(Debug, Clone, Default)]
pub struct TraceMap {
    entries: BTreeMap<usize, TraceEntry>,
}

impl TraceMap {
    pub fn new() -> TraceMap {
        TraceMap::default()
    }

    pub fn insert(&mut self, pc: usize, text: impl Into<String>, len: usize) {
        self.entries.insert(
            pc,
            TraceEntry {
                text: text.into(),
                len,
            },
        );
    }

    pub fn line(&self, pc: usize) -> Option<&str> {
        self.entries.get(&pc).map(|entry| entry.text.as_str())
    }

    pub fn entry(&self, pc: usize) -> Option<&TraceEntry> {
        self.entries.get(&pc)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &TraceEntry)> {
        self.entries.iter().map(|(&pc, entry)| (pc, entry))
    }

    /// PCs strictly before `pc`, ascending.
    pub fn pcs_before(&self, pc: usize) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.entries
            .range((Bound::Unbounded, Bound::Excluded(pc)))
            .map(|(&pc, _)| pc)
    }

    /// PCs strictly after `pc`, ascending.
    pub fn pcs_after(&self, pc: usize) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .range((Bound::Excluded(pc), Bound::Unbounded))
            .map(|(&pc, _)| pc)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Instruction formats, named after the dex instruction-format table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fmt {
    F10x,
    F12x,
    F11n,
    F11x,
    F10t,
    F20t,
    F22x,
    F21t,
    F21s,
    F21h,
    F21hWide,
    F21cString,
    F21cType,
    F21cField,
    F23x,
    F22b,
    F22t,
    F22s,
    F22cField,
    F22cType,
    F32x,
    F30t,
    F31t,
    F31i,
    F31cString,
    F35cMethod,
    F35cType,
    F3rcMethod,
    F3rcType,
    F51l,
}

impl Fmt {
    fn len(self) -> usize {
        match self {
            Fmt::F10x | Fmt::F12x | Fmt::F11n | Fmt::F11x | Fmt::F10t => 2,
            Fmt::F20t
            | Fmt::F22x
            | Fmt::F21t
            | Fmt::F21s
            | Fmt::F21h
            | Fmt::F21hWide
            | Fmt::F21cString
            | Fmt::F21cType
            | Fmt::F21cField
            | Fmt::F23x
            | Fmt::F22b
            | Fmt::F22t
            | Fmt::F22s
            | Fmt::F22cField
            | Fmt::F22cType => 4,
            Fmt::F32x
            | Fmt::F30t
            | Fmt::F31t
            | Fmt::F31i
            | Fmt::F31cString
            | Fmt::F35cMethod
            | Fmt::F35cType
            | Fmt::F3rcMethod
            | Fmt::F3rcType => 6,
            Fmt::F51l => 10,
        }
    }
}

#[rustfmt::skip]
fn op_info(op: u8) -> Option<(&'static str, Fmt)> {
    use Fmt::*;
    Some(match op {
        0x00 => ("nop", F10x),
        0x01 => ("move", F12x),
        0x02 => ("move/from16", F22x),
        0x03 => ("move/16", F32x),
        0x04 => ("move-wide", F12x),
        0x05 => ("move-wide/from16", F22x),
        0x06 => ("move-wide/16", F32x),
        0x07 => ("move-object", F12x),
        0x08 => ("move-object/from16", F22x),
        0x09 => ("move-object/16", F32x),
        0x0a => ("move-result", F11x),
        0x0b => ("move-result-wide", F11x),
        0x0c => ("move-result-object", F11x),
        0x0d => ("move-exception", F11x),
        0x0e => ("return-void", F10x),
        0x0f => ("return", F11x),
        0x10 => ("return-wide", F11x),
        0x11 => ("return-object", F11x),
        0x12 => ("const/4", F11n),
        0x13 => ("const/16", F21s),
        0x14 => ("const", F31i),
        0x15 => ("const/high16", F21h),
        0x16 => ("const-wide/16", F21s),
        0x17 => ("const-wide/32", F31i),
        0x18 => ("const-wide", F51l),
        0x19 => ("const-wide/high16", F21hWide),
        0x1a => ("const-string", F21cString),
        0x1b => ("const-string/jumbo", F31cString),
        0x1c => ("const-class", F21cType),
        0x1d => ("monitor-enter", F11x),
        0x1e => ("monitor-exit", F11x),
        0x1f => ("check-cast", F21cType),
        0x20 => ("instance-of", F22cType),
        0x21 => ("array-length", F12x),
        0x22 => ("new-instance", F21cType),
        0x23 => ("new-array", F22cType),
        0x24 => ("filled-new-array", F35cType),
        0x25 => ("filled-new-array/range", F3rcType),
        0x26 => ("fill-array-data", F31t),
        0x27 => ("throw", F11x),
        0x28 => ("goto", F10t),
        0x29 => ("goto/16", F20t),
        0x2a => ("goto/32", F30t),
        0x2b => ("packed-switch", F31t),
        0x2c => ("sparse-switch", F31t),
        0x2d => ("cmpl-float", F23x),
        0x2e => ("cmpg-float", F23x),
        0x2f => ("cmpl-double", F23x),
        0x30 => ("cmpg-double", F23x),
        0x31 => ("cmp-long", F23x),
        0x32 => ("if-eq", F22t),
        0x33 => ("if-ne", F22t),
        0x34 => ("if-lt", F22t),
        0x35 => ("if-ge", F22t),
        0x36 => ("if-gt", F22t),
        0x37 => ("if-le", F22t),
        0x38 => ("if-eqz", F21t),
        0x39 => ("if-nez", F21t),
        0x3a => ("if-ltz", F21t),
        0x3b => ("if-gez", F21t),
        0x3c => ("if-gtz", F21t),
        0x3d => ("if-lez", F21t),
        0x44 => ("aget", F23x),
        0x45 => ("aget-wide", F23x),
        0x46 => ("aget-object", F23x),
        0x47 => ("aget-boolean", F23x),
        0x48 => ("aget-byte", F23x),
        0x49 => ("aget-char", F23x),
        0x4a => ("aget-short", F23x),
        0x4b => ("aput", F23x),
        0x4c => ("aput-wide", F23x),
        0x4d => ("aput-object", F23x),
        0x4e => ("aput-boolean", F23x),
        0x4f => ("aput-byte", F23x),
        0x50 => ("aput-char", F23x),
        0x51 => ("aput-short", F23x),
        0x52 => ("iget", F22cField),
        0x53 => ("iget-wide", F22cField),
        0x54 => ("iget-object", F22cField),
        0x55 => ("iget-boolean", F22cField),
        0x56 => ("iget-byte", F22cField),
        0x57 => ("iget-char", F22cField),
        0x58 => ("iget-short", F22cField),
        0x59 => ("iput", F22cField),
        0x5a => ("iput-wide", F22cField),
        0x5b => ("iput-object", F22cField),
        0x5c => ("iput-boolean", F22cField),
        0x5d => ("iput-byte", F22cField),
        0x5e => ("iput-char", F22cField),
        0x5f => ("iput-short", F22cField),
        0x60 => ("sget", F21cField),
        0x61 => ("sget-wide", F21cField),
        0x62 => ("sget-object", F21cField),
        0x63 => ("sget-boolean", F21cField),
        0x64 => ("sget-byte", F21cField),
        0x65 => ("sget-char", F21cField),
        0x66 => ("sget-short", F21cField),
        0x67 => ("sput", F21cField),
        0x68 => ("sput-wide", F21cField),
        0x69 => ("sput-object", F21cField),
        0x6a => ("sput-boolean", F21cField),
        0x6b => ("sput-byte", F21cField),
        0x6c => ("sput-char", F21cField),
        0x6d => ("sput-short", F21cField),
        0x6e => ("invoke-virtual", F35cMethod),
        0x6f => ("invoke-super", F35cMethod),
        0x70 => ("invoke-direct", F35cMethod),
        0x71 => ("invoke-static", F35cMethod),
        0x72 => ("invoke-interface", F35cMethod),
        0x74 => ("invoke-virtual/range", F3rcMethod),
        0x75 => ("invoke-super/range", F3rcMethod),
        0x76 => ("invoke-direct/range", F3rcMethod),
        0x77 => ("invoke-static/range", F3rcMethod),
        0x78 => ("invoke-interface/range", F3rcMethod),
        0x7b => ("neg-int", F12x),
        0x7c => ("not-int", F12x),
        0x7d => ("neg-long", F12x),
        0x7e => ("not-long", F12x),
        0x7f => ("neg-float", F12x),
        0x80 => ("neg-double", F12x),
        0x81 => ("int-to-long", F12x),
        0x82 => ("int-to-float", F12x),
        0x83 => ("int-to-double", F12x),
        0x84 => ("long-to-int", F12x),
        0x85 => ("long-to-float", F12x),
        0x86 => ("long-to-double", F12x),
        0x87 => ("float-to-int", F12x),
        0x88 => ("float-to-long", F12x),
        0x89 => ("float-to-double", F12x),
        0x8a => ("double-to-int", F12x),
        0x8b => ("double-to-long", F12x),
        0x8c => ("double-to-float", F12x),
        0x8d => ("int-to-byte", F12x),
        0x8e => ("int-to-char", F12x),
        0x8f => ("int-to-short", F12x),
        0x90 => ("add-int", F23x),
        0x91 => ("sub-int", F23x),
        0x92 => ("mul-int", F23x),
        0x93 => ("div-int", F23x),
        0x94 => ("rem-int", F23x),
        0x95 => ("and-int", F23x),
        0x96 => ("or-int", F23x),
        0x97 => ("xor-int", F23x),
        0x98 => ("shl-int", F23x),
        0x99 => ("shr-int", F23x),
        0x9a => ("ushr-int", F23x),
        0x9b => ("add-long", F23x),
        0x9c => ("sub-long", F23x),
        0x9d => ("mul-long", F23x),
        0x9e => ("div-long", F23x),
        0x9f => ("rem-long", F23x),
        0xa0 => ("and-long", F23x),
        0xa1 => ("or-long", F23x),
        0xa2 => ("xor-long", F23x),
        0xa3 => ("shl-long", F23x),
        0xa4 => ("shr-long", F23x),
        0xa5 => ("ushr-long", F23x),
        0xa6 => ("add-float", F23x),
        0xa7 => ("sub-float", F23x),
        0xa8 => ("mul-float", F23x),
        0xa9 => ("div-float", F23x),
        0xaa => ("rem-float", F23x),
        0xab => ("add-double", F23x),
        0xac => ("sub-double", F23x),
        0xad => ("mul-double", F23x),
        0xae => ("div-double", F23x),
        0xaf => ("rem-double", F23x),
        0xb0 => ("add-int/2addr", F12x),
        0xb1 => ("sub-int/2addr", F12x),
        0xb2 => ("mul-int/2addr", F12x),
        0xb3 => ("div-int/2addr", F12x),
        0xb4 => ("rem-int/2addr", F12x),
        0xb5 => ("and-int/2addr", F12x),
        0xb6 => ("or-int/2addr", F12x),
        0xb7 => ("xor-int/2addr", F12x),
        0xb8 => ("shl-int/2addr", F12x),
        0xb9 => ("shr-int/2addr", F12x),
        0xba => ("ushr-int/2addr", F12x),
        0xbb => ("add-long/2addr", F12x),
        0xbc => ("sub-long/2addr", F12x),
        0xbd => ("mul-long/2addr", F12x),
        0xbe => ("div-long/2addr", F12x),
        0xbf => ("rem-long/2addr", F12x),
        0xc0 => ("and-long/2addr", F12x),
        0xc1 => ("or-long/2addr", F12x),
        0xc2 => ("xor-long/2addr", F12x),
        0xc3 => ("shl-long/2addr", F12x),
        0xc4 => ("shr-long/2addr", F12x),
        0xc5 => ("ushr-long/2addr", F12x),
        0xc6 => ("add-float/2addr", F12x),
        0xc7 => ("sub-float/2addr", F12x),
        0xc8 => ("mul-float/2addr", F12x),
        0xc9 => ("div-float/2addr", F12x),
        0xca => ("rem-float/2addr", F12x),
        0xcb => ("add-double/2addr", F12x),
        0xcc => ("sub-double/2addr", F12x),
        0xcd => ("mul-double/2addr", F12x),
        0xce => ("div-double/2addr", F12x),
        0xcf => ("rem-double/2addr", F12x),
        0xd0 => ("add-int/lit16", F22s),
        0xd1 => ("rsub-int", F22s),
        0xd2 => ("mul-int/lit16", F22s),
        0xd3 => ("div-int/lit16", F22s),
        0xd4 => ("rem-int/lit16", F22s),
        0xd5 => ("and-int/lit16", F22s),
        0xd6 => ("or-int/lit16", F22s),
        0xd7 => ("xor-int/lit16", F22s),
        0xd8 => ("add-int/lit8", F22b),
        0xd9 => ("rsub-int/lit8", F22b),
        0xda => ("mul-int/lit8", F22b),
        0xdb => ("div-int/lit8", F22b),
        0xdc => ("rem-int/lit8", F22b),
        0xdd => ("and-int/lit8", F22b),
        0xde => ("or-int/lit8", F22b),
        0xdf => ("xor-int/lit8", F22b),
        0xe0 => ("shl-int/lit8", F22b),
        0xe1 => ("shr-int/lit8", F22b),
        0xe2 => ("ushr-int/lit8", F22b),
        _ => return None,
    })
}

#[inline]
fn byte(bc: &[u8], off: usize) -> u8 {
    bc.get(off).copied().unwrap_or(0)
}

#[inline]
fn u16_at(bc: &[u8], off: usize) -> u16 {
    byte(bc, off) as u16 | (byte(bc, off + 1) as u16) << 8
}

#[inline]
fn u32_at(bc: &[u8], off: usize) -> u32 {
    u16_at(bc, off) as u32 | (u16_at(bc, off + 2) as u32) << 16
}

#[inline]
fn i64_at(bc: &[u8], off: usize) -> i64 {
    (u32_at(bc, off) as u64 | (u32_at(bc, off + 4) as u64) << 32) as i64
}

fn string_ref(dex: Option<&Dex>, idx: u32) -> String {
    match dex.and_then(|d| d.get_string(idx as usize)) {
        Some(s) => format!("\"{}\"", s.escape_debug()),
        None => format!("<string_{idx}>"),
    }
}

fn type_ref(dex: Option<&Dex>, idx: u32) -> String {
    match dex.and_then(|d| d.get_type(idx as usize)) {
        Some(t) => t.into_owned(),
        None => format!("<type_{idx}>"),
    }
}

/// `LClass;->name type` for field references.
fn field_ref(dex: Option<&Dex>, idx: u32) -> String {
    let resolved = dex.and_then(|d| {
        let item = d.field_ids.get(idx as usize)?;
        let class = item.get_class(d)?;
        let name = item.get_name(d)?;
        let ty = item.get_type(d)?;
        Some(format!("{class}->{name} {ty}"))
    });
    resolved.unwrap_or_else(|| format!("<field_{idx}>"))
}

/// `LClass;->name(params)ret` for method references.
fn method_ref(dex: Option<&Dex>, idx: u32) -> String {
    let resolved = dex.and_then(|d| {
        let item = d.method_ids.get(idx as usize)?;
        let class = item.get_class(d)?;
        let name = item.get_name(d)?;
        let proto = item.get_prototype(d)?.text(d);
        Some(format!("{class}->{name}{proto}"))
    });
    resolved.unwrap_or_else(|| format!("<method_{idx}>"))
}

/// Decode the instruction at `pc` into its trace line and byte length.
pub fn decode(dex: Option<&Dex>, bc: &[u8], pc: usize) -> (String, usize) {
    let op = byte(bc, pc);

    // payload pseudo-instructions share the nop opcode byte
    if op == 0x00 {
        match byte(bc, pc + 1) {
            0x01 => {
                let size = u16_at(bc, pc + 2) as usize;
                return ("packed-switch-payload".to_string(), (size * 2 + 4) * 2);
            }
            0x02 => {
                let size = u16_at(bc, pc + 2) as usize;
                return ("sparse-switch-payload".to_string(), (size * 4 + 2) * 2);
            }
            0x03 => {
                let width = u16_at(bc, pc + 2) as usize;
                let size = u32_at(bc, pc + 4) as usize;
                let units = (size * width + 1) / 2 + 4;
                return ("fill-array-data-payload".to_string(), units * 2);
            }
            _ => {}
        }
    }

    let Some((name, fmt)) = op_info(op) else {
        return (format!("unknown-0x{op:02x}"), 2);
    };

    let b1 = byte(bc, pc + 1);
    let mut text = name.to_string();

    match fmt {
        Fmt::F10x => {}
        Fmt::F12x => {
            let _ = write!(text, " v{}, v{}", b1 & 0xF, b1 >> 4);
        }
        Fmt::F11n => {
            let mut lit = (b1 >> 4) as i32;
            if lit > 7 {
                lit -= 16;
            }
            let _ = write!(text, " v{}, {}", b1 & 0xF, lit);
        }
        Fmt::F11x => {
            let _ = write!(text, " v{b1}");
        }
        Fmt::F10t => {
            let _ = write!(text, " {}", b1 as i8);
        }
        Fmt::F20t => {
            let _ = write!(text, " {}", u16_at(bc, pc + 2) as i16);
        }
        Fmt::F22x => {
            let _ = write!(text, " v{}, v{}", b1, u16_at(bc, pc + 2));
        }
        Fmt::F21t => {
            let _ = write!(text, " v{}, {}", b1, u16_at(bc, pc + 2) as i16);
        }
        Fmt::F21s => {
            let _ = write!(text, " v{}, {}", b1, u16_at(bc, pc + 2) as i16);
        }
        Fmt::F21h => {
            let lit = (u16_at(bc, pc + 2) as i16 as i32) << 16;
            let _ = write!(text, " v{b1}, {lit}");
        }
        Fmt::F21hWide => {
            let lit = (u16_at(bc, pc + 2) as i16 as i64) << 48;
            let _ = write!(text, " v{b1}, {lit}");
        }
        Fmt::F21cString => {
            let _ = write!(text, " v{}, {}", b1, string_ref(dex, u16_at(bc, pc + 2) as u32));
        }
        Fmt::F21cType => {
            let _ = write!(text, " v{}, {}", b1, type_ref(dex, u16_at(bc, pc + 2) as u32));
        }
        Fmt::F21cField => {
            let _ = write!(text, " v{}, {}", b1, field_ref(dex, u16_at(bc, pc + 2) as u32));
        }
        Fmt::F23x => {
            let _ = write!(text, " v{}, v{}, v{}", b1, byte(bc, pc + 2), byte(bc, pc + 3));
        }
        Fmt::F22b => {
            let _ = write!(text, " v{}, v{}, {}", b1, byte(bc, pc + 2), byte(bc, pc + 3) as i8);
        }
        Fmt::F22t => {
            let _ = write!(
                text,
                " v{}, v{}, {}",
                b1 & 0xF,
                b1 >> 4,
                u16_at(bc, pc + 2) as i16
            );
        }
        Fmt::F22s => {
            let _ = write!(
                text,
                " v{}, v{}, {}",
                b1 & 0xF,
                b1 >> 4,
                u16_at(bc, pc + 2) as i16
            );
        }
        Fmt::F22cField => {
            let _ = write!(
                text,
                " v{}, v{}, {}",
                b1 & 0xF,
                b1 >> 4,
                field_ref(dex, u16_at(bc, pc + 2) as u32)
            );
        }
        Fmt::F22cType => {
            let _ = write!(
                text,
                " v{}, v{}, {}",
                b1 & 0xF,
                b1 >> 4,
                type_ref(dex, u16_at(bc, pc + 2) as u32)
            );
        }
        Fmt::F32x => {
            let _ = write!(text, " v{}, v{}", u16_at(bc, pc + 2), u16_at(bc, pc + 4));
        }
        Fmt::F30t => {
            let _ = write!(text, " {}", u32_at(bc, pc + 2) as i32);
        }
        Fmt::F31t | Fmt::F31i => {
            let _ = write!(text, " v{}, {}", b1, u32_at(bc, pc + 2) as i32);
        }
        Fmt::F31cString => {
            let _ = write!(text, " v{}, {}", b1, string_ref(dex, u32_at(bc, pc + 2)));
        }
        Fmt::F35cMethod | Fmt::F35cType => {
            let count = (b1 >> 4) as usize;
            let g = (b1 & 0xF) as usize;
            let idx = u16_at(bc, pc + 2) as u32;
            let dc = byte(bc, pc + 4);
            let fe = byte(bc, pc + 5);
            let regs = [
                (dc & 0xF) as usize,
                (dc >> 4) as usize,
                (fe & 0xF) as usize,
                (fe >> 4) as usize,
                g,
            ];
            for reg in regs.iter().take(count.min(5)) {
                let _ = write!(text, " v{reg},");
            }
            let reference = if fmt == Fmt::F35cMethod {
                method_ref(dex, idx)
            } else {
                type_ref(dex, idx)
            };
            let _ = write!(text, " {reference}");
        }
        Fmt::F3rcMethod | Fmt::F3rcType => {
            let count = b1 as usize;
            let idx = u16_at(bc, pc + 2) as u32;
            let start = u16_at(bc, pc + 4) as usize;
            let end = start + count.saturating_sub(1);
            let reference = if fmt == Fmt::F3rcMethod {
                method_ref(dex, idx)
            } else {
                type_ref(dex, idx)
            };
            let _ = write!(text, " v{start} .. v{end}, {reference}");
        }
        Fmt::F51l => {
            let _ = write!(text, " v{}, {}", b1, i64_at(bc, pc + 2));
        }
    }

    (text, fmt.len())
}

/// Build the trace map for a method's bytecode by linear decoding.
pub fn build_trace_map(dex: Option<&Dex>, bytecode: &[u8]) -> TraceMap {
    let mut map = TraceMap::new();
    let mut pc = 0usize;

    while pc < bytecode.len() {
        let (text, len) = decode(dex, bytecode, pc);
        // a zero or runaway length would stall the walk
        let len = len.max(2);
        map.insert(pc, text, len);
        pc += len;
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_const_and_moves() {
        // const/4 v0, -1 ; move v1, v0 ; return-void
        let bc = [0x12, 0xF0, 0x01, 0x01, 0x0e, 0x00];
        let map = build_trace_map(None, &bc);

        assert_eq!(map.line(0), Some("const/4 v0, -1"));
        assert_eq!(map.line(2), Some("move v1, v0"));
        assert_eq!(map.line(4), Some("return-void"));
        assert_eq!(map.entry(0).unwrap().len, 2);
    }

    #[test]
    fn decodes_literal_forms() {
        // const/16 v2, -300
        let lit = (-300i16).to_le_bytes();
        let bc = [0x13, 0x02, lit[0], lit[1]];
        let map = build_trace_map(None, &bc);
        assert_eq!(map.line(0), Some("const/16 v2, -300"));

        // const/high16 v0, 0x41 << 16
        let bc = [0x15, 0x00, 0x41, 0x00];
        let map = build_trace_map(None, &bc);
        assert_eq!(map.line(0), Some(format!("const/high16 v0, {}", 0x41 << 16).as_str()));
    }

    #[test]
    fn invoke_renders_registers_then_reference() {
        // invoke-static {v0, v1}, method_ref (no container: placeholder)
        let bc = [0x71, 0x20, 0x07, 0x00, 0x10, 0x00];
        let map = build_trace_map(None, &bc);
        assert_eq!(map.line(0), Some("invoke-static v0, v1, <method_7>"));
        assert_eq!(map.entry(0).unwrap().len, 6);
    }

    #[test]
    fn payload_pseudo_instructions_are_stepped_over() {
        // fill-array-data v0, +3 followed by a 4-element byte payload
        let mut bc = vec![0x26, 0x00, 0x03, 0x00, 0x00, 0x00];
        bc.extend_from_slice(&[0x00, 0x03, 0x01, 0x00, 0x04, 0x00, 0x00, 0x00]); // ident, width 1, size 4
        bc.extend_from_slice(&[0x41, 0x42, 0x43, 0x44]);
        let map = build_trace_map(None, &bc);

        assert_eq!(map.line(0), Some("fill-array-data v0, 3"));
        assert_eq!(map.line(6), Some("fill-array-data-payload"));
        // payload: (4*1+1)/2 + 4 = 6 units = 12 bytes; nothing decoded inside
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn range_invoke_renders_span() {
        let bc = [0x77, 0x03, 0x02, 0x00, 0x04, 0x00];
        let map = build_trace_map(None, &bc);
        assert_eq!(map.line(0), Some("invoke-static/range v4 .. v6, <method_2>"));
    }
}
