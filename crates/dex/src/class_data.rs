//! Class-data streams, code items, and encoded static values.
//!
//! The class-data item is a ULEB128-encoded stream: four member counts,
//! then the static fields, instance fields, direct methods, and virtual
//! methods, each with a delta-encoded index into the id tables.
//!
//! See: <https://source.android.com/docs/core/runtime/dex-format#class-data-item>

use winnow::binary::{le_u16, le_u32};
use winnow::error::ContextError;
use winnow::prelude::*;

use crate::dex::{uleb128, AccessFlags, Dex};

/// A field entry inside a class-data item.
#[derive(Debug, Clone)]
pub struct EncodedField {
    /// Absolute index into [Dex::field_ids] (deltas already applied)
    pub field_idx: u32,
    pub access_flags: AccessFlags,
}

/// A method entry inside a class-data item.
#[derive(Debug, Clone)]
pub struct EncodedMethod {
    /// Absolute index into [Dex::method_ids] (deltas already applied)
    pub method_idx: u32,
    pub access_flags: AccessFlags,
    /// Offset of the `code_item`, `0` for abstract and native methods
    pub code_off: u32,
}

/// Fully decoded class-data item.
#[derive(Debug, Default, Clone)]
pub struct ClassData {
    pub static_fields: Vec<EncodedField>,
    pub instance_fields: Vec<EncodedField>,
    pub direct_methods: Vec<EncodedMethod>,
    pub virtual_methods: Vec<EncodedMethod>,
}

impl ClassData {
    fn parse(input: &mut &[u8]) -> ModalResult<ClassData> {
        let static_fields_size = uleb128(input)?;
        let instance_fields_size = uleb128(input)?;
        let direct_methods_size = uleb128(input)?;
        let virtual_methods_size = uleb128(input)?;

        let parse_fields = |input: &mut &[u8], count: u64| -> ModalResult<Vec<EncodedField>> {
            let mut fields = Vec::with_capacity(count as usize);
            let mut idx = 0u32;
            for _ in 0..count {
                idx = idx.wrapping_add(uleb128(input)? as u32);
                let access_flags = AccessFlags::from_bits_truncate(uleb128(input)? as u32);
                fields.push(EncodedField {
                    field_idx: idx,
                    access_flags,
                });
            }
            Ok(fields)
        };

        let parse_methods = |input: &mut &[u8], count: u64| -> ModalResult<Vec<EncodedMethod>> {
            let mut methods = Vec::with_capacity(count as usize);
            let mut idx = 0u32;
            for _ in 0..count {
                idx = idx.wrapping_add(uleb128(input)? as u32);
                let access_flags = AccessFlags::from_bits_truncate(uleb128(input)? as u32);
                let code_off = uleb128(input)? as u32;
                methods.push(EncodedMethod {
                    method_idx: idx,
                    access_flags,
                    code_off,
                });
            }
            Ok(methods)
        };

        let static_fields = parse_fields(input, static_fields_size)?;
        let instance_fields = parse_fields(input, instance_fields_size)?;
        let direct_methods = parse_methods(input, direct_methods_size)?;
        let virtual_methods = parse_methods(input, virtual_methods_size)?;

        Ok(ClassData {
            static_fields,
            instance_fields,
            direct_methods,
            virtual_methods,
        })
    }
}

/// One value from an encoded array (static-field initializers).
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#encoding>
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedValue {
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Index into [Dex::string_ids]
    String(u32),
    /// Index into [Dex::type_ids]
    Type(u32),
    Null,
    Boolean(bool),
    Array(Vec<EncodedValue>),
}

impl EncodedValue {
    fn parse(input: &mut &[u8]) -> Option<EncodedValue> {
        let (&header, rest) = input.split_first()?;
        *input = rest;

        let value_type = header & 0x1f;
        let value_arg = (header >> 5) as usize;

        // sized immediates carry `value_arg + 1` little-endian bytes
        let mut read = |n: usize| -> Option<u64> {
            if input.len() < n {
                return None;
            }
            let (bytes, rest) = input.split_at(n);
            *input = rest;
            let mut val = 0u64;
            for (i, &b) in bytes.iter().enumerate() {
                val |= (b as u64) << (8 * i);
            }
            Some(val)
        };

        let sign_extend = |val: u64, n: usize| -> i64 {
            let shift = 64 - 8 * n as u32;
            ((val << shift) as i64) >> shift
        };

        match value_type {
            0x00 => Some(EncodedValue::Byte(read(1)? as i8)),
            0x02 => {
                let n = value_arg + 1;
                Some(EncodedValue::Short(sign_extend(read(n)?, n) as i16))
            }
            0x03 => Some(EncodedValue::Char(read(value_arg + 1)? as u16)),
            0x04 => {
                let n = value_arg + 1;
                Some(EncodedValue::Int(sign_extend(read(n)?, n) as i32))
            }
            0x06 => {
                let n = value_arg + 1;
                Some(EncodedValue::Long(sign_extend(read(n)?, n)))
            }
            0x10 => {
                // floats are zero-extended to the right
                let n = (value_arg + 1).min(4);
                let bits = (read(n)? as u32) << (32 - 8 * n as u32);
                Some(EncodedValue::Float(f32::from_bits(bits)))
            }
            0x11 => {
                let n = (value_arg + 1).min(8);
                let bits = read(n)? << (64 - 8 * n as u32);
                Some(EncodedValue::Double(f64::from_bits(bits)))
            }
            0x17 => Some(EncodedValue::String(read(value_arg + 1)? as u32)),
            0x18 => Some(EncodedValue::Type(read(value_arg + 1)? as u32)),
            0x1c => parse_encoded_array(input),
            0x1e => Some(EncodedValue::Null),
            0x1f => Some(EncodedValue::Boolean(value_arg != 0)),
            other => {
                // field/method/enum/annotation references are irrelevant for
                // static seeding; their payloads are not self-describing, so
                // stop here
                log::debug!("unsupported encoded value type 0x{other:02x}");
                None
            }
        }
    }
}

fn parse_encoded_array(input: &mut &[u8]) -> Option<EncodedValue> {
    let size = uleb128(input).ok()?;
    let mut values = Vec::with_capacity(size as usize);
    for _ in 0..size {
        values.push(EncodedValue::parse(input)?);
    }
    Some(EncodedValue::Array(values))
}

impl Dex {
    /// Decode the class-data item at `offset`.
    pub fn class_data(&self, offset: u32) -> Option<ClassData> {
        if offset == 0 {
            return None;
        }
        let mut input = self.data().get(offset as usize..)?;
        ClassData::parse(&mut input).ok()
    }

    /// Read the code item at `offset`: register count and raw instruction
    /// bytes. The instruction-unit count at offset 12 is in 16-bit units.
    ///
    /// See: <https://source.android.com/docs/core/runtime/dex-format#code-item>
    pub fn code_item(&self, offset: u32) -> Option<(u16, &[u8])> {
        if offset == 0 {
            return None;
        }

        let mut header = self.data().get(offset as usize..)?;
        let registers_size = le_u16::<_, ContextError>.parse_next(&mut header).ok()?;

        let mut units = self.data().get(offset as usize + 12..)?;
        let insns_size = le_u32::<_, ContextError>.parse_next(&mut units).ok()?;

        let start = offset as usize + 16;
        let len = insns_size as usize * 2;
        let insns = self.data().get(start..start + len)?;

        Some((registers_size, insns))
    }

    /// Parse the encoded array of static-field initial values at `offset`.
    ///
    /// Values are positional: the `i`-th value initializes the `i`-th
    /// static field of the owning class-data item.
    pub fn static_values(&self, offset: u32) -> Vec<EncodedValue> {
        if offset == 0 {
            return Vec::new();
        }
        let Some(mut input) = self.data().get(offset as usize..) else {
            return Vec::new();
        };

        match parse_encoded_array(&mut input) {
            Some(EncodedValue::Array(values)) => values,
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_data_applies_index_deltas() {
        // 0 static, 0 instance, 2 direct (indices 3 and 3+2), 0 virtual
        let stream: &[u8] = &[
            0x00, 0x00, 0x02, 0x00, // counts
            0x03, 0x08, 0x10, // method 3, flags STATIC, code_off 0x10
            0x02, 0x01, 0x20, // method 5, flags PUBLIC, code_off 0x20
        ];
        let data = ClassData::parse(&mut &stream[..]).unwrap();

        assert_eq!(data.direct_methods.len(), 2);
        assert_eq!(data.direct_methods[0].method_idx, 3);
        assert!(data.direct_methods[0].access_flags.is_static());
        assert_eq!(data.direct_methods[1].method_idx, 5);
        assert_eq!(data.direct_methods[1].code_off, 0x20);
    }

    #[test]
    fn encoded_values_common_types() {
        // byte 0x41
        let mut input: &[u8] = &[0x00, 0x41];
        assert_eq!(EncodedValue::parse(&mut input), Some(EncodedValue::Byte(0x41)));

        // int -1 as a single sign-extended byte (arg 0)
        let mut input: &[u8] = &[0x04, 0xff];
        assert_eq!(EncodedValue::parse(&mut input), Some(EncodedValue::Int(-1)));

        // int 0x1234 in two bytes (arg 1)
        let mut input: &[u8] = &[0x24, 0x34, 0x12];
        assert_eq!(
            EncodedValue::parse(&mut input),
            Some(EncodedValue::Int(0x1234))
        );

        // boolean true is carried in the arg bits
        let mut input: &[u8] = &[0x3f];
        assert_eq!(
            EncodedValue::parse(&mut input),
            Some(EncodedValue::Boolean(true))
        );

        // null
        let mut input: &[u8] = &[0x1e];
        assert_eq!(EncodedValue::parse(&mut input), Some(EncodedValue::Null));
    }

    #[test]
    fn encoded_float_is_right_zero_extended() {
        // 1.0f = 0x3f800000; stored compactly as two bytes 0x80 0x3f (arg 1)
        let mut input: &[u8] = &[0x30, 0x80, 0x3f];
        assert_eq!(
            EncodedValue::parse(&mut input),
            Some(EncodedValue::Float(1.0))
        );
    }

    #[test]
    fn encoded_array_nests() {
        // array of two bytes [1, 2]
        let mut input: &[u8] = &[0x1c, 0x02, 0x00, 0x01, 0x00, 0x02];
        assert_eq!(
            EncodedValue::parse(&mut input),
            Some(EncodedValue::Array(vec![
                EncodedValue::Byte(1),
                EncodedValue::Byte(2)
            ]))
        );
    }
}
