use std::borrow::Cow;

use bitflags::bitflags;
use winnow::binary::{le_u16, le_u32, u8};
use winnow::combinator::repeat;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use crate::errors::DexError;

/// The constant is used to indicate the endiannes of the file in which it is found.
///
/// This constant means - little-endian.
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#endian-constant>
pub const ENDIAN_CONSTANT: u32 = 0x12345678;

/// Byte-swapped form of [ENDIAN_CONSTANT] found in big-endian containers.
pub const REVERSE_ENDIAN_CONSTANT: u32 = 0x78563412;

/// The constant is used to indicate that an index value is absent.
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#no-index>
pub const NO_INDEX: u32 = u32::MAX;

/// A single parsed dex container.
#[derive(Debug)]
pub struct Dex {
    /// Raw container bytes; offsets in the id tables point into this buffer
    data: Vec<u8>,

    /// Information about dex header
    pub header: DexHeader,

    /// Offsets of the string data items
    pub string_ids: Vec<u32>,

    /// Indices into [Dex::string_ids] holding type descriptors
    pub type_ids: Vec<u32>,

    /// Method prototypes
    pub proto_ids: Vec<ProtoItem>,

    /// Field references
    pub field_ids: Vec<FieldItem>,

    /// Method references
    pub method_ids: Vec<MethodItem>,

    /// Class definitions
    pub class_defs: Vec<ClassItem>,
}

impl Dex {
    /// Parse given dex container
    ///
    /// ```ignore
    /// let dex = Dex::new(data)?;
    /// ```
    pub fn new(data: Vec<u8>) -> Result<Dex, DexError> {
        let header =
            Self::parse_dex_header(&mut &data[..]).map_err(|_| DexError::InvalidHeader)?;

        if let Some(body) = data.get(12..) {
            let mut adler = simd_adler32::Adler32::new();
            adler.write(body);
            if adler.finish() != header.checksum {
                log::warn!(
                    "dex checksum mismatch (header 0x{:08x}, computed 0x{:08x})",
                    header.checksum,
                    adler.finish()
                );
            }
        }

        let string_ids = Self::parse_table(&data, header.string_ids_off, header.string_ids_size)
            .map_err(|_| DexError::StringError)?;

        let type_ids = Self::parse_table(&data, header.type_ids_off, header.type_ids_size)
            .map_err(|_| DexError::TypeError)?;

        let proto_ids =
            Self::parse_items(&data, header.proto_ids_off, header.proto_ids_size, ProtoItem::parse)
                .map_err(|_| DexError::ProtoError)?;

        let field_ids =
            Self::parse_items(&data, header.field_ids_off, header.field_ids_size, FieldItem::parse)
                .map_err(|_| DexError::FieldError)?;

        let method_ids = Self::parse_items(
            &data,
            header.method_ids_off,
            header.method_ids_size,
            MethodItem::parse,
        )
        .map_err(|_| DexError::MethodError)?;

        let class_defs = Self::parse_items(
            &data,
            header.class_defs_off,
            header.class_defs_size,
            ClassItem::parse,
        )
        .map_err(|_| DexError::ClassError)?;

        Ok(Dex {
            data,
            header,
            string_ids,
            type_ids,
            proto_ids,
            field_ids,
            method_ids,
            class_defs,
        })
    }

    /// Slice out a table at its header offset and parse `size` u32 entries.
    fn parse_table(data: &[u8], offset: u32, size: u32) -> ModalResult<Vec<u32>> {
        let mut input = data
            .get(offset as usize..)
            .ok_or(ErrMode::Cut(ContextError::new()))?;
        repeat(size as usize, le_u32).parse_next(&mut input)
    }

    fn parse_items<T>(
        data: &[u8],
        offset: u32,
        size: u32,
        parser: fn(&mut &[u8]) -> ModalResult<T>,
    ) -> ModalResult<Vec<T>> {
        let mut input = data
            .get(offset as usize..)
            .ok_or(ErrMode::Cut(ContextError::new()))?;
        repeat(size as usize, parser).parse_next(&mut input)
    }

    fn parse_dex_header(input: &mut &[u8]) -> ModalResult<DexHeader> {
        // eight magic bytes: "dex\n", three ascii version digits, a NUL
        let version = take(8usize)
            .verify(|magic: &[u8]| magic.starts_with(b"dex\n0") && magic[7] == 0)
            .try_map(|magic: &[u8]| {
                DexVersion::try_from(u16::from_be_bytes([magic[5], magic[6]]))
            })
            .parse_next(input)?;

        let checksum = le_u32.parse_next(input)?;
        let _signature = take(20usize).parse_next(input)?;
        let (file_size, header_size) = (le_u32, le_u32).parse_next(input)?;
        let endian_tag = le_u32
            .verify(|&tag| tag == ENDIAN_CONSTANT || tag == REVERSE_ENDIAN_CONSTANT)
            .parse_next(input)?;
        let _link = (le_u32, le_u32).parse_next(input)?;
        let map_off = le_u32.parse_next(input)?;

        // the six id tables follow as (count, offset) pairs; type and
        // prototype counts are capped at u16 range by the format
        let small = |count: &u32| *count <= u16::MAX.into();
        let (string_ids_size, string_ids_off) = (le_u32, le_u32).parse_next(input)?;
        let (type_ids_size, type_ids_off) = (le_u32.verify(small), le_u32).parse_next(input)?;
        let (proto_ids_size, proto_ids_off) = (le_u32.verify(small), le_u32).parse_next(input)?;
        let (field_ids_size, field_ids_off) = (le_u32, le_u32).parse_next(input)?;
        let (method_ids_size, method_ids_off) = (le_u32, le_u32).parse_next(input)?;
        let (class_defs_size, class_defs_off) = (le_u32, le_u32).parse_next(input)?;
        let (data_size, data_off) = (le_u32, le_u32).parse_next(input)?;

        Ok(DexHeader {
            version,
            checksum,
            file_size,
            header_size,
            endian_tag,
            map_off,
            string_ids_size,
            string_ids_off,
            type_ids_size,
            type_ids_off,
            proto_ids_size,
            proto_ids_off,
            field_ids_size,
            field_ids_off,
            method_ids_size,
            method_ids_off,
            class_defs_size,
            class_defs_off,
            data_size,
            data_off,
        })
    }

    /// Raw container bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Decode the string data item behind `string_ids[idx]`.
    ///
    /// Strings are MUTF-8: a ULEB128 UTF-16 code-unit count, the bytes, a
    /// null terminator. The null character itself is the two-byte sequence
    /// `0xC0 0x80`. Decoding is lossy, never an error.
    pub fn get_string(&self, idx: usize) -> Option<Cow<'_, str>> {
        let offset = *self.string_ids.get(idx)? as usize;
        let mut data = self.data.get(offset..)?;

        let _utf16_len = uleb128(&mut data).ok()?;

        // data bytes run to the terminating null
        let end = data.iter().position(|&b| b == 0)?;
        Some(simd_cesu8::mutf8::decode_lossy(&data[..end]))
    }

    /// Resolve a type index to its descriptor string.
    #[inline]
    pub fn get_type(&self, idx: usize) -> Option<Cow<'_, str>> {
        let idx = *self.type_ids.get(idx)?;
        self.get_string(idx as usize)
    }
}

/// Read one ULEB128 value, advancing the input.
#[inline]
pub(crate) fn uleb128(input: &mut &[u8]) -> ModalResult<u64> {
    let mut val = 0u64;
    let mut shift = 0u32;

    loop {
        let byte = u8.parse_next(input)?;
        let b = (byte & 0x7f) as u64;
        val |= b
            .checked_shl(shift)
            .ok_or(ErrMode::Cut(ContextError::new()))?;

        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    Ok(val)
}

/// Known dex versions
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#dex-file-magic>
#[derive(Default, Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum DexVersion {
    #[default]
    DEX35,
    DEX36,
    DEX37,
    DEX38,
    DEX39,
    DEX40,
    DEX41,
}

impl TryFrom<u16> for DexVersion {
    type Error = DexError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x3335 => Ok(DexVersion::DEX35),
            0x3336 => Ok(DexVersion::DEX36),
            0x3337 => Ok(DexVersion::DEX37),
            0x3338 => Ok(DexVersion::DEX38),
            0x3339 => Ok(DexVersion::DEX39),
            0x3430 => Ok(DexVersion::DEX40),
            0x3431 => Ok(DexVersion::DEX41),
            _ => Err(DexError::UnknownVersion(value)),
        }
    }
}

/// Abstraction over dex header
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#header-item>
#[derive(Default, Debug, Clone)]
pub struct DexHeader {
    /// Known dex version
    pub version: DexVersion,

    /// Adler32 checksum of the file, used to detect corruption
    pub checksum: u32,

    /// Size of the entire file (including the header) in bytes
    pub file_size: u32,

    /// Size of the header (this entire section) in bytes
    pub header_size: u32,

    /// Endiannes tag - [ENDIAN_CONSTANT] or [REVERSE_ENDIAN_CONSTANT]
    pub endian_tag: u32,

    /// Offset from the start of the file to the map item
    pub map_off: u32,

    /// Count of strings in the string identifiers list
    pub string_ids_size: u32,

    /// Offset from the start of the file to the string identifiers list
    pub string_ids_off: u32,

    /// Count of elements in the type identifiers list, at most 65535
    pub type_ids_size: u32,

    /// Offset from the start of the file to the type identifiers list
    pub type_ids_off: u32,

    /// Count of elements in the prototype identifiers list, at most 65535
    pub proto_ids_size: u32,

    /// Offset from the start of the file to the prototype identifiers list
    pub proto_ids_off: u32,

    /// Count of elements in the field identifiers list
    pub field_ids_size: u32,

    /// Offset from the start of the file to the field identifiers list
    pub field_ids_off: u32,

    /// Count of elements in the method identifiers list
    pub method_ids_size: u32,

    /// Offset from the start of the file to the method identifiers list
    pub method_ids_off: u32,

    /// Count of elements in the class definitions list
    pub class_defs_size: u32,

    /// Offset from the start of the file to the class definitions list
    pub class_defs_off: u32,

    /// Size of `data` section in bytes
    pub data_size: u32,

    /// Offset from the start of the file to the start of the `data` section
    pub data_off: u32,
}

/// Abstraction over `proto_id_item`
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#proto-id-item>
#[derive(Debug)]
pub struct ProtoItem {
    /// Index into the [Dex::string_ids] list for the short-form descriptor string
    pub shorty_idx: u32,

    /// Index into the [Dex::type_ids] list for the return type of this prototype
    pub return_type_idx: u32,

    /// Offset from the start of the file to the list of parameter types
    ///
    /// 0 - if this prototype has no parameters
    pub parameters_off: u32,
}

impl ProtoItem {
    #[inline]
    fn parse(input: &mut &[u8]) -> ModalResult<ProtoItem> {
        (le_u32, le_u32, le_u32)
            .map(|(shorty_idx, return_type_idx, parameters_off)| ProtoItem {
                shorty_idx,
                return_type_idx,
                parameters_off,
            })
            .parse_next(input)
    }

    /// Get return type of this prototype from the types pool
    pub fn return_type<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.return_type_idx as usize)
    }

    /// Resolve the parameter type list behind `parameters_off`.
    pub fn parameters<'a>(&self, dex: &'a Dex) -> Vec<Cow<'a, str>> {
        if self.parameters_off == 0 {
            return Vec::new();
        }

        let Some(mut input) = dex.data.get(self.parameters_off as usize..) else {
            return Vec::new();
        };

        let Ok(size) = le_u32::<_, ContextError>.parse_next(&mut input) else {
            return Vec::new();
        };

        let Ok(indices) = repeat::<_, _, Vec<u16>, ContextError, _>(size as usize, le_u16)
            .parse_next(&mut input)
        else {
            return Vec::new();
        };

        indices
            .iter()
            .filter_map(|&idx| dex.get_type(idx as usize))
            .collect()
    }

    /// Render the prototype as `(param types)return`, parameters separated
    /// by single spaces. This is the textual form used in trace lines and
    /// for overload disambiguation.
    pub fn text(&self, dex: &Dex) -> String {
        let params = self.parameters(dex);
        let ret = self.return_type(dex).unwrap_or(Cow::Borrowed("V"));
        format!("({}){}", params.join(" "), ret)
    }
}

/// Abstraction over `field_id_item`
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#field-id-item>
#[derive(Debug)]
pub struct FieldItem {
    /// Index into the [Dex::type_ids] list for the definer of this field
    pub class_idx: u16,

    /// Index into the [Dex::type_ids] list for the type of this field
    pub type_idx: u16,

    /// Index into the [Dex::string_ids] list for the name of this field
    pub name_idx: u32,
}

impl FieldItem {
    #[inline]
    fn parse(input: &mut &[u8]) -> ModalResult<FieldItem> {
        (le_u16, le_u16, le_u32)
            .map(|(class_idx, type_idx, name_idx)| FieldItem {
                class_idx,
                type_idx,
                name_idx,
            })
            .parse_next(input)
    }

    /// Get field class
    #[inline]
    pub fn get_class<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.class_idx as usize)
    }

    /// Get field type
    #[inline]
    pub fn get_type<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.type_idx as usize)
    }

    /// Get field name
    #[inline]
    pub fn get_name<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_string(self.name_idx as usize)
    }
}

/// Abstraction over `method_id_item`
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#method-id-item>
#[derive(Debug)]
pub struct MethodItem {
    /// Index into the [Dex::type_ids] list for the definer of this method
    pub class_idx: u16,

    /// Index into the [Dex::proto_ids] list for the prototype of this method
    pub proto_idx: u16,

    /// Index into the [Dex::string_ids] list for the name of this method
    pub name_idx: u32,
}

impl MethodItem {
    #[inline]
    fn parse(input: &mut &[u8]) -> ModalResult<MethodItem> {
        (le_u16, le_u16, le_u32)
            .map(|(class_idx, proto_idx, name_idx)| MethodItem {
                class_idx,
                proto_idx,
                name_idx,
            })
            .parse_next(input)
    }

    /// Get method class name
    #[inline]
    pub fn get_class<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.class_idx as usize)
    }

    /// Get method prototype
    #[inline]
    pub fn get_prototype<'a>(&self, dex: &'a Dex) -> Option<&'a ProtoItem> {
        dex.proto_ids.get(self.proto_idx as usize)
    }

    /// Get method name
    #[inline]
    pub fn get_name<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_string(self.name_idx as usize)
    }
}

/// Abstraction over `class_def_item`
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#class-def-item>
#[derive(Debug)]
pub struct ClassItem {
    /// Index into the [Dex::type_ids] list for this class
    pub class_idx: u32,

    /// Access flags for the class
    pub access_flags: AccessFlags,

    /// Index into the [Dex::type_ids] list for the superclass
    ///
    /// [NO_INDEX] - if this class has no superclass
    pub superclass_idx: u32,

    /// Offset from the start of the file to the list of interfaces
    pub interfaces_off: u32,

    /// Index into the [Dex::string_ids] list for the original source file
    ///
    /// [NO_INDEX] - lack of this information
    pub source_file_idx: u32,

    /// Offset from the start of the file to the annotations structure
    pub annotations_off: u32,

    /// Offset from the start of the file to the associated class data
    ///
    /// `0` - if there is no class data for this class
    pub class_data_off: u32,

    /// Offset from the start of the file to the list of initial values for
    /// `static` fields
    ///
    /// `0` - if there are none (all `static` fields start as `0` or `null`)
    pub static_values_off: u32,
}

impl ClassItem {
    #[inline]
    fn parse(input: &mut &[u8]) -> ModalResult<ClassItem> {
        (
            le_u32,
            le_u32.map(AccessFlags::from_bits_truncate),
            le_u32,
            le_u32,
            le_u32,
            le_u32,
            le_u32,
            le_u32,
        )
            .map(
                |(
                    class_idx,
                    access_flags,
                    superclass_idx,
                    interfaces_off,
                    source_file_idx,
                    annotations_off,
                    class_data_off,
                    static_values_off,
                )| ClassItem {
                    class_idx,
                    access_flags,
                    superclass_idx,
                    interfaces_off,
                    source_file_idx,
                    annotations_off,
                    class_data_off,
                    static_values_off,
                },
            )
            .parse_next(input)
    }

    /// Get class name
    #[inline]
    pub fn get_name<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.class_idx as usize)
    }

    /// Get superclass for this class
    #[inline]
    pub fn get_superclass<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        if self.superclass_idx == NO_INDEX {
            return None;
        }

        dex.get_type(self.superclass_idx as usize)
    }
}

bitflags! {
    /// Access flags for classes, fields, and methods.
    ///
    /// See: <https://source.android.com/docs/core/runtime/dex-format#access-flags>
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const CONSTRUCTOR = 0x10000;
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

impl AccessFlags {
    /// Returns `true` if the flag set includes the static modifier.
    #[inline]
    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    /// Returns `true` if this is a native method.
    #[inline]
    pub fn is_native(self) -> bool {
        self.contains(Self::NATIVE)
    }

    /// Returns `true` if this member is abstract.
    #[inline]
    pub fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    /// Returns `true` if the method is a constructor or initializer.
    #[inline]
    pub fn is_constructor(self) -> bool {
        self.contains(Self::CONSTRUCTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uleb128_single_and_multi_byte() {
        let mut input: &[u8] = &[0x00];
        assert_eq!(uleb128(&mut input).unwrap(), 0);

        let mut input: &[u8] = &[0x7f];
        assert_eq!(uleb128(&mut input).unwrap(), 0x7f);

        // 0x80 0x01 = 128
        let mut input: &[u8] = &[0x80, 0x01];
        assert_eq!(uleb128(&mut input).unwrap(), 128);

        // 0xb4 0x07 = 0x3b4
        let mut input: &[u8] = &[0xb4, 0x07, 0xff];
        assert_eq!(uleb128(&mut input).unwrap(), 0x3b4);
        assert_eq!(input, &[0xff]);
    }

    #[test]
    fn mutf8_null_byte_round_trip() {
        // "a\0b" in MUTF-8 uses the 0xC0 0x80 null encoding
        let encoded = simd_cesu8::mutf8::encode("a\u{0}b");
        assert_eq!(encoded.as_ref(), &[0x61, 0xC0, 0x80, 0x62]);
        assert_eq!(simd_cesu8::mutf8::decode_lossy(&encoded), "a\u{0}b");
    }

    #[test]
    fn mutf8_decode_never_fails() {
        // invalid sequences degrade to replacement output, not an error
        let decoded = simd_cesu8::mutf8::decode_lossy(&[0x61, 0xf0, 0x28, 0x8c, 0x62]);
        assert!(decoded.contains('a'));
    }

    #[test]
    fn access_flags_helpers() {
        let flags = AccessFlags::from_bits_truncate(0x10008);
        assert!(flags.is_static());
        assert!(flags.is_constructor());
        assert!(!flags.is_native());
    }

    #[test]
    fn version_parsing() {
        assert_eq!(DexVersion::try_from(0x3335).unwrap(), DexVersion::DEX35);
        assert!(DexVersion::try_from(0x1234).is_err());
    }
}
