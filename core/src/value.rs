//! Register values, heap objects, arrays, and the register file.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

pub type ObjRef = Rc<RefCell<HeapObject>>;
pub type ArrRef = Rc<RefCell<DvArray>>;

/// A single register cell.
///
/// Wide (64-bit) values live whole in their low slot; the following slot
/// holds [`Value::WideHigh`], which no opcode reads as a scalar.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object(ObjRef),
    Array(ArrRef),
    /// Continuation placeholder occupying the high half of a wide pair
    WideHigh,
}

impl Value {
    /// Wrap a Rust string as a `Ljava/lang/String;` heap object.
    pub fn string(text: impl Into<String>) -> Value {
        let mut obj = HeapObject::new("Ljava/lang/String;");
        obj.internal = Some(Internal::Text(text.into()));
        Value::Object(Rc::new(RefCell::new(obj)))
    }

    pub fn object(obj: HeapObject) -> Value {
        Value::Object(Rc::new(RefCell::new(obj)))
    }

    pub fn array(arr: DvArray) -> Value {
        Value::Array(Rc::new(RefCell::new(arr)))
    }

    /// Read as a 32-bit integer. Non-numeric cells soften to 0 so partial
    /// execution over unresolved state keeps going.
    pub fn as_int(&self) -> i32 {
        match self {
            Value::Int(v) => *v,
            Value::Long(v) => *v as i32,
            _ => 0,
        }
    }

    pub fn as_long(&self) -> i64 {
        match self {
            Value::Int(v) => *v as i64,
            Value::Long(v) => *v,
            _ => 0,
        }
    }

    /// Read as a float. Integer cells are reinterpreted bitwise: float
    /// constants arrive through the plain `const` opcodes as raw bits.
    pub fn as_float(&self) -> f32 {
        match self {
            Value::Float(v) => *v,
            Value::Double(v) => *v as f32,
            Value::Int(v) => f32::from_bits(*v as u32),
            _ => 0.0,
        }
    }

    pub fn as_double(&self) -> f64 {
        match self {
            Value::Double(v) => *v,
            Value::Float(v) => *v as f64,
            Value::Long(v) => f64::from_bits(*v as u64),
            _ => 0.0,
        }
    }

    /// Zero-ness for the `if-*z` family: null compares as zero, any live
    /// object reference as non-zero.
    pub fn test_zero(&self) -> i64 {
        match self {
            Value::Null | Value::WideHigh => 0,
            Value::Int(v) => *v as i64,
            Value::Long(v) => *v,
            Value::Float(_) | Value::Double(_) => 1,
            Value::Object(_) | Value::Array(_) => 1,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<ObjRef> {
        match self {
            Value::Object(obj) => Some(Rc::clone(obj)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ArrRef> {
        match self {
            Value::Array(arr) => Some(Rc::clone(arr)),
            _ => None,
        }
    }

    /// The text buffer of a string-like object, if any.
    pub fn text(&self) -> Option<String> {
        let obj = self.as_object()?;
        let obj = obj.borrow();
        match &obj.internal {
            Some(Internal::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Built-in representation carried by some heap objects.
#[derive(Debug, Clone)]
pub enum Internal {
    /// Character buffer of strings and builders
    Text(String),
    /// Raw bytes of a signature
    Bytes(Vec<u8>),
    /// Backing sequence for list and iterator stand-ins
    Seq { items: Vec<Value>, cursor: usize },
    /// Requested name carried by reflection handles
    Name(String),
    /// Boxed Boolean (0/1) or Integer payload
    Boxed(i64),
}

/// Tag for framework stand-ins produced by the mock layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockKind {
    Context,
    PackageManager,
    PackageInfo,
    ApplicationInfo,
    Signature,
    Class,
    Method,
    Field,
    List,
    Iterator,
}

/// An emulated heap object.
#[derive(Debug)]
pub struct HeapObject {
    /// Class descriptor in the `Lpkg/Class;` form, fixed at allocation
    pub class: String,
    /// Named instance fields
    pub fields: AHashMap<String, Value>,
    /// Built-in representation slot
    pub internal: Option<Internal>,
    /// Set when this object is a framework stand-in
    pub mock: Option<MockKind>,
}

impl HeapObject {
    pub fn new(class: impl Into<String>) -> HeapObject {
        let class = class.into();
        let internal = if class == "Ljava/lang/StringBuilder;" {
            Some(Internal::Text(String::new()))
        } else {
            None
        };

        HeapObject {
            class,
            fields: AHashMap::new(),
            internal,
            mock: None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.internal {
            Some(Internal::Text(s)) => Some(s),
            _ => None,
        }
    }
}

/// An emulated array: element descriptor, fixed size, zero-initialized.
#[derive(Debug)]
pub struct DvArray {
    pub elem_type: String,
    pub data: Vec<Value>,
}

impl DvArray {
    pub fn new(elem_type: impl Into<String>, size: usize) -> DvArray {
        DvArray {
            elem_type: elem_type.into(),
            data: vec![Value::Int(0); size],
        }
    }

    pub fn from_values(elem_type: impl Into<String>, data: Vec<Value>) -> DvArray {
        DvArray {
            elem_type: elem_type.into(),
            data,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Register file of one interpreter frame.
///
/// Sized by the method's declared register count, but writes past the end
/// extend the file: some methods underreport their register needs and the
/// emulator tolerates that instead of faulting.
#[derive(Debug)]
pub struct Registers {
    slots: Vec<Value>,
}

impl Registers {
    pub fn new(count: usize) -> Registers {
        Registers {
            slots: vec![Value::Null; count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Out-of-range reads yield null.
    pub fn get(&self, idx: usize) -> Value {
        self.slots.get(idx).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&mut self, idx: usize, val: Value) {
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, Value::Null);
        }
        self.slots[idx] = val;
    }

    pub fn get_int(&self, idx: usize) -> i32 {
        self.slots.get(idx).map(Value::as_int).unwrap_or(0)
    }

    pub fn get_long(&self, idx: usize) -> i64 {
        self.slots.get(idx).map(Value::as_long).unwrap_or(0)
    }

    pub fn get_float(&self, idx: usize) -> f32 {
        self.slots.get(idx).map(Value::as_float).unwrap_or(0.0)
    }

    pub fn get_double(&self, idx: usize) -> f64 {
        self.slots.get(idx).map(Value::as_double).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_int_softens_non_numeric_cells() {
        let mut regs = Registers::new(4);
        regs.set(0, Value::Int(7));
        regs.set(1, Value::string("seven"));
        regs.set(2, Value::Null);

        assert_eq!(regs.get_int(0), 7);
        assert_eq!(regs.get_int(1), 0);
        assert_eq!(regs.get_int(2), 0);
        // out of range register
        assert_eq!(regs.get_int(17), 0);
    }

    #[test]
    fn writes_extend_the_register_file() {
        let mut regs = Registers::new(2);
        regs.set(5, Value::Int(42));
        assert_eq!(regs.len(), 6);
        assert_eq!(regs.get_int(5), 42);
        assert!(regs.get(3).is_null());
    }

    #[test]
    fn zeroness_of_references() {
        assert_eq!(Value::Null.test_zero(), 0);
        assert_eq!(Value::string("x").test_zero(), 1);
        assert_eq!(Value::array(DvArray::new("[B", 0)).test_zero(), 1);
        assert_eq!(Value::Int(-3).test_zero(), -3);
        assert_eq!(Value::WideHigh.test_zero(), 0);
    }

    #[test]
    fn float_reads_reinterpret_const_bits() {
        let v = Value::Int(0x3f800000);
        assert_eq!(v.as_float(), 1.0);

        let w = Value::Long(f64::to_bits(2.5) as i64);
        assert_eq!(w.as_double(), 2.5);
    }

    #[test]
    fn string_builder_gets_a_text_buffer() {
        let obj = HeapObject::new("Ljava/lang/StringBuilder;");
        assert_eq!(obj.text(), Some(""));

        let plain = HeapObject::new("LFoo;");
        assert!(plain.text().is_none());
    }
}
