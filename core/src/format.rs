//! Value rendering for reports.

use crate::value::{Internal, Value};

/// Format a value for display: strings quoted, arrays as `<Type[size]>`,
/// objects as `<LClass;>`, char-range integers with their glyph.
pub fn format_value(val: &Value) -> String {
    match val {
        Value::Null => "null".to_string(),
        Value::Int(v) => format_int(*v),
        Value::Long(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::WideHigh => "wide".to_string(),
        Value::Array(arr) => {
            let arr = arr.borrow();
            format!("<{}[{}]>", arr.elem_type, arr.size())
        }
        Value::Object(obj) => {
            let obj = obj.borrow();
            match &obj.internal {
                Some(Internal::Text(s)) => format!("\"{s}\""),
                Some(Internal::Boxed(v)) => v.to_string(),
                Some(Internal::Name(s)) => format!("<{} {s}>", obj.class),
                _ => format!("<{}>", obj.class),
            }
        }
    }
}

/// Render char-range integers as `'X' (N)`; surrogate halves fall back
/// to the escaped code point.
fn format_int(v: i32) -> String {
    if v > 127 && v < 65536 {
        match char::from_u32(v as u32) {
            Some(c) => format!("'{c}' ({v})"),
            None => format!("'\\u{v:04x}' ({v})"),
        }
    } else {
        v.to_string()
    }
}

/// Unquoted rendering used by string concatenation and `valueOf`.
pub fn plain_text(val: &Value) -> String {
    match val {
        Value::Null => "null".to_string(),
        Value::Int(v) => v.to_string(),
        Value::Long(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::WideHigh => String::new(),
        Value::Array(arr) => {
            let arr = arr.borrow();
            format!("<{}[{}]>", arr.elem_type, arr.size())
        }
        Value::Object(obj) => {
            let obj = obj.borrow();
            match &obj.internal {
                Some(Internal::Text(s)) => s.clone(),
                Some(Internal::Boxed(v)) => v.to_string(),
                Some(Internal::Name(s)) => s.clone(),
                _ => format!("<{}>", obj.class),
            }
        }
    }
}
