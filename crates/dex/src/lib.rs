//! Parser for the Dalvik executable format.
//!
//! A [`Dex`] wraps one `classes*.dex` container and exposes its string,
//! type, prototype, field, method, and class-definition tables, plus the
//! class-data streams that lead to method bytecode and static-field
//! initial values.

pub mod class_data;
pub mod dex;
pub mod errors;

pub use class_data::{ClassData, EncodedField, EncodedMethod, EncodedValue};
pub use dex::{AccessFlags, Dex, DexHeader, NO_INDEX};
pub use errors::DexError;
