//! Minimal zip reader for Android application packages.
//!
//! Only the subset needed by the emulator is implemented: enumerate the
//! central directory and extract stored or deflated members, so the caller
//! can locate and read `classes*.dex` entries.

pub mod entry;
pub mod errors;
mod structs;

pub use entry::ZipEntry;
pub use errors::ZipError;
