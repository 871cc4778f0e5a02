//! Errors returned by the emulation engine.

use std::io;

use dexemu_dex::DexError;
use dexemu_zip::ZipError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmuError {
    /// Generic I/O error while trying to read the archive
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// Error occurred while parsing the archive container
    #[error("got error while parsing apk archive: {0}")]
    ZipError(#[from] ZipError),

    /// Error occurred while parsing a dex container
    #[error("got error while parsing dex container: {0}")]
    DexError(#[from] DexError),

    /// The archive holds no `classes*.dex` members
    #[error("no classes*.dex entries found in archive")]
    NoDexEntries,

    /// Target argument does not look like `LClass;->name`
    #[error("invalid target method (expected LClass;->name): {0}")]
    InvalidTarget(String),

    /// Target method absent from every container
    #[error("target method not found: {0}")]
    MethodNotFound(String),
}
