//! Static Dalvik bytecode emulation engine.
//!
//! Given an APK and a target method, the engine finds every call site of
//! the target, reconstructs the arguments passed at each site by backward
//! slicing and partial execution of the caller, then executes the target
//! with those arguments and reports the returned value. Framework APIs
//! outside the archive are substituted by the mock layer.
//!
//! Everything hangs off an [`AnalysisContext`]: the parsed program, the
//! static-field store, the mock configuration, and the execution policy.
//! Interpreters are short-lived values borrowing the context.

pub mod config;
pub mod context;
pub mod dis;
pub mod driver;
pub mod errors;
pub mod format;
pub mod interp;
pub mod loader;
pub mod mocks;
pub mod ops;
pub mod program;
pub mod slicer;
pub mod store;
pub mod value;

pub use config::EmulatorConfig;
pub use context::AnalysisContext;
pub use errors::EmuError;
pub use mocks::MockConfig;
pub use program::Program;
