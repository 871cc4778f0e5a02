//! Framework stand-ins for APIs outside the closed world of the archive.
//!
//! Module structure:
//! - `config`: tunable mock values (package name, signature bytes, SDK)
//! - `factories`: constructors for the framework stand-in objects
//! - `dispatch`: hook tables and lookup by substring pattern
//! - `context`: Context / PackageManager / Signature hooks
//! - `reflection`: Class / Method / Field hooks

pub mod config;
pub mod context;
pub mod dispatch;
pub mod factories;
pub mod reflection;

pub use config::MockConfig;
pub use dispatch::{HookResult, HookTable, MockHookFn};
pub use factories::{create_mock_for_class, is_mock_class};
