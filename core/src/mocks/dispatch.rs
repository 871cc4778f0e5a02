//! Hook tables and lookup.
//!
//! Hooks are keyed by substring patterns over the disassembled invoke
//! line: traces are textual and may carry the full signature, so a
//! pattern like `Context;->getPackageName` matches every overload and
//! container. The user table is consulted before the framework tables.

use crate::interp::Interp;
use crate::mocks::{context, reflection};
use crate::value::Value;

/// Outcome of a matched hook.
#[derive(Debug)]
pub enum HookResult {
    /// Replacement result for the call
    Value(Value),
    /// The call was handled but produces nothing
    Void,
}

pub type MockHookFn = fn(&mut Interp<'_>, &[Value], &str) -> HookResult;

/// User-provided hooks, tried before the framework tables.
#[derive(Default)]
pub struct HookTable {
    entries: Vec<(String, MockHookFn)>,
}

impl HookTable {
    pub fn new() -> HookTable {
        HookTable::default()
    }

    pub fn register(&mut self, pattern: impl Into<String>, hook: MockHookFn) {
        self.entries.push((pattern.into(), hook));
    }

    pub fn find(&self, trace: &str) -> Option<MockHookFn> {
        self.entries
            .iter()
            .find(|(pattern, _)| trace.contains(pattern.as_str()))
            .map(|(_, hook)| *hook)
    }
}

/// Virtual-dispatch framework hooks.
static VIRTUAL_HOOKS: &[(&str, MockHookFn)] = &[
    // Context methods
    ("Context;->getPackageManager", context::context_get_package_manager),
    ("Context;->getPackageName", context::context_get_package_name),
    // PackageManager methods
    ("PackageManager;->getPackageInfo", context::pm_get_package_info),
    (
        "PackageManager;->getInstalledPackages",
        context::pm_get_installed_packages,
    ),
    // Signature methods
    ("Signature;->toByteArray", context::signature_to_byte_array),
    ("Signature;->toCharsString", context::signature_to_chars_string),
    ("Signature;->hashCode", context::signature_hash_code),
    // Reflection - virtual methods
    ("Class;->getMethod", reflection::class_get_method),
    ("Class;->getField", reflection::class_get_field),
    ("Method;->invoke", reflection::method_invoke),
    ("Field;->get", reflection::field_get),
    // Throwable
    ("Throwable;->getCause", reflection::throwable_get_cause),
];

/// Static-dispatch framework hooks.
static STATIC_HOOKS: &[(&str, MockHookFn)] = &[("Class;->forName", reflection::class_for_name)];

pub fn framework_virtual_hook(trace: &str) -> Option<MockHookFn> {
    VIRTUAL_HOOKS
        .iter()
        .find(|(pattern, _)| trace.contains(pattern))
        .map(|(_, hook)| *hook)
}

pub fn framework_static_hook(trace: &str) -> Option<MockHookFn> {
    STATIC_HOOKS
        .iter()
        .find(|(pattern, _)| trace.contains(pattern))
        .map(|(_, hook)| *hook)
}

/// Framework static fields consulted by `sget` before the program's own
/// static-field store.
pub fn framework_static_field(
    mocks: &crate::mocks::MockConfig,
    field_sig: &str,
) -> Option<Value> {
    if field_sig.contains("Landroid/os/Build$VERSION;->SDK_INT") {
        return Some(Value::Int(mocks.sdk_int));
    }
    if field_sig.contains("PackageManager;->GET_SIGNATURES") {
        return Some(Value::Int(crate::mocks::config::GET_SIGNATURES));
    }
    if field_sig.contains("PackageManager;->GET_SIGNING_CERTIFICATES") {
        return Some(Value::Int(crate::mocks::config::GET_SIGNING_CERTIFICATES));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_lookup_is_substring_based() {
        assert!(framework_virtual_hook(
            "invoke-virtual v1, Landroid/content/Context;->getPackageName()Ljava/lang/String;"
        )
        .is_some());
        assert!(framework_virtual_hook("invoke-virtual v1, LFoo;->bar()V").is_none());
        assert!(framework_static_hook(
            "invoke-static v0, Ljava/lang/Class;->forName(Ljava/lang/String;)Ljava/lang/Class;"
        )
        .is_some());
    }

    #[test]
    fn sdk_int_comes_from_the_config() {
        let mocks = crate::mocks::MockConfig::default();
        let val = framework_static_field(&mocks, "Landroid/os/Build$VERSION;->SDK_INT I");
        assert_eq!(val.unwrap().as_int(), 30);
        assert!(framework_static_field(&mocks, "LFoo;->BAR I").is_none());
    }
}
