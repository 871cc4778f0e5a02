//! Constructors for framework stand-in objects.

use std::cell::RefCell;
use std::rc::Rc;

use crate::mocks::config::MockConfig;
use crate::value::{DvArray, HeapObject, Internal, MockKind, ObjRef, Value};

/// Framework classes the mock layer can materialize.
pub const MOCK_CLASSES: &[&str] = &[
    "Landroid/content/Context;",
    "Landroid/app/Activity;",
    "Landroid/app/Application;",
    "Landroid/content/pm/PackageManager;",
    "Landroid/content/pm/PackageInfo;",
    "Landroid/content/pm/Signature;",
];

pub fn is_mock_class(class: &str) -> bool {
    MOCK_CLASSES.contains(&class)
}

fn tagged(class: &str, kind: MockKind) -> ObjRef {
    let mut obj = HeapObject::new(class);
    obj.mock = Some(kind);
    Rc::new(RefCell::new(obj))
}

/// Mock `android.content.Context`
pub fn create_mock_context() -> ObjRef {
    tagged("Landroid/content/Context;", MockKind::Context)
}

/// Mock `android.content.pm.PackageManager`
pub fn create_mock_package_manager() -> ObjRef {
    tagged("Landroid/content/pm/PackageManager;", MockKind::PackageManager)
}

/// Mock `android.content.pm.Signature` carrying the configured raw bytes.
pub fn create_mock_signature(mocks: &MockConfig) -> ObjRef {
    let sig = tagged("Landroid/content/pm/Signature;", MockKind::Signature);
    sig.borrow_mut().internal = Some(Internal::Bytes(mocks.signature_bytes.clone()));
    sig
}

/// Mock `android.content.pm.PackageInfo` with package name, version, and a
/// single-element signatures array.
pub fn create_mock_package_info(mocks: &MockConfig, package_name: Option<String>) -> ObjRef {
    let info = tagged("Landroid/content/pm/PackageInfo;", MockKind::PackageInfo);
    {
        let mut obj = info.borrow_mut();
        let name = package_name.unwrap_or_else(|| mocks.package_name.clone());
        obj.fields.insert("packageName".to_string(), Value::string(name));
        obj.fields
            .insert("versionCode".to_string(), Value::Int(mocks.version_code));
        obj.fields.insert(
            "versionName".to_string(),
            Value::string(mocks.version_name.clone()),
        );

        let signatures = DvArray::from_values(
            "Landroid/content/pm/Signature;",
            vec![Value::Object(create_mock_signature(mocks))],
        );
        obj.fields
            .insert("signatures".to_string(), Value::array(signatures));
    }
    info
}

/// Mock list object whose internal sequence drives iterator emulation.
pub fn create_mock_list(items: Vec<Value>) -> ObjRef {
    let list = tagged("Ljava/util/ArrayList;", MockKind::List);
    list.borrow_mut().internal = Some(Internal::Seq { items, cursor: 0 });
    list
}

/// Materialize a stand-in for a known framework class.
pub fn create_mock_for_class(mocks: &MockConfig, class: &str) -> Option<Value> {
    match class {
        "Landroid/content/Context;" | "Landroid/app/Activity;" | "Landroid/app/Application;" => {
            Some(Value::Object(create_mock_context()))
        }
        "Landroid/content/pm/PackageManager;" => {
            Some(Value::Object(create_mock_package_manager()))
        }
        "Landroid/content/pm/PackageInfo;" => {
            Some(Value::Object(create_mock_package_info(mocks, None)))
        }
        "Landroid/content/pm/Signature;" => Some(Value::Object(create_mock_signature(mocks))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_info_carries_configured_values() {
        let mocks = MockConfig::default();
        let info = create_mock_package_info(&mocks, None);
        let obj = info.borrow();

        assert_eq!(
            obj.fields.get("packageName").and_then(Value::text).unwrap(),
            mocks.package_name
        );
        assert_eq!(obj.fields.get("versionCode").unwrap().as_int(), 1);

        let signatures = obj.fields.get("signatures").unwrap().as_array().unwrap();
        assert_eq!(signatures.borrow().size(), 1);
    }

    #[test]
    fn unknown_classes_are_not_mocked() {
        let mocks = MockConfig::default();
        assert!(create_mock_for_class(&mocks, "Lcom/example/Thing;").is_none());
        assert!(!is_mock_class("Lcom/example/Thing;"));
        assert!(is_mock_class("Landroid/content/Context;"));
    }
}
